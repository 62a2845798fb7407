//! The capability table visible to executed snippets.
//!
//! - [`DEFAULT_ALLOWED_MODULES`]: modules bound as globals and importable.
//! - [`IMPORTABLE_MODULES`]: pure-computation modules importable on demand.
//! - [`COLOR_MODULE`] / [`COLOR_SYMBOLS`]: optional terminal-color support,
//!   bound only when the host interpreter can import it.
//! - [`RESTRICTED_BUILTINS`]: builtins removed from the snippet namespace.
//! - [`check_module_allowed`] / [`allowed_set`]: the import gate's lookup.

use std::collections::HashSet;

use crate::types::ExecutionFault;

/// Modules pre-bound in every snippet namespace.
pub const DEFAULT_ALLOWED_MODULES: &[&str] = &[
    "random",
    "math",
    "datetime",
    "json",
    "re",
    "collections",
    "itertools",
    "statistics",
    "time",
];

/// Modules snippet code may `import` but which are not pre-bound.
///
/// None of them can reach files, processes or the network.
pub const IMPORTABLE_MODULES: &[&str] = &[
    "typing",
    "dataclasses",
    "functools",
    "operator",
    "heapq",
    "bisect",
    "string",
    "copy",
    "enum",
    "fractions",
    "decimal",
    "abc",
    "numbers",
    "textwrap",
    "array",
];

/// Optional terminal-color module; its absence is not an error.
pub const COLOR_MODULE: &str = "colorama";

/// Attributes of [`COLOR_MODULE`] bound directly as globals.
pub const COLOR_SYMBOLS: &[&str] = &["Fore", "Back", "Style"];

/// Builtins a snippet cannot reach. Each is dropped from the namespace's
/// `__builtins__` and shadowed by a stub raising `NameError`.
pub const RESTRICTED_BUILTINS: &[&str] = &[
    "open",
    "exec",
    "eval",
    "compile",
    "input",
    "breakpoint",
    "help",
    "exit",
    "quit",
];

/// Checks whether `module_name` may be imported by snippet code.
///
/// A dotted name is allowed when its top-level package is, so `collections.abc`
/// passes whenever `collections` does.
pub fn check_module_allowed(
    module_name: &str,
    allowed: &HashSet<String>,
) -> Result<(), ExecutionFault> {
    if allowed.contains(module_name) {
        return Ok(());
    }

    let top_level = module_name.split('.').next().unwrap_or(module_name);
    if allowed.contains(top_level) {
        return Ok(());
    }

    Err(ExecutionFault::ModuleNotAllowed {
        module_name: module_name.to_string(),
    })
}

/// The full set of importable names: the pre-bound modules, the on-demand
/// modules and the color module.
pub fn allowed_set() -> HashSet<String> {
    DEFAULT_ALLOWED_MODULES
        .iter()
        .chain(IMPORTABLE_MODULES)
        .chain(std::iter::once(&COLOR_MODULE))
        .map(|s| s.to_string())
        .collect()
}
