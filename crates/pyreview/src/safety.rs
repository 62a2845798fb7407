//! Static pre-execution safety filter.
//!
//! A case-insensitive substring denylist. It is a speed bump against the most
//! obvious ways of reaching the host (file access, nested evaluation, process
//! spawning), not a security boundary: string concatenation, `getattr` tricks
//! or alternate spellings walk straight past it. A `true` from [`is_safe`]
//! must never be read as a guarantee.

use tracing::warn;

use crate::types::Rejection;

/// Substrings that block execution when found anywhere in the code, in any case.
pub const DENYLIST: &[&str] = &[
    "open(",
    "exec(",
    "eval(",
    "subprocess",
    "import os",
    "import sys",
    "__import__",
    "importlib",
    "system(",
    "popen(",
];

/// Returns `false` if `code` contains any [`DENYLIST`] entry, ignoring case.
pub fn is_safe(code: &str) -> bool {
    check(code).is_ok()
}

/// Like [`is_safe`], but reports the first denylist entry that matched.
pub fn check(code: &str) -> Result<(), Rejection> {
    let lowered = code.to_lowercase();
    match DENYLIST.iter().find(|pattern| lowered.contains(*pattern)) {
        Some(pattern) => {
            warn!(pattern = %pattern, "snippet rejected by safety filter");
            Err(Rejection {
                pattern: (*pattern).to_string(),
            })
        }
        None => Ok(()),
    }
}
