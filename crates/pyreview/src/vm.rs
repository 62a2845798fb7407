//! RustPython VM lifecycle for the pyreview library.
//!
//! This module owns all RustPython API calls. For one execution it:
//! - creates a fresh interpreter with the native stdlib and a frozen `json`;
//! - installs the import gate (`builtins.__import__` override) that admits only
//!   the capability table's modules from snippet code;
//! - builds the snippet namespace: allowlisted modules bound as globals,
//!   restricted builtins removed and shadowed;
//! - compiles and runs the code under an [`OutputCapture`] guard with a fresh
//!   empty locals mapping;
//! - renders any failure as `"<Type>: <message>\n<traceback>"`.
//!
//! No interpreter is ever reused across executions.
//!
//! The filtered `__builtins__` mapping only changes what a snippet sees when it
//! inspects it. Frames resolve builtin names through the interpreter's own
//! builtins module, so the `NameError` stubs in globals are what hide the
//! restricted names, and a snippet that deletes a stub from `globals()` gets the
//! real builtin back. The builtins module itself stays intact because stdlib
//! code such as `collections.namedtuple` and `dataclasses` calls `exec`.

use std::collections::HashSet;
use std::sync::Arc;

use rustpython_vm::{
    builtins::{PyBaseExceptionRef, PyDictRef},
    compiler::{CompileError, Mode},
    function::{ArgMapping, FuncArgs},
    scope::Scope,
    AsObject, Interpreter, PyObjectRef, PyResult, TryFromObject, VirtualMachine,
};
use tracing::{debug, warn};

use crate::capture::OutputCapture;
use crate::modules::{
    allowed_set, check_module_allowed, COLOR_MODULE, COLOR_SYMBOLS, DEFAULT_ALLOWED_MODULES,
    RESTRICTED_BUILTINS,
};
use crate::output::OutputBuffer;
use crate::types::ExecutionFault;

/// Prefix of the `ImportError` message raised by the import gate.
const DENIED_IMPORT_PREFIX: &str = "import of module not allowed: ";

/// Filename reported in tracebacks for snippet code.
const SNIPPET_FILENAME: &str = "<string>";

/// Intermediate result before the executor adds timing.
pub(crate) struct VmRunResult {
    pub stdout: String,
    pub stderr: String,
    pub exception: String,
    pub fault: Option<ExecutionFault>,
}

/// Candidate locations of a host Python standard library.
///
/// Pure-Python modules such as `datetime`, `statistics` and `collections` are
/// loaded from here; native modules registered from `rustpython_stdlib` take
/// precedence over any extension files on the same path.
fn python_stdlib_paths() -> Vec<String> {
    let candidates = [
        "/usr/local/lib/python3.13",
        "/usr/local/lib/python3.12",
        "/usr/local/lib/python3.11",
        "/usr/local/lib/python3.10",
        "/usr/lib/python3",
        "/usr/lib/python3.12",
        "/usr/lib/python3.11",
        "/usr/lib/python3.10",
    ];
    candidates
        .iter()
        .filter(|p| std::path::Path::new(p).is_dir())
        .map(|p| p.to_string())
        .collect()
}

/// Creates a new interpreter with the stdlib configured.
///
/// The import gate and output capture are installed later, inside `enter()`,
/// because `builtins.__import__` only exists after `vm.initialize()`, which
/// runs after the `with_init` closure.
pub(crate) fn build_interpreter() -> Interpreter {
    let mut settings = rustpython_vm::Settings::default();
    for path in python_stdlib_paths() {
        settings.path_list.push(path);
    }

    Interpreter::with_init(settings, |vm| {
        vm.add_native_modules(rustpython_stdlib::get_module_inits());

        // Pure-Python `json` on top of the native `_json` scanner. The host's
        // json package depends on C accelerators RustPython does not provide.
        vm.add_frozen(rustpython_vm::py_freeze!(
            source = r#"
import _json

__all__ = ['dump', 'dumps', 'load', 'loads', 'JSONDecoder', 'JSONDecodeError', 'JSONEncoder']

_CONSTANTS = {'-Infinity': float('-inf'), 'Infinity': float('inf'), 'NaN': float('nan')}
_ESCAPES = {'"': '\\"', '\\': '\\\\', '\n': '\\n', '\r': '\\r', '\t': '\\t', '\b': '\\b', '\f': '\\f'}


class JSONDecodeError(ValueError):
    def __init__(self, msg, doc, pos):
        lineno = doc.count('\n', 0, pos) + 1
        colno = pos - doc.rfind('\n', 0, pos)
        ValueError.__init__(self, '%s: line %d column %d (char %d)' % (msg, lineno, colno, pos))
        self.msg = msg
        self.doc = doc
        self.pos = pos
        self.lineno = lineno
        self.colno = colno


def _quote(s, ensure_ascii):
    out = []
    for c in s:
        n = ord(c)
        if c in _ESCAPES:
            out.append(_ESCAPES[c])
        elif n < 0x20 or (ensure_ascii and n > 0x7e):
            if n > 0xffff:
                n -= 0x10000
                out.append('\\u%04x\\u%04x' % (0xd800 | (n >> 10), 0xdc00 | (n & 0x3ff)))
            else:
                out.append('\\u%04x' % n)
        else:
            out.append(c)
    return '"' + ''.join(out) + '"'


class JSONEncoder:
    def __init__(self, *, skipkeys=False, ensure_ascii=True, check_circular=True,
                 allow_nan=True, sort_keys=False, indent=None, separators=None, default=None):
        self.skipkeys = skipkeys
        self.ensure_ascii = ensure_ascii
        self.allow_nan = allow_nan
        self.sort_keys = sort_keys
        if isinstance(indent, int):
            indent = ' ' * indent
        self.indent = indent
        if separators is not None:
            self.item_separator, self.key_separator = separators
        elif indent is not None:
            self.item_separator, self.key_separator = ',', ': '
        else:
            self.item_separator, self.key_separator = ', ', ': '
        if default is not None:
            self.default = default

    def default(self, o):
        raise TypeError(f'Object of type {type(o).__name__} is not JSON serializable')

    def encode(self, o):
        return self._encode(o, 0)

    def iterencode(self, o, _one_shot=False):
        return iter([self.encode(o)])

    def _float(self, o):
        if o != o:
            text = 'NaN'
        elif o == float('inf'):
            text = 'Infinity'
        elif o == float('-inf'):
            text = '-Infinity'
        else:
            return repr(o)
        if not self.allow_nan:
            raise ValueError('Out of range float values are not JSON compliant: ' + repr(o))
        return text

    def _key(self, k):
        if isinstance(k, str):
            return k
        if k is True:
            return 'true'
        if k is False:
            return 'false'
        if k is None:
            return 'null'
        if isinstance(k, float):
            return self._float(k)
        if isinstance(k, int):
            return int.__repr__(k)
        if self.skipkeys:
            return None
        raise TypeError(f'keys must be str, int, float, bool or None, not {type(k).__name__}')

    def _encode(self, o, depth):
        if o is None:
            return 'null'
        if o is True:
            return 'true'
        if o is False:
            return 'false'
        if isinstance(o, str):
            return _quote(o, self.ensure_ascii)
        if isinstance(o, int):
            return int.__repr__(o)
        if isinstance(o, float):
            return self._float(o)
        if isinstance(o, (list, tuple)):
            return self._join('[', ']', [self._encode(v, depth + 1) for v in o], depth)
        if isinstance(o, dict):
            items = sorted(o.items()) if self.sort_keys else list(o.items())
            parts = []
            for k, v in items:
                key = self._key(k)
                if key is None:
                    continue
                parts.append(_quote(key, self.ensure_ascii) + self.key_separator
                             + self._encode(v, depth + 1))
            return self._join('{', '}', parts, depth)
        return self._encode(self.default(o), depth)

    def _join(self, left, right, parts, depth):
        if not parts:
            return left + right
        if self.indent is None:
            return left + self.item_separator.join(parts) + right
        inner = '\n' + self.indent * (depth + 1)
        return (left + inner + (self.item_separator + inner).join(parts)
                + '\n' + self.indent * depth + right)


def _skip_ws(s, i):
    while i < len(s) and s[i] in ' \t\n\r':
        i += 1
    return i


class JSONDecoder:
    def __init__(self, *, object_hook=None, parse_float=None, parse_int=None,
                 parse_constant=None, strict=True, object_pairs_hook=None):
        self.object_hook = object_hook
        self.object_pairs_hook = object_pairs_hook
        self.parse_float = parse_float or float
        self.parse_int = parse_int or int
        self.parse_constant = parse_constant or _CONSTANTS.__getitem__
        self.strict = strict
        self.memo = {}
        self.scan_once = _json.make_scanner(self)

    def decode(self, s):
        obj, end = self.raw_decode(s, _skip_ws(s, 0))
        end = _skip_ws(s, end)
        if end != len(s):
            raise JSONDecodeError('Extra data', s, end)
        return obj

    def raw_decode(self, s, idx=0):
        try:
            return self.scan_once(s, idx)
        except StopIteration as err:
            raise JSONDecodeError('Expecting value', s, err.value) from None


def dumps(obj, *, cls=None, **kw):
    return (cls or JSONEncoder)(**kw).encode(obj)


def dump(obj, fp, **kw):
    fp.write(dumps(obj, **kw))


def loads(s, *, cls=None, **kw):
    if isinstance(s, (bytes, bytearray)):
        s = s.decode('utf-8')
    return (cls or JSONDecoder)(**kw).decode(s)


def load(fp, **kw):
    return loads(fp.read(), **kw)
"#,
            module_name = "json"
        ));
    })
}

/// Compiles and executes `code_str` in a fresh namespace of `interp`.
///
/// Never fails: every compile or runtime error is converted into a fault and
/// an exception report alongside whatever output was captured.
pub(crate) fn run_code(interp: &Interpreter, code_str: &str, output: OutputBuffer) -> VmRunResult {
    interp.enter(|vm| {
        install_import_hook(vm, Arc::new(allowed_set()));

        let globals = match build_namespace(vm) {
            Ok(globals) => globals,
            Err(exc) => return failed_before_run(vm, exc),
        };

        let capture = match OutputCapture::install(vm, output) {
            Ok(capture) => capture,
            Err(exc) => return failed_before_run(vm, exc),
        };

        let code = match vm.compile(code_str, Mode::Exec, SNIPPET_FILENAME.to_owned()) {
            Ok(code) => code,
            Err(err) => {
                let (stdout, stderr) = capture.finish();
                let (exception, fault) = compile_fault(vm, &err, code_str);
                debug!(%exception, "snippet failed to compile");
                return VmRunResult {
                    stdout,
                    stderr,
                    exception,
                    fault: Some(fault),
                };
            }
        };

        let locals = ArgMapping::from_dict_exact(vm.ctx.new_dict());
        let scope = Scope::with_builtins(Some(locals), globals, vm);
        let exec_result = vm.run_code_obj(code, scope);
        let (stdout, stderr) = capture.finish();

        match exec_result {
            Ok(_) => VmRunResult {
                stdout,
                stderr,
                exception: String::new(),
                fault: None,
            },
            Err(exc) => {
                let (exception, fault) = runtime_fault(vm, &exc);
                debug!(%exception, "snippet raised");
                VmRunResult {
                    stdout,
                    stderr,
                    exception,
                    fault: Some(fault),
                }
            }
        }
    })
}

fn failed_before_run(vm: &VirtualMachine, exc: PyBaseExceptionRef) -> VmRunResult {
    let (exception, fault) = runtime_fault(vm, &exc);
    warn!(%exception, "sandbox setup failed");
    VmRunResult {
        stdout: String::new(),
        stderr: String::new(),
        exception,
        fault: Some(fault),
    }
}

// ── Namespace ────────────────────────────────────────────────────────────────

/// Builds the snippet's global namespace.
///
/// Contains `__name__ == "__main__"` (the import gate keys on it), a
/// `__builtins__` mapping without [`RESTRICTED_BUILTINS`], a `NameError` stub
/// for each restricted builtin, and every allowlisted module the host can
/// provide.
fn build_namespace(vm: &VirtualMachine) -> PyResult<PyDictRef> {
    let globals = vm.ctx.new_dict();
    globals.set_item("__name__", vm.ctx.new_str("__main__").into(), vm)?;
    globals.set_item("__builtins__", restricted_builtins(vm)?, vm)?;

    for name in RESTRICTED_BUILTINS {
        globals.set_item(*name, removed_builtin_stub(vm, *name), vm)?;
    }

    for name in DEFAULT_ALLOWED_MODULES {
        match import_module(vm, name) {
            Ok(module) => globals.set_item(*name, module, vm)?,
            Err(exc) => warn!(
                module = %name,
                error = %exception_summary(vm, &exc),
                "allowlisted module unavailable in host"
            ),
        }
    }

    match import_module(vm, COLOR_MODULE) {
        Ok(module) => {
            for symbol in COLOR_SYMBOLS {
                if let Ok(value) = module.get_attr(*symbol, vm) {
                    globals.set_item(*symbol, value, vm)?;
                }
            }
            globals.set_item(COLOR_MODULE, module, vm)?;
        }
        Err(_) => debug!("{COLOR_MODULE} not importable; color symbols omitted"),
    }

    Ok(globals)
}

/// A copy of the builtins dict without the restricted entries, exposed to the
/// snippet as `__builtins__`.
fn restricted_builtins(vm: &VirtualMachine) -> PyResult<PyObjectRef> {
    let full = vm.builtins.get_attr("__dict__", vm)?;
    let copy = vm.call_method(&full, "copy", ())?;
    for name in RESTRICTED_BUILTINS {
        vm.call_method(&copy, "pop", (vm.ctx.new_str(*name), vm.ctx.none()))?;
    }
    Ok(copy)
}

fn removed_builtin_stub(vm: &VirtualMachine, name: &'static str) -> PyObjectRef {
    vm.new_function(
        name,
        move |_args: FuncArgs, vm: &VirtualMachine| -> PyResult<PyObjectRef> {
            Err(vm.new_exception_msg(
                vm.ctx.exceptions.name_error.to_owned(),
                format!("name '{name}' is not defined"),
            ))
        },
    )
    .into()
}

/// Imports `name` through the (already gated) `builtins.__import__`.
fn import_module(vm: &VirtualMachine, name: &str) -> PyResult {
    let import = vm.builtins.get_attr("__import__", vm)?;
    import.call((vm.ctx.new_str(name),), vm)
}

// ── Import gate ──────────────────────────────────────────────────────────────

/// Returns `true` if an `__import__` call originates from snippet code.
///
/// Snippet code runs with `__name__ == "__main__"`; stdlib modules carry their
/// own name and may import their dependencies freely. A call without globals
/// (made from Rust while binding the namespace) is treated as snippet code.
fn is_user_code_import(args: &FuncArgs, vm: &VirtualMachine) -> bool {
    let globals = match args.args.get(1) {
        Some(g) if !vm.is_none(g) => g,
        _ => return true,
    };

    let name = vm
        .call_method(globals, "get", (vm.ctx.new_str("__name__"),))
        .ok()
        .filter(|v| !vm.is_none(v))
        .and_then(|v| v.str(vm).ok())
        .map(|s| s.as_str().to_owned());

    match name {
        Some(name) => name == "__main__",
        None => true,
    }
}

/// Replaces `builtins.__import__` with a function that enforces `allowed` for
/// imports made by snippet code and delegates everything else to the original.
fn install_import_hook(vm: &VirtualMachine, allowed: Arc<HashSet<String>>) {
    let original_import = match vm.builtins.get_attr("__import__", vm) {
        Ok(f) => f,
        Err(_) => {
            warn!("builtins.__import__ missing; import gate not installed");
            return;
        }
    };

    let hook = vm.new_function(
        "__import__",
        move |args: FuncArgs, vm: &VirtualMachine| -> PyResult<PyObjectRef> {
            // __import__(name, globals=None, locals=None, fromlist=(), level=0)
            if is_user_code_import(&args, vm) {
                let module_name: String = args
                    .args
                    .first()
                    .and_then(|o| o.str(vm).ok())
                    .map(|s| s.as_str().to_owned())
                    .unwrap_or_default();
                let level = args
                    .args
                    .get(4)
                    .and_then(|o| i64::try_from_object(vm, o.clone()).ok())
                    .unwrap_or(0);

                // Snippets are not packages, so relative imports are never valid.
                if level > 0 || check_module_allowed(&module_name, &allowed).is_err() {
                    return Err(vm.new_import_error(
                        format!("{DENIED_IMPORT_PREFIX}{module_name}"),
                        vm.ctx.new_str(module_name),
                    ));
                }
            }
            original_import.call(args, vm)
        },
    );

    let _ = vm.builtins.set_attr("__import__", hook, vm);
}

// ── Fault rendering ──────────────────────────────────────────────────────────

fn exception_summary(vm: &VirtualMachine, exc: &PyBaseExceptionRef) -> String {
    let type_name = (*exc.as_object().class().name()).to_owned();
    let message = exc
        .as_object()
        .str(vm)
        .map(|s| s.as_str().to_owned())
        .unwrap_or_default();
    format!("{type_name}: {message}")
}

/// Renders a raised exception as `"<Type>: <message>\n<traceback>"` and its
/// structured fault.
fn runtime_fault(vm: &VirtualMachine, exc: &PyBaseExceptionRef) -> (String, ExecutionFault) {
    let type_name = (*exc.as_object().class().name()).to_owned();
    let message = exc
        .as_object()
        .str(vm)
        .map(|s| s.as_str().to_owned())
        .unwrap_or_else(|_| "<unprintable exception>".to_owned());

    let mut traceback = String::new();
    let _ = vm.write_exception(&mut traceback, exc);

    let exception = format!("{type_name}: {message}\n{traceback}");

    let fault = match message.strip_prefix(DENIED_IMPORT_PREFIX) {
        Some(module_name) if type_name == "ImportError" => ExecutionFault::ModuleNotAllowed {
            module_name: module_name.to_owned(),
        },
        _ => ExecutionFault::RuntimeFault {
            type_name,
            message,
            traceback,
        },
    };
    (exception, fault)
}

/// Converts a compile error into the interpreter's own `SyntaxError`
/// subclass (`IndentationError`, `TabError` or `SyntaxError` itself) and
/// renders it like a raised exception.
fn compile_fault(
    vm: &VirtualMachine,
    err: &CompileError,
    source: &str,
) -> (String, ExecutionFault) {
    let (line, col) = err.python_location();
    let exc = vm.new_syntax_error(err, Some(source));

    let type_name = (*exc.as_object().class().name()).to_owned();
    let message = exc
        .as_object()
        .str(vm)
        .map(|s| s.as_str().to_owned())
        .unwrap_or_else(|_| err.to_string());

    let mut traceback = String::new();
    let _ = vm.write_exception(&mut traceback, &exc);

    let exception = format!("{type_name}: {message}\n{traceback}");
    let fault = ExecutionFault::CompileFault {
        type_name,
        message,
        line: line as u32,
        col: col as u32,
    };
    (exception, fault)
}
