//! Scoped redirection of the interpreter's `sys.stdout` / `sys.stderr`.
//!
//! [`OutputCapture::install`] saves the current stream objects and replaces
//! them with writer objects that append to an [`OutputBuffer`]. The originals
//! are put back when the guard is dropped, so every exit path out of the
//! captured region restores them: normal completion, a raised exception, an
//! early `return` or `?`.
//!
//! The host process's real file descriptors are never touched. `print()` in
//! RustPython resolves `sys.stdout` on every call, so swapping the attribute is
//! enough to capture all output produced by the snippet.

use rustpython_vm::{function::FuncArgs, PyObjectRef, PyResult, VirtualMachine};
use tracing::debug;

use crate::output::{OutputBuffer, Stream};

/// Guard holding the redirected streams of one execution.
pub(crate) struct OutputCapture<'vm> {
    vm: &'vm VirtualMachine,
    buffer: OutputBuffer,
    saved_stdout: PyObjectRef,
    saved_stderr: PyObjectRef,
}

impl<'vm> OutputCapture<'vm> {
    /// Redirects both streams into `buffer` until the guard is dropped.
    pub(crate) fn install(vm: &'vm VirtualMachine, buffer: OutputBuffer) -> PyResult<Self> {
        let saved_stdout = current_stream(vm, "stdout");
        let saved_stderr = current_stream(vm, "stderr");

        // Build the guard before touching sys so a failed second set_attr still
        // restores the first.
        let guard = Self {
            vm,
            buffer: buffer.clone(),
            saved_stdout,
            saved_stderr,
        };

        vm.sys_module
            .set_attr("stdout", build_writer_object(vm, buffer.clone(), Stream::Stdout), vm)?;
        vm.sys_module
            .set_attr("stderr", build_writer_object(vm, buffer, Stream::Stderr), vm)?;
        debug!("output capture installed");
        Ok(guard)
    }

    /// Restores the original streams and returns `(stdout, stderr)`.
    pub(crate) fn finish(self) -> (String, String) {
        let buffer = self.buffer.clone();
        drop(self);
        buffer.into_strings()
    }
}

impl Drop for OutputCapture<'_> {
    fn drop(&mut self) {
        let vm = self.vm;
        let _ = vm.sys_module.set_attr("stdout", self.saved_stdout.clone(), vm);
        let _ = vm.sys_module.set_attr("stderr", self.saved_stderr.clone(), vm);
        debug!("output capture released");
    }
}

fn current_stream(vm: &VirtualMachine, name: &'static str) -> PyObjectRef {
    vm.sys_module
        .get_attr(name, vm)
        .unwrap_or_else(|_| vm.ctx.none())
}

/// Builds a file-like object whose `write(s)` appends to `buffer`.
///
/// A module object serves as the namespace: it accepts arbitrary attributes
/// and needs no class definition.
fn build_writer_object(vm: &VirtualMachine, buffer: OutputBuffer, stream: Stream) -> PyObjectRef {
    let write_fn = vm.new_function(
        "write",
        move |args: FuncArgs, vm: &VirtualMachine| -> PyResult<PyObjectRef> {
            let data: String = args
                .args
                .first()
                .and_then(|o| o.str(vm).ok())
                .map(|s| s.as_str().to_owned())
                .unwrap_or_default();

            buffer.write(stream, data.as_bytes());
            Ok(vm.ctx.new_int(data.chars().count()).into())
        },
    );

    let flush_fn = vm.new_function(
        "flush",
        |_args: FuncArgs, vm: &VirtualMachine| -> PyResult<PyObjectRef> { Ok(vm.ctx.none()) },
    );
    let isatty_fn = vm.new_function(
        "isatty",
        |_args: FuncArgs, vm: &VirtualMachine| -> PyResult<PyObjectRef> {
            Ok(vm.ctx.new_bool(false).into())
        },
    );

    let name = match stream {
        Stream::Stdout => "<stdout>",
        Stream::Stderr => "<stderr>",
    };
    let ns = vm.new_module(name, vm.ctx.new_dict(), None);
    let _ = ns.set_attr("write", write_fn, vm);
    let _ = ns.set_attr("flush", flush_fn, vm);
    let _ = ns.set_attr("closed", vm.ctx.new_bool(false), vm);
    let _ = ns.set_attr("encoding", vm.ctx.new_str("utf-8"), vm);
    let _ = ns.set_attr("isatty", isatty_fn, vm);
    ns.into()
}
