//! In-memory capture sinks for snippet stdout and stderr.
//!
//! [`OutputBuffer`] is shared between the executor (which reads the text back)
//! and the writer objects installed in the interpreter (which append to it),
//! through `Arc<Mutex<_>>`. Writer objects may still hold a clone when the text
//! is read; [`into_strings`](OutputBuffer::into_strings) copies the data out in
//! that case.

use std::sync::{Arc, Mutex};

/// Which of the two sinks a write goes to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stream {
    Stdout,
    Stderr,
}

#[derive(Default)]
struct Sinks {
    stdout: Vec<u8>,
    stderr: Vec<u8>,
}

impl Sinks {
    fn to_strings(&self) -> (String, String) {
        (
            String::from_utf8_lossy(&self.stdout).into_owned(),
            String::from_utf8_lossy(&self.stderr).into_owned(),
        )
    }
}

/// A pair of append-only text sinks.
///
/// Cheap to clone; all clones share the same data.
#[derive(Clone, Default)]
pub struct OutputBuffer {
    inner: Arc<Mutex<Sinks>>,
}

impl OutputBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends `data` to `stream`, exactly as written.
    pub fn write(&self, stream: Stream, data: &[u8]) {
        let mut sinks = self.inner.lock().expect("OutputBuffer mutex poisoned");
        match stream {
            Stream::Stdout => sinks.stdout.extend_from_slice(data),
            Stream::Stderr => sinks.stderr.extend_from_slice(data),
        }
    }

    pub fn write_stdout(&self, data: &[u8]) {
        self.write(Stream::Stdout, data)
    }

    pub fn write_stderr(&self, data: &[u8]) {
        self.write(Stream::Stderr, data)
    }

    /// Consumes this handle and returns `(stdout, stderr)`.
    ///
    /// Invalid UTF-8 is replaced with `\u{FFFD}`.
    pub fn into_strings(self) -> (String, String) {
        match Arc::try_unwrap(self.inner) {
            Ok(mutex) => mutex
                .into_inner()
                .expect("OutputBuffer mutex poisoned")
                .to_strings(),
            // Writer objects still hold a clone.
            Err(arc) => arc.lock().expect("OutputBuffer mutex poisoned").to_strings(),
        }
    }
}
