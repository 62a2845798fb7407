//! Top-level orchestration of a single snippet execution.
//!
//! 1. Runs the [`safety`](crate::safety) filter. A rejection returns before any
//!    interpreter exists.
//! 2. Builds a fresh interpreter and runs the snippet on the calling thread,
//!    capturing its output into a fresh [`OutputBuffer`].
//! 3. Times the call and maps the VM outcome into an [`ExecutionResult`].
//!
//! Every call is independent: nothing defined by one snippet is visible to the
//! next, and no compiled code or interpreter state is cached. There is no
//! timeout, so a snippet that never terminates blocks the caller.

use std::time::Instant;

use tracing::debug;

use crate::output::OutputBuffer;
use crate::safety;
use crate::types::{ExecutionResult, Rejection};
use crate::vm::{build_interpreter, run_code};

/// Executes a Python snippet in the restricted environment.
///
/// Returns `Err(Rejection)` without running anything if the code matches the
/// safety denylist. Otherwise always returns an [`ExecutionResult`]: syntax
/// errors, uncaught exceptions and denied imports are all reported through
/// `exception` and `fault`, never as `Err`.
///
/// ```no_run
/// let result = pyreview::execute("print(math.sqrt(16))").unwrap();
/// assert_eq!(result.stdout, "4.0\n");
/// ```
pub fn execute(code: &str) -> Result<ExecutionResult, Rejection> {
    safety::check(code)?;

    let start = Instant::now();
    let interp = build_interpreter();
    let vm_result = run_code(&interp, code, OutputBuffer::new());
    let duration_ns = start.elapsed().as_nanos() as u64;

    let result = ExecutionResult {
        stdout: vm_result.stdout,
        stderr: vm_result.stderr,
        exception: vm_result.exception,
        fault: vm_result.fault,
        duration_ns,
    };

    debug!(
        duration_ns = result.duration_ns,
        fault = ?result.fault,
        stdout_len = result.stdout.len(),
        stderr_len = result.stderr.len(),
        "snippet executed"
    );
    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejection_happens_before_any_vm() {
        // Fast: the safety filter short-circuits, no interpreter is built.
        let err = execute("import os\nprint(os.getcwd())").expect_err("import os must be rejected");
        assert_eq!(err.pattern, "import os");
    }

    #[test]
    fn test_rejection_is_case_insensitive() {
        assert!(execute("EVAL('1')").is_err());
    }

    #[test]
    #[ignore = "slow: VM init per test"]
    fn test_duration_is_recorded() {
        let result = execute("x = sum(range(100))").expect("snippet passes the safety filter");
        assert!(result.is_success());
        assert!(result.duration_ns > 0);
    }
}
