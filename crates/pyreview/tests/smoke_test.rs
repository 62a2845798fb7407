//! Smoke tests for the pyreview library.
//!
//! The most important end-to-end behaviours:
//! 1. stdout capture
//! 2. uncaught exceptions become an exception report, not a failure
//! 3. the safety filter rejects before anything runs
//! 4. syntax errors are reported as `CompileFault`
//!
//! Run with: `cargo test -p pyreview --test smoke_test`

use pyreview::{execute, ExecutionFault};

#[test]
fn test_execute_hello_world() {
    let result = execute("print('hi')").expect("not rejected");
    assert_eq!(result.stdout, "hi\n");
    assert_eq!(result.stderr, "");
    assert_eq!(result.exception, "");
    assert!(result.fault.is_none(), "expected no fault, got {:?}", result.fault);
}

#[test]
fn test_execute_zero_division() {
    let result = execute("1/0").expect("not rejected");
    assert!(
        result.exception.starts_with("ZeroDivisionError:"),
        "got exception {:?}",
        result.exception
    );
    assert_eq!(result.stdout, "");
    assert!(matches!(result.fault, Some(ExecutionFault::RuntimeFault { .. })));
}

#[test]
fn test_execute_rejects_import_os() {
    let rejection = execute("import os")
        .expect_err("import os must be rejected");
    assert_eq!(rejection.pattern, "import os");
}

#[test]
fn test_execute_syntax_error() {
    let result = execute("def f(:").expect("not rejected");
    assert!(
        matches!(result.fault, Some(ExecutionFault::CompileFault { .. })),
        "expected CompileFault, got {:?}",
        result.fault
    );
    assert!(result.exception.starts_with("SyntaxError:"));
}
