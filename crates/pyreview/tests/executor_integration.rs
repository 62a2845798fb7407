//! End-to-end tests of `execute()`: safety filter → fresh interpreter →
//! namespace and import gate → output capture → fault rendering.

use pyreview::{execute, ExecutionFault, ExecutionResult};

fn run(code: &str) -> ExecutionResult {
    execute(code).expect("snippet passes the safety filter")
}

fn assert_success(result: &ExecutionResult) {
    assert!(
        result.fault.is_none(),
        "unexpected fault {:?}\nexception: {}",
        result.fault,
        result.exception
    );
    assert_eq!(result.exception, "");
}

// ── Namespace ────────────────────────────────────────────────────────────────

#[test]
fn test_allowlisted_modules_bound_without_import() {
    let result = run(concat!(
        "print(math.sqrt(16))\n",
        "print(json.dumps({'a': [1, 2]}))\n",
        "print(collections.Counter('aab')['a'])\n",
        "print(re.findall(r'\\d', 'a1b2'))\n",
        "print(list(itertools.islice(itertools.count(), 3)))\n",
    ));
    assert_success(&result);
    assert_eq!(
        result.stdout,
        "4.0\n{\"a\": [1, 2]}\n2\n['1', '2']\n[0, 1, 2]\n"
    );
}

#[test]
fn test_every_required_module_is_a_module() {
    // Comprehension bodies only see globals, so the names list stays inline.
    let result = run(concat!(
        "print(all(type(globals()[n]).__name__ == 'module' for n in ",
        "['random', 'math', 'datetime', 'json', 're', 'collections', 'itertools', 'statistics', 'time']))\n",
    ));
    assert_success(&result);
    assert_eq!(result.stdout, "True\n");
}

#[test]
fn test_statistics_and_datetime_work() {
    let result = run(concat!(
        "print(statistics.mean([1, 2, 3]))\n",
        "print(datetime.date(2024, 1, 2).isoformat())\n",
    ));
    assert_success(&result);
    assert_eq!(result.stdout, "2\n2024-01-02\n");
}

#[test]
fn test_json_round_trip_and_indent() {
    let result = run(concat!(
        "data = {'k': 'v', 'n': [1, 2.5, None, True]}\n",
        "assert json.loads(json.dumps(data)) == data\n",
        "print(json.dumps({'a': 1}, indent=2))\n",
    ));
    assert_success(&result);
    assert_eq!(result.stdout, "{\n  \"a\": 1\n}\n");
}

#[test]
fn test_no_state_leaks_between_calls() {
    assert_success(&run("leaked = 41"));
    let second = run("print(leaked)");
    match second.fault {
        Some(ExecutionFault::RuntimeFault { ref type_name, .. }) => assert_eq!(type_name, "NameError"),
        ref other => panic!("expected NameError, got {other:?}"),
    }
}

#[test]
fn test_top_level_definitions_live_in_locals() {
    // Module-level names go to the separate locals mapping, so a function
    // cannot see itself through its globals.
    let result = run(concat!(
        "def fact(n):\n",
        "    return 1 if n <= 1 else n * fact(n - 1)\n",
        "print(fact(1))\n",
        "print(fact(3))\n",
    ));
    assert_eq!(result.stdout, "1\n");
    assert!(result.exception.starts_with("NameError:"), "got {}", result.exception);
}

// ── Restricted builtins ──────────────────────────────────────────────────────

#[test]
fn test_restricted_builtin_raises_name_error() {
    let result = run("f = open\nf('/etc/passwd')");
    assert!(
        result.exception.starts_with("NameError: name 'open' is not defined"),
        "got {}",
        result.exception
    );
}

#[test]
fn test_restricted_builtins_absent_from_builtins_mapping() {
    let result = run(concat!(
        "hidden = ['open', 'exec', 'eval', 'compile', 'input', 'breakpoint', 'help', 'exit', 'quit']\n",
        "print([n for n in hidden if n in __builtins__])\n",
        "print(len([1, 2]), abs(-3))\n",
    ));
    assert_success(&result);
    assert_eq!(result.stdout, "[]\n2 3\n");
}

// ── Import gate ──────────────────────────────────────────────────────────────

#[test]
fn test_allowlisted_import_statement_works() {
    let result = run("from collections import OrderedDict\nimport collections.abc\nprint(OrderedDict(a=1))");
    assert_success(&result);
    assert!(result.stdout.contains("OrderedDict"), "got {}", result.stdout);
}

#[test]
fn test_denied_import_is_module_not_allowed() {
    let result = run("print('before')\nimport socket\nprint('after')");
    assert_eq!(result.stdout, "before\n");
    assert_eq!(
        result.fault,
        Some(ExecutionFault::ModuleNotAllowed {
            module_name: "socket".to_string()
        })
    );
    assert!(result.exception.starts_with("ImportError:"), "got {}", result.exception);
}

#[test]
fn test_denied_import_can_be_caught() {
    let result = run(concat!(
        "try:\n",
        "    import shutil\n",
        "except ImportError:\n",
        "    print('blocked')\n",
    ));
    assert_success(&result);
    assert_eq!(result.stdout, "blocked\n");
}

#[test]
fn test_pure_computation_stdlib_imports_work() {
    let result = run(concat!(
        "from typing import List\n",
        "import functools, heapq, string\n",
        "xs = [3, 1, 2]\n",
        "heapq.heapify(xs)\n",
        "print(functools.reduce(lambda a, b: a + b, xs), xs[0], string.ascii_lowercase[:3])\n",
    ));
    assert_success(&result);
    assert_eq!(result.stdout, "6 1 abc\n");
}

#[test]
fn test_io_capable_import_still_denied() {
    let result = run("import pathlib");
    assert_eq!(
        result.fault,
        Some(ExecutionFault::ModuleNotAllowed {
            module_name: "pathlib".to_string()
        })
    );
}

// ── Fault reporting ──────────────────────────────────────────────────────────

#[test]
fn test_partial_output_kept_on_fault() {
    let result = run("print('one')\nprint('two')\n{}['missing']");
    assert_eq!(result.stdout, "one\ntwo\n");
    assert!(result.exception.starts_with("KeyError:"), "got {}", result.exception);
    assert!(result.exception.contains("Traceback"));
}

#[test]
fn test_report_format_type_message_traceback() {
    let result = run("raise ValueError('bad value')");
    assert!(
        result.exception.starts_with("ValueError: bad value\n"),
        "got {}",
        result.exception
    );
    match result.fault {
        Some(ExecutionFault::RuntimeFault { type_name, message, traceback }) => {
            assert_eq!(type_name, "ValueError");
            assert_eq!(message, "bad value");
            assert!(traceback.contains("ValueError"));
        }
        other => panic!("expected RuntimeFault, got {other:?}"),
    }
}

#[test]
fn test_compile_fault_location() {
    let result = run("x = 1\ny = (\n");
    match result.fault {
        Some(ExecutionFault::CompileFault { line, .. }) => assert!(line >= 2, "line {line}"),
        other => panic!("expected CompileFault, got {other:?}"),
    }
    assert_eq!(result.stdout, "");
}

#[test]
fn test_missing_indent_reports_indentation_error() {
    let result = run("if True:\nprint(1)");
    assert!(
        result.exception.starts_with("IndentationError:"),
        "got {}",
        result.exception
    );
    match result.fault {
        Some(ExecutionFault::CompileFault { type_name, .. }) => assert_eq!(type_name, "IndentationError"),
        other => panic!("expected CompileFault, got {other:?}"),
    }
}

#[test]
fn test_stdout_not_echoed_and_stderr_empty() {
    let result = run("for i in range(3):\n    print(i, end=' ')");
    assert_success(&result);
    assert_eq!(result.stdout, "0 1 2 ");
    assert_eq!(result.stderr, "");
}

// ── Safety filter ────────────────────────────────────────────────────────────

#[test]
fn test_rejections_never_execute() {
    for code in [
        "print('x')\nimport sys",
        "EXEC('print(1)')",
        "x = __import__('math')",
        "importlib = 1",
    ] {
        assert!(
            execute(code).is_err(),
            "expected rejection for {code:?}"
        );
    }
}
