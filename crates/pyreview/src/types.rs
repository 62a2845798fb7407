//! Foundational public types for the pyreview library.
//!
//! - [`ExecutionResult`]: captured stdout/stderr plus the rendered exception report
//! - [`ExecutionFault`]: structured form of an abnormal termination
//! - [`Rejection`]: the safety filter's refusal to run a snippet
//! - [`ParsedReply`]: feedback and code sections of an assistant reply

use serde::{Deserialize, Serialize};

/// The outcome of executing a snippet that passed the safety filter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionResult {
    /// Everything written to `sys.stdout` during execution.
    pub stdout: String,

    /// Everything written to `sys.stderr` during execution.
    pub stderr: String,

    /// `"<ErrorTypeName>: <message>\n<traceback>"`, or empty on normal completion.
    pub exception: String,

    /// Structured form of `exception`; `None` exactly when `exception` is empty.
    pub fault: Option<ExecutionFault>,

    /// Elapsed wall-clock time in nanoseconds.
    pub duration_ns: u64,
}

impl ExecutionResult {
    /// `true` if the snippet ran to completion without raising.
    pub fn is_success(&self) -> bool {
        self.fault.is_none()
    }
}

/// Ways a snippet can terminate abnormally.
///
/// Serialized with an internally-tagged `"type"` discriminator.
///
/// ```json
/// {"type":"CompileFault","type_name":"SyntaxError","message":"invalid syntax","line":1,"col":7}
/// {"type":"RuntimeFault","type_name":"ZeroDivisionError","message":"division by zero","traceback":"..."}
/// {"type":"ModuleNotAllowed","module_name":"socket"}
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ExecutionFault {
    /// The source is not syntactically valid.
    CompileFault {
        type_name: String,
        message: String,
        /// 1-based, 0 if unknown.
        line: u32,
        /// 1-based, 0 if unknown.
        col: u32,
    },

    /// An exception escaped the snippet.
    RuntimeFault {
        type_name: String,
        message: String,
        traceback: String,
    },

    /// The snippet imported a module outside the allowlist.
    ModuleNotAllowed { module_name: String },
}

/// Returned instead of an [`ExecutionResult`] when the safety filter trips.
///
/// Nothing was executed and no output was captured.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
#[error("Code contains potentially unsafe operations (matched `{pattern}`)")]
pub struct Rejection {
    /// The denylist entry that matched.
    pub pattern: String,
}

/// The two sections extracted from an assistant reply.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParsedReply {
    pub feedback: String,
    pub code: String,
}
