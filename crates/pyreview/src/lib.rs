// pyreview: restricted Python snippet execution and assistant-reply parsing on RustPython.

pub(crate) mod capture;
pub mod cleaner;
pub mod executor;
pub mod modules;
pub mod output;
pub mod parser;
pub mod prompt;
pub mod safety;
pub mod types;
pub(crate) mod vm;

pub use cleaner::clean;
pub use executor::execute;
pub use modules::{
    COLOR_MODULE, COLOR_SYMBOLS, DEFAULT_ALLOWED_MODULES, IMPORTABLE_MODULES, RESTRICTED_BUILTINS,
};
pub use output::OutputBuffer;
pub use parser::parse;
pub use prompt::{review, review_prompt, AssistantClient, AssistantError, CODE_MARKER, FEEDBACK_MARKER};
pub use safety::{check, is_safe, DENYLIST};
pub use types::{ExecutionFault, ExecutionResult, ParsedReply, Rejection};
