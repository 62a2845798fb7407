//! The review request sent to the assistant and the seam for sending it.

use thiserror::Error;

use crate::parser::parse;
use crate::types::ParsedReply;

/// Marks the start of the review text in a reply.
pub const FEEDBACK_MARKER: &str = "---FEEDBACK---";

/// Marks the start of the refined code in a reply.
pub const CODE_MARKER: &str = "---CODE---";

/// Failures talking to the assistant service.
#[derive(Debug, Error)]
pub enum AssistantError {
    #[error("request to assistant failed: {0}")]
    Transport(String),

    #[error("assistant returned HTTP {code}: {body}")]
    Status { code: u16, body: String },

    #[error("malformed assistant response: {0}")]
    MalformedResponse(String),
}

/// Something that can turn a prompt into reply text.
pub trait AssistantClient {
    fn complete(&self, prompt: &str) -> Result<String, AssistantError>;
}

/// Builds the review request for `task` applied to `code`.
pub fn review_prompt(task: &str, code: &str) -> String {
    format!(
        "\nTask Description: {task}\n\
         \n\
         Original Code:\n\
         ```python\n\
         {code}\n\
         ```\n\
         \n\
         Please provide:\n\
         1. A detailed code review and feedback\n\
         2. A refined version of the code that implements the requested changes\n\
         3. Make sure the code doesn't require user input and uses test cases instead\n\
         4. Prefer using emoji-based output over terminal colors for better compatibility\n\
         5. If using colors, use only standard print statements or emojis\n\
         \n\
         Format your response exactly as follows:\n\
         {FEEDBACK_MARKER}\n\
         [Your feedback here]\n\
         {CODE_MARKER}\n\
         [The refined code here without any markdown formatting or additional explanation within the code section]\n"
    )
}

/// Asks `client` to review `code` against `task` and parses the reply.
pub fn review<C>(client: &C, task: &str, code: &str) -> Result<ParsedReply, AssistantError>
where
    C: AssistantClient + ?Sized,
{
    let reply = client.complete(&review_prompt(task, code))?;
    tracing::debug!(reply_len = reply.len(), "assistant replied");
    Ok(parse(&reply))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;

    struct CannedClient {
        reply: Result<String, u16>,
        seen: RefCell<Vec<String>>,
    }

    impl AssistantClient for CannedClient {
        fn complete(&self, prompt: &str) -> Result<String, AssistantError> {
            self.seen.borrow_mut().push(prompt.to_owned());
            match &self.reply {
                Ok(text) => Ok(text.clone()),
                Err(code) => Err(AssistantError::Status {
                    code: *code,
                    body: "overloaded".to_owned(),
                }),
            }
        }
    }

    #[test]
    fn test_prompt_embeds_task_and_code() {
        let prompt = review_prompt("add tests", "def f():\n    return 1");
        assert!(prompt.contains("Task Description: add tests\n"));
        assert!(prompt.contains("```python\ndef f():\n    return 1\n```\n"));
    }

    #[test]
    fn test_prompt_demands_both_markers_in_order() {
        let prompt = review_prompt("t", "c");
        let feedback_at = prompt.find(FEEDBACK_MARKER).expect("feedback marker");
        let code_at = prompt.find(CODE_MARKER).expect("code marker");
        assert!(feedback_at < code_at);
    }

    #[test]
    fn test_prompt_asks_for_no_user_input() {
        let prompt = review_prompt("t", "c");
        assert!(prompt.contains("doesn't require user input"));
        assert!(prompt.contains("emoji"));
    }

    #[test]
    fn test_review_parses_reply() {
        let client = CannedClient {
            reply: Ok("---FEEDBACK---\nUse a loop.\n---CODE---\n```python\nfor i in range(3):\n    print(i)\n```".to_owned()),
            seen: RefCell::new(Vec::new()),
        };
        let parsed = review(&client, "print 0..2", "print(0)").expect("review succeeds");
        assert_eq!(parsed.feedback, "Use a loop.");
        assert_eq!(parsed.code, "for i in range(3):\n    print(i)");
        assert_eq!(client.seen.borrow().len(), 1);
        assert!(client.seen.borrow()[0].contains("print 0..2"));
    }

    #[test]
    fn test_review_propagates_client_error() {
        let client = CannedClient {
            reply: Err(529),
            seen: RefCell::new(Vec::new()),
        };
        match review(&client, "t", "c") {
            Err(AssistantError::Status { code, .. }) => assert_eq!(code, 529),
            other => panic!("expected Status error, got {other:?}"),
        }
    }

    #[test]
    fn test_review_through_trait_object() {
        let client: Box<dyn AssistantClient> = Box::new(CannedClient {
            reply: Ok("no markers".to_owned()),
            seen: RefCell::new(Vec::new()),
        });
        let parsed = review(client.as_ref(), "t", "c").expect("review succeeds");
        assert_eq!(parsed, ParsedReply::default());
    }
}
