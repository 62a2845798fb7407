//! Splits an assistant reply into its feedback and code sections.
//!
//! The reply is expected to look like
//!
//! ```text
//! ---FEEDBACK---
//! <review>
//! ---CODE---
//! <refined code>
//! ```
//!
//! Only the first occurrence of each marker counts. Feedback runs from the
//! feedback marker to the next code marker after it (or to the end). Code is
//! everything after the code marker, passed through [`clean`](crate::clean).
//! When the code marker precedes the feedback marker, feedback is still
//! measured from the feedback marker and code still runs to the end, so the
//! two sections overlap.

use tracing::warn;

use crate::cleaner::try_clean;
use crate::prompt::{CODE_MARKER, FEEDBACK_MARKER};
use crate::types::ParsedReply;

/// Extracts the feedback and code sections from `reply`.
///
/// Never fails. Missing markers yield empty sections; if the cleaner cannot
/// run, the whole reply is returned as feedback with empty code.
pub fn parse(reply: &str) -> ParsedReply {
    match try_parse(reply) {
        Ok(parsed) => parsed,
        Err(err) => {
            warn!(error = %err, "could not parse assistant reply; returning it as feedback");
            ParsedReply {
                feedback: reply.to_owned(),
                code: String::new(),
            }
        }
    }
}

fn try_parse(reply: &str) -> Result<ParsedReply, regex::Error> {
    let feedback = match section_after(reply, FEEDBACK_MARKER) {
        Some(rest) => {
            let end = rest.find(CODE_MARKER).unwrap_or(rest.len());
            rest[..end].trim().to_owned()
        }
        None => String::new(),
    };

    let code = match section_after(reply, CODE_MARKER) {
        Some(rest) => try_clean(rest.trim())?,
        None => String::new(),
    };

    Ok(ParsedReply { feedback, code })
}

/// The text following the first occurrence of `marker`.
fn section_after<'a>(text: &'a str, marker: &str) -> Option<&'a str> {
    text.find(marker).map(|at| &text[at + marker.len()..])
}
