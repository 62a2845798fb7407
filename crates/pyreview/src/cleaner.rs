//! Strips markdown artifacts from code extracted out of an assistant reply.
//!
//! The pass is a fixed sequence of regex rewrites. It is re-applied until the
//! text stops changing, which makes [`clean`] idempotent. Every rewrite only
//! removes characters, so the loop always terminates.
//!
//! The emphasis rules are blind to Python syntax: `a*b*c` becomes `abc` and
//! `2**3**4` loses its operators. Replies are asked not to format their code,
//! and this is the accepted cost when they do.

use std::borrow::Cow;
use std::sync::OnceLock;

use regex::Regex;

struct Patterns {
    python_fence: Regex,
    any_fence: Regex,
    bold: Regex,
    italic: Regex,
    commented_fence: Regex,
    blank_run: Regex,
}

impl Patterns {
    fn compile() -> Result<Self, regex::Error> {
        Ok(Self {
            python_fence: Regex::new(r"```python\s*\n")?,
            any_fence: Regex::new(r"```\s*\n?")?,
            bold: Regex::new(r"\*\*(.+?)\*\*")?,
            italic: Regex::new(r"\*(.+?)\*")?,
            commented_fence: Regex::new(r"(?m)^#\s*```.*$")?,
            blank_run: Regex::new(r"\n\s*\n\s*\n")?,
        })
    }
}

fn patterns() -> Result<&'static Patterns, regex::Error> {
    static PATTERNS: OnceLock<Result<Patterns, regex::Error>> = OnceLock::new();
    PATTERNS
        .get_or_init(Patterns::compile)
        .as_ref()
        .map_err(Clone::clone)
}

/// Removes code fences, emphasis markers, commented-out fences and runs of
/// blank lines from `code`.
///
/// ```
/// assert_eq!(pyreview::clean("```python\nprint(1)\n```"), "print(1)");
/// ```
pub fn clean(code: &str) -> String {
    match try_clean(code) {
        Ok(cleaned) => cleaned,
        Err(err) => {
            tracing::warn!(error = %err, "cleaner patterns unavailable; returning input unchanged");
            code.to_owned()
        }
    }
}

/// [`clean`], surfacing a pattern compilation failure instead of hiding it.
pub(crate) fn try_clean(code: &str) -> Result<String, regex::Error> {
    let patterns = patterns()?;
    let mut current = code.to_owned();
    loop {
        let next = clean_once(patterns, &current);
        if next == current {
            return Ok(current);
        }
        current = next;
    }
}

fn clean_once(p: &Patterns, text: &str) -> String {
    let text = p.python_fence.replace_all(text, "");
    let text = p.any_fence.replace_all(&text, "");
    let text = text.trim();
    let text = p.bold.replace_all(text, "${1}");
    let text = p.italic.replace_all(&text, "${1}");
    let text = p.commented_fence.replace_all(&text, "");
    let text: Cow<'_, str> = p.blank_run.replace_all(&text, "\n\n");
    text.into_owned()
}
