//! Keeping user-supplied text out of logs and persisted records.

use std::fmt;

use crate::types::normalize_name;

/// Whether log lines may carry user-supplied text.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UserDataPolicy {
    pub allow_logs: bool,
}

impl UserDataPolicy {
    pub const REDACT: UserDataPolicy = UserDataPolicy { allow_logs: false };
}

/// Log-safe rendering of a piece of user text.
pub struct UserText<'a> {
    policy: UserDataPolicy,
    text: &'a str,
}

impl fmt::Display for UserText<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.policy.allow_logs {
            f.write_str(self.text)
        } else {
            write!(f, "<redacted: {} chars>", self.text.chars().count())
        }
    }
}

/// Wrap user text for a tracing field: `text = %user_text(policy, &text)`.
pub fn user_text(policy: UserDataPolicy, text: &str) -> UserText<'_> {
    UserText { policy, text }
}

/// Shortest run of words shared with the source that counts as a quote.
const QUOTE_WORDS: usize = 2;

/// Replace every run of two or more consecutive words that also appears in
/// `source` with `[redacted]`.
pub fn scrub_quotes(text: &str, source: &str) -> String {
    let source_words: Vec<String> = source.split_whitespace().map(normalize_name).collect();
    let words: Vec<&str> = text.split_whitespace().collect();
    let keys: Vec<String> = words.iter().map(|w| normalize_name(w)).collect();

    let shared_run = |start: usize| -> usize {
        let mut best = 0;
        for s in 0..source_words.len() {
            let len = keys[start..]
                .iter()
                .zip(&source_words[s..])
                .take_while(|(a, b)| !a.is_empty() && a == b)
                .count();
            best = best.max(len);
        }
        best
    };

    let mut out: Vec<&str> = Vec::with_capacity(words.len());
    let mut i = 0;
    while i < words.len() {
        let run = shared_run(i);
        if run >= QUOTE_WORDS {
            out.push("[redacted]");
            i += run;
        } else {
            out.push(words[i]);
            i += 1;
        }
    }
    out.join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_text_redacts_by_default() {
        let text = "3 fresh eggs";
        assert_eq!(
            user_text(UserDataPolicy::default(), text).to_string(),
            "<redacted: 12 chars>"
        );
        assert_eq!(
            user_text(UserDataPolicy { allow_logs: true }, text).to_string(),
            text
        );
    }

    #[test]
    fn test_scrub_quotes() {
        let source = "Rinse the raw chicken stored overnight in the fridge.";
        let scrubbed = scrub_quotes("Should say Raw chicken stored overnight is unsafe", source);
        assert_eq!(scrubbed, "Should say [redacted] is unsafe");
    }

    #[test]
    fn test_scrub_two_word_quotes() {
        let source = "Leave the raw chicken stored overnight";
        let scrubbed = scrub_quotes("raw chicken should be refrigerated", source);
        assert!(!scrubbed.contains("raw chicken"));
        assert_eq!(scrubbed, "[redacted] should be refrigerated");
    }

    #[test]
    fn test_scrub_keeps_short_overlaps() {
        let source = "Bake the bread for 20 minutes";
        assert_eq!(
            scrub_quotes("bake for longer", source),
            "bake for longer"
        );
    }
}
