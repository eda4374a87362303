//! Text normalisation, blank detection and token-budget truncation.
//!
//! ## Normalisation rules
//!
//! Applied in this order by [`normalize`]:
//! 1. Collapse runs of 2+ line breaks (`\r`/`\n`) to a single `\n`
//! 2. Replace every run of non-ASCII characters with one space
//! 3. Collapse runs of 2+ whitespace characters to one space
//! 4. Trim
//!
//! Rule 3 also folds any remaining `\r\n` pair, so a second pass finds
//! nothing to change: `normalize(normalize(t)) == normalize(t)`.

use crate::error::SummaryError;
use once_cell::sync::Lazy;
use regex::Regex;
use tiktoken_rs::CoreBPE;
use tracing::debug;

/// Minimum number of non-whitespace characters for text to count as content.
pub const BLANK_THRESHOLD: usize = 100;

static RE_LINE_BREAKS: Lazy<Regex> = Lazy::new(|| Regex::new(r"[\r\n]{2,}").unwrap());
static RE_NON_ASCII: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^\x00-\x7F]+").unwrap());
static RE_WHITESPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s{2,}").unwrap());

/// Normalise extracted text before caching and summarisation.
pub fn normalize(input: &str) -> String {
    let s = RE_LINE_BREAKS.replace_all(input, "\n");
    let s = RE_NON_ASCII.replace_all(&s, " ");
    let s = RE_WHITESPACE.replace_all(&s, " ");
    s.trim().to_string()
}

/// True when fewer than [`BLANK_THRESHOLD`] non-whitespace characters remain.
pub fn is_blank(text: &str) -> bool {
    text.chars()
        .filter(|c| !c.is_whitespace())
        .take(BLANK_THRESHOLD)
        .count()
        < BLANK_THRESHOLD
}

/// Bounds text to a token budget using the GPT-2 byte-pair encoding.
///
/// Truncation happens on token boundaries and the kept prefix is decoded
/// back to text, so a cut can never land inside a UTF-8 sequence.
pub struct Truncator {
    bpe: CoreBPE,
}

impl Truncator {
    /// Load the GPT-2 (`r50k_base`) encoding.
    pub fn gpt2() -> Result<Self, SummaryError> {
        let bpe = tiktoken_rs::r50k_base()
            .map_err(|e| SummaryError::Internal(format!("GPT-2 tokenizer unavailable: {e}")))?;
        Ok(Self { bpe })
    }

    /// Number of tokens `text` encodes to.
    pub fn count_tokens(&self, text: &str) -> usize {
        self.bpe.encode_ordinary(text).len()
    }

    /// Keep at most `max_tokens` tokens of `text`.
    ///
    /// Text within the budget is returned unchanged.
    pub fn truncate(&self, text: &str, max_tokens: usize) -> String {
        let tokens = self.bpe.encode_ordinary(text);
        if tokens.len() <= max_tokens {
            return text.to_string();
        }
        debug!("Truncating input from {} to {} tokens", tokens.len(), max_tokens);

        // A byte-level token can end mid-character; step back until the
        // prefix decodes cleanly.
        let mut end = max_tokens;
        while end > 0 {
            if let Ok(decoded) = self.bpe.decode(tokens[..end].to_vec()) {
                return decoded;
            }
            end -= 1;
        }
        String::new()
    }
}

impl std::fmt::Debug for Truncator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Truncator").field("encoding", &"r50k_base").finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn collapses_line_breaks_and_spaces() {
        assert_eq!(normalize("a\n\n\nb   c\r\n\r\nd"), "a\nb c\nd");
    }

    #[test]
    fn strips_non_ascii_runs() {
        assert_eq!(normalize("Section\u{a7}\u{a7} 5 \u{2014} fees"), "Section 5 fees");
        assert_eq!(normalize("caf\u{e9}"), "caf");
    }

    #[test]
    fn trims_edges() {
        assert_eq!(normalize("  \n hello \t "), "hello");
    }

    #[test]
    fn normalize_is_idempotent() {
        let samples = [
            "",
            "   ",
            "plain text",
            "a\r\n\r\n\r\nb",
            "a\r\nb",
            "x \u{feff}\u{200b} y\n\n\tz",
            "\u{1F600}\n\u{1F600}\n\nend  ",
            "line one\nline two\n \nline three",
            "tab\t\tseparated\u{a0}\u{a0}values",
        ];
        for s in samples {
            let once = normalize(s);
            assert_eq!(normalize(&once), once, "not idempotent for {s:?}");
        }
    }

    #[test]
    fn blank_threshold_boundary() {
        let ninety_nine = "x".repeat(99);
        let hundred = "x".repeat(100);
        assert!(is_blank(&ninety_nine));
        assert!(!is_blank(&hundred));

        // Whitespace does not count toward the threshold.
        let spaced: String = "y ".repeat(99);
        assert!(is_blank(&spaced));
        let spaced_hundred: String = "y\n".repeat(100);
        assert!(!is_blank(&spaced_hundred));
    }

    #[test]
    fn truncation_boundary() {
        let t = Truncator::gpt2().unwrap();
        let text = format!("hello{}", " hello".repeat(19));
        let n = t.count_tokens(&text);
        assert_eq!(n, 20);

        // Exactly at the budget: unchanged.
        assert_eq!(t.truncate(&text, n), text);

        // One token over: decoded prefix of exactly the budget.
        let longer = format!("{text} hello");
        assert_eq!(t.count_tokens(&longer), n + 1);
        let cut = t.truncate(&longer, n);
        assert_eq!(cut, text);
        assert_eq!(t.count_tokens(&cut), n);
    }

    #[test]
    fn truncation_never_splits_characters() {
        let t = Truncator::gpt2().unwrap();
        let text = "\u{1F600}".repeat(50);
        for budget in 1..10 {
            let cut = t.truncate(&text, budget);
            assert!(text.starts_with(&cut));
        }
    }
}
