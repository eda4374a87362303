//! Post-processing: deterministic enrichment of a generated summary.
//!
//! Models routinely omit the effective date of a measure even when the text
//! states it plainly. The date is recovered here with a regex over the source
//! text and appended to the summary as a fixed sentence.
//!
//! ## Recognised phrasing
//!
//! A trigger phrase followed by a date:
//!
//! - `effective date`, `effective date is`, `effective date of`,
//!   `effective date:`, `effective on`
//! - `takes effect`, `takes effect on`
//!
//! Dates are `Month D[st|nd|rd|th], YYYY`, `D[st|nd|rd|th] Month YYYY`,
//! `YYYY-MM-DD` or `MM/DD/YYYY`. Matching is case-insensitive; only the
//! first occurrence counts.

use once_cell::sync::Lazy;
use regex::Regex;

/// Prefix of the sentence appended to a summary.
pub const EFFECTIVE_DATE_PREFIX: &str = "This measure has an effective date of: ";

const MONTHS: &str =
    "January|February|March|April|May|June|July|August|September|October|November|December";

static RE_EFFECTIVE_DATE: Lazy<Regex> = Lazy::new(|| {
    let pattern = format!(
        r"(?i)(?:effective\s+(?:date\s*(?:is|of|:)?|on)|takes\s+effect\s+(?:on)?)\s*[:\s]*(?P<date>(?:{m})\s+\d{{1,2}}(?:st|nd|rd|th)?[,\s]+\d{{4}}|\d{{1,2}}(?:st|nd|rd|th)?\s+(?:{m})[,\s]+\d{{4}}|\d{{4}}-\d{{2}}-\d{{2}}|\d{{2}}/\d{{2}}/\d{{4}})",
        m = MONTHS
    );
    Regex::new(&pattern).unwrap()
});

/// First effective date stated in `text`, exactly as written.
pub fn find_effective_date(text: &str) -> Option<&str> {
    RE_EFFECTIVE_DATE
        .captures(text)
        .and_then(|caps| caps.name("date"))
        .map(|m| m.as_str())
}

/// Append the effective-date sentence to `summary` when `source_text` states one.
///
/// Summaries that already report an error are returned untouched.
pub fn annotate_effective_date(summary: &str, source_text: &str) -> String {
    if summary.contains("Error") {
        return summary.to_string();
    }
    match find_effective_date(source_text) {
        Some(date) => format!("{summary}\n{EFFECTIVE_DATE_PREFIX}{date}"),
        None => summary.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn appends_month_day_year() {
        let out = annotate_effective_date(
            "Raises the filing fee.",
            "SECTION 9. This act has an effective date: March 3rd, 2024.",
        );
        assert_eq!(
            out,
            "Raises the filing fee.\nThis measure has an effective date of: March 3rd, 2024"
        );
        assert_eq!(out.matches(EFFECTIVE_DATE_PREFIX).count(), 1);
    }

    #[test]
    fn recognises_all_date_shapes() {
        assert_eq!(
            find_effective_date("This act takes effect on 1st July 2025"),
            Some("1st July 2025")
        );
        assert_eq!(
            find_effective_date("effective on 2024-07-01 unless repealed"),
            Some("2024-07-01")
        );
        assert_eq!(
            find_effective_date("The effective date is 07/01/2024."),
            Some("07/01/2024")
        );
        assert_eq!(
            find_effective_date("TAKES EFFECT JANUARY 1, 2026"),
            Some("JANUARY 1, 2026")
        );
    }

    #[test]
    fn first_match_only() {
        let src = "effective date: 2024-01-01. Section 2 takes effect on 2025-01-01.";
        let out = annotate_effective_date("Summary.", src);
        assert!(out.ends_with("2024-01-01"));
        assert!(!out.contains("2025"));
    }

    #[test]
    fn no_date_leaves_summary_unchanged() {
        assert_eq!(
            annotate_effective_date("Summary.", "This act is effective immediately."),
            "Summary."
        );
    }

    #[test]
    fn error_summaries_are_not_annotated() {
        let src = "effective date: March 3, 2024";
        assert_eq!(
            annotate_effective_date("Error: provider unavailable", src),
            "Error: provider unavailable"
        );
    }
}
