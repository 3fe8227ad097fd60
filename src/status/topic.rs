//! Tagged-region topic patching.
//!
//! A topic (or channel header) is freeform text carrying tagged regions,
//! each delimited by a fixed literal pattern with exactly one capture
//! group. Patching rewrites only the captured span and reports whether
//! anything changed, so callers can skip redundant downstream writes.

use crate::error::{Result, StatusError};
use regex::Regex;
use std::sync::LazyLock;

/// Open/closed status region, e.g. `|| LAB OPEN ||`.
pub static STATUS_REGION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\|\| LAB (OPEN|CLOSED) \|\|").expect("valid status pattern"));

/// Upcoming-event region, e.g. `|| Next event: Movie night ||`.
pub static NEXT_EVENT_REGION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\|\| Next event: (.*?) \|\|").expect("valid next-event pattern"));

/// Result of a patch attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TopicPatch {
    /// Text with the captured span replaced.
    pub text: String,
    /// Whether the replacement differed from the existing span.
    pub changed: bool,
}

/// Replace the first capture of `region` in `text` with `replacement`.
///
/// Only the captured span is rewritten; every other byte is preserved.
/// The replacement is spliced literally (no `$`-expansion).
///
/// # Errors
///
/// Returns [`StatusError::TagMissing`] when `text` contains no match for
/// `region`; callers log this per target and continue with the others.
pub fn patch_tagged_region(text: &str, region: &Regex, replacement: &str) -> Result<TopicPatch> {
    let captures = region.captures(text).ok_or_else(|| StatusError::TagMissing {
        pattern: region.as_str().to_owned(),
    })?;
    let span = captures.get(1).ok_or_else(|| StatusError::TagMissing {
        pattern: region.as_str().to_owned(),
    })?;

    if span.as_str() == replacement {
        return Ok(TopicPatch {
            text: text.to_owned(),
            changed: false,
        });
    }

    let mut patched = String::with_capacity(text.len() + replacement.len());
    patched.push_str(&text[..span.start()]);
    patched.push_str(replacement);
    patched.push_str(&text[span.end()..]);
    Ok(TopicPatch {
        text: patched,
        changed: true,
    })
}

/// Prepare an event summary for splicing into a tagged region.
///
/// Pipes would collide with the `||` region delimiters and are replaced
/// with dots; an absent or empty summary becomes a literal placeholder.
pub fn sanitize_summary(summary: Option<&str>) -> String {
    match summary {
        Some(s) if !s.is_empty() => s.replace('|', "."),
        _ => "(none)".to_owned(),
    }
}

/// Label spliced into the status region and appended to webhook URLs.
pub fn status_label(open: bool) -> &'static str {
    if open { "OPEN" } else { "CLOSED" }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]

    use super::*;

    #[test]
    fn patch_replaces_only_the_captured_span() {
        let patch = patch_tagged_region("A || LAB CLOSED ||B", &STATUS_REGION, "OPEN").unwrap();
        assert_eq!(patch.text, "A || LAB OPEN ||B");
        assert!(patch.changed);
    }

    #[test]
    fn patch_is_idempotent() {
        let first = patch_tagged_region("A || LAB CLOSED ||B", &STATUS_REGION, "OPEN").unwrap();
        let second = patch_tagged_region(&first.text, &STATUS_REGION, "OPEN").unwrap();
        assert!(!second.changed);
        assert_eq!(second.text, first.text);
    }

    #[test]
    fn patch_leaves_other_regions_untouched() {
        let topic = "welcome || LAB CLOSED || -- || Next event: Movie night || bye";
        let patch = patch_tagged_region(topic, &STATUS_REGION, "OPEN").unwrap();
        assert_eq!(
            patch.text,
            "welcome || LAB OPEN || -- || Next event: Movie night || bye"
        );

        let patch = patch_tagged_region(&patch.text, &NEXT_EVENT_REGION, "(none)").unwrap();
        assert_eq!(
            patch.text,
            "welcome || LAB OPEN || -- || Next event: (none) || bye"
        );
    }

    #[test]
    fn patch_only_touches_first_match() {
        let topic = "|| Next event: a || and || Next event: b ||";
        let patch = patch_tagged_region(topic, &NEXT_EVENT_REGION, "c").unwrap();
        assert_eq!(patch.text, "|| Next event: c || and || Next event: b ||");
    }

    #[test]
    fn patch_missing_tag_is_an_error() {
        let err = patch_tagged_region("no tags here", &STATUS_REGION, "OPEN").unwrap_err();
        assert!(matches!(err, StatusError::TagMissing { .. }));
    }

    #[test]
    fn replacement_is_spliced_literally() {
        let patch = patch_tagged_region("|| Next event: x ||", &NEXT_EVENT_REGION, "$1").unwrap();
        assert_eq!(patch.text, "|| Next event: $1 ||");
    }

    #[test]
    fn empty_capture_can_be_filled() {
        let patch = patch_tagged_region("|| Next event:  ||", &NEXT_EVENT_REGION, "Open night");
        let patch = patch.unwrap();
        assert_eq!(patch.text, "|| Next event: Open night ||");
        assert!(patch.changed);
    }

    #[test]
    fn sanitize_escapes_pipes() {
        assert_eq!(sanitize_summary(Some("a|b||c")), "a.b..c");
    }

    #[test]
    fn sanitize_substitutes_placeholder() {
        assert_eq!(sanitize_summary(None), "(none)");
        assert_eq!(sanitize_summary(Some("")), "(none)");
    }

    #[test]
    fn labels_match_the_status_region() {
        assert!(STATUS_REGION.is_match(&format!("|| LAB {} ||", status_label(true))));
        assert!(STATUS_REGION.is_match(&format!("|| LAB {} ||", status_label(false))));
    }
}
