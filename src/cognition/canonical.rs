//! Deterministic label normalization shared by every cognition module.
//!
//! Concepts, domains, and surface-trigger phrases are never compared in
//! their raw form; everything routes through [`canonicalize`] first so that
//! `"User Approval"`, `"user  approval"`, and `"User_Approval"` compare equal.

use unicode_normalization::UnicodeNormalization;

/// Normalize a label to its canonical comparison form.
///
/// Pure and total: NFKC-normalizes, lowercases, collapses every run of
/// non-alphanumeric characters to a single space, then trims. Never panics,
/// never returns an error; an empty or all-punctuation input canonicalizes
/// to the empty string.
pub fn canonicalize(input: &str) -> String {
    let normalized: String = input.nfkc().collect();
    let lowered = normalized.to_lowercase();

    let mut out = String::with_capacity(lowered.len());
    let mut pending_space = false;
    for ch in lowered.chars() {
        if ch.is_alphanumeric() {
            if pending_space && !out.is_empty() {
                out.push(' ');
            }
            pending_space = false;
            out.push(ch);
        } else {
            pending_space = true;
        }
    }
    out
}

/// Canonicalize every element of a list, drop empties, dedup while
/// preserving first-seen order.
pub fn canonicalize_unique(items: impl IntoIterator<Item = impl AsRef<str>>) -> Vec<String> {
    let mut seen = std::collections::HashSet::new();
    let mut out = Vec::new();
    for item in items {
        let canon = canonicalize(item.as_ref());
        if canon.is_empty() {
            continue;
        }
        if seen.insert(canon.clone()) {
            out.push(canon);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn collapses_punctuation_and_case() {
        assert_eq!(canonicalize("User Approval"), "user approval");
        assert_eq!(canonicalize("user  approval"), "user approval");
        assert_eq!(canonicalize("User_Approval"), "user approval");
    }

    #[test]
    fn empty_and_punctuation_only_stay_empty() {
        assert_eq!(canonicalize(""), "");
        assert_eq!(canonicalize("   "), "");
        assert_eq!(canonicalize("---***"), "");
    }

    #[test]
    fn idempotent() {
        let cases = ["User Approval Protocol", "  weird__input!! ", "Already_Canon"];
        for case in cases {
            let once = canonicalize(case);
            let twice = canonicalize(&once);
            assert_eq!(once, twice);
        }
    }

    #[test]
    fn unicode_nfkc_folds_compatibility_forms() {
        // Fullwidth digits/letters fold to ASCII under NFKC.
        let fullwidth = "\u{FF21}\u{FF22}\u{FF23}"; // "ABC" fullwidth
        assert_eq!(canonicalize(fullwidth), "abc");
    }

    #[test]
    fn canonicalize_unique_dedups_preserving_order() {
        let out = canonicalize_unique(["Auth", "auth", "  AUTH  ", "billing"]);
        assert_eq!(out, vec!["auth".to_string(), "billing".to_string()]);
    }
}
