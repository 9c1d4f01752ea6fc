//! Speech de-dup for the continuous scan loop: decide whether a freshly
//! recognized block is different enough from the current narration to be
//! worth interrupting it.

use std::collections::HashSet;

use super::{NO_TEXT_SENTINEL, RECOGNIZING_PLACEHOLDER};

/// Policy knobs for [`should_speak`].
#[derive(Debug, Clone)]
pub struct GateConfig {
    /// When on, a candidate too similar to the active narration is treated
    /// as a continuation of the same utterance and suppressed.
    pub smart_suppression: bool,
    /// Similarity at or above this suppresses the candidate.
    pub similarity_threshold: f64,
    /// Strings that are never spoken: the no-text sentinel plus any
    /// in-progress or failure placeholders the UI displays.
    pub never_spoken: Vec<String>,
}

impl Default for GateConfig {
    fn default() -> Self {
        Self {
            smart_suppression: true,
            similarity_threshold: 0.25,
            never_spoken: vec![
                NO_TEXT_SENTINEL.to_string(),
                RECOGNIZING_PLACEHOLDER.to_string(),
            ],
        }
    }
}

/// Jaccard index over the unique-character sets of two strings.
///
/// Order and multiplicity are ignored by design: this runs once per scan
/// cycle and only needs to tell "same block, slightly different read" from
/// "the camera moved to new text". Identical strings score 1.0 (covers the
/// both-empty case), either side empty scores 0.0.
pub fn similarity(a: &str, b: &str) -> f64 {
    if a == b {
        return 1.0;
    }
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }

    let set_a: HashSet<char> = a.chars().collect();
    let set_b: HashSet<char> = b.chars().collect();
    let intersection = set_a.intersection(&set_b).count();
    let union = set_a.union(&set_b).count();
    intersection as f64 / union as f64
}

/// Decide whether `candidate` should interrupt the current narration.
///
/// `force` is the explicit user-initiated replay path and bypasses every
/// check. Otherwise empty and never-spoken strings are rejected, and with
/// smart suppression on, a candidate that overlaps the active narration at
/// or above the threshold is treated as the same utterance.
pub fn should_speak(
    candidate: &str,
    currently_spoken: &str,
    is_speaking: bool,
    force: bool,
    config: &GateConfig,
) -> bool {
    if force {
        return true;
    }

    if candidate.is_empty() || config.never_spoken.iter().any(|s| s == candidate) {
        return false;
    }

    if config.smart_suppression
        && is_speaking
        && similarity(candidate, currently_spoken) >= config.similarity_threshold
    {
        return false;
    }

    true
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identical_strings_score_one() {
        assert_eq!(similarity("abc", "abc"), 1.0);
        assert_eq!(similarity("", ""), 1.0);
        assert_eq!(similarity("今天天氣", "今天天氣"), 1.0);
    }

    #[test]
    fn empty_side_scores_zero() {
        assert_eq!(similarity("", "x"), 0.0);
        assert_eq!(similarity("x", ""), 0.0);
    }

    #[test]
    fn disjoint_strings_score_zero() {
        assert_eq!(similarity("abc", "xyz"), 0.0);
    }

    #[test]
    fn similarity_is_symmetric() {
        for (a, b) in [
            ("今天天氣很好", "今天下雨"),
            ("abc", "abd"),
            ("", "abc"),
            ("重複重複", "重"),
        ] {
            assert_eq!(similarity(a, b), similarity(b, a), "{a:?} vs {b:?}");
        }
    }

    #[test]
    fn multiplicity_is_ignored() {
        assert_eq!(similarity("aaa", "a"), 1.0);
    }

    #[test]
    fn overlapping_candidate_is_suppressed_while_speaking() {
        let config = GateConfig::default();
        // Shares 天/氣/好 with the narration, well above 25% overlap.
        assert!(!should_speak(
            "天氣好",
            "今天天氣很好",
            true,
            false,
            &config
        ));
    }

    #[test]
    fn unrelated_candidate_interrupts() {
        let config = GateConfig::default();
        assert!(should_speak(
            "請勿吸菸",
            "今天天氣很好",
            true,
            false,
            &config
        ));
    }

    #[test]
    fn force_overrides_suppression() {
        let config = GateConfig::default();
        assert!(should_speak(
            "今天天氣很好",
            "今天天氣很好",
            true,
            true,
            &config
        ));
    }

    #[test]
    fn sentinel_and_placeholder_are_never_spoken() {
        let config = GateConfig::default();
        assert!(!should_speak(NO_TEXT_SENTINEL, "", false, false, &config));
        assert!(!should_speak(
            RECOGNIZING_PLACEHOLDER,
            "",
            false,
            false,
            &config
        ));
        assert!(!should_speak("", "", false, false, &config));
    }

    #[test]
    fn suppression_only_applies_while_speaking() {
        let config = GateConfig::default();
        assert!(should_speak(
            "今天天氣很好",
            "今天天氣很好",
            false,
            false,
            &config
        ));
    }

    #[test]
    fn disabled_suppression_always_speaks_valid_text() {
        let config = GateConfig {
            smart_suppression: false,
            ..GateConfig::default()
        };
        assert!(should_speak(
            "今天天氣很好",
            "今天天氣很好",
            true,
            false,
            &config
        ));
        assert!(!should_speak(NO_TEXT_SENTINEL, "", true, false, &config));
    }
}
