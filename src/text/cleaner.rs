//! Post-processing for raw recognizer output. Camera OCR of Traditional
//! Chinese tends to hallucinate stray symbols between ideographs, stutter on
//! punctuation, and sprinkle whitespace through what should be a continuous
//! run of characters; this module strips that noise without touching
//! legitimate mixed-script text.

use super::is_cjk;

/// Character sets driving [`clean`]. The membership of each set is data, not
/// logic: the split between "allowed next to CJK" and "droppable noise" is
/// asymmetric (full-width comma is allowed, half-width is not) and tuned
/// against real recognizer output rather than derived from a principle.
#[derive(Debug, Clone)]
pub struct CleanConfig {
    /// Symbols recognizers emit that essentially never occur in real text.
    /// Stripped unconditionally, wherever they appear.
    pub denylist: Vec<char>,
    /// Punctuation that may legitimately sit between two ideographs.
    pub allowed_punctuation: Vec<char>,
    /// Marks whose runs collapse to a single occurrence.
    pub repeatable: Vec<char>,
}

impl Default for CleanConfig {
    fn default() -> Self {
        Self {
            denylist: vec!['|', '\\', '_', '~', '^', '`'],
            allowed_punctuation: vec![
                '，', '。', '！', '？', '：', '；', '（', '）', '「', '」', '『', '』',
            ],
            repeatable: vec!['!', '！', '?', '？', ',', '，', '.', '。'],
        }
    }
}

/// Clean raw recognizer output with the default sets.
pub fn clean(raw: &str) -> String {
    clean_with(raw, &CleanConfig::default())
}

/// Clean raw recognizer output. Pure and total: any input, including the
/// empty string, produces a defined output, and nothing here can fail.
///
/// Passes, in order:
/// 1. strip denylisted symbols;
/// 2. drop a non-CJK, non-ASCII-alphanumeric, non-allowed symbol when both
///    immediate neighbors are CJK ideographs (isolated noise between words);
/// 3. collapse runs of identical repeatable punctuation;
/// 4. whitespace: a horizontal run flanked by CJK on both sides disappears,
///    other space runs collapse to one space, blank-line runs collapse to a
///    single newline, and the ends are trimmed.
///
/// An empty result means "no text survived"; callers substitute
/// [`super::NO_TEXT_SENTINEL`] where a display string is needed.
pub fn clean_with(raw: &str, config: &CleanConfig) -> String {
    if raw.is_empty() {
        return String::new();
    }

    let chars: Vec<char> = raw
        .chars()
        .filter(|c| !config.denylist.contains(c))
        .collect();

    let mut kept: Vec<char> = Vec::with_capacity(chars.len());
    for (i, &c) in chars.iter().enumerate() {
        if is_droppable_symbol(c, config) {
            let prev = i.checked_sub(1).map(|j| chars[j]);
            let next = chars.get(i + 1).copied();
            if matches!((prev, next), (Some(p), Some(n)) if is_cjk(p) && is_cjk(n)) {
                continue;
            }
        }
        kept.push(c);
    }

    let mut collapsed: Vec<char> = Vec::with_capacity(kept.len());
    for &c in &kept {
        if config.repeatable.contains(&c) && collapsed.last() == Some(&c) {
            continue;
        }
        collapsed.push(c);
    }

    normalize_whitespace(&collapsed).trim().to_string()
}

/// A symbol the adjacency rule may drop: not an ideograph, not ASCII
/// alphanumeric, not whitespace, not in the allowed punctuation set.
fn is_droppable_symbol(c: char, config: &CleanConfig) -> bool {
    !is_cjk(c)
        && !c.is_ascii_alphanumeric()
        && !c.is_whitespace()
        && !config.allowed_punctuation.contains(&c)
}

fn is_horizontal_space(c: char) -> bool {
    matches!(c, ' ' | '\t' | '\u{3000}')
}

fn normalize_whitespace(chars: &[char]) -> String {
    let mut out = String::with_capacity(chars.len());
    let mut i = 0;
    while i < chars.len() {
        let c = chars[i];

        if c == '\n' {
            // Swallow a blank-line run (newline, whitespace-only content,
            // more newlines) down to a single newline.
            let mut next = i + 1;
            let mut scan = i + 1;
            while scan < chars.len() && chars[scan].is_whitespace() {
                if chars[scan] == '\n' {
                    next = scan + 1;
                }
                scan += 1;
            }
            out.push('\n');
            i = next;
            continue;
        }

        if is_horizontal_space(c) {
            let mut end = i;
            while end < chars.len() && is_horizontal_space(chars[end]) {
                end += 1;
            }
            let prev = out.chars().last();
            let next = chars.get(end).copied();
            let flanked_by_cjk =
                matches!((prev, next), (Some(p), Some(n)) if is_cjk(p) && is_cjk(n));
            // Whitespace inside a CJK run is recognizer noise; elsewhere the
            // run keeps a single space.
            if !flanked_by_cjk {
                out.push(' ');
            }
            i = end;
            continue;
        }

        out.push(c);
        i += 1;
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn denylisted_symbols_are_stripped_everywhere() {
        let cleaned = clean("A|B\\C_D");
        assert!(!cleaned.contains('|'));
        assert!(!cleaned.contains('\\'));
        assert!(!cleaned.contains('_'));
        assert_eq!(cleaned, "ABCD");
    }

    #[test]
    fn isolated_symbol_between_ideographs_is_dropped() {
        assert_eq!(clean("這$是一$個"), "這是一個");
    }

    #[test]
    fn symbol_next_to_non_cjk_survives() {
        // The comma's right neighbor is a space, so the adjacency rule does
        // not fire even though half-width comma is outside the allowed set.
        assert_eq!(clean("這, 是"), "這, 是");
    }

    #[test]
    fn allowed_punctuation_survives_between_ideographs() {
        assert_eq!(clean("今天，天氣。真好！"), "今天，天氣。真好！");
    }

    #[test]
    fn repeated_punctuation_collapses_to_one() {
        assert_eq!(clean("太好了!!!!"), "太好了!");
        assert_eq!(clean("真的嗎？？？"), "真的嗎？");
        assert_eq!(clean("等等。。。"), "等等。");
    }

    #[test]
    fn mixed_repeats_only_collapse_identical_runs() {
        assert_eq!(clean("咦?!?!"), "咦?!?!");
    }

    #[test]
    fn whitespace_runs_collapse() {
        let cleaned = clean("a    b\n\n\nc");
        assert!(!cleaned.contains("  "));
        assert!(!cleaned.contains("\n\n"));
        assert_eq!(cleaned, "a b\nc");
    }

    #[test]
    fn whitespace_inside_a_cjk_run_disappears() {
        assert_eq!(clean("今 天 天 氣"), "今天天氣");
        assert_eq!(clean("今\u{3000}天"), "今天");
    }

    #[test]
    fn end_to_end_noisy_recognizer_line() {
        assert_eq!(clean("今 | 天_天 ^ 氣 真 好!!!"), "今天天氣真好!");
    }

    #[test]
    fn empty_and_noise_only_input_give_empty_output() {
        assert_eq!(clean(""), "");
        assert_eq!(clean("|||"), "");
        assert_eq!(clean("  \n\n  "), "");
    }

    #[test]
    fn clean_output_is_a_fixed_point() {
        for input in ["今天天氣真好!", "這, 是", "a b\nc", "今 | 天_天 ^ 氣 真 好!!!"] {
            let once = clean(input);
            assert_eq!(clean(&once), once, "input {input:?}");
        }
    }

    #[test]
    fn arbitrary_input_terminates_with_defined_output() {
        // Exercises surrogate-adjacent and combining-character input.
        let _ = clean("🎉🎉 héllo ḱ 中 \u{200B} 文");
        let _ = clean("\n\n\n   \t\t");
    }

    #[test]
    fn custom_allowed_set_is_respected() {
        let mut config = CleanConfig::default();
        config.allowed_punctuation.push('$');
        assert_eq!(clean_with("這$是", &config), "這$是");
    }
}
