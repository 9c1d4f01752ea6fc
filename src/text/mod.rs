pub mod cleaner;
pub mod similarity;

/// Canonical "recognition succeeded but the frame holds no text" string.
/// Distinct from an empty string and from failure messages; never spoken.
pub const NO_TEXT_SENTINEL: &str = "未偵測到文字";

/// Placeholder shown while a recognition cycle is still running. Never spoken.
pub const RECOGNIZING_PLACEHOLDER: &str = "辨識中…";

/// True for characters in the Chinese ideograph ranges the cleaning rules
/// treat as a distinct class (URO, Extension A, compatibility ideographs).
pub fn is_cjk(c: char) -> bool {
    matches!(c, '\u{4E00}'..='\u{9FFF}' | '\u{3400}'..='\u{4DBF}' | '\u{F900}'..='\u{FAFF}')
}
