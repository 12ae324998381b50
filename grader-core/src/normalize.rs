//! Text canonicalization applied to transcripts and reference answers before
//! any scoring signal looks at them.

/// Quotation marks, brackets and dashes dropped outright (no space substituted).
pub const STRIPPED_CHARS: &[char] = &[
    '«', '»', '"', '\'', '(', ')', '—', '–', '-', '“', '”', '„',
];

/// Lowercase, drop [`STRIPPED_CHARS`], collapse whitespace runs to one space,
/// trim. Total and idempotent.
///
/// Characters are dropped before whitespace is collapsed so that a dash
/// standing alone between two words never leaves a double space behind.
pub fn normalize(text: &str) -> String {
    let lowered = text.to_lowercase();
    let stripped: String = lowered
        .chars()
        .filter(|c| !STRIPPED_CHARS.contains(c))
        .collect();
    stripped.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// [`normalize`] for nullable input; `None` becomes the empty string.
pub fn normalize_opt(text: Option<&str>) -> String {
    text.map(normalize).unwrap_or_default()
}
