/// Fraction of `keywords` found in `normalized_text`.
///
/// An empty checklist scores 0.0. Matching is case-insensitive substring
/// containment, so a keyword may match inside a longer word. Repeated
/// keywords are counted individually.
pub fn keyword_score(normalized_text: &str, keywords: &[String]) -> f64 {
    if keywords.is_empty() {
        return 0.0;
    }
    let haystack = normalized_text.to_lowercase();
    let found = keywords
        .iter()
        .filter(|kw| haystack.contains(&kw.to_lowercase()))
        .count();
    found as f64 / keywords.len() as f64
}

/// Parse a stored checklist: either a JSON array of strings or a
/// comma/semicolon separated list. Entries are trimmed, empties dropped.
pub fn parse_keywords(raw: &str) -> Vec<String> {
    let trimmed = raw.trim();
    if trimmed.starts_with('[') {
        if let Ok(list) = serde_json::from_str::<Vec<String>>(trimmed) {
            return list
                .into_iter()
                .map(|k| k.trim().to_string())
                .filter(|k| !k.is_empty())
                .collect();
        }
    }
    trimmed
        .split([',', ';'])
        .map(str::trim)
        .filter(|k| !k.is_empty())
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kws(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_empty_checklist_scores_zero() {
        assert_eq!(keyword_score("anything at all", &[]), 0.0);
        assert_eq!(keyword_score("", &[]), 0.0);
    }

    #[test]
    fn test_half_found() {
        assert_eq!(keyword_score("the cat sat", &kws(&["cat", "dog"])), 0.5);
    }

    #[test]
    fn test_case_insensitive_substring() {
        assert_eq!(keyword_score("concatenate", &kws(&["CAT"])), 1.0);
        assert_eq!(keyword_score("митоз это процесс", &kws(&["Митоз"])), 1.0);
    }

    #[test]
    fn test_duplicates_inflate_denominator() {
        let score = keyword_score("the cat sat", &kws(&["cat", "cat", "dog", "dog"]));
        assert!((score - 0.5).abs() < 1e-12);
        let score = keyword_score("the cat sat", &kws(&["cat", "dog", "dog"]));
        assert!((score - 1.0 / 3.0).abs() < 1e-12);
    }

    #[test]
    fn test_inflected_forms_do_not_match_literal_keyword() {
        // "деление" is not a substring of "деления"
        let score = keyword_score(
            "митоз это процесс деления клетки",
            &kws(&["митоз", "деление", "клетка"]),
        );
        assert!((score - 1.0 / 3.0).abs() < 1e-12);
    }

    #[test]
    fn test_parse_keywords_csv_and_json() {
        assert_eq!(parse_keywords("митоз, деление ,клетка,"), kws(&["митоз", "деление", "клетка"]));
        assert_eq!(parse_keywords("a; b"), kws(&["a", "b"]));
        assert_eq!(parse_keywords(r#"["cat", " mat ", ""]"#), kws(&["cat", "mat"]));
        assert!(parse_keywords("   ").is_empty());
    }
}
