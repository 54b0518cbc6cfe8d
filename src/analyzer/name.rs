//! Person-name acceptance heuristic.

/// Whether `text` plausibly names a person.
///
/// Accepted: at most 100 characters, one to five words, at least two
/// letters, nothing but letters, spaces, apostrophes and hyphens, every word
/// starting with an uppercase letter or an apostrophe, and no word on the
/// lowercase `blocklist`.
pub fn is_likely_name(text: &str, blocklist: &[String]) -> bool {
    let text = text.trim();
    if text.is_empty() || text.chars().count() > 100 {
        return false;
    }

    let words: Vec<&str> = text.split_whitespace().collect();
    if words.is_empty() || words.len() > 5 {
        return false;
    }
    if text.chars().filter(|c| c.is_alphabetic()).count() < 2 {
        return false;
    }
    if !text
        .chars()
        .all(|c| c.is_alphabetic() || c.is_whitespace() || c == '\'' || c == '-')
    {
        return false;
    }
    if !words.iter().all(|w| {
        w.chars()
            .next()
            .is_some_and(|c| c.is_uppercase() || c == '\'')
    }) {
        return false;
    }

    let lower = text.to_lowercase();
    !lower
        .split(|c: char| !c.is_alphabetic())
        .any(|w| !w.is_empty() && blocklist.iter().any(|b| b == w))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rules::ExtractionRules;

    fn check(text: &str) -> bool {
        is_likely_name(text, &ExtractionRules::default().name_blocklist)
    }

    #[test]
    fn accepts_ordinary_names() {
        assert!(check("John Doe"));
        assert!(check("Mary Jane Smith"));
        assert!(check("Jean-Claude Van Damme"));
        assert!(check("O'Connor"));
        assert!(check("Иван Петров"));
    }

    #[test]
    fn rejects_lowercase_and_blocklisted() {
        assert!(!check("john doe"));
        assert!(!check("Page Title"));
        assert!(!check("Company Inc"));
        assert!(!check("Contact Us"));
    }

    #[test]
    fn rejects_by_shape() {
        assert!(!check("A"));
        assert!(!check(""));
        assert!(!check("John123"));
        assert!(!check("Alpha Beta Gamma Delta Epsilon Zeta"));
        assert!(!check(
            "One Two Three Four Five Six Seven Eight Nine Ten Eleven Twelve"
        ));
        assert!(!check("John Doe, PhD"));
    }

    #[test]
    fn blocklist_matches_whole_words_only() {
        // "Homer" contains "home" but is not the word itself.
        assert!(check("Homer Simpson"));
    }
}
