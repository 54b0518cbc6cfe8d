//! Sentiment backends.
//!
//! [`TextAnalysisBackend`] is optional. When none is configured, or the
//! configured one reports itself unavailable, the word-list
//! [`LexiconSentiment`] is used instead.

use crate::models::Sentiment;

pub trait TextAnalysisBackend: Send + Sync {
    fn name(&self) -> &str;

    /// Whether the backend can run right now (model loaded, service up).
    fn is_available(&self) -> bool;

    /// `None` when the backend has nothing to say about `text`.
    fn sentiment(&self, text: &str) -> Option<Sentiment>;
}

/// Counts positive and negative words from the rule tables.
pub struct LexiconSentiment {
    positive: Vec<String>,
    negative: Vec<String>,
}

impl LexiconSentiment {
    pub fn new(positive: Vec<String>, negative: Vec<String>) -> Self {
        Self { positive, negative }
    }
}

pub fn label_for(polarity: f64) -> &'static str {
    if polarity > 0.1 {
        "positive"
    } else if polarity < -0.1 {
        "negative"
    } else {
        "neutral"
    }
}

impl TextAnalysisBackend for LexiconSentiment {
    fn name(&self) -> &str {
        "rules"
    }

    fn is_available(&self) -> bool {
        true
    }

    /// `(positive - negative) / (positive + negative)` over whole words;
    /// `None` when neither list matches.
    fn sentiment(&self, text: &str) -> Option<Sentiment> {
        let lower = text.to_lowercase();
        let (mut pos, mut neg) = (0usize, 0usize);
        for word in lower.split(|c: char| !c.is_alphanumeric()) {
            if word.is_empty() {
                continue;
            }
            if self.positive.iter().any(|p| p == word) {
                pos += 1;
            } else if self.negative.iter().any(|n| n == word) {
                neg += 1;
            }
        }
        if pos + neg == 0 {
            return None;
        }
        let polarity = (pos as f64 - neg as f64) / (pos + neg) as f64;
        Some(Sentiment {
            polarity,
            label: label_for(polarity).to_string(),
            method: self.name().to_string(),
        })
    }
}

/// Run `backend` when it is available, otherwise `fallback`.
pub fn analyze_sentiment(
    backend: Option<&dyn TextAnalysisBackend>,
    fallback: &LexiconSentiment,
    text: &str,
) -> Option<Sentiment> {
    match backend {
        Some(b) if b.is_available() => b.sentiment(text),
        Some(b) => {
            tracing::debug!(backend = b.name(), "text backend unavailable, using rules");
            fallback.sentiment(text)
        }
        None => fallback.sentiment(text),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rules::ExtractionRules;

    fn lexicon() -> LexiconSentiment {
        let rules = ExtractionRules::default();
        LexiconSentiment::new(rules.positive_words, rules.negative_words)
    }

    struct Offline;

    impl TextAnalysisBackend for Offline {
        fn name(&self) -> &str {
            "offline"
        }
        fn is_available(&self) -> bool {
            false
        }
        fn sentiment(&self, _text: &str) -> Option<Sentiment> {
            Some(Sentiment {
                polarity: 1.0,
                label: "positive".to_string(),
                method: "offline".to_string(),
            })
        }
    }

    #[test]
    fn lexicon_polarity() {
        let l = lexicon();
        let good = l.sentiment("An excellent and renowned researcher").unwrap();
        assert_eq!(good.polarity, 1.0);
        assert_eq!(good.label, "positive");
        let bad = l.sentiment("Fraud lawsuit, a terrible failure; great lawyer").unwrap();
        assert!(bad.polarity < 0.0);
        assert_eq!(bad.label, "negative");
        assert!(l.sentiment("The weather today").is_none());
    }

    #[test]
    fn unavailable_backend_falls_back_to_rules() {
        let s = analyze_sentiment(Some(&Offline), &lexicon(), "great success").unwrap();
        assert_eq!(s.method, "rules");
        assert!(analyze_sentiment(None, &lexicon(), "").is_none());
    }
}
