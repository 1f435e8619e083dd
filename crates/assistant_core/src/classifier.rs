//! Conversation mode classification.
//!
//! Keyword matching is a heuristic; anything implementing [`ModeClassifier`]
//! can replace it.

use shared::domain::{Message, Mode};

use crate::config::{ClientSettings, DEFAULT_DOMAIN_KEYWORDS};

pub const DEFAULT_HISTORY_WINDOW: usize = 3;

pub trait ModeClassifier: Send + Sync {
    /// `history` is the full prior sequence; implementations pick the window they need.
    fn classify(&self, input: &str, history: &[Message]) -> Mode;
}

#[derive(Debug, Clone)]
pub struct KeywordClassifier {
    keywords: Vec<String>,
    window: usize,
}

impl KeywordClassifier {
    pub fn new<I, S>(keywords: I, window: usize) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let keywords = keywords
            .into_iter()
            .map(|keyword| keyword.as_ref().trim().to_lowercase())
            .filter(|keyword| !keyword.is_empty())
            .collect();
        Self { keywords, window }
    }

    pub fn from_settings(settings: &ClientSettings) -> Self {
        Self::new(&settings.domain_keywords, settings.history_window)
    }

    fn mentions_domain(&self, text: &str) -> bool {
        let lower = text.to_lowercase();
        self.keywords.iter().any(|keyword| lower.contains(keyword))
    }
}

impl Default for KeywordClassifier {
    fn default() -> Self {
        Self::new(DEFAULT_DOMAIN_KEYWORDS, DEFAULT_HISTORY_WINDOW)
    }
}

impl ModeClassifier for KeywordClassifier {
    fn classify(&self, input: &str, history: &[Message]) -> Mode {
        let recent = &history[history.len().saturating_sub(self.window)..];
        if self.mentions_domain(input)
            || recent
                .iter()
                .any(|message| self.mentions_domain(&message.text))
        {
            Mode::Domain
        } else {
            Mode::General
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keyword_in_input_selects_domain() {
        let classifier = KeywordClassifier::default();
        assert_eq!(
            classifier.classify("Tell me about your EXPERIENCE", &[]),
            Mode::Domain
        );
        assert_eq!(
            classifier.classify("what is the weather today", &[]),
            Mode::General
        );
    }

    #[test]
    fn only_the_recent_window_of_history_counts() {
        let classifier = KeywordClassifier::default();
        let mut history = vec![Message::user("which project was hardest?")];
        assert_eq!(classifier.classify("and why?", &history), Mode::Domain);

        history.extend([
            Message::assistant("the compiler"),
            Message::user("ok"),
            Message::assistant("anything else?"),
        ]);
        assert_eq!(classifier.classify("and why?", &history), Mode::General);
    }

    #[test]
    fn blank_keywords_are_ignored() {
        let classifier = KeywordClassifier::new(["", "  "], 3);
        assert_eq!(classifier.classify("anything", &[]), Mode::General);
    }
}
