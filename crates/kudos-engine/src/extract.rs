//! Mention/signal extraction from raw message text.

use regex::Regex;
use std::sync::LazyLock;

/// Structured result of scanning one message text.
///
/// Both lists preserve first-occurrence order and carry no duplicates.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecognitionExtraction {
    /// Mentioned user ids, without the platform mention syntax.
    pub mentions: Vec<String>,
    /// Recognition signal tokens: `:name:` codes or literal emoji.
    pub signals: Vec<String>,
}

impl RecognitionExtraction {
    /// The single eligible recipient.
    ///
    /// A message mentioning more than one distinct user is ambiguous and
    /// yields no recipient at all.
    pub fn recipient(&self) -> Option<&str> {
        match self.mentions.as_slice() {
            [single] => Some(single.as_str()),
            _ => None,
        }
    }

    /// True when the text resolves to a recipient with at least one signal.
    pub fn has_candidates(&self) -> bool {
        self.recipient().is_some() && !self.signals.is_empty()
    }
}

/// Scans message text for mentioned users and recognition signals.
///
/// Pure and deterministic; the compiled patterns are function-local statics
/// with no shared mutable state.
pub fn extract_recognition(text: &str) -> RecognitionExtraction {
    static MENTION_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
        Regex::new(r"<@([A-Z0-9]+)(?:\|[^>]*)?>").expect("mention pattern compiles")
    });
    // An emoji code, or a pictographic cluster including variation
    // selectors, skin-tone modifiers, and ZWJ continuations.
    static SIGNAL_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
        Regex::new(
            r":[a-z0-9_+\-]+:|\p{Extended_Pictographic}(?:\x{FE0F}|\x{200D}\p{Extended_Pictographic}\x{FE0F}?|\p{Emoji_Modifier})*",
        )
        .expect("signal pattern compiles")
    });

    let mut mentions: Vec<String> = Vec::new();
    for capture in MENTION_PATTERN.captures_iter(text) {
        let user = capture[1].to_string();
        if !mentions.contains(&user) {
            mentions.push(user);
        }
    }

    let mut signals: Vec<String> = Vec::new();
    for matched in SIGNAL_PATTERN.find_iter(text) {
        let token = matched.as_str().to_string();
        if !signals.contains(&token) {
            signals.push(token);
        }
    }

    RecognitionExtraction { mentions, signals }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_single_mention_and_code_signal() {
        let extraction = extract_recognition("thanks <@U02ABCDEF> for the review :tada:");
        assert_eq!(extraction.mentions, vec!["U02ABCDEF"]);
        assert_eq!(extraction.signals, vec![":tada:"]);
        assert_eq!(extraction.recipient(), Some("U02ABCDEF"));
        assert!(extraction.has_candidates());
    }

    #[test]
    fn extracts_literal_emoji_with_variation_selector() {
        let extraction = extract_recognition("\u{2B50}\u{FE0F} <@U1> great job");
        assert_eq!(extraction.signals, vec!["\u{2B50}\u{FE0F}"]);
        assert_eq!(extraction.recipient(), Some("U1"));
    }

    #[test]
    fn keeps_zwj_sequence_as_one_signal() {
        let text = "nice one <@U1> \u{1F469}\u{200D}\u{1F4BB}";
        let extraction = extract_recognition(text);
        assert_eq!(extraction.signals, vec!["\u{1F469}\u{200D}\u{1F4BB}"]);
    }

    #[test]
    fn multiple_distinct_mentions_yield_no_recipient() {
        let extraction = extract_recognition("<@U1> and <@U2> :tada:");
        assert_eq!(extraction.mentions, vec!["U1", "U2"]);
        assert_eq!(extraction.recipient(), None);
        assert!(!extraction.has_candidates());
    }

    #[test]
    fn repeated_mention_of_one_user_stays_eligible() {
        let extraction = extract_recognition("<@U1> really, <@U1|nick> :clap:");
        assert_eq!(extraction.mentions, vec!["U1"]);
        assert_eq!(extraction.recipient(), Some("U1"));
    }

    #[test]
    fn duplicate_signals_collapse_in_order() {
        let extraction = extract_recognition("<@U1> :tada: :star: :tada:");
        assert_eq!(extraction.signals, vec![":tada:", ":star:"]);
    }

    #[test]
    fn text_without_signals_has_no_candidates() {
        let extraction = extract_recognition("<@U1> thanks for everything");
        assert!(extraction.signals.is_empty());
        assert!(!extraction.has_candidates());
    }

    #[test]
    fn plain_text_yields_empty_extraction() {
        let extraction = extract_recognition("shipping the release today");
        assert_eq!(extraction, RecognitionExtraction::default());
    }

    #[test]
    fn mention_syntax_requires_closing_bracket() {
        let extraction = extract_recognition("<@U1 :tada:");
        assert!(extraction.mentions.is_empty());
        assert_eq!(extraction.signals, vec![":tada:"]);
    }
}
