//! Property-based tests for rule-table precedence
//!
//! Texts are assembled from the rule tokens plus filler words so every
//! combination and ordering of tokens gets exercised.

use dummybridge_core::rules::{deferred_override, evaluate, RULES};
use dummybridge_core::{CheckpointAction, MssAction};
use proptest::prelude::*;

const TOKENS: &[&str] = &[
    "nostatus",
    "❌",
    "latestatus",
    "⏲️",
    "fail",
    "🔥",
    "nobridge",
    "🌉",
    "nodecrypted",
    "🔐",
    "noremote",
    "🤷",
    "noretry",
    "notcertain",
    "hello",
    "world",
];

/// Generate a text of random tokens separated by spaces
fn arb_text() -> impl Strategy<Value = String> {
    prop::collection::vec(prop::sample::select(TOKENS), 0..8).prop_map(|words| words.join(" "))
}

proptest! {
    /// Property: a leading `!help` wins over every mss token
    #[test]
    fn help_prefix_always_wins(rest in arb_text()) {
        let text = format!("!help {rest}");
        prop_assert_eq!(evaluate(&text).mss, MssAction::Help);
    }

    /// Property: a leading `!generate` wins over every token except `!help`
    #[test]
    fn generate_prefix_beats_text_tokens(rest in arb_text()) {
        let text = format!("!generate {rest}");
        prop_assert_eq!(evaluate(&text).mss, MssAction::Generate);
    }

    /// Property: the last matching checkpoint rule in table order decides
    #[test]
    fn checkpoint_follows_table_order(text in arb_text()) {
        let expected = if text.contains("noremote") || text.contains("🤷") {
            CheckpointAction::NoRemote
        } else if text.contains("nodecrypted") || text.contains("🔐") {
            CheckpointAction::NoDecrypted
        } else if text.contains("nobridge") || text.contains("🌉") {
            CheckpointAction::NoBridge
        } else {
            CheckpointAction::Success
        };
        prop_assert_eq!(evaluate(&text).checkpoint, expected);
    }

    /// Property: `fail` beats the status-shaping tokens that precede it
    #[test]
    fn fail_beats_nostatus_and_latestatus(text in arb_text()) {
        prop_assume!(text.contains("fail") || text.contains("🔥"));
        prop_assert_eq!(evaluate(&text).mss, MssAction::Fail);
    }

    /// Property: nothing is deferred without the `next` token
    #[test]
    fn no_deferral_without_next(text in arb_text()) {
        prop_assert!(deferred_override(&text).is_none());
    }

    /// Property: a deferred pair always equals the immediate evaluation
    #[test]
    fn deferral_mirrors_evaluation(text in arb_text()) {
        let text = format!("next {text}");
        if let Some(pending) = deferred_override(&text) {
            let decision = evaluate(&text);
            prop_assert_eq!(pending.mss, decision.mss);
            prop_assert_eq!(pending.checkpoint, decision.checkpoint);
        }
    }
}

#[test]
fn test_rule_table_order() {
    assert_eq!(RULES.len(), 8);
}
