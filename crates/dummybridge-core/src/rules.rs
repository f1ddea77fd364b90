//! Ordered substring rule table
//!
//! The rule table maps the text of an event to a synthetic delivery outcome.
//! Rules are evaluated strictly in table order and every matching rule
//! overwrites the field it targets, so a later rule always wins over an
//! earlier one on conflict. Precedence lives in [`RULES`] and nowhere else.

use core::fmt;

use serde::Serialize;

use crate::checkpoint::CheckpointStep;

/// Token that turns an event's rules into a deferred override
pub const NEXT_TOKEN: &str = "next";
/// Token that forces a deferral even when the derived pair is all-success
pub const SUCCESS_TOKEN: &str = "success";
/// Token marking a failure as permanent
pub const NO_RETRY_TOKEN: &str = "noretry";
/// Token marking a failure as uncertain
pub const NOT_CERTAIN_TOKEN: &str = "notcertain";

// ----------------------------------------------------------------------------
// Actions
// ----------------------------------------------------------------------------

/// Message-send-status outcome chosen for one event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
pub enum MssAction {
    #[default]
    Success,
    Fail,
    NoStatus,
    Late,
    Generate,
    Help,
}

/// Checkpoint suppression chosen for one event, independent of [`MssAction`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
pub enum CheckpointAction {
    #[default]
    Success,
    NoBridge,
    NoDecrypted,
    NoRemote,
}

impl CheckpointAction {
    /// Whether a checkpoint for `step` is emitted under this action
    pub fn allows(self, step: CheckpointStep) -> bool {
        match step {
            CheckpointStep::Bridge => self != Self::NoBridge,
            CheckpointStep::Decrypted => !matches!(self, Self::NoBridge | Self::NoDecrypted),
            CheckpointStep::Remote => self == Self::Success,
        }
    }
}

impl fmt::Display for MssAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Success => "success",
            Self::Fail => "fail",
            Self::NoStatus => "nostatus",
            Self::Late => "latestatus",
            Self::Generate => "generate",
            Self::Help => "help",
        };
        f.write_str(name)
    }
}

impl fmt::Display for CheckpointAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Success => "success",
            Self::NoBridge => "nobridge",
            Self::NoDecrypted => "nodecrypted",
            Self::NoRemote => "noremote",
        };
        f.write_str(name)
    }
}

// ----------------------------------------------------------------------------
// Rule Table
// ----------------------------------------------------------------------------

/// How a rule recognizes its token
#[derive(Debug, Clone, Copy)]
pub enum Matcher {
    /// Any of the tokens appears anywhere in the text
    Contains(&'static [&'static str]),
    /// The text starts with the prefix
    StartsWith(&'static str),
}

impl Matcher {
    fn matches(&self, text: &str) -> bool {
        match self {
            Self::Contains(tokens) => tokens.iter().any(|token| text.contains(token)),
            Self::StartsWith(prefix) => text.starts_with(prefix),
        }
    }
}

/// Field assignment performed by a matching rule
#[derive(Debug, Clone, Copy)]
pub enum Assignment {
    Mss(MssAction),
    Checkpoint(CheckpointAction),
}

/// One row of the rule table
#[derive(Debug, Clone, Copy)]
pub struct Rule {
    pub matcher: Matcher,
    pub assignment: Assignment,
}

/// The rule table, in evaluation order
pub const RULES: &[Rule] = &[
    Rule {
        matcher: Matcher::Contains(&["nostatus", "❌"]),
        assignment: Assignment::Mss(MssAction::NoStatus),
    },
    Rule {
        matcher: Matcher::Contains(&["latestatus", "⏲️"]),
        assignment: Assignment::Mss(MssAction::Late),
    },
    Rule {
        matcher: Matcher::Contains(&["fail", "🔥"]),
        assignment: Assignment::Mss(MssAction::Fail),
    },
    Rule {
        matcher: Matcher::StartsWith("!generate"),
        assignment: Assignment::Mss(MssAction::Generate),
    },
    Rule {
        matcher: Matcher::StartsWith("!help"),
        assignment: Assignment::Mss(MssAction::Help),
    },
    Rule {
        matcher: Matcher::Contains(&["nobridge", "🌉"]),
        assignment: Assignment::Checkpoint(CheckpointAction::NoBridge),
    },
    Rule {
        matcher: Matcher::Contains(&["nodecrypted", "🔐"]),
        assignment: Assignment::Checkpoint(CheckpointAction::NoDecrypted),
    },
    Rule {
        matcher: Matcher::Contains(&["noremote", "🤷"]),
        assignment: Assignment::Checkpoint(CheckpointAction::NoRemote),
    },
];

// ----------------------------------------------------------------------------
// Evaluation
// ----------------------------------------------------------------------------

/// Result of running the rule table over one text
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct Decision {
    pub mss: MssAction,
    pub checkpoint: CheckpointAction,
    pub no_retry: bool,
    pub not_certain: bool,
}

/// A `(MssAction, CheckpointAction)` pair held over for the next event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PendingOverride {
    pub mss: MssAction,
    pub checkpoint: CheckpointAction,
}

impl fmt::Display for PendingOverride {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} / checkpoint: {}", self.mss, self.checkpoint)
    }
}

/// Evaluate the rule table over `text`
pub fn evaluate(text: &str) -> Decision {
    let mut decision = Decision::default();

    for rule in RULES {
        if !rule.matcher.matches(text) {
            continue;
        }
        match rule.assignment {
            Assignment::Mss(action) => decision.mss = action,
            Assignment::Checkpoint(action) => decision.checkpoint = action,
        }
    }

    decision.no_retry = text.contains(NO_RETRY_TOKEN);
    decision.not_certain = text.contains(NOT_CERTAIN_TOKEN);
    decision
}

/// Derive the override `text` asks to apply to the next event, if any.
///
/// Requires the `next` token. The pair derived from the same rule table is
/// deferred when it is not all-success, or when `success` is spelled out to
/// explicitly schedule a clean outcome.
pub fn deferred_override(text: &str) -> Option<PendingOverride> {
    if !text.contains(NEXT_TOKEN) {
        return None;
    }

    let decision = evaluate(text);
    let candidate = PendingOverride {
        mss: decision.mss,
        checkpoint: decision.checkpoint,
    };
    let all_success =
        candidate.mss == MssAction::Success && candidate.checkpoint == CheckpointAction::Success;

    if !all_success || text.contains(SUCCESS_TOKEN) {
        Some(candidate)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let decision = evaluate("hello world");
        assert_eq!(decision, Decision::default());
        assert_eq!(decision.mss, MssAction::Success);
        assert_eq!(decision.checkpoint, CheckpointAction::Success);
    }

    #[test]
    fn test_emoji_tokens() {
        assert_eq!(evaluate("❌").mss, MssAction::NoStatus);
        assert_eq!(evaluate("⏲️").mss, MssAction::Late);
        assert_eq!(evaluate("🔥").mss, MssAction::Fail);
        assert_eq!(evaluate("🌉").checkpoint, CheckpointAction::NoBridge);
        assert_eq!(evaluate("🔐").checkpoint, CheckpointAction::NoDecrypted);
        assert_eq!(evaluate("🤷").checkpoint, CheckpointAction::NoRemote);
    }

    #[test]
    fn test_later_rule_wins() {
        assert_eq!(evaluate("!help fail").mss, MssAction::Help);
        assert_eq!(evaluate("nostatus latestatus").mss, MssAction::Late);
        assert_eq!(evaluate("latestatus fail").mss, MssAction::Fail);
        assert_eq!(
            evaluate("nobridge noremote").checkpoint,
            CheckpointAction::NoRemote
        );
    }

    #[test]
    fn test_prefix_rules_only_match_at_start() {
        assert_eq!(evaluate("please !help").mss, MssAction::Success);
        assert_eq!(evaluate("!generate messages=1").mss, MssAction::Generate);
        assert_eq!(evaluate(" !generate").mss, MssAction::Success);
    }

    #[test]
    fn test_flags() {
        let decision = evaluate("fail noretry notcertain");
        assert_eq!(decision.mss, MssAction::Fail);
        assert!(decision.no_retry);
        assert!(decision.not_certain);
    }

    #[test]
    fn test_checkpoint_gating() {
        use CheckpointStep::*;

        assert!(CheckpointAction::Success.allows(Bridge));
        assert!(CheckpointAction::Success.allows(Decrypted));
        assert!(CheckpointAction::Success.allows(Remote));

        assert!(!CheckpointAction::NoBridge.allows(Bridge));
        assert!(!CheckpointAction::NoBridge.allows(Decrypted));
        assert!(!CheckpointAction::NoBridge.allows(Remote));

        assert!(CheckpointAction::NoDecrypted.allows(Bridge));
        assert!(!CheckpointAction::NoDecrypted.allows(Decrypted));
        assert!(!CheckpointAction::NoDecrypted.allows(Remote));

        assert!(CheckpointAction::NoRemote.allows(Bridge));
        assert!(CheckpointAction::NoRemote.allows(Decrypted));
        assert!(!CheckpointAction::NoRemote.allows(Remote));
    }

    #[test]
    fn test_deferred_override() {
        assert_eq!(deferred_override("nostatus"), None);
        assert_eq!(deferred_override("next"), None);
        assert_eq!(
            deferred_override("next nostatus"),
            Some(PendingOverride {
                mss: MssAction::NoStatus,
                checkpoint: CheckpointAction::Success,
            })
        );
        assert_eq!(
            deferred_override("next noremote"),
            Some(PendingOverride {
                mss: MssAction::Success,
                checkpoint: CheckpointAction::NoRemote,
            })
        );
        assert_eq!(
            deferred_override("next success"),
            Some(PendingOverride {
                mss: MssAction::Success,
                checkpoint: CheckpointAction::Success,
            })
        );
    }
}
