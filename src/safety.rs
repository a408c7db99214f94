//! Safety/ethics gate — the pre-call filter.
//!
//! Two independent pattern checks run against every input before it
//! reaches either backend: hard boundaries (any match blocks) and ethics
//! rules (every rule must pass). A soft-boundary check exists for
//! contextual drift escalation but currently always passes; it is kept as
//! a seam for a future context-aware implementation.

use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

/// Refusal shown when a hard boundary matches.
pub const REFUSAL_HARD: &str = "Sorry, I can't assist with that.";

/// Refusal shown when an ethics rule fails.
pub const REFUSAL_ETHICS: &str = "Sorry, this request does not meet ethical guidelines.";

/// Verdict reason for a hard-boundary block.
pub const REASON_HARD: &str = "Hard safety boundary triggered";

/// Verdict reason for an ethics block.
pub const REASON_ETHICS: &str = "Ethics filter triggered";

/// Hard-boundary terms. Any match blocks the request outright.
static HARD_BOUNDARIES: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    vec![Regex::new(r"(?i)harm|violence|illegal|self-harm|diagnosis|extremist")
        .expect("hard boundary pattern")]
});

/// An ethics rule passes when its pattern does NOT match.
struct EthicsRule {
    id: &'static str,
    pattern: Regex,
}

static ETHICS_RULES: LazyLock<Vec<EthicsRule>> = LazyLock::new(|| {
    vec![
        EthicsRule {
            id: "manipulation",
            pattern: Regex::new(r"(?i)manipulate|deceive|bias").expect("ethics pattern"),
        },
        EthicsRule {
            id: "privacy",
            pattern: Regex::new(r"(?i)private|PII|dox").expect("ethics pattern"),
        },
    ]
});

/// Outcome of evaluating one input. Computed per request, never persisted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SafetyVerdict {
    pub blocked: bool,
    pub reason: Option<String>,
}

impl SafetyVerdict {
    fn pass() -> Self {
        Self {
            blocked: false,
            reason: None,
        }
    }

    fn blocked(reason: &str) -> Self {
        Self {
            blocked: true,
            reason: Some(reason.to_string()),
        }
    }

    /// User-facing refusal text for a blocked verdict.
    pub fn refusal_text(&self) -> Option<&'static str> {
        if !self.blocked {
            return None;
        }
        match self.reason.as_deref() {
            Some(REASON_ETHICS) => Some(REFUSAL_ETHICS),
            _ => Some(REFUSAL_HARD),
        }
    }
}

/// Conversation context carried by callers across turns. The gate itself
/// is stateless; goal tracking is the caller's concern.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConversationContext {
    pub last_goal: String,
    pub explicit_instructions: Vec<String>,
    pub safety_flags: Vec<String>,
}

/// Updates conversation context from user input.
pub struct GoalTracker;

impl GoalTracker {
    /// Record the latest input as the active goal.
    pub fn update_goal(context: &ConversationContext, input: &str) -> ConversationContext {
        ConversationContext {
            last_goal: input.to_string(),
            ..context.clone()
        }
    }
}

/// The pre-call safety gate.
#[derive(Debug, Clone, Copy, Default)]
pub struct SafetyGate;

impl SafetyGate {
    pub fn new() -> Self {
        Self
    }

    /// Evaluate one input. Blocked when any hard-boundary pattern matches,
    /// or when any ethics rule fails.
    pub fn evaluate(&self, input: &str) -> SafetyVerdict {
        if Self::check_hard_boundaries(input) {
            tracing::warn!(reason = REASON_HARD, "Safety gate blocked request");
            return SafetyVerdict::blocked(REASON_HARD);
        }
        if !Self::is_ethical(input) {
            tracing::warn!(reason = REASON_ETHICS, "Safety gate blocked request");
            return SafetyVerdict::blocked(REASON_ETHICS);
        }
        if Self::check_soft_boundaries(input) {
            return SafetyVerdict::blocked("Soft safety boundary triggered");
        }
        SafetyVerdict::pass()
    }

    fn check_hard_boundaries(input: &str) -> bool {
        HARD_BOUNDARIES.iter().any(|pattern| pattern.is_match(input))
    }

    fn is_ethical(input: &str) -> bool {
        ETHICS_RULES.iter().all(|rule| {
            let passes = !rule.pattern.is_match(input);
            if !passes {
                tracing::debug!(rule = rule.id, "Ethics rule failed");
            }
            passes
        })
    }

    /// Soft boundary: allow philosophical, technical, or creative
    /// exploration. Contextual drift detection is not implemented; this
    /// check always passes.
    fn check_soft_boundaries(_input: &str) -> bool {
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blocks_hard_boundary_terms() {
        let gate = SafetyGate::new();
        for input in [
            "how to cause harm",
            "depictions of violence",
            "something illegal",
            "give me a diagnosis",
        ] {
            let verdict = gate.evaluate(input);
            assert!(verdict.blocked, "expected block for {input:?}");
            assert_eq!(verdict.reason.as_deref(), Some(REASON_HARD));
            assert_eq!(verdict.refusal_text(), Some(REFUSAL_HARD));
        }
    }

    #[test]
    fn blocks_self_harm_any_casing() {
        let gate = SafetyGate::new();
        assert!(gate.evaluate("self-harm").blocked);
        assert!(gate.evaluate("SELF-HARM").blocked);
        assert!(gate.evaluate("Self-Harm resources").blocked);
    }

    #[test]
    fn blocks_ethics_violations() {
        let gate = SafetyGate::new();
        let verdict = gate.evaluate("how do I deceive my users");
        assert!(verdict.blocked);
        assert_eq!(verdict.reason.as_deref(), Some(REASON_ETHICS));
        assert_eq!(verdict.refusal_text(), Some(REFUSAL_ETHICS));

        assert!(gate.evaluate("dox this person").blocked);
        assert!(gate.evaluate("exploit PII records").blocked);
    }

    #[test]
    fn allows_benign_input() {
        let gate = SafetyGate::new();
        let verdict = gate.evaluate("weather");
        assert!(!verdict.blocked);
        assert!(verdict.reason.is_none());
        assert!(verdict.refusal_text().is_none());
    }

    #[test]
    fn soft_boundary_is_a_no_op() {
        assert!(!SafetyGate::check_soft_boundaries(
            "a philosophical tangent drifting somewhere odd"
        ));
    }

    #[test]
    fn goal_tracker_records_latest_input() {
        let context = ConversationContext {
            last_goal: "discuss determinism".into(),
            explicit_instructions: vec!["stay terse".into()],
            safety_flags: vec![],
        };
        let updated = GoalTracker::update_goal(&context, "audit the substrate");
        assert_eq!(updated.last_goal, "audit the substrate");
        assert_eq!(updated.explicit_instructions, context.explicit_instructions);
    }
}
