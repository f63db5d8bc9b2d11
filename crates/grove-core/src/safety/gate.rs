//! Keyword safety gate.
//!
//! Two independent, case-insensitive substring scans: the escalation list is
//! applied to raw user input before any model call; the banned-output list is
//! applied to model output by the generation pipeline's local re-scan. The
//! gate is unconditional and cannot be bypassed by schema design.

use once_cell::sync::Lazy;

/// Vocabulary that requires escalating the session to human review.
static ESCALATION_TERMS: Lazy<Vec<&'static str>> = Lazy::new(|| {
    vec![
        "harassment",
        "harassing me",
        "discrimination",
        "discriminated against",
        "abuse",
        "abusive",
        "bullying",
        "threat",
        "threatening",
        "violence",
        "violent",
        "assault",
        "stalking",
        "self-harm",
        "hurt myself",
        "kill myself",
        "suicide",
        "suicidal",
        "explicit content",
        "sexual content",
    ]
});

/// Vocabulary a generated coaching reply must never contain.
static BANNED_OUTPUT_TERMS: Lazy<Vec<&'static str>> = Lazy::new(|| {
    vec![
        "diagnose",
        "diagnosis",
        "disorder",
        "prescribe",
        "prescription",
        "medication",
        "therapy session",
        "clinical",
        "lawsuit",
        "legal advice",
        "guaranteed results",
        "you should quit your job",
        "trust me",
    ]
});

/// Result of scanning a piece of text.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SafetyVerdict {
    /// An escalation term matched; the session must be flagged.
    pub escalate: bool,
    /// A banned-output term matched; the content must not reach the user.
    pub banned: bool,
    /// Every term that matched, in list order, escalation terms first.
    pub matched: Vec<String>,
}

impl SafetyVerdict {
    /// Whether the text passed both scans.
    pub fn is_clean(&self) -> bool {
        !self.escalate && !self.banned
    }
}

/// The keyword gate. Construct once and share; scanning is pure.
#[derive(Debug, Clone)]
pub struct SafetyGate {
    escalation_terms: Vec<&'static str>,
    banned_terms: Vec<&'static str>,
}

impl Default for SafetyGate {
    fn default() -> Self {
        Self {
            escalation_terms: ESCALATION_TERMS.clone(),
            banned_terms: BANNED_OUTPUT_TERMS.clone(),
        }
    }
}

impl SafetyGate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a gate with custom term lists. Intended for tests.
    pub fn with_terms(
        escalation_terms: Vec<&'static str>,
        banned_terms: Vec<&'static str>,
    ) -> Self {
        Self {
            escalation_terms,
            banned_terms,
        }
    }

    /// Scans `text` against both lists.
    ///
    /// Matching is case-insensitive substring containment, so the verdict is
    /// identical for any casing of the same text.
    pub fn check(&self, text: &str) -> SafetyVerdict {
        let lowered = text.to_lowercase();
        let mut verdict = SafetyVerdict::default();
        for term in &self.escalation_terms {
            if lowered.contains(term) {
                verdict.escalate = true;
                verdict.matched.push((*term).to_string());
            }
        }
        for term in &self.banned_terms {
            if lowered.contains(term) {
                verdict.banned = true;
                verdict.matched.push((*term).to_string());
            }
        }
        verdict
    }
}
