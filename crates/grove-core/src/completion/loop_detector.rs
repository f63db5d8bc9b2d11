//! Repetition loop detection.
//!
//! Detects the situation where the coach keeps asking variations of a
//! question without the user answering in a way that changes captured state.
//! The heuristic is crude and expected to be replaced, so it sits behind a
//! named trait rather than inside the orchestrator.

use crate::framework::StepName;
use crate::reflection::Reflection;

/// Pluggable predicate deciding whether the conversation is stuck.
pub trait LoopDetector: Send + Sync {
    /// Whether a repetition loop is in progress for `step`.
    ///
    /// `history` is the session's full reflection history, ordered ascending
    /// by creation time.
    fn loop_detected(&self, history: &[Reflection], step: StepName) -> bool;
}

/// Window of recent reflections inspected per step.
const WINDOW: usize = 4;
/// How many of the windowed reflections must be system-authored.
const MIN_SYSTEM_AUTHORED: usize = 3;
/// Markers that make a coach message read as a question.
const INTERROGATIVE_MARKERS: [&str; 7] = ["?", "who", "what", "when", "where", "why", "how"];

/// Default detector: among the last four reflections for the active step, at
/// least three are system-authored (no accompanying user input) and every
/// system-authored one reads as a question.
#[derive(Debug, Clone, Copy, Default)]
pub struct QuestionLoopDetector;

impl QuestionLoopDetector {
    pub fn new() -> Self {
        Self
    }

    fn is_interrogative(text: &str) -> bool {
        let lowered = text.to_lowercase();
        INTERROGATIVE_MARKERS.iter().any(|m| lowered.contains(m))
    }
}

impl LoopDetector for QuestionLoopDetector {
    fn loop_detected(&self, history: &[Reflection], step: StepName) -> bool {
        let recent: Vec<&Reflection> = history
            .iter()
            .filter(|r| r.step() == step)
            .rev()
            .take(WINDOW)
            .collect();

        let system_authored: Vec<&&Reflection> =
            recent.iter().filter(|r| r.is_system_authored()).collect();
        if system_authored.len() < MIN_SYSTEM_AUTHORED {
            return false;
        }
        system_authored
            .iter()
            .all(|r| Self::is_interrogative(r.payload.coach_reflection()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reflection::StepPayload;

    fn system(step: StepName, text: &str) -> Reflection {
        Reflection::system_message("s-1", StepPayload::reflection_only(step, text))
    }

    fn turn(step: StepName, text: &str) -> Reflection {
        Reflection::from_turn("s-1", "a user answer", StepPayload::reflection_only(step, text))
    }

    #[test]
    fn three_unanswered_questions_declare_a_loop() {
        let history = vec![
            turn(StepName::Goal, "And when would you like to get there?"),
            system(StepName::Goal, "What timeframe feels realistic?"),
            system(StepName::Goal, "When would you want to have reached this?"),
            system(StepName::Goal, "How soon are you aiming for?"),
        ];
        assert!(QuestionLoopDetector::new().loop_detected(&history, StepName::Goal));
    }

    #[test]
    fn answered_turns_break_the_loop() {
        let history = vec![
            system(StepName::Goal, "What timeframe feels realistic?"),
            turn(StepName::Goal, "Good question."),
            system(StepName::Goal, "When would you want to have reached this?"),
            turn(StepName::Goal, "Let me think about that."),
        ];
        assert!(!QuestionLoopDetector::new().loop_detected(&history, StepName::Goal));
    }

    #[test]
    fn non_interrogative_system_messages_do_not_count_as_a_loop() {
        let history = vec![
            system(StepName::Goal, "Let's move on."),
            system(StepName::Goal, "Noted."),
            system(StepName::Goal, "Take your time."),
        ];
        assert!(!QuestionLoopDetector::new().loop_detected(&history, StepName::Goal));
    }

    #[test]
    fn only_the_active_step_is_inspected() {
        let history = vec![
            system(StepName::Reality, "What does today look like?"),
            system(StepName::Reality, "Where are you now?"),
            system(StepName::Reality, "How is it going?"),
        ];
        assert!(!QuestionLoopDetector::new().loop_detected(&history, StepName::Goal));
    }

    #[test]
    fn older_messages_fall_out_of_the_window() {
        let mut history = vec![
            system(StepName::Goal, "What's the goal?"),
            system(StepName::Goal, "What matters about it?"),
            system(StepName::Goal, "Why now?"),
        ];
        // Four answered turns push the questions out of the window.
        for _ in 0..4 {
            history.push(turn(StepName::Goal, "Here's an answer."));
        }
        assert!(!QuestionLoopDetector::new().loop_detected(&history, StepName::Goal));
    }
}
