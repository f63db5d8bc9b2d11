//! Shared test doubles for the use-case tests.

use async_trait::async_trait;
use grove_core::framework::{FrameworkCatalog, FrameworkId, Step, StepName};
use grove_core::llm::{CompletionRequest, LanguageModel, ModelError};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

/// A validator completion that waves everything through.
pub(crate) const PASS_VERDICT: &str = r#"{"verdict": "pass", "reasons": []}"#;

/// A model double that replays a scripted sequence of completions and
/// records every request it received.
pub(crate) struct ScriptedModel {
    responses: Mutex<VecDeque<Result<String, ModelError>>>,
    requests: Arc<Mutex<Vec<CompletionRequest>>>,
}

impl ScriptedModel {
    pub(crate) fn new() -> Self {
        Self {
            responses: Mutex::new(VecDeque::new()),
            requests: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub(crate) fn push_ok(self, text: &str) -> Self {
        self.responses.lock().unwrap().push_back(Ok(text.to_string()));
        self
    }

    pub(crate) fn push_err(self, err: ModelError) -> Self {
        self.responses.lock().unwrap().push_back(Err(err));
        self
    }

    /// Handle onto the recorded requests, usable after the model is moved
    /// into an `Arc<dyn LanguageModel>`.
    pub(crate) fn requests(&self) -> Arc<Mutex<Vec<CompletionRequest>>> {
        self.requests.clone()
    }

    /// How many scripted responses were never consumed.
    pub(crate) fn remaining(&self) -> usize {
        self.responses.lock().unwrap().len()
    }
}

#[async_trait]
impl LanguageModel for ScriptedModel {
    async fn complete(&self, request: CompletionRequest) -> Result<String, ModelError> {
        self.requests.lock().unwrap().push(request);
        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .expect("scripted model exhausted")
    }
}

/// The built-in GROW goal step, cloned for standalone use.
pub(crate) fn goal_step() -> Step {
    FrameworkCatalog::builtin()
        .get(FrameworkId::Grow)
        .unwrap()
        .step(StepName::Goal)
        .unwrap()
        .clone()
}
