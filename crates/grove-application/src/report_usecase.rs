//! Report generation over closed sessions.

use grove_core::error::{GroveError, Result};
use grove_core::framework::FrameworkCatalog;
use grove_core::reflection::ReflectionRepository;
use grove_core::report::{Report, synthesize};
use grove_core::session::SessionRepository;
use std::sync::Arc;

/// Loads a closed session's history and synthesizes its report.
///
/// The underlying synthesizer never fails for missing data; this use case
/// fails only when the session is missing or still open; reports are a
/// post-closure artifact.
pub struct ReportUseCase {
    catalog: Arc<FrameworkCatalog>,
    sessions: Arc<dyn SessionRepository>,
    reflections: Arc<dyn ReflectionRepository>,
}

impl ReportUseCase {
    pub fn new(
        catalog: Arc<FrameworkCatalog>,
        sessions: Arc<dyn SessionRepository>,
        reflections: Arc<dyn ReflectionRepository>,
    ) -> Self {
        Self {
            catalog,
            sessions,
            reflections,
        }
    }

    pub async fn generate(&self, session_id: &str) -> Result<Report> {
        let session = self
            .sessions
            .find_by_id(session_id)
            .await?
            .ok_or_else(|| GroveError::not_found("Session", session_id))?;
        if !session.is_closed() {
            return Err(GroveError::invalid_state(format!(
                "session '{session_id}' is still open"
            )));
        }
        let framework = self.catalog.get(session.framework_id)?;
        let history = self.reflections.list_for_session(session_id).await?;
        Ok(synthesize(framework, &history))
    }
}
