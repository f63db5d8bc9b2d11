//! Report domain model.

use crate::framework::FrameworkId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One rendered section of a session report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportSection {
    pub title: String,
    pub body: String,
}

/// A structured, human-readable report synthesized from a closed session's
/// reflection history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Report {
    pub framework_id: FrameworkId,
    pub generated_at: DateTime<Utc>,
    pub sections: Vec<ReportSection>,
}

impl Report {
    /// Renders the report as markdown.
    pub fn to_markdown(&self) -> String {
        let mut out = String::new();
        for section in &self.sections {
            out.push_str("## ");
            out.push_str(&section.title);
            out.push_str("\n\n");
            out.push_str(&section.body);
            out.push_str("\n\n");
        }
        out.trim_end().to_string()
    }
}
