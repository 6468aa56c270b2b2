//! Artifacts and their sections
//!
//! Sections are produced by the document parser (an external collaborator) and
//! are immutable once handed to the orchestrator.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use uuid::Uuid;

/// Named, ordered chunk of an artifact's content
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Section {
    pub heading: String,
    pub content: String,
    /// Presentation sequence, unique within an artifact
    pub order: u32,
}

impl Section {
    pub fn new(heading: impl Into<String>, content: impl Into<String>, order: u32) -> Self {
        Self {
            heading: heading.into(),
            content: content.into(),
            order,
        }
    }
}

/// Generated document with its ordered sections
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Artifact {
    pub artifact_id: Uuid,
    pub title: String,
    pub sections: Vec<Section>,
}

/// Check the section source contract: unique `order`, non-empty `heading`
pub fn validate_sections(sections: &[Section]) -> Result<(), String> {
    let mut seen = HashSet::new();
    for section in sections {
        if section.heading.trim().is_empty() {
            return Err(format!("Section {} has an empty heading", section.order));
        }
        if !seen.insert(section.order) {
            return Err(format!("Duplicate section order: {}", section.order));
        }
    }
    Ok(())
}
