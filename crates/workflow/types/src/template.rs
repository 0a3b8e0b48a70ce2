//! Workflow templates: the serialized import format for definitions
//!
//! A template is a JSON document describing one definition. Importing a
//! template builds and validates a fresh [`WorkflowDefinition`]; the raw
//! document is kept alongside as an [`ImportedTemplate`] record.

use crate::{
    WorkflowAction, WorkflowDefinition, WorkflowDefinitionId, WorkflowError, WorkflowResult,
    WorkflowTransition,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Serialized description of a workflow definition
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct WorkflowTemplate {
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub button_text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<u32>,
    pub actions: Vec<WorkflowAction>,
    #[serde(default)]
    pub transitions: Vec<WorkflowTransition>,
}

impl WorkflowTemplate {
    pub fn from_json(content: &str) -> WorkflowResult<Self> {
        serde_json::from_str(content).map_err(|e| WorkflowError::Template(e.to_string()))
    }

    pub fn to_json(&self) -> WorkflowResult<String> {
        serde_json::to_string_pretty(self).map_err(|e| WorkflowError::Template(e.to_string()))
    }

    /// Build a validated definition with a freshly generated id
    pub fn into_definition(self) -> WorkflowResult<WorkflowDefinition> {
        let mut definition = WorkflowDefinition::new(self.title)
            .with_description(self.description)
            .with_version(self.version.unwrap_or(1));
        definition.button_text = self.button_text;

        for action in self.actions {
            definition.add_action(action)?;
        }
        for transition in self.transitions {
            definition.add_transition(transition)?;
        }

        definition.validate()?;
        Ok(definition)
    }
}

impl From<&WorkflowDefinition> for WorkflowTemplate {
    fn from(definition: &WorkflowDefinition) -> Self {
        Self {
            title: definition.title.clone(),
            description: definition.description.clone(),
            button_text: definition.button_text.clone(),
            version: Some(definition.version),
            actions: definition.actions.clone(),
            transitions: definition.transitions.clone(),
        }
    }
}

/// Record of an imported template file
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ImportedTemplate {
    pub name: String,
    pub filename: String,
    /// The raw document as uploaded
    pub content: String,
    pub definition_id: WorkflowDefinitionId,
    pub imported_at: DateTime<Utc>,
}

impl ImportedTemplate {
    pub fn new(
        name: impl Into<String>,
        filename: impl Into<String>,
        content: impl Into<String>,
        definition_id: WorkflowDefinitionId,
    ) -> Self {
        Self {
            name: name.into(),
            filename: filename.into(),
            content: content.into(),
            definition_id,
            imported_at: Utc::now(),
        }
    }
}
