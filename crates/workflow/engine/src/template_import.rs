//! Imports workflow templates from JSON documents

use crate::error::{EngineError, EngineResult};
use crate::storage::{StorageError, WorkflowStorage};
use approval_workflow_types::{ImportedTemplate, WorkflowTemplate};
use std::sync::Arc;

/// Turns uploaded template files into registered definitions
#[derive(Clone)]
pub struct TemplateImporter {
    storage: Arc<dyn WorkflowStorage>,
}

impl TemplateImporter {
    pub fn new(storage: Arc<dyn WorkflowStorage>) -> Self {
        Self { storage }
    }

    /// Parse `content`, register the definition it describes and keep the
    /// raw document under `name`. The record and the definition are stored
    /// in one write, so a rejected import leaves neither behind.
    pub async fn import(&self, name: &str, filename: &str, content: &str) -> EngineResult<ImportedTemplate> {
        if self.storage.get_template(name).await?.is_some() {
            return Err(EngineError::InvalidDefinition(format!(
                "template {name} was already imported"
            )));
        }

        let definition = WorkflowTemplate::from_json(content)?
            .into_definition()
            .map_err(|e| EngineError::InvalidDefinition(e.to_string()))?;

        let record = ImportedTemplate::new(name, filename, content, definition.id.clone());
        self.storage
            .insert_template(record.clone(), definition)
            .await
            .map_err(|e| match e {
                StorageError::Conflict(msg) => EngineError::InvalidDefinition(msg),
                other => other.into(),
            })?;

        tracing::info!(
            template = name,
            filename,
            definition_id = %record.definition_id,
            "Workflow template imported"
        );
        Ok(record)
    }

    pub async fn templates(&self) -> EngineResult<Vec<ImportedTemplate>> {
        Ok(self.storage.list_templates().await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::definition_store::DefinitionStore;
    use crate::ports::InMemoryTargetDirectory;
    use crate::storage::InMemoryWorkflowStorage;

    const TEMPLATE: &str = r#"{
        "title": "Quick publish",
        "actions": [
            { "id": "draft", "title": "Draft", "kind": { "type": "step" }, "initial": true },
            { "id": "live", "title": "Live", "kind": { "type": "publish" } }
        ],
        "transitions": [
            { "id": "go", "title": "Go live", "source": "draft", "target": "live" }
        ]
    }"#;

    fn importer() -> (TemplateImporter, DefinitionStore) {
        let storage = Arc::new(InMemoryWorkflowStorage::new());
        let definitions = DefinitionStore::new(storage.clone(), Arc::new(InMemoryTargetDirectory::new()));
        (TemplateImporter::new(storage), definitions)
    }

    #[tokio::test]
    async fn test_import_registers_definition() {
        let (importer, definitions) = importer();
        let record = importer.import("quick", "quick.json", TEMPLATE).await.unwrap();
        let def = definitions.require(&record.definition_id).await.unwrap();
        assert_eq!(def.title, "Quick publish");
        assert_eq!(importer.templates().await.unwrap(), vec![record]);
    }

    #[tokio::test]
    async fn test_malformed_template_is_rejected() {
        let (importer, definitions) = importer();
        let err = importer.import("bad", "bad.json", "{").await.unwrap_err();
        assert!(matches!(err, EngineError::Definition(_)));
        assert!(definitions.get_definitions().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_invalid_graph_is_rejected() {
        let (importer, _) = importer();
        let json = r#"{ "title": "No start", "actions": [ { "id": "a", "title": "A", "kind": { "type": "step" } } ] }"#;
        let err = importer.import("nostart", "n.json", json).await.unwrap_err();
        assert!(matches!(err, EngineError::InvalidDefinition(_)));
        assert!(importer.templates().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_duplicate_name_is_rejected() {
        let (importer, definitions) = importer();
        importer.import("quick", "quick.json", TEMPLATE).await.unwrap();
        let err = importer.import("quick", "again.json", TEMPLATE).await.unwrap_err();
        assert!(matches!(err, EngineError::InvalidDefinition(_)));
        assert_eq!(definitions.get_definitions().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_racing_imports_leave_one_definition() {
        let (importer, definitions) = importer();
        let (a, b) = tokio::join!(
            importer.import("quick", "a.json", TEMPLATE),
            importer.import("quick", "b.json", TEMPLATE)
        );
        assert_eq!(a.is_ok() as usize + b.is_ok() as usize, 1);

        let templates = importer.templates().await.unwrap();
        assert_eq!(templates.len(), 1);
        let registered = definitions.get_definitions().await.unwrap();
        assert_eq!(registered.len(), 1);
        assert_eq!(registered[0].id, templates[0].definition_id);
    }
}
