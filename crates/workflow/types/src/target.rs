//! Typed references to workflow targets

use serde::{Deserialize, Serialize};

/// The kind of content item a workflow can be attached to
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TargetKind {
    Page,
    Document,
    Asset,
}

impl std::fmt::Display for TargetKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TargetKind::Page => write!(f, "page"),
            TargetKind::Document => write!(f, "document"),
            TargetKind::Asset => write!(f, "asset"),
        }
    }
}

/// Reference to the content item a workflow instance is attached to.
///
/// The `(kind, id)` pair is the whole identity of a target; the engine
/// never resolves a target by anything else.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TargetRef {
    pub kind: TargetKind,
    pub id: String,
}

impl TargetRef {
    pub fn new(kind: TargetKind, id: impl Into<String>) -> Self {
        Self {
            kind,
            id: id.into(),
        }
    }

    pub fn page(id: impl Into<String>) -> Self {
        Self::new(TargetKind::Page, id)
    }

    pub fn document(id: impl Into<String>) -> Self {
        Self::new(TargetKind::Document, id)
    }

    pub fn asset(id: impl Into<String>) -> Self {
        Self::new(TargetKind::Asset, id)
    }
}

impl std::fmt::Display for TargetRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}#{}", self.kind, self.id)
    }
}
