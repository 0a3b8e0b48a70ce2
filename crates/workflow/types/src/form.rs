//! Action form schemas and submissions
//!
//! Every action declares the fields it collects. Submitted data is filtered
//! through that schema: unknown keys are dropped, and values of the wrong
//! type are rejected before anything is written.

use chrono::DateTime;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

// ── Field Specs ──────────────────────────────────────────────────────

/// The value type a form field accepts
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldKind {
    Text,
    Boolean,
    Number,
    /// RFC 3339 timestamp string
    DateTime,
}

impl FieldKind {
    /// Whether a submitted JSON value has this kind. `null` clears a field
    /// and is accepted for every kind.
    pub fn accepts(&self, value: &Value) -> bool {
        match (self, value) {
            (_, Value::Null) => true,
            (FieldKind::Text, Value::String(_)) => true,
            (FieldKind::Boolean, Value::Bool(_)) => true,
            (FieldKind::Number, Value::Number(_)) => true,
            (FieldKind::DateTime, Value::String(s)) => DateTime::parse_from_rfc3339(s).is_ok(),
            _ => false,
        }
    }
}

impl std::fmt::Display for FieldKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FieldKind::Text => write!(f, "text"),
            FieldKind::Boolean => write!(f, "boolean"),
            FieldKind::Number => write!(f, "number"),
            FieldKind::DateTime => write!(f, "datetime"),
        }
    }
}

/// A single field collected by an action
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FieldSpec {
    pub name: String,
    pub kind: FieldKind,
    #[serde(default)]
    pub required: bool,
}

impl FieldSpec {
    pub fn new(name: impl Into<String>, kind: FieldKind) -> Self {
        Self {
            name: name.into(),
            kind,
            required: false,
        }
    }

    pub fn text(name: impl Into<String>) -> Self {
        Self::new(name, FieldKind::Text)
    }

    pub fn boolean(name: impl Into<String>) -> Self {
        Self::new(name, FieldKind::Boolean)
    }

    pub fn number(name: impl Into<String>) -> Self {
        Self::new(name, FieldKind::Number)
    }

    pub fn datetime(name: impl Into<String>) -> Self {
        Self::new(name, FieldKind::DateTime)
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }
}

/// Rejection of a submitted value
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("field '{field}' expects a {expected} value")]
pub struct FieldError {
    pub field: String,
    pub expected: FieldKind,
}

// ── Form Schema ──────────────────────────────────────────────────────

/// The explicit set of fields an action collects
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct FormSchema {
    #[serde(default)]
    pub fields: Vec<FieldSpec>,
}

impl FormSchema {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_field(mut self, field: FieldSpec) -> Self {
        self.fields.retain(|f| f.name != field.name);
        self.fields.push(field);
        self
    }

    pub fn field(&self, name: &str) -> Option<&FieldSpec> {
        self.fields.iter().find(|f| f.name == name)
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Keep only declared fields, checking each value against its kind.
    pub fn filter(&self, submitted: &BTreeMap<String, Value>) -> Result<BTreeMap<String, Value>, FieldError> {
        let mut accepted = BTreeMap::new();
        for (name, value) in submitted {
            let Some(spec) = self.field(name) else {
                continue;
            };
            if !spec.kind.accepts(value) {
                return Err(FieldError {
                    field: name.clone(),
                    expected: spec.kind,
                });
            }
            accepted.insert(name.clone(), value.clone());
        }
        Ok(accepted)
    }

    /// Every required field holds a non-null, non-blank value.
    pub fn required_fields_present(&self, data: &BTreeMap<String, Value>) -> bool {
        self.fields.iter().filter(|f| f.required).all(|f| match data.get(&f.name) {
            None | Some(Value::Null) => false,
            Some(Value::String(s)) => !s.trim().is_empty(),
            Some(_) => true,
        })
    }
}

// ── Submission ───────────────────────────────────────────────────────

/// Data sent along with a transition, evaluation or approval
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Submission {
    #[serde(default)]
    pub fields: BTreeMap<String, Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
}

impl Submission {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_field(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.fields.insert(name.into(), value.into());
        self
    }

    pub fn with_comment(mut self, comment: impl Into<String>) -> Self {
        self.comment = Some(comment.into());
        self
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty() && self.comment.is_none()
    }
}
