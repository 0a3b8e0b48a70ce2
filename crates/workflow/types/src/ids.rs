//! String-backed identifiers
//!
//! Every identifier is an opaque string newtype. Generated identifiers are
//! UUID v4; host-supplied identifiers (actors, hand-written action ids in
//! templates) are kept verbatim.

use serde::{Deserialize, Serialize};

macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        pub struct $name(pub String);

        impl $name {
            pub fn generate() -> Self {
                Self(uuid::Uuid::new_v4().to_string())
            }

            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }

            pub fn short(&self) -> &str {
                match self.0.char_indices().nth(8) {
                    Some((end, _)) => &self.0[..end],
                    None => &self.0,
                }
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<&str> for $name {
            fn from(id: &str) -> Self {
                Self::new(id)
            }
        }
    };
}

string_id!(
    /// Unique identifier for a workflow definition
    WorkflowDefinitionId
);

string_id!(
    /// Identifier of an action, unique within its definition
    ActionId
);

string_id!(
    /// Identifier of a transition, unique within its definition
    TransitionId
);

string_id!(
    /// Unique identifier for a workflow instance
    WorkflowInstanceId
);

string_id!(
    /// Unique identifier for one recorded visit to an action
    ActionInstanceId
);

string_id!(
    /// Identifier of a user or service principal
    ActorId
);

string_id!(
    /// Unique identifier for a scheduled job
    JobId
);
