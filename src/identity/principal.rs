use serde::{Deserialize, Serialize};

/// Serialized user snapshot as it lives in a session record. The relational
/// user store behind it is an external collaborator; only the shape that
/// sessions carry is modeled here.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct UserSnapshot {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
}

impl UserSnapshot {
    pub fn new<S: Into<String>>(id: S) -> Self {
        Self { id: id.into(), name: None, email: None }
    }
}

/// Per-request representation of the authenticated caller. Constructed fresh
/// by the session middleware, never persisted, discarded at request end.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Principal {
    pub user: UserSnapshot,
    pub authenticated: bool,
    pub session_id: String,
}
