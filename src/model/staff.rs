use serde::{Deserialize, Serialize};

/// Row of the externally provisioned `Staff` table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Staff {
    pub tag_id: String,
    #[sqlx(rename = "Name")]
    pub name: String,
    pub department: Option<String>,
}

/// Tag to name binding in the `sign` table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Assignment {
    pub tag_id: String,
    #[sqlx(rename = "Name")]
    pub name: String,
}

/// A scanned tag that resolved to a staff member.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub tag_id: String,
    pub name: String,
}
