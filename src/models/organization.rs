use serde::{Deserialize, Serialize};

/// Tenant boundary. Everything below a project resolves up to exactly one
/// organization, and no operation may cross that line.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Organization {
    pub id: String,
    pub name: String,
    pub created_at: i64,
    pub updated_at: i64,
}

#[derive(Debug, Deserialize)]
pub struct CreateOrganization {
    pub name: String,
}
