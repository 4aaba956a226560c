use serde::{Deserialize, Serialize};

use crate::error::{msg, AppError, Result};

/// A test module under a project. Modules are the unit of assignment-based
/// access: users gain shared responsibility for everything beneath one.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TestModule {
    pub id: String,
    pub project_id: String,
    pub name: String,
    pub created_at: i64,
    pub updated_at: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Submodule {
    pub id: String,
    pub module_id: String,
    pub name: String,
    pub created_at: i64,
    pub updated_at: i64,
}

#[derive(Debug, Deserialize)]
pub struct CreateModule {
    pub name: String,
}

impl CreateModule {
    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(AppError::BadRequest(msg::NAME_EMPTY.into()));
        }
        Ok(())
    }
}

#[derive(Debug, Deserialize)]
pub struct UpdateModule {
    pub name: Option<String>,
}

impl UpdateModule {
    pub fn validate(&self) -> Result<()> {
        if let Some(ref name) = self.name {
            if name.trim().is_empty() {
                return Err(AppError::BadRequest(msg::NAME_EMPTY.into()));
            }
        }
        Ok(())
    }
}
