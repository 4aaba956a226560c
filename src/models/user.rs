use serde::{Deserialize, Serialize};

use crate::error::{msg, AppError, Result};

/// Basic email format validation.
///
/// Intentionally permissive - one @, non-empty local part, domain with a dot.
/// Not meant to be RFC 5322 compliant, just a sanity check before insert.
fn validate_email_format(email: &str) -> Result<()> {
    let email = email.trim();

    if email.is_empty() {
        return Err(AppError::BadRequest(msg::EMAIL_EMPTY.into()));
    }

    let parts: Vec<&str> = email.split('@').collect();
    if parts.len() != 2 {
        return Err(AppError::BadRequest(msg::INVALID_EMAIL_FORMAT.into()));
    }

    let (local, domain) = (parts[0], parts[1]);
    if local.is_empty() || local.contains(' ') {
        return Err(AppError::BadRequest(msg::INVALID_EMAIL_FORMAT.into()));
    }
    if domain.is_empty()
        || !domain.contains('.')
        || domain.starts_with('.')
        || domain.ends_with('.')
    {
        return Err(AppError::BadRequest(msg::INVALID_EMAIL_FORMAT.into()));
    }

    Ok(())
}

/// Roles a user can hold. Not mutually exclusive - a user holds a set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Role {
    Admin,
    Qa,
    Ba,
    Tester,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "ADMIN",
            Role::Qa => "QA",
            Role::Ba => "BA",
            Role::Tester => "TESTER",
        }
    }
}

impl std::str::FromStr for Role {
    type Err = ();

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "ADMIN" => Ok(Role::Admin),
            "QA" => Ok(Role::Qa),
            "BA" => Ok(Role::Ba),
            "TESTER" => Ok(Role::Tester),
            _ => Err(()),
        }
    }
}

/// Roles that may be assigned to a project.
pub const PROJECT_ASSIGNABLE_ROLES: &[Role] = &[Role::Qa, Role::Ba];

/// Roles that may be assigned to a module (and act as execution assignees).
pub const MODULE_ASSIGNABLE_ROLES: &[Role] = &[Role::Qa, Role::Ba, Role::Tester];

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub org_id: String,
    pub email: String,
    pub name: String,
    pub roles: Vec<Role>,
    pub created_at: i64,
    pub updated_at: i64,
}

impl User {
    pub fn has_role(&self, role: Role) -> bool {
        self.roles.contains(&role)
    }
}

#[derive(Debug, Deserialize)]
pub struct CreateUser {
    pub email: String,
    pub name: String,
    pub roles: Vec<Role>,
}

impl CreateUser {
    pub fn validate(&self) -> Result<()> {
        validate_email_format(&self.email)?;
        if self.name.trim().is_empty() {
            return Err(AppError::BadRequest(msg::NAME_EMPTY.into()));
        }
        if self.roles.is_empty() {
            return Err(AppError::BadRequest(msg::ROLES_EMPTY.into()));
        }
        Ok(())
    }
}

/// The resolved acting principal for one request.
///
/// Built once by the identity middleware and passed explicitly into every
/// authorization check; nothing downstream re-derives identity.
#[derive(Debug, Clone, Serialize)]
pub struct CurrentUser {
    pub id: String,
    pub org_id: String,
    pub roles: Vec<Role>,
    pub assigned_project_ids: Vec<String>,
    pub assigned_module_ids: Vec<String>,
}

impl CurrentUser {
    pub fn is_admin(&self) -> bool {
        self.roles.contains(&Role::Admin)
    }

    pub fn has_role(&self, role: Role) -> bool {
        self.roles.contains(&role)
    }

    pub fn is_assigned_to_project(&self, project_id: &str) -> bool {
        self.assigned_project_ids.iter().any(|p| p == project_id)
    }

    pub fn is_assigned_to_module(&self, module_id: &str) -> bool {
        self.assigned_module_ids.iter().any(|m| m == module_id)
    }
}
