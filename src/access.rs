//! Authorization predicates.
//!
//! Every state-reading or state-changing operation guards itself with these
//! three composable checks, in order:
//!
//! 1. organization boundary (`require_same_org`) - absolute, even for admins;
//! 2. role check (`require_role`) - ADMIN implicitly satisfies any role set;
//! 3. entity access (`require_module_write` / `require_execution_actor`) -
//!    assignment-based access for entities below Project.
//!
//! Read access is deliberately broader than write access: any user in the
//! organization may view the tree, while writes require ADMIN or an assigned
//! QA/BA, and execution mutation requires ADMIN, the assigned executor, or a
//! module assignee. Collapsing that asymmetry into one check is a bug.
//!
//! Cross-organization lookups surface as `NotFound`, indistinguishable from
//! a genuinely absent entity, so tenants cannot probe each other's ids.

use rusqlite::Connection;

use crate::db::queries::{self, OwnerScope};
use crate::error::{msg, AppError, Result};
use crate::models::{
    CurrentUser, Role, TestExecution, User, MODULE_ASSIGNABLE_ROLES, PROJECT_ASSIGNABLE_ROLES,
};

/// The outermost boundary: the target's resolved organization must match the
/// acting user's. Not negotiable for any role.
pub fn require_same_org(user: &CurrentUser, target_org_id: &str) -> Result<()> {
    if user.org_id == target_org_id {
        Ok(())
    } else {
        // Indistinguishable from absence on purpose.
        Err(AppError::NotFound(msg::ORG_NOT_FOUND.into()))
    }
}

/// The user must hold at least one of `allowed`. ADMIN passes every check.
pub fn require_role(user: &CurrentUser, allowed: &[Role]) -> Result<()> {
    if user.is_admin() || allowed.iter().any(|r| user.has_role(*r)) {
        Ok(())
    } else {
        Err(AppError::AccessDenied(msg::INSUFFICIENT_ROLE.into()))
    }
}

/// ADMIN-only gate for structural deletes of projects and modules.
pub fn require_admin(user: &CurrentUser) -> Result<()> {
    if user.is_admin() {
        Ok(())
    } else {
        Err(AppError::AccessDenied(msg::INSUFFICIENT_ROLE.into()))
    }
}

/// Write access below Project: ADMIN, or QA/BA assigned to the owning module
/// or its project. The org boundary is checked first.
pub fn require_module_write(user: &CurrentUser, scope: &OwnerScope) -> Result<()> {
    require_same_org(user, &scope.org_id)?;
    if user.is_admin() {
        return Ok(());
    }
    if !(user.has_role(Role::Qa) || user.has_role(Role::Ba)) {
        return Err(AppError::AccessDenied(msg::INSUFFICIENT_ROLE.into()));
    }
    if user.is_assigned_to_project(&scope.project_id)
        || user.is_assigned_to_module(&scope.module_id)
    {
        Ok(())
    } else {
        Err(AppError::AccessDenied(msg::NOT_ASSIGNED.into()))
    }
}

/// Write access at project level (e.g. creating modules): ADMIN, or QA/BA
/// assigned to the project itself.
pub fn require_project_write(user: &CurrentUser, org_id: &str, project_id: &str) -> Result<()> {
    require_same_org(user, org_id)?;
    if user.is_admin() {
        return Ok(());
    }
    if !(user.has_role(Role::Qa) || user.has_role(Role::Ba)) {
        return Err(AppError::AccessDenied(msg::INSUFFICIENT_ROLE.into()));
    }
    if user.is_assigned_to_project(project_id) {
        Ok(())
    } else {
        Err(AppError::AccessDenied(msg::NOT_ASSIGNED.into()))
    }
}

/// Creation of executions: ADMIN or anyone assigned under the owning module
/// or project, whatever their role.
pub fn require_execution_create(user: &CurrentUser, scope: &OwnerScope) -> Result<()> {
    require_same_org(user, &scope.org_id)?;
    if user.is_admin()
        || user.is_assigned_to_module(&scope.module_id)
        || user.is_assigned_to_project(&scope.project_id)
    {
        Ok(())
    } else {
        Err(AppError::AccessDenied(msg::NOT_ASSIGNED.into()))
    }
}

/// Read access: any user inside the organization may view the tree.
pub fn require_read(user: &CurrentUser, target_org_id: &str) -> Result<()> {
    require_same_org(user, target_org_id)
}

/// Who may mutate an execution: ADMIN, its assigned user, or anyone holding
/// an assignment to the owning module. Module assignment grants this access
/// uniformly, whatever role the assignee was granted under.
pub fn require_execution_actor(
    user: &CurrentUser,
    scope: &OwnerScope,
    execution: &TestExecution,
) -> Result<()> {
    require_same_org(user, &scope.org_id)?;
    if user.is_admin() {
        return Ok(());
    }
    if execution.assigned_user_id.as_deref() == Some(user.id.as_str()) {
        return Ok(());
    }
    if user.is_assigned_to_module(&scope.module_id) {
        return Ok(());
    }
    Err(AppError::AccessDenied(msg::NOT_EXECUTION_ACTOR.into()))
}

/// The target of a project assignment must hold QA or BA.
pub fn require_project_assignable(target: &User) -> Result<()> {
    if PROJECT_ASSIGNABLE_ROLES.iter().any(|r| target.has_role(*r)) {
        Ok(())
    } else {
        Err(AppError::AccessDenied(msg::ASSIGNEE_ROLE_REQUIRED.into()))
    }
}

/// The target of a module assignment (or execution assignment) must hold
/// QA, BA, or TESTER.
pub fn require_module_assignable(target: &User) -> Result<()> {
    if MODULE_ASSIGNABLE_ROLES.iter().any(|r| target.has_role(*r)) {
        Ok(())
    } else {
        Err(AppError::AccessDenied(msg::ASSIGNEE_ROLE_REQUIRED.into()))
    }
}

/// Resolve a module-or-below entity's scope and check the org boundary in one
/// step, mapping both "absent" and "wrong org" to the same `NotFound`.
pub fn resolve_scope_checked(
    conn: &Connection,
    user: &CurrentUser,
    resolve: impl FnOnce(&Connection) -> Result<Option<OwnerScope>>,
    not_found: &str,
) -> Result<OwnerScope> {
    let scope = resolve(conn)?.ok_or_else(|| AppError::NotFound(not_found.to_string()))?;
    if scope.org_id != user.org_id {
        return Err(AppError::NotFound(not_found.to_string()));
    }
    Ok(scope)
}

/// Load a same-org user or fail with `NotFound` (never reveal foreign users).
pub fn load_same_org_user(
    conn: &Connection,
    user: &CurrentUser,
    target_user_id: &str,
) -> Result<User> {
    let target = queries::get_user_by_id(conn, target_user_id)?
        .ok_or_else(|| AppError::NotFound(msg::USER_NOT_FOUND.into()))?;
    if target.org_id != user.org_id {
        return Err(AppError::NotFound(msg::USER_NOT_FOUND.into()));
    }
    Ok(target)
}
