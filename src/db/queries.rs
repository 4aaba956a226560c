use chrono::Utc;
use rusqlite::{params, types::Value, Connection, OptionalExtension};
use uuid::Uuid;

use crate::error::{msg, AppError, Result};
use crate::models::*;

use super::from_row::{
    query_all, query_one, FromRow, EXECUTION_COLS, MODULE_COLS, ORGANIZATION_COLS, PROJECT_COLS,
    STEP_RESULT_COLS, SUBMODULE_COLS, TEST_CASE_COLS, TEST_STEP_COLS, USER_COLS,
};

fn now() -> i64 {
    Utc::now().timestamp()
}

fn gen_id() -> String {
    Uuid::new_v4().to_string()
}

/// Map a SQLite unique-constraint failure to a domain `Conflict`.
fn map_unique(e: rusqlite::Error, conflict_msg: &str) -> AppError {
    match &e {
        rusqlite::Error::SqliteFailure(f, _)
            if f.code == rusqlite::ErrorCode::ConstraintViolation =>
        {
            AppError::Conflict(conflict_msg.to_string())
        }
        _ => AppError::Database(e),
    }
}

/// Builder for dynamic UPDATE statements with optional fields.
struct UpdateBuilder {
    table: &'static str,
    id: String,
    fields: Vec<(&'static str, Value)>,
}

impl UpdateBuilder {
    fn new(table: &'static str, id: &str) -> Self {
        Self {
            table,
            id: id.to_string(),
            fields: Vec::new(),
        }
    }

    fn set(mut self, column: &'static str, value: impl Into<Value>) -> Self {
        self.fields.push((column, value.into()));
        self
    }

    fn set_opt<V: Into<Value>>(self, column: &'static str, value: Option<V>) -> Self {
        match value {
            Some(v) => self.set(column, v),
            None => self,
        }
    }

    /// Execute the update and return the updated entity via RETURNING.
    /// None if no rows matched.
    fn execute_returning<T: FromRow>(
        mut self,
        conn: &Connection,
        returning_cols: &str,
    ) -> Result<Option<T>> {
        // No fields means nothing to change; echo the current row so an
        // empty update is not mistaken for a missing entity.
        if self.fields.is_empty() {
            return conn
                .query_row(
                    &format!(
                        "SELECT {} FROM {} WHERE id = ?1",
                        returning_cols, self.table
                    ),
                    params![self.id],
                    T::from_row,
                )
                .optional()
                .map_err(Into::into);
        }
        self.fields.push(("updated_at", now().into()));
        let sets: Vec<String> = self
            .fields
            .iter()
            .map(|(col, _)| format!("{} = ?", col))
            .collect();
        let mut values: Vec<Value> = self.fields.into_iter().map(|(_, v)| v).collect();
        values.push(self.id.into());
        let sql = format!(
            "UPDATE {} SET {} WHERE id = ? RETURNING {}",
            self.table,
            sets.join(", "),
            returning_cols
        );
        conn.query_row(&sql, rusqlite::params_from_iter(values), T::from_row)
            .optional()
            .map_err(Into::into)
    }
}

// ============ Organizations ============

pub fn create_organization(conn: &Connection, input: &CreateOrganization) -> Result<Organization> {
    let id = gen_id();
    let now = now();

    conn.execute(
        "INSERT INTO organizations (id, name, created_at, updated_at) VALUES (?1, ?2, ?3, ?4)",
        params![&id, input.name.trim(), now, now],
    )
    .map_err(|e| map_unique(e, "An organization with this name already exists"))?;

    Ok(Organization {
        id,
        name: input.name.trim().to_string(),
        created_at: now,
        updated_at: now,
    })
}

pub fn get_organization_by_id(conn: &Connection, id: &str) -> Result<Option<Organization>> {
    query_one(
        conn,
        &format!("SELECT {} FROM organizations WHERE id = ?1", ORGANIZATION_COLS),
        &[&id],
    )
}

// ============ Users ============

pub fn create_user(conn: &Connection, org_id: &str, input: &CreateUser) -> Result<User> {
    let id = gen_id();
    let now = now();
    let email = input.email.trim().to_lowercase();
    let roles_json = serde_json::to_string(&input.roles)?;

    conn.execute(
        "INSERT INTO users (id, org_id, email, name, roles, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![&id, org_id, &email, &input.name, &roles_json, now, now],
    )
    .map_err(|e| map_unique(e, msg::DUPLICATE_EMAIL))?;

    Ok(User {
        id,
        org_id: org_id.to_string(),
        email,
        name: input.name.clone(),
        roles: input.roles.clone(),
        created_at: now,
        updated_at: now,
    })
}

pub fn get_user_by_id(conn: &Connection, id: &str) -> Result<Option<User>> {
    query_one(
        conn,
        &format!("SELECT {} FROM users WHERE id = ?1", USER_COLS),
        &[&id],
    )
}

pub fn list_users_for_org(
    conn: &Connection,
    org_id: &str,
    limit: i64,
    offset: i64,
) -> Result<(Vec<User>, i64)> {
    let total: i64 = conn.query_row(
        "SELECT COUNT(*) FROM users WHERE org_id = ?1",
        params![org_id],
        |row| row.get(0),
    )?;
    let users = query_all(
        conn,
        &format!(
            "SELECT {} FROM users WHERE org_id = ?1 ORDER BY created_at DESC LIMIT ?2 OFFSET ?3",
            USER_COLS
        ),
        &[&org_id, &limit, &offset],
    )?;
    Ok((users, total))
}

// ============ Sessions ============

/// Mint an opaque session token for a user. Token issuance mechanics
/// (crypto, refresh) live outside the core; this is the minimal handle the
/// identity middleware needs.
pub fn create_session(conn: &Connection, user_id: &str, ttl_seconds: i64) -> Result<String> {
    let token = format!("ct_{}", Uuid::new_v4().simple());
    let now = now();
    conn.execute(
        "INSERT INTO sessions (token, user_id, created_at, expires_at) VALUES (?1, ?2, ?3, ?4)",
        params![&token, user_id, now, now + ttl_seconds],
    )?;
    Ok(token)
}

pub fn get_user_id_by_session(conn: &Connection, token: &str) -> Result<Option<String>> {
    conn.query_row(
        "SELECT user_id FROM sessions WHERE token = ?1 AND expires_at > ?2",
        params![token, now()],
        |row| row.get(0),
    )
    .optional()
    .map_err(Into::into)
}

/// Resolve the full acting principal: identity plus both assignment sets.
pub fn load_current_user(conn: &Connection, user_id: &str) -> Result<Option<CurrentUser>> {
    let Some(user) = get_user_by_id(conn, user_id)? else {
        return Ok(None);
    };
    let assigned_project_ids = list_assigned_project_ids(conn, user_id)?;
    let assigned_module_ids = list_assigned_module_ids(conn, user_id)?;
    Ok(Some(CurrentUser {
        id: user.id,
        org_id: user.org_id,
        roles: user.roles,
        assigned_project_ids,
        assigned_module_ids,
    }))
}

// ============ Ownership resolution ============

/// Resolved ancestry of an entity below Project: the ids authorization needs.
/// Resolution is explicit id-chasing via joins, never navigation through
/// loaded object graphs.
#[derive(Debug, Clone)]
pub struct OwnerScope {
    pub org_id: String,
    pub project_id: String,
    pub module_id: String,
}

pub fn resolve_project_org(conn: &Connection, project_id: &str) -> Result<Option<String>> {
    conn.query_row(
        "SELECT org_id FROM projects WHERE id = ?1",
        params![project_id],
        |row| row.get(0),
    )
    .optional()
    .map_err(Into::into)
}

pub fn resolve_module_scope(conn: &Connection, module_id: &str) -> Result<Option<OwnerScope>> {
    conn.query_row(
        "SELECT p.org_id, p.id, m.id
         FROM modules m JOIN projects p ON p.id = m.project_id
         WHERE m.id = ?1",
        params![module_id],
        |row| {
            Ok(OwnerScope {
                org_id: row.get(0)?,
                project_id: row.get(1)?,
                module_id: row.get(2)?,
            })
        },
    )
    .optional()
    .map_err(Into::into)
}

pub fn resolve_submodule_scope(conn: &Connection, submodule_id: &str) -> Result<Option<OwnerScope>> {
    conn.query_row(
        "SELECT p.org_id, p.id, m.id
         FROM submodules sm
         JOIN modules m ON m.id = sm.module_id
         JOIN projects p ON p.id = m.project_id
         WHERE sm.id = ?1",
        params![submodule_id],
        |row| {
            Ok(OwnerScope {
                org_id: row.get(0)?,
                project_id: row.get(1)?,
                module_id: row.get(2)?,
            })
        },
    )
    .optional()
    .map_err(Into::into)
}

pub fn resolve_case_scope(conn: &Connection, case_id: &str) -> Result<Option<OwnerScope>> {
    conn.query_row(
        "SELECT p.org_id, p.id, m.id
         FROM test_cases tc
         JOIN submodules sm ON sm.id = tc.submodule_id
         JOIN modules m ON m.id = sm.module_id
         JOIN projects p ON p.id = m.project_id
         WHERE tc.id = ?1",
        params![case_id],
        |row| {
            Ok(OwnerScope {
                org_id: row.get(0)?,
                project_id: row.get(1)?,
                module_id: row.get(2)?,
            })
        },
    )
    .optional()
    .map_err(Into::into)
}

pub fn resolve_execution_scope(conn: &Connection, execution_id: &str) -> Result<Option<OwnerScope>> {
    conn.query_row(
        "SELECT p.org_id, p.id, m.id
         FROM test_executions e
         JOIN test_cases tc ON tc.id = e.test_case_id
         JOIN submodules sm ON sm.id = tc.submodule_id
         JOIN modules m ON m.id = sm.module_id
         JOIN projects p ON p.id = m.project_id
         WHERE e.id = ?1",
        params![execution_id],
        |row| {
            Ok(OwnerScope {
                org_id: row.get(0)?,
                project_id: row.get(1)?,
                module_id: row.get(2)?,
            })
        },
    )
    .optional()
    .map_err(Into::into)
}

// ============ Projects ============

pub fn create_project(conn: &Connection, org_id: &str, input: &CreateProject) -> Result<Project> {
    let id = gen_id();
    let now = now();

    conn.execute(
        "INSERT INTO projects (id, org_id, name, description, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![&id, org_id, input.name.trim(), &input.description, now, now],
    )
    .map_err(|e| map_unique(e, msg::DUPLICATE_PROJECT_NAME))?;

    Ok(Project {
        id,
        org_id: org_id.to_string(),
        name: input.name.trim().to_string(),
        description: input.description.clone(),
        created_at: now,
        updated_at: now,
    })
}

pub fn get_project_by_id(conn: &Connection, id: &str) -> Result<Option<Project>> {
    query_one(
        conn,
        &format!("SELECT {} FROM projects WHERE id = ?1", PROJECT_COLS),
        &[&id],
    )
}

pub fn list_projects_for_org(
    conn: &Connection,
    org_id: &str,
    limit: i64,
    offset: i64,
) -> Result<(Vec<Project>, i64)> {
    let total: i64 = conn.query_row(
        "SELECT COUNT(*) FROM projects WHERE org_id = ?1",
        params![org_id],
        |row| row.get(0),
    )?;
    let projects = query_all(
        conn,
        &format!(
            "SELECT {} FROM projects WHERE org_id = ?1 ORDER BY created_at ASC LIMIT ?2 OFFSET ?3",
            PROJECT_COLS
        ),
        &[&org_id, &limit, &offset],
    )?;
    Ok((projects, total))
}

pub fn update_project(
    conn: &Connection,
    id: &str,
    input: &UpdateProject,
) -> Result<Option<Project>> {
    UpdateBuilder::new("projects", id)
        .set_opt("name", input.name.as_deref().map(str::trim).map(String::from))
        .set_opt("description", input.description.clone())
        .execute_returning(conn, PROJECT_COLS)
        .map_err(|e| match e {
            AppError::Database(inner) => map_unique(inner, msg::DUPLICATE_PROJECT_NAME),
            other => other,
        })
}

// ============ Modules ============

pub fn create_module(conn: &Connection, project_id: &str, input: &CreateModule) -> Result<TestModule> {
    let id = gen_id();
    let now = now();

    conn.execute(
        "INSERT INTO modules (id, project_id, name, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![&id, project_id, input.name.trim(), now, now],
    )?;

    Ok(TestModule {
        id,
        project_id: project_id.to_string(),
        name: input.name.trim().to_string(),
        created_at: now,
        updated_at: now,
    })
}

pub fn get_module_by_id(conn: &Connection, id: &str) -> Result<Option<TestModule>> {
    query_one(
        conn,
        &format!("SELECT {} FROM modules WHERE id = ?1", MODULE_COLS),
        &[&id],
    )
}

pub fn list_modules_for_project(conn: &Connection, project_id: &str) -> Result<Vec<TestModule>> {
    query_all(
        conn,
        &format!(
            "SELECT {} FROM modules WHERE project_id = ?1 ORDER BY created_at ASC",
            MODULE_COLS
        ),
        &[&project_id],
    )
}

pub fn update_module(
    conn: &Connection,
    id: &str,
    input: &UpdateModule,
) -> Result<Option<TestModule>> {
    UpdateBuilder::new("modules", id)
        .set_opt("name", input.name.as_deref().map(str::trim).map(String::from))
        .execute_returning(conn, MODULE_COLS)
}

// ============ Submodules ============

pub fn create_submodule(
    conn: &Connection,
    module_id: &str,
    input: &CreateModule,
) -> Result<Submodule> {
    let id = gen_id();
    let now = now();

    conn.execute(
        "INSERT INTO submodules (id, module_id, name, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![&id, module_id, input.name.trim(), now, now],
    )?;

    Ok(Submodule {
        id,
        module_id: module_id.to_string(),
        name: input.name.trim().to_string(),
        created_at: now,
        updated_at: now,
    })
}

pub fn get_submodule_by_id(conn: &Connection, id: &str) -> Result<Option<Submodule>> {
    query_one(
        conn,
        &format!("SELECT {} FROM submodules WHERE id = ?1", SUBMODULE_COLS),
        &[&id],
    )
}

pub fn list_submodules_for_module(conn: &Connection, module_id: &str) -> Result<Vec<Submodule>> {
    query_all(
        conn,
        &format!(
            "SELECT {} FROM submodules WHERE module_id = ?1 ORDER BY created_at ASC",
            SUBMODULE_COLS
        ),
        &[&module_id],
    )
}

pub fn update_submodule(
    conn: &Connection,
    id: &str,
    input: &UpdateModule,
) -> Result<Option<Submodule>> {
    UpdateBuilder::new("submodules", id)
        .set_opt("name", input.name.as_deref().map(str::trim).map(String::from))
        .execute_returning(conn, SUBMODULE_COLS)
}

// ============ Test cases and steps ============

/// Create a test case together with its steps in one transaction.
/// Steps are immutable afterwards.
pub fn create_test_case(
    conn: &mut Connection,
    submodule_id: &str,
    input: &CreateTestCase,
) -> Result<TestCase> {
    let id = gen_id();
    let now = now();

    let tx = conn.transaction()?;
    tx.execute(
        "INSERT INTO test_cases (id, submodule_id, name, description, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![&id, submodule_id, input.name.trim(), &input.description, now, now],
    )?;
    for step in &input.steps {
        tx.execute(
            "INSERT INTO test_steps (id, test_case_id, step_number, action, expected_result, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                gen_id(),
                &id,
                step.step_number,
                &step.action,
                &step.expected_result,
                now
            ],
        )?;
    }
    tx.commit()?;

    Ok(TestCase {
        id,
        submodule_id: submodule_id.to_string(),
        name: input.name.trim().to_string(),
        description: input.description.clone(),
        created_at: now,
        updated_at: now,
    })
}

pub fn get_test_case_by_id(conn: &Connection, id: &str) -> Result<Option<TestCase>> {
    query_one(
        conn,
        &format!("SELECT {} FROM test_cases WHERE id = ?1", TEST_CASE_COLS),
        &[&id],
    )
}

pub fn list_test_cases_for_submodule(
    conn: &Connection,
    submodule_id: &str,
) -> Result<Vec<TestCase>> {
    query_all(
        conn,
        &format!(
            "SELECT {} FROM test_cases WHERE submodule_id = ?1 ORDER BY created_at ASC",
            TEST_CASE_COLS
        ),
        &[&submodule_id],
    )
}

pub fn update_test_case(
    conn: &Connection,
    id: &str,
    input: &UpdateTestCase,
) -> Result<Option<TestCase>> {
    UpdateBuilder::new("test_cases", id)
        .set_opt("name", input.name.as_deref().map(str::trim).map(String::from))
        .set_opt("description", input.description.clone())
        .execute_returning(conn, TEST_CASE_COLS)
}

pub fn list_steps_for_case(conn: &Connection, case_id: &str) -> Result<Vec<TestStep>> {
    query_all(
        conn,
        &format!(
            "SELECT {} FROM test_steps WHERE test_case_id = ?1 ORDER BY step_number ASC",
            TEST_STEP_COLS
        ),
        &[&case_id],
    )
}

pub fn list_case_ids_under_module(conn: &Connection, module_id: &str) -> Result<Vec<String>> {
    let mut stmt = conn.prepare(
        "SELECT tc.id FROM test_cases tc
         JOIN submodules sm ON sm.id = tc.submodule_id
         WHERE sm.module_id = ?1 ORDER BY tc.created_at ASC",
    )?;
    let ids = stmt
        .query_map(params![module_id], |row| row.get(0))?
        .collect::<std::result::Result<Vec<String>, _>>()?;
    Ok(ids)
}

// ============ Assignments ============

/// Link a user to a project. Idempotent: re-assigning is a no-op success.
pub fn assign_user_to_project(conn: &Connection, user_id: &str, project_id: &str) -> Result<()> {
    conn.execute(
        "INSERT OR IGNORE INTO user_projects (user_id, project_id, created_at) VALUES (?1, ?2, ?3)",
        params![user_id, project_id, now()],
    )?;
    Ok(())
}

/// Unlink a user from a project. Removing an absent pair is a no-op success.
pub fn unassign_user_from_project(conn: &Connection, user_id: &str, project_id: &str) -> Result<()> {
    conn.execute(
        "DELETE FROM user_projects WHERE user_id = ?1 AND project_id = ?2",
        params![user_id, project_id],
    )?;
    Ok(())
}

pub fn assign_user_to_module(conn: &Connection, user_id: &str, module_id: &str) -> Result<()> {
    conn.execute(
        "INSERT OR IGNORE INTO user_test_modules (user_id, module_id, created_at) VALUES (?1, ?2, ?3)",
        params![user_id, module_id, now()],
    )?;
    Ok(())
}

pub fn unassign_user_from_module(conn: &Connection, user_id: &str, module_id: &str) -> Result<()> {
    conn.execute(
        "DELETE FROM user_test_modules WHERE user_id = ?1 AND module_id = ?2",
        params![user_id, module_id],
    )?;
    Ok(())
}

pub fn list_assigned_project_ids(conn: &Connection, user_id: &str) -> Result<Vec<String>> {
    let mut stmt =
        conn.prepare("SELECT project_id FROM user_projects WHERE user_id = ?1 ORDER BY created_at")?;
    let ids = stmt
        .query_map(params![user_id], |row| row.get(0))?
        .collect::<std::result::Result<Vec<String>, _>>()?;
    Ok(ids)
}

pub fn list_assigned_module_ids(conn: &Connection, user_id: &str) -> Result<Vec<String>> {
    let mut stmt = conn
        .prepare("SELECT module_id FROM user_test_modules WHERE user_id = ?1 ORDER BY created_at")?;
    let ids = stmt
        .query_map(params![user_id], |row| row.get(0))?
        .collect::<std::result::Result<Vec<String>, _>>()?;
    Ok(ids)
}

pub fn list_user_ids_assigned_to_module(conn: &Connection, module_id: &str) -> Result<Vec<String>> {
    let mut stmt = conn
        .prepare("SELECT user_id FROM user_test_modules WHERE module_id = ?1 ORDER BY created_at")?;
    let ids = stmt
        .query_map(params![module_id], |row| row.get(0))?
        .collect::<std::result::Result<Vec<String>, _>>()?;
    Ok(ids)
}

// ============ Executions ============

/// Create one execution for a test case, with exactly one PENDING step result
/// per step existing right now. The result set is fixed at creation; later
/// step edits on the case do not touch it.
pub fn create_execution(
    conn: &mut Connection,
    test_case_id: &str,
    assigned_user_id: Option<&str>,
) -> Result<TestExecution> {
    let id = gen_id();
    let now = now();

    let tx = conn.transaction()?;

    let case_exists: bool = tx
        .query_row(
            "SELECT 1 FROM test_cases WHERE id = ?1",
            params![test_case_id],
            |_| Ok(true),
        )
        .optional()?
        .unwrap_or(false);
    if !case_exists {
        return Err(AppError::NotFound(msg::TEST_CASE_NOT_FOUND.into()));
    }

    tx.execute(
        "INSERT INTO test_executions (id, test_case_id, assigned_user_id, status, overall_result, execution_date)
         VALUES (?1, ?2, ?3, 'PENDING', 'PENDING', ?4)",
        params![&id, test_case_id, assigned_user_id, now],
    )?;
    tx.execute(
        "INSERT INTO test_step_results (id, execution_id, step_id, step_number, status)
         SELECT lower(hex(randomblob(16))), ?1, id, step_number, 'PENDING'
         FROM test_steps WHERE test_case_id = ?2",
        params![&id, test_case_id],
    )?;
    tx.commit()?;

    Ok(TestExecution {
        id,
        test_case_id: test_case_id.to_string(),
        assigned_user_id: assigned_user_id.map(String::from),
        status: ExecutionStatus::Pending,
        overall_result: OverallResult::Pending,
        notes: None,
        bug_id: None,
        bug_summary: None,
        execution_date: now,
        start_date: None,
        completion_date: None,
    })
}

pub fn get_execution_by_id(conn: &Connection, id: &str) -> Result<Option<TestExecution>> {
    query_one(
        conn,
        &format!("SELECT {} FROM test_executions WHERE id = ?1", EXECUTION_COLS),
        &[&id],
    )
}

const SUMMARY_JOINS: &str = "FROM test_executions e
     JOIN test_cases tc ON tc.id = e.test_case_id
     JOIN submodules sm ON sm.id = tc.submodule_id
     JOIN modules m ON m.id = sm.module_id
     JOIN projects p ON p.id = m.project_id";

fn summary_cols() -> String {
    let cols: Vec<String> = EXECUTION_COLS
        .split(", ")
        .map(|c| format!("e.{}", c))
        .collect();
    format!(
        "{}, tc.name, sm.name, m.name, p.name",
        cols.join(", ")
    )
}

pub fn get_execution_summary(conn: &Connection, id: &str) -> Result<Option<ExecutionSummary>> {
    query_one(
        conn,
        &format!("SELECT {} {} WHERE e.id = ?1", summary_cols(), SUMMARY_JOINS),
        &[&id],
    )
}

/// List executions in an org, newest first, with optional filters.
pub fn list_executions_for_org(
    conn: &Connection,
    org_id: &str,
    filter: &ExecutionFilter,
    limit: i64,
    offset: i64,
) -> Result<(Vec<ExecutionSummary>, i64)> {
    let where_clause = "WHERE p.org_id = ?1
         AND (?2 IS NULL OR e.assigned_user_id = ?2)
         AND (?3 IS NULL OR m.id = ?3)
         AND (?4 IS NULL OR e.status = ?4)";
    let status = filter.status.map(|s| s.as_str());

    let total: i64 = conn.query_row(
        &format!("SELECT COUNT(*) {} {}", SUMMARY_JOINS, where_clause),
        params![org_id, filter.assigned_user_id, filter.module_id, status],
        |row| row.get(0),
    )?;

    let mut stmt = conn.prepare(&format!(
        "SELECT {} {} {} ORDER BY e.execution_date DESC, e.id DESC LIMIT ?5 OFFSET ?6",
        summary_cols(),
        SUMMARY_JOINS,
        where_clause
    ))?;
    let rows = stmt
        .query_map(
            params![
                org_id,
                filter.assigned_user_id,
                filter.module_id,
                status,
                limit,
                offset
            ],
            ExecutionSummary::from_row,
        )?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok((rows, total))
}

pub fn list_step_results_for_execution(
    conn: &Connection,
    execution_id: &str,
) -> Result<Vec<TestStepResult>> {
    query_all(
        conn,
        &format!(
            "SELECT {} FROM test_step_results WHERE execution_id = ?1 ORDER BY step_number ASC",
            STEP_RESULT_COLS
        ),
        &[&execution_id],
    )
}

fn require_not_completed(execution: &TestExecution) -> Result<()> {
    if execution.status == ExecutionStatus::Completed {
        return Err(AppError::InvalidState(msg::EXECUTION_COMPLETED.into()));
    }
    Ok(())
}

/// Assign an execution to a user and move it to IN_PROGRESS.
/// `start_date` is set once; repeating the assignment is idempotent.
/// Role and organization checks on the target user belong to the caller.
pub fn assign_execution(
    conn: &Connection,
    execution_id: &str,
    user_id: &str,
) -> Result<TestExecution> {
    let execution = get_execution_by_id(conn, execution_id)?
        .ok_or_else(|| AppError::NotFound(msg::EXECUTION_NOT_FOUND.into()))?;
    require_not_completed(&execution)?;

    conn.query_row(
        &format!(
            "UPDATE test_executions
             SET assigned_user_id = ?1, status = 'IN_PROGRESS',
                 start_date = COALESCE(start_date, ?2)
             WHERE id = ?3 RETURNING {}",
            EXECUTION_COLS
        ),
        params![user_id, now(), execution_id],
        TestExecution::from_row,
    )
    .map_err(Into::into)
}

/// Save work-in-progress notes. Never touches status or result, and never
/// requires a result value.
pub fn save_work(conn: &Connection, execution_id: &str, notes: &str) -> Result<TestExecution> {
    let execution = get_execution_by_id(conn, execution_id)?
        .ok_or_else(|| AppError::NotFound(msg::EXECUTION_NOT_FOUND.into()))?;
    require_not_completed(&execution)?;

    conn.query_row(
        &format!(
            "UPDATE test_executions SET notes = ?1 WHERE id = ?2 RETURNING {}",
            EXECUTION_COLS
        ),
        params![notes, execution_id],
        TestExecution::from_row,
    )
    .map_err(Into::into)
}

/// Complete an execution. COMPLETED is terminal: re-running a test case means
/// creating a new execution, never reopening this one. Bug-tracker fields are
/// opaque pass-through, stored only for FAILED results.
pub fn complete_execution(
    conn: &Connection,
    execution_id: &str,
    input: &CompleteExecution,
) -> Result<TestExecution> {
    let execution = get_execution_by_id(conn, execution_id)?
        .ok_or_else(|| AppError::NotFound(msg::EXECUTION_NOT_FOUND.into()))?;
    require_not_completed(&execution)?;

    let now = now();
    let (bug_id, bug_summary) = if input.overall_result == OverallResult::Failed {
        (input.bug_id.as_deref(), input.bug_summary.as_deref())
    } else {
        (None, None)
    };

    conn.query_row(
        &format!(
            "UPDATE test_executions
             SET status = 'COMPLETED', overall_result = ?1,
                 notes = COALESCE(?2, notes),
                 bug_id = ?3, bug_summary = ?4,
                 start_date = COALESCE(start_date, ?5), completion_date = ?5
             WHERE id = ?6 RETURNING {}",
            EXECUTION_COLS
        ),
        params![
            input.overall_result.as_str(),
            input.notes.as_deref(),
            bug_id,
            bug_summary,
            now,
            execution_id
        ],
        TestExecution::from_row,
    )
    .map_err(Into::into)
}

/// Mutate the pre-created result slot for (execution, step). Slots are never
/// created here - a missing pair is NotFound.
pub fn update_step_result(
    conn: &Connection,
    execution_id: &str,
    step_id: &str,
    input: &UpdateStepResult,
) -> Result<TestStepResult> {
    let execution = get_execution_by_id(conn, execution_id)?
        .ok_or_else(|| AppError::NotFound(msg::EXECUTION_NOT_FOUND.into()))?;
    require_not_completed(&execution)?;

    conn.query_row(
        &format!(
            "UPDATE test_step_results SET status = ?1, actual_result = ?2
             WHERE execution_id = ?3 AND step_id = ?4 RETURNING {}",
            STEP_RESULT_COLS
        ),
        params![input.status.as_str(), input.actual_result, execution_id, step_id],
        TestStepResult::from_row,
    )
    .optional()?
    .ok_or_else(|| AppError::NotFound(msg::STEP_RESULT_NOT_FOUND.into()))
}

/// Generate PENDING executions for every test case under a module that does
/// not already have one assigned to this user. Each case is its own unit of
/// work: a failure skips that case and the batch keeps going.
pub fn bulk_generate_executions(
    conn: &mut Connection,
    module_id: &str,
    user_id: &str,
) -> Result<u32> {
    let case_ids = list_case_ids_under_module(conn, module_id)?;
    let mut created = 0u32;

    for case_id in case_ids {
        let already: bool = conn
            .query_row(
                "SELECT 1 FROM test_executions WHERE test_case_id = ?1 AND assigned_user_id = ?2 LIMIT 1",
                params![&case_id, user_id],
                |_| Ok(true),
            )
            .optional()?
            .unwrap_or(false);
        if already {
            continue;
        }
        match create_execution(conn, &case_id, Some(user_id)) {
            Ok(_) => created += 1,
            Err(e) => {
                tracing::warn!(
                    "Skipping execution generation for case {}: {}",
                    case_id,
                    e
                );
            }
        }
    }

    Ok(created)
}

// ============ Analytics ============

/// Caller visibility for analytics, decided by the authorization layer.
#[derive(Debug, Clone, Default)]
pub struct AnalyticsVisibility {
    /// Only count executions assigned to this user.
    pub user_filter: Option<String>,
    /// Only include these modules (non-admin callers: modules they hold).
    pub module_filter: Option<Vec<String>>,
}

/// Latest execution per test case under one module, within the visible set.
/// Returns (status, overall_result) pairs, one per executed-or-not case that
/// has at least one visible execution.
fn latest_outcomes_for_module(
    conn: &Connection,
    module_id: &str,
    user_filter: Option<&str>,
) -> Result<Vec<(ExecutionStatus, OverallResult)>> {
    let mut stmt = conn.prepare(
        "SELECT e.status, e.overall_result
         FROM test_executions e
         JOIN test_cases tc ON tc.id = e.test_case_id
         JOIN submodules sm ON sm.id = tc.submodule_id
         WHERE sm.module_id = ?1
           AND (?2 IS NULL OR e.assigned_user_id = ?2)
           AND e.id = (
               SELECT e2.id FROM test_executions e2
               WHERE e2.test_case_id = e.test_case_id
                 AND (?2 IS NULL OR e2.assigned_user_id = ?2)
               ORDER BY e2.execution_date DESC, e2.id DESC LIMIT 1)",
    )?;
    let rows = stmt
        .query_map(params![module_id, user_filter], |row| {
            let status: String = row.get(0)?;
            let result: String = row.get(1)?;
            Ok((status, result))
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    Ok(rows
        .into_iter()
        .filter_map(|(s, r)| Some((s.parse().ok()?, r.parse().ok()?)))
        .collect())
}

fn module_stats(
    conn: &Connection,
    module: &TestModule,
    user_filter: Option<&str>,
) -> Result<ModuleStats> {
    let total_cases: i64 = conn.query_row(
        "SELECT COUNT(*) FROM test_cases tc
         JOIN submodules sm ON sm.id = tc.submodule_id
         WHERE sm.module_id = ?1",
        params![&module.id],
        |row| row.get(0),
    )?;

    let outcomes = latest_outcomes_for_module(conn, &module.id, user_filter)?;
    // A case counts as executed only when its latest visible run left PENDING.
    let executed = outcomes
        .iter()
        .filter(|(status, _)| *status != ExecutionStatus::Pending)
        .count() as i64;
    let passed = outcomes
        .iter()
        .filter(|(status, result)| {
            *status == ExecutionStatus::Completed && *result == OverallResult::Passed
        })
        .count() as i64;
    let failed = outcomes
        .iter()
        .filter(|(status, result)| {
            *status == ExecutionStatus::Completed && *result == OverallResult::Failed
        })
        .count() as i64;

    Ok(ModuleStats {
        module_id: module.id.clone(),
        module_name: module.name.clone(),
        total_cases,
        executed,
        passed,
        failed,
        pass_rate: rate(passed, executed),
        fail_rate: rate(failed, executed),
    })
}

/// Pass/fail/coverage rollup for one organization, broken down by project and
/// module, scoped to the caller's visibility. "Executed" is decided by the
/// latest execution per test case; superseded runs are excluded.
pub fn analytics_report(
    conn: &Connection,
    org_id: &str,
    visibility: &AnalyticsVisibility,
) -> Result<AnalyticsReport> {
    let (projects, _) = list_projects_for_org(conn, org_id, i64::MAX, 0)?;
    let user_filter = visibility.user_filter.as_deref();

    let mut report = AnalyticsReport {
        org_id: org_id.to_string(),
        total_cases: 0,
        executed: 0,
        passed: 0,
        failed: 0,
        pass_rate: 0.0,
        fail_rate: 0.0,
        projects: Vec::new(),
    };

    for project in projects {
        let mut stats = ProjectStats {
            project_id: project.id.clone(),
            project_name: project.name.clone(),
            total_cases: 0,
            executed: 0,
            passed: 0,
            failed: 0,
            pass_rate: 0.0,
            fail_rate: 0.0,
            modules: Vec::new(),
        };

        for module in list_modules_for_project(conn, &project.id)? {
            if let Some(allowed) = &visibility.module_filter {
                if !allowed.contains(&module.id) {
                    continue;
                }
            }
            let ms = module_stats(conn, &module, user_filter)?;
            stats.total_cases += ms.total_cases;
            stats.executed += ms.executed;
            stats.passed += ms.passed;
            stats.failed += ms.failed;
            stats.modules.push(ms);
        }

        stats.pass_rate = rate(stats.passed, stats.executed);
        stats.fail_rate = rate(stats.failed, stats.executed);
        report.total_cases += stats.total_cases;
        report.executed += stats.executed;
        report.passed += stats.passed;
        report.failed += stats.failed;

        // Projects outside a restricted module set contribute nothing; skip
        // empty shells so the report only lists what the caller can see.
        if visibility.module_filter.is_none() || !stats.modules.is_empty() {
            report.projects.push(stats);
        }
    }

    report.pass_rate = rate(report.passed, report.executed);
    report.fail_rate = rate(report.failed, report.executed);
    Ok(report)
}
