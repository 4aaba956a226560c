//! Row mapping trait and helpers for reducing boilerplate in queries.

use rusqlite::{Connection, OptionalExtension, Row, ToSql};

use crate::models::*;

/// Parse a string column into an enum type, converting parse errors to
/// rusqlite errors instead of panicking on corrupt data.
fn parse_enum<T: std::str::FromStr>(row: &Row, col: usize, col_name: &str) -> rusqlite::Result<T> {
    row.get::<_, String>(col)?.parse::<T>().map_err(|_| {
        rusqlite::Error::InvalidColumnType(col, col_name.to_string(), rusqlite::types::Type::Text)
    })
}

/// Trait for constructing a type from a database row.
pub trait FromRow: Sized {
    fn from_row(row: &Row) -> rusqlite::Result<Self>;
}

/// Query for a single optional result.
pub fn query_one<T: FromRow>(
    conn: &Connection,
    sql: &str,
    params: &[&dyn ToSql],
) -> crate::error::Result<Option<T>> {
    conn.query_row(sql, params, T::from_row)
        .optional()
        .map_err(Into::into)
}

/// Query for multiple results.
pub fn query_all<T: FromRow>(
    conn: &Connection,
    sql: &str,
    params: &[&dyn ToSql],
) -> crate::error::Result<Vec<T>> {
    let mut stmt = conn.prepare(sql)?;
    let rows = stmt
        .query_map(params, T::from_row)?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}

// ============ SQL SELECT Constants ============

pub const ORGANIZATION_COLS: &str = "id, name, created_at, updated_at";

pub const USER_COLS: &str = "id, org_id, email, name, roles, created_at, updated_at";

pub const PROJECT_COLS: &str = "id, org_id, name, description, created_at, updated_at";

pub const MODULE_COLS: &str = "id, project_id, name, created_at, updated_at";

pub const SUBMODULE_COLS: &str = "id, module_id, name, created_at, updated_at";

pub const TEST_CASE_COLS: &str = "id, submodule_id, name, description, created_at, updated_at";

pub const TEST_STEP_COLS: &str =
    "id, test_case_id, step_number, action, expected_result, created_at";

pub const EXECUTION_COLS: &str = "id, test_case_id, assigned_user_id, status, overall_result, notes, bug_id, bug_summary, execution_date, start_date, completion_date";

pub const STEP_RESULT_COLS: &str =
    "id, execution_id, step_id, step_number, status, actual_result";

// ============ FromRow Implementations ============

impl FromRow for Organization {
    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(Organization {
            id: row.get(0)?,
            name: row.get(1)?,
            created_at: row.get(2)?,
            updated_at: row.get(3)?,
        })
    }
}

impl FromRow for User {
    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        let roles_str: String = row.get(4)?;
        Ok(User {
            id: row.get(0)?,
            org_id: row.get(1)?,
            email: row.get(2)?,
            name: row.get(3)?,
            roles: serde_json::from_str(&roles_str).unwrap_or_default(),
            created_at: row.get(5)?,
            updated_at: row.get(6)?,
        })
    }
}

impl FromRow for Project {
    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(Project {
            id: row.get(0)?,
            org_id: row.get(1)?,
            name: row.get(2)?,
            description: row.get(3)?,
            created_at: row.get(4)?,
            updated_at: row.get(5)?,
        })
    }
}

impl FromRow for TestModule {
    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(TestModule {
            id: row.get(0)?,
            project_id: row.get(1)?,
            name: row.get(2)?,
            created_at: row.get(3)?,
            updated_at: row.get(4)?,
        })
    }
}

impl FromRow for Submodule {
    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(Submodule {
            id: row.get(0)?,
            module_id: row.get(1)?,
            name: row.get(2)?,
            created_at: row.get(3)?,
            updated_at: row.get(4)?,
        })
    }
}

impl FromRow for TestCase {
    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(TestCase {
            id: row.get(0)?,
            submodule_id: row.get(1)?,
            name: row.get(2)?,
            description: row.get(3)?,
            created_at: row.get(4)?,
            updated_at: row.get(5)?,
        })
    }
}

impl FromRow for TestStep {
    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(TestStep {
            id: row.get(0)?,
            test_case_id: row.get(1)?,
            step_number: row.get(2)?,
            action: row.get(3)?,
            expected_result: row.get(4)?,
            created_at: row.get(5)?,
        })
    }
}

impl FromRow for TestExecution {
    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(TestExecution {
            id: row.get(0)?,
            test_case_id: row.get(1)?,
            assigned_user_id: row.get(2)?,
            status: parse_enum(row, 3, "status")?,
            overall_result: parse_enum(row, 4, "overall_result")?,
            notes: row.get(5)?,
            bug_id: row.get(6)?,
            bug_summary: row.get(7)?,
            execution_date: row.get(8)?,
            start_date: row.get(9)?,
            completion_date: row.get(10)?,
        })
    }
}

impl FromRow for TestStepResult {
    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(TestStepResult {
            id: row.get(0)?,
            execution_id: row.get(1)?,
            step_id: row.get(2)?,
            step_number: row.get(3)?,
            status: parse_enum(row, 4, "status")?,
            actual_result: row.get(5)?,
        })
    }
}

/// Summary rows select `EXECUTION_COLS` first, then the four resolved names.
impl FromRow for ExecutionSummary {
    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(ExecutionSummary {
            execution: TestExecution::from_row(row)?,
            test_case_name: row.get(11)?,
            submodule_name: row.get(12)?,
            module_name: row.get(13)?,
            project_name: row.get(14)?,
        })
    }
}
