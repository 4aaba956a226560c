//! Ordered cascade deletion through the ownership tree.
//!
//! Deleting any structural node follows one contract, inside one transaction:
//!
//!   detach junction rows -> delete leaf data -> delete structural rows
//!   bottom-up -> delete the node itself.
//!
//! Foreign keys are enforced without ON DELETE CASCADE, so running these
//! statements out of order fails the transaction instead of leaving orphans.
//! A failure partway rolls back the whole delete.

use rusqlite::{params, Connection};

use crate::error::Result;

fn exists(conn: &Connection, table: &str, id: &str) -> Result<bool> {
    use rusqlite::OptionalExtension;
    let found = conn
        .query_row(
            &format!("SELECT 1 FROM {} WHERE id = ?1", table),
            params![id],
            |_| Ok(true),
        )
        .optional()?
        .unwrap_or(false);
    Ok(found)
}

/// Delete everything owned by the test cases selected by `case_filter`, then
/// the cases themselves. `case_filter` must be a SELECT yielding case ids for
/// the single bound parameter.
fn delete_case_subtree(conn: &Connection, case_filter: &str, id: &str) -> Result<()> {
    // Leaf log data first: step results, then the executions owning them.
    conn.execute(
        &format!(
            "DELETE FROM test_step_results WHERE execution_id IN
             (SELECT id FROM test_executions WHERE test_case_id IN ({}))",
            case_filter
        ),
        params![id],
    )?;
    conn.execute(
        &format!(
            "DELETE FROM test_executions WHERE test_case_id IN ({})",
            case_filter
        ),
        params![id],
    )?;
    conn.execute(
        &format!("DELETE FROM test_steps WHERE test_case_id IN ({})", case_filter),
        params![id],
    )?;
    conn.execute(
        &format!("DELETE FROM test_cases WHERE id IN ({})", case_filter),
        params![id],
    )?;
    Ok(())
}

/// Delete a project and its entire subtree. Returns false if absent.
pub fn delete_project(conn: &mut Connection, project_id: &str) -> Result<bool> {
    if !exists(conn, "projects", project_id)? {
        return Ok(false);
    }
    let tx = conn.transaction()?;

    // 1. Detach assignment junctions referencing the project or its modules.
    tx.execute(
        "DELETE FROM user_projects WHERE project_id = ?1",
        params![project_id],
    )?;
    tx.execute(
        "DELETE FROM user_test_modules WHERE module_id IN
         (SELECT id FROM modules WHERE project_id = ?1)",
        params![project_id],
    )?;

    // 2. Leaf data under every case in the project.
    delete_case_subtree(
        &tx,
        "SELECT tc.id FROM test_cases tc
         JOIN submodules sm ON sm.id = tc.submodule_id
         JOIN modules m ON m.id = sm.module_id
         WHERE m.project_id = ?1",
        project_id,
    )?;

    // 3. Structural rows, bottom-up.
    tx.execute(
        "DELETE FROM submodules WHERE module_id IN
         (SELECT id FROM modules WHERE project_id = ?1)",
        params![project_id],
    )?;
    tx.execute("DELETE FROM modules WHERE project_id = ?1", params![project_id])?;
    tx.execute("DELETE FROM projects WHERE id = ?1", params![project_id])?;

    tx.commit()?;
    Ok(true)
}

/// Delete a module and its subtree. Returns false if absent.
pub fn delete_module(conn: &mut Connection, module_id: &str) -> Result<bool> {
    if !exists(conn, "modules", module_id)? {
        return Ok(false);
    }
    let tx = conn.transaction()?;

    tx.execute(
        "DELETE FROM user_test_modules WHERE module_id = ?1",
        params![module_id],
    )?;

    delete_case_subtree(
        &tx,
        "SELECT tc.id FROM test_cases tc
         JOIN submodules sm ON sm.id = tc.submodule_id
         WHERE sm.module_id = ?1",
        module_id,
    )?;

    tx.execute(
        "DELETE FROM submodules WHERE module_id = ?1",
        params![module_id],
    )?;
    tx.execute("DELETE FROM modules WHERE id = ?1", params![module_id])?;

    tx.commit()?;
    Ok(true)
}

/// Delete a submodule and its subtree. Returns false if absent.
pub fn delete_submodule(conn: &mut Connection, submodule_id: &str) -> Result<bool> {
    if !exists(conn, "submodules", submodule_id)? {
        return Ok(false);
    }
    let tx = conn.transaction()?;

    // Submodules carry no junction rows of their own; straight to leaf data.
    delete_case_subtree(
        &tx,
        "SELECT id FROM test_cases WHERE submodule_id = ?1",
        submodule_id,
    )?;

    tx.execute(
        "DELETE FROM submodules WHERE id = ?1",
        params![submodule_id],
    )?;

    tx.commit()?;
    Ok(true)
}

/// Delete a single test case, its steps, and its execution history.
pub fn delete_test_case(conn: &mut Connection, case_id: &str) -> Result<bool> {
    if !exists(conn, "test_cases", case_id)? {
        return Ok(false);
    }
    let tx = conn.transaction()?;
    delete_case_subtree(&tx, "SELECT ?1", case_id)?;
    tx.commit()?;
    Ok(true)
}
