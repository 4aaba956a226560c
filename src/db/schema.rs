use rusqlite::Connection;

/// Initialize the database schema.
///
/// Foreign keys are declared without ON DELETE CASCADE on purpose: subtree
/// deletion is the explicit ordered algorithm in `db::cascade`, and with
/// enforcement on, a wrong deletion order fails instead of orphaning rows.
pub fn init_db(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(
        r#"
        PRAGMA foreign_keys = ON;

        -- Organizations (tenants - root of data isolation)
        CREATE TABLE IF NOT EXISTS organizations (
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL UNIQUE,
            created_at INTEGER NOT NULL,
            updated_at INTEGER NOT NULL
        );

        -- Users (identity; roles stored as a JSON array of role names).
        -- Email is unique per organization, not globally: a global constraint
        -- would let one tenant probe another's addresses through conflicts.
        CREATE TABLE IF NOT EXISTS users (
            id TEXT PRIMARY KEY,
            org_id TEXT NOT NULL REFERENCES organizations(id),
            email TEXT NOT NULL,
            name TEXT NOT NULL,
            roles TEXT NOT NULL DEFAULT '[]',
            created_at INTEGER NOT NULL,
            updated_at INTEGER NOT NULL,
            UNIQUE(org_id, email)
        );
        CREATE INDEX IF NOT EXISTS idx_users_org ON users(org_id);
        CREATE INDEX IF NOT EXISTS idx_users_email ON users(email);

        -- Sessions (opaque bearer tokens; issuance mechanics live outside the core)
        CREATE TABLE IF NOT EXISTS sessions (
            token TEXT PRIMARY KEY,
            user_id TEXT NOT NULL REFERENCES users(id),
            created_at INTEGER NOT NULL,
            expires_at INTEGER NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_sessions_user ON sessions(user_id);

        -- Projects (name unique within the owning organization)
        CREATE TABLE IF NOT EXISTS projects (
            id TEXT PRIMARY KEY,
            org_id TEXT NOT NULL REFERENCES organizations(id),
            name TEXT NOT NULL,
            description TEXT,
            created_at INTEGER NOT NULL,
            updated_at INTEGER NOT NULL,
            UNIQUE(org_id, name)
        );
        CREATE INDEX IF NOT EXISTS idx_projects_org ON projects(org_id);

        -- Test modules (unit of assignment-based access)
        CREATE TABLE IF NOT EXISTS modules (
            id TEXT PRIMARY KEY,
            project_id TEXT NOT NULL REFERENCES projects(id),
            name TEXT NOT NULL,
            created_at INTEGER NOT NULL,
            updated_at INTEGER NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_modules_project ON modules(project_id);

        CREATE TABLE IF NOT EXISTS submodules (
            id TEXT PRIMARY KEY,
            module_id TEXT NOT NULL REFERENCES modules(id),
            name TEXT NOT NULL,
            created_at INTEGER NOT NULL,
            updated_at INTEGER NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_submodules_module ON submodules(module_id);

        CREATE TABLE IF NOT EXISTS test_cases (
            id TEXT PRIMARY KEY,
            submodule_id TEXT NOT NULL REFERENCES submodules(id),
            name TEXT NOT NULL,
            description TEXT,
            created_at INTEGER NOT NULL,
            updated_at INTEGER NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_test_cases_submodule ON test_cases(submodule_id);

        -- Test steps (immutable action/expected pairs, strictly increasing numbers)
        CREATE TABLE IF NOT EXISTS test_steps (
            id TEXT PRIMARY KEY,
            test_case_id TEXT NOT NULL REFERENCES test_cases(id),
            step_number INTEGER NOT NULL,
            action TEXT NOT NULL,
            expected_result TEXT NOT NULL,
            created_at INTEGER NOT NULL,
            UNIQUE(test_case_id, step_number)
        );
        CREATE INDEX IF NOT EXISTS idx_test_steps_case ON test_steps(test_case_id);

        -- Assignment junctions (many-to-many, consulted by authorization)
        CREATE TABLE IF NOT EXISTS user_projects (
            user_id TEXT NOT NULL REFERENCES users(id),
            project_id TEXT NOT NULL REFERENCES projects(id),
            created_at INTEGER NOT NULL,
            UNIQUE(user_id, project_id)
        );
        CREATE INDEX IF NOT EXISTS idx_user_projects_user ON user_projects(user_id);
        CREATE INDEX IF NOT EXISTS idx_user_projects_project ON user_projects(project_id);

        CREATE TABLE IF NOT EXISTS user_test_modules (
            user_id TEXT NOT NULL REFERENCES users(id),
            module_id TEXT NOT NULL REFERENCES modules(id),
            created_at INTEGER NOT NULL,
            UNIQUE(user_id, module_id)
        );
        CREATE INDEX IF NOT EXISTS idx_user_test_modules_user ON user_test_modules(user_id);
        CREATE INDEX IF NOT EXISTS idx_user_test_modules_module ON user_test_modules(module_id);

        -- Executions (run log; status is workflow, overall_result is outcome)
        CREATE TABLE IF NOT EXISTS test_executions (
            id TEXT PRIMARY KEY,
            test_case_id TEXT NOT NULL REFERENCES test_cases(id),
            assigned_user_id TEXT REFERENCES users(id),
            status TEXT NOT NULL DEFAULT 'PENDING'
                CHECK (status IN ('PENDING', 'IN_PROGRESS', 'COMPLETED')),
            overall_result TEXT NOT NULL DEFAULT 'PENDING'
                CHECK (overall_result IN ('PENDING', 'PASSED', 'FAILED', 'BLOCKED', 'PARTIALLY_PASSED')),
            notes TEXT,
            bug_id TEXT,
            bug_summary TEXT,
            execution_date INTEGER NOT NULL,
            start_date INTEGER,
            completion_date INTEGER
        );
        CREATE INDEX IF NOT EXISTS idx_executions_case ON test_executions(test_case_id);
        CREATE INDEX IF NOT EXISTS idx_executions_user ON test_executions(assigned_user_id);
        CREATE INDEX IF NOT EXISTS idx_executions_case_date ON test_executions(test_case_id, execution_date DESC);

        -- Step results (one per step existing at execution creation, mutated only)
        CREATE TABLE IF NOT EXISTS test_step_results (
            id TEXT PRIMARY KEY,
            execution_id TEXT NOT NULL REFERENCES test_executions(id),
            step_id TEXT NOT NULL REFERENCES test_steps(id),
            step_number INTEGER NOT NULL,
            status TEXT NOT NULL DEFAULT 'PENDING'
                CHECK (status IN ('PENDING', 'PASSED', 'FAILED', 'BLOCKED', 'SKIPPED')),
            actual_result TEXT,
            UNIQUE(execution_id, step_id)
        );
        CREATE INDEX IF NOT EXISTS idx_step_results_execution ON test_step_results(execution_id);
        CREATE INDEX IF NOT EXISTS idx_step_results_step ON test_step_results(step_id);
        "#,
    )?;
    Ok(())
}
