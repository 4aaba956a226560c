use serde::Serialize;

/// Pass/fail/coverage rollup for one module.
#[derive(Debug, Clone, Serialize)]
pub struct ModuleStats {
    pub module_id: String,
    pub module_name: String,
    pub total_cases: i64,
    pub executed: i64,
    pub passed: i64,
    pub failed: i64,
    pub pass_rate: f64,
    pub fail_rate: f64,
}

/// Per-project rollup, summed over its modules.
#[derive(Debug, Clone, Serialize)]
pub struct ProjectStats {
    pub project_id: String,
    pub project_name: String,
    pub total_cases: i64,
    pub executed: i64,
    pub passed: i64,
    pub failed: i64,
    pub pass_rate: f64,
    pub fail_rate: f64,
    pub modules: Vec<ModuleStats>,
}

/// Org-wide analytics response.
#[derive(Debug, Serialize)]
pub struct AnalyticsReport {
    pub org_id: String,
    pub total_cases: i64,
    pub executed: i64,
    pub passed: i64,
    pub failed: i64,
    pub pass_rate: f64,
    pub fail_rate: f64,
    pub projects: Vec<ProjectStats>,
}

pub fn rate(part: i64, whole: i64) -> f64 {
    if whole == 0 {
        0.0
    } else {
        part as f64 / whole as f64
    }
}
