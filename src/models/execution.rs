use serde::{Deserialize, Serialize};

use crate::error::{msg, AppError, Result};

/// Workflow stage of an execution. Moves forward only; a completed execution
/// is never reopened - re-running a test case creates a new execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ExecutionStatus {
    Pending,
    InProgress,
    Completed,
}

impl ExecutionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExecutionStatus::Pending => "PENDING",
            ExecutionStatus::InProgress => "IN_PROGRESS",
            ExecutionStatus::Completed => "COMPLETED",
        }
    }
}

impl std::str::FromStr for ExecutionStatus {
    type Err = ();

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "PENDING" => Ok(ExecutionStatus::Pending),
            "IN_PROGRESS" => Ok(ExecutionStatus::InProgress),
            "COMPLETED" => Ok(ExecutionStatus::Completed),
            _ => Err(()),
        }
    }
}

/// Outcome of an execution. Independent of `ExecutionStatus`: only meaningful
/// once the execution reaches COMPLETED.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OverallResult {
    Pending,
    Passed,
    Failed,
    Blocked,
    PartiallyPassed,
}

impl OverallResult {
    pub fn as_str(&self) -> &'static str {
        match self {
            OverallResult::Pending => "PENDING",
            OverallResult::Passed => "PASSED",
            OverallResult::Failed => "FAILED",
            OverallResult::Blocked => "BLOCKED",
            OverallResult::PartiallyPassed => "PARTIALLY_PASSED",
        }
    }
}

impl std::str::FromStr for OverallResult {
    type Err = ();

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "PENDING" => Ok(OverallResult::Pending),
            "PASSED" => Ok(OverallResult::Passed),
            "FAILED" => Ok(OverallResult::Failed),
            "BLOCKED" => Ok(OverallResult::Blocked),
            "PARTIALLY_PASSED" => Ok(OverallResult::PartiallyPassed),
            _ => Err(()),
        }
    }
}

/// Per-step outcome inside one execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StepStatus {
    Pending,
    Passed,
    Failed,
    Blocked,
    Skipped,
}

impl StepStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            StepStatus::Pending => "PENDING",
            StepStatus::Passed => "PASSED",
            StepStatus::Failed => "FAILED",
            StepStatus::Blocked => "BLOCKED",
            StepStatus::Skipped => "SKIPPED",
        }
    }
}

impl std::str::FromStr for StepStatus {
    type Err = ();

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "PENDING" => Ok(StepStatus::Pending),
            "PASSED" => Ok(StepStatus::Passed),
            "FAILED" => Ok(StepStatus::Failed),
            "BLOCKED" => Ok(StepStatus::Blocked),
            "SKIPPED" => Ok(StepStatus::Skipped),
            _ => Err(()),
        }
    }
}

/// One timestamped run record for a test case. A log entry, not 1:1 state -
/// many executions may reference the same case over time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TestExecution {
    pub id: String,
    pub test_case_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub assigned_user_id: Option<String>,
    pub status: ExecutionStatus,
    pub overall_result: OverallResult,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    /// Opaque bug-tracker reference, stored as-is when a failed run reports one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bug_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bug_summary: Option<String>,
    pub execution_date: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_date: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completion_date: Option<i64>,
}

/// Result slot for one step of one execution. Created alongside the
/// execution (one per step that existed at creation time), then only mutated.
/// `step_number` is mirrored from the step for stable ordering.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TestStepResult {
    pub id: String,
    pub execution_id: String,
    pub step_id: String,
    pub step_number: i64,
    pub status: StepStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub actual_result: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct AssignExecution {
    pub user_id: String,
}

#[derive(Debug, Deserialize)]
pub struct SaveWork {
    pub notes: String,
}

#[derive(Debug, Deserialize)]
pub struct CompleteExecution {
    pub overall_result: OverallResult,
    pub notes: Option<String>,
    pub bug_id: Option<String>,
    pub bug_summary: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateStepResult {
    pub status: StepStatus,
    pub actual_result: Option<String>,
}

impl CompleteExecution {
    pub fn validate(&self) -> Result<()> {
        // PENDING is a placeholder, not a reportable outcome.
        if self.overall_result == OverallResult::Pending {
            return Err(AppError::BadRequest(msg::RESULT_REQUIRED.into()));
        }
        Ok(())
    }
}

/// Execution with names resolved up the tree at read time, for list UIs.
#[derive(Debug, Serialize)]
pub struct ExecutionSummary {
    #[serde(flatten)]
    pub execution: TestExecution,
    pub test_case_name: String,
    pub submodule_name: String,
    pub module_name: String,
    pub project_name: String,
}

/// Filters for execution list endpoints.
#[derive(Debug, Default, Deserialize)]
pub struct ExecutionFilter {
    pub assigned_user_id: Option<String>,
    pub module_id: Option<String>,
    pub status: Option<ExecutionStatus>,
}
