use serde::{Deserialize, Serialize};

use crate::error::{msg, AppError, Result};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TestCase {
    pub id: String,
    pub submodule_id: String,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub created_at: i64,
    pub updated_at: i64,
}

/// One step of a test case. Immutable once created - execution history
/// references steps by id, so editing a step would rewrite the past.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TestStep {
    pub id: String,
    pub test_case_id: String,
    pub step_number: i64,
    pub action: String,
    pub expected_result: String,
    pub created_at: i64,
}

#[derive(Debug, Deserialize)]
pub struct CreateTestStep {
    pub step_number: i64,
    pub action: String,
    pub expected_result: String,
}

#[derive(Debug, Deserialize)]
pub struct CreateTestCase {
    pub name: String,
    pub description: Option<String>,
    #[serde(default)]
    pub steps: Vec<CreateTestStep>,
}

impl CreateTestCase {
    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(AppError::BadRequest(msg::NAME_EMPTY.into()));
        }
        // Gaps are fine, regressions and duplicates are not.
        let mut prev: Option<i64> = None;
        for step in &self.steps {
            if let Some(p) = prev {
                if step.step_number <= p {
                    return Err(AppError::BadRequest(msg::STEPS_NOT_INCREASING.into()));
                }
            }
            prev = Some(step.step_number);
        }
        Ok(())
    }
}

#[derive(Debug, Deserialize)]
pub struct UpdateTestCase {
    pub name: Option<String>,
    pub description: Option<String>,
}

impl UpdateTestCase {
    pub fn validate(&self) -> Result<()> {
        if let Some(ref name) = self.name {
            if name.trim().is_empty() {
                return Err(AppError::BadRequest(msg::NAME_EMPTY.into()));
            }
        }
        Ok(())
    }
}

/// Test case with its steps, as returned by detail endpoints.
#[derive(Debug, Serialize)]
pub struct TestCaseWithSteps {
    #[serde(flatten)]
    pub case: TestCase,
    pub steps: Vec<TestStep>,
}
