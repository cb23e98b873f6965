use serde::Serialize;

use crate::error::ValidationError;

pub const DEFAULT_GOAL: &str = "Lead the team and guarantee the quality of the deliverable";
pub const DEFAULT_BACKSTORY: &str =
    "Team management expert with strong experience in software development and quality";

/// Goal and backstory of the crew's director agent. Both fields are
/// non-empty at all times; every mutation goes through validation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FactoryConfig {
    goal: String,
    backstory: String,
}

impl FactoryConfig {
    pub fn new(
        goal: impl Into<String>,
        backstory: impl Into<String>,
    ) -> Result<Self, ValidationError> {
        let goal = goal.into();
        let backstory = backstory.into();
        require_non_empty("goal", &goal)?;
        require_non_empty("backstory", &backstory)?;
        Ok(Self { goal, backstory })
    }

    pub fn goal(&self) -> &str {
        &self.goal
    }

    pub fn backstory(&self) -> &str {
        &self.backstory
    }

    pub fn set_goal(&mut self, goal: impl Into<String>) -> Result<(), ValidationError> {
        let goal = goal.into();
        require_non_empty("goal", &goal)?;
        self.goal = goal;
        Ok(())
    }

    pub fn set_backstory(&mut self, backstory: impl Into<String>) -> Result<(), ValidationError> {
        let backstory = backstory.into();
        require_non_empty("backstory", &backstory)?;
        self.backstory = backstory;
        Ok(())
    }
}

impl Default for FactoryConfig {
    fn default() -> Self {
        Self {
            goal: DEFAULT_GOAL.to_string(),
            backstory: DEFAULT_BACKSTORY.to_string(),
        }
    }
}

pub(crate) fn require_non_empty(field: &'static str, value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        return Err(ValidationError::Empty { field });
    }
    Ok(())
}
