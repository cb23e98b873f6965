use serde::{Deserialize, Serialize};

use crate::error::ValidationError;
use crate::types::factory::require_non_empty;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentSpec {
    pub role: String,
    pub role_description: String,
    pub goal: String,
    pub backstory: String,
    #[serde(default)]
    pub allow_delegation: bool,
}

impl AgentSpec {
    pub fn new(
        role: impl Into<String>,
        role_description: impl Into<String>,
        goal: impl Into<String>,
        backstory: impl Into<String>,
    ) -> Self {
        Self {
            role: role.into(),
            role_description: role_description.into(),
            goal: goal.into(),
            backstory: backstory.into(),
            allow_delegation: false,
        }
    }

    pub fn with_delegation(mut self, allow: bool) -> Self {
        self.allow_delegation = allow;
        self
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        require_non_empty("role", &self.role)?;
        require_non_empty("goal", &self.goal)?;
        require_non_empty("backstory", &self.backstory)?;
        Ok(())
    }

    /// System prompt describing this agent's persona.
    pub fn persona_prompt(&self) -> String {
        let mut prompt = format!(
            "You are the {}. {}\n\nYour goal: {}\n\nBackground: {}",
            self.role, self.role_description, self.goal, self.backstory
        );
        if self.allow_delegation {
            prompt.push_str("\n\nYou coordinate the other team members and may hand work to them.");
        }
        prompt
    }
}

/// A unit of work assigned to one agent of the crew, by role.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskSpec {
    pub description: String,
    pub expected_output: String,
    pub agent: String,
}

impl TaskSpec {
    pub fn new(
        description: impl Into<String>,
        expected_output: impl Into<String>,
        agent: impl Into<String>,
    ) -> Result<Self, ValidationError> {
        let task = Self {
            description: description.into(),
            expected_output: expected_output.into(),
            agent: agent.into(),
        };
        task.validate()?;
        Ok(task)
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        require_non_empty("description", &self.description)?;
        require_non_empty("expected_output", &self.expected_output)?;
        require_non_empty("agent", &self.agent)?;
        Ok(())
    }
}

/// Agents plus the tasks they execute in order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Crew {
    agents: Vec<AgentSpec>,
    tasks: Vec<TaskSpec>,
}

impl Crew {
    pub fn new(agents: Vec<AgentSpec>, tasks: Vec<TaskSpec>) -> Result<Self, ValidationError> {
        for agent in &agents {
            agent.validate()?;
        }
        for task in &tasks {
            task.validate()?;
            if !agents.iter().any(|a| a.role == task.agent) {
                return Err(ValidationError::UnknownAgent {
                    task: task.description.clone(),
                    agent: task.agent.clone(),
                });
            }
        }
        Ok(Self { agents, tasks })
    }

    pub fn agents(&self) -> &[AgentSpec] {
        &self.agents
    }

    pub fn tasks(&self) -> &[TaskSpec] {
        &self.tasks
    }

    pub fn agent_for(&self, task: &TaskSpec) -> Option<&AgentSpec> {
        self.agents.iter().find(|a| a.role == task.agent)
    }
}
