use crate::error::ValidationError;
use crate::types::FactoryConfig;

use super::definition::{AgentSpec, Crew, TaskSpec};

pub const FACTORY_DIRECTOR: &str = "Factory Director";
pub const PROJECT_MANAGER: &str = "Project Manager";
pub const DEVELOPER: &str = "Developer";
pub const TESTER: &str = "Tester";

fn project_manager() -> AgentSpec {
    AgentSpec::new(
        PROJECT_MANAGER,
        "Plans the tasks and organizes the team's work",
        "Produce a clear and effective development plan",
        "Project management expert with 10 years of experience",
    )
}

fn developer() -> AgentSpec {
    AgentSpec::new(
        DEVELOPER,
        "Writes clean and efficient code",
        "Turn specifications into working code",
        "Senior developer with deep knowledge of good practices",
    )
}

fn tester() -> AgentSpec {
    AgentSpec::new(
        TESTER,
        "Tests the code and improves its quality",
        "Ensure the code is correct and reliable",
        "QA expert with a sharp eye for detail",
    )
}

fn delivery_tasks() -> Result<Vec<TaskSpec>, ValidationError> {
    Ok(vec![
        TaskSpec::new(
            "Write a detailed plan for developing the project",
            "Document covering the steps, features and technical considerations",
            PROJECT_MANAGER,
        )?,
        TaskSpec::new(
            "Write the code according to the plan, including error handling and documentation",
            "Working, documented code",
            DEVELOPER,
        )?,
        TaskSpec::new(
            "Test the code and suggest improvements",
            "Test report listing the cases covered and suggested improvements",
            TESTER,
        )?,
    ])
}

/// The streamed crew: a director driven by the factory config, leading the
/// development crew.
pub fn factory_crew(config: &FactoryConfig) -> Result<Crew, ValidationError> {
    let director = AgentSpec::new(
        FACTORY_DIRECTOR,
        "Steers the team and guarantees the quality of the deliverable",
        config.goal(),
        config.backstory(),
    )
    .with_delegation(true);

    let mut tasks = vec![TaskSpec::new(
        "Supervise and coordinate the team's work to reach the objectives",
        "Supervision report and recommendations for the team",
        FACTORY_DIRECTOR,
    )?];
    tasks.extend(delivery_tasks()?);

    Crew::new(
        vec![director, project_manager(), developer(), tester()],
        tasks,
    )
}

/// Planner, developer and tester without a director.
pub fn development_crew() -> Result<Crew, ValidationError> {
    Crew::new(
        vec![project_manager(), developer(), tester()],
        delivery_tasks()?,
    )
}
