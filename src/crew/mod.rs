pub mod builtin;
pub mod definition;
pub mod runner;

pub use builtin::{development_crew, factory_crew};
pub use definition::{AgentSpec, Crew, TaskSpec};
pub use runner::{CrewRunner, LlmCrewRunner, ScriptedCrewRunner, TaskObserver};
