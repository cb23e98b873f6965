use anyhow::Result;
use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;

use crate::providers::{LLMProvider, Message};

use super::definition::{Crew, TaskSpec};

/// Receives each task's output as the crew produces it.
pub trait TaskObserver: Send + Sync {
    fn on_task_output(&self, agent_role: &str, output: &str);
}

impl<F> TaskObserver for F
where
    F: Fn(&str, &str) + Send + Sync,
{
    fn on_task_output(&self, agent_role: &str, output: &str) {
        self(agent_role, output)
    }
}

/// Executes a crew end to end. The call is long-running and cannot be
/// interrupted once started. The result is whatever the last task produced,
/// plain text or structured.
#[async_trait]
pub trait CrewRunner: Send + Sync {
    async fn kickoff(&self, crew: &Crew, observer: &dyn TaskObserver) -> Result<Value>;
}

/// Runs tasks one after another against an LLM, feeding earlier outputs to
/// later tasks as context.
pub struct LlmCrewRunner {
    provider: Arc<dyn LLMProvider>,
}

impl LlmCrewRunner {
    pub fn new(provider: Arc<dyn LLMProvider>) -> Self {
        Self { provider }
    }

    fn build_messages(crew: &Crew, task: &TaskSpec, previous: &[(String, String)]) -> Vec<Message> {
        let persona = crew
            .agent_for(task)
            .map(|agent| agent.persona_prompt())
            .unwrap_or_else(|| format!("You are the {}.", task.agent));

        let mut prompt = format!(
            "Task: {}\n\nExpected output: {}",
            task.description, task.expected_output
        );
        if !previous.is_empty() {
            prompt.push_str("\n\nWork completed so far by the team:");
            for (role, output) in previous {
                prompt.push_str(&format!("\n\n## {}\n{}", role, output));
            }
        }

        vec![Message::system(persona), Message::user(prompt)]
    }
}

#[async_trait]
impl CrewRunner for LlmCrewRunner {
    async fn kickoff(&self, crew: &Crew, observer: &dyn TaskObserver) -> Result<Value> {
        let mut previous: Vec<(String, String)> = Vec::new();

        for (index, task) in crew.tasks().iter().enumerate() {
            log::info!(
                "Running task {}/{} for {}",
                index + 1,
                crew.tasks().len(),
                task.agent
            );
            let messages = Self::build_messages(crew, task, &previous);
            let output = self.provider.complete(messages).await?;
            observer.on_task_output(&task.agent, &output);
            previous.push((task.agent.clone(), output));
        }

        previous
            .pop()
            .map(|(_, output)| Value::String(output))
            .ok_or_else(|| anyhow::anyhow!("Crew has no tasks"))
    }
}

/// Deterministic runner that reports `"<role>: <description>"` for every
/// task without calling out to a model.
#[derive(Debug, Clone, Default)]
pub struct ScriptedCrewRunner {
    task_delay: Duration,
    failure: Option<String>,
}

impl ScriptedCrewRunner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_task_delay(mut self, delay: Duration) -> Self {
        self.task_delay = delay;
        self
    }

    /// Fails the run after the first task with the given message.
    pub fn failing(mut self, message: impl Into<String>) -> Self {
        self.failure = Some(message.into());
        self
    }
}

#[async_trait]
impl CrewRunner for ScriptedCrewRunner {
    async fn kickoff(&self, crew: &Crew, observer: &dyn TaskObserver) -> Result<Value> {
        let mut last = None;
        for task in crew.tasks() {
            if !self.task_delay.is_zero() {
                tokio::time::sleep(self.task_delay).await;
            }
            let output = format!("{}: {}", task.agent, task.description);
            observer.on_task_output(&task.agent, &output);

            if let Some(failure) = &self.failure {
                anyhow::bail!("{}", failure);
            }
            last = Some(Value::String(output));
        }
        last.ok_or_else(|| anyhow::anyhow!("Crew has no tasks"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crew::builtin::{development_crew, factory_crew};
    use crate::providers::MockLLMProvider;
    use crate::types::FactoryConfig;
    use std::sync::Mutex;

    struct RecordingProvider {
        calls: Mutex<Vec<Vec<Message>>>,
    }

    #[async_trait]
    impl LLMProvider for RecordingProvider {
        async fn complete(&self, messages: Vec<Message>) -> Result<String> {
            let mut calls = self.calls.lock().unwrap();
            calls.push(messages);
            Ok(format!("output {}", calls.len()))
        }
    }

    struct FailingProvider;

    #[async_trait]
    impl LLMProvider for FailingProvider {
        async fn complete(&self, _messages: Vec<Message>) -> Result<String> {
            anyhow::bail!("rate limited")
        }
    }

    #[tokio::test]
    async fn test_llm_runner_reports_each_task() {
        let provider = MockLLMProvider::with_response("done".to_string());
        let runner = LlmCrewRunner::new(Arc::new(provider));
        let crew = factory_crew(&FactoryConfig::default()).unwrap();
        let seen = Mutex::new(Vec::new());
        let observer = |role: &str, output: &str| {
            let mut seen = seen.lock().unwrap();
            seen.push((role.to_string(), output.to_string()));
        };

        let result = runner.kickoff(&crew, &observer).await.unwrap();

        assert_eq!(result, "done");
        let seen = seen.into_inner().unwrap();
        assert_eq!(seen.len(), 4);
        assert_eq!(seen[0].0, "Factory Director");
        assert_eq!(seen[3].0, "Tester");
    }

    #[tokio::test]
    async fn test_llm_runner_passes_previous_outputs() {
        let provider = Arc::new(RecordingProvider {
            calls: Mutex::new(Vec::new()),
        });
        let runner = LlmCrewRunner::new(provider.clone());
        let crew = development_crew().unwrap();

        let result = runner.kickoff(&crew, &|_: &str, _: &str| {}).await.unwrap();
        assert_eq!(result, "output 3");

        let calls = provider.calls.lock().unwrap();
        assert_eq!(calls.len(), 3);
        assert_eq!(calls[0][0].role, "system");
        assert!(calls[0][0].content.contains("Project Manager"));
        assert!(!calls[0][1].content.contains("Work completed so far"));
        assert!(calls[2][1].content.contains("output 1"));
        assert!(calls[2][1].content.contains("output 2"));
    }

    #[tokio::test]
    async fn test_llm_runner_propagates_provider_error() {
        let runner = LlmCrewRunner::new(Arc::new(FailingProvider));
        let crew = development_crew().unwrap();
        let err = runner
            .kickoff(&crew, &|_: &str, _: &str| {})
            .await
            .unwrap_err();
        assert!(err.to_string().contains("rate limited"));
    }

    #[tokio::test]
    async fn test_scripted_runner() {
        let crew = development_crew().unwrap();
        let count = Mutex::new(0);
        let observer = |_: &str, _: &str| *count.lock().unwrap() += 1;

        let result = ScriptedCrewRunner::new()
            .kickoff(&crew, &observer)
            .await
            .unwrap();
        assert_eq!(result, "Tester: Test the code and suggest improvements");
        assert_eq!(*count.lock().unwrap(), 3);
    }

    #[tokio::test]
    async fn test_scripted_runner_failure() {
        let crew = development_crew().unwrap();
        let count = Mutex::new(0);
        let observer = |_: &str, _: &str| *count.lock().unwrap() += 1;

        let err = ScriptedCrewRunner::new()
            .failing("boom")
            .kickoff(&crew, &observer)
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "boom");
        assert_eq!(*count.lock().unwrap(), 1);
    }
}
