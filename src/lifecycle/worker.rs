use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::channel::BoundedUpdateChannel;
use crate::crew::{factory_crew, CrewRunner};
use crate::types::update::describe_output;
use crate::types::{FactoryConfig, UpdateMessage, WorkerId};

pub const STARTED_MESSAGE: &str = "Crew assembled, starting work...";

/// Cooperative stop flag shared between the controller and one worker.
#[derive(Debug, Clone, Default)]
pub struct StopSignal(Arc<AtomicBool>);

impl StopSignal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn request(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_requested(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerOutcome {
    Skipped,
    Completed,
    Failed,
}

/// One crew-execution attempt, bound to a snapshot of the factory config.
pub struct CrewWorker {
    id: WorkerId,
    generation: u64,
    config: FactoryConfig,
    channel: Arc<BoundedUpdateChannel>,
    runner: Arc<dyn CrewRunner>,
    stop: StopSignal,
}

impl CrewWorker {
    pub fn new(
        generation: u64,
        config: FactoryConfig,
        channel: Arc<BoundedUpdateChannel>,
        runner: Arc<dyn CrewRunner>,
        stop: StopSignal,
    ) -> Self {
        Self {
            id: WorkerId::new_v4(),
            generation,
            config,
            channel,
            runner,
            stop,
        }
    }

    pub fn id(&self) -> WorkerId {
        self.id
    }

    pub async fn run(self) -> WorkerOutcome {
        // The only checkpoint: once kickoff starts it runs to completion.
        if self.stop.is_requested() {
            log::info!(
                "Worker {} (generation {}) stopped before start",
                self.id,
                self.generation
            );
            return WorkerOutcome::Skipped;
        }

        log::info!(
            "Starting crew worker {} (generation {})",
            self.id,
            self.generation
        );

        let crew = match factory_crew(&self.config) {
            Ok(crew) => crew,
            Err(e) => {
                log::error!("Failed to assemble crew: {}", e);
                self.channel
                    .put(UpdateMessage::error(format!("Crew run failed: {}", e)));
                return WorkerOutcome::Failed;
            }
        };

        self.channel.put(UpdateMessage::status(STARTED_MESSAGE));

        let channel = self.channel.clone();
        let observer = move |role: &str, output: &str| {
            log::info!("Task output from {}: {}...", role, preview(output, 100));
            channel.put(UpdateMessage::task_update(role, output));
        };

        log::info!("Kicking off crew work");
        match self.runner.kickoff(&crew, &observer).await {
            Ok(result) => {
                log::info!("Crew work finished (generation {})", self.generation);
                self.channel
                    .put(UpdateMessage::complete(describe_output(&result)));
                WorkerOutcome::Completed
            }
            Err(e) => {
                let message = format!("Crew run failed: {}", e);
                log::error!("{}", message);
                self.channel.put(UpdateMessage::error(message));
                WorkerOutcome::Failed
            }
        }
    }
}

fn preview(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((index, _)) => &text[..index],
        None => text,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crew::{Crew, ScriptedCrewRunner, TaskObserver};
    use crate::types::UpdateKind;
    use async_trait::async_trait;
    use serde_json::{json, Value};

    struct ReviewRunner;

    #[async_trait]
    impl CrewRunner for ReviewRunner {
        async fn kickoff(
            &self,
            _crew: &Crew,
            _observer: &dyn TaskObserver,
        ) -> anyhow::Result<Value> {
            Ok(json!({"approved": true, "issues": 0}))
        }
    }

    fn drain(channel: &BoundedUpdateChannel) -> Vec<UpdateMessage> {
        std::iter::from_fn(|| channel.try_get()).collect()
    }

    fn worker(
        runner: impl CrewRunner + 'static,
        stop: StopSignal,
    ) -> (CrewWorker, Arc<BoundedUpdateChannel>) {
        let channel = Arc::new(BoundedUpdateChannel::new(100));
        let worker = CrewWorker::new(
            1,
            FactoryConfig::default(),
            channel.clone(),
            Arc::new(runner),
            stop,
        );
        (worker, channel)
    }

    #[tokio::test]
    async fn test_successful_run_message_sequence() {
        let (worker, channel) = worker(ScriptedCrewRunner::new(), StopSignal::new());

        assert_eq!(worker.run().await, WorkerOutcome::Completed);

        let kinds: Vec<UpdateKind> = drain(&channel).iter().map(|m| m.kind).collect();
        assert_eq!(
            kinds,
            vec![
                UpdateKind::Status,
                UpdateKind::TaskUpdate,
                UpdateKind::TaskUpdate,
                UpdateKind::TaskUpdate,
                UpdateKind::TaskUpdate,
                UpdateKind::Complete,
            ]
        );
    }

    #[tokio::test]
    async fn test_task_updates_carry_agent_role() {
        let (worker, channel) = worker(ScriptedCrewRunner::new(), StopSignal::new());
        worker.run().await;

        let messages = drain(&channel);
        assert!(messages[0].agent.is_none());
        assert_eq!(messages[1].agent.as_deref(), Some("Factory Director"));
        assert_eq!(messages[4].agent.as_deref(), Some("Tester"));
        assert!(messages[5].agent.is_none());
    }

    #[tokio::test]
    async fn test_runner_failure_becomes_error_message() {
        let runner = ScriptedCrewRunner::new().failing("model unavailable");
        let (worker, channel) = worker(runner, StopSignal::new());

        assert_eq!(worker.run().await, WorkerOutcome::Failed);

        let messages = drain(&channel);
        let last = messages.last().unwrap();
        assert_eq!(last.kind, UpdateKind::Error);
        assert_eq!(last.message, "Crew run failed: model unavailable");
    }

    #[tokio::test]
    async fn test_complete_carries_final_output() {
        let (worker, channel) = worker(ScriptedCrewRunner::new(), StopSignal::new());
        worker.run().await;

        let last = drain(&channel).pop().unwrap();
        assert_eq!(last.kind, UpdateKind::Complete);
        assert_eq!(
            last.message,
            "Tester: Test the code and suggest improvements"
        );
    }

    #[tokio::test]
    async fn test_structured_result_encoded_as_json() {
        let (worker, channel) = worker(ReviewRunner, StopSignal::new());

        assert_eq!(worker.run().await, WorkerOutcome::Completed);

        let messages = drain(&channel);
        assert_eq!(messages.len(), 2);
        let result: Value = serde_json::from_str(&messages[1].message).unwrap();
        assert_eq!(result, json!({"approved": true, "issues": 0}));
    }

    #[tokio::test]
    async fn test_stop_checked_before_start() {
        let stop = StopSignal::new();
        stop.request();
        let (worker, channel) = worker(ScriptedCrewRunner::new(), stop);

        assert_eq!(worker.run().await, WorkerOutcome::Skipped);
        assert!(channel.is_empty());
    }

    #[test]
    fn test_stop_signal_shared_between_clones() {
        let stop = StopSignal::new();
        let seen_by_worker = stop.clone();
        assert!(!seen_by_worker.is_requested());
        stop.request();
        assert!(seen_by_worker.is_requested());
    }

    #[test]
    fn test_preview_respects_char_boundaries() {
        assert_eq!(preview("short", 100), "short");
        assert_eq!(preview("équipe", 2), "éq");
    }
}
