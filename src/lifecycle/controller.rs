use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::task::JoinHandle;

use crate::channel::BoundedUpdateChannel;
use crate::crew::CrewRunner;
use crate::error::{LifecycleError, UpdateError};
use crate::types::{FactoryConfig, WorkerId};

use super::state::{LifecycleEvent, LifecycleState};
use super::worker::{CrewWorker, StopSignal, WorkerOutcome};

pub const DEFAULT_STOP_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Clone)]
pub struct ControllerConfig {
    /// How long a restart waits for the previous worker to exit.
    pub stop_timeout: Duration,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            stop_timeout: DEFAULT_STOP_TIMEOUT,
        }
    }
}

struct ActiveWorker {
    id: WorkerId,
    generation: u64,
    stop: StopSignal,
    handle: JoinHandle<WorkerOutcome>,
}

struct WorkerSlot {
    state: LifecycleState,
    generation: u64,
    current: Option<ActiveWorker>,
}

impl WorkerSlot {
    /// A worker that returned on its own counts as stopped.
    fn reconcile(&mut self) {
        let finished = self
            .current
            .as_ref()
            .is_some_and(|active| active.handle.is_finished());
        if finished {
            self.state = self
                .state
                .transition(LifecycleEvent::Exited, self.generation)
                .unwrap_or(LifecycleState::Stopped);
        }
    }
}

/// Owns the single crew worker and restarts it on demand.
///
/// Stopping is cooperative: the worker only checks its stop signal before it
/// kicks off the crew. A worker that is already inside the crew run when a
/// restart times out is left to finish on its own, and whatever it emits
/// afterwards still lands in the (cleared) channel.
pub struct CrewLifecycleController {
    channel: Arc<BoundedUpdateChannel>,
    runner: Arc<dyn CrewRunner>,
    factory: RwLock<FactoryConfig>,
    slot: Mutex<WorkerSlot>,
    config: ControllerConfig,
}

impl CrewLifecycleController {
    pub fn new(
        channel: Arc<BoundedUpdateChannel>,
        runner: Arc<dyn CrewRunner>,
        factory: FactoryConfig,
        config: ControllerConfig,
    ) -> Self {
        Self {
            channel,
            runner,
            factory: RwLock::new(factory),
            slot: Mutex::new(WorkerSlot {
                state: LifecycleState::Idle,
                generation: 0,
                current: None,
            }),
            config,
        }
    }

    pub fn channel(&self) -> &Arc<BoundedUpdateChannel> {
        &self.channel
    }

    pub fn factory_config(&self) -> FactoryConfig {
        self.factory
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub async fn state(&self) -> LifecycleState {
        let mut slot = self.slot.lock().await;
        slot.reconcile();
        slot.state
    }

    pub async fn generation(&self) -> u64 {
        self.slot.lock().await.generation
    }

    /// Spawns a worker from Idle or Stopped. Returns its generation.
    pub async fn start(&self) -> Result<u64, LifecycleError> {
        let mut slot = self.slot.lock().await;
        self.start_locked(&mut slot)
    }

    /// Stops the current worker (best effort), clears the channel and starts
    /// a new worker. Succeeds even if the previous worker did not stop in time.
    pub async fn request_restart(&self) -> Result<u64, LifecycleError> {
        let mut slot = self.slot.lock().await;
        self.stop_locked(&mut slot).await;

        let discarded = self.channel.clear();
        if discarded > 0 {
            log::debug!("Discarded {} queued updates before restart", discarded);
        }

        let generation = self.start_locked(&mut slot)?;
        log::info!("Crew restarted (generation {})", generation);
        Ok(generation)
    }

    pub async fn update_goal(&self, goal: impl Into<String>) -> Result<u64, UpdateError> {
        let goal = goal.into();
        {
            let mut factory = self.factory.write().unwrap_or_else(PoisonError::into_inner);
            factory.set_goal(goal.as_str())?;
        }
        log::info!("Factory director goal updated: {}", goal);
        Ok(self.request_restart().await?)
    }

    pub async fn update_backstory(&self, backstory: impl Into<String>) -> Result<u64, UpdateError> {
        let backstory = backstory.into();
        {
            let mut factory = self.factory.write().unwrap_or_else(PoisonError::into_inner);
            factory.set_backstory(backstory.as_str())?;
        }
        log::info!("Factory director backstory updated: {}", backstory);
        Ok(self.request_restart().await?)
    }

    /// Signals the current worker and waits for it within the stop timeout.
    pub async fn shutdown(&self) {
        let mut slot = self.slot.lock().await;
        self.stop_locked(&mut slot).await;
    }

    fn start_locked(&self, slot: &mut WorkerSlot) -> Result<u64, LifecycleError> {
        slot.reconcile();
        slot.state = slot
            .state
            .transition(LifecycleEvent::Start, slot.generation)?;
        slot.generation += 1;

        let stop = StopSignal::new();
        let worker = CrewWorker::new(
            slot.generation,
            self.factory_config(),
            self.channel.clone(),
            self.runner.clone(),
            stop.clone(),
        );
        let id = worker.id();
        let handle = tokio::spawn(worker.run());

        slot.current = Some(ActiveWorker {
            id,
            generation: slot.generation,
            stop,
            handle,
        });
        Ok(slot.generation)
    }

    async fn stop_locked(&self, slot: &mut WorkerSlot) {
        let Some(active) = slot.current.take() else {
            return;
        };

        slot.state = slot
            .state
            .transition(LifecycleEvent::RequestStop, active.generation)
            .unwrap_or(LifecycleState::StopRequested);
        active.stop.request();

        // On timeout the join handle is dropped, which detaches the task
        // without cancelling it.
        match tokio::time::timeout(self.config.stop_timeout, active.handle).await {
            Ok(Ok(outcome)) => {
                log::info!(
                    "Worker {} (generation {}) exited: {:?}",
                    active.id,
                    active.generation,
                    outcome
                );
            }
            Ok(Err(e)) => {
                log::error!("Worker {} terminated abnormally: {}", active.id, e);
            }
            Err(_) => {
                let err = LifecycleError::StopTimedOut {
                    generation: active.generation,
                    timeout: self.config.stop_timeout,
                };
                log::warn!("{}; continuing without it", err);
            }
        }

        slot.state = slot
            .state
            .transition(LifecycleEvent::Exited, active.generation)
            .unwrap_or(LifecycleState::Stopped);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crew::{Crew, ScriptedCrewRunner, TaskObserver};
    use crate::error::ValidationError;
    use crate::types::{UpdateKind, UpdateMessage};
    use async_trait::async_trait;
    use serde_json::Value;
    use tokio::sync::Semaphore;

    /// Reports the director's goal once, after a short pause. Runs whose goal
    /// is "stuck" block until the gate is opened.
    struct GoalEchoRunner {
        delay: Duration,
        gate: Arc<Semaphore>,
    }

    impl GoalEchoRunner {
        fn new(delay: Duration) -> Self {
            Self {
                delay,
                gate: Arc::new(Semaphore::new(0)),
            }
        }
    }

    #[async_trait]
    impl CrewRunner for GoalEchoRunner {
        async fn kickoff(
            &self,
            crew: &Crew,
            observer: &dyn TaskObserver,
        ) -> anyhow::Result<Value> {
            let goal = crew.agents()[0].goal.clone();
            if goal == "stuck" {
                let _permit = self.gate.acquire().await?;
            }
            tokio::time::sleep(self.delay).await;
            observer.on_task_output("Factory Director", &goal);
            Ok(Value::String(goal))
        }
    }

    fn controller_with(
        runner: Arc<dyn CrewRunner>,
        stop_timeout: Duration,
    ) -> CrewLifecycleController {
        CrewLifecycleController::new(
            Arc::new(BoundedUpdateChannel::new(100)),
            runner,
            FactoryConfig::default(),
            ControllerConfig { stop_timeout },
        )
    }

    fn drain(channel: &BoundedUpdateChannel) -> Vec<UpdateMessage> {
        std::iter::from_fn(|| channel.try_get()).collect()
    }

    async fn wait_for(channel: &BoundedUpdateChannel, kind: UpdateKind) -> UpdateMessage {
        tokio::time::timeout(Duration::from_secs(2), async {
            loop {
                let message = channel.get().await;
                if message.kind == kind {
                    return message;
                }
            }
        })
        .await
        .expect("timed out waiting for update")
    }

    #[tokio::test]
    async fn test_starts_idle() {
        let controller = controller_with(Arc::new(ScriptedCrewRunner::new()), DEFAULT_STOP_TIMEOUT);
        assert_eq!(controller.state().await, LifecycleState::Idle);
        assert_eq!(controller.generation().await, 0);
    }

    #[tokio::test]
    async fn test_start_rejected_while_running() {
        let runner = ScriptedCrewRunner::new().with_task_delay(Duration::from_millis(200));
        let controller = controller_with(Arc::new(runner), DEFAULT_STOP_TIMEOUT);

        assert_eq!(controller.start().await.unwrap(), 1);
        assert_eq!(controller.state().await, LifecycleState::Running);
        assert_eq!(
            controller.start().await,
            Err(LifecycleError::AlreadyRunning { generation: 1 })
        );
    }

    #[tokio::test]
    async fn test_finished_worker_reported_stopped() {
        let controller = controller_with(Arc::new(ScriptedCrewRunner::new()), DEFAULT_STOP_TIMEOUT);
        controller.start().await.unwrap();
        wait_for(controller.channel(), UpdateKind::Complete).await;
        tokio::time::sleep(Duration::from_millis(20)).await;

        assert_eq!(controller.state().await, LifecycleState::Stopped);
        assert_eq!(controller.start().await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_restart_clears_stale_updates() {
        let controller = controller_with(Arc::new(ScriptedCrewRunner::new()), DEFAULT_STOP_TIMEOUT);
        controller.channel().put(UpdateMessage::status("stale"));

        controller.request_restart().await.unwrap();

        let first = wait_for(controller.channel(), UpdateKind::Status).await;
        assert_ne!(first.message, "stale");
        assert_eq!(controller.generation().await, 1);
    }

    #[tokio::test]
    async fn test_back_to_back_restarts_leave_latest_worker() {
        let runner = GoalEchoRunner::new(Duration::from_millis(30));
        let controller = controller_with(Arc::new(runner), DEFAULT_STOP_TIMEOUT);
        controller.start().await.unwrap();

        controller.update_goal("first").await.unwrap();
        controller.update_goal("second").await.unwrap();
        tokio::time::sleep(Duration::from_millis(150)).await;

        let messages = drain(controller.channel());
        let outputs: Vec<&str> = messages
            .iter()
            .filter(|m| m.kind != UpdateKind::Status)
            .map(|m| m.message.as_str())
            .collect();
        assert_eq!(outputs, vec!["second", "second"]);
        assert_eq!(controller.generation().await, 3);
        assert_eq!(controller.state().await, LifecycleState::Stopped);
    }

    #[tokio::test]
    async fn test_late_message_after_timed_out_restart() {
        let runner = Arc::new(GoalEchoRunner::new(Duration::ZERO));
        let gate = runner.gate.clone();
        let controller = controller_with(runner, Duration::from_millis(50));

        controller.update_goal("stuck").await.unwrap();
        wait_for(controller.channel(), UpdateKind::Status).await;

        // The stuck worker ignores the stop signal; restart gives up and
        // starts a fresh worker anyway.
        controller.update_goal("fresh").await.unwrap();
        let fresh = wait_for(controller.channel(), UpdateKind::Complete).await;
        assert_eq!(fresh.message, "fresh");

        // Releasing the abandoned worker delivers its result into the
        // already-cleared channel. This race is accepted.
        gate.add_permits(1);
        let late = wait_for(controller.channel(), UpdateKind::Complete).await;
        assert_eq!(late.message, "stuck");
    }

    #[tokio::test]
    async fn test_invalid_update_leaves_config_and_worker() {
        let controller = controller_with(Arc::new(ScriptedCrewRunner::new()), DEFAULT_STOP_TIMEOUT);
        let before = controller.factory_config();

        let err = controller.update_goal("").await.unwrap_err();
        assert!(matches!(
            err,
            UpdateError::Validation(ValidationError::Empty { field: "goal" })
        ));
        assert!(controller.update_backstory("  ").await.is_err());

        assert_eq!(controller.factory_config(), before);
        assert_eq!(controller.generation().await, 0);
        assert_eq!(controller.state().await, LifecycleState::Idle);
    }

    #[tokio::test]
    async fn test_update_backstory_restarts_with_new_snapshot() {
        let controller = controller_with(Arc::new(ScriptedCrewRunner::new()), DEFAULT_STOP_TIMEOUT);

        let generation = controller.update_backstory("Former QA lead").await.unwrap();

        assert_eq!(generation, 1);
        assert_eq!(controller.factory_config().backstory(), "Former QA lead");
        wait_for(controller.channel(), UpdateKind::Complete).await;
    }

    #[tokio::test]
    async fn test_shutdown_stops_worker() {
        let runner = ScriptedCrewRunner::new().with_task_delay(Duration::from_millis(10));
        let controller = controller_with(Arc::new(runner), DEFAULT_STOP_TIMEOUT);
        controller.start().await.unwrap();

        controller.shutdown().await;
        assert_eq!(controller.state().await, LifecycleState::Stopped);
    }
}
