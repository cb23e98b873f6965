use serde::{Deserialize, Serialize};

use crate::error::LifecycleError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LifecycleState {
    Idle,          // No worker spawned yet
    Running,       // Worker executing
    StopRequested, // Stop signalled, waiting for the worker to exit
    Stopped,       // Worker exited or was abandoned
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleEvent {
    Start,
    RequestStop,
    Exited,
}

impl LifecycleState {
    pub fn transition(
        self,
        event: LifecycleEvent,
        generation: u64,
    ) -> Result<Self, LifecycleError> {
        let next = match (self, event) {
            (LifecycleState::Idle | LifecycleState::Stopped, LifecycleEvent::Start) => {
                LifecycleState::Running
            }
            (LifecycleState::Running | LifecycleState::StopRequested, LifecycleEvent::Start) => {
                return Err(LifecycleError::AlreadyRunning { generation });
            }
            (LifecycleState::Running, LifecycleEvent::RequestStop) => LifecycleState::StopRequested,
            (LifecycleState::Running | LifecycleState::StopRequested, LifecycleEvent::Exited) => {
                LifecycleState::Stopped
            }
            (state, LifecycleEvent::RequestStop | LifecycleEvent::Exited) => state,
        };
        Ok(next)
    }

    pub fn as_str(&self) -> &str {
        match self {
            LifecycleState::Idle => "idle",
            LifecycleState::Running => "running",
            LifecycleState::StopRequested => "stop_requested",
            LifecycleState::Stopped => "stopped",
        }
    }
}
