pub mod controller;
pub mod state;
pub mod worker;

pub use controller::{ControllerConfig, CrewLifecycleController};
pub use state::{LifecycleEvent, LifecycleState};
pub use worker::{CrewWorker, StopSignal, WorkerOutcome};
