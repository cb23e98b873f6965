pub mod api;
pub mod channel;
pub mod config;
pub mod crew;
pub mod error;
pub mod lifecycle;
pub mod providers;
pub mod types;

pub use channel::BoundedUpdateChannel;
pub use config::Config;
pub use lifecycle::CrewLifecycleController;
pub use types::*;
