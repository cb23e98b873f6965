pub mod factory;
pub mod update;

pub use factory::FactoryConfig;
pub use update::{UpdateKind, UpdateMessage};

use uuid::Uuid;

pub type WorkerId = Uuid;
