pub mod bounded;

pub use bounded::{BoundedUpdateChannel, MAX_QUEUE_SIZE};
