pub mod accounting;
pub mod config;
pub mod database;
pub mod error;
pub mod tracker;
pub mod utils;
pub mod workshop;

pub use error::{ErrorKind, TrackerError, TrackerResult};
pub use workshop::Workshop;
