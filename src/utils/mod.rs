//! Small helpers shared across pipeline stages

pub mod deadline;

pub use deadline::with_timeout;
