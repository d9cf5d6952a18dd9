pub mod broker;
pub mod direct;

pub use broker::{normalize_status, HttpJobBroker};
pub use direct::HttpDirectProcessor;
