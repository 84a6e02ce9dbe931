pub mod event_bus;
pub mod orchestrator;
pub mod registry;

pub use event_bus::EventBus;
pub use orchestrator::Orchestrator;
pub use registry::{CancelToken, RunRegistry};
