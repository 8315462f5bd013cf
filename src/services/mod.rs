pub mod orchestrator;

pub use orchestrator::{OperationReport, Orchestrator};
