pub mod execution;
pub mod operation;

pub use execution::{EngineAction, ExecutionOutcome, ExecutionResult};
pub use operation::{Action, FailureKind, OperationKey, OperationRecord, OperationStatus, Outcome};
