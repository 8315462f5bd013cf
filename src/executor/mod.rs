pub mod output;
pub mod tofu;

#[cfg(test)]
pub mod fake;

pub use tofu::TofuDriver;

use crate::error::Result;
use crate::models::{EngineAction, ExecutionResult};
use async_trait::async_trait;
use std::path::Path;

/// Runs the infrastructure-as-code engine against a workspace.
///
/// Implementations never chain actions; sequencing belongs to the caller.
#[async_trait]
pub trait EngineDriver: Send + Sync {
    async fn run(&self, workspace: &Path, action: EngineAction) -> Result<ExecutionResult>;

    async fn version(&self) -> Result<String>;
}
