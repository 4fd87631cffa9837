//! Response generation
//!
//! A [`Generator`] turns an [`InstructionEnvelope`] into reply text.
//! - [`RemoteGenerator`]: OpenAI-compatible chat completions over HTTP
//! - [`FallbackGenerator`]: deterministic rule-based replies used when the
//!   provider is unavailable

mod fallback;
mod remote;

pub use fallback::FallbackGenerator;
pub use remote::RemoteGenerator;

use async_trait::async_trait;

use crate::error::Result;
use crate::personality::InstructionEnvelope;

/// Produces reply text for an envelope.
///
/// Failures are reported as [`crate::KindredError::ProviderUnavailable`] so
/// the caller can substitute a fallback reply.
#[async_trait]
pub trait Generator: Send + Sync {
    async fn generate(&self, envelope: &InstructionEnvelope) -> Result<String>;

    /// Return the name of this generator for logging
    fn name(&self) -> &'static str;
}
