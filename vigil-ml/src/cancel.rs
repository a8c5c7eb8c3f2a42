//! Cooperative cancellation for long-running stages.
//!
//! Stages hold a [`CancellationToken`] and call [`checkpoint`] before every
//! write, so a cancelled run stops without leaving new artifacts behind.

use crate::error::{PipelineError, Result};

pub use tokio_util::sync::CancellationToken;

/// `Err(Cancelled)` once `token` has fired, naming the `step` that was skipped.
pub fn checkpoint(token: &CancellationToken, step: &str) -> Result<()> {
    if token.is_cancelled() {
        tracing::warn!(step, "Run cancelled; skipping remaining writes");
        return Err(PipelineError::cancelled(step));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_checkpoint_passes_until_cancelled() {
        let token = CancellationToken::new();
        assert!(checkpoint(&token, "drift report").is_ok());

        token.clone().cancel();
        let err = checkpoint(&token, "drift report").unwrap_err();
        assert!(matches!(err, PipelineError::Cancelled(ref step) if step == "drift report"));
        assert_eq!(err.to_string(), "Cancelled before drift report");
    }
}
