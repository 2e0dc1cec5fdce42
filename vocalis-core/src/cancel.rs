//! Cooperative request cancellation.
//!
//! A `CancelFlag` is cloned into each CPU-bound stage of a request. Stages
//! poll it at frame-loop boundaries and bail out with
//! `VocalisError::Cancelled`, so a disconnected caller stops burning CPU at
//! the next boundary instead of running the full analysis to completion.

use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

use crate::error::{Result, VocalisError};

/// Shared cancellation flag, cheap to clone.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation. Idempotent.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::Release);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }

    /// Error-return form for use inside processing loops.
    pub fn check(&self) -> Result<()> {
        if self.is_cancelled() {
            Err(VocalisError::Cancelled)
        } else {
            Ok(())
        }
    }
}
