//! Cooperative interruption for long grid sweeps

use crate::error::{Error, Result};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Shared flag that long-running sweeps poll between processing waves.
///
/// Cloning the token shares the flag, so a caller can keep one clone and
/// hand the other to an algorithm running on another thread. The default
/// token is never triggered.
#[derive(Debug, Clone, Default)]
pub struct Interrupt {
    flag: Option<Arc<AtomicBool>>,
}

impl Interrupt {
    /// A token that can be triggered
    pub fn new() -> Self {
        Self {
            flag: Some(Arc::new(AtomicBool::new(false))),
        }
    }

    /// A token that never fires
    pub fn none() -> Self {
        Self { flag: None }
    }

    /// Request interruption
    pub fn trigger(&self) {
        if let Some(flag) = &self.flag {
            flag.store(true, Ordering::SeqCst);
        }
    }

    /// Whether interruption has been requested
    pub fn is_triggered(&self) -> bool {
        self.flag
            .as_ref()
            .is_some_and(|flag| flag.load(Ordering::Relaxed))
    }

    /// Fail with [`Error::Interrupted`] if interruption has been requested
    pub fn check(&self, stage: &'static str) -> Result<()> {
        if self.is_triggered() {
            Err(Error::Interrupted { stage })
        } else {
            Ok(())
        }
    }
}
