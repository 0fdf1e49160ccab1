//! Per-class concurrent call limits.

use std::collections::BTreeMap;
use std::sync::Arc;

use tokio::sync::{OwnedSemaphorePermit, Semaphore};

use super::AuthError;

/// Quota classes, each a fixed pool of call slots.
#[derive(Debug)]
pub struct QuotaRegistry {
    classes: BTreeMap<String, Arc<Semaphore>>,
}

/// One occupied call slot. The slot frees when this is dropped.
#[derive(Debug)]
pub struct QuotaPermit {
    class: String,
    _permit: OwnedSemaphorePermit,
}

impl QuotaPermit {
    #[must_use]
    pub fn class(&self) -> &str {
        &self.class
    }
}

impl QuotaRegistry {
    #[must_use]
    pub fn new(limits: &BTreeMap<String, usize>) -> Self {
        let classes = limits
            .iter()
            .map(|(class, &limit)| (class.clone(), Arc::new(Semaphore::new(limit))))
            .collect();
        Self { classes }
    }

    /// Take a call slot from `class` without waiting.
    pub fn acquire(&self, class: &str) -> Result<QuotaPermit, AuthError> {
        let semaphore = self
            .classes
            .get(class)
            .ok_or_else(|| AuthError::UnknownQuota(class.to_owned()))?;
        let permit = Arc::clone(semaphore)
            .try_acquire_owned()
            .map_err(|_| AuthError::QuotaExhausted(class.to_owned()))?;
        Ok(QuotaPermit {
            class: class.to_owned(),
            _permit: permit,
        })
    }

    /// Free slots in `class`, or `None` for an unknown class.
    #[must_use]
    pub fn available(&self, class: &str) -> Option<usize> {
        self.classes.get(class).map(|s| s.available_permits())
    }
}
