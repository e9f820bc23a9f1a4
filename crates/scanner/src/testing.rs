//! Test doubles for the scanner adapter.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;

use crate::error::ScanError;
use crate::scanner::{MalwareScanner, ScanVerdict};

/// What a [`StaticScanner`] does with every payload it sees.
#[derive(Debug, Clone)]
pub enum StaticBehavior {
    /// Always report clean.
    Clean,
    /// Always report a match with this signature.
    Infected(String),
    /// Always fail with a connection error.
    Unavailable(String),
    /// Always time out.
    TimedOut(Duration),
}

/// A scanner that returns a fixed outcome and counts its calls.
#[derive(Debug)]
pub struct StaticScanner {
    behavior: StaticBehavior,
    calls: AtomicUsize,
}

impl StaticScanner {
    pub fn new(behavior: StaticBehavior) -> Self {
        Self {
            behavior,
            calls: AtomicUsize::new(0),
        }
    }

    /// A scanner that passes everything.
    pub fn clean() -> Self {
        Self::new(StaticBehavior::Clean)
    }

    /// A scanner that flags everything with `signature`.
    pub fn infected(signature: &str) -> Self {
        Self::new(StaticBehavior::Infected(signature.to_owned()))
    }

    /// A scanner that always fails.
    pub fn unavailable(message: &str) -> Self {
        Self::new(StaticBehavior::Unavailable(message.to_owned()))
    }

    /// How many payloads have been scanned.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl MalwareScanner for StaticScanner {
    fn name(&self) -> &str {
        "static"
    }

    async fn scan(&self, _data: &[u8]) -> Result<ScanVerdict, ScanError> {
        self.calls.fetch_add(1, Ordering::Relaxed);
        match &self.behavior {
            StaticBehavior::Clean => Ok(ScanVerdict::Clean),
            StaticBehavior::Infected(signature) => Ok(ScanVerdict::Infected {
                signature: signature.clone(),
            }),
            StaticBehavior::Unavailable(message) => Err(ScanError::Connection(message.clone())),
            StaticBehavior::TimedOut(after) => Err(ScanError::Timeout(*after)),
        }
    }

    async fn health_check(&self) -> Result<(), ScanError> {
        match &self.behavior {
            StaticBehavior::Unavailable(message) => Err(ScanError::Connection(message.clone())),
            StaticBehavior::TimedOut(after) => Err(ScanError::Timeout(*after)),
            _ => Ok(()),
        }
    }
}
