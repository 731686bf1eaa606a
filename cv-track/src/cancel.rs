use crate::TrackError;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// A shared flag that asks a running [`Tracker::track`](crate::Tracker::track) to stop.
///
/// Clones share the flag, so one clone can be handed to another thread and cancelled from
/// there. The tracker checks it before every detector call.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }

    /// Returns [`TrackError::Cancelled`] once [`CancelToken::cancel`] has been called.
    pub fn check(&self) -> Result<(), TrackError> {
        if self.is_cancelled() {
            Err(TrackError::Cancelled)
        } else {
            Ok(())
        }
    }
}
