//! Cancellation hook handed to backends at connect time.
//!
//! The adapter never polls the signal itself. Backends call
//! [`Interrupt::check`] from inside their blocking loops and abort with
//! [`BackendError::Interrupted`] when it fires.

use std::{fmt, sync::Arc};

use tokio_util::sync::CancellationToken;

use crate::error::{BackendError, BackendResult};

/// Externally owned "should I stop" query.
pub trait CancellationSignal: Send + Sync {
    fn is_cancelled(&self) -> bool;
}

impl CancellationSignal for CancellationToken {
    fn is_cancelled(&self) -> bool {
        CancellationToken::is_cancelled(self)
    }
}

impl<F> CancellationSignal for F
where
    F: Fn() -> bool + Send + Sync,
{
    fn is_cancelled(&self) -> bool {
        self()
    }
}

/// Interrupt callback registered with a backend connection.
#[derive(Clone, Default)]
pub struct Interrupt {
    signal: Option<Arc<dyn CancellationSignal>>,
}

impl Interrupt {
    /// Hook that never fires.
    pub fn never() -> Self {
        Self { signal: None }
    }

    pub fn new<S: CancellationSignal + 'static>(signal: S) -> Self {
        Self {
            signal: Some(Arc::new(signal)),
        }
    }

    pub fn from_token(token: Option<CancellationToken>) -> Self {
        token.map_or_else(Self::never, Self::new)
    }

    /// Whether the in-flight operation should be aborted.
    pub fn should_abort(&self) -> bool {
        self.signal.as_ref().is_some_and(|s| s.is_cancelled())
    }

    /// `Err(Interrupted)` once the signal has fired.
    pub fn check(&self) -> BackendResult<()> {
        if self.should_abort() {
            Err(BackendError::Interrupted)
        } else {
            Ok(())
        }
    }
}

impl fmt::Debug for Interrupt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Interrupt")
            .field("armed", &self.signal.is_some())
            .field("aborting", &self.should_abort())
            .finish()
    }
}
