use std::{future::Future, sync::Arc, time::Duration};

use netstream::{BackendError, BackendResult, Interrupt};
use tokio::runtime::Runtime;

/// Drives async HTTP work from the synchronous connection interface.
///
/// A future is raced against a periodic check of the interrupt hook, so a
/// call stuck on the network returns [`BackendError::Interrupted`] shortly
/// after cancellation.
#[derive(Clone, Debug)]
pub struct Blocking {
    runtime: Arc<Runtime>,
    interrupt: Interrupt,
    every: Duration,
}

impl Blocking {
    pub fn new(runtime: Arc<Runtime>, interrupt: Interrupt, every: Duration) -> Self {
        Self {
            runtime,
            interrupt,
            every,
        }
    }

    pub fn run<F>(&self, fut: F) -> BackendResult<F::Output>
    where
        F: Future,
    {
        self.interrupt.check()?;
        self.runtime
            .block_on(until_interrupted(fut, &self.interrupt, self.every))
    }
}

async fn until_interrupted<F>(fut: F, interrupt: &Interrupt, every: Duration) -> BackendResult<F::Output>
where
    F: Future,
{
    let mut ticker = tokio::time::interval(every);
    tokio::pin!(fut);
    loop {
        tokio::select! {
            out = &mut fut => return Ok(out),
            _ = ticker.tick() => {
                if interrupt.should_abort() {
                    return Err(BackendError::Interrupted);
                }
            }
        }
    }
}
