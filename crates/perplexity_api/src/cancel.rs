use std::future::Future;
use std::sync::{atomic::AtomicBool, atomic::Ordering, Arc};
use std::time::Duration;

use crate::error::PerplexityApiError;

/// Cancellation signal shared by every blocking point of one streaming call.
pub type CancellationSignal = Arc<AtomicBool>;

const CANCEL_POLL_INTERVAL: Duration = Duration::from_millis(25);

pub fn new_cancellation_signal() -> CancellationSignal {
    Arc::new(AtomicBool::new(false))
}

pub fn cancel(signal: &CancellationSignal) {
    signal.store(true, Ordering::Release);
}

pub fn is_cancelled(cancel: Option<&CancellationSignal>) -> bool {
    cancel.is_some_and(|token| token.load(Ordering::Acquire))
}

/// Drives `future` to completion unless the signal fires first.
///
/// The signal is polled every 25ms; a set signal wins over a ready output.
pub async fn await_or_cancel<F>(
    future: F,
    cancellation: Option<&CancellationSignal>,
) -> Result<F::Output, PerplexityApiError>
where
    F: Future,
{
    if cancellation.is_none() {
        return Ok(future.await);
    }

    let mut future = Box::pin(future);

    loop {
        if is_cancelled(cancellation) {
            return Err(PerplexityApiError::Cancelled);
        }

        if let Ok(output) = tokio::time::timeout(CANCEL_POLL_INTERVAL, &mut future).await {
            if is_cancelled(cancellation) {
                return Err(PerplexityApiError::Cancelled);
            }
            return Ok(output);
        }
    }
}
