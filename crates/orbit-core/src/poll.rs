// ── Polling and cancellation helpers ──
//
// Every suspension point in a device run goes through one of these so the
// batch token can interrupt it. Waits use `tokio::time`, so a paused test
// clock drives them.

use std::future::Future;
use std::time::Duration;

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::config::PollSettings;
use crate::error::CoreError;

/// Stand-in deadline for timeouts too large to add to an `Instant`.
const FAR_FUTURE: Duration = Duration::from_secs(86_400 * 365 * 30);

/// Await `fut`, giving up with [`CoreError::Cancelled`] if `cancel` fires first.
pub async fn cancellable<T>(
    cancel: &CancellationToken,
    fut: impl Future<Output = Result<T, CoreError>>,
) -> Result<T, CoreError> {
    tokio::select! {
        biased;
        () = cancel.cancelled() => Err(CoreError::Cancelled),
        result = fut => result,
    }
}

/// Call `check` every `settings.interval` until it yields a value.
///
/// The first check runs immediately. No check is issued at or after the
/// deadline: once `settings.timeout` has elapsed the wait ends with
/// [`CoreError::OnboardingTimeout`] naming `stage`.
pub async fn poll_until<T, F, Fut>(
    settings: PollSettings,
    stage: &'static str,
    cancel: &CancellationToken,
    mut check: F,
) -> Result<T, CoreError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<Option<T>, CoreError>>,
{
    let now = Instant::now();
    let deadline = now
        .checked_add(settings.timeout)
        .unwrap_or_else(|| now + FAR_FUTURE);
    let mut polls: u32 = 0;

    loop {
        polls += 1;
        if let Some(value) = cancellable(cancel, check()).await? {
            debug!(stage, polls, "condition met");
            return Ok(value);
        }

        let remaining = deadline.saturating_duration_since(Instant::now());
        if remaining.is_zero() {
            break;
        }
        let wait = settings.interval.min(remaining);
        debug!(stage, polls, wait_ms = u64::try_from(wait.as_millis()).unwrap_or(u64::MAX), "not yet");

        cancellable(cancel, async {
            tokio::time::sleep(wait).await;
            Ok(())
        })
        .await?;

        if Instant::now() >= deadline {
            break;
        }
    }

    Err(CoreError::OnboardingTimeout {
        stage,
        timeout_secs: settings.timeout.as_secs(),
    })
}
