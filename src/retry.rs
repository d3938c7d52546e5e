/// Bounded retry for conflicting host mutations
///
/// chrome.tabs.group / chrome.tabGroups.update reject calls that race with
/// an in-flight edit on the same window ("Tabs cannot be edited right
/// now..."). That conflict is transient (the user is usually mid-drag), so
/// group mutations are wrapped in a short exponential backoff. This is the
/// engine's only concurrency-safety mechanism for that resource.
use crate::browser::Browser;
use crate::error::HostError;

/// Backoff parameters for [`with_retry`].
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub initial_delay_ms: u32,
    pub backoff: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        RetryPolicy {
            max_attempts: 3,
            initial_delay_ms: 500,
            backoff: 1.5,
        }
    }
}

/// Run `op`, retrying transient edit conflicts with exponential backoff.
///
/// Any error other than [`HostError::EditInProgress`] propagates
/// immediately; after `max_attempts` conflicts the last error propagates.
/// Waits go through the host's `sleep` capability.
pub async fn with_retry<B, T, F, Fut>(
    browser: &B,
    policy: &RetryPolicy,
    mut op: F,
) -> Result<T, HostError>
where
    B: Browser,
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, HostError>>,
{
    let mut delay_ms = policy.initial_delay_ms as f64;
    let mut last_error = None;

    for attempt in 1..=policy.max_attempts {
        match op().await {
            Ok(value) => return Ok(value),
            Err(err) if err.is_transient_conflict() => {
                log::debug!(
                    "group mutation conflict (attempt {attempt}/{}), retrying in {}ms",
                    policy.max_attempts,
                    delay_ms as u32
                );
                last_error = Some(err);
                if attempt < policy.max_attempts {
                    browser.sleep(delay_ms as u32).await;
                    delay_ms *= policy.backoff;
                }
            }
            Err(err) => return Err(err),
        }
    }

    let err = last_error
        .unwrap_or_else(|| HostError::Other("retry executor made no attempts".into()));
    log::warn!(
        "group mutation failed after {} attempts: {err}",
        policy.max_attempts
    );
    Err(err)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::FakeBrowser;
    use futures::executor::block_on;
    use std::cell::Cell;

    fn conflict() -> HostError {
        HostError::EditInProgress("user may be dragging a tab".into())
    }

    #[test]
    fn test_success_on_first_attempt() {
        let browser = FakeBrowser::new();
        let calls = Cell::new(0u32);

        let result = block_on(with_retry(&browser, &RetryPolicy::default(), || {
            calls.set(calls.get() + 1);
            async { Ok::<_, HostError>(7) }
        }));

        assert_eq!(result, Ok(7));
        assert_eq!(calls.get(), 1);
        assert!(browser.sleeps().is_empty());
    }

    #[test]
    fn test_transient_conflicts_retry_with_increasing_delays() {
        let browser = FakeBrowser::new();
        let calls = Cell::new(0u32);

        let result = block_on(with_retry(&browser, &RetryPolicy::default(), || {
            calls.set(calls.get() + 1);
            let n = calls.get();
            async move {
                if n < 3 {
                    Err(conflict())
                } else {
                    Ok(n)
                }
            }
        }));

        assert_eq!(result, Ok(3));
        assert_eq!(calls.get(), 3);
        assert_eq!(browser.sleeps(), vec![500, 750]);
    }

    #[test]
    fn test_exhausted_attempts_propagate_last_error() {
        let browser = FakeBrowser::new();
        let calls = Cell::new(0u32);

        let result: Result<(), _> = block_on(with_retry(&browser, &RetryPolicy::default(), || {
            calls.set(calls.get() + 1);
            async { Err(conflict()) }
        }));

        assert_eq!(result, Err(conflict()));
        assert_eq!(calls.get(), 3);
        // No wait after the final failed attempt.
        assert_eq!(browser.sleeps(), vec![500, 750]);
    }

    #[test]
    fn test_other_errors_do_not_retry() {
        let browser = FakeBrowser::new();
        let calls = Cell::new(0u32);

        let result: Result<(), _> = block_on(with_retry(&browser, &RetryPolicy::default(), || {
            calls.set(calls.get() + 1);
            async { Err(HostError::Other("permission denied".into())) }
        }));

        assert_eq!(result, Err(HostError::Other("permission denied".into())));
        assert_eq!(calls.get(), 1);
        assert!(browser.sleeps().is_empty());
    }
}
