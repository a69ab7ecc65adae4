//! Bounded backoff for IAM propagation lag
//!
//! A freshly created role may not be assumable by a dependent service for a
//! short window. Instead of a fixed sleep, the dependent operation itself is
//! the readiness probe: retry it with exponential backoff while it reports
//! `NotYetPropagated`, and surface the error to the operator once the
//! attempts are exhausted (re-running the command is safe).

use super::ProvisionError;
use std::future::Future;
use std::time::Duration;

const MAX_ATTEMPTS: u32 = 5;
const INITIAL_BACKOFF: Duration = Duration::from_secs(2);

pub async fn with_propagation_retry<T, F, Fut>(
    what: &str,
    mut operation: F,
) -> Result<T, ProvisionError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, ProvisionError>>,
{
    let mut delay = INITIAL_BACKOFF;

    for attempt in 1..=MAX_ATTEMPTS {
        match operation().await {
            Err(ProvisionError::NotYetPropagated { resource, message })
                if attempt < MAX_ATTEMPTS =>
            {
                tracing::info!(
                    "{} not ready yet ({}: {}), retrying in {:?} [attempt {}/{}]",
                    what,
                    resource,
                    message,
                    delay,
                    attempt,
                    MAX_ATTEMPTS
                );
                tokio::time::sleep(delay).await;
                delay *= 2;
            }
            other => return other,
        }
    }

    unreachable!("loop returns on the final attempt")
}
