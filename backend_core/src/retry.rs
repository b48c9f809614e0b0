use std::fmt::Display;
use std::future::Future;
use std::time::Duration;

use tracing::warn;

/// Run `op` up to `attempts` times with a fixed delay between failures.
///
/// Every error short of the last attempt is treated as retryable; the last
/// error is returned once attempts are exhausted.
pub async fn retry_fixed<F, Fut, T, E>(attempts: usize, delay: Duration, mut op: F) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: Display,
{
    let mut attempt = 1;
    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(e) if attempt < attempts => {
                warn!("attempt {attempt}/{attempts} failed: {e}, retrying in {delay:?}");
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    #[tokio::test]
    async fn test_first_attempt_success_runs_once() {
        let calls = Cell::new(0u32);
        let result: Result<&str, String> = retry_fixed(3, Duration::from_millis(1), || {
            calls.set(calls.get() + 1);
            async { Ok("done") }
        })
        .await;

        assert_eq!(result.unwrap(), "done");
        assert_eq!(calls.get(), 1);
    }

    #[tokio::test]
    async fn test_succeeds_on_third_attempt() {
        let calls = Cell::new(0u32);
        let result: Result<u32, String> = retry_fixed(3, Duration::from_millis(1), || {
            let n = calls.get() + 1;
            calls.set(n);
            async move {
                if n < 3 {
                    Err(format!("transient failure {n}"))
                } else {
                    Ok(42)
                }
            }
        })
        .await;

        assert_eq!(result.unwrap(), 42);
        assert_eq!(calls.get(), 3);
    }

    #[tokio::test]
    async fn test_fails_after_exhausting_attempts() {
        let calls = Cell::new(0u32);
        let result: Result<u32, String> = retry_fixed(3, Duration::from_millis(1), || {
            calls.set(calls.get() + 1);
            async { Err("still broken".to_string()) }
        })
        .await;

        assert_eq!(result.unwrap_err(), "still broken");
        assert_eq!(calls.get(), 3);
    }
}
