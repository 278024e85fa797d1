//! HTTP plumbing shared by the remote embedding providers
//!
//! Maps transport failures and status codes onto `SearchError` and retries
//! transient failures with exponential backoff.

use std::future::Future;
use std::time::Duration;

use reqwest::{Client, Response, StatusCode};
use tracing::debug;

use crate::error::{Result, SearchError};

/// Base delay for exponential backoff (milliseconds)
const RETRY_BASE_DELAY_MS: u64 = 500;

/// Longest `Retry-After` we are willing to sleep for (seconds)
const MAX_RETRY_AFTER_SECS: u64 = 10;

/// Build a client with a hard per-request timeout.
pub(crate) fn build_client(timeout_secs: u64) -> Result<Client> {
    Client::builder()
        .timeout(Duration::from_secs(timeout_secs))
        .build()
        .map_err(|e| SearchError::Configuration(format!("HTTP client error: {}", e)))
}

/// Map a transport error.
pub(crate) fn send_error(err: reqwest::Error) -> SearchError {
    if err.is_timeout() {
        SearchError::Timeout("embedding request".into())
    } else if err.is_connect() {
        SearchError::ProviderUnavailable(format!("connection failed: {}", err))
    } else {
        SearchError::ExternalService(format!("request failed: {}", err))
    }
}

/// Pass through 2xx responses, map everything else to an error.
pub(crate) async fn check_status(response: Response) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    match status {
        StatusCode::TOO_MANY_REQUESTS => {
            let retry_after = response
                .headers()
                .get("Retry-After")
                .and_then(|v| v.to_str().ok())
                .and_then(|s| s.parse::<u64>().ok());

            Err(SearchError::RateLimited { retry_after })
        }
        StatusCode::REQUEST_TIMEOUT
        | StatusCode::BAD_GATEWAY
        | StatusCode::SERVICE_UNAVAILABLE
        | StatusCode::GATEWAY_TIMEOUT
        | StatusCode::INTERNAL_SERVER_ERROR => Err(SearchError::ProviderUnavailable(format!(
            "status {}",
            status
        ))),
        _ => {
            let body = response.text().await.unwrap_or_default();
            Err(SearchError::ExternalService(format!(
                "request failed with status {}: {}",
                status,
                body.trim()
            )))
        }
    }
}

/// Run `attempt` until it succeeds, fails permanently, or retries run out.
pub(crate) async fn with_retry<T, F, Fut>(max_retries: u32, mut attempt: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut retry_delay = Duration::from_millis(RETRY_BASE_DELAY_MS);

    for n in 0..=max_retries {
        match attempt().await {
            Ok(value) => return Ok(value),
            Err(e) if e.is_transient() && n < max_retries => {
                let delay = match &e {
                    SearchError::RateLimited {
                        retry_after: Some(secs),
                    } => Duration::from_secs((*secs).min(MAX_RETRY_AFTER_SECS)),
                    _ => retry_delay,
                };
                debug!("Embedding attempt {} failed ({}), retrying in {:?}", n + 1, e, delay);
                tokio::time::sleep(delay).await;
                retry_delay *= 2;
            }
            Err(e) => return Err(e),
        }
    }

    Err(SearchError::ProviderUnavailable(
        "request failed after retries".into(),
    ))
}

/// Reject empty vectors and non-finite components.
pub(crate) fn validate_vector(vector: Vec<f32>) -> Result<Vec<f32>> {
    if vector.is_empty() {
        return Err(SearchError::ExternalService(
            "provider returned an empty embedding".into(),
        ));
    }
    if vector.iter().any(|v| !v.is_finite()) {
        return Err(SearchError::ExternalService(
            "provider returned non-finite embedding values".into(),
        ));
    }
    Ok(vector)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[tokio::test]
    async fn test_retry_stops_on_permanent_error() {
        let calls = AtomicU32::new(0);
        let result: Result<()> = with_retry(3, || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(SearchError::ExternalService("status 400".into())) }
        })
        .await;

        assert!(matches!(result, Err(SearchError::ExternalService(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_retry_recovers_from_transient_error() {
        let calls = AtomicU32::new(0);
        let result = with_retry(2, || {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            async move {
                if n == 0 {
                    Err(SearchError::ProviderUnavailable("503".into()))
                } else {
                    Ok(42)
                }
            }
        })
        .await;

        assert_eq!(result.unwrap(), 42);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_retry_gives_up() {
        let calls = AtomicU32::new(0);
        let result: Result<()> = with_retry(1, || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(SearchError::RateLimited { retry_after: None }) }
        })
        .await;

        assert!(matches!(result, Err(SearchError::RateLimited { .. })));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_validate_vector() {
        assert!(validate_vector(vec![0.1, 0.2]).is_ok());
        assert!(validate_vector(vec![]).is_err());
        assert!(validate_vector(vec![f32::NAN]).is_err());
    }
}
