//! Generic HTTP retry executor.
//!
//! Runs an HTTP operation with resilience against transient failures
//! without knowing anything about the endpoint: connection-level errors
//! and 5xx responses are retried with exponential backoff up to the
//! caller's budget, and an optional status handler gets first look at
//! every response for endpoint-specific policy (auth-scheme fallback,
//! rate-limit sleeps). Handler-driven retries do not count against the
//! retry budget.

use std::future::Future;

use async_trait::async_trait;
use reqwest::Response;
use tracing::warn;

use crate::backoff::Backoff;

/// Verdict from a [`StatusHandler`] for one response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusAction {
    /// Fall through to the executor's default 5xx/terminal handling.
    Continue,
    /// Re-issue the request without incrementing the attempt counter.
    Retry,
    /// Give up on the whole operation.
    Abort,
}

/// Endpoint-specific response inspection hook.
#[async_trait]
pub trait StatusHandler: Send {
    async fn on_response(&mut self, response: &Response, attempt: u32) -> StatusAction;
}

/// Terminal outcomes of [`execute_with_retry`].
#[derive(Debug)]
pub enum RetryError {
    /// Connection-level failure after exhausting the retry budget.
    Transport(reqwest::Error),
    /// Non-2xx response that was not (or could no longer be) retried.
    Status { status: u16, body: String },
    /// The status handler aborted the operation.
    Aborted,
}

impl RetryError {
    pub fn is_server_error(&self) -> bool {
        matches!(self, Self::Status { status, .. } if (500..600).contains(status))
    }
}

/// Execute `request` until it yields a terminal response.
///
/// Guarantees at most `max_retries` backoff-counted retries; handler
/// `Retry` verdicts loop without touching the counter. Returns the
/// response on 2xx, otherwise the last error encountered.
pub async fn execute_with_retry<F, Fut>(
    mut request: F,
    max_retries: u32,
    backoff: &Backoff,
    mut handler: Option<&mut dyn StatusHandler>,
) -> Result<Response, RetryError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = reqwest::Result<Response>>,
{
    let mut attempt: u32 = 0;
    loop {
        let response = match request().await {
            Ok(response) => response,
            Err(err) => {
                if attempt < max_retries {
                    let delay = backoff.delay(attempt);
                    warn!(
                        error = %err,
                        delay_ms = delay.as_millis() as u64,
                        "request error, retrying"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                    continue;
                }
                return Err(RetryError::Transport(err));
            }
        };

        if let Some(h) = handler.as_mut() {
            match h.on_response(&response, attempt).await {
                StatusAction::Retry => continue,
                StatusAction::Abort => return Err(RetryError::Aborted),
                StatusAction::Continue => {}
            }
        }

        let status = response.status();
        if status.is_server_error() && attempt < max_retries {
            let delay = backoff.delay(attempt);
            warn!(
                status = status.as_u16(),
                delay_ms = delay.as_millis() as u64,
                "server error, retrying"
            );
            tokio::time::sleep(delay).await;
            attempt += 1;
            continue;
        }

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(RetryError::Status {
                status: status.as_u16(),
                body,
            });
        }
        return Ok(response);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;

    fn zero_backoff() -> Backoff {
        Backoff::with_jitter(|| 0.0)
    }

    struct CountingHandler {
        verdicts: Vec<StatusAction>,
        seen: Vec<u16>,
    }

    #[async_trait]
    impl StatusHandler for CountingHandler {
        async fn on_response(&mut self, response: &Response, _attempt: u32) -> StatusAction {
            self.seen.push(response.status().as_u16());
            if self.verdicts.is_empty() {
                StatusAction::Continue
            } else {
                self.verdicts.remove(0)
            }
        }
    }

    #[tokio::test]
    async fn returns_success_without_retrying() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(GET).path("/ok");
            then.status(200).body("hi");
        });

        let client = reqwest::Client::new();
        let url = server.url("/ok");
        let response =
            execute_with_retry(|| client.get(&url).send(), 3, &zero_backoff(), None)
                .await
                .unwrap();
        assert_eq!(response.status().as_u16(), 200);
        mock.assert_hits(1);
    }

    #[tokio::test]
    async fn server_errors_exhaust_the_budget() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(GET).path("/boom");
            then.status(502);
        });

        let client = reqwest::Client::new();
        let url = server.url("/boom");
        let err = execute_with_retry(|| client.get(&url).send(), 2, &zero_backoff(), None)
            .await
            .unwrap_err();
        assert!(err.is_server_error());
        // initial attempt + 2 retries
        mock.assert_hits(3);
    }

    #[tokio::test]
    async fn zero_retries_fails_on_first_server_error() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(GET).path("/boom");
            then.status(500);
        });

        let client = reqwest::Client::new();
        let url = server.url("/boom");
        let err = execute_with_retry(|| client.get(&url).send(), 0, &zero_backoff(), None)
            .await
            .unwrap_err();
        assert!(matches!(err, RetryError::Status { status: 500, .. }));
        mock.assert_hits(1);
    }

    #[tokio::test]
    async fn non_server_error_is_terminal() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(GET).path("/gone");
            then.status(404).body("missing");
        });

        let client = reqwest::Client::new();
        let url = server.url("/gone");
        let err = execute_with_retry(|| client.get(&url).send(), 3, &zero_backoff(), None)
            .await
            .unwrap_err();
        match err {
            RetryError::Status { status, body } => {
                assert_eq!(status, 404);
                assert_eq!(body, "missing");
            }
            other => panic!("unexpected error: {other:?}"),
        }
        mock.assert_hits(1);
    }

    #[tokio::test]
    async fn handler_retry_does_not_consume_budget() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(GET).path("/ok");
            then.status(200);
        });

        let client = reqwest::Client::new();
        let url = server.url("/ok");
        let mut handler = CountingHandler {
            verdicts: vec![StatusAction::Retry, StatusAction::Retry, StatusAction::Continue],
            seen: vec![],
        };
        let response = execute_with_retry(
            || client.get(&url).send(),
            0,
            &zero_backoff(),
            Some(&mut handler),
        )
        .await
        .unwrap();
        assert_eq!(response.status().as_u16(), 200);
        assert_eq!(handler.seen, vec![200, 200, 200]);
        mock.assert_hits(3);
    }

    #[tokio::test]
    async fn handler_abort_short_circuits() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(GET).path("/limited");
            then.status(403);
        });

        let client = reqwest::Client::new();
        let url = server.url("/limited");
        let mut handler = CountingHandler {
            verdicts: vec![StatusAction::Abort],
            seen: vec![],
        };
        let err = execute_with_retry(
            || client.get(&url).send(),
            3,
            &zero_backoff(),
            Some(&mut handler),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, RetryError::Aborted));
        mock.assert_hits(1);
    }

    #[tokio::test]
    async fn connection_errors_propagate_after_budget() {
        // Nothing is listening on this port.
        let client = reqwest::Client::new();
        let err = execute_with_retry(
            || client.get("http://127.0.0.1:9/none").send(),
            1,
            &zero_backoff(),
            None,
        )
        .await
        .unwrap_err();
        assert!(matches!(err, RetryError::Transport(_)));
    }
}
