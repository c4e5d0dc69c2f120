//! Retried I/O under the caller's span
//!
//! One guarded call is a bounded loop of attempts. Each retried failure is
//! recorded on the active span without settling its status; only the final
//! outcome sets OK or ERROR. The failure that ends the loop is returned
//! unrecorded, for the span owner to record once.

use std::error::Error;
use std::future::Future;
use std::sync::Arc;

use opentelemetry::trace::{Status, TraceContextExt};
use opentelemetry::{Context, KeyValue};

use crate::utils::faults::{FaultInjector, InjectedFault, NoFaults};
use crate::utils::retry::{AttemptError, RetryPolicy, Retryable};

#[derive(Debug, Clone)]
pub struct ResilientIo {
    policy: RetryPolicy,
    faults: Arc<dyn FaultInjector>,
}

impl Default for ResilientIo {
    fn default() -> Self {
        Self::new(RetryPolicy::default(), Arc::new(NoFaults))
    }
}

impl ResilientIo {
    pub fn new(policy: RetryPolicy, faults: Arc<dyn FaultInjector>) -> Self {
        Self { policy, faults }
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Run `op` until it succeeds, fails fatally, or the budget runs out.
    ///
    /// Attempt `i` (zero-based) that fails with a retryable error is followed
    /// by a sleep of `base_delay * 2^i`, unless it was the last one.
    pub async fn attempt<T, E, F, Fut>(
        &self,
        cx: &Context,
        operation: &str,
        mut op: F,
    ) -> Result<T, AttemptError<E>>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Error + From<InjectedFault> + Retryable,
    {
        let mut attempt_index = 0;
        loop {
            let attempt = attempt_index + 1;

            let delay = self.faults.delay();
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
            let result = if self.faults.should_inject_fault() {
                Err(E::from(InjectedFault {
                    operation: operation.to_string(),
                }))
            } else {
                op().await
            };

            let err = match result {
                Ok(value) => {
                    cx.span().set_status(Status::Ok);
                    tracing::debug!(operation, attempt, "Operation succeeded");
                    return Ok(value);
                }
                Err(err) => err,
            };

            if !err.is_retryable() {
                tracing::error!(operation, attempt, error = %err, "Operation failed with non-retryable error");
                cx.span().set_status(Status::error(err.to_string()));
                return Err(AttemptError::Fatal {
                    attempt,
                    source: err,
                });
            }

            if !self.policy.has_budget_after(attempt) {
                tracing::error!(operation, attempts = attempt, error = %err, "Operation failed; retry budget exhausted");
                cx.span().set_status(Status::error(err.to_string()));
                return Err(AttemptError::Exhausted {
                    attempts: attempt,
                    source: err,
                });
            }

            cx.span().record_error(&err);
            let backoff = self.policy.delay_for(attempt_index);
            let delay_ms = u64::try_from(backoff.as_millis()).unwrap_or(u64::MAX);
            tracing::warn!(operation, attempt, delay_ms, error = %err, "Operation failed, retrying");
            cx.span().add_event(
                "retry.backoff",
                vec![
                    KeyValue::new("retry.attempt", i64::from(attempt)),
                    KeyValue::new("retry.delay_ms", i64::try_from(delay_ms).unwrap_or(i64::MAX)),
                ],
            );
            tokio::time::sleep(backoff).await;
            attempt_index += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;

    use tokio::time::Instant;

    use super::*;
    use crate::data::objects::StorageError;
    use crate::domain::stage::instrument::Stage;
    use crate::domain::stage::instrument::testing::{exception_count, finished, in_memory, span};
    use crate::utils::faults::ScriptedFaults;

    fn io(max_attempts: u32, faults: ScriptedFaults) -> ResilientIo {
        ResilientIo::new(
            RetryPolicy::new(max_attempts, Duration::from_millis(100)),
            Arc::new(faults),
        )
    }

    fn backoff_delays(span: &opentelemetry_sdk::trace::SpanData) -> Vec<i64> {
        span.events
            .events
            .iter()
            .filter(|e| e.name == "retry.backoff")
            .filter_map(|e| {
                e.attributes
                    .iter()
                    .find(|kv| kv.key.as_str() == "retry.delay_ms")
                    .and_then(|kv| match kv.value {
                        opentelemetry::Value::I64(v) => Some(v),
                        _ => None,
                    })
            })
            .collect()
    }

    #[tokio::test(start_paused = true)]
    async fn test_succeeds_after_k_failures() {
        let (instrument, exporter) = in_memory();
        let io = io(4, ScriptedFaults::failing(2));
        let calls = AtomicU32::new(0);
        let calls = &calls;

        let started = Instant::now();
        let value = instrument
            .run(Stage::new("read"), None, |cx| async move {
                io.attempt(&cx, "get", || async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Ok::<_, StorageError>(42)
                })
                .await
            })
            .await
            .unwrap();

        assert_eq!(value, 42);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(started.elapsed(), Duration::from_millis(300));

        let spans = finished(&exporter);
        let read = span(&spans, "read");
        assert_eq!(read.status, Status::Ok);
        assert_eq!(exception_count(read), 2);
        assert_eq!(backoff_delays(read), vec![100, 200]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_always_failing_exhausts_budget() {
        let (instrument, exporter) = in_memory();
        let io = io(3, ScriptedFaults::default());
        let calls = AtomicU32::new(0);
        let calls = &calls;

        let result: Result<(), _> = instrument
            .run(Stage::new("write"), None, |cx| async move {
                io.attempt(&cx, "put", || async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Err::<(), _>(StorageError::Backend("throttled".to_string()))
                })
                .await
            })
            .await;

        match result {
            Err(AttemptError::Exhausted { attempts, source }) => {
                assert_eq!(attempts, 3);
                assert!(matches!(source, StorageError::Backend(_)));
            }
            other => panic!("expected exhausted budget, got {other:?}"),
        }
        assert_eq!(calls.load(Ordering::SeqCst), 3);

        let spans = finished(&exporter);
        let write = span(&spans, "write");
        assert!(matches!(write.status, Status::Error { .. }));
        assert_eq!(backoff_delays(write), vec![100, 200]);
        assert_eq!(exception_count(write), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_fatal_error_recorded_once_on_span() {
        let (instrument, exporter) = in_memory();
        let io = io(5, ScriptedFaults::default());

        let result: Result<(), _> = instrument
            .run(Stage::new("read"), None, |cx| async move {
                io.attempt(&cx, "get", || async {
                    Err(StorageError::InvalidLocation("s3://".to_string()))
                })
                .await
            })
            .await;
        assert!(matches!(result, Err(AttemptError::Fatal { .. })));

        let spans = finished(&exporter);
        let read = span(&spans, "read");
        assert!(matches!(read.status, Status::Error { .. }));
        assert_eq!(exception_count(read), 1);
        assert!(backoff_delays(read).is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_fatal_error_stops_immediately() {
        let cx = Context::new();
        let io = io(5, ScriptedFaults::default());
        let calls = AtomicU32::new(0);
        let calls = &calls;

        let started = Instant::now();
        let result: Result<(), _> = io
            .attempt(&cx, "get", || async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(StorageError::InvalidLocation("s3://".to_string()))
            })
            .await;

        assert!(matches!(result, Err(AttemptError::Fatal { attempt: 1, .. })));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(started.elapsed(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn test_injected_delay_precedes_each_attempt() {
        let cx = Context::new();
        let faults = ScriptedFaults::failing(1).with_delay(Duration::from_secs(2));
        let io = io(3, faults);

        let started = Instant::now();
        let value = io
            .attempt(&cx, "get", || async { Ok::<_, StorageError>("data") })
            .await
            .unwrap();

        assert_eq!(value, "data");
        // two injected delays plus one backoff
        assert_eq!(started.elapsed(), Duration::from_millis(4100));
    }

    #[tokio::test(start_paused = true)]
    async fn test_real_failures_then_success() {
        let cx = Context::new();
        let io = io(3, ScriptedFaults::default());
        let calls = AtomicU32::new(0);
        let calls = &calls;

        let value = io
            .attempt(&cx, "get", || async move {
                if calls.fetch_add(1, Ordering::SeqCst) < 2 {
                    Err(StorageError::Backend("reset".to_string()))
                } else {
                    Ok(9)
                }
            })
            .await
            .unwrap();

        assert_eq!(value, 9);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }
}
