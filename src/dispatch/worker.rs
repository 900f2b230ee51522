//! The single dispatch worker.
//!
//! Pulls one job at a time off the queue and resolves it against the remote
//! endpoint. At most one outbound call is in flight at any moment.

use std::sync::Arc;

use tokio::sync::{broadcast, mpsc, Mutex};
use tokio::task::JoinHandle;
use tokio::time::sleep;
use tracing::Instrument;

use crate::dispatch::handle::{DispatchStats, DispatcherHandle};
use crate::dispatch::job::{ErrorKind, Job, Outcome};
use crate::dispatch::supervisor;
use crate::observability::metrics;
use crate::resilience::{classify, RetryPolicy, RetryState, Verdict};
use crate::upstream::{CallError, InferenceBackend};

/// A resolved job together with the failed attempts it took.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution {
    pub outcome: Outcome,
    pub retries: u32,
}

/// Why the worker loop returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerExit {
    Shutdown,
    QueueClosed,
}

pub struct Dispatcher<B> {
    backend: Arc<B>,
    policy: RetryPolicy,
    queue: Arc<Mutex<mpsc::UnboundedReceiver<Job>>>,
    pub(crate) stats: Arc<DispatchStats>,
}

impl<B> Clone for Dispatcher<B> {
    fn clone(&self) -> Self {
        Self {
            backend: self.backend.clone(),
            policy: self.policy,
            queue: self.queue.clone(),
            stats: self.stats.clone(),
        }
    }
}

impl<B: InferenceBackend> Dispatcher<B> {
    /// Create the worker and the handle callers enqueue through.
    pub fn new(backend: B, policy: RetryPolicy) -> (Self, DispatcherHandle) {
        let (tx, rx) = mpsc::unbounded_channel();
        let stats = Arc::new(DispatchStats::default());
        let dispatcher = Self {
            backend: Arc::new(backend),
            policy,
            queue: Arc::new(Mutex::new(rx)),
            stats: stats.clone(),
        };
        (dispatcher, DispatcherHandle::new(tx, stats))
    }

    /// Spawn the supervised worker.
    ///
    /// The returned task finishes once shutdown is signalled or every handle
    /// has been dropped. Dropping the `Shutdown` sender counts as a signal.
    pub fn start(self, shutdown: broadcast::Receiver<()>) -> JoinHandle<()> {
        tracing::info!(
            max_retries = self.policy.max_retries,
            initial_delay_ms = self.policy.initial_delay.as_millis() as u64,
            max_backoff_ms = self.policy.max_backoff.as_millis() as u64,
            "Dispatcher starting"
        );
        tokio::spawn(supervisor::supervise(self, shutdown))
    }

    /// Drain the queue until shutdown or until it closes.
    ///
    /// Shutdown is only observed between jobs; an in-flight job always finishes.
    pub(crate) async fn run(self, mut shutdown: broadcast::Receiver<()>) -> WorkerExit {
        let mut queue = self.queue.lock().await;
        loop {
            let job = tokio::select! {
                biased;
                _ = shutdown.recv() => return WorkerExit::Shutdown,
                job = queue.recv() => match job {
                    Some(job) => job,
                    None => return WorkerExit::QueueClosed,
                },
            };
            self.handle_job(job).await;
        }
    }

    async fn handle_job(&self, job: Job) {
        self.stats.record_dequeued();
        let span = tracing::info_span!("job", job_id = %job.id);

        let Resolution { outcome, retries } = self.resolve(&job.message).instrument(span.clone()).await;

        let elapsed = job.enqueued_at.elapsed();
        metrics::record_job(outcome.label(), elapsed);
        self.stats.record_completed();
        span.in_scope(|| {
            tracing::info!(
                outcome = outcome.label(),
                retries,
                elapsed_ms = elapsed.as_millis() as u64,
                "Job resolved"
            );
            if job.reply.send(outcome).is_err() {
                tracing::debug!("Caller stopped waiting; outcome discarded");
            }
        });
    }

    /// Run the retry loop for one message and produce its outcome.
    pub async fn resolve(&self, message: &str) -> Resolution {
        let mut retry = RetryState::new(self.policy);
        let mut last_failure = (ErrorKind::TransportError, String::new());

        while retry.can_attempt() {
            let wait = match self.backend.generate(message).await {
                Ok(reply) => {
                    let status = reply.status;
                    match classify(reply) {
                        Verdict::Resolved(outcome) => {
                            metrics::record_upstream_call(outcome.label());
                            if let Outcome::Failure { kind, detail } = &outcome {
                                tracing::error!(status, kind = %kind, detail = %detail, "Inference API error");
                            }
                            return Resolution {
                                outcome,
                                retries: retry.attempt(),
                            };
                        }
                        Verdict::Loading { estimated } => {
                            metrics::record_upstream_call("model_loading");
                            let wait = retry.on_loading(estimated);
                            tracing::warn!(
                                attempt = retry.attempt(),
                                max_retries = self.policy.max_retries,
                                wait_ms = wait.as_millis() as u64,
                                "Model is loading, retrying after advertised wait"
                            );
                            last_failure = (ErrorKind::ModelLoading, "model is loading".to_string());
                            wait
                        }
                    }
                }
                Err(CallError::Transport(detail)) => {
                    metrics::record_upstream_call("transport_error");
                    let wait = retry.on_failure();
                    tracing::warn!(
                        error = %detail,
                        attempt = retry.attempt(),
                        max_retries = self.policy.max_retries,
                        delay_ms = wait.as_millis() as u64,
                        "Request error, retrying"
                    );
                    last_failure = (ErrorKind::TransportError, detail);
                    wait
                }
                Err(CallError::Internal(detail)) => {
                    metrics::record_upstream_call("unexpected_error");
                    let wait = retry.on_failure();
                    tracing::error!(
                        error = %detail,
                        category = "unexpected",
                        attempt = retry.attempt(),
                        max_retries = self.policy.max_retries,
                        delay_ms = wait.as_millis() as u64,
                        "Unexpected error, retrying"
                    );
                    last_failure = (ErrorKind::TransportError, detail);
                    wait
                }
            };
            sleep(wait).await;
        }

        let (kind, detail) = last_failure;
        tracing::error!(
            retries = retry.attempt(),
            last_failure = %kind,
            "Failed to process request after retries"
        );
        Resolution {
            outcome: Outcome::failure(
                ErrorKind::RetriesExhausted,
                format!("last failure ({}): {}", kind, detail),
            ),
            retries: retry.attempt(),
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::time::Duration;
    use tokio::time::Instant;

    use crate::lifecycle::Shutdown;
    use crate::upstream::RawReply;

    const LOADING: &str = r#"{"error": "Model is currently loading", "estimated_time": 3.0}"#;
    const HI: &str = r#"[{"generated_text": "hi there"}]"#;

    #[derive(Debug, Clone)]
    pub(crate) enum Step {
        Reply(u16, &'static str),
        Transport,
        Internal,
        Slow(Duration),
        Panic,
    }

    #[derive(Default)]
    struct Script {
        steps: std::sync::Mutex<VecDeque<Step>>,
        calls: std::sync::Mutex<Vec<(String, Instant)>>,
    }

    /// Replays a fixed list of steps; answers "hi there" once the list runs out.
    #[derive(Clone, Default)]
    pub(crate) struct ScriptedBackend {
        script: Arc<Script>,
    }

    impl ScriptedBackend {
        pub(crate) fn new(steps: impl IntoIterator<Item = Step>) -> Self {
            let backend = Self::default();
            backend.script.steps.lock().unwrap().extend(steps);
            backend
        }

        pub(crate) fn calls(&self) -> Vec<(String, Instant)> {
            self.script.calls.lock().unwrap().clone()
        }

        pub(crate) fn messages(&self) -> Vec<String> {
            self.calls().into_iter().map(|(m, _)| m).collect()
        }

        fn gaps(&self) -> Vec<Duration> {
            self.calls().windows(2).map(|w| w[1].1 - w[0].1).collect()
        }
    }

    impl InferenceBackend for ScriptedBackend {
        async fn generate(&self, message: &str) -> Result<RawReply, CallError> {
            self.script
                .calls
                .lock()
                .unwrap()
                .push((message.to_string(), Instant::now()));
            let step = self.script.steps.lock().unwrap().pop_front();
            match step {
                Some(Step::Reply(status, body)) => Ok(RawReply::new(status, body)),
                Some(Step::Transport) => Err(CallError::Transport("connection refused".into())),
                Some(Step::Internal) => Err(CallError::Internal("request build failed".into())),
                Some(Step::Slow(delay)) => {
                    sleep(delay).await;
                    Ok(RawReply::new(200, HI))
                }
                Some(Step::Panic) => panic!("backend exploded"),
                None => Ok(RawReply::new(200, HI)),
            }
        }
    }

    fn dispatcher(steps: Vec<Step>) -> (Dispatcher<ScriptedBackend>, DispatcherHandle, ScriptedBackend) {
        let backend = ScriptedBackend::new(steps);
        let (dispatcher, handle) = Dispatcher::new(backend.clone(), RetryPolicy::default());
        (dispatcher, handle, backend)
    }

    fn assert_gaps(actual: Vec<Duration>, expected_secs: &[u64]) {
        assert_eq!(actual.len(), expected_secs.len(), "gaps: {:?}", actual);
        for (gap, secs) in actual.iter().zip(expected_secs) {
            let expected = Duration::from_secs(*secs);
            assert!(
                *gap >= expected && *gap < expected + Duration::from_millis(50),
                "gap {:?} expected ~{:?}",
                gap,
                expected
            );
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_first_attempt_success() {
        let (dispatcher, _handle, backend) = dispatcher(vec![]);

        let resolution = dispatcher.resolve("hello").await;
        assert_eq!(resolution.outcome, Outcome::success("hi there"));
        assert_eq!(resolution.retries, 0);
        assert_eq!(backend.messages(), vec!["hello"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_model_loading_then_success() {
        let (dispatcher, _handle, backend) = dispatcher(vec![
            Step::Reply(503, LOADING),
            Step::Reply(503, LOADING),
            Step::Reply(200, HI),
        ]);

        let resolution = dispatcher.resolve("hello").await;
        assert_eq!(resolution.outcome, Outcome::success("hi there"));
        assert_eq!(resolution.retries, 2);
        assert_gaps(backend.gaps(), &[3, 3]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_loading_wait_is_capped() {
        let (dispatcher, _handle, backend) = dispatcher(vec![
            Step::Reply(503, r#"{"error": "currently loading", "estimated_time": 900}"#),
            Step::Reply(200, HI),
        ]);

        dispatcher.resolve("hello").await;
        assert_gaps(backend.gaps(), &[60]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_huge_loading_estimate_waits_the_cap() {
        let (dispatcher, _handle, backend) = dispatcher(vec![
            Step::Reply(503, r#"{"error": "Model is currently loading", "estimated_time": 1e30}"#),
            Step::Reply(200, HI),
        ]);

        let resolution = dispatcher.resolve("hello").await;
        assert_eq!(resolution.outcome, Outcome::success("hi there"));
        assert_eq!(resolution.retries, 1);
        assert_gaps(backend.gaps(), &[60]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_transport_failures_exhaust_retries() {
        let (dispatcher, _handle, backend) = dispatcher(vec![Step::Transport; 5]);
        let started = Instant::now();

        let resolution = dispatcher.resolve("hello").await;
        match &resolution.outcome {
            Outcome::Failure { kind, detail } => {
                assert_eq!(*kind, ErrorKind::RetriesExhausted);
                assert!(detail.contains("connection refused"));
            }
            other => panic!("unexpected outcome {:?}", other),
        }
        assert_eq!(resolution.retries, 5);
        assert_eq!(backend.calls().len(), 5, "no sixth outbound call");
        assert_gaps(backend.gaps(), &[2, 4, 8, 16]);
        // The final 32s backoff still runs before giving up.
        assert!(started.elapsed() >= Duration::from_secs(62));
    }

    #[tokio::test(start_paused = true)]
    async fn test_backoff_reaches_ceiling() {
        let backend = ScriptedBackend::new(vec![Step::Transport; 7]);
        let policy = RetryPolicy {
            max_retries: 8,
            ..RetryPolicy::default()
        };
        let (dispatcher, _handle) = Dispatcher::new(backend.clone(), policy);

        let resolution = dispatcher.resolve("hello").await;
        assert_eq!(resolution.outcome, Outcome::success("hi there"));
        assert_eq!(resolution.retries, 7);
        assert_gaps(backend.gaps(), &[2, 4, 8, 16, 32, 60, 60]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_unexpected_errors_retry_like_transport() {
        let (dispatcher, _handle, backend) = dispatcher(vec![Step::Internal, Step::Transport]);

        let resolution = dispatcher.resolve("hello").await;
        assert_eq!(resolution.outcome, Outcome::success("hi there"));
        assert_gaps(backend.gaps(), &[2, 4]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_loading_does_not_grow_transport_delay() {
        let (dispatcher, _handle, backend) = dispatcher(vec![
            Step::Transport,
            Step::Reply(503, LOADING),
            Step::Transport,
        ]);

        dispatcher.resolve("hello").await;
        assert_gaps(backend.gaps(), &[2, 3, 4]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_terminal_statuses_never_retry() {
        for (status, body, kind) in [
            (401, "Unauthorized", ErrorKind::Unauthorized),
            (500, "internal failure", ErrorKind::RemoteError),
            (200, r#"[{"generated_text": ""}]"#, ErrorKind::InvalidResponse),
        ] {
            let (dispatcher, _handle, backend) = dispatcher(vec![Step::Reply(status, body)]);
            let resolution = dispatcher.resolve("hello").await;

            match resolution.outcome {
                Outcome::Failure { kind: got, .. } => assert_eq!(got, kind),
                other => panic!("unexpected outcome {:?}", other),
            }
            assert_eq!(resolution.retries, 0);
            assert_eq!(backend.calls().len(), 1);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_remote_error_keeps_raw_body() {
        let (dispatcher, _handle, _backend) = dispatcher(vec![Step::Reply(400, r#"{"error":"bad input"}"#)]);

        let resolution = dispatcher.resolve("hello").await;
        assert_eq!(
            resolution.outcome,
            Outcome::failure(ErrorKind::RemoteError, r#"{"error":"bad input"}"#)
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_jobs_processed_in_fifo_order() {
        let (dispatcher, handle, backend) = dispatcher(vec![
            Step::Transport,
            Step::Reply(200, HI),
        ]);
        let shutdown = Shutdown::new();

        let receivers: Vec<_> = ["a", "b", "c"]
            .into_iter()
            .map(|m| handle.enqueue(m.to_string()).unwrap().1)
            .collect();
        let worker = dispatcher.start(shutdown.subscribe());

        for rx in receivers {
            assert_eq!(rx.await.unwrap(), Outcome::success("hi there"));
        }
        // "a" is retried before "b" is ever attempted.
        assert_eq!(backend.messages(), vec!["a", "a", "b", "c"]);

        let stats = handle.stats();
        assert_eq!(stats.completed, 3);
        assert_eq!(stats.queue_depth, 0);

        shutdown.trigger();
        worker.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_abandoned_reply_does_not_disturb_worker() {
        let (dispatcher, handle, backend) = dispatcher(vec![Step::Slow(Duration::from_secs(10))]);
        let shutdown = Shutdown::new();
        let worker = dispatcher.start(shutdown.subscribe());

        let (_, abandoned) = handle.enqueue("slow".into()).unwrap();
        assert!(tokio::time::timeout(Duration::from_secs(1), abandoned).await.is_err());

        let (_, next) = handle.enqueue("next".into()).unwrap();
        assert_eq!(next.await.unwrap(), Outcome::success("hi there"));
        assert_eq!(backend.messages(), vec!["slow", "next"]);
        assert_eq!(handle.stats().restarts, 0);

        shutdown.trigger();
        worker.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_panicking_job_restarts_worker() {
        let (dispatcher, handle, _backend) = dispatcher(vec![Step::Panic]);
        let shutdown = Shutdown::new();
        let worker = dispatcher.start(shutdown.subscribe());

        let (_, doomed) = handle.enqueue("boom".into()).unwrap();
        assert!(doomed.await.is_err(), "reply sender dropped by the panic");

        let (_, next) = handle.enqueue("after".into()).unwrap();
        assert_eq!(next.await.unwrap(), Outcome::success("hi there"));
        assert_eq!(handle.stats().restarts, 1);

        shutdown.trigger();
        worker.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_worker_exits_when_handles_dropped() {
        let (dispatcher, handle, _backend) = dispatcher(vec![]);
        let shutdown = Shutdown::new();
        let worker = dispatcher.start(shutdown.subscribe());

        drop(handle);
        worker.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_waits_for_in_flight_job() {
        let (dispatcher, handle, _backend) = dispatcher(vec![Step::Slow(Duration::from_secs(5))]);
        let shutdown = Shutdown::new();
        let worker = dispatcher.start(shutdown.subscribe());

        let (_, rx) = handle.enqueue("slow".into()).unwrap();
        tokio::time::sleep(Duration::from_secs(1)).await;
        shutdown.trigger();

        assert_eq!(rx.await.unwrap(), Outcome::success("hi there"));
        worker.await.unwrap();
    }
}
