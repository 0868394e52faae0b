//! The delivery machinery.
//!
//! Events are handed to a [`Transport`] which is expected to get them to
//! the collector without blocking the capture call.  The bundled
//! [`HttpTransport`] queues events and delivers them from a background
//! worker thread with retries.

use std::collections::VecDeque;
use std::sync::{Arc, Condvar, Mutex};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use thiserror::Error;

use crate::clientoptions::ClientOptions;
use crate::protocol::{ApiResponse, Event};

/// The trait for transports.
///
/// A transport takes full ownership of an event and is responsible for its
/// delivery.  `send_event` must never block the caller; queueing and
/// retrying happen behind it.
pub trait Transport: Send + Sync + 'static {
    /// Sends an event.
    fn send_event(&self, event: Event);

    /// Blocks until all queued events were delivered or the timeout was hit.
    ///
    /// Returns `true` when the queue is empty.
    fn flush(&self, timeout: Option<Duration>) -> bool {
        let _ = timeout;
        true
    }

    /// Flushes and instructs the transport to shut down.
    fn shutdown(&self, timeout: Option<Duration>) -> bool {
        self.flush(timeout)
    }

    /// The collector-assigned id of the last successfully delivered event.
    fn last_event_id(&self) -> Option<String> {
        None
    }
}

/// A factory creating a transport for a specific client.
///
/// Because the client is restartable, transports are created through this
/// factory rather than passed in directly.
pub trait TransportFactory: Send + Sync {
    /// Given the options of a client, creates the transport for it.
    fn create_transport(&self, options: &ClientOptions) -> Arc<dyn Transport>;
}

impl<F> TransportFactory for F
where
    F: Fn(&ClientOptions) -> Arc<dyn Transport> + Send + Sync,
{
    fn create_transport(&self, options: &ClientOptions) -> Arc<dyn Transport> {
        self(options)
    }
}

impl<T: Transport> TransportFactory for Arc<T> {
    fn create_transport(&self, _options: &ClientOptions) -> Arc<dyn Transport> {
        self.clone()
    }
}

/// The default transport factory, creating the compiled-in HTTP transport.
pub struct DefaultTransportFactory;

impl TransportFactory for DefaultTransportFactory {
    fn create_transport(&self, options: &ClientOptions) -> Arc<dyn Transport> {
        #[cfg(feature = "transport")]
        {
            Arc::new(HttpTransport::new(options))
        }
        #[cfg(not(feature = "transport"))]
        {
            let _ = options;
            panic!("streply was compiled without the `transport` feature, set a custom transport")
        }
    }
}

/// A single delivery attempt failure.
#[derive(Debug, Error)]
pub enum DeliveryError {
    /// The collector asked us to back off.
    #[error("rate limited by the collector")]
    RateLimited,
    /// The collector answered with a non-success status code.
    #[error("collector returned status {0}")]
    Http(u16),
    /// The request never made it to the collector.
    #[error("io error: {0}")]
    Io(String),
}

/// The delay before the next attempt after `attempt` failed ones.
///
/// Failures back off linearly with the attempt number; rate limiting
/// doubles the delay on top.
fn backoff_delay(retry_delay: Duration, attempt: u32, rate_limited: bool) -> Duration {
    retry_delay * attempt * if rate_limited { 2 } else { 1 }
}

/// The function a [`TransportWorker`] calls to perform one delivery attempt.
pub type SendFn = Box<dyn FnMut(&Event) -> Result<ApiResponse, DeliveryError> + Send>;

struct WorkerState {
    queue: VecDeque<Event>,
    in_flight: bool,
    shutdown: bool,
}

struct Shared {
    state: Mutex<WorkerState>,
    queued: Condvar,
    drained: Condvar,
    last_event_id: Mutex<Option<String>>,
}

/// A queue-backed worker thread that delivers events one by one.
///
/// The worker owns the actual send function, so it is usable both by the
/// HTTP transport and by tests that substitute an in-process sender.
pub struct TransportWorker {
    shared: Arc<Shared>,
    handle: Mutex<Option<JoinHandle<()>>>,
    buffer_size: usize,
}

impl TransportWorker {
    /// Spawns the worker thread.
    pub fn new(buffer_size: usize, retry_max: u32, retry_delay: Duration, send: SendFn) -> Self {
        let shared = Arc::new(Shared {
            state: Mutex::new(WorkerState {
                queue: VecDeque::new(),
                in_flight: false,
                shutdown: false,
            }),
            queued: Condvar::new(),
            drained: Condvar::new(),
            last_event_id: Mutex::new(None),
        });

        let handle = thread::Builder::new()
            .name("streply-transport".into())
            .spawn({
                let shared = shared.clone();
                move || run(shared, send, retry_max.max(1), retry_delay, buffer_size.max(1))
            })
            .unwrap();

        TransportWorker {
            shared,
            handle: Mutex::new(Some(handle)),
            buffer_size,
        }
    }

    /// Queues an event for delivery.
    ///
    /// When the buffer is full the event is discarded rather than blocking
    /// the caller.
    pub fn send(&self, event: Event) {
        let mut state = self
            .shared
            .state
            .lock()
            .unwrap_or_else(|e| e.into_inner());
        if state.shutdown {
            return;
        }
        if state.queue.len() >= self.buffer_size {
            streply_debug!(
                "event buffer is full, dropping event {}",
                event.trace_unique_id
            );
            return;
        }
        state.queue.push_back(event);
        self.shared.queued.notify_one();
    }

    /// Waits for the queue to empty, up to `timeout`.
    pub fn flush(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut state = self
            .shared
            .state
            .lock()
            .unwrap_or_else(|e| e.into_inner());
        while !state.queue.is_empty() || state.in_flight {
            let now = Instant::now();
            if now >= deadline {
                return false;
            }
            let (guard, _) = self
                .shared
                .drained
                .wait_timeout(state, deadline - now)
                .unwrap_or_else(|e| e.into_inner());
            state = guard;
        }
        true
    }

    /// Flushes and tells the worker to exit once the queue is empty.
    pub fn shutdown(&self, timeout: Duration) -> bool {
        {
            let mut state = self
                .shared
                .state
                .lock()
                .unwrap_or_else(|e| e.into_inner());
            state.shutdown = true;
            self.shared.queued.notify_all();
        }
        self.flush(timeout)
    }

    /// The collector id of the last delivered event.
    pub fn last_event_id(&self) -> Option<String> {
        self.shared
            .last_event_id
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }
}

impl Drop for TransportWorker {
    fn drop(&mut self) {
        {
            let mut state = self
                .shared
                .state
                .lock()
                .unwrap_or_else(|e| e.into_inner());
            state.shutdown = true;
            // undelivered events are abandoned at this point
            state.queue.clear();
            self.shared.queued.notify_all();
        }
        let handle = self
            .handle
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take();
        if let Some(handle) = handle {
            handle.join().ok();
        }
    }
}

fn run(
    shared: Arc<Shared>,
    mut send: SendFn,
    retry_max: u32,
    retry_delay: Duration,
    buffer_size: usize,
) {
    loop {
        // swap a batch out in one critical section, never holding the lock
        // across network i/o
        let batch = {
            let mut state = shared.state.lock().unwrap_or_else(|e| e.into_inner());
            loop {
                if !state.queue.is_empty() {
                    let take = state.queue.len().min(buffer_size);
                    let batch: Vec<Event> = state.queue.drain(..take).collect();
                    state.in_flight = true;
                    break Some(batch);
                }
                if state.shutdown {
                    break None;
                }
                state = shared.queued.wait(state).unwrap_or_else(|e| e.into_inner());
            }
        };

        let batch = match batch {
            Some(batch) => batch,
            None => break,
        };

        // in enqueue order; a stalled retry holds back the rest of the batch
        for event in &batch {
            deliver(&shared, &mut send, event, retry_max, retry_delay);
        }

        let mut state = shared.state.lock().unwrap_or_else(|e| e.into_inner());
        state.in_flight = false;
        if state.queue.is_empty() {
            shared.drained.notify_all();
        }
    }
    shared.drained.notify_all();
}

fn deliver(
    shared: &Shared,
    send: &mut SendFn,
    event: &Event,
    retry_max: u32,
    retry_delay: Duration,
) {
    for attempt in 1..=retry_max {
        match send(event) {
            Ok(response) => {
                if response.is_success() {
                    if let Some(id) = response.id {
                        *shared
                            .last_event_id
                            .lock()
                            .unwrap_or_else(|e| e.into_inner()) = Some(id);
                    }
                } else {
                    streply_debug!(
                        "collector rejected event {}: status {:?}",
                        event.trace_unique_id,
                        response.status
                    );
                }
                return;
            }
            Err(err) => {
                streply_debug!(
                    "delivery attempt {} for event {} failed: {}",
                    attempt,
                    event.trace_unique_id,
                    err
                );
                if attempt >= retry_max {
                    break;
                }
                let shutting_down = shared
                    .state
                    .lock()
                    .unwrap_or_else(|e| e.into_inner())
                    .shutdown;
                if shutting_down {
                    return;
                }
                thread::sleep(backoff_delay(
                    retry_delay,
                    attempt,
                    matches!(err, DeliveryError::RateLimited),
                ));
            }
        }
    }
    streply_debug!(
        "dropping event {} after {} failed delivery attempts",
        event.trace_unique_id,
        retry_max
    );
}

#[cfg(feature = "transport")]
pub use self::http::HttpTransport;

#[cfg(feature = "transport")]
mod http {
    use super::*;

    /// The default HTTP transport, based on `ureq`.
    ///
    /// Events are serialized to JSON and POSTed to the collector endpoint
    /// derived from the DSN, with the public key and project id carried in
    /// the `Token` and `ProjectId` headers.
    pub struct HttpTransport {
        worker: TransportWorker,
        default_timeout: Duration,
    }

    impl HttpTransport {
        /// Creates a new transport from the client options.
        pub fn new(options: &ClientOptions) -> Self {
            let dsn = options.dsn.as_ref().unwrap().clone();
            let url = dsn.api_url();
            let token = dsn.public_key().to_string();
            let project_id = dsn.project_id().to_string();

            let agent = ureq::AgentBuilder::new()
                .user_agent(&options.user_agent)
                .build();

            let send: SendFn = Box::new(move |event| {
                let body =
                    serde_json::to_string(event).map_err(|e| DeliveryError::Io(e.to_string()))?;
                let request = agent
                    .post(&url)
                    .set("Content-Type", "application/json")
                    .set("Token", &token)
                    .set("ProjectId", &project_id);
                match request.send_string(&body) {
                    Ok(response) => {
                        let text = response
                            .into_string()
                            .map_err(|e| DeliveryError::Io(e.to_string()))?;
                        // an unparseable reply counts as a server-side error
                        Ok(serde_json::from_str(&text).unwrap_or_else(|_| ApiResponse {
                            status: "error".into(),
                            id: None,
                        }))
                    }
                    Err(ureq::Error::Status(429, _)) => Err(DeliveryError::RateLimited),
                    Err(ureq::Error::Status(code, _)) => Err(DeliveryError::Http(code)),
                    Err(err) => Err(DeliveryError::Io(err.to_string())),
                }
            });

            HttpTransport {
                worker: TransportWorker::new(
                    options.buffer_size,
                    options.retry_max,
                    options.retry_delay,
                    send,
                ),
                default_timeout: options.shutdown_timeout,
            }
        }
    }

    impl Transport for HttpTransport {
        fn send_event(&self, event: Event) {
            self.worker.send(event);
        }

        fn flush(&self, timeout: Option<Duration>) -> bool {
            self.worker.flush(timeout.unwrap_or(self.default_timeout))
        }

        fn shutdown(&self, timeout: Option<Duration>) -> bool {
            self.worker
                .shutdown(timeout.unwrap_or(self.default_timeout))
        }

        fn last_event_id(&self) -> Option<String> {
            self.worker.last_event_id()
        }
    }
}
