//! The multiplexer front-end: the only type embedders construct directly.

use std::collections::HashMap;
use std::sync::{Arc, Mutex as StdMutex};

use tokio::sync::{mpsc, oneshot, Mutex as AsyncMutex};
use tokio::task::JoinHandle;
use tokio_stream::wrappers::ReceiverStream;

use crate::config::MuxConfig;
use crate::error::Error;
use crate::merger::{self, Control};
use crate::recorder::EventRecorder;
use crate::update::PodUpdate;

/// A cloneable handle to one source's bounded input endpoint. Every call to
/// [`PodMultiplexer::channel`] for the same source name returns a clone of
/// the same sender.
#[derive(Clone)]
pub struct PodUpdateSender {
    inner: mpsc::Sender<PodUpdate>,
}

impl PodUpdateSender {
    /// Pushes a report onto this source's endpoint, blocking
    /// (back-pressuring the caller) while the endpoint is full. Fails only
    /// once the multiplexer has shut down.
    pub async fn send(&self, update: PodUpdate) -> Result<(), Error> {
        self.inner.send(update).await.map_err(|_| Error::ChannelClosed)
    }
}

/// The single consumer-facing stream of classified [`PodUpdate`] events.
/// Obtain via [`PodMultiplexer::updates`] and drive with
/// `tokio_stream::StreamExt::next`.
pub type PodUpdateStream = ReceiverStream<PodUpdate>;

/// Merges desired-state pod reports from any number of registered sources
/// into one classified, back-pressured stream (spec §4.E / §6).
///
/// `PodMultiplexer` is `Send + Sync`: all mutable state lives inside the
/// merger task spawned by [`PodMultiplexer::new`], reachable only through
/// channel handles.
pub struct PodMultiplexer {
    control_tx: mpsc::Sender<Control>,
    registered: AsyncMutex<HashMap<String, PodUpdateSender>>,
    seen: Arc<StdMutex<std::collections::HashSet<String>>>,
    output: StdMutex<Option<mpsc::Receiver<PodUpdate>>>,
    join_handle: StdMutex<Option<JoinHandle<()>>>,
    source_capacity: usize,
}

impl PodMultiplexer {
    /// Construct a multiplexer and spawn its merger task. The task runs
    /// until [`PodMultiplexer::shutdown`] is called and every registered
    /// source's senders have been dropped.
    pub fn new(config: MuxConfig, recorder: Arc<dyn EventRecorder>) -> Self {
        let source_capacity = config.capacities.source.max(1);
        let (handle, output_rx) = merger::spawn(&config, recorder);

        Self {
            control_tx: handle.control_tx,
            registered: AsyncMutex::new(HashMap::new()),
            seen: handle.seen,
            output: StdMutex::new(Some(output_rx)),
            join_handle: StdMutex::new(Some(handle.join_handle)),
            source_capacity,
        }
    }

    /// Returns the input endpoint for `source`, registering it with the
    /// merger on first call. Idempotent: repeated calls with the same name
    /// return a clone of the same endpoint (spec: "Duplicate source
    /// registration... returns the existing endpoint; not an error").
    pub async fn channel(&self, source: impl Into<String>) -> PodUpdateSender {
        let source = source.into();
        let mut registered = self.registered.lock().await;
        if let Some(existing) = registered.get(&source) {
            return existing.clone();
        }

        let (tx, rx) = mpsc::channel(self.source_capacity);
        let sender = PodUpdateSender { inner: tx };
        // Best-effort: if the merger has already shut down, the new source
        // simply never sees its reports processed. Its own `send` calls
        // will start failing with `Error::ChannelClosed` once the receiver
        // is dropped along with the merger task, which is the correct
        // observable behavior for registering post-shutdown.
        let _ = self
            .control_tx
            .send(Control::Register {
                source: source.clone(),
                receiver: rx,
            })
            .await;

        registered.insert(source, sender.clone());
        sender
    }

    /// Takes ownership of the single consumer-facing output stream.
    /// Must be called at most once; a second call panics, matching the
    /// spec's "multiple callers are not supported" (undefined behavior
    /// becomes an explicit, loud failure here instead).
    pub fn updates(&self) -> PodUpdateStream {
        let receiver = self
            .output
            .lock()
            .expect("output mutex poisoned")
            .take()
            .expect("PodMultiplexer::updates() called more than once");
        ReceiverStream::new(receiver)
    }

    /// Requests the synthetic all-sources snapshot event described in spec
    /// §4.D. Best-effort: if the multiplexer has already shut down, this
    /// silently does nothing rather than erroring.
    pub async fn sync(&self) {
        let (ack_tx, ack_rx) = oneshot::channel();
        if self.control_tx.send(Control::Sync { ack: ack_tx }).await.is_err() {
            return;
        }
        let _ = ack_rx.await;
    }

    /// True iff every name in `expected` has delivered at least one report
    /// since this multiplexer was created.
    pub fn seen_all_sources(&self, expected: &[String]) -> bool {
        let seen = self.seen.lock().expect("seen mutex poisoned");
        expected.iter().all(|s| seen.contains(s))
    }

    /// Signals shutdown: closes the registration/sync control channel and
    /// awaits the merger task. The owner is still responsible for dropping
    /// every [`PodUpdateSender`] it handed to sources — the merger task
    /// itself only finishes once every source's input endpoint is fully
    /// closed (spec §5's "owner signals shutdown by closing all input
    /// endpoints").
    pub async fn shutdown(self) {
        {
            let mut registered = self.registered.lock().await;
            registered.clear();
        }
        drop(self.control_tx);
        let handle = self
            .join_handle
            .lock()
            .expect("join handle mutex poisoned")
            .take();
        if let Some(handle) = handle {
            let _ = handle.await;
        }
    }
}
