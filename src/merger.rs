//! The merger: a single task that owns every source's store, serializes all
//! mutation, and emits classified events per the active notification mode.
//!
//! Single-writer discipline (spec §5): only this task ever touches
//! `HashMap<String, SourceStore>`. Everything else in this crate talks to it
//! through channels, so no `Mutex`/`RwLock` wraps the stores themselves.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

use k8s_openapi::api::core::v1::Pod;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio_stream::wrappers::ReceiverStream;
use tokio_stream::{StreamExt, StreamMap};
use tracing::{debug, trace, warn};

use crate::config::{MuxConfig, NotificationMode};
use crate::pod::LocalAnnotationPredicate;
use crate::recorder::{EventRecorder, EventType};
use crate::store::{DeltaOutcome, SourceStore};
use crate::update::{Op, PodUpdate, ALL_SOURCES};
use crate::validate::{validate_pod, StructuralCheck};

/// Messages the front-end (`PodMultiplexer`) sends the merger task. Source
/// reports themselves never go through this channel — each source gets its
/// own dedicated `mpsc` channel, fanned in via a `StreamMap`; this one
/// carries control operations instead.
pub(crate) enum Control {
    Register {
        source: String,
        receiver: mpsc::Receiver<PodUpdate>,
    },
    Sync {
        ack: oneshot::Sender<()>,
    },
}

pub(crate) struct MergerHandle {
    pub(crate) control_tx: mpsc::Sender<Control>,
    pub(crate) seen: Arc<Mutex<HashSet<String>>>,
    pub(crate) join_handle: JoinHandle<()>,
}

/// Spawn the merger task and return the handle the front-end drives it
/// through.
pub(crate) fn spawn(
    config: &MuxConfig,
    recorder: Arc<dyn EventRecorder>,
) -> (MergerHandle, mpsc::Receiver<PodUpdate>) {
    let (control_tx, control_rx) = mpsc::channel(config.capacities.source.max(1));
    let (output_tx, output_rx) = mpsc::channel(config.capacities.output.max(1));
    let seen = Arc::new(Mutex::new(HashSet::new()));

    let state = Merger {
        stores: HashMap::new(),
        mode: config.mode,
        is_local: config.is_local.clone(),
        structural_check: config.structural_check.clone(),
        recorder,
        seen: seen.clone(),
    };

    let join_handle = tokio::spawn(state.run(control_rx, output_tx));

    (
        MergerHandle {
            control_tx,
            seen,
            join_handle,
        },
        output_rx,
    )
}

struct Merger {
    stores: HashMap<String, SourceStore>,
    mode: NotificationMode,
    is_local: LocalAnnotationPredicate,
    structural_check: StructuralCheck,
    recorder: Arc<dyn EventRecorder>,
    seen: Arc<Mutex<HashSet<String>>>,
}

impl Merger {
    async fn run(mut self, mut control_rx: mpsc::Receiver<Control>, output_tx: mpsc::Sender<PodUpdate>) {
        let mut inputs: StreamMap<String, ReceiverStream<PodUpdate>> = StreamMap::new();
        let mut control_closed = false;

        loop {
            tokio::select! {
                maybe_control = control_rx.recv(), if !control_closed => {
                    match maybe_control {
                        Some(Control::Register { source, receiver }) => {
                            debug!(source = %source, "registering source");
                            self.stores.entry(source.clone()).or_insert_with(SourceStore::new);
                            inputs.insert(source, ReceiverStream::new(receiver));
                        }
                        Some(Control::Sync { ack }) => {
                            self.handle_sync(&output_tx).await;
                            let _ = ack.send(());
                        }
                        None => {
                            control_closed = true;
                            debug!("control channel closed, draining remaining sources");
                        }
                    }
                }
                Some((source, update)) = inputs.next(), if !inputs.is_empty() => {
                    self.seen.lock().expect("seen mutex poisoned").insert(source.clone());
                    if !self.process_report(&source, update, &output_tx).await {
                        // Output stream closed: nothing further can be delivered.
                        break;
                    }
                }
                else => break,
            }
        }

        trace!("merger task exiting");
    }

    /// Returns `false` if the output stream has closed and the merger
    /// should stop.
    async fn process_report(
        &mut self,
        source: &str,
        update: PodUpdate,
        output_tx: &mpsc::Sender<PodUpdate>,
    ) -> bool {
        let op = update.op;
        let valid_pods = self.filter_valid(update.pods);

        let store = self.store_or_panic(source);
        let outcome = store.apply(op, valid_pods, &self.is_local);

        if outcome.is_empty() {
            trace!(source, "report produced no classified changes");
            return true;
        }

        self.emit(source, op, &outcome, output_tx).await
    }

    /// Validate every pod in a report, recording a warning event (and
    /// dropping the pod) for each that fails. Sibling pods in the same
    /// report are unaffected.
    fn filter_valid(&self, pods: Vec<Pod>) -> Vec<Pod> {
        pods.into_iter()
            .filter(|pod| match validate_pod(pod, &self.structural_check) {
                Ok(()) => true,
                Err(reason) => {
                    warn!(
                        pod = pod.metadata.name.as_deref().unwrap_or("<unnamed>"),
                        reason = %reason,
                        "dropping pod that failed validation"
                    );
                    self.recorder.eventf(
                        pod,
                        EventType::Warning,
                        "FailedValidation",
                        &format!("pod failed validation: {reason}"),
                    );
                    false
                }
            })
            .collect()
    }

    async fn emit(
        &self,
        source: &str,
        op: Op,
        outcome: &DeltaOutcome,
        output_tx: &mpsc::Sender<PodUpdate>,
    ) -> bool {
        match self.mode {
            NotificationMode::Incremental => self.emit_incremental(source, outcome, output_tx).await,
            NotificationMode::Snapshot => self.emit_snapshot(source, outcome, output_tx).await,
            NotificationMode::SnapshotAndUpdates => {
                self.emit_snapshot_and_updates(source, op, outcome, output_tx).await
            }
        }
    }

    async fn emit_incremental(
        &self,
        source: &str,
        outcome: &DeltaOutcome,
        output_tx: &mpsc::Sender<PodUpdate>,
    ) -> bool {
        for (bucket_op, pods) in [
            (Op::Add, &outcome.adds),
            (Op::Update, &outcome.updates),
            (Op::Remove, &outcome.removes),
            (Op::Reconcile, &outcome.reconciles),
        ] {
            if pods.is_empty() {
                continue;
            }
            if !send(output_tx, PodUpdate::new(bucket_op, source, pods.clone())).await {
                return false;
            }
        }
        true
    }

    async fn emit_snapshot(
        &self,
        source: &str,
        outcome: &DeltaOutcome,
        output_tx: &mpsc::Sender<PodUpdate>,
    ) -> bool {
        if outcome.is_empty() {
            return true;
        }
        let snapshot = self
            .stores
            .get(source)
            .map(SourceStore::snapshot)
            .unwrap_or_default();
        send(output_tx, PodUpdate::new(Op::Set, source, snapshot)).await
    }

    async fn emit_snapshot_and_updates(
        &self,
        source: &str,
        op: Op,
        outcome: &DeltaOutcome,
        output_tx: &mpsc::Sender<PodUpdate>,
    ) -> bool {
        for (bucket_op, pods) in [
            (Op::Update, &outcome.updates),
            (Op::Remove, &outcome.removes),
            (Op::Reconcile, &outcome.reconciles),
        ] {
            if pods.is_empty() {
                continue;
            }
            if !send(output_tx, PodUpdate::new(bucket_op, source, pods.clone())).await {
                return false;
            }
        }

        let membership_shifted =
            !outcome.adds.is_empty() || !outcome.removes.is_empty() || op == Op::Set;
        if membership_shifted {
            let snapshot = self
                .stores
                .get(source)
                .map(SourceStore::snapshot)
                .unwrap_or_default();
            if !send(output_tx, PodUpdate::new(Op::Set, source, snapshot)).await {
                return false;
            }
        }
        true
    }

    /// `Sync`: emit the all-sources snapshot. Best-effort — if the output
    /// stream is already closed this is a silent no-op, never an error
    /// (spec §4.D).
    async fn handle_sync(&self, output_tx: &mpsc::Sender<PodUpdate>) {
        let pods: Vec<Pod> = self
            .stores
            .values()
            .flat_map(SourceStore::snapshot)
            .collect();
        let _ = output_tx.send(PodUpdate::new(Op::Set, ALL_SOURCES, pods)).await;
    }

    /// Every source reaching `process_report` was registered via
    /// `Control::Register`, which inserts its store before the source's
    /// `StreamMap` entry is wired up — so a report for a source with no
    /// store here means the registration invariant was broken somewhere
    /// upstream. That should be unreachable; panic with a typed
    /// [`crate::error::Error::SourceDesync`] rather than let the `HashMap`
    /// silently reroute the report to nowhere.
    fn store_or_panic(&mut self, source: &str) -> &mut SourceStore {
        if !self.stores.contains_key(source) {
            panic!(
                "{}",
                crate::error::Error::SourceDesync {
                    source: source.to_string(),
                    detail: "report arrived for a source with no registered store".to_string(),
                }
            );
        }
        self.stores.get_mut(source).expect("checked above")
    }
}

async fn send(output_tx: &mpsc::Sender<PodUpdate>, update: PodUpdate) -> bool {
    output_tx.send(update).await.is_ok()
}
