//! `podmux`: merges desired-state pod declarations streaming in from several
//! independent sources into a single, deduplicated, change-annotated stream
//! of updates for a node agent to consume.
//!
//! Each source (an API watcher, a filesystem directory, an HTTP endpoint —
//! none of which this crate implements) pushes [`update::PodUpdate`] reports
//! into the [`mux::PodUpdateSender`] it was handed by
//! [`mux::PodMultiplexer::channel`]. A single merger task maintains the
//! authoritative per-source view of desired pods, classifies every incoming
//! change as add/update/remove/reconcile/no-op, and emits events on the
//! stream returned by [`mux::PodMultiplexer::updates`] under one of three
//! notification policies ([`config::NotificationMode`]).
//!
//! This crate is a library, not a process: it has no CLI, no metrics
//! endpoint, and never initializes a `tracing` subscriber — it only emits
//! events through one, the same way any well-behaved library in this
//! ecosystem does.
//!
//! ```no_run
//! use std::sync::Arc;
//! use podmux::config::{kubernetes_io_prefix_is_local, MuxConfig, NotificationMode};
//! use podmux::mux::PodMultiplexer;
//! use podmux::recorder::NullRecorder;
//! use podmux::update::{Op, PodUpdate};
//!
//! # async fn example() {
//! let config = MuxConfig::new(NotificationMode::Incremental, kubernetes_io_prefix_is_local());
//! let mux = PodMultiplexer::new(config, Arc::new(NullRecorder));
//!
//! let file_source = mux.channel("file").await;
//! file_source.send(PodUpdate::new(Op::Add, "file", vec![])).await.ok();
//!
//! let mut updates = mux.updates();
//! # }
//! ```

pub mod config;
pub mod error;
pub mod pod;
pub mod recorder;
pub mod store;
pub mod update;
pub mod validate;

mod merger;
pub mod mux;

pub use config::{ChannelCapacities, MuxConfig, NotificationMode};
pub use error::Error;
pub use mux::{PodMultiplexer, PodUpdateSender, PodUpdateStream};
pub use pod::{normalize_namespace, pod_key, semantically_equal, LocalAnnotationPredicate, PodKey};
pub use recorder::{EventRecorder, EventType};
pub use store::{DeltaOutcome, SourceStore};
pub use update::{Op, PodUpdate, ALL_SOURCES};
