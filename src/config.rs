//! Construction-time configuration for a [`crate::mux::PodMultiplexer`].
//!
//! Bundled the way this codebase bundles multi-field construction elsewhere
//! (`ScoringWeights::default()` plus field overrides) rather than as a long
//! constructor argument list.

use crate::pod::LocalAnnotationPredicate;
use crate::validate::{kubelet_structural_checks, StructuralCheck};
use std::sync::Arc;

/// Which events the merger emits for a given source after applying a delta.
/// See spec §4.D for the exact semantics of each mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationMode {
    /// One event per non-empty bucket: `adds`, `updates`, `removes`,
    /// `reconciles`, in that order.
    Incremental,
    /// A single `Set` event with the source's full post-apply contents,
    /// emitted iff any bucket was non-empty.
    Snapshot,
    /// Incremental `updates`/`removes`/`reconciles` events, plus a `Set`
    /// snapshot whenever membership shifted (`adds` non-empty, a `Remove`
    /// occurred, or the incoming op was `Set`).
    SnapshotAndUpdates,
}

/// Bounded channel capacities. Unbounded is deliberately not an option: the
/// spec's back-pressure guarantee requires the channels be boundable (spec
/// §5).
#[derive(Debug, Clone, Copy)]
pub struct ChannelCapacities {
    /// Capacity of each source's input endpoint.
    pub source: usize,
    /// Capacity of the single consumer-facing output stream.
    pub output: usize,
}

impl Default for ChannelCapacities {
    fn default() -> Self {
        Self {
            source: 64,
            output: 64,
        }
    }
}

/// Constructor parameters for [`crate::mux::PodMultiplexer::new`].
pub struct MuxConfig {
    pub mode: NotificationMode,
    pub is_local: LocalAnnotationPredicate,
    pub structural_check: StructuralCheck,
    pub capacities: ChannelCapacities,
}

impl MuxConfig {
    /// `mode` and `is_local` are the two parameters spec.md's constructor
    /// names explicitly; everything else gets a sensible default that can be
    /// overridden on the returned value before passing it to `new`.
    pub fn new(mode: NotificationMode, is_local: LocalAnnotationPredicate) -> Self {
        Self {
            mode,
            is_local,
            structural_check: kubelet_structural_checks(),
            capacities: ChannelCapacities::default(),
        }
    }

    pub fn with_structural_check(mut self, check: StructuralCheck) -> Self {
        self.structural_check = check;
        self
    }

    pub fn with_capacities(mut self, capacities: ChannelCapacities) -> Self {
        self.capacities = capacities;
        self
    }
}

/// A `LocalAnnotationPredicate` matching the original system's convention —
/// provided as a convenience, not a hardcoded default inside the merger
/// itself (spec §9: "do not hardcode domain strings in the merger").
pub fn kubernetes_io_prefix_is_local() -> LocalAnnotationPredicate {
    Arc::new(|key: &str| key.starts_with("kubernetes.io/"))
}
