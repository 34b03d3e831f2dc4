//! The wire types shared by every source, the merger, and the consumer.

use k8s_openapi::api::core::v1::Pod;

/// The sentinel source name `Sync` output is reported under.
pub const ALL_SOURCES: &str = "*";

/// The operation an inbound report or outbound event carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Op {
    /// A pod is new to the source.
    Add,
    /// A pod already known to the source changed in a way that matters.
    Update,
    /// A pod should be removed from the source's view.
    Remove,
    /// A full replacement of the source's pod set.
    Set,
    /// A status-only change the consumer must observe without treating it
    /// as a spec change (e.g. a local-annotation update).
    Reconcile,
}

/// A report pushed by a source, or an event emitted on the merged stream.
///
/// `source` on an inbound report is ignored by the merger in favor of the
/// name the sending endpoint was registered under (spec: "Source field on
/// incoming reports is ignored in favor of the registered source name").
#[derive(Debug, Clone)]
pub struct PodUpdate {
    pub op: Op,
    pub source: String,
    pub pods: Vec<Pod>,
}

impl PodUpdate {
    pub fn new(op: Op, source: impl Into<String>, pods: Vec<Pod>) -> Self {
        Self {
            op,
            source: source.into(),
            pods,
        }
    }
}
