//! Error taxonomy for the pod multiplexer.
//!
//! Most failures in this crate are not `Result`-shaped: a malformed pod is
//! recorded and dropped, never returned to the caller (see
//! [`crate::recorder::EventRecorder`]). This module only covers the handful
//! of things that *are* surfaced to callers directly.

use crate::pod::PodKey;
use thiserror::Error;

/// Errors surfaced across the public API of `podmux`.
#[derive(Debug, Error)]
pub enum Error {
    /// A pod failed structural validation. Carried here only for tests and
    /// for the rare caller that wants the rejection reason outside of the
    /// event recorder; the merger itself never returns this from
    /// `PodUpdateSender::send` — it records a warning event and continues.
    #[error("pod {pod:?} failed validation: {reason}")]
    Validation { pod: PodKey, reason: String },

    /// The multiplexer has shut down; its input or output channels are
    /// closed. Returned by `PodUpdateSender::send` after `shutdown()`.
    #[error("podmux channel closed")]
    ChannelClosed,

    /// An internal invariant was violated. This should be unreachable; it
    /// exists so the merger's registration-invariant panic
    /// (`Merger::store_or_panic`) has a typed message shape, checked via
    /// `std::panic::catch_unwind` in this crate's own tests, not to be
    /// matched on by callers.
    #[error("source {source} desynchronized: {detail}")]
    SourceDesync { source: String, detail: String },
}
