use chrono::{DateTime, Utc};

/// A published fact about committed state.
///
/// Events are immutable and carry a stable routing key so consumers can
/// subscribe by entity and action without decoding the payload.
pub trait Event: Clone + core::fmt::Debug + Send + Sync + 'static {
    /// Stable routing key (e.g. "accounts.email.updated").
    fn routing_key(&self) -> String;

    /// Schema version for this event type.
    fn version(&self) -> u32;

    /// When the change was committed.
    fn occurred_at(&self) -> DateTime<Utc>;
}
