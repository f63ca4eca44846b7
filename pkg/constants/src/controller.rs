//! Reconciliation timing constants.

/// Default interval between full resyncs of every NetSet, in seconds.
/// Bounds the impact of missed watch events.
pub const DEFAULT_RESYNC_SECS: u64 = 30;

/// Default delay before a requeued reconciliation is re-delivered, in
/// milliseconds.
pub const DEFAULT_REQUEUE_DELAY_MS: u64 = 500;

/// Capacity of the watch broadcast channel. Subscribers that lag behind
/// this many events fall back to the next resync.
pub const WATCH_CHANNEL_CAPACITY: usize = 1024;
