/// Interval between status polls of a remote call, in milliseconds
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 50;
/// Size of the in-process reference worker pool
pub const DEFAULT_WORKER_COUNT: usize = 2;
/// Extra attempts for a failed unit call (0 = fail on first error)
pub const DEFAULT_RETRY_ATTEMPTS: u32 = 0;
/// Concurrency used when available parallelism cannot be determined
pub const FALLBACK_CONCURRENCY: usize = 4;
