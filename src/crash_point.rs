//! Crash point injection for durability testing
//!
//! When `TXSINK_CRASH_POINT` names a crash point, the process terminates
//! there via `std::process::abort()`: no cleanup, no unwinding, no flush.
//!
//! ```bash
//! TXSINK_CRASH_POINT=sink_after_apply txsink write --config sink.json --txid 3
//! ```

use std::sync::OnceLock;

/// Environment variable naming the active crash point
pub const CRASH_POINT_ENV: &str = "TXSINK_CRASH_POINT";

static CRASH_POINT: OnceLock<Option<String>> = OnceLock::new();

#[inline]
fn get_crash_point() -> Option<&'static str> {
    CRASH_POINT
        .get_or_init(|| std::env::var(CRASH_POINT_ENV).ok())
        .as_deref()
}

/// Returns true if `TXSINK_CRASH_POINT` equals the given name.
#[inline]
pub fn crash_point_enabled(name: &str) -> bool {
    get_crash_point().map(|p| p == name).unwrap_or(false)
}

/// Abort the process if the named crash point is enabled.
#[inline]
pub fn maybe_crash(name: &str) {
    if crash_point_enabled(name) {
        eprintln!("[CRASH] Triggering crash at point: {}", name);
        std::process::abort();
    }
}

/// All defined crash point names
pub mod points {
    // Coordinator
    pub const SINK_AFTER_INDEX_WRITE: &str = "sink_after_index_write";
    pub const SINK_AFTER_APPLY: &str = "sink_after_apply";
    pub const SINK_BEFORE_COMMIT_FLUSH: &str = "sink_before_commit_flush";
    pub const SINK_AFTER_COMMIT_FLUSH: &str = "sink_after_commit_flush";

    // Channel
    pub const CHANNEL_AFTER_ROTATE: &str = "channel_after_rotate";
    pub const CHANNEL_AFTER_TRUNCATE: &str = "channel_after_truncate";

    /// Every crash point, for harnesses that iterate over them
    pub const ALL: &[&str] = &[
        SINK_AFTER_INDEX_WRITE,
        SINK_AFTER_APPLY,
        SINK_BEFORE_COMMIT_FLUSH,
        SINK_AFTER_COMMIT_FLUSH,
        CHANNEL_AFTER_ROTATE,
        CHANNEL_AFTER_TRUNCATE,
    ];
}
