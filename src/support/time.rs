use std::time::{Duration, SystemTime};

use tokio::time::Instant;

/// Wall-clock now.
pub fn now() -> SystemTime {
    SystemTime::now()
}

/// Monotonic deadline `timeout` from now, for the async operations.
pub fn deadline_after(timeout: Duration) -> Instant {
    Instant::now() + timeout
}

/// Blocks the calling thread until the wall clock reaches `until`.
///
/// `thread::sleep` may return early or the clock may be stepped backwards, so
/// the remaining time is recomputed after every wake-up.
pub fn sleep_until(until: SystemTime) {
    loop {
        let remaining = match until.duration_since(now()) {
            Ok(remaining) if !remaining.is_zero() => remaining,
            _ => return,
        };
        std::thread::sleep(remaining);
    }
}
