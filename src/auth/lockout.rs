use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

const MAX_ATTEMPTS: u32 = 5;
const LOCKOUT_WINDOW: Duration = Duration::from_secs(300);

#[derive(Debug)]
struct FailureRecord {
    count: u32,
    last_attempt: Instant,
}

/// In-process failed-login tracker, keyed by username.
///
/// State lives for the process lifetime only and is not shared across
/// instances; a multi-instance deployment would need an external counter
/// store instead.
pub struct LockoutTracker {
    attempts: Mutex<HashMap<String, FailureRecord>>,
    max_attempts: u32,
    window: Duration,
}

impl Default for LockoutTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl LockoutTracker {
    #[must_use]
    pub fn new() -> Self {
        Self::with_policy(MAX_ATTEMPTS, LOCKOUT_WINDOW)
    }

    fn with_policy(max_attempts: u32, window: Duration) -> Self {
        Self {
            attempts: Mutex::new(HashMap::new()),
            max_attempts,
            window,
        }
    }

    /// Returns the remaining lockout time if the account is currently locked.
    /// An expired window resets the counter.
    pub fn locked_for(&self, username: &str) -> Option<Duration> {
        let mut attempts = self.attempts.lock().unwrap_or_else(|e| e.into_inner());

        let record = attempts.get(username)?;
        if record.count >= self.max_attempts {
            let elapsed = record.last_attempt.elapsed();
            if elapsed < self.window {
                return Some(self.window - elapsed);
            }
            attempts.remove(username);
        }
        None
    }

    pub fn record_failure(&self, username: &str) {
        let mut attempts = self.attempts.lock().unwrap_or_else(|e| e.into_inner());
        let record = attempts.entry(username.to_string()).or_insert(FailureRecord {
            count: 0,
            last_attempt: Instant::now(),
        });
        record.count += 1;
        record.last_attempt = Instant::now();
    }

    /// Clears the failure counter after a successful login.
    pub fn clear(&self, username: &str) {
        let mut attempts = self.attempts.lock().unwrap_or_else(|e| e.into_inner());
        attempts.remove(username);
    }
}
