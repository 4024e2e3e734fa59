use std::time::{Duration, Instant};

const MINUTE: Duration = Duration::from_secs(60);
const HOUR: Duration = Duration::from_secs(3600);

#[derive(Debug, Clone)]
struct FixedWindow {
    limit: u32,
    length: Duration,
    started: Instant,
    count: u32,
}

impl FixedWindow {
    fn new(limit: u32, length: Duration, now: Instant) -> Self {
        Self {
            limit,
            length,
            started: now,
            count: 0,
        }
    }

    fn roll(&mut self, now: Instant) {
        if now.saturating_duration_since(self.started) >= self.length {
            self.count = 0;
            self.started = now;
        }
    }

    fn has_room(&self) -> bool {
        self.count < self.limit
    }
}

/// Per-minute burst and per-hour request counters.
///
/// Windows are fixed and reset lazily on access. A reservation either takes a
/// slot in both windows or in neither.
#[derive(Debug, Clone)]
pub struct RateLimiter {
    minute: FixedWindow,
    hour: FixedWindow,
}

impl RateLimiter {
    pub fn new(burst_limit: u32, hourly_limit: u32) -> Self {
        let now = Instant::now();
        Self {
            minute: FixedWindow::new(burst_limit, MINUTE, now),
            hour: FixedWindow::new(hourly_limit, HOUR, now),
        }
    }

    /// Check both windows and, when both have room, count one request.
    pub fn try_reserve(&mut self, now: Instant) -> bool {
        self.roll(now);
        if !(self.minute.has_room() && self.hour.has_room()) {
            return false;
        }
        self.minute.count += 1;
        self.hour.count += 1;
        true
    }

    pub fn roll(&mut self, now: Instant) {
        self.minute.roll(now);
        self.hour.roll(now);
    }

    pub fn requests_this_minute(&self) -> u32 {
        self.minute.count
    }

    pub fn requests_this_hour(&self) -> u32 {
        self.hour.count
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn burst_cap_rejects_without_counting() {
        let mut limiter = RateLimiter::new(10, 100);
        let now = Instant::now();
        for _ in 0..10 {
            assert!(limiter.try_reserve(now));
        }
        assert!(!limiter.try_reserve(now));
        assert_eq!(limiter.requests_this_minute(), 10);
        assert_eq!(limiter.requests_this_hour(), 10);
    }

    #[test]
    fn minute_window_resets_lazily() {
        let mut limiter = RateLimiter::new(2, 100);
        let now = Instant::now();
        assert!(limiter.try_reserve(now));
        assert!(limiter.try_reserve(now));
        assert!(!limiter.try_reserve(now));

        let next_minute = now + Duration::from_secs(61);
        assert!(limiter.try_reserve(next_minute));
        assert_eq!(limiter.requests_this_minute(), 1);
        assert_eq!(limiter.requests_this_hour(), 3);
    }

    #[test]
    fn hourly_cap_holds_across_minutes() {
        let mut limiter = RateLimiter::new(10, 3);
        let start = Instant::now();
        for minute in 0..3u64 {
            assert!(limiter.try_reserve(start + Duration::from_secs(61 * minute)));
        }
        assert!(!limiter.try_reserve(start + Duration::from_secs(61 * 3)));
        assert!(limiter.try_reserve(start + Duration::from_secs(3601)));
    }
}
