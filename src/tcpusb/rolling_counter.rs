/// Monotonic id source that wraps back to just above `min` once it reaches `max`.
///
/// Wrapped ids may collide with ones still in use; the service map rejects those.
#[derive(Debug, Clone)]
pub struct RollingCounter {
    now: u32,
    min: u32,
    max: u32,
}

impl RollingCounter {
    pub fn new(max: u32) -> Self {
        Self::with_min(max, 1)
    }

    pub fn with_min(max: u32, min: u32) -> Self {
        Self { now: min, min, max }
    }

    pub fn next(&mut self) -> u32 {
        if self.now >= self.max {
            self.now = self.min;
        }
        self.now += 1;
        self.now
    }
}
