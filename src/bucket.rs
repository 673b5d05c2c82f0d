/// Events that landed in a single minute slot of the window.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MinuteBucket {
    event_count: u64,
    total_duration: u64,
}

impl MinuteBucket {
    pub fn new() -> Self {
        Self::default()
    }

    /// The caller is responsible for making sure `total_duration` can't
    /// overflow, the window checks its running sum before calling this.
    pub fn add_event(&mut self, duration: u64) {
        self.event_count += 1;
        self.total_duration += duration;
    }

    pub fn reset(&mut self) {
        self.event_count = 0;
        self.total_duration = 0;
    }

    pub fn event_count(&self) -> u64 {
        self.event_count
    }

    pub fn total_duration(&self) -> u64 {
        self.total_duration
    }

    pub fn is_empty(&self) -> bool {
        self.event_count == 0
    }
}
