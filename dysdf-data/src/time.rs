//! Frame-id to scene-time mapping

/// Time interval that frame ids are mapped onto.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TimeRange {
    pub start: f32,
    pub end: f32,
}

impl TimeRange {
    pub fn new(start: f32, end: f32) -> Self {
        Self { start, end }
    }

    pub fn duration(&self) -> f32 {
        self.end - self.start
    }

    /// Linearly map `frame_id` in `0..=max_frame_id` onto the range.
    ///
    /// A single-frame sequence maps to `start`.
    pub fn frame_to_time(&self, frame_id: u32, max_frame_id: u32) -> f32 {
        if max_frame_id == 0 {
            return self.start;
        }
        self.start + self.duration() * (frame_id as f32 / max_frame_id as f32)
    }
}

impl Default for TimeRange {
    fn default() -> Self {
        Self::new(0.0, 1.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_to_time_endpoints() {
        let range = TimeRange::new(-1.0, 1.0);
        assert_eq!(range.frame_to_time(0, 10), -1.0);
        assert_eq!(range.frame_to_time(10, 10), 1.0);
        assert_eq!(range.frame_to_time(5, 10), 0.0);
    }

    #[test]
    fn test_single_frame_maps_to_start() {
        let range = TimeRange::default();
        assert_eq!(range.frame_to_time(0, 0), 0.0);
    }
}
