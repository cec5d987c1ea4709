use crate::data::Progress;

/// Running byte count for one body.
///
/// A body is finished on the read that reaches the declared length, or on
/// end of stream when no length was declared. Exactly one finished snapshot
/// is produced; reads after it are not reported.
#[derive(Debug, Clone)]
pub struct ProgressTracker {
    bytes_read: u64,
    total_bytes: Option<u64>,
    finished: bool,
}

impl ProgressTracker {
    pub fn new(total_bytes: Option<u64>) -> Self {
        Self {
            bytes_read: 0,
            total_bytes,
            finished: false,
        }
    }

    /// Account for a read that returned `n` bytes; `0` means end of stream.
    pub fn record(&mut self, n: usize) -> Option<Progress> {
        if self.finished {
            return None;
        }

        self.bytes_read += n as u64;
        let done = n == 0 || self.total_bytes.is_some_and(|total| self.bytes_read >= total);
        self.finished = done;

        Some(Progress {
            bytes_read: self.bytes_read,
            total_bytes: self.total_bytes,
            done,
        })
    }

    pub fn bytes_read(&self) -> u64 {
        self.bytes_read
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot(bytes_read: u64, total_bytes: Option<u64>, done: bool) -> Option<Progress> {
        Some(Progress {
            bytes_read,
            total_bytes,
            done,
        })
    }

    #[test]
    fn known_length_finishes_on_last_chunk() {
        let mut tracker = ProgressTracker::new(Some(1000));
        assert_eq!(tracker.record(500), snapshot(500, Some(1000), false));
        assert_eq!(tracker.record(500), snapshot(1000, Some(1000), true));
        assert_eq!(tracker.record(0), None);
        assert!(tracker.is_finished());
    }

    #[test]
    fn unknown_length_finishes_on_eof() {
        let mut tracker = ProgressTracker::new(None);
        assert_eq!(tracker.record(10), snapshot(10, None, false));
        assert_eq!(tracker.record(0), snapshot(10, None, true));
        assert_eq!(tracker.record(0), None);
        assert_eq!(tracker.bytes_read(), 10);
    }

    #[test]
    fn short_body_finishes_on_eof() {
        let mut tracker = ProgressTracker::new(Some(100));
        assert_eq!(tracker.record(40), snapshot(40, Some(100), false));
        assert_eq!(tracker.record(0), snapshot(40, Some(100), true));
    }

    #[test]
    fn empty_body() {
        let mut tracker = ProgressTracker::new(Some(0));
        assert_eq!(tracker.record(0), snapshot(0, Some(0), true));
    }
}
