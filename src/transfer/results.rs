//! Transfer result types
//!
//! Defines the accounting returned by the streaming transfer loops.

use std::time::Duration;

/// Outcome of one data-channel transfer.
///
/// A transfer that moved zero bytes is still a success at this level; callers
/// that care about empty transfers decide that for themselves.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransferResult {
    pub bytes: u64,
    pub duration: Duration,
    pub success: bool,
}

impl TransferResult {
    pub fn completed(bytes: u64, duration: Duration) -> Self {
        Self {
            bytes,
            duration,
            success: true,
        }
    }

    pub fn duration_ms(&self) -> u64 {
        self.duration.as_millis() as u64
    }

    /// Throughput in KiB/s; zero for an instantaneous transfer.
    pub fn kib_per_sec(&self) -> f64 {
        let secs = self.duration.as_secs_f64();
        if secs == 0.0 {
            0.0
        } else {
            (self.bytes as f64 / 1024.0) / secs
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_byte_transfer_is_still_a_success() {
        let result = TransferResult::completed(0, Duration::from_millis(3));
        assert!(result.success);
        assert_eq!(result.bytes, 0);
    }

    #[test]
    fn throughput_handles_zero_duration() {
        assert_eq!(TransferResult::completed(4096, Duration::ZERO).kib_per_sec(), 0.0);
        let result = TransferResult::completed(2048, Duration::from_secs(2));
        assert!((result.kib_per_sec() - 1.0).abs() < f64::EPSILON);
    }
}
