use tokio::time::Instant;

/// Point-in-time view of a transfer, suitable for progress events.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProgressSnapshot {
    /// Cumulative bytes, including any resume offset.
    pub transferred: u64,
    pub total: Option<u64>,
    /// Integer percentage, present only when the total is known and non-zero.
    pub percent: Option<u8>,
    pub bytes_per_second: f64,
}

/// Byte accounting for one transfer attempt.
///
/// Reset at the start and end of every attempt; never persisted.
#[derive(Debug, Clone, Default)]
pub struct TransferProgress {
    transferred: u64,
    resumed_from: u64,
    total: Option<u64>,
    started_at: Option<Instant>,
}

impl TransferProgress {
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts a new attempt.
    ///
    /// `resumed_from` counts toward the cumulative total but not toward
    /// throughput.
    pub fn begin(&mut self, total: Option<u64>, resumed_from: u64) {
        self.transferred = 0;
        self.resumed_from = resumed_from;
        self.total = total;
        self.started_at = Some(Instant::now());
    }

    /// Adds `bytes` to the current attempt.
    pub fn record(&mut self, bytes: u64) {
        self.transferred = self.transferred.saturating_add(bytes);
    }

    /// Sets the attempt counter to `attempt_bytes` if it moved forward.
    ///
    /// Transport callbacks report cumulative counts per request.
    pub fn advance_to(&mut self, attempt_bytes: u64) {
        if attempt_bytes > self.transferred {
            self.transferred = attempt_bytes;
        }
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// Bytes moved in this attempt.
    pub fn transferred(&self) -> u64 {
        self.transferred
    }

    /// Bytes completed overall (resume offset plus this attempt).
    pub fn completed(&self) -> u64 {
        self.resumed_from.saturating_add(self.transferred)
    }

    pub fn total(&self) -> Option<u64> {
        self.total
    }

    /// Floored percentage clamped at 100.
    pub fn percent(&self) -> Option<u8> {
        match self.total {
            Some(total) if total > 0 => {
                let pct = (self.completed() as u128 * 100) / total as u128;
                Some(pct.min(100) as u8)
            }
            _ => None,
        }
    }

    /// Throughput of the current attempt in bytes per second.
    pub fn bytes_per_second(&self) -> f64 {
        let Some(started) = self.started_at else {
            return 0.0;
        };
        let elapsed = started.elapsed().as_secs_f64();
        if elapsed <= 0.0 {
            return 0.0;
        }
        self.transferred as f64 / elapsed
    }

    pub fn is_active(&self) -> bool {
        self.started_at.is_some()
    }

    pub fn snapshot(&self) -> ProgressSnapshot {
        ProgressSnapshot {
            transferred: self.completed(),
            total: self.total,
            percent: self.percent(),
            bytes_per_second: self.bytes_per_second(),
        }
    }
}
