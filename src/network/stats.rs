//! Delivery counters

use std::sync::atomic::{AtomicU64, Ordering};

/// Counters shared between producers and the delivery worker
#[derive(Debug, Default)]
pub struct DeliveryStats {
    frames_sent: AtomicU64,
    frames_dropped: AtomicU64,
    reconnects: AtomicU64,
}

impl DeliveryStats {
    pub fn record_sent(&self) {
        self.frames_sent.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_dropped(&self) {
        self.frames_dropped.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_reconnect(&self) {
        self.reconnects.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> DeliveryStatsSnapshot {
        DeliveryStatsSnapshot {
            frames_sent: self.frames_sent.load(Ordering::Relaxed),
            frames_dropped: self.frames_dropped.load(Ordering::Relaxed),
            reconnects: self.reconnects.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time copy of [`DeliveryStats`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DeliveryStatsSnapshot {
    pub frames_sent: u64,
    pub frames_dropped: u64,
    pub reconnects: u64,
}

impl DeliveryStatsSnapshot {
    pub fn loss_rate(&self) -> f32 {
        let total = self.frames_sent + self.frames_dropped;
        if total == 0 {
            0.0
        } else {
            self.frames_dropped as f32 / total as f32
        }
    }
}
