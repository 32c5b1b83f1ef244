//! Bounded outbound frame queue
//!
//! Small on purpose: stale radio traffic is worth nothing, so a full queue
//! drops the newest frame after a timeout instead of building a backlog.

use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, SendTimeoutError, Sender};
use std::sync::Arc;
use std::time::Duration;

use crate::codec::Frame;
use crate::error::NetworkError;
use crate::network::stats::DeliveryStats;

/// Create a queue holding at most `capacity` frames (minimum 1)
pub fn outbound_queue(
    capacity: usize,
    send_timeout: Duration,
    stats: Arc<DeliveryStats>,
) -> (FrameSender, FrameReceiver) {
    let (tx, rx) = bounded(capacity.max(1));
    (
        FrameSender {
            tx,
            send_timeout,
            stats,
        },
        FrameReceiver { rx },
    )
}

/// Producer side; cheap to clone for every frame source
#[derive(Clone)]
pub struct FrameSender {
    tx: Sender<Frame>,
    send_timeout: Duration,
    stats: Arc<DeliveryStats>,
}

impl FrameSender {
    /// Enqueue a frame, waiting up to the send timeout for a free slot.
    ///
    /// On timeout the frame is dropped and reported, never retried.
    pub fn send(&self, frame: Frame) -> Result<(), NetworkError> {
        match self.tx.send_timeout(frame, self.send_timeout) {
            Ok(()) => Ok(()),
            Err(SendTimeoutError::Timeout(frame)) => {
                self.stats.record_dropped();
                tracing::warn!("Lost TX data (queue full): '{}'", frame);
                Err(NetworkError::QueueFull)
            }
            Err(SendTimeoutError::Disconnected(frame)) => {
                self.stats.record_dropped();
                tracing::warn!("Lost TX data (worker stopped): '{}'", frame);
                Err(NetworkError::WorkerStopped)
            }
        }
    }

    /// Number of frames waiting
    pub fn len(&self) -> usize {
        self.tx.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tx.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.tx.capacity().unwrap_or(0)
    }
}

/// Consumer side, owned by the delivery worker
pub struct FrameReceiver {
    rx: Receiver<Frame>,
}

impl FrameReceiver {
    /// Wait up to `timeout` for the next frame.
    ///
    /// `Ok(None)` means nothing arrived in time.
    pub fn recv_timeout(&self, timeout: Duration) -> Result<Option<Frame>, NetworkError> {
        match self.rx.recv_timeout(timeout) {
            Ok(frame) => Ok(Some(frame)),
            Err(RecvTimeoutError::Timeout) => Ok(None),
            Err(RecvTimeoutError::Disconnected) => Err(NetworkError::WorkerStopped),
        }
    }
}
