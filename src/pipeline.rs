//! Frame pipeline
//!
//! Decode, filter and queue every frame the decoder announces.

use crate::codec::{decode, Charset, Frame};
use crate::error::NetworkError;
use crate::filter::{PathFilter, Verdict};
use crate::network::FrameSender;

/// Destination of accepted frames
pub trait FrameSink: Send {
    fn send(&self, frame: Frame) -> Result<(), NetworkError>;
}

impl FrameSink for FrameSender {
    fn send(&self, frame: Frame) -> Result<(), NetworkError> {
        FrameSender::send(self, frame)
    }
}

/// What happened to one announced frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Queued,
    Rejected,
    Invalid,
    /// Accepted but the delivery channel could not take it
    Dropped,
}

pub struct FramePipeline<S: FrameSink> {
    charset: Charset,
    filter: PathFilter,
    sink: S,
}

impl<S: FrameSink> FramePipeline<S> {
    pub fn new(charset: Charset, filter: PathFilter, sink: S) -> Self {
        Self {
            charset,
            filter,
            sink,
        }
    }

    /// Process the text of one frame
    pub fn handle(&self, text: &[u8]) -> Outcome {
        let mut frame = match decode(text, self.charset) {
            Ok(frame) => frame,
            Err(e) => {
                tracing::info!("{}", e);
                return Outcome::Invalid;
            }
        };

        if self.filter.apply(&mut frame) == Verdict::Reject {
            tracing::info!("Rejected: {}", frame);
            return Outcome::Rejected;
        }

        match self.sink.send(frame) {
            Ok(()) => Outcome::Queued,
            Err(e) => {
                tracing::debug!("Frame not queued: {}", e);
                Outcome::Dropped
            }
        }
    }
}
