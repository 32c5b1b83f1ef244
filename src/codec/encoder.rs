//! TNC2 frame encoder
//!
//! Serializes frames for the relay server, enforcing the line length limit.

use bytes::{BufMut, Bytes, BytesMut};

use super::{Charset, Frame};
use crate::constants::MAX_FRAME_LEN;

/// Encode a frame as TNC2 text, truncated to [`MAX_FRAME_LEN`] bytes.
///
/// Characters outside the charset are replaced with `?`.
pub fn encode(frame: &Frame, charset: Charset) -> Bytes {
    let mut buf = BytesMut::with_capacity(MAX_FRAME_LEN);
    put_frame(&mut buf, frame, charset);
    buf.freeze()
}

/// Encode a frame followed by the `\r\n` line terminator
pub fn encode_line(frame: &Frame, charset: Charset) -> Bytes {
    let mut buf = BytesMut::with_capacity(MAX_FRAME_LEN + 2);
    put_frame(&mut buf, frame, charset);
    buf.put_slice(b"\r\n");
    buf.freeze()
}

fn put_frame(buf: &mut BytesMut, frame: &Frame, charset: Charset) {
    let max = charset.max_code_point();
    for c in frame.to_tnc2().chars().take(MAX_FRAME_LEN) {
        let code = u32::from(c);
        buf.put_u8(if code <= max { code as u8 } else { b'?' });
    }
}
