//! TNC2 frame decoder
//!
//! Parses `SOURCE>DEST,PATH:PAYLOAD` lines as emitted by multimon-ng.

use super::{Charset, Frame};
use crate::error::FrameError;

/// Decode a raw TNC2 line into a [`Frame`].
///
/// Carriage returns are removed; every other byte, a final line feed
/// included, belongs to the frame. Line terminators are the reader's
/// concern. The header must be `SOURCE>DEST,PATH` where the path may be
/// empty.
pub fn decode(raw: &[u8], charset: Charset) -> Result<Frame, FrameError> {
    let text = to_text(raw, charset)?;

    let (header, payload) = text
        .split_once(':')
        .ok_or_else(|| FrameError::InvalidFrame("missing ':' separator".into()))?;

    let (source, rest) = split_ident(header, '>')
        .ok_or_else(|| invalid_header(header, "bad source"))?;
    let (destination, path) = split_ident(rest, ',')
        .ok_or_else(|| invalid_header(header, "bad destination"))?;

    if path.chars().any(char::is_whitespace) {
        return Err(invalid_header(header, "whitespace in path"));
    }

    let path = if path.is_empty() {
        Vec::new()
    } else {
        path.split(',').map(str::to_string).collect()
    };

    Ok(Frame {
        source: source.to_string(),
        destination: destination.to_string(),
        path,
        payload: payload.to_string(),
    })
}

/// Map bytes to characters one-to-one, dropping carriage returns
fn to_text(raw: &[u8], charset: Charset) -> Result<String, FrameError> {
    let mut text = String::with_capacity(raw.len());
    for &byte in raw {
        if byte == b'\r' {
            continue;
        }
        if u32::from(byte) > charset.max_code_point() {
            return Err(FrameError::InvalidFrame(format!(
                "byte 0x{:02x} not representable in {:?}",
                byte, charset
            )));
        }
        text.push(char::from(byte));
    }
    Ok(text)
}

/// Split a `WORD[-N[N]]` identifier terminated by `term` off the front of `s`.
fn split_ident(s: &str, term: char) -> Option<(&str, &str)> {
    let word_len = s
        .find(|c: char| !is_word_char(c))
        .unwrap_or(s.len());
    if word_len == 0 {
        return None;
    }

    let after_word = &s[word_len..];
    if let Some(rest) = after_word.strip_prefix(term) {
        return Some((&s[..word_len], rest));
    }

    let ssid = after_word.strip_prefix('-')?;
    let digits = ssid
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(ssid.len());
    if !(1..=2).contains(&digits) {
        return None;
    }

    let ident_len = word_len + 1 + digits;
    let rest = s[ident_len..].strip_prefix(term)?;
    Some((&s[..ident_len], rest))
}

fn is_word_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

fn invalid_header(header: &str, reason: &str) -> FrameError {
    FrameError::InvalidFrame(format!("{}: '{}'", reason, header))
}
