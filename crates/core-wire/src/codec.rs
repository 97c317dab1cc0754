//! Binary encode/decode for `Value` and the streaming frame decoder.
//!
//! Layout: one tag byte, then a payload.
//!
//! | tag  | value                                    |
//! |------|------------------------------------------|
//! | 0x00 | nil                                      |
//! | 0x01 | false                                    |
//! | 0x02 | true                                     |
//! | 0x03 | int - zigzag LEB128 varint               |
//! | 0x04 | float - IEEE-754 f64, big-endian         |
//! | 0x05 | str - varint byte length + UTF-8 bytes   |
//! | 0x06 | bin - varint byte length + raw bytes     |
//! | 0x07 | array - varint count + elements          |
//! | 0x08 | map - varint count + key/value pairs     |
//! | 0x10 | buffer handle - varint id                |
//! | 0x11 | window handle - varint id                |
//! | 0x12 | tab handle - varint id                   |
//!
//! Decoding distinguishes "ran out of bytes" (the frame is still in flight)
//! from "the bytes are wrong" (peer bug or stream corruption). Only the
//! latter is an error; the former parks the partial frame in the decoder's
//! buffer until more input arrives.

use crate::value::{ExtHandle, Value};
use crate::{Message, WireError};
use tracing::warn;

/// Upper bound on any single declared length (string/bin bytes, container
/// counts). Guards against a corrupt varint making the decoder try to buffer
/// gigabytes before noticing the stream is garbage.
pub const MAX_PAYLOAD_LEN: u64 = 64 * 1024 * 1024;

const TAG_NIL: u8 = 0x00;
const TAG_FALSE: u8 = 0x01;
const TAG_TRUE: u8 = 0x02;
const TAG_INT: u8 = 0x03;
const TAG_FLOAT: u8 = 0x04;
const TAG_STR: u8 = 0x05;
const TAG_BIN: u8 = 0x06;
const TAG_ARRAY: u8 = 0x07;
const TAG_MAP: u8 = 0x08;
const TAG_EXT_BUFFER: u8 = 0x10;
const TAG_EXT_WINDOW: u8 = 0x11;
const TAG_EXT_TAB: u8 = 0x12;

// ------------------------------------------------------------------------------------------------
// Encoding
// ------------------------------------------------------------------------------------------------

fn put_varint(out: &mut Vec<u8>, mut n: u64) {
    loop {
        let byte = (n & 0x7f) as u8;
        n >>= 7;
        if n == 0 {
            out.push(byte);
            return;
        }
        out.push(byte | 0x80);
    }
}

fn zigzag(n: i64) -> u64 {
    ((n << 1) ^ (n >> 63)) as u64
}

fn unzigzag(n: u64) -> i64 {
    ((n >> 1) as i64) ^ -((n & 1) as i64)
}

/// Append the encoding of `value` to `out`.
pub fn encode_value(out: &mut Vec<u8>, value: &Value) {
    match value {
        Value::Nil => out.push(TAG_NIL),
        Value::Bool(false) => out.push(TAG_FALSE),
        Value::Bool(true) => out.push(TAG_TRUE),
        Value::Int(n) => {
            out.push(TAG_INT);
            put_varint(out, zigzag(*n));
        }
        Value::Float(x) => {
            out.push(TAG_FLOAT);
            out.extend_from_slice(&x.to_be_bytes());
        }
        Value::Str(s) => {
            out.push(TAG_STR);
            put_varint(out, s.len() as u64);
            out.extend_from_slice(s.as_bytes());
        }
        Value::Bin(bytes) => {
            out.push(TAG_BIN);
            put_varint(out, bytes.len() as u64);
            out.extend_from_slice(bytes);
        }
        Value::Array(items) => {
            out.push(TAG_ARRAY);
            put_varint(out, items.len() as u64);
            for item in items {
                encode_value(out, item);
            }
        }
        Value::Map(entries) => {
            out.push(TAG_MAP);
            put_varint(out, entries.len() as u64);
            for (k, v) in entries {
                encode_value(out, k);
                encode_value(out, v);
            }
        }
        Value::Ext(handle) => {
            let (tag, id) = match handle {
                ExtHandle::Buffer(id) => (TAG_EXT_BUFFER, *id),
                ExtHandle::Window(id) => (TAG_EXT_WINDOW, *id),
                ExtHandle::Tab(id) => (TAG_EXT_TAB, *id),
            };
            out.push(tag);
            put_varint(out, id);
        }
    }
}

// ------------------------------------------------------------------------------------------------
// Decoding
// ------------------------------------------------------------------------------------------------

/// Internal decode outcome: `Incomplete` never escapes `FrameDecoder`.
enum DecodeFail {
    Incomplete,
    Malformed(WireError),
}

struct Cursor<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Cursor<'a> {
    fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    fn take_u8(&mut self) -> Result<u8, DecodeFail> {
        let byte = *self.buf.get(self.pos).ok_or(DecodeFail::Incomplete)?;
        self.pos += 1;
        Ok(byte)
    }

    fn take_slice(&mut self, len: usize) -> Result<&'a [u8], DecodeFail> {
        let end = self.pos.checked_add(len).ok_or(DecodeFail::Incomplete)?;
        if end > self.buf.len() {
            return Err(DecodeFail::Incomplete);
        }
        let slice = &self.buf[self.pos..end];
        self.pos = end;
        Ok(slice)
    }

    fn take_varint(&mut self) -> Result<u64, DecodeFail> {
        let mut value: u64 = 0;
        let mut shift: u32 = 0;
        loop {
            let byte = self.take_u8()?;
            if shift >= 64 || (shift == 63 && byte > 1) {
                return Err(DecodeFail::Malformed(WireError::VarintOverflow));
            }
            value |= u64::from(byte & 0x7f) << shift;
            if byte & 0x80 == 0 {
                return Ok(value);
            }
            shift += 7;
        }
    }

    fn take_len(&mut self) -> Result<usize, DecodeFail> {
        let len = self.take_varint()?;
        if len > MAX_PAYLOAD_LEN {
            return Err(DecodeFail::Malformed(WireError::LengthLimit(len)));
        }
        Ok(len as usize)
    }

    fn take_value(&mut self) -> Result<Value, DecodeFail> {
        match self.take_u8()? {
            TAG_NIL => Ok(Value::Nil),
            TAG_FALSE => Ok(Value::Bool(false)),
            TAG_TRUE => Ok(Value::Bool(true)),
            TAG_INT => Ok(Value::Int(unzigzag(self.take_varint()?))),
            TAG_FLOAT => {
                let bytes = self.take_slice(8)?;
                let mut raw = [0u8; 8];
                raw.copy_from_slice(bytes);
                Ok(Value::Float(f64::from_be_bytes(raw)))
            }
            TAG_STR => {
                let len = self.take_len()?;
                let bytes = self.take_slice(len)?;
                let s = std::str::from_utf8(bytes)
                    .map_err(|_| DecodeFail::Malformed(WireError::InvalidUtf8))?;
                Ok(Value::Str(s.to_string()))
            }
            TAG_BIN => {
                let len = self.take_len()?;
                Ok(Value::Bin(self.take_slice(len)?.to_vec()))
            }
            TAG_ARRAY => {
                let count = self.take_len()?;
                let mut items = Vec::with_capacity(count.min(1024));
                for _ in 0..count {
                    items.push(self.take_value()?);
                }
                Ok(Value::Array(items))
            }
            TAG_MAP => {
                let count = self.take_len()?;
                let mut entries = Vec::with_capacity(count.min(1024));
                for _ in 0..count {
                    let k = self.take_value()?;
                    let v = self.take_value()?;
                    entries.push((k, v));
                }
                Ok(Value::Map(entries))
            }
            TAG_EXT_BUFFER => Ok(Value::Ext(ExtHandle::Buffer(self.take_varint()?))),
            TAG_EXT_WINDOW => Ok(Value::Ext(ExtHandle::Window(self.take_varint()?))),
            TAG_EXT_TAB => Ok(Value::Ext(ExtHandle::Tab(self.take_varint()?))),
            other => Err(DecodeFail::Malformed(WireError::UnknownTag(other))),
        }
    }
}

/// Resumable frame decoder. Feed arbitrary chunk boundaries via `extend`,
/// drain complete messages via `next_frame`.
#[derive(Debug, Default)]
pub struct FrameDecoder {
    buf: Vec<u8>,
}

impl FrameDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append freshly read bytes (any chunking, including single bytes).
    pub fn extend(&mut self, bytes: &[u8]) {
        self.buf.extend_from_slice(bytes);
    }

    /// Bytes currently parked waiting for frame completion.
    pub fn pending_len(&self) -> usize {
        self.buf.len()
    }

    /// Decode the next complete frame, if one is fully buffered.
    ///
    /// * `Ok(Some(msg))` - one frame consumed from the buffer.
    /// * `Ok(None)` - buffer holds at most a partial frame; call again after
    ///   `extend`.
    /// * `Err(_)` - malformed bytes. The buffer is advanced past the failure
    ///   point (at least one byte) so repeated calls make progress toward the
    ///   next decodable frame boundary.
    pub fn next_frame(&mut self) -> Result<Option<Message>, WireError> {
        if self.buf.is_empty() {
            return Ok(None);
        }
        let mut cursor = Cursor::new(&self.buf);
        match cursor.take_value() {
            Ok(value) => {
                let consumed = cursor.pos;
                self.buf.drain(..consumed);
                match Message::from_value(value) {
                    Ok(msg) => Ok(Some(msg)),
                    Err(err) => {
                        warn!(target: "wire.decode", %err, "frame_shape_rejected");
                        Err(err)
                    }
                }
            }
            Err(DecodeFail::Incomplete) => Ok(None),
            Err(DecodeFail::Malformed(err)) => {
                // Skip the poisoned region; the cursor stopped on the byte
                // that failed, so advancing past it guarantees progress.
                let skip = cursor.pos.max(1);
                warn!(target: "wire.decode", skip, %err, "malformed_frame_skipped");
                self.buf.drain(..skip.min(self.buf.len()));
                Err(err)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn encode_message(msg: &Message) -> Vec<u8> {
        let mut out = Vec::new();
        msg.encode(&mut out);
        out
    }

    #[test]
    fn value_round_trip() {
        let value = Value::Array(vec![
            Value::Nil,
            Value::Bool(true),
            Value::Int(-40960),
            Value::Float(2.5),
            Value::Str("résumé".into()),
            Value::Bin(vec![0, 1, 2, 0xff]),
            Value::Map(vec![(Value::from("k"), Value::Int(1))]),
            Value::Ext(ExtHandle::Window(77)),
        ]);
        let mut bytes = Vec::new();
        encode_value(&mut bytes, &value);
        let mut cursor = Cursor::new(&bytes);
        let decoded = match cursor.take_value() {
            Ok(v) => v,
            Err(_) => panic!("decode failed"),
        };
        assert_eq!(decoded, value);
        assert_eq!(cursor.pos, bytes.len(), "no trailing bytes consumed");
    }

    #[test]
    fn ext_handles_never_decode_as_integers() {
        let mut bytes = Vec::new();
        encode_value(&mut bytes, &Value::Ext(ExtHandle::Buffer(3)));
        let mut cursor = Cursor::new(&bytes);
        let decoded = cursor.take_value().ok().unwrap();
        assert_eq!(decoded.as_i64(), None);
        assert_eq!(decoded.as_ext(), Some(ExtHandle::Buffer(3)));
    }

    #[test]
    fn partial_frame_is_buffered_not_discarded() {
        let msg = Message::Notification {
            method: "redraw".into(),
            args: vec![Value::Str("abcdefghij".into())],
        };
        let bytes = encode_message(&msg);
        let mut dec = FrameDecoder::new();
        // Feed a single byte at a time; only the final byte completes a frame.
        for (i, b) in bytes.iter().enumerate() {
            dec.extend(&[*b]);
            let out = dec.next_frame().expect("no error on partial input");
            if i + 1 < bytes.len() {
                assert!(out.is_none(), "frame completed early at byte {i}");
            } else {
                assert_eq!(out, Some(msg.clone()));
            }
        }
        assert_eq!(dec.pending_len(), 0);
    }

    #[test]
    fn two_frames_in_one_chunk() {
        let a = Message::Request {
            id: 1,
            method: "eval".into(),
            args: vec![Value::from("1+1")],
        };
        let b = Message::Notification {
            method: "redraw".into(),
            args: vec![],
        };
        let mut bytes = encode_message(&a);
        bytes.extend_from_slice(&encode_message(&b));
        let mut dec = FrameDecoder::new();
        dec.extend(&bytes);
        assert_eq!(dec.next_frame().unwrap(), Some(a));
        assert_eq!(dec.next_frame().unwrap(), Some(b));
        assert_eq!(dec.next_frame().unwrap(), None);
    }

    #[test]
    fn malformed_tag_skips_and_recovers() {
        let good = Message::Notification {
            method: "redraw".into(),
            args: vec![],
        };
        let mut bytes = vec![0x7e]; // unused tag
        bytes.extend_from_slice(&encode_message(&good));
        let mut dec = FrameDecoder::new();
        dec.extend(&bytes);
        assert_eq!(dec.next_frame(), Err(WireError::UnknownTag(0x7e)));
        // The poisoned byte is gone; the healthy frame behind it decodes.
        assert_eq!(dec.next_frame().unwrap(), Some(good));
    }

    #[test]
    fn oversized_length_is_malformed_not_incomplete() {
        let mut bytes = vec![TAG_STR];
        put_varint(&mut bytes, MAX_PAYLOAD_LEN + 1);
        let mut dec = FrameDecoder::new();
        dec.extend(&bytes);
        assert!(matches!(
            dec.next_frame(),
            Err(WireError::LengthLimit(n)) if n == MAX_PAYLOAD_LEN + 1
        ));
    }

    #[test]
    fn zigzag_extremes() {
        for n in [0i64, -1, 1, i64::MIN, i64::MAX] {
            assert_eq!(unzigzag(zigzag(n)), n);
        }
    }
}
