//! Wire protocol for the embedded editor session.
//!
//! The editor process speaks a compact self-describing binary format over its
//! stdio pair. This crate owns encode/decode only; no correlation or dispatch
//! logic lives here (that is `core-session`). Three concerns:
//!
//! * `Value` - the object model: scalars, strings, binary, arrays, maps, and
//!   the three typed extension handles (buffer / window / tab). Handles carry
//!   distinct wire tags so they can never be confused with plain integers.
//! * `Message` - the protocol envelope: request / response / notification,
//!   framed as a top-level `[kind, ...]` array.
//! * `FrameDecoder` - resumable streaming decode. A partial frame stays
//!   buffered across chunk boundaries; a malformed frame surfaces as an error
//!   while the buffer skips past the poisoned region so the reader loop can
//!   resynchronize instead of aborting the session.
//!
//! Invariants:
//! * `encode` then `decode` round-trips every constructible `Value`.
//! * `FrameDecoder::next_frame` never returns `Ok(None)` while a complete
//!   frame sits in its buffer.
//! * Decode failures always consume at least one byte, so an errored decoder
//!   cannot spin on the same input forever.

mod codec;
mod message;
mod value;

pub use codec::{FrameDecoder, MAX_PAYLOAD_LEN, encode_value};
pub use message::Message;
pub use value::{ExtHandle, Value};

use thiserror::Error;

/// Errors produced while encoding or decoding wire data.
///
/// `Incomplete` is internal to the streaming decoder and never escapes
/// `FrameDecoder`; everything else indicates malformed peer output.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum WireError {
    #[error("unknown value tag 0x{0:02x}")]
    UnknownTag(u8),
    #[error("varint exceeds 64 bits")]
    VarintOverflow,
    #[error("declared payload length {0} exceeds limit {MAX_PAYLOAD_LEN}")]
    LengthLimit(u64),
    #[error("string payload is not valid UTF-8")]
    InvalidUtf8,
    #[error("frame is not a protocol message: {0}")]
    BadFrameShape(&'static str),
}
