//! Protocol Layer: payload codec and device framing
//!
//! Design principles:
//! - Text payloads: inserts and extractions stay human-readable
//! - Fixed-size headers: predictable framing on the socket
//! - No allocation on the extract path

mod codec;
mod frame;

pub use codec::{decode_insert, decode_request, encode_extract, Encoded, Request, MAX_ENCODED_LEN};
pub use frame::{
    Decoder, Encoder, Frame, FrameError, FrameHeader, OpCode, HEADER_SIZE, MAX_PAYLOAD_SIZE,
};
