//! Line framing for the RCON stream
//!
//! The RCON stream is plain text: one command per `\n`-terminated line.
//! Inside a line a single reserved control byte separates the fields; which
//! byte depends on the protocol version announced in the server's banner.

use crate::command::Outbound;
use bytes::{BufMut, BytesMut};
use rcon_core::RconError;
use tokio_util::codec::{Decoder, Encoder};

/// Field delimiter used by protocol version 3 and newer
pub const DELIMITER_V3: u8 = 0x02;

/// Field delimiter used by protocol version 2
pub const DELIMITER_LEGACY: u8 = 0xA0;

/// Oldest protocol version this client can speak
pub const MIN_PROTOCOL_VERSION: u32 = 2;

/// Lines longer than this are discarded
pub const MAX_LINE_LENGTH: usize = 64 * 1024;

/// Pick the field delimiter for a negotiated protocol version
///
/// # Returns
/// `None` when the version is older than [`MIN_PROTOCOL_VERSION`]
#[inline]
pub fn delimiter_for_version(version: u32) -> Option<u8> {
    match version {
        v if v >= 3 => Some(DELIMITER_V3),
        v if v >= MIN_PROTOCOL_VERSION => Some(DELIMITER_LEGACY),
        _ => None,
    }
}

/// Newline codec for the RCON stream
///
/// # Purpose
/// Splits the inbound byte stream into complete lines and renders outbound
/// commands with their terminator.
///
/// # Partial Lines
/// Bytes without a terminating `\n` remain in the source buffer; the codec
/// remembers how far it has already scanned so repeated reads of a long
/// partial line do not rescan from the start.
#[derive(Debug, Clone)]
pub struct RconCodec {
    /// Index in the source buffer up to which no `\n` exists
    next_index: usize,

    /// Maximum accepted line length
    max_line_length: usize,

    /// Set while discarding the remainder of an oversize line
    discarding: bool,
}

impl RconCodec {
    /// Create a codec with the default line limit
    pub fn new() -> Self {
        Self::with_max_length(MAX_LINE_LENGTH)
    }

    /// Create a codec with a custom line limit
    pub fn with_max_length(max_line_length: usize) -> Self {
        Self {
            next_index: 0,
            max_line_length,
            discarding: false,
        }
    }

    /// Forget any scan progress (used when the socket is replaced)
    pub fn reset(&mut self) {
        self.next_index = 0;
        self.discarding = false;
    }
}

impl Default for RconCodec {
    fn default() -> Self {
        Self::new()
    }
}

impl Decoder for RconCodec {
    type Item = BytesMut;
    type Error = RconError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<BytesMut>, RconError> {
        loop {
            let newline = src[self.next_index..].iter().position(|b| *b == b'\n');

            let Some(offset) = newline else {
                if src.len() > self.max_line_length {
                    tracing::warn!("Discarding oversize RCON line ({} bytes buffered)", src.len());
                    src.clear();
                    self.discarding = true;
                }
                self.next_index = src.len();
                return Ok(None);
            };

            let end = self.next_index + offset;
            self.next_index = 0;

            let mut line = src.split_to(end + 1);
            line.truncate(end);

            if self.discarding {
                // Tail of a line whose head was already thrown away
                self.discarding = false;
                continue;
            }

            if line.last() == Some(&b'\r') {
                line.truncate(line.len() - 1);
            }

            if line.is_empty() {
                continue;
            }

            return Ok(Some(line));
        }
    }
}

impl Encoder<Outbound> for RconCodec {
    type Error = RconError;

    fn encode(&mut self, item: Outbound, dst: &mut BytesMut) -> Result<(), RconError> {
        let payload = item.payload();
        dst.reserve(payload.len() + 2);
        dst.put_u8(item.type_byte());
        for byte in payload.bytes() {
            // Line breaks inside a command would split it into two commands
            dst.put_u8(if byte == b'\n' || byte == b'\r' { b' ' } else { byte });
        }
        dst.put_u8(b'\n');
        Ok(())
    }
}
