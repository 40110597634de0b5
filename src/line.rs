//! Line framing for tokio.
//!
//! [`LineCodec`] splits inbound bytes on LF (an optional preceding CR is
//! stripped), decodes them lossily as UTF-8 and skips blank lines. Lines
//! longer than the limit are discarded up to their terminator rather than
//! failing the stream. Outbound lines get a CRLF terminator.

use bytes::{Buf, BufMut, BytesMut};
use tokio_util::codec::{Decoder, Encoder};
use tracing::warn;

use crate::error::ProtocolError;
use crate::util::{MAX_MESSAGE_BODY, MAX_TAGS_LENGTH};

/// 512 bytes of message plus the 8191 bytes IRCv3 allows for tags.
pub const MAX_LINE_LEN: usize = MAX_MESSAGE_BODY + MAX_TAGS_LENGTH;

/// Newline-terminated line codec.
#[derive(Debug, Clone)]
pub struct LineCodec {
    /// Index of the next byte to check for a newline.
    next_index: usize,
    max_len: usize,
    /// Skipping the rest of an over-long line.
    discarding: bool,
}

impl Default for LineCodec {
    fn default() -> Self {
        Self::new()
    }
}

impl LineCodec {
    pub fn new() -> Self {
        Self::with_max_len(MAX_LINE_LEN)
    }

    /// Codec with a custom line limit, terminator included.
    pub fn with_max_len(max_len: usize) -> Self {
        LineCodec {
            next_index: 0,
            max_len,
            discarding: false,
        }
    }

    pub fn max_len(&self) -> usize {
        self.max_len
    }

    fn too_long(&self, actual: usize) {
        let err = ProtocolError::MessageTooLong {
            actual,
            limit: self.max_len,
        };
        warn!(error = %err, "discarding inbound line");
    }
}

impl Decoder for LineCodec {
    type Item = String;
    type Error = ProtocolError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<String>, ProtocolError> {
        loop {
            let Some(offset) = src[self.next_index..].iter().position(|b| *b == b'\n') else {
                self.next_index = src.len();
                if !self.discarding && src.len() > self.max_len {
                    self.too_long(src.len());
                    self.discarding = true;
                }
                if self.discarding {
                    src.clear();
                    self.next_index = 0;
                }
                return Ok(None);
            };

            let end = self.next_index + offset + 1;
            self.next_index = 0;

            if self.discarding {
                src.advance(end);
                self.discarding = false;
                continue;
            }
            if end > self.max_len {
                self.too_long(end);
                src.advance(end);
                continue;
            }

            let line = src.split_to(end);
            let text = String::from_utf8_lossy(&line);
            let text = text.trim_end_matches(['\r', '\n']);
            if text.trim().is_empty() {
                continue;
            }
            return Ok(Some(text.to_string()));
        }
    }

    fn decode_eof(&mut self, src: &mut BytesMut) -> Result<Option<String>, ProtocolError> {
        match self.decode(src)? {
            Some(line) => Ok(Some(line)),
            None => {
                // A final line without terminator is still a line.
                if src.is_empty() || self.discarding {
                    src.clear();
                    return Ok(None);
                }
                let rest = src.split();
                self.next_index = 0;
                let text = String::from_utf8_lossy(&rest).trim_end_matches('\r').to_string();
                Ok((!text.trim().is_empty()).then_some(text))
            }
        }
    }
}

impl Encoder<String> for LineCodec {
    type Error = ProtocolError;

    fn encode(&mut self, line: String, dst: &mut BytesMut) -> Result<(), ProtocolError> {
        let line = line.trim_end_matches(['\r', '\n']);
        if let Some(ch) = line.chars().find(|c| matches!(c, '\r' | '\n' | '\0')) {
            return Err(ProtocolError::IllegalControlChar(ch));
        }
        dst.reserve(line.len() + 2);
        dst.put_slice(line.as_bytes());
        dst.put_slice(b"\r\n");
        Ok(())
    }
}
