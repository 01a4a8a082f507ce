//! Frame encode/decode. The encoder snapshots the field store into a frame
//! buffer; the decoder is a re-entrant scanner that survives partial reads,
//! garbage between frames, and corrupted checksums by resynchronizing on the
//! sync marker.

use crate::error::{LinkError, LinkResult};
use crate::logging::{self, Discard, Logger};
use crate::store::FieldStore;
use crate::wire::{FieldId, FrameId, FRAMES, SYNC};
use byteorder::{ByteOrder, LittleEndian};
use crc::{Crc, CRC_16_XMODEM};
use hashbrown::HashMap;

/// Frame integrity check. Covers the frame-id byte through the last payload
/// byte; both ends of the pair must agree on this choice.
pub const LINK_CRC: Crc<u16> = Crc::<u16>::new(&CRC_16_XMODEM);

/// Decode buffer cap. A receiver that never sees a valid frame sheds the
/// oldest bytes rather than growing without bound.
const DECODE_BUF_LIMIT: usize = 4096;

/// Why a frame candidate at a sync position failed to parse.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum DecodeError {
    /// Not enough buffered bytes to judge the candidate yet.
    ShortBuffer,
    UnknownFrameId(u8),
    ChecksumMismatch { expected: u16, actual: u16 },
}

/// One parsed frame: its identifier plus a copy of every payload field.
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedFrame {
    pub frame: FrameId,
    pub values: HashMap<FieldId, Vec<u8>>,
}

impl DecodedFrame {
    pub fn get(&self, field: FieldId) -> Option<&[u8]> {
        self.values.get(&field).map(|bytes| &bytes[..])
    }

    pub fn get_u8(&self, field: FieldId) -> Option<u8> {
        self.get(field).and_then(|bytes| bytes.first().copied())
    }
}

/// Encodes `frame` from the current contents of `store`. Fields shorter than
/// their slot are zero padded, longer ones truncate. Fails only when a payload
/// field has never been written.
pub fn encode(frame: FrameId, store: &FieldStore) -> LinkResult<Vec<u8>> {
    let layout = &FRAMES[&frame];
    let mut buf = vec![0u8; layout.total_len()];

    buf[..SYNC.len()].copy_from_slice(&SYNC);
    buf[SYNC.len()] = frame as u8;

    for slot in layout.payload_slots() {
        let bytes = store
            .get(slot.field)
            .ok_or(LinkError::MissingField(slot.field))?;
        let take = bytes.len().min(slot.width);
        buf[slot.offset..slot.offset + take].copy_from_slice(&bytes[..take]);
    }

    let sum = LINK_CRC.checksum(&buf[layout.checksummed_range()]);
    LittleEndian::write_u16(&mut buf[layout.checksum_offset()..], sum);

    Ok(buf)
}

/// Re-entrant frame parser. Push bytes in as they arrive; pull complete
/// frames out. Unconsumed bytes stay buffered across calls.
pub struct Decoder {
    buf: Vec<u8>,
    log: Logger,
}

impl Decoder {
    pub fn new<'a, L: Into<Option<&'a Logger>>>(log: L) -> Decoder {
        let log = match log.into() {
            Some(log) => log.new(logging::o!("codec" => "decoder")),
            None => Logger::root(Discard, logging::o!()),
        };

        Decoder { buf: Vec::new(), log }
    }

    pub fn push(&mut self, bytes: &[u8]) {
        self.buf.extend_from_slice(bytes);

        if self.buf.len() > DECODE_BUF_LIMIT {
            let excess = self.buf.len() - DECODE_BUF_LIMIT;
            self.buf.drain(..excess);
            logging::debug!(self.log, "decode buffer overrun"; "dropped" => excess);
        }
    }

    /// Next complete frame, or `None` once the buffer holds no complete
    /// candidate. Corrupt candidates cost one byte each and scanning resumes.
    pub fn next_frame(&mut self) -> Option<DecodedFrame> {
        loop {
            match find_sync(&self.buf) {
                Some(0) => {}
                Some(pos) => {
                    self.buf.drain(..pos);
                }
                None => {
                    // Keep a dangling half marker; the rest is garbage.
                    let keep = partial_sync_len(&self.buf);
                    let cut = self.buf.len() - keep;
                    if cut > 0 {
                        self.buf.drain(..cut);
                    }
                    return None;
                }
            }

            match parse_at(&self.buf) {
                Ok((decoded, consumed)) => {
                    self.buf.drain(..consumed);
                    return Some(decoded);
                }
                Err(DecodeError::ShortBuffer) => return None,
                Err(err) => {
                    logging::trace!(self.log, "resync"; "reason" => ?err);
                    self.buf.drain(..1);
                }
            }
        }
    }

    #[cfg(test)]
    fn buffered(&self) -> usize {
        self.buf.len()
    }
}

fn find_sync(buf: &[u8]) -> Option<usize> {
    buf.windows(SYNC.len()).position(|window| window == SYNC)
}

/// Length of a sync-marker prefix dangling at the end of the buffer.
fn partial_sync_len(buf: &[u8]) -> usize {
    if buf.last() == Some(&SYNC[0]) {
        1
    } else {
        0
    }
}

/// Parses the candidate at the head of `buf`, which must start with the sync
/// marker. Returns the decoded frame and the bytes consumed.
fn parse_at(buf: &[u8]) -> Result<(DecodedFrame, usize), DecodeError> {
    if buf.len() < SYNC.len() + 1 {
        return Err(DecodeError::ShortBuffer);
    }

    let raw_id = buf[SYNC.len()];
    let frame = FrameId::from_u8(raw_id).ok_or(DecodeError::UnknownFrameId(raw_id))?;
    let layout = &FRAMES[&frame];

    if buf.len() < layout.total_len() {
        return Err(DecodeError::ShortBuffer);
    }

    let expected = LittleEndian::read_u16(&buf[layout.checksum_offset()..]);
    let actual = LINK_CRC.checksum(&buf[layout.checksummed_range()]);

    if expected != actual {
        return Err(DecodeError::ChecksumMismatch { expected, actual });
    }

    let mut values = HashMap::new();
    for slot in layout.payload_slots() {
        values.insert(slot.field, buf[slot.offset..slot.offset + slot.width].to_vec());
    }

    Ok((DecodedFrame { frame, values }, layout.total_len()))
}
