//! The serial processor owns one transceiver, one field store and one
//! decoder, and drives a full receive/decode/dispatch cycle per `update`
//! tick. `update` and `send` may be called from different threads; the store
//! and decoder are each guarded by their own mutex and neither lock is held
//! while handlers run.

use crate::codec::{encode, DecodedFrame, Decoder};
use crate::error::LinkResult;
use crate::logging::{self, Discard, Logger};
use crate::store::FieldStore;
use crate::transceiver::{Recv, Transceiver};
use crate::wire::{FieldId, FrameId};
use std::sync::Mutex;
use std::time::{Duration, Instant};

/// Invoked for every decoded inbound frame, in decode order. The processor
/// hands itself to the hook so handlers can read fields and transmit replies
/// without holding a reference back into their owner.
pub type MessageHook = Box<dyn Fn(&SerialProcessor, &DecodedFrame) + Send + Sync>;

/// Largest datagram worth reading; comfortably above the biggest frame.
const SCRATCH_LEN: usize = 512;

/// After the first datagram of a tick, drain whatever else is queued with a
/// short bound instead of the full receive timeout.
const DRAIN_TIMEOUT: Duration = Duration::from_millis(1);

/// Cap on datagrams consumed per tick, so a flooding peer cannot pin the
/// pump thread inside one `update`.
const MAX_READS_PER_UPDATE: usize = 32;

pub struct SerialProcessor {
    transceiver: Box<dyn Transceiver>,
    store: FieldStore,
    decoder: Mutex<Decoder>,
    last_recv: Mutex<Option<Instant>>,
    hook: MessageHook,
    log: Logger,
}

impl SerialProcessor {
    pub fn new<'a, L: Into<Option<&'a Logger>>>(
        transceiver: Box<dyn Transceiver>,
        hook: MessageHook,
        log: L,
    ) -> SerialProcessor {
        let log = match log.into() {
            Some(log) => log.new(logging::o!("component" => "processor")),
            None => Logger::root(Discard, logging::o!()),
        };

        let decoder = Mutex::new(Decoder::new(&log));

        SerialProcessor {
            transceiver,
            store: FieldStore::new(),
            decoder,
            last_recv: Mutex::new(None),
            hook,
            log,
        }
    }

    /// One pump cycle: bounded read, decode, store, dispatch.
    pub fn update(&self, now: Instant) {
        let mut scratch = [0u8; SCRATCH_LEN];
        let mut frames = Vec::new();
        let mut timeout = crate::RECV_TIMEOUT;

        for _ in 0..MAX_READS_PER_UPDATE {
            match self.transceiver.recv(&mut scratch, timeout) {
                Ok(Recv::Data(count)) => {
                    let mut decoder = self.decoder.lock().expect("Decoder mutex poisoned");
                    decoder.push(&scratch[..count]);

                    while let Some(frame) = decoder.next_frame() {
                        frames.push(frame);
                    }

                    timeout = DRAIN_TIMEOUT;
                }
                Ok(Recv::Timeout) => break,
                Ok(Recv::Closed) => {
                    logging::trace!(self.log, "transport closed");
                    break;
                }
                Err(err) => {
                    logging::debug!(self.log, "receive error"; "err" => ?err);
                    break;
                }
            }
        }

        if frames.is_empty() {
            return;
        }

        *self.last_recv.lock().expect("Recv stamp mutex poisoned") = Some(now);

        for frame in &frames {
            for (&field, bytes) in &frame.values {
                self.store.set(field, bytes.clone(), now);
            }

            (self.hook)(self, frame);
        }
    }

    /// Encodes the current field values into `frame` and transmits it.
    pub fn send(&self, frame: FrameId) -> LinkResult<()> {
        let buf = encode(frame, &self.store)?;
        self.transceiver.send(&buf)
    }

    /// Instant of the last tick that decoded at least one frame. `None` until
    /// the peer has been heard from.
    pub fn last_msg_recv_time(&self) -> Option<Instant> {
        *self.last_recv.lock().expect("Recv stamp mutex poisoned")
    }

    pub fn set_field(&self, field: FieldId, bytes: Vec<u8>, time: Instant) {
        self.store.set(field, bytes, time);
    }

    pub fn get_field(&self, field: FieldId) -> Option<Vec<u8>> {
        self.store.get(field)
    }

    pub fn set_field_u8(&self, field: FieldId, value: u8, time: Instant) {
        self.store.set_u8(field, value, time);
    }

    pub fn get_field_u8(&self, field: FieldId) -> Option<u8> {
        self.store.get_u8(field)
    }

    pub fn set_field_str(&self, field: FieldId, text: &str, time: Instant) {
        self.store.set_str(field, text, time);
    }

    pub fn get_field_str(&self, field: FieldId) -> Option<String> {
        self.store.get_str(field)
    }
}
