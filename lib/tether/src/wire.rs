//! Wire vocabulary: field and frame identifiers, the semantic field
//! enumerations, and the fixed frame layouts both peers agree on.
//!
//! Every frame starts with the sync marker, then the frame-id byte, then the
//! payload fields, and ends with a two byte checksum. Multi-byte integers are
//! little-endian; string fields are fixed-width and NUL padded.

use indexmap::IndexMap;
use lazy_static::lazy_static;
use std::ops::Range;

/// Sync marker that begins every frame: `*` plus a terminating NUL.
pub const SYNC: [u8; 2] = [b'*', 0];

pub const CHECKSUM_LEN: usize = 2;
pub const SENSOR_NAME_LEN: usize = 16;
pub const DESCRIPTION_LEN: usize = 63;

/// Identifier of one field inside a frame.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum FieldId {
    Sync,
    Frame,
    Checksum,
    RobotKillState,
    ThrusterState,
    DiagnosticsState,
    LeakState,
    KillButtonState,
    NotificationType,
    NotificationUid,
    NotificationSensorName,
    NotificationDescription,
    AckedNotificationUid,
}

/// Identifier of one frame kind. The raw value is the wire byte.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
#[repr(u8)]
pub enum FrameId {
    Nothing = 0,
    RobotStatus = 1,
    OpboxStatus = 2,
    Notification = 3,
    Ack = 4,
}

impl FrameId {
    pub fn from_u8(raw: u8) -> Option<FrameId> {
        match raw {
            0 => Some(FrameId::Nothing),
            1 => Some(FrameId::RobotStatus),
            2 => Some(FrameId::OpboxStatus),
            3 => Some(FrameId::Notification),
            4 => Some(FrameId::Ack),
            _ => None,
        }
    }
}

/// Kill switch position. Anything unrecognized on the wire reads as killed.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
#[repr(u8)]
pub enum KillSwitchState {
    Unkilled = 0,
    Killed = 1,
}

impl KillSwitchState {
    pub fn from_u8(raw: u8) -> Option<KillSwitchState> {
        match raw {
            0 => Some(KillSwitchState::Unkilled),
            1 => Some(KillSwitchState::Killed),
            _ => None,
        }
    }

    pub fn from_wire(raw: u8) -> KillSwitchState {
        KillSwitchState::from_u8(raw).unwrap_or(KillSwitchState::Killed)
    }
}

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
#[repr(u8)]
pub enum ThrusterState {
    Idle = 0,
    Active = 1,
}

impl ThrusterState {
    pub fn from_u8(raw: u8) -> Option<ThrusterState> {
        match raw {
            0 => Some(ThrusterState::Idle),
            1 => Some(ThrusterState::Active),
            _ => None,
        }
    }

    pub fn from_wire(raw: u8) -> ThrusterState {
        ThrusterState::from_u8(raw).unwrap_or(ThrusterState::Idle)
    }
}

/// Hull leak sensor reading. Unrecognized bytes read as leaking.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
#[repr(u8)]
pub enum LeakState {
    Ok = 0,
    Leaking = 1,
}

impl LeakState {
    pub fn from_u8(raw: u8) -> Option<LeakState> {
        match raw {
            0 => Some(LeakState::Ok),
            1 => Some(LeakState::Leaking),
            _ => None,
        }
    }

    pub fn from_wire(raw: u8) -> LeakState {
        LeakState::from_u8(raw).unwrap_or(LeakState::Leaking)
    }
}

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
#[repr(u8)]
pub enum DiagnosticState {
    Ok = 0,
    Warn = 1,
    Error = 2,
}

impl DiagnosticState {
    pub fn from_u8(raw: u8) -> Option<DiagnosticState> {
        match raw {
            0 => Some(DiagnosticState::Ok),
            1 => Some(DiagnosticState::Warn),
            2 => Some(DiagnosticState::Error),
            _ => None,
        }
    }

    pub fn from_wire(raw: u8) -> DiagnosticState {
        DiagnosticState::from_u8(raw).unwrap_or(DiagnosticState::Error)
    }
}

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
#[repr(u8)]
pub enum NotificationType {
    Warning = 0,
    Error = 1,
    Fatal = 2,
}

impl NotificationType {
    pub fn from_u8(raw: u8) -> Option<NotificationType> {
        match raw {
            0 => Some(NotificationType::Warning),
            1 => Some(NotificationType::Error),
            2 => Some(NotificationType::Fatal),
            _ => None,
        }
    }

    pub fn from_wire(raw: u8) -> NotificationType {
        NotificationType::from_u8(raw).unwrap_or(NotificationType::Error)
    }
}

/// One field slot inside a frame: identifier, byte offset, width.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct FieldSlot {
    pub field: FieldId,
    pub offset: usize,
    pub width: usize,
}

/// Ordered field layout of one frame, with per-field offsets derived from the
/// declared widths.
#[derive(Debug, Clone)]
pub struct FrameLayout {
    slots: Vec<FieldSlot>,
    total: usize,
}

impl FrameLayout {
    /// Derives per-field offsets from `(field, width)` entries. Layouts must
    /// begin with the sync marker and frame-id byte and end with the checksum.
    pub fn assemble(fields: &[(FieldId, usize)]) -> FrameLayout {
        let mut slots = Vec::with_capacity(fields.len());
        let mut offset = 0;

        for &(field, width) in fields {
            slots.push(FieldSlot { field, offset, width });
            offset += width;
        }

        let layout = FrameLayout { slots, total: offset };
        assert!(layout.well_formed(), "Malformed frame layout: {:?}", layout);
        layout
    }

    fn well_formed(&self) -> bool {
        let head_ok = match (self.slots.get(0), self.slots.get(1)) {
            (Some(sync), Some(frame)) => {
                sync.field == FieldId::Sync
                    && sync.width == SYNC.len()
                    && frame.field == FieldId::Frame
                    && frame.width == 1
            }
            _ => false,
        };

        let tail_ok = match self.slots.last() {
            Some(sum) => sum.field == FieldId::Checksum && sum.width == CHECKSUM_LEN,
            None => false,
        };

        head_ok && tail_ok
    }

    /// Total frame length in bytes.
    #[inline]
    pub fn total_len(&self) -> usize {
        self.total
    }

    #[inline]
    pub fn slot(&self, field: FieldId) -> Option<&FieldSlot> {
        self.slots.iter().find(|slot| slot.field == field)
    }

    /// Slots between the frame-id byte and the checksum.
    pub fn payload_slots(&self) -> impl Iterator<Item = &FieldSlot> {
        self.slots.iter().filter(|slot| {
            !matches!(slot.field, FieldId::Sync | FieldId::Frame | FieldId::Checksum)
        })
    }

    #[inline]
    pub fn checksum_offset(&self) -> usize {
        self.total - CHECKSUM_LEN
    }

    /// Region the checksum covers: the frame-id byte through the last payload
    /// byte.
    #[inline]
    pub fn checksummed_range(&self) -> Range<usize> {
        SYNC.len()..self.checksum_offset()
    }
}

lazy_static! {
    /// Canonical frame table shared by both ends of the link.
    pub static ref FRAMES: IndexMap<FrameId, FrameLayout> = {
        let mut frames = IndexMap::new();

        frames.insert(
            FrameId::Nothing,
            FrameLayout::assemble(&[
                (FieldId::Sync, SYNC.len()),
                (FieldId::Frame, 1),
                (FieldId::Checksum, CHECKSUM_LEN),
            ]),
        );

        frames.insert(
            FrameId::RobotStatus,
            FrameLayout::assemble(&[
                (FieldId::Sync, SYNC.len()),
                (FieldId::Frame, 1),
                (FieldId::RobotKillState, 1),
                (FieldId::ThrusterState, 1),
                (FieldId::DiagnosticsState, 1),
                (FieldId::LeakState, 1),
                (FieldId::Checksum, CHECKSUM_LEN),
            ]),
        );

        frames.insert(
            FrameId::OpboxStatus,
            FrameLayout::assemble(&[
                (FieldId::Sync, SYNC.len()),
                (FieldId::Frame, 1),
                (FieldId::KillButtonState, 1),
                (FieldId::Checksum, CHECKSUM_LEN),
            ]),
        );

        frames.insert(
            FrameId::Notification,
            FrameLayout::assemble(&[
                (FieldId::Sync, SYNC.len()),
                (FieldId::Frame, 1),
                (FieldId::NotificationType, 1),
                (FieldId::NotificationUid, 1),
                (FieldId::NotificationSensorName, SENSOR_NAME_LEN),
                (FieldId::NotificationDescription, DESCRIPTION_LEN),
                (FieldId::Checksum, CHECKSUM_LEN),
            ]),
        );

        frames.insert(
            FrameId::Ack,
            FrameLayout::assemble(&[
                (FieldId::Sync, SYNC.len()),
                (FieldId::Frame, 1),
                (FieldId::AckedNotificationUid, 1),
                (FieldId::Checksum, CHECKSUM_LEN),
            ]),
        );

        frames
    };
}

/// Text content of a NUL padded field.
pub fn string_from_wire(bytes: &[u8]) -> String {
    let end = bytes.iter().position(|&b| b == 0).unwrap_or(bytes.len());
    String::from_utf8_lossy(&bytes[..end]).into_owned()
}
