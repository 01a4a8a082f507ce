//! Most-recent-value store for wire fields. Writers stamp each value with a
//! time; the stamp is advisory (freshness queries only) and never affects
//! which value wins — a later `set` always replaces an earlier one.

use crate::wire::{string_from_wire, FieldId};
use byteorder::{ByteOrder, LittleEndian};
use hashbrown::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

/// A field value plus the instant it was written.
#[derive(Debug, Clone)]
pub struct Stamped {
    pub bytes: Vec<u8>,
    pub write_time: Instant,
}

/// Mutex-guarded map from field id to its most recent bytes. All access goes
/// through the one mutex; readers copy values out so the critical section is
/// only the map operation itself.
pub struct FieldStore {
    fields: Mutex<HashMap<FieldId, Stamped>>,
}

impl FieldStore {
    pub fn new() -> FieldStore {
        FieldStore {
            fields: Mutex::new(HashMap::new()),
        }
    }

    pub fn set(&self, field: FieldId, bytes: Vec<u8>, time: Instant) {
        let mut fields = self.fields.lock().expect("Field store mutex poisoned");
        fields.insert(field, Stamped { bytes, write_time: time });
    }

    pub fn get(&self, field: FieldId) -> Option<Vec<u8>> {
        let fields = self.fields.lock().expect("Field store mutex poisoned");
        fields.get(&field).map(|stamped| stamped.bytes.clone())
    }

    pub fn get_stamped(&self, field: FieldId) -> Option<Stamped> {
        let fields = self.fields.lock().expect("Field store mutex poisoned");
        fields.get(&field).cloned()
    }

    pub fn has(&self, field: FieldId) -> bool {
        let fields = self.fields.lock().expect("Field store mutex poisoned");
        fields.contains_key(&field)
    }

    pub fn set_u8(&self, field: FieldId, value: u8, time: Instant) {
        self.set(field, vec![value], time);
    }

    pub fn get_u8(&self, field: FieldId) -> Option<u8> {
        self.get(field).and_then(|bytes| bytes.first().copied())
    }

    pub fn set_u16(&self, field: FieldId, value: u16, time: Instant) {
        let mut bytes = [0u8; 2];
        LittleEndian::write_u16(&mut bytes, value);
        self.set(field, bytes.to_vec(), time);
    }

    pub fn get_u16(&self, field: FieldId) -> Option<u16> {
        self.get(field).and_then(|bytes| {
            if bytes.len() < 2 {
                None
            } else {
                Some(LittleEndian::read_u16(&bytes))
            }
        })
    }

    /// Stores the raw text bytes; the codec pads or truncates to the slot
    /// width at encode time.
    pub fn set_str(&self, field: FieldId, text: &str, time: Instant) {
        self.set(field, text.as_bytes().to_vec(), time);
    }

    pub fn get_str(&self, field: FieldId) -> Option<String> {
        self.get(field).map(|bytes| string_from_wire(&bytes))
    }

    /// Time since the field was last written, as seen from `now`. `None` for
    /// a field that has never been written or whose stamp lies ahead of
    /// `now`.
    pub fn age(&self, field: FieldId, now: Instant) -> Option<Duration> {
        let fields = self.fields.lock().expect("Field store mutex poisoned");
        fields
            .get(&field)
            .and_then(|stamped| now.checked_duration_since(stamped.write_time))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_read_back() {
        let store = FieldStore::new();
        let now = Instant::now();

        assert!(!store.has(FieldId::LeakState));
        assert_eq!(store.get(FieldId::LeakState), None);

        store.set(FieldId::LeakState, vec![1], now);

        assert!(store.has(FieldId::LeakState));
        assert_eq!(store.get(FieldId::LeakState), Some(vec![1]));
        assert_eq!(store.get_stamped(FieldId::LeakState).unwrap().write_time, now);
    }

    #[test]
    fn test_later_write_wins_regardless_of_stamp() {
        let store = FieldStore::new();
        let now = Instant::now();
        let earlier = now - Duration::from_secs(10);

        store.set_u8(FieldId::KillButtonState, 1, now);
        // Stamp is advisory: an older time argument still replaces the value.
        store.set_u8(FieldId::KillButtonState, 0, earlier);

        assert_eq!(store.get_u8(FieldId::KillButtonState), Some(0));
        assert_eq!(
            store.get_stamped(FieldId::KillButtonState).unwrap().write_time,
            earlier
        );
    }

    #[test]
    fn test_typed_round_trips() {
        let store = FieldStore::new();
        let now = Instant::now();

        store.set_u8(FieldId::NotificationUid, 250, now);
        assert_eq!(store.get_u8(FieldId::NotificationUid), Some(250));

        store.set_u16(FieldId::Checksum, 0xBEEF, now);
        assert_eq!(store.get_u16(FieldId::Checksum), Some(0xBEEF));
        assert_eq!(store.get(FieldId::Checksum), Some(vec![0xEF, 0xBE]));

        store.set_str(FieldId::NotificationSensorName, "depth", now);
        assert_eq!(
            store.get_str(FieldId::NotificationSensorName),
            Some("depth".to_string())
        );
    }

    #[test]
    fn test_age_tracks_write_stamp() {
        let store = FieldStore::new();
        let wrote_at = Instant::now();

        assert_eq!(store.age(FieldId::LeakState, wrote_at), None);

        store.set_u8(FieldId::LeakState, 0, wrote_at);

        let later = wrote_at + Duration::from_millis(350);
        assert_eq!(store.age(FieldId::LeakState, later), Some(Duration::from_millis(350)));

        // A stamp ahead of the query instant has no meaningful age.
        assert_eq!(store.age(FieldId::LeakState, wrote_at - Duration::from_millis(1)), None);
    }

    #[test]
    fn test_get_u16_rejects_short_value() {
        let store = FieldStore::new();
        store.set(FieldId::Checksum, vec![1], Instant::now());
        assert_eq!(store.get_u16(FieldId::Checksum), None);
    }
}
