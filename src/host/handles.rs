//! Handle table - refcounted identities handed out across the boundary
//!
//! Ids 1-4 are reserved for `undefined`, `null`, `true` and `false`. They
//! are immortal: increments and decrements on them are no-ops. Freed ids are
//! reused.

use super::value::Value;
use crate::boundary::RawRef;
use crate::error::BoundaryError;
use crate::logging::{trace, warn};

pub const UNDEFINED: RawRef = RawRef::from_bits(1);
pub const NULL: RawRef = RawRef::from_bits(2);
pub const TRUE: RawRef = RawRef::from_bits(3);
pub const FALSE: RawRef = RawRef::from_bits(4);

const FIRST_DYNAMIC: u32 = 5;

/// Refcount reported for reserved handles
pub const IMMORTAL: u32 = u32::MAX;

struct Entry {
    value: Value,
    refcount: u32,
}

pub struct HandleTable {
    /// Indexed by `id - FIRST_DYNAMIC`
    entries: Vec<Option<Entry>>,
    free: Vec<u32>,
    live: usize,
}

impl HandleTable {
    pub fn new() -> Self {
        Self {
            entries: Vec::with_capacity(64),
            free: Vec::new(),
            live: 0,
        }
    }

    /// Hand out a new identity with refcount 1 (or a reserved one)
    pub fn allocate(&mut self, value: Value) -> RawRef {
        match value {
            Value::Undefined => return UNDEFINED,
            Value::Null => return NULL,
            Value::Bool(true) => return TRUE,
            Value::Bool(false) => return FALSE,
            _ => {}
        }

        let entry = Some(Entry { value, refcount: 1 });
        let id = match self.free.pop() {
            Some(id) => {
                self.entries[(id - FIRST_DYNAMIC) as usize] = entry;
                id
            }
            None => {
                self.entries.push(entry);
                self.entries.len() as u32 - 1 + FIRST_DYNAMIC
            }
        };
        self.live += 1;
        RawRef::from_bits(id)
    }

    /// Value behind `raw`; the empty identity reads as `undefined`
    pub fn value(&self, raw: RawRef) -> Result<Value, BoundaryError> {
        match raw.bits() {
            0 | 1 => Ok(Value::Undefined),
            2 => Ok(Value::Null),
            3 => Ok(Value::Bool(true)),
            4 => Ok(Value::Bool(false)),
            _ => self
                .entry(raw)
                .map(|entry| entry.value.clone())
                .ok_or(BoundaryError::InvalidHandle { raw: raw.bits() }),
        }
    }

    pub fn incref(&mut self, raw: RawRef) {
        if raw.bits() < FIRST_DYNAMIC {
            return;
        }
        match self.entry_mut(raw) {
            Some(entry) => {
                debug_assert!(entry.refcount < u32::MAX, "refcount overflow");
                entry.refcount += 1;
            }
            None => warn!(event = "stale_incref", raw = raw.bits(), "Increment of unknown handle"),
        }
    }

    /// Decrement; returns the released value when the count reaches zero so
    /// the caller can drop it outside any borrow
    pub fn decref(&mut self, raw: RawRef) -> Option<Value> {
        if raw.bits() < FIRST_DYNAMIC {
            return None;
        }
        let index = (raw.bits() - FIRST_DYNAMIC) as usize;
        let entry = match self.entries.get_mut(index).and_then(Option::as_mut) {
            Some(entry) => entry,
            None => {
                warn!(event = "stale_decref", raw = raw.bits(), "Decrement of unknown handle");
                return None;
            }
        };

        entry.refcount -= 1;
        if entry.refcount > 0 {
            return None;
        }

        let released = self.entries[index].take().map(|entry| entry.value);
        self.free.push(raw.bits());
        self.live -= 1;
        trace!(event = "handle_released", raw = raw.bits());
        released
    }

    /// Current count; `IMMORTAL` for reserved ids, 0 for unknown ones
    pub fn refcount(&self, raw: RawRef) -> u32 {
        if raw.is_empty() {
            return 0;
        }
        if raw.bits() < FIRST_DYNAMIC {
            return IMMORTAL;
        }
        self.entry(raw).map_or(0, |entry| entry.refcount)
    }

    /// Live non-reserved handles
    pub fn live(&self) -> usize {
        self.live
    }

    fn entry(&self, raw: RawRef) -> Option<&Entry> {
        let index = raw.bits().checked_sub(FIRST_DYNAMIC)? as usize;
        self.entries.get(index)?.as_ref()
    }

    fn entry_mut(&mut self, raw: RawRef) -> Option<&mut Entry> {
        let index = raw.bits().checked_sub(FIRST_DYNAMIC)? as usize;
        self.entries.get_mut(index)?.as_mut()
    }
}
