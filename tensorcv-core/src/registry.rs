//! Owned instances addressed by opaque handles.
//!
//! Stateful objects created on behalf of the host (descriptor extractors)
//! live in a [`HandleRegistry`]. A handle carries the slot index and the
//! slot's generation, so a handle that was released keeps failing even after
//! its slot has been reused.

use crate::error::{Error, Result};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Handle {
    index: u32,
    generation: u32,
}

impl Handle {
    /// Single integer form handed to the host.
    pub fn to_raw(self) -> i64 {
        ((self.generation as i64) << 32) | self.index as i64
    }

    pub fn from_raw(raw: i64) -> Result<Self> {
        if raw < 0 {
            return Err(Error::InvalidHandle(format!("negative handle {}", raw)));
        }
        Ok(Self {
            index: (raw & 0xFFFF_FFFF) as u32,
            generation: (raw >> 32) as u32,
        })
    }
}

impl fmt::Display for Handle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}.{}", self.index, self.generation)
    }
}

struct Slot<T> {
    generation: u32,
    value: Option<T>,
}

struct Slots<T> {
    entries: Vec<Slot<T>>,
    free: Vec<u32>,
    live: usize,
}

pub struct HandleRegistry<T> {
    name: &'static str,
    slots: RwLock<Slots<T>>,
}

impl<T> HandleRegistry<T> {
    /// `name` only shows up in logs and error messages.
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            slots: RwLock::new(Slots {
                entries: Vec::new(),
                free: Vec::new(),
                live: 0,
            }),
        }
    }

    pub fn insert(&self, value: T) -> Result<Handle> {
        let mut slots = self.slots.write();
        let handle = if let Some(index) = slots.free.pop() {
            let slot = &mut slots.entries[index as usize];
            slot.value = Some(value);
            Handle {
                index,
                generation: slot.generation,
            }
        } else {
            let index = u32::try_from(slots.entries.len()).map_err(|_| {
                Error::InvalidHandle(format!("{} registry is full", self.name))
            })?;
            slots.entries.push(Slot {
                generation: 0,
                value: Some(value),
            });
            Handle {
                index,
                generation: 0,
            }
        };
        slots.live += 1;
        debug!(registry = self.name, %handle, live = slots.live, "registered instance");
        Ok(handle)
    }

    /// Run `f` against the instance behind `handle`.
    pub fn with<R>(&self, handle: Handle, f: impl FnOnce(&T) -> R) -> Result<R> {
        let slots = self.slots.read();
        match slots.entries.get(handle.index as usize) {
            Some(Slot {
                generation,
                value: Some(value),
            }) if *generation == handle.generation => Ok(f(value)),
            _ => Err(self.stale(handle)),
        }
    }

    /// Like [`with`](Self::with) with mutable access.
    pub fn with_mut<R>(&self, handle: Handle, f: impl FnOnce(&mut T) -> R) -> Result<R> {
        let mut slots = self.slots.write();
        match slots.entries.get_mut(handle.index as usize) {
            Some(Slot {
                generation,
                value: Some(value),
            }) if *generation == handle.generation => Ok(f(value)),
            _ => Err(self.stale(handle)),
        }
    }

    /// Take the instance out; the handle is dead afterwards.
    pub fn remove(&self, handle: Handle) -> Result<T> {
        let mut slots = self.slots.write();
        let value = match slots.entries.get_mut(handle.index as usize) {
            Some(slot) if slot.generation == handle.generation && slot.value.is_some() => {
                slot.generation = slot.generation.wrapping_add(1);
                slot.value.take()
            }
            _ => None,
        };
        let value = value.ok_or_else(|| self.stale(handle))?;
        slots.free.push(handle.index);
        slots.live -= 1;
        debug!(registry = self.name, %handle, live = slots.live, "released instance");
        Ok(value)
    }

    pub fn contains(&self, handle: Handle) -> bool {
        self.with(handle, |_| ()).is_ok()
    }

    pub fn len(&self) -> usize {
        self.slots.read().live
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn stale(&self, handle: Handle) -> Error {
        Error::InvalidHandle(format!("{} {} is not live", self.name, handle))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insert_and_access() {
        let reg = HandleRegistry::new("test");
        let a = reg.insert(10).unwrap();
        let b = reg.insert(20).unwrap();
        assert_ne!(a, b);
        assert_eq!(reg.with(a, |v| *v).unwrap(), 10);
        assert_eq!(reg.with(b, |v| *v).unwrap(), 20);
        assert_eq!(reg.len(), 2);
    }

    #[test]
    fn test_use_after_remove_fails() {
        let reg = HandleRegistry::new("test");
        let a = reg.insert("x".to_string()).unwrap();
        assert_eq!(reg.remove(a).unwrap(), "x");
        assert!(matches!(reg.with(a, |_| ()), Err(Error::InvalidHandle(_))));
        assert!(matches!(reg.remove(a), Err(Error::InvalidHandle(_))));
        assert!(reg.is_empty());
    }

    #[test]
    fn test_reused_slot_does_not_alias() {
        let reg = HandleRegistry::new("test");
        let a = reg.insert(1).unwrap();
        reg.remove(a).unwrap();
        let b = reg.insert(2).unwrap();
        assert!(!reg.contains(a));
        assert!(reg.contains(b));
        assert_eq!(reg.with(b, |v| *v).unwrap(), 2);
    }

    #[test]
    fn test_with_mut() {
        let reg = HandleRegistry::new("test");
        let a = reg.insert(vec![1]).unwrap();
        reg.with_mut(a, |v| v.push(2)).unwrap();
        assert_eq!(reg.with(a, |v| v.len()).unwrap(), 2);
    }

    #[test]
    fn test_raw_round_trip_and_unknown_handle() {
        let reg: HandleRegistry<u8> = HandleRegistry::new("test");
        let a = reg.insert(7).unwrap();
        reg.remove(a).unwrap();
        let b = reg.insert(8).unwrap();
        assert_eq!(Handle::from_raw(b.to_raw()).unwrap(), b);
        assert!(Handle::from_raw(-1).is_err());
        let unknown = Handle::from_raw(99).unwrap();
        assert!(!reg.contains(unknown));
    }
}
