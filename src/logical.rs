//! Foreign logical-type handle ownership and the enum-member dictionary.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, OnceLock};

use parking_lot::Mutex;

use crate::api::Api;
use crate::error::{Error, Result};
use crate::sys;

/// Owner of one foreign logical-type handle; released exactly once on drop.
///
/// Borrowed (non-owned) handles never appear as `LogicalType`, only as plain
/// raw pointers with no destructor attached.
pub(crate) struct LogicalType {
    api: &'static Api,
    handle: *mut sys::strata_logical_type,
}

// Type handles are plain engine heap descriptors with no thread affinity.
unsafe impl Send for LogicalType {}

impl LogicalType {
    /// Take ownership of `handle`.
    ///
    /// # Safety
    ///
    /// `handle` must be an owned logical-type handle not owned elsewhere.
    pub(crate) unsafe fn from_owned(
        api: &'static Api,
        handle: *mut sys::strata_logical_type,
    ) -> Self {
        Self { api, handle }
    }

    pub(crate) fn raw(&self) -> *mut sys::strata_logical_type {
        self.handle
    }
}

impl Drop for LogicalType {
    fn drop(&mut self) {
        if !self.handle.is_null() {
            unsafe { (self.api.strata_type_destroy)(self.handle) };
        }
    }
}

/// Lazily resolved enum-member names, keyed by ordinal.
///
/// Each slot is published exactly once; concurrent resolvers of the same
/// ordinal agree on a single canonical name. The foreign type handle is held
/// only until the last slot resolves, then released eagerly.
pub struct EnumDictionary {
    api: &'static Api,
    handle: Mutex<Option<LogicalType>>,
    names: Box<[OnceLock<Arc<str>>]>,
    resolved: AtomicUsize,
}

impl EnumDictionary {
    pub(crate) fn new(api: &'static Api, ty: LogicalType, size: usize) -> Self {
        Self {
            api,
            handle: Mutex::new(Some(ty)),
            names: (0..size).map(|_| OnceLock::new()).collect(),
            resolved: AtomicUsize::new(0),
        }
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// Member name for `code`, resolving and caching it on first access.
    ///
    /// # Errors
    ///
    /// [`Error::OutOfBounds`] for a code outside the dictionary.
    pub fn name(&self, code: usize) -> Result<Arc<str>> {
        let slot = self.names.get(code).ok_or(Error::OutOfBounds {
            what: "enum code",
            index: code,
            len: self.names.len(),
        })?;
        if let Some(name) = slot.get() {
            return Ok(Arc::clone(name));
        }

        let fetched: Arc<str> = {
            let guard = self.handle.lock();
            match guard.as_ref() {
                Some(ty) => {
                    let raw =
                        unsafe { (self.api.strata_enum_dictionary_value)(ty.raw(), code as u64) };
                    if raw.is_null() {
                        return Err(Error::OutOfBounds {
                            what: "enum code",
                            index: code,
                            len: self.names.len(),
                        });
                    }
                    Arc::from(unsafe { self.api.take_string(raw) })
                }
                // The handle is only released once every slot is filled, so
                // a racing resolver must find the slot populated.
                None => {
                    return slot.get().map(Arc::clone).ok_or(Error::Disposed(
                        "enum dictionary type handle",
                    ))
                }
            }
        };

        if slot.set(Arc::clone(&fetched)).is_ok()
            && self.resolved.fetch_add(1, Ordering::AcqRel) + 1 == self.names.len()
        {
            // Every ordinal resolved; the foreign handle has no further use.
            *self.handle.lock() = None;
        }
        // A concurrent resolver may have won the publish; return the
        // canonical instance either way.
        Ok(slot.get().map(Arc::clone).unwrap_or(fetched))
    }
}
