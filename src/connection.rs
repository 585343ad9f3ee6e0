//! Database handles: open, query, interrupt.

use std::ffi::CString;
use std::ptr::{self, NonNull};

use tracing::debug;

use crate::api::Api;
use crate::error::{Error, Result};
use crate::result::QueryResult;
use crate::runtime;
use crate::sys;

/// An open database.
///
/// The handle is owned for the lifetime of the value and closed on drop.
/// Queries borrow the database, so results and chunks cannot outlive it.
pub struct Database {
    api: &'static Api,
    handle: NonNull<sys::strata_database>,
}

// The engine's database handle is thread-safe; the driver adds no
// thread-affine state of its own here.
unsafe impl Send for Database {}
unsafe impl Sync for Database {}

impl Database {
    /// Open a database file, or an in-memory database when `path` is `None`.
    ///
    /// Loads the engine library on first use; a load failure is cached and
    /// reported on every subsequent open.
    pub fn open(path: Option<&str>) -> Result<Self> {
        let rt = runtime::runtime()?;
        unsafe { Self::open_with(rt.api(), path) }
    }

    /// Open against an explicit function table.
    ///
    /// # Safety
    ///
    /// `api` must describe a live engine whose symbols match the declared
    /// signatures.
    #[doc(hidden)]
    pub unsafe fn open_with(api: &'static Api, path: Option<&str>) -> Result<Self> {
        let path = path
            .map(CString::new)
            .transpose()
            .map_err(|_| Error::InvalidArgument("database path contains a NUL byte"))?;
        let path_ptr = path.as_deref().map_or(ptr::null(), |p| p.as_ptr());

        let mut handle: *mut sys::strata_database = ptr::null_mut();
        let mut message: *mut std::os::raw::c_char = ptr::null_mut();
        let code = (api.strata_open)(path_ptr, &mut handle, &mut message);
        if code != sys::strata_code::STRATA_OK {
            return Err(Error::Engine(api.take_string(message)));
        }
        let handle = NonNull::new(handle)
            .ok_or_else(|| Error::Engine("engine reported success with a null database".into()))?;
        debug!(in_memory = path.is_none(), "opened database");
        Ok(Self { api, handle })
    }

    /// Wrap a database handle owned by the caller's embedding layer.
    ///
    /// # Safety
    ///
    /// `handle` must be live, produced by the engine `api` describes, and
    /// ownership transfers to the returned value.
    #[doc(hidden)]
    pub unsafe fn from_raw_parts(api: &'static Api, handle: NonNull<sys::strata_database>) -> Self {
        Self { api, handle }
    }

    /// Run `sql` to completion and materialize the result.
    ///
    /// # Errors
    ///
    /// [`Error::Engine`] carrying the engine's message on query failure,
    /// [`Error::InvalidArgument`] for SQL containing a NUL byte.
    pub fn query(&self, sql: &str) -> Result<QueryResult> {
        let sql =
            CString::new(sql).map_err(|_| Error::InvalidArgument("sql contains a NUL byte"))?;
        let mut result: *mut sys::strata_result = ptr::null_mut();
        let mut message: *mut std::os::raw::c_char = ptr::null_mut();
        let code = unsafe {
            (self.api.strata_query)(self.handle.as_ptr(), sql.as_ptr(), &mut result, &mut message)
        };
        if code != sys::strata_code::STRATA_OK {
            return Err(Error::Engine(unsafe { self.api.take_string(message) }));
        }
        unsafe { QueryResult::from_handle(self.api, result) }
    }

    /// Ask the engine to cancel work in flight on this database.
    ///
    /// Best-effort: queries already running fail with an engine error at
    /// their next cancellation point. Safe from any thread.
    pub fn interrupt(&self) {
        unsafe { (self.api.strata_interrupt)(self.handle.as_ptr()) };
    }

    /// Close the database now instead of waiting for scope exit.
    pub fn close(self) {}
}

impl Drop for Database {
    fn drop(&mut self) {
        debug!("closing database");
        unsafe { (self.api.strata_close)(self.handle.as_ptr()) };
    }
}
