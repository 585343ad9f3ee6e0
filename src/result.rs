//! Query results: column metadata, chunk iteration, and scan progress.

use std::ffi::CStr;
use std::ptr::{self, NonNull};
use std::sync::atomic::{AtomicPtr, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::debug;

use crate::api::Api;
use crate::chunk::Chunk;
use crate::error::{Error, Result};
use crate::sync::{BorrowGate, SeqCell, ThreadAffineLock};
use crate::sys::{self, idx_t};
use crate::types::ColumnDescriptor;

/// Name and type descriptor of one result column, resolved once when the
/// result is constructed.
#[derive(Clone, Debug)]
pub struct Column {
    name: Box<str>,
    descriptor: ColumnDescriptor,
}

impl Column {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn descriptor(&self) -> ColumnDescriptor {
        self.descriptor
    }
}

/// Monotonic scan counters, readable without blocking the scanning thread.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct ScanProgress {
    /// Chunks fetched so far.
    pub chunks: u64,
    /// Rows across all fetched chunks.
    pub rows: u64,
}

/// A materialized query result streaming chunks out of the engine.
///
/// Chunk fetching is serialized (the engine cursor is single-consumer), but
/// [`progress`](Self::progress) and [`close`](Self::close) are safe from any
/// thread at any time.
pub struct QueryResult {
    api: &'static Api,
    handle: AtomicPtr<sys::strata_result>,
    columns: Arc<[Column]>,
    /// Serializes the engine's fetch cursor across threads.
    cursor: Mutex<()>,
    lock: ThreadAffineLock,
    gate: BorrowGate,
    progress: SeqCell<ScanProgress>,
}

impl QueryResult {
    /// Take ownership of a raw result handle, resolving column metadata up
    /// front. The handle is destroyed if metadata resolution fails.
    ///
    /// # Safety
    ///
    /// `raw` must be a result handle produced by the same engine as `api`,
    /// not owned elsewhere.
    pub(crate) unsafe fn from_handle(api: &'static Api, raw: *mut sys::strata_result) -> Result<Self> {
        let handle = NonNull::new(raw)
            .ok_or_else(|| Error::Engine("query produced a null result handle".into()))?;
        match Self::build(api, handle) {
            Ok(result) => Ok(result),
            Err(err) => {
                (api.strata_result_destroy)(handle.as_ptr());
                Err(err)
            }
        }
    }

    /// Wrap a result handle obtained outside this crate (an embedding layer,
    /// or a test harness with its own function table).
    ///
    /// # Safety
    ///
    /// Same contract as an internal handle: `raw` must be live, owned by the
    /// caller, and produced by the engine `api` describes.
    #[doc(hidden)]
    pub unsafe fn from_raw_parts(api: &'static Api, raw: *mut sys::strata_result) -> Result<Self> {
        Self::from_handle(api, raw)
    }

    unsafe fn build(api: &'static Api, handle: NonNull<sys::strata_result>) -> Result<Self> {
        let count = (api.strata_result_column_count)(handle.as_ptr()) as usize;
        let mut columns = Vec::with_capacity(count);
        for col in 0..count as idx_t {
            let name_ptr = (api.strata_result_column_name)(handle.as_ptr(), col);
            if name_ptr.is_null() {
                return Err(Error::Engine(format!("null name for result column {col}")));
            }
            let name = CStr::from_ptr(name_ptr)
                .to_str()
                .map_err(|_| Error::Engine(format!("result column {col} name is not UTF-8")))?;
            columns.push(Column {
                name: name.into(),
                descriptor: ColumnDescriptor::from_result(api, handle.as_ptr(), col),
            });
        }
        debug!(columns = count, "materialized query result");
        Ok(Self {
            api,
            handle: AtomicPtr::new(handle.as_ptr()),
            columns: columns.into(),
            cursor: Mutex::new(()),
            lock: ThreadAffineLock::new("query result"),
            gate: BorrowGate::new(),
            progress: SeqCell::new(ScanProgress::default()),
        })
    }

    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn column(&self, index: usize) -> Result<&Column> {
        self.columns.get(index).ok_or(Error::OutOfBounds {
            what: "column",
            index,
            len: self.columns.len(),
        })
    }

    /// Index of the column named `name`, if any.
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| &*c.name == name)
    }

    /// Fetch the next chunk, or `None` once the result is exhausted.
    ///
    /// # Errors
    ///
    /// [`Error::Disposed`] once [`close`](Self::close) has begun.
    pub fn next_chunk(&self) -> Result<Option<Chunk>> {
        let _borrow = self.gate.borrow("query result")?;
        let _section = self.lock.enter()?;
        let _cursor = self.cursor.lock();
        let raw = unsafe { (self.api.strata_result_fetch_chunk)(self.handle.load(Ordering::Acquire)) };
        let Some(handle) = NonNull::new(raw) else {
            return Ok(None);
        };
        let chunk = unsafe { Chunk::new(self.api, handle, Arc::clone(&self.columns)) };
        let before = self.progress.read();
        self.progress.write(ScanProgress {
            chunks: before.chunks + 1,
            rows: before.rows + chunk.len() as u64,
        });
        Ok(Some(chunk))
    }

    /// Snapshot of the scan counters. Never blocks and never observes a
    /// half-updated pair.
    pub fn progress(&self) -> ScanProgress {
        self.progress.read()
    }

    /// Destroy the underlying result.
    ///
    /// Idempotent and thread-safe; the winning caller waits until every
    /// in-flight [`next_chunk`](Self::next_chunk) completes. Chunks already
    /// fetched stay usable, they own their memory independently.
    pub fn close(&self) {
        if !self.gate.begin_dispose() {
            return;
        }
        let _ = self.lock.begin_dispose();
        let handle = self.handle.swap(ptr::null_mut(), Ordering::AcqRel);
        if !handle.is_null() {
            let progress = self.progress.read();
            debug!(
                chunks = progress.chunks,
                rows = progress.rows,
                "destroying query result"
            );
            unsafe { (self.api.strata_result_destroy)(handle) };
        }
    }
}

impl Drop for QueryResult {
    fn drop(&mut self) {
        self.close();
    }
}

impl std::fmt::Debug for QueryResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueryResult")
            .field("columns", &self.columns)
            .field("progress", &self.progress.read())
            .finish_non_exhaustive()
    }
}
