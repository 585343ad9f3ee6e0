//! Owned data chunks and the scoped accessor that exposes their vectors.

use std::ptr::{self, NonNull};
use std::sync::atomic::{AtomicPtr, Ordering};
use std::sync::Arc;

use tracing::trace;

use crate::api::Api;
use crate::error::{Error, Result};
use crate::result::Column;
use crate::sync::{BorrowGate, ThreadAffineLock};
use crate::sys::{self, idx_t};
use crate::vector::VectorView;

/// One engine-owned batch of rows, typically fetched from a
/// [`QueryResult`](crate::QueryResult).
///
/// All data access goes through [`with_accessor`](Self::with_accessor): the
/// accessor scope pins the native buffers while borrowed views exist, and a
/// concurrent [`close`](Self::close) waits for every scope to drain before
/// the chunk is handed back to the engine.
pub struct Chunk {
    api: &'static Api,
    handle: AtomicPtr<sys::strata_chunk>,
    columns: Arc<[Column]>,
    len: usize,
    lock: ThreadAffineLock,
    gate: BorrowGate,
}

impl Chunk {
    /// # Safety
    ///
    /// `handle` must be an owned chunk handle whose columns match `columns`.
    pub(crate) unsafe fn new(
        api: &'static Api,
        handle: NonNull<sys::strata_chunk>,
        columns: Arc<[Column]>,
    ) -> Self {
        let len = (api.strata_chunk_row_count)(handle.as_ptr()) as usize;
        debug_assert_eq!(
            (api.strata_chunk_column_count)(handle.as_ptr()) as usize,
            columns.len(),
            "chunk column count drifted from result metadata"
        );
        Self {
            api,
            handle: AtomicPtr::new(handle.as_ptr()),
            columns,
            len,
            lock: ThreadAffineLock::new("data chunk"),
            gate: BorrowGate::new(),
        }
    }

    /// Rows in this chunk.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    /// Run `f` with scoped access to the chunk's vectors.
    ///
    /// The closure's lifetime parameter prevents any [`VectorView`] or slice
    /// derived from it from escaping the scope.
    ///
    /// # Errors
    ///
    /// [`Error::Disposed`] if [`close`](Self::close) has already begun.
    pub fn with_accessor<R, F>(&self, f: F) -> Result<R>
    where
        F: for<'a> FnOnce(&ChunkAccessor<'a>) -> Result<R>,
    {
        let _borrow = self.gate.borrow("data chunk")?;
        let _section = self.lock.enter()?;
        let accessor = ChunkAccessor {
            api: self.api,
            chunk: self.handle.load(Ordering::Acquire),
            columns: &self.columns,
            len: self.len,
        };
        f(&accessor)
    }

    /// Release the chunk back to the engine.
    ///
    /// Safe to call from any thread and any number of times; one caller wins
    /// the teardown and blocks until every in-flight accessor scope exits.
    pub fn close(&self) {
        if !self.gate.begin_dispose() {
            return;
        }
        let _ = self.lock.begin_dispose();
        let handle = self.handle.swap(ptr::null_mut(), Ordering::AcqRel);
        if !handle.is_null() {
            trace!(rows = self.len, "destroying data chunk");
            unsafe { (self.api.strata_chunk_destroy)(handle) };
        }
    }
}

impl Drop for Chunk {
    fn drop(&mut self) {
        self.close();
    }
}

impl std::fmt::Debug for Chunk {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Chunk")
            .field("rows", &self.len)
            .field("columns", &self.columns.len())
            .finish_non_exhaustive()
    }
}

/// Borrowed window into a live chunk, valid only inside
/// [`Chunk::with_accessor`].
pub struct ChunkAccessor<'a> {
    api: &'static Api,
    chunk: *mut sys::strata_chunk,
    columns: &'a [Column],
    len: usize,
}

impl<'a> ChunkAccessor<'a> {
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    /// Borrow one column's vector.
    pub fn column(&self, index: usize) -> Result<VectorView<'a>> {
        let column = self.columns.get(index).ok_or(Error::OutOfBounds {
            what: "column",
            index,
            len: self.columns.len(),
        })?;
        let vector = unsafe { (self.api.strata_chunk_vector)(self.chunk, index as idx_t) };
        if vector.is_null() {
            return Err(Error::OutOfBounds {
                what: "column",
                index,
                len: self.columns.len(),
            });
        }
        Ok(VectorView::new(
            self.api,
            vector,
            column.descriptor(),
            self.len,
        ))
    }
}
