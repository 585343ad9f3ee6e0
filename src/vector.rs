//! Scoped, zero-copy views over one column's native buffers.

use std::any::type_name;
use std::marker::PhantomData;
use std::slice;

use crate::api::Api;
use crate::error::{Error, Result};
use crate::logical::{EnumDictionary, LogicalType};
use crate::sys::{self, idx_t};
use crate::types::{ColumnDescriptor, Date, Hugeint, Interval, ListEntry, StorageKind, Time, Timestamp, ValueKind};
use crate::value::FromVector;

mod sealed {
    pub trait Sealed {}
}

/// Types readable directly out of a vector's data buffer via
/// [`VectorView::as_slice`].
///
/// # Safety
///
/// Implementations assert that the type's layout is byte-identical to the
/// engine's storage for every [`StorageKind`] accepted by `matches`.
pub unsafe trait NativeType: sealed::Sealed + Copy {
    #[doc(hidden)]
    fn matches(storage: StorageKind) -> bool;
}

macro_rules! native_type {
    ($t:ty => $($kind:ident)|+) => {
        impl sealed::Sealed for $t {}
        unsafe impl NativeType for $t {
            fn matches(storage: StorageKind) -> bool {
                matches!(storage, $(StorageKind::$kind)|+)
            }
        }
    };
}

// Boolean storage is one byte per row holding 0 or 1 (engine contract), so
// both `bool` and `u8` views are allowed over it.
native_type!(bool => Boolean);
native_type!(u8 => UInt8 | Boolean);
native_type!(i8 => Int8);
native_type!(i16 => Int16);
native_type!(u16 => UInt16);
native_type!(i32 => Int32);
native_type!(u32 => UInt32);
native_type!(i64 => Int64);
native_type!(u64 => UInt64);
native_type!(f32 => Float32);
native_type!(f64 => Float64);
native_type!(Hugeint => Int128);
native_type!(Date => Date);
native_type!(Time => Time);
native_type!(Timestamp => Timestamp);
native_type!(Interval => Interval);
native_type!(ListEntry => ListEntry);
native_type!(sys::strata_string => String);

/// Read-only view of one column's backing store inside one chunk.
///
/// A view never owns anything: its data, validity, and child vectors all
/// alias memory owned by the enclosing chunk, and the `'chunk` lifetime pins
/// every derived slice inside the accessor scope that produced the view.
///
/// The `Default` view is unbound; every operation on it fails (type mismatch
/// for typed slices, bounds errors elsewhere) rather than touching memory.
#[derive(Copy, Clone)]
pub struct VectorView<'chunk> {
    api: Option<&'static Api>,
    vector: *mut sys::strata_vector,
    descriptor: ColumnDescriptor,
    len: usize,
    _chunk: PhantomData<&'chunk ()>,
}

impl Default for VectorView<'_> {
    fn default() -> Self {
        Self {
            api: None,
            vector: std::ptr::null_mut(),
            descriptor: ColumnDescriptor::default(),
            len: 0,
            _chunk: PhantomData,
        }
    }
}

impl<'chunk> VectorView<'chunk> {
    pub(crate) fn new(
        api: &'static Api,
        vector: *mut sys::strata_vector,
        descriptor: ColumnDescriptor,
        len: usize,
    ) -> Self {
        Self {
            api: Some(api),
            vector,
            descriptor,
            len,
            _chunk: PhantomData,
        }
    }

    /// Number of rows in this view. For a list-child view this is the total
    /// child count across the whole chunk, not the chunk length.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn descriptor(&self) -> ColumnDescriptor {
        self.descriptor
    }

    fn parts(&self) -> Result<(&'static Api, *mut sys::strata_vector)> {
        match self.api {
            Some(api) if !self.vector.is_null() => Ok((api, self.vector)),
            _ => Err(Error::OutOfBounds {
                what: "unbound vector view",
                index: 0,
                len: 0,
            }),
        }
    }

    fn mismatch(&self, requested: &'static str) -> Error {
        Error::TypeMismatch {
            kind: self.descriptor.value_kind(),
            storage: self.descriptor.storage_kind(),
            requested,
        }
    }

    /// The raw data buffer as a typed read-only slice.
    ///
    /// Succeeds only when `T` is the exact in-memory representation of the
    /// column's physical storage; anything else (including an unbound
    /// default view, whose storage is `Unknown`) is a type mismatch.
    pub fn as_slice<T: NativeType>(&self) -> Result<&'chunk [T]> {
        if !T::matches(self.descriptor.storage_kind()) {
            return Err(self.mismatch(type_name::<T>()));
        }
        let (api, vector) = self.parts()?;
        let data = unsafe { (api.strata_vector_data)(vector) } as *const T;
        if data.is_null() {
            // A missing buffer is only legitimate for an empty vector;
            // anything else would turn row indexing into a panic.
            if self.len == 0 {
                return Ok(&[]);
            }
            return Err(Error::Engine(
                "engine returned a null data buffer for a non-empty vector".into(),
            ));
        }
        Ok(unsafe { slice::from_raw_parts(data, self.len) })
    }

    /// The validity bitmap, one word per 64 rows, bit set = row valid.
    /// Empty when the engine reports no bitmap, meaning every row is valid.
    pub fn validity(&self) -> Result<&'chunk [u64]> {
        let (api, vector) = self.parts()?;
        let bits = unsafe { (api.strata_vector_validity)(vector) };
        if bits.is_null() {
            return Ok(&[]);
        }
        Ok(unsafe { slice::from_raw_parts(bits, self.len.div_ceil(64)) })
    }

    /// Whether `row` holds a non-null value.
    pub fn is_valid(&self, row: usize) -> Result<bool> {
        if row >= self.len {
            return Err(Error::OutOfBounds {
                what: "row",
                index: row,
                len: self.len,
            });
        }
        let validity = self.validity()?;
        if validity.is_empty() {
            return Ok(true);
        }
        Ok(validity[row / 64] >> (row % 64) & 1 == 1)
    }

    /// Raw per-row (offset, length) windows of a list column.
    pub fn list_entries(&self) -> Result<&'chunk [ListEntry]> {
        if self.descriptor.value_kind() != ValueKind::List {
            return Err(self.mismatch("list entries"));
        }
        self.as_slice::<ListEntry>()
    }

    /// The shared children vector of a list or array column.
    ///
    /// For lists the returned view spans every child element of the chunk;
    /// rows address into it through [`list_entries`](Self::list_entries).
    /// For arrays children are laid out back to back, `element_size` per row.
    pub fn list_child(&self) -> Result<VectorView<'chunk>> {
        let kind = self.descriptor.value_kind();
        if !matches!(kind, ValueKind::List | ValueKind::Array) {
            return Err(self.mismatch("list child vector"));
        }
        let (api, vector) = self.parts()?;
        let child = unsafe { (api.strata_vector_list_child)(vector) };
        if child.is_null() {
            return Err(Error::Engine(
                "engine returned a null list child vector".into(),
            ));
        }
        let child_len = match kind {
            ValueKind::List => (unsafe { (api.strata_vector_list_size)(vector) }) as usize,
            _ => self.len * self.descriptor.element_size() as usize,
        };
        let descriptor = unsafe { ColumnDescriptor::from_vector(api, child) };
        Ok(VectorView::new(api, child, descriptor, child_len))
    }

    /// The child vector of one struct member. Struct children share the
    /// parent's row indexing; there is no offset/length indirection.
    pub fn struct_child(&self, member: usize) -> Result<VectorView<'chunk>> {
        if self.descriptor.value_kind() != ValueKind::Struct {
            return Err(self.mismatch("struct child vector"));
        }
        let members = self.descriptor.element_size() as usize;
        if member >= members {
            return Err(Error::OutOfBounds {
                what: "struct member",
                index: member,
                len: members,
            });
        }
        let (api, vector) = self.parts()?;
        let child = unsafe { (api.strata_vector_struct_child)(vector, member as idx_t) };
        if child.is_null() {
            return Err(Error::OutOfBounds {
                what: "struct member",
                index: member,
                len: members,
            });
        }
        let descriptor = unsafe { ColumnDescriptor::from_vector(api, child) };
        Ok(VectorView::new(api, child, descriptor, self.len))
    }

    /// The member-name dictionary of an enum column.
    pub fn enum_dictionary(&self) -> Result<EnumDictionary> {
        if self.descriptor.value_kind() != ValueKind::Enum {
            return Err(self.mismatch("enum dictionary"));
        }
        let (api, _) = self.parts()?;
        let ty = self.logical_type()?;
        Ok(EnumDictionary::new(
            api,
            ty,
            self.descriptor.element_size() as usize,
        ))
    }

    /// Convert one row through the type-conversion dispatch.
    ///
    /// Returns `None` for a null row; otherwise resolves a reader for `T`
    /// against the column's descriptor and decodes the row.
    pub fn get<T: FromVector<'chunk>>(&self, row: usize) -> Result<Option<T>> {
        if !self.is_valid(row)? {
            return Ok(None);
        }
        T::from_vector(self, row).map(Some)
    }

    /// This vector's logical type, freshly acquired from the engine.
    pub(crate) fn logical_type(&self) -> Result<LogicalType> {
        let (api, vector) = self.parts()?;
        let handle = unsafe { (api.strata_vector_logical_type)(vector) };
        if handle.is_null() {
            return Err(Error::Engine(
                "engine returned a null logical type handle".into(),
            ));
        }
        Ok(unsafe { LogicalType::from_owned(api, handle) })
    }

    pub(crate) fn api(&self) -> Option<&'static Api> {
        self.api
    }
}
