//! Row-value conversion: typed extraction and dynamic decoding.
//!
//! Two layers share the same dispatch rules. [`FromVector`] resolves a
//! conversion for one Rust type against a column descriptor, erroring with
//! both sides of any mismatch. [`ColumnReader`] resolves the whole column
//! shape once (recursing into list, array, and struct children) and then
//! decodes rows into [`Value`] without further type negotiation.

use std::any::type_name;
use std::sync::Arc;

use crate::error::{Error, Result};
use crate::logical::EnumDictionary;
use crate::sys;
use crate::types::{
    Date, Decimal, Hugeint, Interval, ListEntry, StorageKind, Time, Timestamp, ValueKind,
};
use crate::vector::VectorView;

/// One decoded cell. Borrowing variants (`Varchar`, `Blob`) alias chunk
/// memory and carry the accessor-scope lifetime.
#[derive(Clone, Debug, PartialEq)]
pub enum Value<'chunk> {
    Null,
    Boolean(bool),
    TinyInt(i8),
    SmallInt(i16),
    Integer(i32),
    BigInt(i64),
    UTinyInt(u8),
    USmallInt(u16),
    UInteger(u32),
    UBigInt(u64),
    HugeInt(i128),
    Float(f32),
    Double(f64),
    Decimal(Decimal),
    Varchar(&'chunk str),
    Blob(&'chunk [u8]),
    Date(Date),
    Time(Time),
    Timestamp(Timestamp),
    Interval(Interval),
    Uuid(i128),
    Enum(Arc<str>),
    List(Vec<Value<'chunk>>),
    Struct(Vec<(Arc<str>, Value<'chunk>)>),
}

/// Conversion from one vector row into a concrete Rust type.
///
/// Implementations may assume `row` is in bounds and valid; null handling
/// lives in [`VectorView::get`].
pub trait FromVector<'chunk>: Sized {
    fn from_vector(view: &VectorView<'chunk>, row: usize) -> Result<Self>;
}

fn mismatch<T>(view: &VectorView<'_>) -> Error {
    Error::TypeMismatch {
        kind: view.descriptor().value_kind(),
        storage: view.descriptor().storage_kind(),
        requested: type_name::<T>(),
    }
}

macro_rules! from_vector_primitive {
    ($($t:ty),+ $(,)?) => {
        $(impl<'chunk> FromVector<'chunk> for $t {
            fn from_vector(view: &VectorView<'chunk>, row: usize) -> Result<Self> {
                Ok(view.as_slice::<$t>()?[row])
            }
        })+
    };
}

from_vector_primitive!(
    i8, i16, i32, i64, u16, u32, u64, f32, f64, Date, Time, Timestamp, Interval, Hugeint,
    ListEntry,
);

impl<'chunk> FromVector<'chunk> for u8 {
    fn from_vector(view: &VectorView<'chunk>, row: usize) -> Result<Self> {
        if view.descriptor().storage_kind() != StorageKind::UInt8 {
            return Err(mismatch::<u8>(view));
        }
        Ok(view.as_slice::<u8>()?[row])
    }
}

impl<'chunk> FromVector<'chunk> for bool {
    fn from_vector(view: &VectorView<'chunk>, row: usize) -> Result<Self> {
        if view.descriptor().storage_kind() != StorageKind::Boolean {
            return Err(mismatch::<bool>(view));
        }
        // Read the byte, not `bool`, in case the engine ever widens its
        // truthy encoding.
        Ok(view.as_slice::<u8>()?[row] != 0)
    }
}

impl<'chunk> FromVector<'chunk> for i128 {
    fn from_vector(view: &VectorView<'chunk>, row: usize) -> Result<Self> {
        Ok(view.as_slice::<Hugeint>()?[row].to_i128())
    }
}

impl<'chunk> FromVector<'chunk> for &'chunk str {
    fn from_vector(view: &VectorView<'chunk>, row: usize) -> Result<Self> {
        if view.descriptor().value_kind() != ValueKind::Varchar {
            return Err(mismatch::<&str>(view));
        }
        let raw = view.as_slice::<sys::strata_string>()?;
        let bytes = unsafe { raw[row].as_bytes() };
        std::str::from_utf8(bytes)
            .map_err(|_| Error::Engine("engine returned non-UTF-8 varchar data".into()))
    }
}

impl<'chunk> FromVector<'chunk> for &'chunk [u8] {
    fn from_vector(view: &VectorView<'chunk>, row: usize) -> Result<Self> {
        if !matches!(
            view.descriptor().value_kind(),
            ValueKind::Varchar | ValueKind::Blob | ValueKind::Bit | ValueKind::Varint
        ) {
            return Err(mismatch::<&[u8]>(view));
        }
        let raw = view.as_slice::<sys::strata_string>()?;
        Ok(unsafe { raw[row].as_bytes() })
    }
}

/// An enum row's ordinal, read at whichever width the dictionary declared.
fn enum_code<T>(view: &VectorView<'_>, row: usize) -> Result<usize> {
    match view.descriptor().storage_kind() {
        StorageKind::UInt8 => Ok(view.as_slice::<u8>()?[row] as usize),
        StorageKind::UInt16 => Ok(view.as_slice::<u16>()?[row] as usize),
        StorageKind::UInt32 => Ok(view.as_slice::<u32>()?[row] as usize),
        _ => Err(mismatch::<T>(view)),
    }
}

impl<'chunk> FromVector<'chunk> for String {
    /// Varchar text, or an enum member name resolved through the dictionary.
    ///
    /// Each enum call builds a fresh dictionary; decode whole columns through
    /// [`ColumnReader`], which resolves it once.
    fn from_vector(view: &VectorView<'chunk>, row: usize) -> Result<Self> {
        match view.descriptor().value_kind() {
            ValueKind::Enum => {
                let code = enum_code::<String>(view, row)?;
                view.enum_dictionary()?.name(code).map(|name| name.to_string())
            }
            _ => <&str>::from_vector(view, row).map(str::to_owned),
        }
    }
}

impl<'chunk> FromVector<'chunk> for Arc<str> {
    fn from_vector(view: &VectorView<'chunk>, row: usize) -> Result<Self> {
        match view.descriptor().value_kind() {
            ValueKind::Enum => {
                let code = enum_code::<Arc<str>>(view, row)?;
                view.enum_dictionary()?.name(code)
            }
            ValueKind::Varchar => <&str>::from_vector(view, row).map(Arc::from),
            _ => Err(mismatch::<Arc<str>>(view)),
        }
    }
}

impl<'chunk> FromVector<'chunk> for Decimal {
    fn from_vector(view: &VectorView<'chunk>, row: usize) -> Result<Self> {
        if view.descriptor().value_kind() != ValueKind::Decimal {
            return Err(mismatch::<Decimal>(view));
        }
        let unscaled = read_unscaled(view, row)?;
        Ok(Decimal::new(unscaled, view.descriptor().decimal_scale()))
    }
}

/// Widen a decimal's storage integer to `i128`, whichever width the column
/// declared.
fn read_unscaled(view: &VectorView<'_>, row: usize) -> Result<i128> {
    match view.descriptor().storage_kind() {
        StorageKind::Int16 => Ok(view.as_slice::<i16>()?[row] as i128),
        StorageKind::Int32 => Ok(view.as_slice::<i32>()?[row] as i128),
        StorageKind::Int64 => Ok(view.as_slice::<i64>()?[row] as i128),
        StorageKind::Int128 => Ok(view.as_slice::<Hugeint>()?[row].to_i128()),
        _ => Err(mismatch::<Decimal>(view)),
    }
}

impl<'chunk> FromVector<'chunk> for Value<'chunk> {
    fn from_vector(view: &VectorView<'chunk>, row: usize) -> Result<Self> {
        ColumnReader::new(*view)?.value(row)
    }
}

/// Per-column decoder resolved once, then applied per row.
///
/// Construction walks the column's type shape and performs whatever foreign
/// calls it needs (struct member names, enum dictionaries, child vectors);
/// [`value`](Self::value) afterwards touches only the resolved buffers.
pub struct ColumnReader<'chunk> {
    view: VectorView<'chunk>,
    decode: Decode<'chunk>,
}

enum Decode<'chunk> {
    Boolean,
    Int8,
    Int16,
    Int32,
    Int64,
    UInt8,
    UInt16,
    UInt32,
    UInt64,
    HugeInt,
    Uuid,
    Float32,
    Float64,
    Date,
    Time,
    Timestamp,
    Interval,
    Varchar,
    Blob,
    Decimal,
    Enum(Arc<EnumDictionary>),
    List(Box<ColumnReader<'chunk>>),
    Array {
        element: Box<ColumnReader<'chunk>>,
        size: usize,
    },
    Struct(Vec<StructMember<'chunk>>),
}

struct StructMember<'chunk> {
    name: Arc<str>,
    reader: ColumnReader<'chunk>,
}

impl<'chunk> ColumnReader<'chunk> {
    /// Resolve a dynamic decoder for `view`'s column.
    ///
    /// # Errors
    ///
    /// [`Error::TypeMismatch`] for kinds with no dynamic representation
    /// (invalid columns, unions).
    pub fn new(view: VectorView<'chunk>) -> Result<Self> {
        let decode = match view.descriptor().value_kind() {
            ValueKind::Boolean => Decode::Boolean,
            ValueKind::TinyInt => Decode::Int8,
            ValueKind::SmallInt => Decode::Int16,
            ValueKind::Integer => Decode::Int32,
            ValueKind::BigInt => Decode::Int64,
            ValueKind::UTinyInt => Decode::UInt8,
            ValueKind::USmallInt => Decode::UInt16,
            ValueKind::UInteger => Decode::UInt32,
            ValueKind::UBigInt => Decode::UInt64,
            ValueKind::HugeInt => Decode::HugeInt,
            ValueKind::Uuid => Decode::Uuid,
            ValueKind::Float => Decode::Float32,
            ValueKind::Double => Decode::Float64,
            ValueKind::Date => Decode::Date,
            ValueKind::Time => Decode::Time,
            ValueKind::Timestamp => Decode::Timestamp,
            ValueKind::Interval => Decode::Interval,
            ValueKind::Varchar => Decode::Varchar,
            ValueKind::Blob | ValueKind::Bit | ValueKind::Varint => Decode::Blob,
            ValueKind::Decimal => Decode::Decimal,
            ValueKind::Enum => Decode::Enum(Arc::new(view.enum_dictionary()?)),
            ValueKind::List => Decode::List(Box::new(Self::new(view.list_child()?)?)),
            ValueKind::Array => Decode::Array {
                element: Box::new(Self::new(view.list_child()?)?),
                size: view.descriptor().element_size() as usize,
            },
            ValueKind::Struct => Decode::Struct(Self::struct_members(&view)?),
            ValueKind::Union | ValueKind::Invalid => {
                return Err(mismatch::<Value<'_>>(&view));
            }
        };
        Ok(Self { view, decode })
    }

    fn struct_members(view: &VectorView<'chunk>) -> Result<Vec<StructMember<'chunk>>> {
        let api = view
            .api()
            .ok_or(Error::Disposed("vector view backing store"))?;
        let ty = view.logical_type()?;
        let count = view.descriptor().element_size() as usize;
        let mut members = Vec::with_capacity(count);
        for index in 0..count {
            let raw = unsafe { (api.strata_struct_child_name)(ty.raw(), index as sys::idx_t) };
            if raw.is_null() {
                return Err(Error::Engine(format!(
                    "null name for struct member {index}"
                )));
            }
            let name = unsafe { api.take_string(raw) };
            members.push(StructMember {
                name: Arc::from(name),
                reader: Self::new(view.struct_child(index)?)?,
            });
        }
        Ok(members)
    }

    /// Decode one row.
    ///
    /// # Errors
    ///
    /// [`Error::OutOfBounds`] for a row past the column's length.
    pub fn value(&self, row: usize) -> Result<Value<'chunk>> {
        if !self.view.is_valid(row)? {
            return Ok(Value::Null);
        }
        Ok(match &self.decode {
            Decode::Boolean => Value::Boolean(self.view.as_slice::<u8>()?[row] != 0),
            Decode::Int8 => Value::TinyInt(self.view.as_slice::<i8>()?[row]),
            Decode::Int16 => Value::SmallInt(self.view.as_slice::<i16>()?[row]),
            Decode::Int32 => Value::Integer(self.view.as_slice::<i32>()?[row]),
            Decode::Int64 => Value::BigInt(self.view.as_slice::<i64>()?[row]),
            Decode::UInt8 => Value::UTinyInt(self.view.as_slice::<u8>()?[row]),
            Decode::UInt16 => Value::USmallInt(self.view.as_slice::<u16>()?[row]),
            Decode::UInt32 => Value::UInteger(self.view.as_slice::<u32>()?[row]),
            Decode::UInt64 => Value::UBigInt(self.view.as_slice::<u64>()?[row]),
            Decode::HugeInt => Value::HugeInt(self.view.as_slice::<Hugeint>()?[row].to_i128()),
            Decode::Uuid => Value::Uuid(self.view.as_slice::<Hugeint>()?[row].to_i128()),
            Decode::Float32 => Value::Float(self.view.as_slice::<f32>()?[row]),
            Decode::Float64 => Value::Double(self.view.as_slice::<f64>()?[row]),
            Decode::Date => Value::Date(self.view.as_slice::<Date>()?[row]),
            Decode::Time => Value::Time(self.view.as_slice::<Time>()?[row]),
            Decode::Timestamp => Value::Timestamp(self.view.as_slice::<Timestamp>()?[row]),
            Decode::Interval => Value::Interval(self.view.as_slice::<Interval>()?[row]),
            Decode::Varchar => Value::Varchar(<&str>::from_vector(&self.view, row)?),
            Decode::Blob => Value::Blob(<&[u8]>::from_vector(&self.view, row)?),
            Decode::Decimal => Value::Decimal(Decimal::from_vector(&self.view, row)?),
            Decode::Enum(dictionary) => {
                let code = enum_code::<Value<'_>>(&self.view, row)?;
                Value::Enum(dictionary.name(code)?)
            }
            Decode::List(child) => {
                let entry = self.view.list_entries()?[row];
                let mut items = Vec::with_capacity(entry.length as usize);
                for offset in entry.offset..entry.offset + entry.length {
                    items.push(child.value(offset as usize)?);
                }
                Value::List(items)
            }
            Decode::Array { element, size } => {
                let mut items = Vec::with_capacity(*size);
                for offset in row * size..(row + 1) * size {
                    items.push(element.value(offset)?);
                }
                Value::List(items)
            }
            Decode::Struct(members) => {
                let mut fields = Vec::with_capacity(members.len());
                for member in members {
                    fields.push((Arc::clone(&member.name), member.reader.value(row)?));
                }
                Value::Struct(fields)
            }
        })
    }

    /// The column this reader decodes.
    pub fn view(&self) -> &VectorView<'chunk> {
        &self.view
    }
}

impl std::fmt::Debug for ColumnReader<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ColumnReader")
            .field("kind", &self.view.descriptor().value_kind())
            .finish_non_exhaustive()
    }
}
