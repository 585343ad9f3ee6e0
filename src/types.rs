//! Column type descriptions.
//!
//! A [`ColumnDescriptor`] is a by-value, heap-free summary of a column's
//! logical kind and physical storage, derived once from the engine's type
//! system and then usable without further foreign calls.

use std::fmt;

use crate::api::Api;
use crate::logical::LogicalType;
use crate::sys::{self, idx_t};

pub use crate::sys::{
    strata_date as Date, strata_hugeint as Hugeint, strata_interval as Interval,
    strata_list_entry as ListEntry, strata_time as Time, strata_timestamp as Timestamp,
};

/// Logical kind of a column's values.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum ValueKind {
    Invalid,
    Boolean,
    TinyInt,
    SmallInt,
    Integer,
    BigInt,
    UTinyInt,
    USmallInt,
    UInteger,
    UBigInt,
    HugeInt,
    Float,
    Double,
    Decimal,
    Varchar,
    Blob,
    Date,
    Time,
    Timestamp,
    Interval,
    Enum,
    List,
    Struct,
    Array,
    Union,
    Bit,
    Uuid,
    Varint,
}

impl ValueKind {
    pub(crate) fn from_tag(tag: sys::strata_type_tag) -> Self {
        match tag {
            sys::STRATA_TYPE_BOOLEAN => Self::Boolean,
            sys::STRATA_TYPE_TINYINT => Self::TinyInt,
            sys::STRATA_TYPE_SMALLINT => Self::SmallInt,
            sys::STRATA_TYPE_INTEGER => Self::Integer,
            sys::STRATA_TYPE_BIGINT => Self::BigInt,
            sys::STRATA_TYPE_UTINYINT => Self::UTinyInt,
            sys::STRATA_TYPE_USMALLINT => Self::USmallInt,
            sys::STRATA_TYPE_UINTEGER => Self::UInteger,
            sys::STRATA_TYPE_UBIGINT => Self::UBigInt,
            sys::STRATA_TYPE_HUGEINT => Self::HugeInt,
            sys::STRATA_TYPE_FLOAT => Self::Float,
            sys::STRATA_TYPE_DOUBLE => Self::Double,
            sys::STRATA_TYPE_DECIMAL => Self::Decimal,
            sys::STRATA_TYPE_VARCHAR => Self::Varchar,
            sys::STRATA_TYPE_BLOB => Self::Blob,
            sys::STRATA_TYPE_DATE => Self::Date,
            sys::STRATA_TYPE_TIME => Self::Time,
            sys::STRATA_TYPE_TIMESTAMP => Self::Timestamp,
            sys::STRATA_TYPE_INTERVAL => Self::Interval,
            sys::STRATA_TYPE_ENUM => Self::Enum,
            sys::STRATA_TYPE_LIST => Self::List,
            sys::STRATA_TYPE_STRUCT => Self::Struct,
            sys::STRATA_TYPE_ARRAY => Self::Array,
            sys::STRATA_TYPE_UNION => Self::Union,
            sys::STRATA_TYPE_BIT => Self::Bit,
            sys::STRATA_TYPE_UUID => Self::Uuid,
            sys::STRATA_TYPE_VARINT => Self::Varint,
            _ => Self::Invalid,
        }
    }

    /// Kinds whose descriptor needs supplementary fields from the engine's
    /// logical-type object. Everything else is fully described by the tag,
    /// which is what keeps primitive columns to a single foreign call.
    pub(crate) fn needs_type_info(self) -> bool {
        matches!(self, Self::Decimal | Self::Enum | Self::Array | Self::Struct)
    }

    /// Physical storage for kinds that don't need supplementary type info.
    fn default_storage(self) -> StorageKind {
        match self {
            Self::Boolean => StorageKind::Boolean,
            Self::TinyInt => StorageKind::Int8,
            Self::SmallInt => StorageKind::Int16,
            Self::Integer => StorageKind::Int32,
            Self::BigInt => StorageKind::Int64,
            Self::UTinyInt => StorageKind::UInt8,
            Self::USmallInt => StorageKind::UInt16,
            Self::UInteger => StorageKind::UInt32,
            Self::UBigInt => StorageKind::UInt64,
            Self::HugeInt | Self::Uuid => StorageKind::Int128,
            Self::Float => StorageKind::Float32,
            Self::Double => StorageKind::Float64,
            Self::Varchar | Self::Blob | Self::Bit | Self::Varint => StorageKind::String,
            Self::Date => StorageKind::Date,
            Self::Time => StorageKind::Time,
            Self::Timestamp => StorageKind::Timestamp,
            Self::Interval => StorageKind::Interval,
            Self::List => StorageKind::ListEntry,
            // Struct/array/union vectors carry no primary data buffer; their
            // payload lives in child vectors.
            Self::Struct | Self::Array | Self::Union => StorageKind::None,
            Self::Decimal | Self::Enum | Self::Invalid => StorageKind::Unknown,
        }
    }
}

/// Physical in-memory representation of a column's data buffer.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum StorageKind {
    /// Not known (invalid descriptor, or an unbound accessor).
    Unknown,
    /// No primary buffer (struct, array, union).
    None,
    /// One byte per row, 0 or 1.
    Boolean,
    Int8,
    Int16,
    Int32,
    Int64,
    Int128,
    UInt8,
    UInt16,
    UInt32,
    UInt64,
    Float32,
    Float64,
    Date,
    Time,
    Timestamp,
    Interval,
    /// 16-byte inline-or-pointer payload per row.
    String,
    /// (offset, length) pair per row into the shared children vector.
    ListEntry,
}

impl StorageKind {
    fn from_tag(tag: sys::strata_type_tag) -> Self {
        ValueKind::from_tag(tag).default_storage()
    }
}

/// Smallest integer storage holding `width` decimal digits.
pub fn decimal_storage_for_width(width: u8) -> StorageKind {
    match width {
        0..=4 => StorageKind::Int16,
        5..=9 => StorageKind::Int32,
        10..=18 => StorageKind::Int64,
        _ => StorageKind::Int128,
    }
}

/// By-value summary of one column's type.
///
/// `decimal_scale` and `element_size` are zero unless the value kind gives
/// them meaning: scale for decimals; dictionary size for enums; fixed size
/// for arrays; member count for structs.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct ColumnDescriptor {
    value_kind: ValueKind,
    storage_kind: StorageKind,
    decimal_scale: u8,
    element_size: u64,
}

impl ColumnDescriptor {
    pub fn value_kind(&self) -> ValueKind {
        self.value_kind
    }

    pub fn storage_kind(&self) -> StorageKind {
        self.storage_kind
    }

    pub fn decimal_scale(&self) -> u8 {
        self.decimal_scale
    }

    pub fn element_size(&self) -> u64 {
        self.element_size
    }

    fn simple(kind: ValueKind) -> Self {
        Self {
            value_kind: kind,
            storage_kind: kind.default_storage(),
            decimal_scale: 0,
            element_size: 0,
        }
    }

    /// Descriptor for one column of a result.
    ///
    /// # Safety
    ///
    /// `result` must be a live result handle and `col` in range.
    pub(crate) unsafe fn from_result(
        api: &'static Api,
        result: *mut sys::strata_result,
        col: idx_t,
    ) -> Self {
        let kind = ValueKind::from_tag((api.strata_result_column_type)(result, col));
        if !kind.needs_type_info() {
            return Self::simple(kind);
        }
        // Supplementary fields need a type handle; acquire one and release
        // it as soon as the copies are made.
        let ty = LogicalType::from_owned(api, (api.strata_result_column_logical_type)(result, col));
        Self::with_type_info(api, kind, ty.raw())
    }

    /// Descriptor for a vector's type, via its owned logical-type handle.
    ///
    /// # Safety
    ///
    /// `vector` must be a live vector handle.
    pub(crate) unsafe fn from_vector(api: &'static Api, vector: *mut sys::strata_vector) -> Self {
        let ty = LogicalType::from_owned(api, (api.strata_vector_logical_type)(vector));
        Self::from_borrowed_type(api, ty.raw())
    }

    /// Descriptor from a borrowed type handle. The handle is read, never
    /// destroyed.
    ///
    /// # Safety
    ///
    /// `ty` must be a live logical-type handle.
    pub(crate) unsafe fn from_borrowed_type(
        api: &'static Api,
        ty: *mut sys::strata_logical_type,
    ) -> Self {
        let kind = ValueKind::from_tag((api.strata_type_id)(ty));
        if !kind.needs_type_info() {
            return Self::simple(kind);
        }
        Self::with_type_info(api, kind, ty)
    }

    unsafe fn with_type_info(
        api: &'static Api,
        kind: ValueKind,
        ty: *mut sys::strata_logical_type,
    ) -> Self {
        match kind {
            ValueKind::Decimal => Self {
                value_kind: kind,
                storage_kind: decimal_storage_for_width((api.strata_decimal_width)(ty)),
                decimal_scale: (api.strata_decimal_scale)(ty),
                element_size: 0,
            },
            ValueKind::Enum => Self {
                value_kind: kind,
                storage_kind: StorageKind::from_tag((api.strata_enum_storage_type)(ty)),
                decimal_scale: 0,
                element_size: (api.strata_enum_dictionary_size)(ty),
            },
            ValueKind::Array => Self {
                value_kind: kind,
                storage_kind: StorageKind::None,
                decimal_scale: 0,
                element_size: (api.strata_array_size)(ty),
            },
            ValueKind::Struct => Self {
                value_kind: kind,
                storage_kind: StorageKind::None,
                decimal_scale: 0,
                element_size: (api.strata_struct_child_count)(ty),
            },
            _ => Self::simple(kind),
        }
    }
}

impl Default for ColumnDescriptor {
    /// The unbound descriptor: matches no storage, so every typed access
    /// against it fails.
    fn default() -> Self {
        Self {
            value_kind: ValueKind::Invalid,
            storage_kind: StorageKind::Unknown,
            decimal_scale: 0,
            element_size: 0,
        }
    }
}

/// Exact decimal value: unscaled 128-bit integer plus scale.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct Decimal {
    pub value: i128,
    pub scale: u8,
}

impl Decimal {
    pub fn new(value: i128, scale: u8) -> Self {
        Self { value, scale }
    }
}

impl fmt::Display for Decimal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.scale == 0 {
            return write!(f, "{}", self.value);
        }
        let sign = if self.value < 0 { "-" } else { "" };
        let magnitude = self.value.unsigned_abs();
        let divisor = 10u128.pow(self.scale as u32);
        write!(
            f,
            "{sign}{}.{:0width$}",
            magnitude / divisor,
            magnitude % divisor,
            width = self.scale as usize
        )
    }
}
