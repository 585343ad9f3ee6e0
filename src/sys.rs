//! `#[repr(C)]` data types of the Strata engine ABI.
//!
//! Everything here mirrors the engine's C header byte for byte: opaque handle
//! structs, the result-code enum, logical-type tags, and the fixed-layout
//! value structs that appear inside vector data buffers.

#![allow(non_camel_case_types)]

use std::fmt;
use std::slice;

/// Row/column index type used throughout the ABI.
pub type idx_t = u64;

/// Logical-type tag as reported by `strata_type_id` and the per-column kind
/// query. Unknown tags must be tolerated (forward compatibility), so this is
/// a plain integer rather than a Rust enum.
pub type strata_type_tag = u32;

pub const STRATA_TYPE_INVALID: strata_type_tag = 0;
pub const STRATA_TYPE_BOOLEAN: strata_type_tag = 1;
pub const STRATA_TYPE_TINYINT: strata_type_tag = 2;
pub const STRATA_TYPE_SMALLINT: strata_type_tag = 3;
pub const STRATA_TYPE_INTEGER: strata_type_tag = 4;
pub const STRATA_TYPE_BIGINT: strata_type_tag = 5;
pub const STRATA_TYPE_UTINYINT: strata_type_tag = 6;
pub const STRATA_TYPE_USMALLINT: strata_type_tag = 7;
pub const STRATA_TYPE_UINTEGER: strata_type_tag = 8;
pub const STRATA_TYPE_UBIGINT: strata_type_tag = 9;
pub const STRATA_TYPE_HUGEINT: strata_type_tag = 10;
pub const STRATA_TYPE_FLOAT: strata_type_tag = 11;
pub const STRATA_TYPE_DOUBLE: strata_type_tag = 12;
pub const STRATA_TYPE_DECIMAL: strata_type_tag = 13;
pub const STRATA_TYPE_VARCHAR: strata_type_tag = 14;
pub const STRATA_TYPE_BLOB: strata_type_tag = 15;
pub const STRATA_TYPE_DATE: strata_type_tag = 16;
pub const STRATA_TYPE_TIME: strata_type_tag = 17;
pub const STRATA_TYPE_TIMESTAMP: strata_type_tag = 18;
pub const STRATA_TYPE_INTERVAL: strata_type_tag = 19;
pub const STRATA_TYPE_ENUM: strata_type_tag = 20;
pub const STRATA_TYPE_LIST: strata_type_tag = 21;
pub const STRATA_TYPE_STRUCT: strata_type_tag = 22;
pub const STRATA_TYPE_ARRAY: strata_type_tag = 23;
pub const STRATA_TYPE_UNION: strata_type_tag = 24;
pub const STRATA_TYPE_BIT: strata_type_tag = 25;
pub const STRATA_TYPE_UUID: strata_type_tag = 26;
pub const STRATA_TYPE_VARINT: strata_type_tag = 27;

/// Result codes returned by fallible ABI functions.
#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum strata_code {
    STRATA_OK = 0,
    STRATA_ERROR = -1,
}

#[repr(C)]
pub struct strata_database {
    _private: [u8; 0],
}
#[repr(C)]
pub struct strata_result {
    _private: [u8; 0],
}
#[repr(C)]
pub struct strata_chunk {
    _private: [u8; 0],
}
#[repr(C)]
pub struct strata_vector {
    _private: [u8; 0],
}
#[repr(C)]
pub struct strata_logical_type {
    _private: [u8; 0],
}

/// `DATE` storage: days since the epoch.
#[repr(C)]
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct strata_date {
    pub days: i32,
}

/// `TIME` storage: microseconds since midnight.
#[repr(C)]
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct strata_time {
    pub micros: i64,
}

/// `TIMESTAMP` storage: microseconds since the epoch.
#[repr(C)]
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct strata_timestamp {
    pub micros: i64,
}

/// `INTERVAL` storage. The three components are independent; the engine never
/// normalizes between them.
#[repr(C)]
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct strata_interval {
    pub months: i32,
    pub days: i32,
    pub micros: i64,
}

/// 128-bit integer storage (`HUGEINT`, `UUID`, wide `DECIMAL`), split into
/// two 64-bit halves to keep the layout identical on every platform.
#[repr(C)]
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct strata_hugeint {
    pub lower: u64,
    pub upper: i64,
}

impl strata_hugeint {
    pub fn to_i128(self) -> i128 {
        ((self.upper as i128) << 64) | self.lower as i128
    }

    pub fn from_i128(v: i128) -> Self {
        Self {
            lower: v as u64,
            upper: (v >> 64) as i64,
        }
    }
}

/// `LIST` storage: per-row window into the shared children vector.
#[repr(C)]
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct strata_list_entry {
    pub offset: u64,
    pub length: u64,
}

/// Inline capacity of [`strata_string`]. Payloads up to this length live
/// entirely inside the 16-byte struct.
pub const STRATA_STRING_INLINE_CAP: usize = 12;

#[repr(C)]
#[derive(Copy, Clone)]
pub struct strata_string_inlined {
    pub length: u32,
    pub inlined: [u8; STRATA_STRING_INLINE_CAP],
}

#[repr(C)]
#[derive(Copy, Clone)]
pub struct strata_string_pointer {
    pub length: u32,
    pub prefix: [u8; 4],
    pub ptr: *const u8,
}

/// `VARCHAR`/`BLOB` storage: 16 bytes per row, either fully inlined or a
/// (prefix, pointer) pair into chunk-owned heap memory.
#[repr(C)]
#[derive(Copy, Clone)]
pub union strata_string {
    pub inlined: strata_string_inlined,
    pub pointer: strata_string_pointer,
}

impl strata_string {
    pub fn len(&self) -> usize {
        // `length` occupies the same leading bytes in both variants.
        unsafe { self.inlined.length as usize }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// View the payload bytes.
    ///
    /// # Safety
    ///
    /// For out-of-line payloads the caller must guarantee the owning chunk is
    /// still alive; the returned slice aliases chunk-owned memory.
    pub unsafe fn as_bytes(&self) -> &[u8] {
        let len = self.len();
        if len <= STRATA_STRING_INLINE_CAP {
            &self.inlined.inlined[..len]
        } else {
            slice::from_raw_parts(self.pointer.ptr, len)
        }
    }
}

impl fmt::Debug for strata_string {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("strata_string")
            .field("length", &self.len())
            .finish()
    }
}
