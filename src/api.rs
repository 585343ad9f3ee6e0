//! Resolved Strata ABI entry points.
//!
//! The engine is consumed strictly through this table of plain function
//! pointers, resolved once from the loaded dynamic library. Keeping the ABI
//! behind a value table (rather than `extern` blocks) means the driver has no
//! link-time dependency on the engine and alternative tables can be wired in
//! for testing.

use libloading::{Library, Symbol};
use std::ffi::CStr;
use std::os::raw::{c_char, c_void};

use crate::sys::*;

/// Function-pointer table over the engine ABI, grouped by capability.
///
/// Ownership contract per pointer is noted where a call transfers a handle;
/// everything not marked "owned" returns a borrowed handle or pointer that
/// must never be destroyed by the caller.
pub struct Api {
    // ---- database ----
    pub strata_open: unsafe extern "C" fn(
        *const c_char,
        *mut *mut strata_database,
        *mut *mut c_char,
    ) -> strata_code,
    pub strata_close: unsafe extern "C" fn(*mut strata_database),
    pub strata_interrupt: unsafe extern "C" fn(*mut strata_database),
    pub strata_query: unsafe extern "C" fn(
        *mut strata_database,
        *const c_char,
        *mut *mut strata_result,
        *mut *mut c_char,
    ) -> strata_code,
    pub strata_string_free: unsafe extern "C" fn(*mut c_char),

    // ---- result cursor ----
    pub strata_result_column_count: unsafe extern "C" fn(*mut strata_result) -> idx_t,
    /// Borrowed; valid while the result handle lives.
    pub strata_result_column_name:
        unsafe extern "C" fn(*mut strata_result, idx_t) -> *const c_char,
    pub strata_result_column_type:
        unsafe extern "C" fn(*mut strata_result, idx_t) -> strata_type_tag,
    /// Owned; destroy via `strata_type_destroy`.
    pub strata_result_column_logical_type:
        unsafe extern "C" fn(*mut strata_result, idx_t) -> *mut strata_logical_type,
    /// Owned; null once the cursor is exhausted. Destroy via `strata_chunk_destroy`.
    pub strata_result_fetch_chunk:
        unsafe extern "C" fn(*mut strata_result) -> *mut strata_chunk,
    pub strata_result_destroy: unsafe extern "C" fn(*mut strata_result),

    // ---- chunk / vector handles ----
    pub strata_chunk_row_count: unsafe extern "C" fn(*mut strata_chunk) -> idx_t,
    pub strata_chunk_column_count: unsafe extern "C" fn(*mut strata_chunk) -> idx_t,
    /// Borrowed; null when the index is out of range or the chunk is null.
    pub strata_chunk_vector:
        unsafe extern "C" fn(*mut strata_chunk, idx_t) -> *mut strata_vector,
    pub strata_chunk_destroy: unsafe extern "C" fn(*mut strata_chunk),

    // ---- vector data ----
    pub strata_vector_data: unsafe extern "C" fn(*mut strata_vector) -> *const c_void,
    /// Null means every row is valid.
    pub strata_vector_validity: unsafe extern "C" fn(*mut strata_vector) -> *const u64,
    /// Owned; destroy via `strata_type_destroy`.
    pub strata_vector_logical_type:
        unsafe extern "C" fn(*mut strata_vector) -> *mut strata_logical_type,
    /// Borrowed child vector shared by every list row of the chunk.
    pub strata_vector_list_child:
        unsafe extern "C" fn(*mut strata_vector) -> *mut strata_vector,
    /// Total number of child elements across all rows.
    pub strata_vector_list_size: unsafe extern "C" fn(*mut strata_vector) -> idx_t,
    /// Borrowed; null when the member index is out of range.
    pub strata_vector_struct_child:
        unsafe extern "C" fn(*mut strata_vector, idx_t) -> *mut strata_vector,

    // ---- logical type ----
    pub strata_type_id: unsafe extern "C" fn(*mut strata_logical_type) -> strata_type_tag,
    pub strata_type_destroy: unsafe extern "C" fn(*mut strata_logical_type),
    pub strata_decimal_width: unsafe extern "C" fn(*mut strata_logical_type) -> u8,
    pub strata_decimal_scale: unsafe extern "C" fn(*mut strata_logical_type) -> u8,
    pub strata_enum_storage_type:
        unsafe extern "C" fn(*mut strata_logical_type) -> strata_type_tag,
    pub strata_enum_dictionary_size:
        unsafe extern "C" fn(*mut strata_logical_type) -> idx_t,
    /// Owned string; free via `strata_string_free`. Null for bad ordinals.
    pub strata_enum_dictionary_value:
        unsafe extern "C" fn(*mut strata_logical_type, idx_t) -> *mut c_char,
    pub strata_struct_child_count:
        unsafe extern "C" fn(*mut strata_logical_type) -> idx_t,
    /// Owned string; free via `strata_string_free`. Null for bad indexes.
    pub strata_struct_child_name:
        unsafe extern "C" fn(*mut strata_logical_type, idx_t) -> *mut c_char,
    /// Owned; destroy via `strata_type_destroy`.
    pub strata_struct_child_type:
        unsafe extern "C" fn(*mut strata_logical_type, idx_t) -> *mut strata_logical_type,
    pub strata_array_size: unsafe extern "C" fn(*mut strata_logical_type) -> idx_t,
}

impl Api {
    /// Resolve every ABI symbol from `lib`.
    ///
    /// # Safety
    ///
    /// `lib` must be a Strata engine library whose exported symbols match the
    /// signatures declared on this struct.
    pub unsafe fn load(lib: &Library) -> Result<Self, libloading::Error> {
        unsafe fn get<T: Copy>(
            lib: &Library,
            name: &'static [u8],
        ) -> Result<T, libloading::Error> {
            let sym: Symbol<T> = lib.get::<T>(name)?;
            Ok(*sym)
        }
        macro_rules! sym {
            ($name:ident) => {
                get(lib, concat!(stringify!($name), "\0").as_bytes())?
            };
        }
        Ok(Self {
            strata_open: sym!(strata_open),
            strata_close: sym!(strata_close),
            strata_interrupt: sym!(strata_interrupt),
            strata_query: sym!(strata_query),
            strata_string_free: sym!(strata_string_free),
            strata_result_column_count: sym!(strata_result_column_count),
            strata_result_column_name: sym!(strata_result_column_name),
            strata_result_column_type: sym!(strata_result_column_type),
            strata_result_column_logical_type: sym!(strata_result_column_logical_type),
            strata_result_fetch_chunk: sym!(strata_result_fetch_chunk),
            strata_result_destroy: sym!(strata_result_destroy),
            strata_chunk_row_count: sym!(strata_chunk_row_count),
            strata_chunk_column_count: sym!(strata_chunk_column_count),
            strata_chunk_vector: sym!(strata_chunk_vector),
            strata_chunk_destroy: sym!(strata_chunk_destroy),
            strata_vector_data: sym!(strata_vector_data),
            strata_vector_validity: sym!(strata_vector_validity),
            strata_vector_logical_type: sym!(strata_vector_logical_type),
            strata_vector_list_child: sym!(strata_vector_list_child),
            strata_vector_list_size: sym!(strata_vector_list_size),
            strata_vector_struct_child: sym!(strata_vector_struct_child),
            strata_type_id: sym!(strata_type_id),
            strata_type_destroy: sym!(strata_type_destroy),
            strata_decimal_width: sym!(strata_decimal_width),
            strata_decimal_scale: sym!(strata_decimal_scale),
            strata_enum_storage_type: sym!(strata_enum_storage_type),
            strata_enum_dictionary_size: sym!(strata_enum_dictionary_size),
            strata_enum_dictionary_value: sym!(strata_enum_dictionary_value),
            strata_struct_child_count: sym!(strata_struct_child_count),
            strata_struct_child_name: sym!(strata_struct_child_name),
            strata_struct_child_type: sym!(strata_struct_child_type),
            strata_array_size: sym!(strata_array_size),
        })
    }

    /// Copy an engine-allocated C string and free it. Empty for null.
    pub(crate) unsafe fn take_string(&self, ptr: *mut c_char) -> String {
        take_string_with(self.strata_string_free, ptr)
    }
}

pub(crate) unsafe fn take_string_with(
    free: unsafe extern "C" fn(*mut c_char),
    ptr: *mut c_char,
) -> String {
    if ptr.is_null() {
        return String::new();
    }
    let s = CStr::from_ptr(ptr).to_string_lossy().into_owned();
    free(ptr);
    s
}
