//! In-process stand-in for the engine library.
//!
//! The driver consumes the engine strictly through a table of function
//! pointers, so tests can wire up a table whose entries are ordinary Rust
//! functions backed by the structures below. Handle pointers crossing the
//! table are `Box`es of mock objects; ownership follows the real ABI
//! contract (owned handles are freed by the matching destroy entry,
//! borrowed handles alias their owner).
#![allow(dead_code)]

use std::collections::VecDeque;
use std::ffi::CString;
use std::os::raw::{c_char, c_void};
use std::ptr::{self, NonNull};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::OnceLock;

use parking_lot::Mutex;

use strata::api::Api;
use strata::sys::*;
use strata::Database;

/// Mirror of the engine's logical-type object.
#[derive(Clone, Default)]
pub struct MockType {
    pub tag: strata_type_tag,
    pub width: u8,
    pub scale: u8,
    pub storage: strata_type_tag,
    pub array_size: u64,
    pub enum_names: Vec<CString>,
    pub members: Vec<(CString, MockType)>,
    pub child: Option<Box<MockType>>,
}

impl MockType {
    pub fn simple(tag: strata_type_tag) -> Self {
        Self {
            tag,
            ..Self::default()
        }
    }

    pub fn decimal(width: u8, scale: u8) -> Self {
        Self {
            tag: STRATA_TYPE_DECIMAL,
            width,
            scale,
            ..Self::default()
        }
    }

    pub fn enumeration(names: &[&str]) -> Self {
        Self {
            tag: STRATA_TYPE_ENUM,
            storage: STRATA_TYPE_UTINYINT,
            enum_names: names.iter().map(|n| CString::new(*n).unwrap()).collect(),
            ..Self::default()
        }
    }

    pub fn list(child: MockType) -> Self {
        Self {
            tag: STRATA_TYPE_LIST,
            child: Some(Box::new(child)),
            ..Self::default()
        }
    }

    pub fn array(child: MockType, size: u64) -> Self {
        Self {
            tag: STRATA_TYPE_ARRAY,
            array_size: size,
            child: Some(Box::new(child)),
            ..Self::default()
        }
    }

    pub fn structure(members: Vec<(&str, MockType)>) -> Self {
        Self {
            tag: STRATA_TYPE_STRUCT,
            members: members
                .into_iter()
                .map(|(n, t)| (CString::new(n).unwrap(), t))
                .collect(),
            ..Self::default()
        }
    }
}

/// One column's worth of data inside a chunk. The `data` buffer is held as
/// `u64` words so every storage type the driver casts to stays aligned.
#[derive(Default)]
pub struct MockVector {
    pub ty: MockType,
    pub data: Vec<u64>,
    /// Backing store for out-of-line string payloads; boxed so pointers
    /// survive later pushes.
    pub heap: Vec<Box<[u8]>>,
    pub validity: Option<Vec<u64>>,
    pub list_child: Option<Box<MockVector>>,
    pub list_size: u64,
    pub struct_children: Vec<MockVector>,
}

fn pack<T: Copy>(values: &[T]) -> Vec<u64> {
    let bytes = std::mem::size_of_val(values);
    let mut words = vec![0u64; bytes.div_ceil(8)];
    unsafe {
        ptr::copy_nonoverlapping(
            values.as_ptr() as *const u8,
            words.as_mut_ptr() as *mut u8,
            bytes,
        );
    }
    words
}

fn validity_words(valid: &[bool]) -> Vec<u64> {
    let mut words = vec![0u64; valid.len().div_ceil(64)];
    for (row, ok) in valid.iter().enumerate() {
        if *ok {
            words[row / 64] |= 1 << (row % 64);
        }
    }
    words
}

fn make_string(heap: &mut Vec<Box<[u8]>>, payload: &[u8]) -> strata_string {
    let length = payload.len() as u32;
    if payload.len() <= STRATA_STRING_INLINE_CAP {
        let mut inlined = [0u8; STRATA_STRING_INLINE_CAP];
        inlined[..payload.len()].copy_from_slice(payload);
        strata_string {
            inlined: strata_string_inlined { length, inlined },
        }
    } else {
        let boxed: Box<[u8]> = payload.into();
        let ptr = boxed.as_ptr();
        heap.push(boxed);
        let mut prefix = [0u8; 4];
        prefix.copy_from_slice(&payload[..4]);
        strata_string {
            pointer: strata_string_pointer {
                length,
                prefix,
                ptr,
            },
        }
    }
}

impl MockVector {
    pub fn primitive<T: Copy + Default>(tag: strata_type_tag, values: &[Option<T>]) -> Self {
        let raw: Vec<T> = values.iter().map(|v| v.unwrap_or_default()).collect();
        let valid: Vec<bool> = values.iter().map(Option::is_some).collect();
        Self {
            ty: MockType::simple(tag),
            data: pack(&raw),
            validity: valid
                .iter()
                .any(|v| !v)
                .then(|| validity_words(&valid)),
            ..Self::default()
        }
    }

    pub fn varchar(values: &[Option<&str>]) -> Self {
        let mut heap = Vec::new();
        let raw: Vec<strata_string> = values
            .iter()
            .map(|v| make_string(&mut heap, v.unwrap_or_default().as_bytes()))
            .collect();
        let valid: Vec<bool> = values.iter().map(Option::is_some).collect();
        Self {
            ty: MockType::simple(STRATA_TYPE_VARCHAR),
            data: pack(&raw),
            heap,
            validity: valid
                .iter()
                .any(|v| !v)
                .then(|| validity_words(&valid)),
            ..Self::default()
        }
    }

    pub fn decimal(width: u8, scale: u8, unscaled: &[i64]) -> Self {
        Self {
            ty: MockType::decimal(width, scale),
            data: pack(unscaled),
            ..Self::default()
        }
    }

    pub fn enumeration(names: &[&str], codes: &[u8]) -> Self {
        Self {
            ty: MockType::enumeration(names),
            data: pack(codes),
            ..Self::default()
        }
    }

    /// A list column; `entries` index into `child`, `None` rows are null.
    pub fn list(child: MockVector, entries: &[Option<(u64, u64)>], child_len: u64) -> Self {
        let raw: Vec<strata_list_entry> = entries
            .iter()
            .map(|e| {
                let (offset, length) = e.unwrap_or_default();
                strata_list_entry { offset, length }
            })
            .collect();
        let valid: Vec<bool> = entries.iter().map(Option::is_some).collect();
        let child_ty = child.ty.clone();
        Self {
            ty: MockType::list(child_ty),
            data: pack(&raw),
            validity: valid
                .iter()
                .any(|v| !v)
                .then(|| validity_words(&valid)),
            list_child: Some(Box::new(child)),
            list_size: child_len,
            ..Self::default()
        }
    }

    pub fn structure(members: Vec<(&str, MockVector)>) -> Self {
        let ty = MockType::structure(
            members
                .iter()
                .map(|(n, v)| (*n, v.ty.clone()))
                .collect(),
        );
        Self {
            ty,
            struct_children: members.into_iter().map(|(_, v)| v).collect(),
            ..Self::default()
        }
    }
}

pub struct MockChunk {
    pub rows: u64,
    pub vectors: Vec<MockVector>,
}

pub struct MockResult {
    pub names: Vec<CString>,
    pub types: Vec<MockType>,
    pub chunks: Mutex<VecDeque<MockChunk>>,
}

impl MockResult {
    pub fn new(columns: Vec<(&str, MockType)>, chunks: Vec<MockChunk>) -> Self {
        Self {
            names: columns
                .iter()
                .map(|(n, _)| CString::new(*n).unwrap())
                .collect(),
            types: columns.into_iter().map(|(_, t)| t).collect(),
            chunks: Mutex::new(chunks.into()),
        }
    }
}

#[derive(Default)]
pub struct MockDatabase {
    pub results: Mutex<VecDeque<MockResult>>,
    pub interrupts: AtomicUsize,
}

// ---- the function table ----

unsafe extern "C" fn mock_open(
    _path: *const c_char,
    out_db: *mut *mut strata_database,
    _out_error: *mut *mut c_char,
) -> strata_code {
    *out_db = Box::into_raw(Box::new(MockDatabase::default())) as *mut strata_database;
    strata_code::STRATA_OK
}

unsafe extern "C" fn mock_close(db: *mut strata_database) {
    drop(Box::from_raw(db as *mut MockDatabase));
}

unsafe extern "C" fn mock_interrupt(db: *mut strata_database) {
    (*(db as *const MockDatabase))
        .interrupts
        .fetch_add(1, Ordering::SeqCst);
}

unsafe extern "C" fn mock_query(
    db: *mut strata_database,
    _sql: *const c_char,
    out_result: *mut *mut strata_result,
    out_error: *mut *mut c_char,
) -> strata_code {
    let db = &*(db as *const MockDatabase);
    match db.results.lock().pop_front() {
        Some(result) => {
            *out_result = Box::into_raw(Box::new(result)) as *mut strata_result;
            strata_code::STRATA_OK
        }
        None => {
            *out_error = CString::new("syntax error near 'SELEC'").unwrap().into_raw();
            strata_code::STRATA_ERROR
        }
    }
}

unsafe extern "C" fn mock_string_free(ptr: *mut c_char) {
    if !ptr.is_null() {
        drop(CString::from_raw(ptr));
    }
}

unsafe extern "C" fn mock_result_column_count(result: *mut strata_result) -> idx_t {
    (*(result as *const MockResult)).names.len() as idx_t
}

unsafe extern "C" fn mock_result_column_name(
    result: *mut strata_result,
    col: idx_t,
) -> *const c_char {
    let result = &*(result as *const MockResult);
    result
        .names
        .get(col as usize)
        .map_or(ptr::null(), |n| n.as_ptr())
}

unsafe extern "C" fn mock_result_column_type(
    result: *mut strata_result,
    col: idx_t,
) -> strata_type_tag {
    let result = &*(result as *const MockResult);
    result
        .types
        .get(col as usize)
        .map_or(STRATA_TYPE_INVALID, |t| t.tag)
}

unsafe extern "C" fn mock_result_column_logical_type(
    result: *mut strata_result,
    col: idx_t,
) -> *mut strata_logical_type {
    let result = &*(result as *const MockResult);
    match result.types.get(col as usize) {
        Some(ty) => Box::into_raw(Box::new(ty.clone())) as *mut strata_logical_type,
        None => ptr::null_mut(),
    }
}

unsafe extern "C" fn mock_result_fetch_chunk(result: *mut strata_result) -> *mut strata_chunk {
    let result = &*(result as *const MockResult);
    match result.chunks.lock().pop_front() {
        Some(chunk) => Box::into_raw(Box::new(chunk)) as *mut strata_chunk,
        None => ptr::null_mut(),
    }
}

unsafe extern "C" fn mock_result_destroy(result: *mut strata_result) {
    drop(Box::from_raw(result as *mut MockResult));
}

unsafe extern "C" fn mock_chunk_row_count(chunk: *mut strata_chunk) -> idx_t {
    (*(chunk as *const MockChunk)).rows
}

unsafe extern "C" fn mock_chunk_column_count(chunk: *mut strata_chunk) -> idx_t {
    (*(chunk as *const MockChunk)).vectors.len() as idx_t
}

unsafe extern "C" fn mock_chunk_vector(chunk: *mut strata_chunk, col: idx_t) -> *mut strata_vector {
    let chunk = &*(chunk as *const MockChunk);
    match chunk.vectors.get(col as usize) {
        Some(vector) => vector as *const MockVector as *mut strata_vector,
        None => ptr::null_mut(),
    }
}

unsafe extern "C" fn mock_chunk_destroy(chunk: *mut strata_chunk) {
    drop(Box::from_raw(chunk as *mut MockChunk));
}

unsafe extern "C" fn mock_vector_data(vector: *mut strata_vector) -> *const c_void {
    let vector = &*(vector as *const MockVector);
    if vector.data.is_empty() {
        ptr::null()
    } else {
        vector.data.as_ptr() as *const c_void
    }
}

unsafe extern "C" fn mock_vector_validity(vector: *mut strata_vector) -> *const u64 {
    let vector = &*(vector as *const MockVector);
    vector
        .validity
        .as_ref()
        .map_or(ptr::null(), |words| words.as_ptr())
}

unsafe extern "C" fn mock_vector_logical_type(
    vector: *mut strata_vector,
) -> *mut strata_logical_type {
    let vector = &*(vector as *const MockVector);
    Box::into_raw(Box::new(vector.ty.clone())) as *mut strata_logical_type
}

unsafe extern "C" fn mock_vector_list_child(vector: *mut strata_vector) -> *mut strata_vector {
    let vector = &*(vector as *const MockVector);
    match &vector.list_child {
        Some(child) => &**child as *const MockVector as *mut strata_vector,
        None => ptr::null_mut(),
    }
}

unsafe extern "C" fn mock_vector_list_size(vector: *mut strata_vector) -> idx_t {
    (*(vector as *const MockVector)).list_size
}

unsafe extern "C" fn mock_vector_struct_child(
    vector: *mut strata_vector,
    member: idx_t,
) -> *mut strata_vector {
    let vector = &*(vector as *const MockVector);
    match vector.struct_children.get(member as usize) {
        Some(child) => child as *const MockVector as *mut strata_vector,
        None => ptr::null_mut(),
    }
}

unsafe extern "C" fn mock_type_id(ty: *mut strata_logical_type) -> strata_type_tag {
    (*(ty as *const MockType)).tag
}

unsafe extern "C" fn mock_type_destroy(ty: *mut strata_logical_type) {
    drop(Box::from_raw(ty as *mut MockType));
}

unsafe extern "C" fn mock_decimal_width(ty: *mut strata_logical_type) -> u8 {
    (*(ty as *const MockType)).width
}

unsafe extern "C" fn mock_decimal_scale(ty: *mut strata_logical_type) -> u8 {
    (*(ty as *const MockType)).scale
}

unsafe extern "C" fn mock_storage_type(ty: *mut strata_logical_type) -> strata_type_tag {
    (*(ty as *const MockType)).storage
}

unsafe extern "C" fn mock_enum_dictionary_size(ty: *mut strata_logical_type) -> idx_t {
    (*(ty as *const MockType)).enum_names.len() as idx_t
}

unsafe extern "C" fn mock_enum_dictionary_value(
    ty: *mut strata_logical_type,
    code: idx_t,
) -> *mut c_char {
    let ty = &*(ty as *const MockType);
    match ty.enum_names.get(code as usize) {
        Some(name) => name.clone().into_raw(),
        None => ptr::null_mut(),
    }
}

unsafe extern "C" fn mock_struct_child_count(ty: *mut strata_logical_type) -> idx_t {
    (*(ty as *const MockType)).members.len() as idx_t
}

unsafe extern "C" fn mock_struct_child_name(
    ty: *mut strata_logical_type,
    member: idx_t,
) -> *mut c_char {
    let ty = &*(ty as *const MockType);
    match ty.members.get(member as usize) {
        Some((name, _)) => name.clone().into_raw(),
        None => ptr::null_mut(),
    }
}

unsafe extern "C" fn mock_struct_child_type(
    ty: *mut strata_logical_type,
    member: idx_t,
) -> *mut strata_logical_type {
    let ty = &*(ty as *const MockType);
    match ty.members.get(member as usize) {
        Some((_, child)) => Box::into_raw(Box::new(child.clone())) as *mut strata_logical_type,
        None => ptr::null_mut(),
    }
}

unsafe extern "C" fn mock_array_size(ty: *mut strata_logical_type) -> idx_t {
    (*(ty as *const MockType)).array_size
}

/// The shared mock function table.
pub fn mock_api() -> &'static Api {
    static API: OnceLock<Api> = OnceLock::new();
    API.get_or_init(|| Api {
        strata_open: mock_open,
        strata_close: mock_close,
        strata_interrupt: mock_interrupt,
        strata_query: mock_query,
        strata_string_free: mock_string_free,
        strata_result_column_count: mock_result_column_count,
        strata_result_column_name: mock_result_column_name,
        strata_result_column_type: mock_result_column_type,
        strata_result_column_logical_type: mock_result_column_logical_type,
        strata_result_fetch_chunk: mock_result_fetch_chunk,
        strata_result_destroy: mock_result_destroy,
        strata_chunk_row_count: mock_chunk_row_count,
        strata_chunk_column_count: mock_chunk_column_count,
        strata_chunk_vector: mock_chunk_vector,
        strata_chunk_destroy: mock_chunk_destroy,
        strata_vector_data: mock_vector_data,
        strata_vector_validity: mock_vector_validity,
        strata_vector_logical_type: mock_vector_logical_type,
        strata_vector_list_child: mock_vector_list_child,
        strata_vector_list_size: mock_vector_list_size,
        strata_vector_struct_child: mock_vector_struct_child,
        strata_type_id: mock_type_id,
        strata_type_destroy: mock_type_destroy,
        strata_decimal_width: mock_decimal_width,
        strata_decimal_scale: mock_decimal_scale,
        strata_enum_storage_type: mock_storage_type,
        strata_enum_dictionary_size: mock_enum_dictionary_size,
        strata_enum_dictionary_value: mock_enum_dictionary_value,
        strata_struct_child_count: mock_struct_child_count,
        strata_struct_child_name: mock_struct_child_name,
        strata_struct_child_type: mock_struct_child_type,
        strata_array_size: mock_array_size,
    })
}

/// Wrap a scripted database in a driver handle. Returns the raw mock pointer
/// alongside so tests can inspect counters while the handle lives.
pub fn install(db: MockDatabase) -> (Database, *const MockDatabase) {
    let raw = Box::into_raw(Box::new(db));
    let handle = NonNull::new(raw as *mut strata_database).unwrap();
    let db = unsafe { Database::from_raw_parts(mock_api(), handle) };
    (db, raw as *const MockDatabase)
}

/// A database scripted to answer queries with `results`, in order.
pub fn scripted(results: Vec<MockResult>) -> Database {
    install(MockDatabase {
        results: Mutex::new(results.into()),
        interrupts: AtomicUsize::new(0),
    })
    .0
}
