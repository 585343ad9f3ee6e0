//! Zero-copy driver for the Strata analytical engine.
//!
//! The engine is loaded as a dynamic library at first use and consumed
//! through a resolved function-pointer table, so the driver carries no
//! link-time dependency on it. Query results stream out as engine-owned
//! chunks; column data is read in place through scoped accessors that pin
//! the native buffers for exactly as long as borrowed views exist.
//!
//! ```no_run
//! use strata::Database;
//!
//! # fn main() -> strata::Result<()> {
//! let db = Database::open(None)?;
//! let result = db.query("SELECT 42 AS answer")?;
//! while let Some(chunk) = result.next_chunk()? {
//!     chunk.with_accessor(|rows| {
//!         let answers = rows.column(0)?.as_slice::<i32>()?;
//!         assert_eq!(answers, [42]);
//!         Ok(())
//!     })?;
//! }
//! # Ok(())
//! # }
//! ```
//!
//! Disposal is safe from any thread at any time: [`QueryResult::close`] and
//! [`Chunk::close`] wait for in-flight accessor scopes to drain, and every
//! later access reports [`Error::Disposed`] instead of touching freed
//! memory.

pub mod api;
mod chunk;
mod connection;
mod error;
mod logical;
mod result;
mod runtime;
pub mod sync;
pub mod sys;
mod types;
mod value;
mod vector;

pub use chunk::{Chunk, ChunkAccessor};
pub use connection::Database;
pub use error::{Error, Result};
pub use logical::EnumDictionary;
pub use result::{Column, QueryResult, ScanProgress};
pub use runtime::{runtime, Runtime};
pub use types::{
    decimal_storage_for_width, ColumnDescriptor, Date, Decimal, Hugeint, Interval, ListEntry,
    StorageKind, Time, Timestamp, ValueKind,
};
pub use value::{ColumnReader, FromVector, Value};
pub use vector::{NativeType, VectorView};
