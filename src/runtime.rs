//! Strata engine loader and process-wide API singleton.
//!
//! This module is responsible for:
//! - Locating the Strata engine dynamic library for the current process.
//! - Dynamically loading the library and resolving ABI symbols into an [`Api`] table.
//! - Exposing a process-wide singleton [`Runtime`] via [`runtime()`].
//!
//! ## Environment variables
//!
//! - `STRATA_LIB_PATH` *(optional)*: if set, the engine library is loaded
//!   directly from this path instead of the platform default soname.
//!
//! ## Initialization semantics
//!
//! The runtime is initialized lazily on first use and stored in a global
//! [`OnceLock`]. If initialization fails, subsequent calls to [`runtime()`]
//! return the same error (cloned).

use std::{env, path::PathBuf, sync::OnceLock};

use libloading::Library;
use tracing::debug;

use crate::{api::Api, Error, Result};

/// Process-wide singleton storage for the runtime.
///
/// Stores `Result<Runtime>` rather than `Runtime`: a failed initialization is
/// cached too and re-returned by later calls to [`runtime()`].
static RUNTIME: OnceLock<Result<Runtime>> = OnceLock::new();

/// Default library name on the system search path.
#[cfg(target_os = "windows")]
const ENGINE_SONAME: &str = "stratac.dll";
#[cfg(target_os = "macos")]
const ENGINE_SONAME: &str = "libstratac.dylib";
#[cfg(not(any(target_os = "windows", target_os = "macos")))]
const ENGINE_SONAME: &str = "libstratac.so";

/// Loaded Strata engine and resolved ABI table.
///
/// A [`Runtime`] owns the loaded dynamic library so it stays alive for the
/// lifetime of the process; the [`Api`] resolved from it remains valid as
/// long as the library remains loaded.
pub struct Runtime {
    /// Keep the library alive for the lifetime of the process.
    _lib: Library,
    /// ABI entrypoints resolved from the loaded engine library.
    pub api: Api,
    /// Filesystem path (or soname) the engine was loaded from.
    pub path: PathBuf,
}

/// Get the process-wide Strata runtime singleton.
///
/// Lazily initialized on first call. A failed initialization is cached and
/// returned by subsequent calls.
///
/// # Errors
///
/// Returns [`Error::Runtime`] if the engine library cannot be located or
/// loaded, or if the required ABI symbols cannot be resolved.
pub fn runtime() -> Result<&'static Runtime> {
    match RUNTIME.get_or_init(Runtime::init) {
        Ok(rt) => Ok(rt),
        Err(e) => Err(e.clone()),
    }
}

impl Runtime {
    /// Access the resolved ABI table with a `'static` borrow.
    pub fn api(&'static self) -> &'static Api {
        &self.api
    }

    fn init() -> Result<Self> {
        let path = match env::var("STRATA_LIB_PATH") {
            Ok(p) => PathBuf::from(p),
            Err(_) => PathBuf::from(ENGINE_SONAME),
        };
        unsafe { Self::load_from_path(path) }
    }

    /// Load the engine dynamic library from `path` and resolve its ABI.
    ///
    /// # Safety
    ///
    /// Loads and binds to a dynamic library at runtime. Callers must ensure
    /// `path` names a Strata engine compatible with the current process
    /// (platform/arch/ABI) exporting the symbols required by [`Api::load`].
    unsafe fn load_from_path(path: PathBuf) -> Result<Self> {
        let lib = Library::new(&path).map_err(|e| {
            Error::Runtime(format!(
                "failed to load Strata engine '{}': {e}",
                path.display()
            ))
        })?;

        let api = Api::load(&lib).map_err(|e| {
            Error::Runtime(format!(
                "failed to resolve Strata ABI symbols from '{}': {e}",
                path.display()
            ))
        })?;

        debug!(path = %path.display(), "loaded Strata engine");
        Ok(Self {
            _lib: lib,
            api,
            path,
        })
    }
}
