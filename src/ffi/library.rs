//! Runtime loading of the libvirt shared library.

use std::ffi::{CStr, CString};
use std::fmt;
use std::os::unix::ffi::OsStrExt;
use std::path::{Path, PathBuf};
use std::sync::{Arc, OnceLock};

use super::raw::NativeApi;
use crate::error::{Error, Result};
use crate::types::LibraryOptions;

#[cfg(target_os = "macos")]
const DEFAULT_CANDIDATES: &[&str] = &["libvirt.0.dylib", "libvirt.dylib"];
#[cfg(not(target_os = "macos"))]
const DEFAULT_CANDIDATES: &[&str] = &["libvirt.so.0", "libvirt.so"];

static GLOBAL: OnceLock<std::result::Result<Arc<Library>, String>> = OnceLock::new();

/// A loaded libvirt and its resolved entry points.
///
/// The shared object is never unloaded; a `Library` lives as long as any
/// connection or handle made from it.
pub struct Library {
    api: NativeApi,
    path: Option<PathBuf>,
}

// Library is Send + Sync: the entry point table is immutable after load
unsafe impl Send for Library {}
unsafe impl Sync for Library {}

impl Library {
    /// Load libvirt from the configured path, or from the platform defaults.
    pub fn load(options: &LibraryOptions) -> Result<Arc<Self>> {
        let candidates: Vec<PathBuf> = match &options.path {
            Some(path) => vec![path.clone()],
            None => DEFAULT_CANDIDATES.iter().map(PathBuf::from).collect(),
        };

        let mut failures = Vec::new();
        for candidate in &candidates {
            match open(candidate) {
                Ok(api) => {
                    tracing::debug!(
                        path = %candidate.display(),
                        missing = api.missing().len(),
                        "loaded libvirt"
                    );
                    return Ok(Arc::new(Self {
                        api,
                        path: Some(candidate.clone()),
                    }));
                }
                Err(reason) => failures.push(format!("{}: {}", candidate.display(), reason)),
            }
        }

        Err(Error::LibraryLoad(failures.join("; ")))
    }

    /// The process-wide library, loaded on first use from `LibraryOptions::from_env()`.
    pub fn global() -> Result<Arc<Library>> {
        GLOBAL
            .get_or_init(|| {
                Library::load(&LibraryOptions::from_env()).map_err(|err| match err {
                    Error::LibraryLoad(reason) => reason,
                    other => other.to_string(),
                })
            })
            .clone()
            .map_err(Error::LibraryLoad)
    }

    /// Wrap an already-resolved entry point table.
    #[cfg(test)]
    pub(crate) fn from_api(api: NativeApi) -> Arc<Self> {
        Arc::new(Self { api, path: None })
    }

    /// Get the resolved entry points.
    pub fn api(&self) -> &NativeApi {
        &self.api
    }

    /// Get the path libvirt was loaded from.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Names of entry points this libvirt does not export.
    pub fn missing_symbols(&self) -> Vec<&'static str> {
        self.api.missing()
    }
}

impl fmt::Debug for Library {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Library").field("path", &self.path).finish()
    }
}

fn open(path: &Path) -> std::result::Result<NativeApi, String> {
    let c_path = CString::new(path.as_os_str().as_bytes())
        .map_err(|_| "path contains a NUL byte".to_string())?;

    // SAFETY: c_path is a valid C string for the duration of the call.
    let handle = unsafe { libc::dlopen(c_path.as_ptr(), libc::RTLD_NOW | libc::RTLD_GLOBAL) };
    if handle.is_null() {
        return Err(dlerror());
    }

    // SAFETY: handle is a live dlopen handle that is never closed.
    let api = unsafe { NativeApi::resolve(handle) };
    if api.virConnectOpen.is_none() || api.virCopyLastError.is_none() {
        return Err("not a libvirt library".to_string());
    }
    Ok(api)
}

fn dlerror() -> String {
    // SAFETY: dlerror returns null or a thread-local C string.
    unsafe {
        let err = libc::dlerror();
        if err.is_null() {
            "unknown dlopen failure".to_string()
        } else {
            CStr::from_ptr(err).to_string_lossy().into_owned()
        }
    }
}
