//! Calling convention shared by every wrapped entry point.
//!
//! libvirt reports failure through a sentinel return value (negative integer,
//! null pointer, ...) and leaves the details in a per-thread error slot.
//! [`Library::invoke`] makes the native call once, classifies the result with
//! [`Sentinel`], and on failure copies the error slot out before anything else
//! can run on this thread.

use std::ffi::{CStr, CString};
use std::os::raw::{c_char, c_int, c_uint, c_ulong, c_void};

use super::error::take_last_error;
use super::library::Library;
use crate::error::{Error, Result};

/// A raw return value that encodes failure in-band.
pub(crate) trait Sentinel: Copy {
    fn is_failure(&self) -> bool;
}

impl Sentinel for c_int {
    fn is_failure(&self) -> bool {
        *self < 0
    }
}

impl<T> Sentinel for *mut T {
    fn is_failure(&self) -> bool {
        self.is_null()
    }
}

impl<T> Sentinel for *const T {
    fn is_failure(&self) -> bool {
        self.is_null()
    }
}

/// Unsigned result where the all-ones value means failure.
#[derive(Debug, Clone, Copy)]
pub(crate) struct UintOrMax(pub c_uint);

impl Sentinel for UintOrMax {
    fn is_failure(&self) -> bool {
        self.0 == c_uint::MAX
    }
}

/// Unsigned result where zero means failure.
#[derive(Debug, Clone, Copy)]
pub(crate) struct UlongOrZero(pub c_ulong);

impl Sentinel for UlongOrZero {
    fn is_failure(&self) -> bool {
        self.0 == 0
    }
}

impl Library {
    /// Make one native call and convert its result.
    ///
    /// `convert` only runs on success. On failure the thread's last error is
    /// copied and cleared immediately.
    pub(crate) fn invoke<R, T>(
        &self,
        call: impl FnOnce() -> R,
        convert: impl FnOnce(R) -> T,
    ) -> Result<T>
    where
        R: Sentinel,
    {
        let raw = call();
        if raw.is_failure() {
            let record = take_last_error(self.api());
            tracing::trace!(
                code = record.code,
                domain = record.domain,
                message = %record.message,
                "libvirt call failed"
            );
            return Err(Error::from_record(record));
        }
        Ok(convert(raw))
    }

    /// Make one native call and return its raw result.
    pub(crate) fn check<R: Sentinel>(&self, call: impl FnOnce() -> R) -> Result<R> {
        self.invoke(call, |raw| raw)
    }
}

/// Fetch an entry point from a library, or return `Error::MissingSymbol`.
macro_rules! native {
    ($lib:expr, $name:ident) => {
        $lib.api()
            .$name
            .ok_or($crate::error::Error::MissingSymbol(stringify!($name)))?
    };
}

pub(crate) use native;

/// Convert a Rust string for a native call.
pub(crate) fn to_cstring(value: &str) -> Result<CString> {
    CString::new(value)
        .map_err(|_| Error::InvalidArgument(format!("string contains a NUL byte: {:?}", value)))
}

/// Convert an optional Rust string for a native call.
pub(crate) fn opt_cstring(value: Option<&str>) -> Result<Option<CString>> {
    value.map(to_cstring).transpose()
}

/// Pointer for an optional C string; null when absent.
pub(crate) fn opt_ptr(value: &Option<CString>) -> *const c_char {
    value.as_ref().map_or(std::ptr::null(), |s| s.as_ptr())
}

/// Copy and free a string allocated by libvirt.
///
/// # Safety
///
/// `ptr` must be a non-null, malloc-allocated C string owned by the caller.
pub(crate) unsafe fn take_string(ptr: *mut c_char) -> String {
    let value = CStr::from_ptr(ptr).to_string_lossy().into_owned();
    libc::free(ptr as *mut c_void);
    value
}

/// Copy a string that libvirt keeps ownership of.
///
/// # Safety
///
/// `ptr` must be a non-null C string valid for the duration of the call.
pub(crate) unsafe fn borrowed_string(ptr: *const c_char) -> String {
    CStr::from_ptr(ptr).to_string_lossy().into_owned()
}

/// Read a NUL-padded fixed-size character array.
pub(crate) fn array_string(chars: &[c_char]) -> String {
    let bytes: Vec<u8> = chars.iter().take_while(|&&c| c != 0).map(|&c| c as u8).collect();
    String::from_utf8_lossy(&bytes).into_owned()
}

/// Convert a count returned by libvirt into a length.
pub(crate) fn to_len(count: c_int) -> usize {
    usize::try_from(count).unwrap_or(0)
}
