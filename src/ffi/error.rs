//! Error conversion utilities for FFI.

use std::ffi::CStr;
use std::os::raw::c_char;

use num_traits::FromPrimitive;

use super::raw::{NativeApi, VirError};
use crate::error::{ErrorLevel, ErrorRecord};

const UNKNOWN_MESSAGE: &str = "an error occurred, but the cause is unknown";

unsafe fn opt_string(ptr: *const c_char) -> Option<String> {
    if ptr.is_null() {
        None
    } else {
        Some(CStr::from_ptr(ptr).to_string_lossy().into_owned())
    }
}

/// Copy a native `virError` into an owned record.
///
/// # Safety
///
/// Every string pointer in `err` must be null or a valid C string.
pub unsafe fn record_from_native(err: &VirError) -> ErrorRecord {
    ErrorRecord {
        code: err.code,
        domain: err.domain,
        message: opt_string(err.message).unwrap_or_else(|| UNKNOWN_MESSAGE.to_string()),
        level: ErrorLevel::from_i32(err.level).unwrap_or_default(),
        str1: opt_string(err.str1),
        str2: opt_string(err.str2),
        str3: opt_string(err.str3),
        int1: err.int1,
        int2: err.int2,
    }
}

/// Copy out and clear the calling thread's last libvirt error.
///
/// Must run on the thread that made the failing call, before any other
/// libvirt call on that thread.
pub(crate) fn take_last_error(api: &NativeApi) -> ErrorRecord {
    let copy = match api.virCopyLastError {
        Some(copy) => copy,
        None => {
            return ErrorRecord {
                message: "libvirt does not export virCopyLastError".to_string(),
                ..Default::default()
            }
        }
    };

    let mut err = VirError::default();
    // SAFETY: `err` is a zeroed virError owned by this frame. libvirt fills it
    // with strings we own until virResetError.
    let record = unsafe {
        copy(&mut err);
        let record = record_from_native(&err);
        if let Some(reset) = api.virResetError {
            reset(&mut err);
        }
        record
    };

    if let Some(reset_last) = api.virResetLastError {
        // SAFETY: takes no arguments and only touches thread-local state.
        unsafe { reset_last() };
    }
    record
}
