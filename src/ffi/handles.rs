//! Opaque libvirt object types and the owning handle around them.
//!
//! A [`Handle`] owns exactly one native reference. Releasing it clears the
//! pointer, so every later access fails with `Error::UseAfterFree` instead of
//! touching freed memory.

use std::os::raw::c_int;
use std::ptr;
use std::sync::Arc;

use super::library::Library;
use super::raw::NativeApi;
use crate::error::{Error, Result};

/// Macro to define an opaque native object type and its pointer alias.
macro_rules! define_object {
    ($name:ident, $ptr:ident) => {
        /// Opaque libvirt object.
        #[repr(C)]
        pub struct $name {
            _private: [u8; 0],
        }

        /// Pointer to the opaque libvirt object.
        pub type $ptr = *mut $name;
    };
}

define_object!(VirConnect, VirConnectPtr);
define_object!(VirDomain, VirDomainPtr);
define_object!(VirDomainSnapshot, VirDomainSnapshotPtr);

type RefFn<T> = unsafe extern "C" fn(*mut T) -> c_int;

/// A reference-counted libvirt object kind.
pub(crate) trait NativeObject {
    type Raw;

    /// Name used in errors and logs.
    const KIND: &'static str;
    const RELEASE_SYMBOL: &'static str;
    const REF_SYMBOL: &'static str;

    fn release_fn(api: &NativeApi) -> Option<RefFn<Self::Raw>>;
    fn ref_fn(api: &NativeApi) -> Option<RefFn<Self::Raw>>;
}

macro_rules! native_object {
    ($marker:ident, $raw:ty, $kind:literal, $release:ident, $add_ref:ident) => {
        pub(crate) struct $marker;

        impl NativeObject for $marker {
            type Raw = $raw;

            const KIND: &'static str = $kind;
            const RELEASE_SYMBOL: &'static str = stringify!($release);
            const REF_SYMBOL: &'static str = stringify!($add_ref);

            fn release_fn(api: &NativeApi) -> Option<RefFn<Self::Raw>> {
                api.$release
            }

            fn ref_fn(api: &NativeApi) -> Option<RefFn<Self::Raw>> {
                api.$add_ref
            }
        }
    };
}

native_object!(ConnectObject, VirConnect, "connection", virConnectClose, virConnectRef);
native_object!(DomainObject, VirDomain, "domain", virDomainFree, virDomainRef);
native_object!(
    SnapshotObject,
    VirDomainSnapshot,
    "snapshot",
    virDomainSnapshotFree,
    virDomainSnapshotRef
);

/// Owning wrapper around one native reference.
pub(crate) struct Handle<K: NativeObject> {
    ptr: *mut K::Raw,
    library: Arc<Library>,
}

impl<K: NativeObject> Handle<K> {
    /// Take ownership of a reference just returned by libvirt.
    ///
    /// # Safety
    ///
    /// `ptr` must be a live reference that nothing else will free.
    pub(crate) unsafe fn from_owned(library: Arc<Library>, ptr: *mut K::Raw) -> Self {
        Self { ptr, library }
    }

    /// Take a new reference on a pointer owned by someone else.
    ///
    /// Used for pointers handed to callbacks, which are only valid for the
    /// duration of the callback.
    ///
    /// # Safety
    ///
    /// `ptr` must be live for the duration of this call.
    pub(crate) unsafe fn from_borrowed(library: Arc<Library>, ptr: *mut K::Raw) -> Result<Self> {
        if ptr.is_null() {
            return Err(Error::InvalidArgument(format!("null {} pointer", K::KIND)));
        }
        let add_ref = K::ref_fn(library.api()).ok_or(Error::MissingSymbol(K::REF_SYMBOL))?;
        library.check(|| add_ref(ptr))?;
        Ok(Self::from_owned(library, ptr))
    }

    /// The live pointer, or `UseAfterFree` once released.
    pub(crate) fn as_ptr(&self) -> Result<*mut K::Raw> {
        if self.ptr.is_null() {
            return Err(Error::UseAfterFree(K::KIND));
        }
        Ok(self.ptr)
    }

    pub(crate) fn is_released(&self) -> bool {
        self.ptr.is_null()
    }

    /// Drop the native reference.
    ///
    /// Idempotent. The pointer is cleared before the native call, so a failed
    /// free is never retried.
    pub(crate) fn release(&mut self) -> Result<()> {
        if self.ptr.is_null() {
            return Ok(());
        }
        let ptr = std::mem::replace(&mut self.ptr, ptr::null_mut());
        let free = K::release_fn(self.library.api())
            .ok_or(Error::MissingSymbol(K::RELEASE_SYMBOL))?;

        tracing::debug!(kind = K::KIND, "releasing native handle");
        self.library.check(|| unsafe { free(ptr) }).map(|_| ())
    }
}

impl<K: NativeObject> Drop for Handle<K> {
    fn drop(&mut self) {
        if let Err(err) = self.release() {
            tracing::warn!(kind = K::KIND, error = %err, "failed to release native handle on drop");
        }
    }
}
