//! Fixed-layout records shared with libvirt.
//!
//! Every record is `#[repr(C)]` and declares its fields in native order. The
//! order is part of the ABI: moving one field shifts every field after it.

/// Position and width of one field inside a native record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldLayout {
    pub name: &'static str,
    pub offset: usize,
    pub width: usize,
}

/// A plain-data record with a known native layout.
///
/// # Safety
///
/// Implementors must be `#[repr(C)]` and valid for any bit pattern.
pub unsafe trait FixedLayout: Copy + Sized {
    /// Fields in declaration order.
    const FIELDS: &'static [FieldLayout];

    /// Copy a record out of raw native bytes.
    ///
    /// Returns `None` if `bytes` is shorter than the record.
    fn from_native_bytes(bytes: &[u8]) -> Option<Self> {
        if bytes.len() < std::mem::size_of::<Self>() {
            return None;
        }
        // SAFETY: length checked above, and the trait contract allows any bit pattern.
        Some(unsafe { std::ptr::read_unaligned(bytes.as_ptr() as *const Self) })
    }
}

/// Declare a native record together with its field table.
macro_rules! fixed_struct {
    (
        $(#[$meta:meta])*
        pub struct $name:ident {
            $( $(#[$fmeta:meta])* pub $field:ident : $ty:ty, )*
        }
    ) => {
        $(#[$meta])*
        #[repr(C)]
        #[derive(Clone, Copy)]
        pub struct $name {
            $( $(#[$fmeta])* pub $field: $ty, )*
        }

        impl Default for $name {
            fn default() -> Self {
                // SAFETY: plain integers and arrays; all-zero is valid.
                unsafe { std::mem::zeroed() }
            }
        }

        unsafe impl $crate::ffi::layout::FixedLayout for $name {
            const FIELDS: &'static [$crate::ffi::layout::FieldLayout] = &[
                $(
                    $crate::ffi::layout::FieldLayout {
                        name: stringify!($field),
                        offset: std::mem::offset_of!($name, $field),
                        width: std::mem::size_of::<$ty>(),
                    },
                )*
            ];
        }
    };
}

pub(crate) use fixed_struct;
