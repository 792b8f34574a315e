//! FFI bindings to libvirt.
//!
//! This module contains the low-level C declarations, the runtime loader and
//! the calling convention. Users should prefer the safe Rust wrappers in the
//! parent modules.

pub(crate) mod call;
pub mod error;
pub(crate) mod handles;
pub mod layout;
pub mod library;
pub mod raw;

pub use handles::{
    VirConnect, VirConnectPtr, VirDomain, VirDomainPtr, VirDomainSnapshot, VirDomainSnapshotPtr,
};
pub use layout::{FieldLayout, FixedLayout};
pub use library::Library;
pub use raw::*;
