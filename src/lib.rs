//! Rust bindings for libvirt.
//!
//! This crate provides a safe Rust interface to the libvirt C API: hypervisor
//! connections, domains and their snapshots, and domain events. libvirt is
//! loaded at runtime, so a binary built against this crate starts without
//! libvirt installed and reports [`Error::LibraryLoad`] on first use.
//!
//! Every failing native call becomes a typed [`Error`] carrying the
//! [`ErrorRecord`] libvirt reported. Handles release their libvirt reference
//! when dropped; using a handle after an explicit `release`/`close` returns
//! [`Error::UseAfterFree`] instead of touching freed memory.
//!
//! # Example
//!
//! ```no_run
//! use libvirt::{Connect, CreateFlags, XmlFlags};
//!
//! fn main() -> libvirt::Result<()> {
//!     libvirt::init()?;
//!     println!("libvirt {}", libvirt::version()?);
//!
//!     let conn = Connect::open("qemu:///system")?;
//!     let domain = conn.domain_lookup_by_name("web01")?;
//!     if !domain.is_active()? {
//!         domain.create_with_flags(CreateFlags::empty())?;
//!     }
//!
//!     let info = domain.info()?;
//!     println!("{:?}, {} KiB", info.state, info.memory_kib);
//!     println!("{}", domain.xml_desc(XmlFlags::INACTIVE)?);
//!
//!     // Read the first sector of the boot disk.
//!     let mut sector = [0u8; 512];
//!     domain.block_peek("vda", 0, &mut sector)?;
//!
//!     Ok(())
//! }
//! ```
//!
//! # Library location
//!
//! The shared object is searched for under its usual names. Set
//! `LIBVIRT_LIBRARY_PATH` to load a specific file instead.

pub mod connect;
pub mod domain;
pub mod error;
pub mod event;
pub mod ffi;
pub mod flags;
pub mod snapshot;
pub mod transfer;
pub mod types;

#[cfg(test)]
mod testing;

// Re-export main types at the crate root
pub use connect::Connect;
pub use domain::{cpu_map_length, Domain, DomainIdentity};
pub use error::{Error, ErrorCategory, ErrorDomain, ErrorLevel, ErrorRecord, Result};
pub use event::{DomainEvent, EventKind, IoErrorAction, LifecycleEvent};
pub use ffi::Library;
pub use flags::*;
pub use snapshot::DomainSnapshot;
pub use types::{
    BlockJobInfo, BlockJobType, ConnectOptions, ControlState, DomainBlockInfo, DomainBlockStats,
    DomainControlInfo, DomainInfo, DomainInterfaceStats, DomainJobInfo, DomainState, JobType,
    KeycodeSet, LibraryOptions, MemoryAddressMode, MemoryStatTag, MemoryStatistic, MigrateOptions,
    NodeInfo, SchedParameter, SchedValue, SecurityLabel, SuspendTarget, VcpuInfo, VcpuState,
    Version,
};

use std::os::raw::c_ulong;
use std::ptr;

use ffi::call::native;

/// Load libvirt and initialize it.
///
/// Optional: every entry point loads the library on first use. Calling this
/// early surfaces load failures at startup.
pub fn init() -> Result<()> {
    let library = Library::global()?;
    let initialize = native!(library, virInitialize);
    library.check(|| unsafe { initialize() })?;
    Ok(())
}

/// Version of the loaded libvirt library.
pub fn version() -> Result<Version> {
    let library = Library::global()?;
    version_of(&library)
}

fn version_of(library: &Library) -> Result<Version> {
    let get_version = native!(library, virGetVersion);
    let mut lib_ver: c_ulong = 0;
    library.check(|| unsafe { get_version(&mut lib_ver, ptr::null(), ptr::null_mut()) })?;
    Ok(Version::from_encoded(lib_ver as u64))
}
