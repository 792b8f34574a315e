//! Domain snapshots.

use std::os::raw::{c_char, c_int};

use crate::connect::ConnectionContext;
use crate::domain::Domain;
use crate::error::Result;
use crate::ffi::call::{borrowed_string, native, take_string, to_cstring, to_len};
use crate::ffi::handles::{Handle, SnapshotObject};
use crate::ffi::library::Library;
use crate::ffi::raw::VirDomainSnapshotPtr;
use crate::flags::{
    SnapshotCreateFlags, SnapshotDeleteFlags, SnapshotListFlags, SnapshotRevertFlags,
};

/// A snapshot of a domain's disks and, optionally, its memory.
///
/// # Example
///
/// ```no_run
/// # use libvirt::{Domain, SnapshotCreateFlags, SnapshotDeleteFlags};
/// # fn example(domain: &Domain) -> libvirt::Result<()> {
/// let snapshot = domain.snapshot_create_xml(
///     "<domainsnapshot><name>before-upgrade</name></domainsnapshot>",
///     SnapshotCreateFlags::ATOMIC,
/// )?;
/// println!("created {}", snapshot.name()?);
///
/// // Deleting consumes the handle.
/// snapshot.delete(SnapshotDeleteFlags::empty())?;
/// # Ok(())
/// # }
/// ```
pub struct DomainSnapshot {
    handle: Handle<SnapshotObject>,
    context: ConnectionContext,
}

// DomainSnapshot is Send + Sync
unsafe impl Send for DomainSnapshot {}
unsafe impl Sync for DomainSnapshot {}

impl DomainSnapshot {
    /// # Safety
    ///
    /// `ptr` must be a live snapshot reference owned by the caller.
    unsafe fn from_owned(context: ConnectionContext, ptr: VirDomainSnapshotPtr) -> Self {
        Self {
            handle: Handle::from_owned(context.library.clone(), ptr),
            context,
        }
    }

    fn lib(&self) -> &Library {
        &self.context.library
    }

    fn ptr(&self) -> Result<VirDomainSnapshotPtr> {
        self.handle.as_ptr()
    }

    fn wrap(&self, ptr: VirDomainSnapshotPtr) -> DomainSnapshot {
        // SAFETY: callers pass a reference libvirt just handed over.
        unsafe { DomainSnapshot::from_owned(self.context.clone(), ptr) }
    }

    pub fn name(&self) -> Result<String> {
        let snap = self.ptr()?;
        let get_name = native!(self.lib(), virDomainSnapshotGetName);
        self.lib()
            .invoke(|| unsafe { get_name(snap) }, |s| unsafe { borrowed_string(s) })
    }

    pub fn xml_desc(&self) -> Result<String> {
        let snap = self.ptr()?;
        let get_xml = native!(self.lib(), virDomainSnapshotGetXMLDesc);
        self.lib()
            .invoke(|| unsafe { get_xml(snap, 0) }, |s| unsafe { take_string(s) })
    }

    /// The snapshot this one was taken on top of.
    pub fn parent(&self) -> Result<DomainSnapshot> {
        let snap = self.ptr()?;
        let get_parent = native!(self.lib(), virDomainSnapshotGetParent);
        self.lib()
            .invoke(|| unsafe { get_parent(snap, 0) }, |ptr| self.wrap(ptr))
    }

    /// The domain this snapshot belongs to.
    pub fn domain(&self) -> Result<Domain> {
        let snap = self.ptr()?;
        let get_domain = native!(self.lib(), virDomainSnapshotGetDomain);
        let dom = self.lib().check(|| unsafe { get_domain(snap) })?;
        // SAFETY: libvirt lends the snapshot's own domain pointer; it is
        // live while the snapshot is.
        unsafe { Domain::from_borrowed(self.context.clone(), dom) }
    }

    pub fn is_current(&self) -> Result<bool> {
        let snap = self.ptr()?;
        let is_current = native!(self.lib(), virDomainSnapshotIsCurrent);
        Ok(self.lib().check(|| unsafe { is_current(snap, 0) })? == 1)
    }

    /// Revert the domain to this snapshot.
    pub fn revert(&self, flags: SnapshotRevertFlags) -> Result<()> {
        let snap = self.ptr()?;
        let revert = native!(self.lib(), virDomainRevertToSnapshot);
        self.lib().check(|| unsafe { revert(snap, flags.bits()) })?;
        Ok(())
    }

    /// Delete the snapshot and release this handle.
    ///
    /// The handle is released whether or not the delete succeeds.
    pub fn delete(mut self, flags: SnapshotDeleteFlags) -> Result<()> {
        let snap = self.ptr()?;
        let delete = native!(self.lib(), virDomainSnapshotDelete);
        let deleted = self.lib().check(|| unsafe { delete(snap, flags.bits()) });
        let released = self.handle.release();
        deleted?;
        released
    }

    /// Release the libvirt reference now. Releasing twice is a no-op.
    pub fn release(&mut self) -> Result<()> {
        self.handle.release()
    }

    pub fn is_released(&self) -> bool {
        self.handle.is_released()
    }

    /// Check if two handles refer to the same snapshot: same connection,
    /// same domain and same name.
    pub fn same_as(&self, other: &DomainSnapshot) -> Result<bool> {
        if self.context.id != other.context.id {
            return Ok(false);
        }
        if self.ptr()? == other.ptr()? {
            return Ok(true);
        }
        Ok(self.name()? == other.name()? && self.domain()?.same_as(&other.domain()?)?)
    }
}

impl std::fmt::Debug for DomainSnapshot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DomainSnapshot")
            .field("connection", &self.context.id)
            .field("released", &self.handle.is_released())
            .finish()
    }
}

impl Domain {
    fn wrap_snapshot(&self, ptr: VirDomainSnapshotPtr) -> DomainSnapshot {
        // SAFETY: callers pass a reference libvirt just handed over.
        unsafe { DomainSnapshot::from_owned(self.context.clone(), ptr) }
    }

    /// Take a snapshot described by `xml`.
    pub fn snapshot_create_xml(
        &self,
        xml: &str,
        flags: SnapshotCreateFlags,
    ) -> Result<DomainSnapshot> {
        let dom = self.ptr()?;
        let create = native!(self.context.library, virDomainSnapshotCreateXML);
        let xml = to_cstring(xml)?;
        self.context.library.invoke(
            || unsafe { create(dom, xml.as_ptr(), flags.bits()) },
            |ptr| self.wrap_snapshot(ptr),
        )
    }

    /// The snapshot the domain was last reverted to or created from.
    pub fn snapshot_current(&self) -> Result<DomainSnapshot> {
        let dom = self.ptr()?;
        let current = native!(self.context.library, virDomainSnapshotCurrent);
        self.context
            .library
            .invoke(|| unsafe { current(dom, 0) }, |ptr| self.wrap_snapshot(ptr))
    }

    pub fn snapshot_lookup_by_name(&self, name: &str) -> Result<DomainSnapshot> {
        let dom = self.ptr()?;
        let lookup = native!(self.context.library, virDomainSnapshotLookupByName);
        let name = to_cstring(name)?;
        self.context.library.invoke(
            || unsafe { lookup(dom, name.as_ptr(), 0) },
            |ptr| self.wrap_snapshot(ptr),
        )
    }

    pub fn snapshot_num(&self, flags: SnapshotListFlags) -> Result<usize> {
        let dom = self.ptr()?;
        let num = native!(self.context.library, virDomainSnapshotNum);
        self.context
            .library
            .invoke(|| unsafe { num(dom, flags.bits()) }, to_len)
    }

    /// Names of the domain's snapshots.
    pub fn snapshot_list_names(&self, flags: SnapshotListFlags) -> Result<Vec<String>> {
        let capacity = self.snapshot_num(flags)?;
        if capacity == 0 {
            return Ok(Vec::new());
        }

        let dom = self.ptr()?;
        let list = native!(self.context.library, virDomainSnapshotListNames);
        let mut names: Vec<*mut c_char> = vec![std::ptr::null_mut(); capacity];
        let count = self.context.library.invoke(
            || unsafe { list(dom, names.as_mut_ptr(), capacity as c_int, flags.bits()) },
            to_len,
        )?;

        // SAFETY: libvirt filled the first `count` slots with malloc'd strings.
        Ok(names
            .into_iter()
            .take(count)
            .map(|name| unsafe { take_string(name) })
            .collect())
    }

    pub fn has_current_snapshot(&self) -> Result<bool> {
        let dom = self.ptr()?;
        let has_current = native!(self.context.library, virDomainHasCurrentSnapshot);
        Ok(self.context.library.check(|| unsafe { has_current(dom, 0) })? == 1)
    }

    /// Revert this domain to `snapshot`.
    pub fn revert_to_snapshot(
        &self,
        snapshot: &DomainSnapshot,
        flags: SnapshotRevertFlags,
    ) -> Result<()> {
        self.ptr()?;
        snapshot.revert(flags)
    }
}
