//! Hypervisor connections.

use std::os::raw::{c_int, c_ulong};
use std::ptr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use uuid::Uuid;

use crate::domain::Domain;
use crate::error::{Error, Result};
use crate::ffi::call::{
    borrowed_string, native, opt_cstring, opt_ptr, take_string, to_cstring, to_len,
};
use crate::ffi::handles::{ConnectObject, Handle};
use crate::ffi::library::Library;
use crate::ffi::raw::{VirConnectPtr, VirDomainPtr, VirNodeInfo};
use crate::flags::{CreateFlags, ListDomainsFlags};
use crate::transfer::effective_chunk;
use crate::types::{ConnectOptions, NodeInfo, Version};

static NEXT_CONNECTION_ID: AtomicU64 = AtomicU64::new(1);

/// State shared by a connection and every handle made from it.
#[derive(Clone)]
pub(crate) struct ConnectionContext {
    pub(crate) id: u64,
    pub(crate) library: Arc<Library>,
    pub(crate) peek_chunk_size: usize,
}

impl ConnectionContext {
    fn new(library: Arc<Library>, peek_chunk_size: usize) -> Self {
        Self {
            id: NEXT_CONNECTION_ID.fetch_add(1, Ordering::Relaxed),
            library,
            peek_chunk_size,
        }
    }
}

/// A connection to a hypervisor.
///
/// The connection is closed when dropped; domains obtained from it keep the
/// underlying libvirt connection alive until they are released too.
///
/// # Example
///
/// ```no_run
/// use libvirt::Connect;
///
/// let conn = Connect::open("test:///default")?;
/// let domain = conn.domain_lookup_by_name("test")?;
/// println!("{} is active: {}", domain.name()?, domain.is_active()?);
/// # Ok::<(), libvirt::Error>(())
/// ```
pub struct Connect {
    pub(crate) handle: Handle<ConnectObject>,
    pub(crate) context: ConnectionContext,
}

// Connect is Send + Sync
unsafe impl Send for Connect {}
unsafe impl Sync for Connect {}

impl Connect {
    /// Open a read-write connection using the process-wide library.
    ///
    /// An empty `uri` selects libvirt's default hypervisor.
    pub fn open(uri: &str) -> Result<Self> {
        Self::open_with(Library::global()?, uri, &ConnectOptions::default())
    }

    /// Open a read-only connection using the process-wide library.
    pub fn open_read_only(uri: &str) -> Result<Self> {
        let options = ConnectOptions {
            read_only: true,
            ..Default::default()
        };
        Self::open_with(Library::global()?, uri, &options)
    }

    /// Open a connection through a specific library.
    pub fn open_with(library: Arc<Library>, uri: &str, options: &ConnectOptions) -> Result<Self> {
        if options.peek_chunk_size == 0 {
            return Err(Error::InvalidArgument(
                "peek chunk size must be non-zero".to_string(),
            ));
        }

        let name = opt_cstring(Some(uri).filter(|u| !u.is_empty()))?;
        let ptr = if options.read_only {
            let open = native!(library, virConnectOpenReadOnly);
            library.check(|| unsafe { open(opt_ptr(&name)) })?
        } else {
            let open = native!(library, virConnectOpen);
            library.check(|| unsafe { open(opt_ptr(&name)) })?
        };

        let chunk = effective_chunk(options.peek_chunk_size);
        let context = ConnectionContext::new(library.clone(), chunk);
        tracing::debug!(
            uri = %uri,
            read_only = options.read_only,
            connection = context.id,
            "opened libvirt connection"
        );

        Ok(Self {
            // SAFETY: a successful open returns a reference we now own.
            handle: unsafe { Handle::from_owned(library, ptr) },
            context,
        })
    }

    /// Close the connection.
    ///
    /// Closing twice is a no-op. Any later call fails with `UseAfterFree`.
    pub fn close(&mut self) -> Result<()> {
        if !self.handle.is_released() {
            tracing::debug!(connection = self.context.id, "closing libvirt connection");
        }
        self.handle.release()
    }

    /// Check if the connection has been closed.
    pub fn is_closed(&self) -> bool {
        self.handle.is_released()
    }

    /// Get the library this connection calls into.
    pub fn library(&self) -> &Arc<Library> {
        &self.context.library
    }

    /// Get the process-unique id of this connection.
    pub fn connection_id(&self) -> u64 {
        self.context.id
    }

    fn lib(&self) -> &Library {
        &self.context.library
    }

    pub(crate) fn ptr(&self) -> Result<VirConnectPtr> {
        self.handle.as_ptr()
    }

    fn wrap_domain(&self, ptr: VirDomainPtr) -> Domain {
        // SAFETY: callers pass a reference libvirt just handed over.
        unsafe { Domain::from_owned(self.context.clone(), ptr) }
    }

    /// Get the canonical URI of the connection.
    pub fn uri(&self) -> Result<String> {
        let conn = self.ptr()?;
        let get_uri = native!(self.lib(), virConnectGetURI);
        self.lib()
            .invoke(|| unsafe { get_uri(conn) }, |s| unsafe { take_string(s) })
    }

    /// Get the hostname of the hypervisor host.
    pub fn hostname(&self) -> Result<String> {
        let conn = self.ptr()?;
        let get_hostname = native!(self.lib(), virConnectGetHostname);
        self.lib()
            .invoke(|| unsafe { get_hostname(conn) }, |s| unsafe { take_string(s) })
    }

    /// Get the driver name, e.g. "QEMU".
    pub fn hypervisor_type(&self) -> Result<String> {
        let conn = self.ptr()?;
        let get_type = native!(self.lib(), virConnectGetType);
        self.lib()
            .invoke(|| unsafe { get_type(conn) }, |s| unsafe { borrowed_string(s) })
    }

    /// Get the hypervisor version.
    pub fn hypervisor_version(&self) -> Result<Version> {
        let conn = self.ptr()?;
        let get_version = native!(self.lib(), virConnectGetVersion);
        let mut version: c_ulong = 0;
        self.lib().check(|| unsafe { get_version(conn, &mut version) })?;
        Ok(Version::from_encoded(version as u64))
    }

    /// Get the version of libvirt on the host the connection talks to.
    pub fn lib_version(&self) -> Result<Version> {
        let conn = self.ptr()?;
        let get_version = native!(self.lib(), virConnectGetLibVersion);
        let mut version: c_ulong = 0;
        self.lib().check(|| unsafe { get_version(conn, &mut version) })?;
        Ok(Version::from_encoded(version as u64))
    }

    /// Check if the connection is still alive.
    pub fn is_alive(&self) -> Result<bool> {
        let conn = self.ptr()?;
        let is_alive = native!(self.lib(), virConnectIsAlive);
        Ok(self.lib().check(|| unsafe { is_alive(conn) })? == 1)
    }

    /// Get the number of active domains.
    pub fn num_of_domains(&self) -> Result<usize> {
        let conn = self.ptr()?;
        let num = native!(self.lib(), virConnectNumOfDomains);
        self.lib().invoke(|| unsafe { num(conn) }, to_len)
    }

    /// List domains matching `flags`; an empty set lists all of them.
    pub fn list_all_domains(&self, flags: ListDomainsFlags) -> Result<Vec<Domain>> {
        let conn = self.ptr()?;
        let list = native!(self.lib(), virConnectListAllDomains);

        let mut array: *mut VirDomainPtr = ptr::null_mut();
        let count = self
            .lib()
            .invoke(|| unsafe { list(conn, &mut array, flags.bits()) }, to_len)?;
        if array.is_null() {
            return Ok(Vec::new());
        }

        // SAFETY: libvirt returned `count` owned references in a malloc'd array.
        let domains = unsafe {
            let domains = std::slice::from_raw_parts(array, count)
                .iter()
                .map(|&ptr| self.wrap_domain(ptr))
                .collect();
            libc::free(array as *mut libc::c_void);
            domains
        };
        Ok(domains)
    }

    /// Get information about the host node.
    pub fn node_info(&self) -> Result<NodeInfo> {
        let conn = self.ptr()?;
        let get_info = native!(self.lib(), virNodeGetInfo);
        let mut info = VirNodeInfo::default();
        self.lib().check(|| unsafe { get_info(conn, &mut info) })?;
        Ok(NodeInfo::from(&info))
    }

    /// Look up a domain by name.
    pub fn domain_lookup_by_name(&self, name: &str) -> Result<Domain> {
        let conn = self.ptr()?;
        let lookup = native!(self.lib(), virDomainLookupByName);
        let name = to_cstring(name)?;
        self.lib()
            .invoke(|| unsafe { lookup(conn, name.as_ptr()) }, |ptr| self.wrap_domain(ptr))
    }

    /// Look up an active domain by its hypervisor id.
    pub fn domain_lookup_by_id(&self, id: u32) -> Result<Domain> {
        let conn = self.ptr()?;
        let lookup = native!(self.lib(), virDomainLookupByID);
        let id = c_int::try_from(id)
            .map_err(|_| Error::InvalidArgument(format!("domain id out of range: {}", id)))?;
        self.lib()
            .invoke(|| unsafe { lookup(conn, id) }, |ptr| self.wrap_domain(ptr))
    }

    /// Look up a domain by UUID.
    pub fn domain_lookup_by_uuid(&self, uuid: &Uuid) -> Result<Domain> {
        let conn = self.ptr()?;
        let lookup = native!(self.lib(), virDomainLookupByUUID);
        let bytes = uuid.as_bytes();
        self.lib()
            .invoke(|| unsafe { lookup(conn, bytes.as_ptr()) }, |ptr| self.wrap_domain(ptr))
    }

    /// Look up a domain by the textual form of its UUID.
    pub fn domain_lookup_by_uuid_string(&self, uuid: &str) -> Result<Domain> {
        let conn = self.ptr()?;
        let lookup = native!(self.lib(), virDomainLookupByUUIDString);
        let uuid = to_cstring(uuid)?;
        self.lib()
            .invoke(|| unsafe { lookup(conn, uuid.as_ptr()) }, |ptr| self.wrap_domain(ptr))
    }

    /// Define a persistent domain from its XML description, without starting it.
    pub fn domain_define_xml(&self, xml: &str) -> Result<Domain> {
        let conn = self.ptr()?;
        let define = native!(self.lib(), virDomainDefineXML);
        let xml = to_cstring(xml)?;
        self.lib()
            .invoke(|| unsafe { define(conn, xml.as_ptr()) }, |ptr| self.wrap_domain(ptr))
    }

    /// Create and start a transient domain from its XML description.
    pub fn domain_create_xml(&self, xml: &str, flags: CreateFlags) -> Result<Domain> {
        let conn = self.ptr()?;
        let create = native!(self.lib(), virDomainCreateXML);
        let xml = to_cstring(xml)?;
        self.lib().invoke(
            || unsafe { create(conn, xml.as_ptr(), flags.bits()) },
            |ptr| self.wrap_domain(ptr),
        )
    }
}

impl std::fmt::Debug for Connect {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connect")
            .field("id", &self.context.id)
            .field("closed", &self.handle.is_released())
            .finish()
    }
}
