//! Fake libvirt entry points for unit tests.
//!
//! A fake pointer is the address of a `FakeConnect`, `FakeDomain` or
//! `FakeSnapshot` kept alive by the test, so a test can inspect what the
//! binding asked libvirt to do. Errors go through a per-thread slot, the
//! same way libvirt reports them.

use std::cell::{Cell, RefCell};
use std::ffi::{CStr, CString};
use std::os::raw::{c_char, c_int, c_uchar, c_uint, c_ulong, c_ulonglong, c_void};
use std::ptr;
use std::slice;
use std::sync::atomic::{AtomicBool, AtomicI32, AtomicU32, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use crate::connect::Connect;
use crate::ffi::handles::{VirConnect, VirDomain, VirDomainSnapshot};
use crate::ffi::library::Library;
use crate::ffi::raw::*;
use crate::types::ConnectOptions;

pub const ERR_INTERNAL: i32 = 1;
pub const ERR_INVALID_ARG: i32 = 8;
pub const ERR_XML_ERROR: i32 = 27;
pub const ERR_SYSTEM_ERROR: i32 = 38;
pub const ERR_NO_DOMAIN: i32 = 42;
pub const ERR_OPERATION_INVALID: i32 = 55;
pub const ERR_NO_DOMAIN_SNAPSHOT: i32 = 72;

const FROM_RPC: i32 = 7;
const FROM_TEST: i32 = 12;
const FROM_DOMAIN: i32 = 20;
const FROM_SNAPSHOT: i32 = 35;
const FROM_EVENT: i32 = 40;

thread_local! {
    static LAST_ERROR: RefCell<Option<(i32, i32, String)>> = RefCell::new(None);
    static OPENED: RefCell<Vec<Arc<FakeConnect>>> = RefCell::new(Vec::new());
    static EVENT_LOOP_RUNS: Cell<usize> = Cell::new(0);
}

static NEXT_DOMAIN_ID: AtomicU32 = AtomicU32::new(1);

/// Set the calling thread's last error, as a failing libvirt call would.
pub fn fail(code: i32, domain: i32, message: &str) {
    LAST_ERROR.with(|slot| *slot.borrow_mut() = Some((code, domain, message.to_string())));
}

/// Code in the calling thread's error slot, 0 if empty.
pub fn last_error_code() -> i32 {
    LAST_ERROR.with(|slot| slot.borrow().as_ref().map_or(0, |err| err.0))
}

/// Number of times the default event loop ran on this thread.
pub fn event_loop_runs() -> usize {
    EVENT_LOOP_RUNS.with(|runs| runs.get())
}

/// Most recent connection opened on this thread.
pub fn last_opened() -> Arc<FakeConnect> {
    OPENED.with(|opened| opened.borrow().last().cloned().expect("no fake connection opened"))
}

/// Byte the fake disk and memory hold at `offset`.
pub fn pattern(offset: u64) -> u8 {
    (offset % 251) as u8
}

fn strdup(value: &str) -> *mut c_char {
    let value = CString::new(value).expect("fake string contains NUL");
    unsafe { libc::strdup(value.as_ptr()) }
}

unsafe fn read_str(ptr: *const c_char) -> String {
    CStr::from_ptr(ptr).to_string_lossy().into_owned()
}

fn xml_name(xml: &str) -> Option<String> {
    let start = xml.find("<name>")? + "<name>".len();
    let end = xml[start..].find("</name>")? + start;
    Some(xml[start..end].to_string())
}

fn uuid_for(name: &str) -> [u8; 16] {
    let mut uuid = [0u8; 16];
    for (i, byte) in name.bytes().enumerate() {
        uuid[i % 16] ^= byte.wrapping_add(i as u8);
    }
    uuid[15] ^= name.len() as u8;
    uuid
}

/// A fake `virConnectPtr`.
pub struct FakeConnect {
    uri: String,
    read_only: bool,
    refs: AtomicUsize,
    closes: AtomicUsize,
    domains: Mutex<Vec<Arc<FakeDomain>>>,
    events: Mutex<Vec<Registration>>,
    next_callback: AtomicI32,
    freed_callbacks: AtomicUsize,
}

#[derive(Clone, Copy)]
struct Registration {
    id: c_int,
    event_id: c_int,
    dom: VirDomainPtr,
    cb: VirConnectDomainEventGenericCallback,
    opaque: *mut c_void,
    freecb: VirFreeCallback,
}

impl FakeConnect {
    fn new(uri: String, read_only: bool) -> Self {
        Self {
            uri,
            read_only,
            refs: AtomicUsize::new(1),
            closes: AtomicUsize::new(0),
            domains: Mutex::new(Vec::new()),
            events: Mutex::new(Vec::new()),
            next_callback: AtomicI32::new(0),
            freed_callbacks: AtomicUsize::new(0),
        }
    }

    pub fn ptr(&self) -> VirConnectPtr {
        self as *const Self as *mut VirConnect
    }

    pub fn uri(&self) -> &str {
        &self.uri
    }

    pub fn is_read_only(&self) -> bool {
        self.read_only
    }

    pub fn closes(&self) -> usize {
        self.closes.load(Ordering::SeqCst)
    }

    /// Define an inactive domain.
    pub fn add_domain(&self, name: &str) -> Arc<FakeDomain> {
        let domain = FakeDomain::build(name, uuid_for(name), 0);
        self.insert(domain.clone());
        domain
    }

    /// Define and start a domain.
    pub fn add_running(&self, name: &str) -> Arc<FakeDomain> {
        let domain = self.add_domain(name);
        domain.start(1);
        domain
    }

    pub fn domain(&self, name: &str) -> Option<Arc<FakeDomain>> {
        self.domains.lock().unwrap().iter().find(|d| d.name == name).cloned()
    }

    fn insert(&self, domain: Arc<FakeDomain>) {
        self.domains.lock().unwrap().push(domain);
    }

    pub fn registrations(&self) -> usize {
        self.events.lock().unwrap().len()
    }

    pub fn freed_callbacks(&self) -> usize {
        self.freed_callbacks.load(Ordering::SeqCst)
    }

    fn matching(&self, event_id: c_int, dom: &FakeDomain) -> Vec<Registration> {
        self.events
            .lock()
            .unwrap()
            .iter()
            .filter(|r| r.event_id == event_id && (r.dom.is_null() || r.dom == dom.ptr()))
            .copied()
            .collect()
    }

    /// Deliver a lifecycle event; returns the number of callbacks run.
    pub fn fire_lifecycle(&self, dom: &FakeDomain, event: c_int, detail: c_int) -> usize {
        let regs = self.matching(VIR_DOMAIN_EVENT_ID_LIFECYCLE, dom);
        for reg in &regs {
            if let Some(cb) = reg.cb {
                unsafe {
                    let cb: VirConnectDomainEventLifecycleCallback = std::mem::transmute(cb);
                    cb(self.ptr(), dom.ptr(), event, detail, reg.opaque);
                }
            }
        }
        regs.len()
    }

    pub fn fire_reboot(&self, dom: &FakeDomain) -> usize {
        let regs = self.matching(VIR_DOMAIN_EVENT_ID_REBOOT, dom);
        for reg in &regs {
            if let Some(cb) = reg.cb {
                unsafe { cb(self.ptr(), dom.ptr(), reg.opaque) };
            }
        }
        regs.len()
    }

    pub fn fire_io_error(&self, dom: &FakeDomain, src: &str, alias: &str, action: c_int) -> usize {
        let src = CString::new(src).unwrap();
        let alias = CString::new(alias).unwrap();
        let regs = self.matching(VIR_DOMAIN_EVENT_ID_IO_ERROR, dom);
        for reg in &regs {
            if let Some(cb) = reg.cb {
                unsafe {
                    let cb: VirConnectDomainEventIoErrorCallback = std::mem::transmute(cb);
                    cb(self.ptr(), dom.ptr(), src.as_ptr(), alias.as_ptr(), action, reg.opaque);
                }
            }
        }
        regs.len()
    }

    pub fn fire_pm(&self, event_id: c_int, dom: &FakeDomain, reason: c_int) -> usize {
        let regs = self.matching(event_id, dom);
        for reg in &regs {
            if let Some(cb) = reg.cb {
                unsafe {
                    let cb: VirConnectDomainEventPmCallback = std::mem::transmute(cb);
                    cb(self.ptr(), dom.ptr(), reason, reg.opaque);
                }
            }
        }
        regs.len()
    }

    fn free_registration(&self, reg: Registration) {
        if let Some(freecb) = reg.freecb {
            unsafe { freecb(reg.opaque) };
        }
        self.freed_callbacks.fetch_add(1, Ordering::SeqCst);
    }
}

/// A fake `virDomainPtr`.
pub struct FakeDomain {
    name: String,
    name_c: CString,
    uuid: [u8; 16],
    id: Mutex<Option<u32>>,
    state: AtomicI32,
    refs: AtomicUsize,
    frees: AtomicUsize,
    fail_free: AtomicBool,
    fail_uuid: AtomicBool,
    persistent: AtomicBool,
    autostart: AtomicBool,
    managed_save: AtomicBool,
    max_memory: AtomicU64,
    memory: AtomicU64,
    cpu_shares: AtomicU64,
    peeks: Mutex<Vec<(u64, usize)>>,
    peek_flags: AtomicU32,
    fail_peek_at: Mutex<Option<u64>>,
    ops: Mutex<Vec<(&'static str, u64)>>,
    keys: Mutex<Vec<u32>>,
    migrations: Mutex<Vec<String>>,
    snapshots: Mutex<Vec<Arc<FakeSnapshot>>>,
    current_snapshot: Mutex<Option<String>>,
}

impl FakeDomain {
    /// A standalone domain holding one reference for the handle under test.
    pub fn new(name: &str) -> Arc<Self> {
        Self::build(name, uuid_for(name), 1)
    }

    fn build(name: &str, uuid: [u8; 16], refs: usize) -> Arc<Self> {
        Arc::new(Self {
            name: name.to_string(),
            name_c: CString::new(name).unwrap(),
            uuid,
            id: Mutex::new(None),
            state: AtomicI32::new(5),
            refs: AtomicUsize::new(refs),
            frees: AtomicUsize::new(0),
            fail_free: AtomicBool::new(false),
            fail_uuid: AtomicBool::new(false),
            persistent: AtomicBool::new(true),
            autostart: AtomicBool::new(false),
            managed_save: AtomicBool::new(false),
            max_memory: AtomicU64::new(1024 * 1024),
            memory: AtomicU64::new(512 * 1024),
            cpu_shares: AtomicU64::new(1024),
            peeks: Mutex::new(Vec::new()),
            peek_flags: AtomicU32::new(0),
            fail_peek_at: Mutex::new(None),
            ops: Mutex::new(Vec::new()),
            keys: Mutex::new(Vec::new()),
            migrations: Mutex::new(Vec::new()),
            snapshots: Mutex::new(Vec::new()),
            current_snapshot: Mutex::new(None),
        })
    }

    pub fn ptr(&self) -> VirDomainPtr {
        self as *const Self as *mut VirDomain
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn uuid(&self) -> uuid::Uuid {
        uuid::Uuid::from_bytes(self.uuid)
    }

    pub fn refs(&self) -> usize {
        self.refs.load(Ordering::SeqCst)
    }

    pub fn frees(&self) -> usize {
        self.frees.load(Ordering::SeqCst)
    }

    pub fn fail_free(&self, fail: bool) {
        self.fail_free.store(fail, Ordering::SeqCst);
    }

    pub fn fail_uuid(&self, fail: bool) {
        self.fail_uuid.store(fail, Ordering::SeqCst);
    }

    pub fn set_max_memory(&self, kib: u64) {
        self.max_memory.store(kib, Ordering::SeqCst);
    }

    pub fn memory(&self) -> u64 {
        self.memory.load(Ordering::SeqCst)
    }

    pub fn cpu_shares(&self) -> u64 {
        self.cpu_shares.load(Ordering::SeqCst)
    }

    pub fn state(&self) -> i32 {
        self.state.load(Ordering::SeqCst)
    }

    pub fn is_running(&self) -> bool {
        self.id.lock().unwrap().is_some()
    }

    pub fn peek_calls(&self) -> Vec<(u64, usize)> {
        self.peeks.lock().unwrap().clone()
    }

    pub fn peek_flags(&self) -> u32 {
        self.peek_flags.load(Ordering::SeqCst)
    }

    /// Make the peek starting at `offset` fail.
    pub fn fail_peek_at(&self, offset: u64) {
        *self.fail_peek_at.lock().unwrap() = Some(offset);
    }

    /// Recorded operations with their flags or main integer argument.
    pub fn ops(&self) -> Vec<(&'static str, u64)> {
        self.ops.lock().unwrap().clone()
    }

    pub fn keys(&self) -> Vec<u32> {
        self.keys.lock().unwrap().clone()
    }

    pub fn migrations(&self) -> Vec<String> {
        self.migrations.lock().unwrap().clone()
    }

    /// Live snapshot by name. Deleted snapshots stay allocated for handles
    /// that still point at them.
    pub fn snapshot(&self, name: &str) -> Option<Arc<FakeSnapshot>> {
        self.live_snapshots().into_iter().find(|s| s.name == name)
    }

    fn live_snapshots(&self) -> Vec<Arc<FakeSnapshot>> {
        self.snapshots
            .lock()
            .unwrap()
            .iter()
            .filter(|s| !s.is_deleted())
            .cloned()
            .collect()
    }

    pub fn add_snapshot(&self, name: &str) -> Arc<FakeSnapshot> {
        let parent = self.current_snapshot.lock().unwrap().clone();
        let snapshot = Arc::new(FakeSnapshot {
            name: name.to_string(),
            name_c: CString::new(name).unwrap(),
            parent,
            domain: self as *const Self,
            refs: AtomicUsize::new(0),
            frees: AtomicUsize::new(0),
            deleted: AtomicBool::new(false),
        });
        self.snapshots.lock().unwrap().push(snapshot.clone());
        *self.current_snapshot.lock().unwrap() = Some(name.to_string());
        snapshot
    }

    fn record(&self, op: &'static str, arg: u64) {
        self.ops.lock().unwrap().push((op, arg));
    }

    fn start(&self, state: i32) {
        *self.id.lock().unwrap() = Some(NEXT_DOMAIN_ID.fetch_add(1, Ordering::SeqCst));
        self.state.store(state, Ordering::SeqCst);
    }

    fn stop(&self) {
        *self.id.lock().unwrap() = None;
        self.state.store(5, Ordering::SeqCst);
    }

    fn hand_out(self: &Arc<Self>) -> VirDomainPtr {
        self.refs.fetch_add(1, Ordering::SeqCst);
        self.ptr()
    }
}

/// A fake `virDomainSnapshotPtr`.
pub struct FakeSnapshot {
    name: String,
    name_c: CString,
    parent: Option<String>,
    domain: *const FakeDomain,
    refs: AtomicUsize,
    frees: AtomicUsize,
    deleted: AtomicBool,
}

impl FakeSnapshot {
    pub fn ptr(&self) -> VirDomainSnapshotPtr {
        self as *const Self as *mut VirDomainSnapshot
    }

    pub fn refs(&self) -> usize {
        self.refs.load(Ordering::SeqCst)
    }

    pub fn frees(&self) -> usize {
        self.frees.load(Ordering::SeqCst)
    }

    pub fn is_deleted(&self) -> bool {
        self.deleted.load(Ordering::SeqCst)
    }

    fn hand_out(self: &Arc<Self>) -> VirDomainSnapshotPtr {
        self.refs.fetch_add(1, Ordering::SeqCst);
        self.ptr()
    }

    unsafe fn domain(&self) -> &FakeDomain {
        &*self.domain
    }
}

unsafe fn conn<'a>(ptr: VirConnectPtr) -> &'a FakeConnect {
    &*(ptr as *const FakeConnect)
}

unsafe fn dom<'a>(ptr: VirDomainPtr) -> &'a FakeDomain {
    &*(ptr as *const FakeDomain)
}

unsafe fn snap<'a>(ptr: VirDomainSnapshotPtr) -> &'a FakeSnapshot {
    &*(ptr as *const FakeSnapshot)
}

fn not_running(d: &FakeDomain) -> c_int {
    fail(
        ERR_OPERATION_INVALID,
        FROM_TEST,
        &format!("Requested operation is not valid: domain '{}' is not running", d.name),
    );
    -1
}

// Library and errors

unsafe extern "C" fn fake_initialize() -> c_int {
    0
}

unsafe extern "C" fn fake_get_version(
    lib_ver: *mut c_ulong,
    type_: *const c_char,
    type_ver: *mut c_ulong,
) -> c_int {
    if !lib_ver.is_null() {
        *lib_ver = 8_000_002;
    }
    if !type_.is_null() && !type_ver.is_null() {
        *type_ver = 8_000_002;
    }
    0
}

unsafe extern "C" fn fake_copy_last_error(to: *mut VirError) -> c_int {
    LAST_ERROR.with(|slot| match &*slot.borrow() {
        Some((code, domain, message)) => {
            (*to).code = *code;
            (*to).domain = *domain;
            (*to).level = 2;
            (*to).message = strdup(message);
            *code
        }
        None => {
            (*to).code = 0;
            0
        }
    })
}

unsafe extern "C" fn fake_reset_error(err: *mut VirError) {
    if !(*err).message.is_null() {
        libc::free((*err).message as *mut c_void);
    }
    *err = VirError::default();
}

unsafe extern "C" fn fake_reset_last_error() {
    LAST_ERROR.with(|slot| *slot.borrow_mut() = None);
}

unsafe extern "C" fn fake_event_register_default_impl() -> c_int {
    0
}

unsafe extern "C" fn fake_event_run_default_impl() -> c_int {
    EVENT_LOOP_RUNS.with(|runs| runs.set(runs.get() + 1));
    0
}

// Connections

unsafe fn open_fake(name: *const c_char, read_only: bool) -> VirConnectPtr {
    let uri = if name.is_null() {
        "test:///default".to_string()
    } else {
        read_str(name)
    };
    if uri.starts_with("fail") {
        fail(ERR_SYSTEM_ERROR, FROM_RPC, "Failed to connect socket: Connection refused");
        return ptr::null_mut();
    }
    let fake = Arc::new(FakeConnect::new(uri, read_only));
    let ptr = fake.ptr();
    OPENED.with(|opened| opened.borrow_mut().push(fake));
    ptr
}

unsafe extern "C" fn fake_connect_open(name: *const c_char) -> VirConnectPtr {
    open_fake(name, false)
}

unsafe extern "C" fn fake_connect_open_read_only(name: *const c_char) -> VirConnectPtr {
    open_fake(name, true)
}

unsafe extern "C" fn fake_connect_close(ptr: VirConnectPtr) -> c_int {
    let c = conn(ptr);
    c.closes.fetch_add(1, Ordering::SeqCst);
    let remaining = c.refs.fetch_sub(1, Ordering::SeqCst) - 1;
    if remaining == 0 {
        let regs: Vec<_> = c.events.lock().unwrap().drain(..).collect();
        for reg in regs {
            c.free_registration(reg);
        }
    }
    remaining as c_int
}

unsafe extern "C" fn fake_connect_ref(ptr: VirConnectPtr) -> c_int {
    conn(ptr).refs.fetch_add(1, Ordering::SeqCst);
    0
}

unsafe extern "C" fn fake_connect_get_uri(ptr: VirConnectPtr) -> *mut c_char {
    strdup(&conn(ptr).uri)
}

unsafe extern "C" fn fake_connect_get_hostname(_ptr: VirConnectPtr) -> *mut c_char {
    strdup("fake-host")
}

unsafe extern "C" fn fake_connect_get_type(_ptr: VirConnectPtr) -> *const c_char {
    b"Test\0".as_ptr() as *const c_char
}

unsafe extern "C" fn fake_connect_get_version(_ptr: VirConnectPtr, hv_ver: *mut c_ulong) -> c_int {
    *hv_ver = 2_000_000;
    0
}

unsafe extern "C" fn fake_connect_get_lib_version(
    _ptr: VirConnectPtr,
    lib_ver: *mut c_ulong,
) -> c_int {
    *lib_ver = 8_000_002;
    0
}

unsafe extern "C" fn fake_connect_is_alive(_ptr: VirConnectPtr) -> c_int {
    1
}

unsafe extern "C" fn fake_connect_num_of_domains(ptr: VirConnectPtr) -> c_int {
    conn(ptr).domains.lock().unwrap().iter().filter(|d| d.is_running()).count() as c_int
}

unsafe extern "C" fn fake_connect_list_all_domains(
    ptr: VirConnectPtr,
    domains: *mut *mut VirDomainPtr,
    flags: c_uint,
) -> c_int {
    let list: Vec<Arc<FakeDomain>> = conn(ptr)
        .domains
        .lock()
        .unwrap()
        .iter()
        .filter(|d| flags & 1 == 0 || d.is_running())
        .filter(|d| flags & 2 == 0 || !d.is_running())
        .cloned()
        .collect();

    if !domains.is_null() {
        let array = libc::malloc((list.len() + 1) * std::mem::size_of::<VirDomainPtr>())
            as *mut VirDomainPtr;
        for (i, d) in list.iter().enumerate() {
            *array.add(i) = d.hand_out();
        }
        *array.add(list.len()) = ptr::null_mut();
        *domains = array;
    }
    list.len() as c_int
}

unsafe extern "C" fn fake_node_get_info(_ptr: VirConnectPtr, info: *mut VirNodeInfo) -> c_int {
    let mut node = VirNodeInfo::default();
    for (slot, byte) in node.model.iter_mut().zip(b"x86_64") {
        *slot = *byte as c_char;
    }
    node.memory = 16 * 1024 * 1024;
    node.cpus = 8;
    node.mhz = 2400;
    node.nodes = 1;
    node.sockets = 1;
    node.cores = 4;
    node.threads = 2;
    *info = node;
    0
}

unsafe extern "C" fn fake_event_register_any(
    ptr: VirConnectPtr,
    dom: VirDomainPtr,
    event_id: c_int,
    cb: VirConnectDomainEventGenericCallback,
    opaque: *mut c_void,
    freecb: VirFreeCallback,
) -> c_int {
    let c = conn(ptr);
    if cb.is_none() {
        fail(ERR_INVALID_ARG, FROM_EVENT, "callback must not be NULL");
        return -1;
    }
    let id = c.next_callback.fetch_add(1, Ordering::SeqCst) + 1;
    c.events.lock().unwrap().push(Registration {
        id,
        event_id,
        dom,
        cb,
        opaque,
        freecb,
    });
    id
}

unsafe extern "C" fn fake_event_deregister_any(ptr: VirConnectPtr, callback_id: c_int) -> c_int {
    let c = conn(ptr);
    let reg = {
        let mut events = c.events.lock().unwrap();
        match events.iter().position(|r| r.id == callback_id) {
            Some(index) => events.remove(index),
            None => {
                fail(
                    ERR_INVALID_ARG,
                    FROM_EVENT,
                    &format!("could not find event callback {} for deletion", callback_id),
                );
                return -1;
            }
        }
    };
    c.free_registration(reg);
    0
}

// Domain lookup and creation

fn no_domain(what: &str) -> VirDomainPtr {
    fail(
        ERR_NO_DOMAIN,
        FROM_TEST,
        &format!("Domain not found: no domain with matching {}", what),
    );
    ptr::null_mut()
}

unsafe extern "C" fn fake_lookup_by_name(ptr: VirConnectPtr, name: *const c_char) -> VirDomainPtr {
    let name = read_str(name);
    match conn(ptr).domain(&name) {
        Some(d) => d.hand_out(),
        None => no_domain(&format!("name '{}'", name)),
    }
}

unsafe extern "C" fn fake_lookup_by_id(ptr: VirConnectPtr, id: c_int) -> VirDomainPtr {
    let found = conn(ptr)
        .domains
        .lock()
        .unwrap()
        .iter()
        .find(|d| d.id.lock().unwrap().map(|v| v as c_int) == Some(id))
        .cloned();
    match found {
        Some(d) => d.hand_out(),
        None => no_domain(&format!("id {}", id)),
    }
}

unsafe fn lookup_uuid(ptr: VirConnectPtr, uuid: [u8; 16]) -> VirDomainPtr {
    let found = conn(ptr).domains.lock().unwrap().iter().find(|d| d.uuid == uuid).cloned();
    match found {
        Some(d) => d.hand_out(),
        None => no_domain(&format!("uuid '{}'", uuid::Uuid::from_bytes(uuid))),
    }
}

unsafe extern "C" fn fake_lookup_by_uuid(ptr: VirConnectPtr, uuid: *const c_uchar) -> VirDomainPtr {
    let mut bytes = [0u8; 16];
    bytes.copy_from_slice(slice::from_raw_parts(uuid, 16));
    lookup_uuid(ptr, bytes)
}

unsafe extern "C" fn fake_lookup_by_uuid_string(
    ptr: VirConnectPtr,
    uuid: *const c_char,
) -> VirDomainPtr {
    match uuid::Uuid::parse_str(&read_str(uuid)) {
        Ok(parsed) => lookup_uuid(ptr, *parsed.as_bytes()),
        Err(_) => {
            fail(ERR_INVALID_ARG, FROM_TEST, "invalid argument: uuid");
            ptr::null_mut()
        }
    }
}

unsafe fn define(ptr: VirConnectPtr, xml: *const c_char) -> Option<Arc<FakeDomain>> {
    let c = conn(ptr);
    let name = match xml_name(&read_str(xml)) {
        Some(name) => name,
        None => {
            fail(ERR_XML_ERROR, FROM_DOMAIN, "XML error: missing domain name");
            return None;
        }
    };
    Some(c.domain(&name).unwrap_or_else(|| c.add_domain(&name)))
}

unsafe extern "C" fn fake_define_xml(ptr: VirConnectPtr, xml: *const c_char) -> VirDomainPtr {
    match define(ptr, xml) {
        Some(d) => d.hand_out(),
        None => ptr::null_mut(),
    }
}

unsafe extern "C" fn fake_create_xml(
    ptr: VirConnectPtr,
    xml: *const c_char,
    flags: c_uint,
) -> VirDomainPtr {
    match define(ptr, xml) {
        Some(d) => {
            d.persistent.store(false, Ordering::SeqCst);
            d.start(if flags & 1 != 0 { 3 } else { 1 });
            d.hand_out()
        }
        None => ptr::null_mut(),
    }
}

// Domain references

unsafe extern "C" fn fake_domain_free(ptr: VirDomainPtr) -> c_int {
    let d = dom(ptr);
    d.frees.fetch_add(1, Ordering::SeqCst);
    if d.fail_free.load(Ordering::SeqCst) {
        fail(ERR_INTERNAL, FROM_TEST, "internal error: failed to free domain");
        return -1;
    }
    d.refs.fetch_sub(1, Ordering::SeqCst);
    0
}

unsafe extern "C" fn fake_domain_ref(ptr: VirDomainPtr) -> c_int {
    dom(ptr).refs.fetch_add(1, Ordering::SeqCst);
    0
}

// Domain lifecycle

unsafe extern "C" fn fake_domain_create(ptr: VirDomainPtr) -> c_int {
    fake_domain_create_with_flags(ptr, 0)
}

unsafe extern "C" fn fake_domain_create_with_flags(ptr: VirDomainPtr, flags: c_uint) -> c_int {
    let d = dom(ptr);
    if d.is_running() {
        fail(
            ERR_OPERATION_INVALID,
            FROM_TEST,
            "Requested operation is not valid: domain is already running",
        );
        return -1;
    }
    d.record("create", flags as u64);
    d.start(if flags & 1 != 0 { 3 } else { 1 });
    0
}

unsafe extern "C" fn fake_domain_destroy(ptr: VirDomainPtr) -> c_int {
    fake_domain_destroy_flags(ptr, 0)
}

unsafe extern "C" fn fake_domain_destroy_flags(ptr: VirDomainPtr, flags: c_uint) -> c_int {
    let d = dom(ptr);
    if !d.is_running() {
        return not_running(d);
    }
    d.record("destroy", flags as u64);
    d.stop();
    0
}

unsafe extern "C" fn fake_domain_suspend(ptr: VirDomainPtr) -> c_int {
    let d = dom(ptr);
    if !d.is_running() {
        return not_running(d);
    }
    d.state.store(3, Ordering::SeqCst);
    0
}

unsafe extern "C" fn fake_domain_resume(ptr: VirDomainPtr) -> c_int {
    let d = dom(ptr);
    if d.state() != 3 {
        fail(
            ERR_OPERATION_INVALID,
            FROM_TEST,
            "Requested operation is not valid: domain is not paused",
        );
        return -1;
    }
    d.state.store(1, Ordering::SeqCst);
    0
}

unsafe extern "C" fn fake_domain_shutdown(ptr: VirDomainPtr) -> c_int {
    fake_domain_shutdown_flags(ptr, 0)
}

unsafe extern "C" fn fake_domain_shutdown_flags(ptr: VirDomainPtr, flags: c_uint) -> c_int {
    let d = dom(ptr);
    if !d.is_running() {
        return not_running(d);
    }
    d.record("shutdown", flags as u64);
    d.stop();
    0
}

unsafe extern "C" fn fake_domain_reboot(ptr: VirDomainPtr, flags: c_uint) -> c_int {
    let d = dom(ptr);
    if !d.is_running() {
        return not_running(d);
    }
    d.record("reboot", flags as u64);
    0
}

unsafe extern "C" fn fake_domain_reset(ptr: VirDomainPtr, flags: c_uint) -> c_int {
    dom(ptr).record("reset", flags as u64);
    0
}

unsafe extern "C" fn fake_domain_undefine(ptr: VirDomainPtr) -> c_int {
    fake_domain_undefine_flags(ptr, 0)
}

unsafe extern "C" fn fake_domain_undefine_flags(ptr: VirDomainPtr, flags: c_uint) -> c_int {
    let d = dom(ptr);
    d.persistent.store(false, Ordering::SeqCst);
    d.record("undefine", flags as u64);
    0
}

unsafe extern "C" fn fake_domain_save(ptr: VirDomainPtr, to: *const c_char) -> c_int {
    let d = dom(ptr);
    if !d.is_running() {
        return not_running(d);
    }
    d.migrations.lock().unwrap().push(format!("save:{}", read_str(to)));
    d.record("save", 0);
    d.stop();
    0
}

unsafe extern "C" fn fake_domain_managed_save(ptr: VirDomainPtr, flags: c_uint) -> c_int {
    let d = dom(ptr);
    if !d.is_running() {
        return not_running(d);
    }
    d.record("managed_save", flags as u64);
    d.managed_save.store(true, Ordering::SeqCst);
    d.stop();
    0
}

unsafe extern "C" fn fake_domain_has_managed_save(ptr: VirDomainPtr, _flags: c_uint) -> c_int {
    dom(ptr).managed_save.load(Ordering::SeqCst) as c_int
}

unsafe extern "C" fn fake_domain_managed_save_remove(ptr: VirDomainPtr, _flags: c_uint) -> c_int {
    dom(ptr).managed_save.store(false, Ordering::SeqCst);
    0
}

unsafe extern "C" fn fake_domain_core_dump(
    ptr: VirDomainPtr,
    to: *const c_char,
    flags: c_uint,
) -> c_int {
    let d = dom(ptr);
    d.migrations.lock().unwrap().push(format!("dump:{}", read_str(to)));
    d.record("core_dump", flags as u64);
    0
}

unsafe extern "C" fn fake_domain_abort_job(_ptr: VirDomainPtr) -> c_int {
    fail(
        ERR_OPERATION_INVALID,
        FROM_TEST,
        "Requested operation is not valid: no job is active on the domain",
    );
    -1
}

unsafe extern "C" fn fake_domain_pm_suspend(
    ptr: VirDomainPtr,
    target: c_uint,
    duration: c_ulonglong,
    _flags: c_uint,
) -> c_int {
    let d = dom(ptr);
    d.record("pm_suspend", target as u64);
    d.record("pm_suspend_duration", duration);
    0
}

unsafe extern "C" fn fake_domain_pm_wakeup(ptr: VirDomainPtr, flags: c_uint) -> c_int {
    dom(ptr).record("pm_wakeup", flags as u64);
    0
}

unsafe extern "C" fn fake_domain_send_key(
    ptr: VirDomainPtr,
    codeset: c_uint,
    holdtime: c_uint,
    keycodes: *mut c_uint,
    nkeycodes: c_int,
    _flags: c_uint,
) -> c_int {
    let d = dom(ptr);
    let keys = slice::from_raw_parts(keycodes, nkeycodes as usize);
    d.keys.lock().unwrap().extend_from_slice(keys);
    d.record("send_key", codeset as u64);
    d.record("send_key_hold", holdtime as u64);
    0
}

// Domain queries

unsafe extern "C" fn fake_domain_get_name(ptr: VirDomainPtr) -> *const c_char {
    dom(ptr).name_c.as_ptr()
}

unsafe extern "C" fn fake_domain_get_id(ptr: VirDomainPtr) -> c_uint {
    // Inactive domains report the sentinel without setting an error.
    dom(ptr).id.lock().unwrap().unwrap_or(c_uint::MAX)
}

unsafe extern "C" fn fake_domain_get_uuid(ptr: VirDomainPtr, uuid: *mut c_uchar) -> c_int {
    let d = dom(ptr);
    if d.fail_uuid.load(Ordering::SeqCst) {
        fail(ERR_INTERNAL, FROM_TEST, "internal error: uuid unavailable");
        return -1;
    }
    ptr::copy_nonoverlapping(d.uuid.as_ptr(), uuid, VIR_UUID_BUFLEN);
    0
}

unsafe extern "C" fn fake_domain_get_uuid_string(ptr: VirDomainPtr, buf: *mut c_char) -> c_int {
    let d = dom(ptr);
    let text = CString::new(d.uuid().hyphenated().to_string()).unwrap();
    let bytes = text.as_bytes_with_nul();
    ptr::copy_nonoverlapping(bytes.as_ptr() as *const c_char, buf, bytes.len());
    0
}

unsafe extern "C" fn fake_domain_get_os_type(_ptr: VirDomainPtr) -> *mut c_char {
    strdup("hvm")
}

unsafe extern "C" fn fake_domain_get_xml_desc(ptr: VirDomainPtr, flags: c_uint) -> *mut c_char {
    let d = dom(ptr);
    d.record("xml_desc", flags as u64);
    strdup(&format!(
        "<domain type='test'><name>{}</name><uuid>{}</uuid></domain>",
        d.name,
        d.uuid()
    ))
}

unsafe extern "C" fn fake_domain_get_info(ptr: VirDomainPtr, info: *mut VirDomainInfo) -> c_int {
    let d = dom(ptr);
    *info = VirDomainInfo {
        state: d.state() as c_uchar,
        max_mem: d.max_memory.load(Ordering::SeqCst) as c_ulong,
        memory: d.memory() as c_ulong,
        nr_virt_cpu: 2,
        cpu_time: if d.is_running() { 1_000_000 } else { 0 },
    };
    0
}

unsafe extern "C" fn fake_domain_get_state(
    ptr: VirDomainPtr,
    state: *mut c_int,
    reason: *mut c_int,
    _flags: c_uint,
) -> c_int {
    *state = dom(ptr).state();
    if !reason.is_null() {
        *reason = 1;
    }
    0
}

unsafe extern "C" fn fake_domain_get_job_info(
    _ptr: VirDomainPtr,
    info: *mut VirDomainJobInfo,
) -> c_int {
    *info = VirDomainJobInfo::default();
    0
}

unsafe extern "C" fn fake_domain_get_control_info(
    _ptr: VirDomainPtr,
    info: *mut VirDomainControlInfo,
    _flags: c_uint,
) -> c_int {
    *info = VirDomainControlInfo {
        state: 0,
        details: 0,
        state_time: 12,
    };
    0
}

unsafe extern "C" fn fake_domain_get_max_memory(ptr: VirDomainPtr) -> c_ulong {
    let max = dom(ptr).max_memory.load(Ordering::SeqCst);
    if max == 0 {
        fail(ERR_INTERNAL, FROM_TEST, "internal error: max memory unavailable");
    }
    max as c_ulong
}

unsafe extern "C" fn fake_domain_get_max_vcpus(_ptr: VirDomainPtr) -> c_int {
    4
}

unsafe extern "C" fn fake_domain_get_autostart(ptr: VirDomainPtr, autostart: *mut c_int) -> c_int {
    *autostart = dom(ptr).autostart.load(Ordering::SeqCst) as c_int;
    0
}

unsafe extern "C" fn fake_domain_set_autostart(ptr: VirDomainPtr, autostart: c_int) -> c_int {
    dom(ptr).autostart.store(autostart != 0, Ordering::SeqCst);
    0
}

unsafe extern "C" fn fake_domain_is_active(ptr: VirDomainPtr) -> c_int {
    dom(ptr).is_running() as c_int
}

unsafe extern "C" fn fake_domain_is_persistent(ptr: VirDomainPtr) -> c_int {
    dom(ptr).persistent.load(Ordering::SeqCst) as c_int
}

unsafe extern "C" fn fake_domain_is_updated(_ptr: VirDomainPtr) -> c_int {
    0
}

unsafe extern "C" fn fake_domain_get_security_label(
    _ptr: VirDomainPtr,
    seclabel: *mut VirSecurityLabel,
) -> c_int {
    let mut label = VirSecurityLabel::default();
    for (slot, byte) in label.label.iter_mut().zip(b"system_u:system_r:svirt_t:s0:c1,c2") {
        *slot = *byte as c_char;
    }
    label.enforcing = 1;
    *seclabel = label;
    0
}

// Domain tuning

unsafe extern "C" fn fake_domain_set_max_memory(ptr: VirDomainPtr, memory: c_ulong) -> c_int {
    dom(ptr).max_memory.store(memory as u64, Ordering::SeqCst);
    0
}

unsafe extern "C" fn fake_domain_set_memory(ptr: VirDomainPtr, memory: c_ulong) -> c_int {
    fake_domain_set_memory_flags(ptr, memory, 0)
}

unsafe extern "C" fn fake_domain_set_memory_flags(
    ptr: VirDomainPtr,
    memory: c_ulong,
    flags: c_uint,
) -> c_int {
    let d = dom(ptr);
    if memory as u64 > d.max_memory.load(Ordering::SeqCst) {
        fail(
            ERR_INVALID_ARG,
            FROM_TEST,
            "invalid argument: cannot set memory higher than max memory",
        );
        return -1;
    }
    d.memory.store(memory as u64, Ordering::SeqCst);
    d.record("set_memory", flags as u64);
    0
}

unsafe extern "C" fn fake_domain_set_vcpus(ptr: VirDomainPtr, nvcpus: c_uint) -> c_int {
    fake_domain_set_vcpus_flags(ptr, nvcpus, 0)
}

unsafe extern "C" fn fake_domain_set_vcpus_flags(
    ptr: VirDomainPtr,
    nvcpus: c_uint,
    _flags: c_uint,
) -> c_int {
    dom(ptr).record("set_vcpus", nvcpus as u64);
    0
}

unsafe extern "C" fn fake_domain_get_vcpus(
    _ptr: VirDomainPtr,
    info: *mut VirVcpuInfo,
    maxinfo: c_int,
    cpumaps: *mut c_uchar,
    maplen: c_int,
) -> c_int {
    let count = maxinfo.min(2).max(0) as usize;
    for i in 0..count {
        *info.add(i) = VirVcpuInfo {
            number: i as c_uint,
            state: 1,
            cpu_time: 1000 * (i as u64 + 1),
            cpu: i as c_int,
        };
    }
    if !cpumaps.is_null() {
        let maplen = maplen as usize;
        let maps = slice::from_raw_parts_mut(cpumaps, count * maplen);
        maps.fill(0);
        for i in 0..count {
            if i < maplen * 8 {
                maps[i * maplen + i / 8] |= 1 << (i % 8);
            }
        }
    }
    count as c_int
}

unsafe extern "C" fn fake_domain_pin_vcpu(
    ptr: VirDomainPtr,
    vcpu: c_uint,
    _cpumap: *mut c_uchar,
    maplen: c_int,
) -> c_int {
    let d = dom(ptr);
    d.record("pin_vcpu", vcpu as u64);
    d.record("pin_vcpu_maplen", maplen as u64);
    0
}

unsafe extern "C" fn fake_domain_get_scheduler_type(
    _ptr: VirDomainPtr,
    nparams: *mut c_int,
) -> *mut c_char {
    if !nparams.is_null() {
        *nparams = 1;
    }
    strdup("posix")
}

unsafe extern "C" fn fake_domain_get_scheduler_parameters(
    ptr: VirDomainPtr,
    params: *mut VirTypedParameter,
    nparams: *mut c_int,
) -> c_int {
    if *nparams < 1 {
        fail(ERR_INVALID_ARG, FROM_TEST, "invalid argument: nparams too small");
        return -1;
    }
    let mut param = VirTypedParameter::default();
    for (slot, byte) in param.field.iter_mut().zip(b"cpu_shares") {
        *slot = *byte as c_char;
    }
    param.type_ = VIR_TYPED_PARAM_ULLONG;
    param.value.ul = dom(ptr).cpu_shares();
    *params = param;
    *nparams = 1;
    0
}

unsafe extern "C" fn fake_domain_set_scheduler_parameters(
    ptr: VirDomainPtr,
    params: *mut VirTypedParameter,
    nparams: c_int,
) -> c_int {
    let d = dom(ptr);
    for param in slice::from_raw_parts(params, nparams as usize) {
        let field = read_str(param.field.as_ptr());
        if field != "cpu_shares" || param.type_ != VIR_TYPED_PARAM_ULLONG {
            fail(
                ERR_INVALID_ARG,
                FROM_TEST,
                &format!("invalid argument: unexpected parameter {}", field),
            );
            return -1;
        }
        d.cpu_shares.store(param.value.ul, Ordering::SeqCst);
    }
    0
}

// Devices

unsafe fn device_op(
    ptr: VirDomainPtr,
    op: &'static str,
    xml: *const c_char,
    flags: c_uint,
) -> c_int {
    let d = dom(ptr);
    if !read_str(xml).trim_start().starts_with('<') {
        fail(ERR_XML_ERROR, FROM_DOMAIN, "XML error: failed to parse device");
        return -1;
    }
    d.record(op, flags as u64);
    0
}

unsafe extern "C" fn fake_domain_attach_device(ptr: VirDomainPtr, xml: *const c_char) -> c_int {
    device_op(ptr, "attach_device", xml, 0)
}

unsafe extern "C" fn fake_domain_attach_device_flags(
    ptr: VirDomainPtr,
    xml: *const c_char,
    flags: c_uint,
) -> c_int {
    device_op(ptr, "attach_device", xml, flags)
}

unsafe extern "C" fn fake_domain_detach_device(ptr: VirDomainPtr, xml: *const c_char) -> c_int {
    device_op(ptr, "detach_device", xml, 0)
}

unsafe extern "C" fn fake_domain_detach_device_flags(
    ptr: VirDomainPtr,
    xml: *const c_char,
    flags: c_uint,
) -> c_int {
    device_op(ptr, "detach_device", xml, flags)
}

unsafe extern "C" fn fake_domain_update_device_flags(
    ptr: VirDomainPtr,
    xml: *const c_char,
    flags: c_uint,
) -> c_int {
    device_op(ptr, "update_device", xml, flags)
}

// Block and memory

fn check_disk(disk: &str) -> bool {
    if disk == "vda" || disk == "vdb" {
        return true;
    }
    fail(ERR_INVALID_ARG, FROM_TEST, &format!("invalid argument: invalid path: {}", disk));
    false
}

unsafe extern "C" fn fake_domain_block_stats(
    _ptr: VirDomainPtr,
    disk: *const c_char,
    stats: *mut VirDomainBlockStats,
    size: usize,
) -> c_int {
    if !check_disk(&read_str(disk)) {
        return -1;
    }
    if size != std::mem::size_of::<VirDomainBlockStats>() {
        fail(ERR_INVALID_ARG, FROM_TEST, "invalid argument: stats size");
        return -1;
    }
    *stats = VirDomainBlockStats {
        rd_req: 10,
        rd_bytes: 4096,
        wr_req: 5,
        wr_bytes: 2048,
        errs: -1,
    };
    0
}

unsafe extern "C" fn fake_domain_interface_stats(
    _ptr: VirDomainPtr,
    device: *const c_char,
    stats: *mut VirDomainInterfaceStats,
    size: usize,
) -> c_int {
    if read_str(device) != "vnet0" || size != std::mem::size_of::<VirDomainInterfaceStats>() {
        fail(ERR_INVALID_ARG, FROM_TEST, "invalid argument: invalid interface");
        return -1;
    }
    *stats = VirDomainInterfaceStats {
        rx_bytes: 1500,
        rx_packets: 1,
        rx_errs: 0,
        rx_drop: 0,
        tx_bytes: 3000,
        tx_packets: 2,
        tx_errs: 0,
        tx_drop: 0,
    };
    0
}

unsafe extern "C" fn fake_domain_get_block_info(
    _ptr: VirDomainPtr,
    disk: *const c_char,
    info: *mut VirDomainBlockInfo,
    _flags: c_uint,
) -> c_int {
    if !check_disk(&read_str(disk)) {
        return -1;
    }
    *info = VirDomainBlockInfo {
        capacity: 10 << 30,
        allocation: 1 << 30,
        physical: 2 << 30,
    };
    0
}

unsafe extern "C" fn fake_domain_block_resize(
    ptr: VirDomainPtr,
    disk: *const c_char,
    size: c_ulonglong,
    flags: c_uint,
) -> c_int {
    if !check_disk(&read_str(disk)) {
        return -1;
    }
    let d = dom(ptr);
    d.record("block_resize", size);
    d.record("block_resize_flags", flags as u64);
    0
}

unsafe fn peek(d: &FakeDomain, offset: u64, size: usize, buffer: *mut c_void) -> c_int {
    d.peeks.lock().unwrap().push((offset, size));
    if size > 65536 {
        fail(ERR_INVALID_ARG, FROM_TEST, "invalid argument: peek request too large");
        return -1;
    }
    if *d.fail_peek_at.lock().unwrap() == Some(offset) {
        fail(ERR_SYSTEM_ERROR, FROM_TEST, "failed to read: Input/output error");
        return -1;
    }
    let out = slice::from_raw_parts_mut(buffer as *mut u8, size);
    for (i, byte) in out.iter_mut().enumerate() {
        *byte = pattern(offset + i as u64);
    }
    0
}

unsafe extern "C" fn fake_domain_block_peek(
    ptr: VirDomainPtr,
    disk: *const c_char,
    offset: c_ulonglong,
    size: usize,
    buffer: *mut c_void,
    _flags: c_uint,
) -> c_int {
    if !check_disk(&read_str(disk)) {
        return -1;
    }
    peek(dom(ptr), offset, size, buffer)
}

unsafe extern "C" fn fake_domain_memory_peek(
    ptr: VirDomainPtr,
    start: c_ulonglong,
    size: usize,
    buffer: *mut c_void,
    flags: c_uint,
) -> c_int {
    let d = dom(ptr);
    d.peek_flags.store(flags, Ordering::SeqCst);
    peek(d, start, size, buffer)
}

unsafe extern "C" fn fake_domain_memory_stats(
    _ptr: VirDomainPtr,
    stats: *mut VirDomainMemoryStat,
    nr_stats: c_uint,
    _flags: c_uint,
) -> c_int {
    let values = [(6, 1024 * 1024), (7, 512 * 1024), (4, 256 * 1024)];
    let count = values.len().min(nr_stats as usize);
    for (i, (tag, val)) in values.iter().take(count).enumerate() {
        *stats.add(i) = VirDomainMemoryStat { tag: *tag, val: *val };
    }
    count as c_int
}

unsafe extern "C" fn fake_domain_get_block_job_info(
    _ptr: VirDomainPtr,
    disk: *const c_char,
    info: *mut VirDomainBlockJobInfo,
    _flags: c_uint,
) -> c_int {
    let disk = read_str(disk);
    if !check_disk(&disk) {
        return -1;
    }
    if disk != "vdb" {
        return 0;
    }
    *info = VirDomainBlockJobInfo {
        type_: 1,
        bandwidth: 10,
        cur: 50,
        end: 100,
    };
    1
}

unsafe extern "C" fn fake_domain_block_job_abort(
    ptr: VirDomainPtr,
    disk: *const c_char,
    flags: c_uint,
) -> c_int {
    if !check_disk(&read_str(disk)) {
        return -1;
    }
    dom(ptr).record("block_job_abort", flags as u64);
    0
}

unsafe extern "C" fn fake_domain_block_job_set_speed(
    ptr: VirDomainPtr,
    disk: *const c_char,
    bandwidth: c_ulong,
    _flags: c_uint,
) -> c_int {
    if !check_disk(&read_str(disk)) {
        return -1;
    }
    dom(ptr).record("block_job_set_speed", bandwidth as u64);
    0
}

// Migration

unsafe fn migrate_into(
    ptr: VirDomainPtr,
    dconn: VirConnectPtr,
    op: &'static str,
    flags: c_ulong,
    dname: *const c_char,
) -> VirDomainPtr {
    let d = dom(ptr);
    let dest = conn(dconn);
    let name = if dname.is_null() {
        d.name.clone()
    } else {
        read_str(dname)
    };
    d.record(op, flags as u64);
    d.migrations.lock().unwrap().push(format!("{}:{}", dest.uri, name));

    let target = match dest.domain(&name) {
        Some(existing) => existing,
        None => {
            let migrated = FakeDomain::build(&name, d.uuid, 0);
            dest.insert(migrated.clone());
            migrated
        }
    };
    target.start(1);
    d.stop();
    target.hand_out()
}

unsafe extern "C" fn fake_domain_migrate(
    ptr: VirDomainPtr,
    dconn: VirConnectPtr,
    flags: c_ulong,
    dname: *const c_char,
    _uri: *const c_char,
    _bandwidth: c_ulong,
) -> VirDomainPtr {
    migrate_into(ptr, dconn, "migrate", flags, dname)
}

unsafe extern "C" fn fake_domain_migrate2(
    ptr: VirDomainPtr,
    dconn: VirConnectPtr,
    dxml: *const c_char,
    flags: c_ulong,
    dname: *const c_char,
    _uri: *const c_char,
    _bandwidth: c_ulong,
) -> VirDomainPtr {
    if dxml.is_null() {
        fail(ERR_INVALID_ARG, FROM_TEST, "invalid argument: dxml");
        return ptr::null_mut();
    }
    migrate_into(ptr, dconn, "migrate2", flags, dname)
}

unsafe fn migrate_uri(
    ptr: VirDomainPtr,
    op: &'static str,
    uri: *const c_char,
    flags: c_ulong,
) -> c_int {
    let d = dom(ptr);
    if flags & 2 == 0 {
        fail(
            ERR_INVALID_ARG,
            FROM_TEST,
            "invalid argument: migration to URI requires peer2peer",
        );
        return -1;
    }
    let uri = if uri.is_null() {
        String::new()
    } else {
        read_str(uri)
    };
    d.record(op, flags as u64);
    d.migrations.lock().unwrap().push(uri);
    d.stop();
    0
}

unsafe extern "C" fn fake_domain_migrate_to_uri(
    ptr: VirDomainPtr,
    duri: *const c_char,
    flags: c_ulong,
    _dname: *const c_char,
    _bandwidth: c_ulong,
) -> c_int {
    migrate_uri(ptr, "migrate_to_uri", duri, flags)
}

unsafe extern "C" fn fake_domain_migrate_to_uri2(
    ptr: VirDomainPtr,
    dconnuri: *const c_char,
    _miguri: *const c_char,
    _dxml: *const c_char,
    flags: c_ulong,
    _dname: *const c_char,
    _bandwidth: c_ulong,
) -> c_int {
    migrate_uri(ptr, "migrate_to_uri2", dconnuri, flags)
}

unsafe extern "C" fn fake_domain_migrate_set_max_downtime(
    ptr: VirDomainPtr,
    downtime: c_ulonglong,
    _flags: c_uint,
) -> c_int {
    dom(ptr).record("max_downtime", downtime);
    0
}

unsafe extern "C" fn fake_domain_migrate_set_max_speed(
    ptr: VirDomainPtr,
    bandwidth: c_ulong,
    _flags: c_uint,
) -> c_int {
    dom(ptr).record("max_speed", bandwidth as u64);
    0
}

// Snapshots

fn no_snapshot(what: &str) -> VirDomainSnapshotPtr {
    fail(
        ERR_NO_DOMAIN_SNAPSHOT,
        FROM_SNAPSHOT,
        &format!("Domain snapshot not found: {}", what),
    );
    ptr::null_mut()
}

unsafe extern "C" fn fake_snapshot_create_xml(
    ptr: VirDomainPtr,
    xml: *const c_char,
    flags: c_uint,
) -> VirDomainSnapshotPtr {
    let d = dom(ptr);
    let name = match xml_name(&read_str(xml)) {
        Some(name) => name,
        None => {
            fail(ERR_XML_ERROR, FROM_SNAPSHOT, "XML error: missing snapshot name");
            return ptr::null_mut();
        }
    };
    if d.snapshot(&name).is_some() {
        fail(
            ERR_OPERATION_INVALID,
            FROM_SNAPSHOT,
            &format!("Requested operation is not valid: snapshot '{}' already exists", name),
        );
        return ptr::null_mut();
    }
    d.record("snapshot_create", flags as u64);
    d.add_snapshot(&name).hand_out()
}

unsafe extern "C" fn fake_snapshot_current(
    ptr: VirDomainPtr,
    _flags: c_uint,
) -> VirDomainSnapshotPtr {
    let d = dom(ptr);
    let current = d.current_snapshot.lock().unwrap().clone();
    match current.and_then(|name| d.snapshot(&name)) {
        Some(s) => s.hand_out(),
        None => no_snapshot("the domain does not have a current snapshot"),
    }
}

unsafe extern "C" fn fake_snapshot_lookup_by_name(
    ptr: VirDomainPtr,
    name: *const c_char,
    _flags: c_uint,
) -> VirDomainSnapshotPtr {
    let name = read_str(name);
    match dom(ptr).snapshot(&name) {
        Some(s) => s.hand_out(),
        None => no_snapshot(&format!("no domain snapshot with matching name '{}'", name)),
    }
}

unsafe extern "C" fn fake_snapshot_num(ptr: VirDomainPtr, _flags: c_uint) -> c_int {
    dom(ptr).live_snapshots().len() as c_int
}

unsafe extern "C" fn fake_snapshot_list_names(
    ptr: VirDomainPtr,
    names: *mut *mut c_char,
    nameslen: c_int,
    _flags: c_uint,
) -> c_int {
    let snapshots = dom(ptr).live_snapshots();
    let count = snapshots.len().min(nameslen.max(0) as usize);
    for (i, s) in snapshots.iter().take(count).enumerate() {
        *names.add(i) = strdup(&s.name);
    }
    count as c_int
}

unsafe extern "C" fn fake_has_current_snapshot(ptr: VirDomainPtr, _flags: c_uint) -> c_int {
    dom(ptr).current_snapshot.lock().unwrap().is_some() as c_int
}

unsafe extern "C" fn fake_revert_to_snapshot(ptr: VirDomainSnapshotPtr, flags: c_uint) -> c_int {
    let s = snap(ptr);
    let d = s.domain();
    d.record("revert", flags as u64);
    *d.current_snapshot.lock().unwrap() = Some(s.name.clone());
    if flags & 1 != 0 && !d.is_running() {
        d.start(1);
    }
    0
}

unsafe extern "C" fn fake_snapshot_delete(ptr: VirDomainSnapshotPtr, flags: c_uint) -> c_int {
    let s = snap(ptr);
    let d = s.domain();
    if s.is_deleted() {
        no_snapshot(&s.name);
        return -1;
    }
    d.record("snapshot_delete", flags as u64);
    let mut current = d.current_snapshot.lock().unwrap();
    if current.as_deref() == Some(s.name.as_str()) {
        *current = s.parent.clone();
    }
    s.deleted.store(true, Ordering::SeqCst);
    0
}

unsafe extern "C" fn fake_snapshot_free(ptr: VirDomainSnapshotPtr) -> c_int {
    let s = snap(ptr);
    s.frees.fetch_add(1, Ordering::SeqCst);
    s.refs.fetch_sub(1, Ordering::SeqCst);
    0
}

unsafe extern "C" fn fake_snapshot_ref(ptr: VirDomainSnapshotPtr) -> c_int {
    snap(ptr).refs.fetch_add(1, Ordering::SeqCst);
    0
}

unsafe extern "C" fn fake_snapshot_get_name(ptr: VirDomainSnapshotPtr) -> *const c_char {
    snap(ptr).name_c.as_ptr()
}

unsafe extern "C" fn fake_snapshot_get_domain(ptr: VirDomainSnapshotPtr) -> VirDomainPtr {
    snap(ptr).domain().ptr()
}

unsafe extern "C" fn fake_snapshot_get_xml_desc(
    ptr: VirDomainSnapshotPtr,
    _flags: c_uint,
) -> *mut c_char {
    strdup(&format!(
        "<domainsnapshot><name>{}</name></domainsnapshot>",
        snap(ptr).name
    ))
}

unsafe extern "C" fn fake_snapshot_get_parent(
    ptr: VirDomainSnapshotPtr,
    _flags: c_uint,
) -> VirDomainSnapshotPtr {
    let s = snap(ptr);
    match s.parent.as_deref().and_then(|parent| s.domain().snapshot(parent)) {
        Some(parent) => parent.hand_out(),
        None => no_snapshot(&format!("snapshot '{}' does not have a parent", s.name)),
    }
}

unsafe extern "C" fn fake_snapshot_is_current(ptr: VirDomainSnapshotPtr, _flags: c_uint) -> c_int {
    let s = snap(ptr);
    (s.domain().current_snapshot.lock().unwrap().as_deref() == Some(s.name.as_str())) as c_int
}

/// Entry point table backed by the fakes in this module.
pub fn api() -> NativeApi {
    let mut api = NativeApi::default();

    api.virInitialize = Some(fake_initialize);
    api.virGetVersion = Some(fake_get_version);
    api.virCopyLastError = Some(fake_copy_last_error);
    api.virResetError = Some(fake_reset_error);
    api.virResetLastError = Some(fake_reset_last_error);
    api.virEventRegisterDefaultImpl = Some(fake_event_register_default_impl);
    api.virEventRunDefaultImpl = Some(fake_event_run_default_impl);

    api.virConnectOpen = Some(fake_connect_open);
    api.virConnectOpenReadOnly = Some(fake_connect_open_read_only);
    api.virConnectClose = Some(fake_connect_close);
    api.virConnectRef = Some(fake_connect_ref);
    api.virConnectGetURI = Some(fake_connect_get_uri);
    api.virConnectGetHostname = Some(fake_connect_get_hostname);
    api.virConnectGetType = Some(fake_connect_get_type);
    api.virConnectGetVersion = Some(fake_connect_get_version);
    api.virConnectGetLibVersion = Some(fake_connect_get_lib_version);
    api.virConnectIsAlive = Some(fake_connect_is_alive);
    api.virConnectNumOfDomains = Some(fake_connect_num_of_domains);
    api.virConnectListAllDomains = Some(fake_connect_list_all_domains);
    api.virNodeGetInfo = Some(fake_node_get_info);
    api.virConnectDomainEventRegisterAny = Some(fake_event_register_any);
    api.virConnectDomainEventDeregisterAny = Some(fake_event_deregister_any);

    api.virDomainLookupByName = Some(fake_lookup_by_name);
    api.virDomainLookupByID = Some(fake_lookup_by_id);
    api.virDomainLookupByUUID = Some(fake_lookup_by_uuid);
    api.virDomainLookupByUUIDString = Some(fake_lookup_by_uuid_string);
    api.virDomainDefineXML = Some(fake_define_xml);
    api.virDomainCreateXML = Some(fake_create_xml);

    api.virDomainFree = Some(fake_domain_free);
    api.virDomainRef = Some(fake_domain_ref);

    api.virDomainCreate = Some(fake_domain_create);
    api.virDomainCreateWithFlags = Some(fake_domain_create_with_flags);
    api.virDomainDestroy = Some(fake_domain_destroy);
    api.virDomainDestroyFlags = Some(fake_domain_destroy_flags);
    api.virDomainSuspend = Some(fake_domain_suspend);
    api.virDomainResume = Some(fake_domain_resume);
    api.virDomainShutdown = Some(fake_domain_shutdown);
    api.virDomainShutdownFlags = Some(fake_domain_shutdown_flags);
    api.virDomainReboot = Some(fake_domain_reboot);
    api.virDomainReset = Some(fake_domain_reset);
    api.virDomainUndefine = Some(fake_domain_undefine);
    api.virDomainUndefineFlags = Some(fake_domain_undefine_flags);
    api.virDomainSave = Some(fake_domain_save);
    api.virDomainManagedSave = Some(fake_domain_managed_save);
    api.virDomainHasManagedSaveImage = Some(fake_domain_has_managed_save);
    api.virDomainManagedSaveRemove = Some(fake_domain_managed_save_remove);
    api.virDomainCoreDump = Some(fake_domain_core_dump);
    api.virDomainAbortJob = Some(fake_domain_abort_job);
    api.virDomainPMSuspendForDuration = Some(fake_domain_pm_suspend);
    api.virDomainPMWakeup = Some(fake_domain_pm_wakeup);
    api.virDomainSendKey = Some(fake_domain_send_key);

    api.virDomainGetName = Some(fake_domain_get_name);
    api.virDomainGetID = Some(fake_domain_get_id);
    api.virDomainGetUUID = Some(fake_domain_get_uuid);
    api.virDomainGetUUIDString = Some(fake_domain_get_uuid_string);
    api.virDomainGetOSType = Some(fake_domain_get_os_type);
    api.virDomainGetXMLDesc = Some(fake_domain_get_xml_desc);
    api.virDomainGetInfo = Some(fake_domain_get_info);
    api.virDomainGetState = Some(fake_domain_get_state);
    api.virDomainGetJobInfo = Some(fake_domain_get_job_info);
    api.virDomainGetControlInfo = Some(fake_domain_get_control_info);
    api.virDomainGetMaxMemory = Some(fake_domain_get_max_memory);
    api.virDomainGetMaxVcpus = Some(fake_domain_get_max_vcpus);
    api.virDomainGetAutostart = Some(fake_domain_get_autostart);
    api.virDomainIsActive = Some(fake_domain_is_active);
    api.virDomainIsPersistent = Some(fake_domain_is_persistent);
    api.virDomainIsUpdated = Some(fake_domain_is_updated);
    api.virDomainGetSecurityLabel = Some(fake_domain_get_security_label);

    api.virDomainSetAutostart = Some(fake_domain_set_autostart);
    api.virDomainSetMaxMemory = Some(fake_domain_set_max_memory);
    api.virDomainSetMemory = Some(fake_domain_set_memory);
    api.virDomainSetMemoryFlags = Some(fake_domain_set_memory_flags);
    api.virDomainSetVcpus = Some(fake_domain_set_vcpus);
    api.virDomainSetVcpusFlags = Some(fake_domain_set_vcpus_flags);
    api.virDomainGetVcpus = Some(fake_domain_get_vcpus);
    api.virDomainPinVcpu = Some(fake_domain_pin_vcpu);
    api.virDomainGetSchedulerType = Some(fake_domain_get_scheduler_type);
    api.virDomainGetSchedulerParameters = Some(fake_domain_get_scheduler_parameters);
    api.virDomainSetSchedulerParameters = Some(fake_domain_set_scheduler_parameters);

    api.virDomainAttachDevice = Some(fake_domain_attach_device);
    api.virDomainAttachDeviceFlags = Some(fake_domain_attach_device_flags);
    api.virDomainDetachDevice = Some(fake_domain_detach_device);
    api.virDomainDetachDeviceFlags = Some(fake_domain_detach_device_flags);
    api.virDomainUpdateDeviceFlags = Some(fake_domain_update_device_flags);

    api.virDomainBlockStats = Some(fake_domain_block_stats);
    api.virDomainInterfaceStats = Some(fake_domain_interface_stats);
    api.virDomainGetBlockInfo = Some(fake_domain_get_block_info);
    api.virDomainBlockResize = Some(fake_domain_block_resize);
    api.virDomainBlockPeek = Some(fake_domain_block_peek);
    api.virDomainMemoryPeek = Some(fake_domain_memory_peek);
    api.virDomainMemoryStats = Some(fake_domain_memory_stats);
    api.virDomainGetBlockJobInfo = Some(fake_domain_get_block_job_info);
    api.virDomainBlockJobAbort = Some(fake_domain_block_job_abort);
    api.virDomainBlockJobSetSpeed = Some(fake_domain_block_job_set_speed);

    api.virDomainMigrate = Some(fake_domain_migrate);
    api.virDomainMigrate2 = Some(fake_domain_migrate2);
    api.virDomainMigrateToURI = Some(fake_domain_migrate_to_uri);
    api.virDomainMigrateToURI2 = Some(fake_domain_migrate_to_uri2);
    api.virDomainMigrateSetMaxDowntime = Some(fake_domain_migrate_set_max_downtime);
    api.virDomainMigrateSetMaxSpeed = Some(fake_domain_migrate_set_max_speed);

    api.virDomainSnapshotCreateXML = Some(fake_snapshot_create_xml);
    api.virDomainSnapshotCurrent = Some(fake_snapshot_current);
    api.virDomainSnapshotLookupByName = Some(fake_snapshot_lookup_by_name);
    api.virDomainSnapshotNum = Some(fake_snapshot_num);
    api.virDomainSnapshotListNames = Some(fake_snapshot_list_names);
    api.virDomainHasCurrentSnapshot = Some(fake_has_current_snapshot);
    api.virDomainRevertToSnapshot = Some(fake_revert_to_snapshot);
    api.virDomainSnapshotDelete = Some(fake_snapshot_delete);
    api.virDomainSnapshotFree = Some(fake_snapshot_free);
    api.virDomainSnapshotRef = Some(fake_snapshot_ref);
    api.virDomainSnapshotGetName = Some(fake_snapshot_get_name);
    api.virDomainSnapshotGetDomain = Some(fake_snapshot_get_domain);
    api.virDomainSnapshotGetXMLDesc = Some(fake_snapshot_get_xml_desc);
    api.virDomainSnapshotGetParent = Some(fake_snapshot_get_parent);
    api.virDomainSnapshotIsCurrent = Some(fake_snapshot_is_current);

    api
}

/// A library backed by the fake entry points.
pub fn library() -> Arc<Library> {
    Library::from_api(api())
}

/// Open a fake connection and return it with its fake backing object.
pub fn open() -> (Connect, Arc<FakeConnect>) {
    let connect = Connect::open_with(library(), "test:///default", &ConnectOptions::default())
        .expect("fake open failed");
    (connect, last_opened())
}
