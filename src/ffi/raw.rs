//! Raw libvirt declarations.
//!
//! Records, constants and the table of entry points resolved from the shared
//! library. Users should prefer the safe wrappers in the parent modules.

#![allow(non_snake_case)]

use std::os::raw::{
    c_char, c_double, c_int, c_longlong, c_uchar, c_uint, c_ulong, c_ulonglong, c_ushort, c_void,
};

pub use super::handles::{
    VirConnect, VirConnectPtr, VirDomain, VirDomainPtr, VirDomainSnapshot, VirDomainSnapshotPtr,
};
use super::layout::fixed_struct;

pub const VIR_UUID_BUFLEN: usize = 16;
pub const VIR_UUID_STRING_BUFLEN: usize = 37;
pub const VIR_SECURITY_LABEL_BUFLEN: usize = 4096 + 1;
pub const VIR_TYPED_PARAM_FIELD_LENGTH: usize = 80;

// virTypedParameterType
pub const VIR_TYPED_PARAM_INT: c_int = 1;
pub const VIR_TYPED_PARAM_UINT: c_int = 2;
pub const VIR_TYPED_PARAM_LLONG: c_int = 3;
pub const VIR_TYPED_PARAM_ULLONG: c_int = 4;
pub const VIR_TYPED_PARAM_DOUBLE: c_int = 5;
pub const VIR_TYPED_PARAM_BOOLEAN: c_int = 6;

// virDomainEventID
pub const VIR_DOMAIN_EVENT_ID_LIFECYCLE: c_int = 0;
pub const VIR_DOMAIN_EVENT_ID_REBOOT: c_int = 1;
pub const VIR_DOMAIN_EVENT_ID_IO_ERROR: c_int = 4;
pub const VIR_DOMAIN_EVENT_ID_PMWAKEUP: c_int = 11;
pub const VIR_DOMAIN_EVENT_ID_PMSUSPEND: c_int = 12;

/// `virError`.
#[repr(C)]
pub struct VirError {
    pub code: c_int,
    pub domain: c_int,
    pub message: *mut c_char,
    pub level: c_int,
    pub conn: VirConnectPtr,
    pub dom: VirDomainPtr,
    pub str1: *mut c_char,
    pub str2: *mut c_char,
    pub str3: *mut c_char,
    pub int1: c_int,
    pub int2: c_int,
    pub net: *mut c_void,
}

impl Default for VirError {
    fn default() -> Self {
        Self {
            code: 0,
            domain: 0,
            message: std::ptr::null_mut(),
            level: 0,
            conn: std::ptr::null_mut(),
            dom: std::ptr::null_mut(),
            str1: std::ptr::null_mut(),
            str2: std::ptr::null_mut(),
            str3: std::ptr::null_mut(),
            int1: 0,
            int2: 0,
            net: std::ptr::null_mut(),
        }
    }
}

fixed_struct! {
    /// `virDomainInfo`.
    pub struct VirDomainInfo {
        pub state: c_uchar,
        pub max_mem: c_ulong,
        pub memory: c_ulong,
        pub nr_virt_cpu: c_ushort,
        pub cpu_time: c_ulonglong,
    }
}

fixed_struct! {
    /// `virNodeInfo`.
    pub struct VirNodeInfo {
        pub model: [c_char; 32],
        pub memory: c_ulong,
        pub cpus: c_uint,
        pub mhz: c_uint,
        pub nodes: c_uint,
        pub sockets: c_uint,
        pub cores: c_uint,
        pub threads: c_uint,
    }
}

fixed_struct! {
    /// `virDomainJobInfo`.
    pub struct VirDomainJobInfo {
        pub type_: c_int,
        pub time_elapsed: c_ulonglong,
        pub time_remaining: c_ulonglong,
        pub data_total: c_ulonglong,
        pub data_processed: c_ulonglong,
        pub data_remaining: c_ulonglong,
        pub mem_total: c_ulonglong,
        pub mem_processed: c_ulonglong,
        pub mem_remaining: c_ulonglong,
        pub file_total: c_ulonglong,
        pub file_processed: c_ulonglong,
        pub file_remaining: c_ulonglong,
    }
}

fixed_struct! {
    /// `virDomainBlockStatsStruct`.
    pub struct VirDomainBlockStats {
        pub rd_req: c_longlong,
        pub rd_bytes: c_longlong,
        pub wr_req: c_longlong,
        pub wr_bytes: c_longlong,
        pub errs: c_longlong,
    }
}

fixed_struct! {
    /// `virDomainInterfaceStatsStruct`.
    pub struct VirDomainInterfaceStats {
        pub rx_bytes: c_longlong,
        pub rx_packets: c_longlong,
        pub rx_errs: c_longlong,
        pub rx_drop: c_longlong,
        pub tx_bytes: c_longlong,
        pub tx_packets: c_longlong,
        pub tx_errs: c_longlong,
        pub tx_drop: c_longlong,
    }
}

fixed_struct! {
    /// `virDomainBlockInfo`.
    pub struct VirDomainBlockInfo {
        pub capacity: c_ulonglong,
        pub allocation: c_ulonglong,
        pub physical: c_ulonglong,
    }
}

fixed_struct! {
    /// `virVcpuInfo`.
    pub struct VirVcpuInfo {
        pub number: c_uint,
        pub state: c_int,
        pub cpu_time: c_ulonglong,
        /// Real CPU number, or -1 if offline.
        pub cpu: c_int,
    }
}

fixed_struct! {
    /// `virDomainControlInfo`.
    pub struct VirDomainControlInfo {
        pub state: c_uint,
        pub details: c_uint,
        pub state_time: c_ulonglong,
    }
}

fixed_struct! {
    /// `virDomainBlockJobInfo`.
    pub struct VirDomainBlockJobInfo {
        pub type_: c_int,
        pub bandwidth: c_ulong,
        pub cur: c_ulonglong,
        pub end: c_ulonglong,
    }
}

fixed_struct! {
    /// `virDomainMemoryStatStruct`.
    pub struct VirDomainMemoryStat {
        pub tag: c_int,
        pub val: c_ulonglong,
    }
}

fixed_struct! {
    /// `virSecurityLabel`.
    pub struct VirSecurityLabel {
        pub label: [c_char; VIR_SECURITY_LABEL_BUFLEN],
        pub enforcing: c_int,
    }
}

/// Value part of `virTypedParameter`.
#[repr(C)]
#[derive(Clone, Copy)]
pub union VirTypedParameterValue {
    pub i: c_int,
    pub ui: c_uint,
    pub l: c_longlong,
    pub ul: c_ulonglong,
    pub d: c_double,
    pub b: c_char,
    pub s: *mut c_char,
}

/// `virTypedParameter`, used for scheduler parameters.
#[repr(C)]
#[derive(Clone, Copy)]
pub struct VirTypedParameter {
    pub field: [c_char; VIR_TYPED_PARAM_FIELD_LENGTH],
    pub type_: c_int,
    pub value: VirTypedParameterValue,
}

impl Default for VirTypedParameter {
    fn default() -> Self {
        // SAFETY: all-zero is an unnamed parameter with a null string slot.
        unsafe { std::mem::zeroed() }
    }
}

/// `virConnectDomainEventGenericCallback`.
pub type VirConnectDomainEventGenericCallback =
    Option<unsafe extern "C" fn(conn: VirConnectPtr, dom: VirDomainPtr, opaque: *mut c_void)>;

/// `virConnectDomainEventCallback`, for lifecycle events.
pub type VirConnectDomainEventLifecycleCallback = unsafe extern "C" fn(
    conn: VirConnectPtr,
    dom: VirDomainPtr,
    event: c_int,
    detail: c_int,
    opaque: *mut c_void,
) -> c_int;

/// `virConnectDomainEventIOErrorCallback`.
pub type VirConnectDomainEventIoErrorCallback = unsafe extern "C" fn(
    conn: VirConnectPtr,
    dom: VirDomainPtr,
    src_path: *const c_char,
    dev_alias: *const c_char,
    action: c_int,
    opaque: *mut c_void,
);

/// `virConnectDomainEventPMWakeupCallback`; PM suspend has the same shape.
pub type VirConnectDomainEventPmCallback = unsafe extern "C" fn(
    conn: VirConnectPtr,
    dom: VirDomainPtr,
    reason: c_int,
    opaque: *mut c_void,
);

/// `virFreeCallback`.
pub type VirFreeCallback = Option<unsafe extern "C" fn(opaque: *mut c_void)>;

/// Declare the table of libvirt entry points.
///
/// Each entry is optional so that a libvirt lacking newer symbols still loads;
/// calling a missing entry point fails with `Error::MissingSymbol`.
macro_rules! native_api {
    ( $( fn $name:ident ( $( $arg:ident : $ty:ty ),* $(,)? ) -> $ret:ty; )* ) => {
        /// Entry points resolved from libvirt.
        #[derive(Clone, Copy, Default)]
        pub struct NativeApi {
            $( pub $name: Option<unsafe extern "C" fn( $( $ty ),* ) -> $ret>, )*
        }

        impl NativeApi {
            /// Resolve every entry point from a `dlopen` handle.
            ///
            /// # Safety
            ///
            /// `handle` must be a live handle to a libvirt shared object.
            pub(crate) unsafe fn resolve(handle: *mut c_void) -> Self {
                let mut api = Self::default();
                $(
                    let symbol = concat!(stringify!($name), "\0");
                    let sym = libc::dlsym(handle, symbol.as_ptr() as *const c_char);
                    if !sym.is_null() {
                        api.$name = Some(std::mem::transmute::<
                            *mut c_void,
                            unsafe extern "C" fn( $( $ty ),* ) -> $ret,
                        >(sym));
                    }
                )*
                api
            }

            /// Names of the entry points this table lacks.
            pub fn missing(&self) -> Vec<&'static str> {
                let mut missing = Vec::new();
                $(
                    if self.$name.is_none() {
                        missing.push(stringify!($name));
                    }
                )*
                missing
            }
        }
    };
}

native_api! {
    // Library and errors
    fn virInitialize() -> c_int;
    fn virGetVersion(lib_ver: *mut c_ulong, type_: *const c_char, type_ver: *mut c_ulong) -> c_int;
    fn virCopyLastError(to: *mut VirError) -> c_int;
    fn virResetError(err: *mut VirError) -> ();
    fn virResetLastError() -> ();
    fn virEventRegisterDefaultImpl() -> c_int;
    fn virEventRunDefaultImpl() -> c_int;

    // Connections
    fn virConnectOpen(name: *const c_char) -> VirConnectPtr;
    fn virConnectOpenReadOnly(name: *const c_char) -> VirConnectPtr;
    fn virConnectClose(conn: VirConnectPtr) -> c_int;
    fn virConnectRef(conn: VirConnectPtr) -> c_int;
    fn virConnectGetURI(conn: VirConnectPtr) -> *mut c_char;
    fn virConnectGetHostname(conn: VirConnectPtr) -> *mut c_char;
    fn virConnectGetType(conn: VirConnectPtr) -> *const c_char;
    fn virConnectGetVersion(conn: VirConnectPtr, hv_ver: *mut c_ulong) -> c_int;
    fn virConnectGetLibVersion(conn: VirConnectPtr, lib_ver: *mut c_ulong) -> c_int;
    fn virConnectIsAlive(conn: VirConnectPtr) -> c_int;
    fn virConnectNumOfDomains(conn: VirConnectPtr) -> c_int;
    fn virConnectListAllDomains(
        conn: VirConnectPtr,
        domains: *mut *mut VirDomainPtr,
        flags: c_uint,
    ) -> c_int;
    fn virNodeGetInfo(conn: VirConnectPtr, info: *mut VirNodeInfo) -> c_int;
    fn virConnectDomainEventRegisterAny(
        conn: VirConnectPtr,
        dom: VirDomainPtr,
        event_id: c_int,
        cb: VirConnectDomainEventGenericCallback,
        opaque: *mut c_void,
        freecb: VirFreeCallback
    ) -> c_int;
    fn virConnectDomainEventDeregisterAny(conn: VirConnectPtr, callback_id: c_int) -> c_int;

    // Domain lookup and creation
    fn virDomainLookupByName(conn: VirConnectPtr, name: *const c_char) -> VirDomainPtr;
    fn virDomainLookupByID(conn: VirConnectPtr, id: c_int) -> VirDomainPtr;
    fn virDomainLookupByUUID(conn: VirConnectPtr, uuid: *const c_uchar) -> VirDomainPtr;
    fn virDomainLookupByUUIDString(conn: VirConnectPtr, uuid: *const c_char) -> VirDomainPtr;
    fn virDomainDefineXML(conn: VirConnectPtr, xml: *const c_char) -> VirDomainPtr;
    fn virDomainCreateXML(conn: VirConnectPtr, xml: *const c_char, flags: c_uint) -> VirDomainPtr;

    // Domain references
    fn virDomainFree(dom: VirDomainPtr) -> c_int;
    fn virDomainRef(dom: VirDomainPtr) -> c_int;
    fn virDomainGetConnect(dom: VirDomainPtr) -> VirConnectPtr;

    // Domain lifecycle
    fn virDomainCreate(dom: VirDomainPtr) -> c_int;
    fn virDomainCreateWithFlags(dom: VirDomainPtr, flags: c_uint) -> c_int;
    fn virDomainDestroy(dom: VirDomainPtr) -> c_int;
    fn virDomainDestroyFlags(dom: VirDomainPtr, flags: c_uint) -> c_int;
    fn virDomainSuspend(dom: VirDomainPtr) -> c_int;
    fn virDomainResume(dom: VirDomainPtr) -> c_int;
    fn virDomainShutdown(dom: VirDomainPtr) -> c_int;
    fn virDomainShutdownFlags(dom: VirDomainPtr, flags: c_uint) -> c_int;
    fn virDomainReboot(dom: VirDomainPtr, flags: c_uint) -> c_int;
    fn virDomainReset(dom: VirDomainPtr, flags: c_uint) -> c_int;
    fn virDomainUndefine(dom: VirDomainPtr) -> c_int;
    fn virDomainUndefineFlags(dom: VirDomainPtr, flags: c_uint) -> c_int;
    fn virDomainSave(dom: VirDomainPtr, to: *const c_char) -> c_int;
    fn virDomainManagedSave(dom: VirDomainPtr, flags: c_uint) -> c_int;
    fn virDomainHasManagedSaveImage(dom: VirDomainPtr, flags: c_uint) -> c_int;
    fn virDomainManagedSaveRemove(dom: VirDomainPtr, flags: c_uint) -> c_int;
    fn virDomainCoreDump(dom: VirDomainPtr, to: *const c_char, flags: c_uint) -> c_int;
    fn virDomainAbortJob(dom: VirDomainPtr) -> c_int;
    fn virDomainPMSuspendForDuration(
        dom: VirDomainPtr,
        target: c_uint,
        duration: c_ulonglong,
        flags: c_uint,
    ) -> c_int;
    fn virDomainPMWakeup(dom: VirDomainPtr, flags: c_uint) -> c_int;
    fn virDomainSendKey(
        dom: VirDomainPtr,
        codeset: c_uint,
        holdtime: c_uint,
        keycodes: *mut c_uint,
        nkeycodes: c_int,
        flags: c_uint
    ) -> c_int;

    // Domain queries
    fn virDomainGetName(dom: VirDomainPtr) -> *const c_char;
    fn virDomainGetID(dom: VirDomainPtr) -> c_uint;
    fn virDomainGetUUID(dom: VirDomainPtr, uuid: *mut c_uchar) -> c_int;
    fn virDomainGetUUIDString(dom: VirDomainPtr, buf: *mut c_char) -> c_int;
    fn virDomainGetOSType(dom: VirDomainPtr) -> *mut c_char;
    fn virDomainGetXMLDesc(dom: VirDomainPtr, flags: c_uint) -> *mut c_char;
    fn virDomainGetInfo(dom: VirDomainPtr, info: *mut VirDomainInfo) -> c_int;
    fn virDomainGetState(
        dom: VirDomainPtr,
        state: *mut c_int,
        reason: *mut c_int,
        flags: c_uint,
    ) -> c_int;
    fn virDomainGetJobInfo(dom: VirDomainPtr, info: *mut VirDomainJobInfo) -> c_int;
    fn virDomainGetControlInfo(
        dom: VirDomainPtr,
        info: *mut VirDomainControlInfo,
        flags: c_uint,
    ) -> c_int;
    fn virDomainGetMaxMemory(dom: VirDomainPtr) -> c_ulong;
    fn virDomainGetMaxVcpus(dom: VirDomainPtr) -> c_int;
    fn virDomainGetAutostart(dom: VirDomainPtr, autostart: *mut c_int) -> c_int;
    fn virDomainIsActive(dom: VirDomainPtr) -> c_int;
    fn virDomainIsPersistent(dom: VirDomainPtr) -> c_int;
    fn virDomainIsUpdated(dom: VirDomainPtr) -> c_int;
    fn virDomainGetSecurityLabel(dom: VirDomainPtr, seclabel: *mut VirSecurityLabel) -> c_int;

    // Domain tuning
    fn virDomainSetAutostart(dom: VirDomainPtr, autostart: c_int) -> c_int;
    fn virDomainSetMaxMemory(dom: VirDomainPtr, memory: c_ulong) -> c_int;
    fn virDomainSetMemory(dom: VirDomainPtr, memory: c_ulong) -> c_int;
    fn virDomainSetMemoryFlags(dom: VirDomainPtr, memory: c_ulong, flags: c_uint) -> c_int;
    fn virDomainSetVcpus(dom: VirDomainPtr, nvcpus: c_uint) -> c_int;
    fn virDomainSetVcpusFlags(dom: VirDomainPtr, nvcpus: c_uint, flags: c_uint) -> c_int;
    fn virDomainGetVcpus(
        dom: VirDomainPtr,
        info: *mut VirVcpuInfo,
        maxinfo: c_int,
        cpumaps: *mut c_uchar,
        maplen: c_int
    ) -> c_int;
    fn virDomainPinVcpu(
        dom: VirDomainPtr,
        vcpu: c_uint,
        cpumap: *mut c_uchar,
        maplen: c_int,
    ) -> c_int;
    fn virDomainGetSchedulerType(dom: VirDomainPtr, nparams: *mut c_int) -> *mut c_char;
    fn virDomainGetSchedulerParameters(
        dom: VirDomainPtr,
        params: *mut VirTypedParameter,
        nparams: *mut c_int,
    ) -> c_int;
    fn virDomainSetSchedulerParameters(
        dom: VirDomainPtr,
        params: *mut VirTypedParameter,
        nparams: c_int,
    ) -> c_int;

    // Devices
    fn virDomainAttachDevice(dom: VirDomainPtr, xml: *const c_char) -> c_int;
    fn virDomainAttachDeviceFlags(dom: VirDomainPtr, xml: *const c_char, flags: c_uint) -> c_int;
    fn virDomainDetachDevice(dom: VirDomainPtr, xml: *const c_char) -> c_int;
    fn virDomainDetachDeviceFlags(dom: VirDomainPtr, xml: *const c_char, flags: c_uint) -> c_int;
    fn virDomainUpdateDeviceFlags(dom: VirDomainPtr, xml: *const c_char, flags: c_uint) -> c_int;

    // Block and memory
    fn virDomainBlockStats(
        dom: VirDomainPtr,
        disk: *const c_char,
        stats: *mut VirDomainBlockStats,
        size: usize,
    ) -> c_int;
    fn virDomainInterfaceStats(
        dom: VirDomainPtr,
        device: *const c_char,
        stats: *mut VirDomainInterfaceStats,
        size: usize,
    ) -> c_int;
    fn virDomainGetBlockInfo(
        dom: VirDomainPtr,
        disk: *const c_char,
        info: *mut VirDomainBlockInfo,
        flags: c_uint,
    ) -> c_int;
    fn virDomainBlockResize(
        dom: VirDomainPtr,
        disk: *const c_char,
        size: c_ulonglong,
        flags: c_uint,
    ) -> c_int;
    fn virDomainBlockPeek(
        dom: VirDomainPtr,
        disk: *const c_char,
        offset: c_ulonglong,
        size: usize,
        buffer: *mut c_void,
        flags: c_uint
    ) -> c_int;
    fn virDomainMemoryPeek(
        dom: VirDomainPtr,
        start: c_ulonglong,
        size: usize,
        buffer: *mut c_void,
        flags: c_uint,
    ) -> c_int;
    fn virDomainMemoryStats(
        dom: VirDomainPtr,
        stats: *mut VirDomainMemoryStat,
        nr_stats: c_uint,
        flags: c_uint,
    ) -> c_int;
    fn virDomainGetBlockJobInfo(
        dom: VirDomainPtr,
        disk: *const c_char,
        info: *mut VirDomainBlockJobInfo,
        flags: c_uint,
    ) -> c_int;
    fn virDomainBlockJobAbort(dom: VirDomainPtr, disk: *const c_char, flags: c_uint) -> c_int;
    fn virDomainBlockJobSetSpeed(
        dom: VirDomainPtr,
        disk: *const c_char,
        bandwidth: c_ulong,
        flags: c_uint,
    ) -> c_int;

    // Migration
    fn virDomainMigrate(
        dom: VirDomainPtr,
        dconn: VirConnectPtr,
        flags: c_ulong,
        dname: *const c_char,
        uri: *const c_char,
        bandwidth: c_ulong
    ) -> VirDomainPtr;
    fn virDomainMigrate2(
        dom: VirDomainPtr,
        dconn: VirConnectPtr,
        dxml: *const c_char,
        flags: c_ulong,
        dname: *const c_char,
        uri: *const c_char,
        bandwidth: c_ulong
    ) -> VirDomainPtr;
    fn virDomainMigrateToURI(
        dom: VirDomainPtr,
        duri: *const c_char,
        flags: c_ulong,
        dname: *const c_char,
        bandwidth: c_ulong
    ) -> c_int;
    fn virDomainMigrateToURI2(
        dom: VirDomainPtr,
        dconnuri: *const c_char,
        miguri: *const c_char,
        dxml: *const c_char,
        flags: c_ulong,
        dname: *const c_char,
        bandwidth: c_ulong
    ) -> c_int;
    fn virDomainMigrateSetMaxDowntime(
        dom: VirDomainPtr,
        downtime: c_ulonglong,
        flags: c_uint,
    ) -> c_int;
    fn virDomainMigrateSetMaxSpeed(dom: VirDomainPtr, bandwidth: c_ulong, flags: c_uint) -> c_int;

    // Snapshots
    fn virDomainSnapshotCreateXML(
        dom: VirDomainPtr,
        xml: *const c_char,
        flags: c_uint,
    ) -> VirDomainSnapshotPtr;
    fn virDomainSnapshotCurrent(dom: VirDomainPtr, flags: c_uint) -> VirDomainSnapshotPtr;
    fn virDomainSnapshotLookupByName(
        dom: VirDomainPtr,
        name: *const c_char,
        flags: c_uint,
    ) -> VirDomainSnapshotPtr;
    fn virDomainSnapshotNum(dom: VirDomainPtr, flags: c_uint) -> c_int;
    fn virDomainSnapshotListNames(
        dom: VirDomainPtr,
        names: *mut *mut c_char,
        nameslen: c_int,
        flags: c_uint,
    ) -> c_int;
    fn virDomainHasCurrentSnapshot(dom: VirDomainPtr, flags: c_uint) -> c_int;
    fn virDomainRevertToSnapshot(snapshot: VirDomainSnapshotPtr, flags: c_uint) -> c_int;
    fn virDomainSnapshotDelete(snapshot: VirDomainSnapshotPtr, flags: c_uint) -> c_int;
    fn virDomainSnapshotFree(snapshot: VirDomainSnapshotPtr) -> c_int;
    fn virDomainSnapshotRef(snapshot: VirDomainSnapshotPtr) -> c_int;
    fn virDomainSnapshotGetName(snapshot: VirDomainSnapshotPtr) -> *const c_char;
    fn virDomainSnapshotGetDomain(snapshot: VirDomainSnapshotPtr) -> VirDomainPtr;
    fn virDomainSnapshotGetXMLDesc(snapshot: VirDomainSnapshotPtr, flags: c_uint) -> *mut c_char;
    fn virDomainSnapshotGetParent(
        snapshot: VirDomainSnapshotPtr,
        flags: c_uint,
    ) -> VirDomainSnapshotPtr;
    fn virDomainSnapshotIsCurrent(snapshot: VirDomainSnapshotPtr, flags: c_uint) -> c_int;
}
