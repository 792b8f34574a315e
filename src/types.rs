//! Type definitions and enums.

use std::fmt;
use std::os::raw::c_char;
use std::path::PathBuf;

use num_derive::FromPrimitive;
use num_traits::FromPrimitive;

use crate::error::{Error, Result};
use crate::ffi::call::array_string;
use crate::ffi::raw::*;
use crate::flags::MigrateFlags;
use crate::transfer::MAX_PEEK_CHUNK;

/// Environment variable naming the libvirt shared object to load.
pub const LIBRARY_PATH_ENV: &str = "LIBVIRT_LIBRARY_PATH";

/// Running state of a domain (`virDomainState`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, FromPrimitive)]
pub enum DomainState {
    #[default]
    NoState = 0,
    Running = 1,
    /// Blocked on a resource.
    Blocked = 2,
    /// Paused by the user.
    Paused = 3,
    /// Being shut down.
    Shutdown = 4,
    Shutoff = 5,
    Crashed = 6,
    /// Suspended by guest power management.
    PmSuspended = 7,
}

/// State of a virtual CPU (`virVcpuState`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, FromPrimitive)]
pub enum VcpuState {
    #[default]
    Offline = 0,
    Running = 1,
    Blocked = 2,
}

/// Kind of background job (`virDomainJobType`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, FromPrimitive)]
pub enum JobType {
    #[default]
    None = 0,
    /// Job with a finite completion time.
    Bounded = 1,
    /// Job without a finite completion time.
    Unbounded = 2,
    Completed = 3,
    Failed = 4,
    Cancelled = 5,
}

/// State of the domain's control interface (`virDomainControlState`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, FromPrimitive)]
pub enum ControlState {
    #[default]
    Ok = 0,
    /// Background job is running.
    Job = 1,
    /// Occupied by a running command.
    Occupied = 2,
    Error = 3,
}

/// Kind of block job (`virDomainBlockJobType`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, FromPrimitive)]
pub enum BlockJobType {
    #[default]
    Unknown = 0,
    Pull = 1,
    Copy = 2,
    Commit = 3,
    ActiveCommit = 4,
}

/// Tag of a memory statistic (`virDomainMemoryStatTags`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, FromPrimitive)]
pub enum MemoryStatTag {
    SwapIn = 0,
    SwapOut = 1,
    MajorFault = 2,
    MinorFault = 3,
    Unused = 4,
    Available = 5,
    ActualBalloon = 6,
    Rss = 7,
    Usable = 8,
    LastUpdate = 9,
    DiskCaches = 10,
}

impl MemoryStatTag {
    /// Number of tags decoded by [`MemoryStatistic::kind`].
    pub const COUNT: usize = 11;
}

/// Keycode set used by `send_key` (`virKeycodeSet`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum KeycodeSet {
    #[default]
    Linux,
    Xt,
    Atset1,
    Atset2,
    Atset3,
    Osx,
    XtKbd,
    Usb,
    Win32,
    Qnum,
}

impl From<KeycodeSet> for u32 {
    fn from(set: KeycodeSet) -> u32 {
        match set {
            KeycodeSet::Linux => 0,
            KeycodeSet::Xt => 1,
            KeycodeSet::Atset1 => 2,
            KeycodeSet::Atset2 => 3,
            KeycodeSet::Atset3 => 4,
            KeycodeSet::Osx => 5,
            KeycodeSet::XtKbd => 6,
            KeycodeSet::Usb => 7,
            KeycodeSet::Win32 => 8,
            KeycodeSet::Qnum => 9,
        }
    }
}

/// Power-management suspend target (`virNodeSuspendTarget`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SuspendTarget {
    /// Suspend to RAM.
    #[default]
    Mem,
    /// Suspend to disk.
    Disk,
    /// Suspend to both.
    Hybrid,
}

impl From<SuspendTarget> for u32 {
    fn from(target: SuspendTarget) -> u32 {
        match target {
            SuspendTarget::Mem => 0,
            SuspendTarget::Disk => 1,
            SuspendTarget::Hybrid => 2,
        }
    }
}

/// Address space read by `memory_peek` (`virDomainMemoryFlags`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MemoryAddressMode {
    /// Guest virtual addresses.
    #[default]
    Virtual,
    /// Guest physical addresses.
    Physical,
}

impl From<MemoryAddressMode> for u32 {
    fn from(mode: MemoryAddressMode) -> u32 {
        match mode {
            MemoryAddressMode::Virtual => 1,
            MemoryAddressMode::Physical => 2,
        }
    }
}

/// Basic information about a domain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DomainInfo {
    pub state: DomainState,
    /// Maximum memory in KiB.
    pub max_mem_kib: u64,
    /// Memory in use, in KiB.
    pub memory_kib: u64,
    pub nr_virt_cpu: u32,
    /// CPU time used, in nanoseconds.
    pub cpu_time_ns: u64,
}

impl From<&VirDomainInfo> for DomainInfo {
    fn from(raw: &VirDomainInfo) -> Self {
        Self {
            state: DomainState::from_u8(raw.state).unwrap_or_default(),
            max_mem_kib: raw.max_mem as u64,
            memory_kib: raw.memory as u64,
            nr_virt_cpu: raw.nr_virt_cpu as u32,
            cpu_time_ns: raw.cpu_time,
        }
    }
}

/// Host node information.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeInfo {
    /// CPU model, e.g. "x86_64".
    pub model: String,
    /// Memory size in KiB.
    pub memory_kib: u64,
    /// Number of active CPUs.
    pub cpus: u32,
    /// Expected CPU frequency in MHz.
    pub mhz: u32,
    pub nodes: u32,
    pub sockets: u32,
    pub cores: u32,
    pub threads: u32,
}

impl From<&VirNodeInfo> for NodeInfo {
    fn from(raw: &VirNodeInfo) -> Self {
        Self {
            model: array_string(&raw.model),
            memory_kib: raw.memory as u64,
            cpus: raw.cpus,
            mhz: raw.mhz,
            nodes: raw.nodes,
            sockets: raw.sockets,
            cores: raw.cores,
            threads: raw.threads,
        }
    }
}

/// Progress of the domain's background job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DomainJobInfo {
    pub job_type: JobType,
    /// Time elapsed in milliseconds.
    pub time_elapsed_ms: u64,
    /// Time remaining in milliseconds, for bounded jobs.
    pub time_remaining_ms: u64,
    pub data_total: u64,
    pub data_processed: u64,
    pub data_remaining: u64,
    pub mem_total: u64,
    pub mem_processed: u64,
    pub mem_remaining: u64,
    pub file_total: u64,
    pub file_processed: u64,
    pub file_remaining: u64,
}

impl From<&VirDomainJobInfo> for DomainJobInfo {
    fn from(raw: &VirDomainJobInfo) -> Self {
        Self {
            job_type: JobType::from_i32(raw.type_).unwrap_or_default(),
            time_elapsed_ms: raw.time_elapsed,
            time_remaining_ms: raw.time_remaining,
            data_total: raw.data_total,
            data_processed: raw.data_processed,
            data_remaining: raw.data_remaining,
            mem_total: raw.mem_total,
            mem_processed: raw.mem_processed,
            mem_remaining: raw.mem_remaining,
            file_total: raw.file_total,
            file_processed: raw.file_processed,
            file_remaining: raw.file_remaining,
        }
    }
}

/// Block device I/O counters. A value of -1 means unsupported.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DomainBlockStats {
    pub rd_req: i64,
    pub rd_bytes: i64,
    pub wr_req: i64,
    pub wr_bytes: i64,
    pub errs: i64,
}

impl From<&VirDomainBlockStats> for DomainBlockStats {
    fn from(raw: &VirDomainBlockStats) -> Self {
        Self {
            rd_req: raw.rd_req,
            rd_bytes: raw.rd_bytes,
            wr_req: raw.wr_req,
            wr_bytes: raw.wr_bytes,
            errs: raw.errs,
        }
    }
}

/// Network interface counters. A value of -1 means unsupported.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DomainInterfaceStats {
    pub rx_bytes: i64,
    pub rx_packets: i64,
    pub rx_errs: i64,
    pub rx_drop: i64,
    pub tx_bytes: i64,
    pub tx_packets: i64,
    pub tx_errs: i64,
    pub tx_drop: i64,
}

impl From<&VirDomainInterfaceStats> for DomainInterfaceStats {
    fn from(raw: &VirDomainInterfaceStats) -> Self {
        Self {
            rx_bytes: raw.rx_bytes,
            rx_packets: raw.rx_packets,
            rx_errs: raw.rx_errs,
            rx_drop: raw.rx_drop,
            tx_bytes: raw.tx_bytes,
            tx_packets: raw.tx_packets,
            tx_errs: raw.tx_errs,
            tx_drop: raw.tx_drop,
        }
    }
}

/// Size information for a block device, in bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DomainBlockInfo {
    /// Logical size as seen by the guest.
    pub capacity: u64,
    /// Highest allocated extent.
    pub allocation: u64,
    /// Physical size of the backing container.
    pub physical: u64,
}

impl From<&VirDomainBlockInfo> for DomainBlockInfo {
    fn from(raw: &VirDomainBlockInfo) -> Self {
        Self {
            capacity: raw.capacity,
            allocation: raw.allocation,
            physical: raw.physical,
        }
    }
}

/// Information about one virtual CPU.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VcpuInfo {
    pub number: u32,
    pub state: VcpuState,
    /// CPU time used, in nanoseconds.
    pub cpu_time_ns: u64,
    /// Host CPU the vCPU runs on, `None` if offline.
    pub cpu: Option<u32>,
}

impl From<&VirVcpuInfo> for VcpuInfo {
    fn from(raw: &VirVcpuInfo) -> Self {
        Self {
            number: raw.number,
            state: VcpuState::from_i32(raw.state).unwrap_or_default(),
            cpu_time_ns: raw.cpu_time,
            cpu: u32::try_from(raw.cpu).ok(),
        }
    }
}

/// State of the domain's control interface.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DomainControlInfo {
    pub state: ControlState,
    /// Driver-specific details about the state.
    pub details: u32,
    /// Time spent in the current state, in milliseconds.
    pub state_time_ms: u64,
}

impl From<&VirDomainControlInfo> for DomainControlInfo {
    fn from(raw: &VirDomainControlInfo) -> Self {
        Self {
            state: ControlState::from_u32(raw.state).unwrap_or_default(),
            details: raw.details,
            state_time_ms: raw.state_time,
        }
    }
}

/// Progress of a block job.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockJobInfo {
    pub job_type: BlockJobType,
    /// Bandwidth limit in MiB/s.
    pub bandwidth: u64,
    pub cur: u64,
    pub end: u64,
}

impl From<&VirDomainBlockJobInfo> for BlockJobInfo {
    fn from(raw: &VirDomainBlockJobInfo) -> Self {
        Self {
            job_type: BlockJobType::from_i32(raw.type_).unwrap_or_default(),
            bandwidth: raw.bandwidth as u64,
            cur: raw.cur,
            end: raw.end,
        }
    }
}

/// One memory statistic reported by the guest balloon driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MemoryStatistic {
    /// Raw tag value.
    pub tag: i32,
    pub value: u64,
}

impl MemoryStatistic {
    /// Decoded tag, if it is one this crate knows about.
    pub fn kind(&self) -> Option<MemoryStatTag> {
        MemoryStatTag::from_i32(self.tag)
    }
}

impl From<&VirDomainMemoryStat> for MemoryStatistic {
    fn from(raw: &VirDomainMemoryStat) -> Self {
        Self {
            tag: raw.tag,
            value: raw.val,
        }
    }
}

/// Security label of a running domain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SecurityLabel {
    pub label: String,
    pub enforcing: bool,
}

impl From<&VirSecurityLabel> for SecurityLabel {
    fn from(raw: &VirSecurityLabel) -> Self {
        Self {
            label: array_string(&raw.label),
            enforcing: raw.enforcing == 1,
        }
    }
}

/// Value of a scheduler parameter.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SchedValue {
    Int(i32),
    UInt(u32),
    LLong(i64),
    ULLong(u64),
    Double(f64),
    Boolean(bool),
}

/// A named scheduler parameter, e.g. `cpu_shares`.
#[derive(Debug, Clone, PartialEq)]
pub struct SchedParameter {
    pub field: String,
    pub value: SchedValue,
}

impl SchedParameter {
    pub fn new(field: impl Into<String>, value: SchedValue) -> Self {
        Self {
            field: field.into(),
            value,
        }
    }

    /// Decode a native parameter. Returns `None` for value types schedulers
    /// never use.
    pub fn from_raw(raw: &VirTypedParameter) -> Option<Self> {
        // SAFETY: the union member read is selected by the type tag.
        let value = unsafe {
            match raw.type_ {
                VIR_TYPED_PARAM_INT => SchedValue::Int(raw.value.i),
                VIR_TYPED_PARAM_UINT => SchedValue::UInt(raw.value.ui),
                VIR_TYPED_PARAM_LLONG => SchedValue::LLong(raw.value.l),
                VIR_TYPED_PARAM_ULLONG => SchedValue::ULLong(raw.value.ul),
                VIR_TYPED_PARAM_DOUBLE => SchedValue::Double(raw.value.d),
                VIR_TYPED_PARAM_BOOLEAN => SchedValue::Boolean(raw.value.b != 0),
                _ => return None,
            }
        };
        Some(Self {
            field: array_string(&raw.field),
            value,
        })
    }

    /// Encode for a native call.
    pub fn to_raw(&self) -> Result<VirTypedParameter> {
        let name = self.field.as_bytes();
        if name.len() >= VIR_TYPED_PARAM_FIELD_LENGTH || name.contains(&0) {
            return Err(Error::InvalidArgument(format!(
                "invalid scheduler parameter name: {:?}",
                self.field
            )));
        }

        let mut raw = VirTypedParameter::default();
        for (slot, &byte) in raw.field.iter_mut().zip(name) {
            *slot = byte as c_char;
        }
        match self.value {
            SchedValue::Int(v) => {
                raw.type_ = VIR_TYPED_PARAM_INT;
                raw.value.i = v;
            }
            SchedValue::UInt(v) => {
                raw.type_ = VIR_TYPED_PARAM_UINT;
                raw.value.ui = v;
            }
            SchedValue::LLong(v) => {
                raw.type_ = VIR_TYPED_PARAM_LLONG;
                raw.value.l = v;
            }
            SchedValue::ULLong(v) => {
                raw.type_ = VIR_TYPED_PARAM_ULLONG;
                raw.value.ul = v;
            }
            SchedValue::Double(v) => {
                raw.type_ = VIR_TYPED_PARAM_DOUBLE;
                raw.value.d = v;
            }
            SchedValue::Boolean(v) => {
                raw.type_ = VIR_TYPED_PARAM_BOOLEAN;
                raw.value.b = v as c_char;
            }
        }
        Ok(raw)
    }
}

/// A libvirt or hypervisor version.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Version {
    pub major: u32,
    pub minor: u32,
    pub release: u32,
}

impl Version {
    /// Decode libvirt's `major * 1_000_000 + minor * 1_000 + release` form.
    pub fn from_encoded(value: u64) -> Self {
        Self {
            major: (value / 1_000_000) as u32,
            minor: ((value / 1_000) % 1_000) as u32,
            release: (value % 1_000) as u32,
        }
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.release)
    }
}

/// Options for loading libvirt.
#[derive(Debug, Clone, Default)]
pub struct LibraryOptions {
    /// Shared object to load (default: the platform's libvirt soname).
    pub path: Option<PathBuf>,
}

impl LibraryOptions {
    /// Read `LIBVIRT_LIBRARY_PATH` from the environment.
    pub fn from_env() -> Self {
        Self {
            path: std::env::var_os(LIBRARY_PATH_ENV)
                .filter(|value| !value.is_empty())
                .map(PathBuf::from),
        }
    }
}

/// Options for opening a connection.
#[derive(Debug, Clone)]
pub struct ConnectOptions {
    /// Open a read-only connection.
    pub read_only: bool,
    /// Largest chunk requested per peek call (default and maximum: 65536).
    pub peek_chunk_size: usize,
}

impl Default for ConnectOptions {
    fn default() -> Self {
        Self {
            read_only: false,
            peek_chunk_size: MAX_PEEK_CHUNK,
        }
    }
}

/// Options for migrating a domain.
#[derive(Debug, Clone, Default)]
pub struct MigrateOptions {
    pub flags: MigrateFlags,
    /// Replacement domain XML for the destination.
    pub dxml: Option<String>,
    /// Name of the domain on the destination.
    pub dname: Option<String>,
    /// Hypervisor-specific migration URI.
    pub uri: Option<String>,
    /// Bandwidth limit in MiB/s (0 for unlimited).
    pub bandwidth: u64,
}
