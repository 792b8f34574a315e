//! Error types for the libvirt crate.

use std::fmt;

use num_derive::FromPrimitive;
use num_traits::FromPrimitive;
use thiserror::Error;

/// Result type alias for libvirt operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Coarse classification of a native failure, derived from its error code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    /// Malformed XML, configuration or request arguments.
    Config,
    /// Access denied or authentication failure.
    Permission,
    /// Lookup of a domain, snapshot or other object failed.
    NoSuchObject,
    /// The driver does not implement the operation or argument.
    Unsupported,
    /// Transport, RPC or system I/O failure.
    Io,
    /// The native side ran out of memory.
    OutOfMemory,
    /// Anything else.
    Internal,
}

impl ErrorCategory {
    /// Classify a `virErrorNumber` value.
    pub fn from_code(code: i32) -> Self {
        match code {
            2 => ErrorCategory::OutOfMemory,
            // INVALID_ARG, OS_TYPE..NO_DEVICE, CONF_SYNTAX, PARSE_FAILED, XML_ERROR,
            // XML_DETAIL, CONFIG_UNSUPPORTED, XML_INVALID_SCHEMA
            8 | 16..=23 | 27 | 32 | 33 | 35 | 67 | 92 => ErrorCategory::Config,
            29 | 45 | 79 | 88 | 94 => ErrorCategory::Permission,
            42 | 43 | 49 | 50 | 53 | 57 | 62 | 66 | 72 | 80 | 95 | 96 | 99 | 101 => {
                ErrorCategory::NoSuchObject
            }
            3 | 54 | 74 | 84 => ErrorCategory::Unsupported,
            4 | 5 | 10..=12 | 30 | 31 | 34 | 38..=40 | 68 | 85 | 86 | 98 => ErrorCategory::Io,
            _ => ErrorCategory::Internal,
        }
    }
}

/// Severity attached to a native error (`virErrorLevel`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, FromPrimitive)]
#[repr(i32)]
pub enum ErrorLevel {
    #[default]
    None = 0,
    Warning = 1,
    Error = 2,
}

/// Subsystem that raised a native error (`virErrorDomain`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, FromPrimitive)]
#[repr(i32)]
pub enum ErrorDomain {
    None = 0,
    Xen = 1,
    Xend = 2,
    XenStore = 3,
    Sexpr = 4,
    Xml = 5,
    Dom = 6,
    Rpc = 7,
    Proxy = 8,
    Conf = 9,
    Qemu = 10,
    Net = 11,
    Test = 12,
    Remote = 13,
    OpenVz = 14,
    XenXm = 15,
    StatsLinux = 16,
    Lxc = 17,
    Storage = 18,
    Network = 19,
    Domain = 20,
    Uml = 21,
    NodeDev = 22,
    XenInotify = 23,
    Security = 24,
    Vbox = 25,
    Interface = 26,
    One = 27,
    Esx = 28,
    Phyp = 29,
    Secret = 30,
    Cpu = 31,
    XenApi = 32,
    NwFilter = 33,
    Hook = 34,
    DomainSnapshot = 35,
    Audit = 36,
    SysInfo = 37,
    Streams = 38,
    Vmware = 39,
    Event = 40,
    Libxl = 41,
    Locking = 42,
    HyperV = 43,
    Capabilities = 44,
    Uri = 45,
    Auth = 46,
    Dbus = 47,
    Parallels = 48,
    Device = 49,
    Ssh = 50,
    Lockspace = 51,
    Initctl = 52,
    Identity = 53,
    Cgroup = 54,
    Access = 55,
    Systemd = 56,
    Bhyve = 57,
    Crypto = 58,
    Firewall = 59,
    Polkit = 60,
    Thread = 61,
    Admin = 62,
    Logging = 63,
    XenXl = 64,
    Perf = 65,
    Libssh = 66,
    Resctrl = 67,
    Firewalld = 68,
    DomainCheckpoint = 69,
}

/// A native failure copied out of libvirt's per-thread error slot.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ErrorRecord {
    /// `virErrorNumber` value.
    pub code: i32,
    /// `virErrorDomain` value.
    pub domain: i32,
    /// Human-readable message.
    pub message: String,
    /// Severity.
    pub level: ErrorLevel,
    /// Extra string information.
    pub str1: Option<String>,
    /// Extra string information.
    pub str2: Option<String>,
    /// Extra string information.
    pub str3: Option<String>,
    /// Extra number information.
    pub int1: i32,
    /// Extra number information.
    pub int2: i32,
}

impl ErrorRecord {
    /// Category used to choose the [`Error`] variant.
    pub fn category(&self) -> ErrorCategory {
        ErrorCategory::from_code(self.code)
    }

    /// Decoded error domain, if it is one this crate knows about.
    pub fn error_domain(&self) -> Option<ErrorDomain> {
        ErrorDomain::from_i32(self.domain)
    }
}

impl fmt::Display for ErrorRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (code {}, domain {})", self.message, self.code, self.domain)
    }
}

/// Error type for libvirt operations.
#[derive(Error, Debug)]
pub enum Error {
    /// XML, configuration or argument rejected by libvirt.
    #[error("configuration error: {0}")]
    Config(ErrorRecord),

    /// Permission or authentication failure.
    #[error("permission denied: {0}")]
    Permission(ErrorRecord),

    /// The requested object does not exist.
    #[error("no such object: {0}")]
    NoSuchObject(ErrorRecord),

    /// The driver does not support the operation.
    #[error("unsupported operation: {0}")]
    Unsupported(ErrorRecord),

    /// Transport or system I/O failure.
    #[error("I/O error: {0}")]
    Io(ErrorRecord),

    /// libvirt ran out of memory.
    #[error("out of memory: {0}")]
    OutOfMemory(ErrorRecord),

    /// Any other native failure.
    #[error("libvirt error: {0}")]
    Internal(ErrorRecord),

    /// The handle was already released.
    #[error("{0} handle used after release")]
    UseAfterFree(&'static str),

    /// Function argument is invalid.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// The loaded libvirt does not export the entry point.
    #[error("libvirt does not export {0}")]
    MissingSymbol(&'static str),

    /// libvirt could not be loaded.
    #[error("failed to load libvirt: {0}")]
    LibraryLoad(String),
}

impl Error {
    /// Wrap a native error record in the variant matching its category.
    pub fn from_record(record: ErrorRecord) -> Self {
        match record.category() {
            ErrorCategory::Config => Error::Config(record),
            ErrorCategory::Permission => Error::Permission(record),
            ErrorCategory::NoSuchObject => Error::NoSuchObject(record),
            ErrorCategory::Unsupported => Error::Unsupported(record),
            ErrorCategory::Io => Error::Io(record),
            ErrorCategory::OutOfMemory => Error::OutOfMemory(record),
            ErrorCategory::Internal => Error::Internal(record),
        }
    }

    /// The native record, for errors that came from libvirt.
    pub fn record(&self) -> Option<&ErrorRecord> {
        match self {
            Error::Config(r)
            | Error::Permission(r)
            | Error::NoSuchObject(r)
            | Error::Unsupported(r)
            | Error::Io(r)
            | Error::OutOfMemory(r)
            | Error::Internal(r) => Some(r),
            _ => None,
        }
    }

    /// Category of a native error.
    pub fn category(&self) -> Option<ErrorCategory> {
        self.record().map(ErrorRecord::category)
    }

    /// Check if this is a failed lookup.
    pub fn is_no_such_object(&self) -> bool {
        matches!(self, Error::NoSuchObject(_))
    }

    /// Check if this is an unsupported-operation error.
    pub fn is_unsupported(&self) -> bool {
        matches!(self, Error::Unsupported(_) | Error::MissingSymbol(_))
    }

    /// Check if a released handle was used.
    pub fn is_use_after_free(&self) -> bool {
        matches!(self, Error::UseAfterFree(_))
    }
}
