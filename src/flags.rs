//! Bitmask types for libvirt `flags` parameters.
//!
//! Each group mirrors one libvirt flags enum. Values are passed through
//! unchanged; libvirt rejects bits it does not understand.

use bitflags::bitflags;

bitflags! {
    /// `virConnectListAllDomainsFlags`.
    #[derive(Default)]
    pub struct ListDomainsFlags: u32 {
        const ACTIVE         = 1 << 0;
        const INACTIVE       = 1 << 1;
        const PERSISTENT     = 1 << 2;
        const TRANSIENT      = 1 << 3;
        const RUNNING        = 1 << 4;
        const PAUSED         = 1 << 5;
        const SHUTOFF        = 1 << 6;
        const OTHER          = 1 << 7;
        const MANAGEDSAVE    = 1 << 8;
        const NO_MANAGEDSAVE = 1 << 9;
        const AUTOSTART      = 1 << 10;
        const NO_AUTOSTART   = 1 << 11;
        const HAS_SNAPSHOT   = 1 << 12;
        const NO_SNAPSHOT    = 1 << 13;
    }
}

bitflags! {
    /// `virDomainCreateFlags`, used when starting or creating a domain.
    #[derive(Default)]
    pub struct CreateFlags: u32 {
        /// Leave the guest paused after launch.
        const START_PAUSED = 1 << 0;
        /// Destroy the guest when the connection closes.
        const AUTODESTROY  = 1 << 1;
        const BYPASS_CACHE = 1 << 2;
        /// Discard any managed save image.
        const FORCE_BOOT   = 1 << 3;
    }
}

bitflags! {
    /// `virDomainDestroyFlagsValues`.
    #[derive(Default)]
    pub struct DestroyFlags: u32 {
        /// Send SIGTERM only, never SIGKILL.
        const GRACEFUL = 1 << 0;
    }
}

bitflags! {
    /// `virDomainShutdownFlagValues`.
    #[derive(Default)]
    pub struct ShutdownFlags: u32 {
        const ACPI_POWER_BTN = 1 << 0;
        const GUEST_AGENT    = 1 << 1;
        const INITCTL        = 1 << 2;
        const SIGNAL         = 1 << 3;
    }
}

bitflags! {
    /// `virDomainRebootFlagValues`.
    #[derive(Default)]
    pub struct RebootFlags: u32 {
        const ACPI_POWER_BTN = 1 << 0;
        const GUEST_AGENT    = 1 << 1;
        const INITCTL        = 1 << 2;
        const SIGNAL         = 1 << 3;
    }
}

bitflags! {
    /// `virDomainUndefineFlagsValues`.
    #[derive(Default)]
    pub struct UndefineFlags: u32 {
        const MANAGED_SAVE       = 1 << 0;
        const SNAPSHOTS_METADATA = 1 << 1;
    }
}

bitflags! {
    /// `virDomainXMLFlags`.
    #[derive(Default)]
    pub struct XmlFlags: u32 {
        /// Include security-sensitive information.
        const SECURE     = 1 << 0;
        /// Describe the persistent config rather than the running guest.
        const INACTIVE   = 1 << 1;
        const UPDATE_CPU = 1 << 2;
        const MIGRATABLE = 1 << 3;
    }
}

bitflags! {
    /// `virDomainDeviceModifyFlags`.
    ///
    /// The empty set means "current": live if running, config otherwise.
    #[derive(Default)]
    pub struct DeviceModifyFlags: u32 {
        const LIVE   = 1 << 0;
        const CONFIG = 1 << 1;
        const FORCE  = 1 << 2;
    }
}

bitflags! {
    /// `virDomainVcpuFlags`.
    #[derive(Default)]
    pub struct VcpuFlags: u32 {
        const LIVE    = 1 << 0;
        const CONFIG  = 1 << 1;
        const MAXIMUM = 1 << 2;
        const GUEST   = 1 << 3;
    }
}

bitflags! {
    /// `virDomainMemoryModFlags`.
    #[derive(Default)]
    pub struct MemoryFlags: u32 {
        const LIVE    = 1 << 0;
        const CONFIG  = 1 << 1;
        const MAXIMUM = 1 << 2;
    }
}

bitflags! {
    /// `virDomainCoreDumpFlags`.
    #[derive(Default)]
    pub struct CoreDumpFlags: u32 {
        const CRASH        = 1 << 0;
        const LIVE         = 1 << 1;
        const BYPASS_CACHE = 1 << 2;
        const RESET        = 1 << 3;
    }
}

bitflags! {
    /// `virDomainSaveRestoreFlags`, also accepted by managed save.
    #[derive(Default)]
    pub struct SaveFlags: u32 {
        const BYPASS_CACHE = 1 << 0;
        const RUNNING      = 1 << 1;
        const PAUSED       = 1 << 2;
    }
}

bitflags! {
    /// `virDomainMigrateFlags`.
    #[derive(Default)]
    pub struct MigrateFlags: u32 {
        /// Do not pause the guest during migration.
        const LIVE              = 1 << 0;
        /// Source and destination libvirtd talk directly.
        const PEER2PEER         = 1 << 1;
        /// Tunnel migration data over the libvirtd connection.
        const TUNNELLED         = 1 << 2;
        const PERSIST_DEST      = 1 << 3;
        const UNDEFINE_SOURCE   = 1 << 4;
        const PAUSED            = 1 << 5;
        const NON_SHARED_DISK   = 1 << 6;
        const NON_SHARED_INC    = 1 << 7;
        const CHANGE_PROTECTION = 1 << 8;
        const UNSAFE            = 1 << 9;
    }
}

bitflags! {
    /// `virDomainSnapshotCreateFlags`.
    #[derive(Default)]
    pub struct SnapshotCreateFlags: u32 {
        const REDEFINE    = 1 << 0;
        const CURRENT     = 1 << 1;
        const NO_METADATA = 1 << 2;
        const HALT        = 1 << 3;
        const DISK_ONLY   = 1 << 4;
        const REUSE_EXT   = 1 << 5;
        const QUIESCE     = 1 << 6;
        const ATOMIC      = 1 << 7;
    }
}

bitflags! {
    /// `virDomainSnapshotDeleteFlags`.
    #[derive(Default)]
    pub struct SnapshotDeleteFlags: u32 {
        const CHILDREN      = 1 << 0;
        const METADATA_ONLY = 1 << 1;
        const CHILDREN_ONLY = 1 << 2;
    }
}

bitflags! {
    /// `virDomainSnapshotRevertFlags`.
    #[derive(Default)]
    pub struct SnapshotRevertFlags: u32 {
        const RUNNING = 1 << 0;
        const PAUSED  = 1 << 1;
        const FORCE   = 1 << 2;
    }
}

bitflags! {
    /// `virDomainSnapshotListFlags`, used when counting or listing snapshots.
    #[derive(Default)]
    pub struct SnapshotListFlags: u32 {
        const ROOTS       = 1 << 0;
        const METADATA    = 1 << 1;
        const LEAVES      = 1 << 2;
        const NO_LEAVES   = 1 << 3;
        const NO_METADATA = 1 << 4;
    }
}

bitflags! {
    /// `virDomainBlockJobAbortFlags`.
    #[derive(Default)]
    pub struct BlockJobAbortFlags: u32 {
        const ASYNC = 1 << 0;
        const PIVOT = 1 << 1;
    }
}

bitflags! {
    /// `virDomainBlockResizeFlags`.
    #[derive(Default)]
    pub struct BlockResizeFlags: u32 {
        /// Size is in bytes instead of KiB.
        const BYTES = 1 << 0;
    }
}
