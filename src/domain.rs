//! Domain (guest) operations.

use std::os::raw::{c_char, c_int, c_uint, c_ulong, c_void};
use std::ptr;

use num_traits::FromPrimitive;
use uuid::Uuid;

use crate::connect::{Connect, ConnectionContext};
use crate::error::{Error, Result};
use crate::ffi::call::{
    array_string, borrowed_string, native, opt_cstring, opt_ptr, take_string, to_cstring, to_len,
    UintOrMax, UlongOrZero,
};
use crate::ffi::handles::{DomainObject, Handle};
use crate::ffi::library::Library;
use crate::ffi::raw::*;
use crate::flags::*;
use crate::transfer::{transfer, BufferCursor};
use crate::types::*;

/// Most keycodes `send_key` accepts in one call.
pub const MAX_SEND_KEYS: usize = 16;

/// Number of bytes needed for a CPU bitmap covering `max_cpus` host CPUs.
pub fn cpu_map_length(max_cpus: u32) -> usize {
    (max_cpus as usize + 7) / 8
}

/// Identity of a domain: which connection it came from and its UUID.
///
/// Two domain handles refer to the same guest exactly when their identities
/// are equal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DomainIdentity {
    pub connection: u64,
    pub uuid: Uuid,
}

/// A handle to a domain.
///
/// The libvirt reference is released on drop, or earlier with
/// [`Domain::release`].
pub struct Domain {
    pub(crate) handle: Handle<DomainObject>,
    pub(crate) context: ConnectionContext,
}

// Domain is Send + Sync
unsafe impl Send for Domain {}
unsafe impl Sync for Domain {}

impl Domain {
    /// Wrap a reference handed over by libvirt.
    ///
    /// # Safety
    ///
    /// `ptr` must be a live domain reference owned by the caller, obtained
    /// through `context`'s connection.
    pub(crate) unsafe fn from_owned(context: ConnectionContext, ptr: VirDomainPtr) -> Self {
        Self {
            handle: Handle::from_owned(context.library.clone(), ptr),
            context,
        }
    }

    /// Take a new reference on a pointer libvirt only lends us, such as the
    /// domain passed to an event callback.
    ///
    /// # Safety
    ///
    /// `ptr` must be null or a live domain pointer for the duration of the call.
    pub(crate) unsafe fn from_borrowed(
        context: ConnectionContext,
        ptr: VirDomainPtr,
    ) -> Result<Self> {
        Ok(Self {
            handle: Handle::from_borrowed(context.library.clone(), ptr)?,
            context,
        })
    }

    fn lib(&self) -> &Library {
        &self.context.library
    }

    pub(crate) fn ptr(&self) -> Result<VirDomainPtr> {
        self.handle.as_ptr()
    }

    /// Id of the connection this domain was obtained from.
    pub fn connection_id(&self) -> u64 {
        self.context.id
    }

    /// Check if the handle has been released.
    pub fn is_released(&self) -> bool {
        self.handle.is_released()
    }

    /// Release the libvirt reference now. Releasing twice is a no-op.
    pub fn release(&mut self) -> Result<()> {
        self.handle.release()
    }

    /// Check if two handles refer to the same guest.
    ///
    /// Handles from different connections are never the same, even if the
    /// UUIDs match.
    pub fn same_as(&self, other: &Domain) -> Result<bool> {
        if self.context.id != other.context.id {
            return Ok(false);
        }
        if self.ptr()? == other.ptr()? {
            return Ok(true);
        }
        Ok(self.uuid()? == other.uuid()?)
    }

    /// Hashable identity of this domain.
    pub fn identity(&self) -> Result<DomainIdentity> {
        Ok(DomainIdentity {
            connection: self.context.id,
            uuid: self.uuid()?,
        })
    }

    // Lifecycle

    /// Start a defined domain.
    pub fn create(&self) -> Result<()> {
        let dom = self.ptr()?;
        let create = native!(self.lib(), virDomainCreate);
        self.lib().check(|| unsafe { create(dom) })?;
        Ok(())
    }

    pub fn create_with_flags(&self, flags: CreateFlags) -> Result<()> {
        let dom = self.ptr()?;
        let create = native!(self.lib(), virDomainCreateWithFlags);
        self.lib().check(|| unsafe { create(dom, flags.bits()) })?;
        Ok(())
    }

    /// Forcefully stop the domain.
    pub fn destroy(&self) -> Result<()> {
        let dom = self.ptr()?;
        let destroy = native!(self.lib(), virDomainDestroy);
        self.lib().check(|| unsafe { destroy(dom) })?;
        Ok(())
    }

    pub fn destroy_flags(&self, flags: DestroyFlags) -> Result<()> {
        let dom = self.ptr()?;
        let destroy = native!(self.lib(), virDomainDestroyFlags);
        self.lib().check(|| unsafe { destroy(dom, flags.bits()) })?;
        Ok(())
    }

    pub fn suspend(&self) -> Result<()> {
        let dom = self.ptr()?;
        let suspend = native!(self.lib(), virDomainSuspend);
        self.lib().check(|| unsafe { suspend(dom) })?;
        Ok(())
    }

    pub fn resume(&self) -> Result<()> {
        let dom = self.ptr()?;
        let resume = native!(self.lib(), virDomainResume);
        self.lib().check(|| unsafe { resume(dom) })?;
        Ok(())
    }

    /// Ask the guest to shut down.
    pub fn shutdown(&self) -> Result<()> {
        let dom = self.ptr()?;
        let shutdown = native!(self.lib(), virDomainShutdown);
        self.lib().check(|| unsafe { shutdown(dom) })?;
        Ok(())
    }

    pub fn shutdown_flags(&self, flags: ShutdownFlags) -> Result<()> {
        let dom = self.ptr()?;
        let shutdown = native!(self.lib(), virDomainShutdownFlags);
        self.lib().check(|| unsafe { shutdown(dom, flags.bits()) })?;
        Ok(())
    }

    pub fn reboot(&self, flags: RebootFlags) -> Result<()> {
        let dom = self.ptr()?;
        let reboot = native!(self.lib(), virDomainReboot);
        self.lib().check(|| unsafe { reboot(dom, flags.bits()) })?;
        Ok(())
    }

    /// Reset the guest without a shutdown.
    pub fn reset(&self) -> Result<()> {
        let dom = self.ptr()?;
        let reset = native!(self.lib(), virDomainReset);
        self.lib().check(|| unsafe { reset(dom, 0) })?;
        Ok(())
    }

    /// Remove the persistent configuration.
    pub fn undefine(&self) -> Result<()> {
        let dom = self.ptr()?;
        let undefine = native!(self.lib(), virDomainUndefine);
        self.lib().check(|| unsafe { undefine(dom) })?;
        Ok(())
    }

    pub fn undefine_flags(&self, flags: UndefineFlags) -> Result<()> {
        let dom = self.ptr()?;
        let undefine = native!(self.lib(), virDomainUndefineFlags);
        self.lib().check(|| unsafe { undefine(dom, flags.bits()) })?;
        Ok(())
    }

    /// Save the guest's memory to `path` and stop it.
    pub fn save(&self, path: &str) -> Result<()> {
        let dom = self.ptr()?;
        let save = native!(self.lib(), virDomainSave);
        let path = to_cstring(path)?;
        self.lib().check(|| unsafe { save(dom, path.as_ptr()) })?;
        Ok(())
    }

    /// Save the guest to a libvirt-managed image and stop it.
    pub fn managed_save(&self, flags: SaveFlags) -> Result<()> {
        let dom = self.ptr()?;
        let save = native!(self.lib(), virDomainManagedSave);
        self.lib().check(|| unsafe { save(dom, flags.bits()) })?;
        Ok(())
    }

    pub fn has_managed_save_image(&self) -> Result<bool> {
        let dom = self.ptr()?;
        let has_image = native!(self.lib(), virDomainHasManagedSaveImage);
        Ok(self.lib().check(|| unsafe { has_image(dom, 0) })? == 1)
    }

    pub fn managed_save_remove(&self) -> Result<()> {
        let dom = self.ptr()?;
        let remove = native!(self.lib(), virDomainManagedSaveRemove);
        self.lib().check(|| unsafe { remove(dom, 0) })?;
        Ok(())
    }

    /// Dump the guest's core to `path`.
    pub fn core_dump(&self, path: &str, flags: CoreDumpFlags) -> Result<()> {
        let dom = self.ptr()?;
        let dump = native!(self.lib(), virDomainCoreDump);
        let path = to_cstring(path)?;
        self.lib().check(|| unsafe { dump(dom, path.as_ptr(), flags.bits()) })?;
        Ok(())
    }

    /// Abort the current background job.
    pub fn abort_job(&self) -> Result<()> {
        let dom = self.ptr()?;
        let abort = native!(self.lib(), virDomainAbortJob);
        self.lib().check(|| unsafe { abort(dom) })?;
        Ok(())
    }

    /// Suspend the guest through its power management for `seconds`
    /// (0 for no timed wakeup).
    pub fn pm_suspend_for(&self, target: SuspendTarget, seconds: u64) -> Result<()> {
        let dom = self.ptr()?;
        let suspend = native!(self.lib(), virDomainPMSuspendForDuration);
        self.lib()
            .check(|| unsafe { suspend(dom, u32::from(target), seconds, 0) })?;
        Ok(())
    }

    pub fn pm_wakeup(&self) -> Result<()> {
        let dom = self.ptr()?;
        let wakeup = native!(self.lib(), virDomainPMWakeup);
        self.lib().check(|| unsafe { wakeup(dom, 0) })?;
        Ok(())
    }

    /// Send key presses to the guest, holding them for `holdtime_ms`.
    pub fn send_key(&self, codeset: KeycodeSet, holdtime_ms: u32, keycodes: &[u32]) -> Result<()> {
        if keycodes.is_empty() || keycodes.len() > MAX_SEND_KEYS {
            return Err(Error::InvalidArgument(format!(
                "send_key takes 1 to {} keycodes, got {}",
                MAX_SEND_KEYS,
                keycodes.len()
            )));
        }

        let dom = self.ptr()?;
        let send_key = native!(self.lib(), virDomainSendKey);
        let mut keys: Vec<c_uint> = keycodes.to_vec();
        let count = keys.len() as c_int;
        self.lib().check(|| unsafe {
            send_key(dom, u32::from(codeset), holdtime_ms, keys.as_mut_ptr(), count, 0)
        })?;
        Ok(())
    }

    // Queries

    pub fn name(&self) -> Result<String> {
        let dom = self.ptr()?;
        let get_name = native!(self.lib(), virDomainGetName);
        self.lib()
            .invoke(|| unsafe { get_name(dom) }, |s| unsafe { borrowed_string(s) })
    }

    /// Hypervisor id of the domain, `None` if it is not running.
    pub fn id(&self) -> Result<Option<u32>> {
        let dom = self.ptr()?;
        let get_id = native!(self.lib(), virDomainGetID);
        match self.lib().invoke(|| UintOrMax(unsafe { get_id(dom) }), |id| id.0) {
            Ok(id) => Ok(Some(id)),
            // Inactive domains return the sentinel without setting an error.
            Err(err) if err.record().map_or(false, |r| r.code == 0) => Ok(None),
            Err(err) => Err(err),
        }
    }

    pub fn uuid(&self) -> Result<Uuid> {
        let dom = self.ptr()?;
        let get_uuid = native!(self.lib(), virDomainGetUUID);
        let mut bytes = [0u8; VIR_UUID_BUFLEN];
        self.lib().check(|| unsafe { get_uuid(dom, bytes.as_mut_ptr()) })?;
        Ok(Uuid::from_bytes(bytes))
    }

    pub fn uuid_string(&self) -> Result<String> {
        let dom = self.ptr()?;
        let get_uuid = native!(self.lib(), virDomainGetUUIDString);
        let mut buf = [0 as c_char; VIR_UUID_STRING_BUFLEN];
        self.lib().check(|| unsafe { get_uuid(dom, buf.as_mut_ptr()) })?;
        Ok(array_string(&buf))
    }

    /// Guest OS type, e.g. "hvm".
    pub fn os_type(&self) -> Result<String> {
        let dom = self.ptr()?;
        let get_os_type = native!(self.lib(), virDomainGetOSType);
        self.lib()
            .invoke(|| unsafe { get_os_type(dom) }, |s| unsafe { take_string(s) })
    }

    pub fn xml_desc(&self, flags: XmlFlags) -> Result<String> {
        let dom = self.ptr()?;
        let get_xml = native!(self.lib(), virDomainGetXMLDesc);
        self.lib().invoke(
            || unsafe { get_xml(dom, flags.bits()) },
            |s| unsafe { take_string(s) },
        )
    }

    pub fn info(&self) -> Result<DomainInfo> {
        let dom = self.ptr()?;
        let get_info = native!(self.lib(), virDomainGetInfo);
        let mut info = VirDomainInfo::default();
        self.lib().check(|| unsafe { get_info(dom, &mut info) })?;
        Ok(DomainInfo::from(&info))
    }

    /// Current state and the driver's reason code for it.
    pub fn state(&self) -> Result<(DomainState, i32)> {
        let dom = self.ptr()?;
        let get_state = native!(self.lib(), virDomainGetState);
        let mut state: c_int = 0;
        let mut reason: c_int = 0;
        self.lib()
            .check(|| unsafe { get_state(dom, &mut state, &mut reason, 0) })?;
        Ok((DomainState::from_i32(state).unwrap_or_default(), reason))
    }

    pub fn job_info(&self) -> Result<DomainJobInfo> {
        let dom = self.ptr()?;
        let get_info = native!(self.lib(), virDomainGetJobInfo);
        let mut info = VirDomainJobInfo::default();
        self.lib().check(|| unsafe { get_info(dom, &mut info) })?;
        Ok(DomainJobInfo::from(&info))
    }

    pub fn control_info(&self) -> Result<DomainControlInfo> {
        let dom = self.ptr()?;
        let get_info = native!(self.lib(), virDomainGetControlInfo);
        let mut info = VirDomainControlInfo::default();
        self.lib().check(|| unsafe { get_info(dom, &mut info, 0) })?;
        Ok(DomainControlInfo::from(&info))
    }

    /// Maximum memory in KiB.
    pub fn max_memory(&self) -> Result<u64> {
        let dom = self.ptr()?;
        let get_max = native!(self.lib(), virDomainGetMaxMemory);
        self.lib()
            .invoke(|| UlongOrZero(unsafe { get_max(dom) }), |max| max.0 as u64)
    }

    pub fn max_vcpus(&self) -> Result<u32> {
        let dom = self.ptr()?;
        let get_max = native!(self.lib(), virDomainGetMaxVcpus);
        self.lib()
            .invoke(|| unsafe { get_max(dom) }, |n| to_len(n) as u32)
    }

    pub fn autostart(&self) -> Result<bool> {
        let dom = self.ptr()?;
        let get_autostart = native!(self.lib(), virDomainGetAutostart);
        let mut autostart: c_int = 0;
        self.lib()
            .check(|| unsafe { get_autostart(dom, &mut autostart) })?;
        Ok(autostart != 0)
    }

    pub fn is_active(&self) -> Result<bool> {
        let dom = self.ptr()?;
        let is_active = native!(self.lib(), virDomainIsActive);
        Ok(self.lib().check(|| unsafe { is_active(dom) })? == 1)
    }

    pub fn is_persistent(&self) -> Result<bool> {
        let dom = self.ptr()?;
        let is_persistent = native!(self.lib(), virDomainIsPersistent);
        Ok(self.lib().check(|| unsafe { is_persistent(dom) })? == 1)
    }

    /// Check if the running config differs from the persistent one.
    pub fn is_updated(&self) -> Result<bool> {
        let dom = self.ptr()?;
        let is_updated = native!(self.lib(), virDomainIsUpdated);
        Ok(self.lib().check(|| unsafe { is_updated(dom) })? == 1)
    }

    pub fn security_label(&self) -> Result<SecurityLabel> {
        let dom = self.ptr()?;
        let get_label = native!(self.lib(), virDomainGetSecurityLabel);
        let mut label = Box::<VirSecurityLabel>::default();
        self.lib().check(|| unsafe { get_label(dom, &mut *label) })?;
        Ok(SecurityLabel::from(&*label))
    }

    // Tuning

    pub fn set_autostart(&self, autostart: bool) -> Result<()> {
        let dom = self.ptr()?;
        let set_autostart = native!(self.lib(), virDomainSetAutostart);
        self.lib()
            .check(|| unsafe { set_autostart(dom, autostart as c_int) })?;
        Ok(())
    }

    /// Set the maximum memory in KiB.
    pub fn set_max_memory(&self, kib: u64) -> Result<()> {
        let dom = self.ptr()?;
        let set_max = native!(self.lib(), virDomainSetMaxMemory);
        self.lib().check(|| unsafe { set_max(dom, kib as c_ulong) })?;
        Ok(())
    }

    /// Set the current memory in KiB.
    pub fn set_memory(&self, kib: u64) -> Result<()> {
        let dom = self.ptr()?;
        let set_memory = native!(self.lib(), virDomainSetMemory);
        self.lib().check(|| unsafe { set_memory(dom, kib as c_ulong) })?;
        Ok(())
    }

    pub fn set_memory_flags(&self, kib: u64, flags: MemoryFlags) -> Result<()> {
        let dom = self.ptr()?;
        let set_memory = native!(self.lib(), virDomainSetMemoryFlags);
        self.lib()
            .check(|| unsafe { set_memory(dom, kib as c_ulong, flags.bits()) })?;
        Ok(())
    }

    pub fn set_vcpus(&self, count: u32) -> Result<()> {
        let dom = self.ptr()?;
        let set_vcpus = native!(self.lib(), virDomainSetVcpus);
        self.lib().check(|| unsafe { set_vcpus(dom, count) })?;
        Ok(())
    }

    pub fn set_vcpus_flags(&self, count: u32, flags: VcpuFlags) -> Result<()> {
        let dom = self.ptr()?;
        let set_vcpus = native!(self.lib(), virDomainSetVcpusFlags);
        self.lib()
            .check(|| unsafe { set_vcpus(dom, count, flags.bits()) })?;
        Ok(())
    }

    /// Pin a vCPU to the host CPUs set in `cpumap`, one bit per CPU.
    pub fn pin_vcpu(&self, vcpu: u32, cpumap: &[u8]) -> Result<()> {
        if cpumap.is_empty() {
            return Err(Error::InvalidArgument("cpu map must not be empty".to_string()));
        }

        let dom = self.ptr()?;
        let pin = native!(self.lib(), virDomainPinVcpu);
        let mut map = cpumap.to_vec();
        let maplen = map.len() as c_int;
        self.lib()
            .check(|| unsafe { pin(dom, vcpu, map.as_mut_ptr(), maplen) })?;
        Ok(())
    }

    /// Information about every vCPU.
    pub fn vcpus_info(&self) -> Result<Vec<VcpuInfo>> {
        let dom = self.ptr()?;
        let get_vcpus = native!(self.lib(), virDomainGetVcpus);
        let max = self.info()?.nr_virt_cpu as usize;
        if max == 0 {
            return Ok(Vec::new());
        }

        let mut info = vec![VirVcpuInfo::default(); max];
        let count = self.lib().invoke(
            || unsafe { get_vcpus(dom, info.as_mut_ptr(), max as c_int, ptr::null_mut(), 0) },
            to_len,
        )?;
        info.truncate(count);
        Ok(info.iter().map(VcpuInfo::from).collect())
    }

    /// Information about every vCPU, with the host CPUs each may run on.
    ///
    /// Each map holds [`cpu_map_length`]`(max_cpus)` bytes.
    pub fn vcpu_cpu_maps(&self, max_cpus: u32) -> Result<Vec<(VcpuInfo, Vec<u8>)>> {
        let dom = self.ptr()?;
        let get_vcpus = native!(self.lib(), virDomainGetVcpus);
        let max = self.info()?.nr_virt_cpu as usize;
        let maplen = cpu_map_length(max_cpus);
        if max == 0 || maplen == 0 {
            return Ok(Vec::new());
        }

        let mut info = vec![VirVcpuInfo::default(); max];
        let mut maps = vec![0u8; max * maplen];
        let count = self.lib().invoke(
            || unsafe {
                get_vcpus(
                    dom,
                    info.as_mut_ptr(),
                    max as c_int,
                    maps.as_mut_ptr(),
                    maplen as c_int,
                )
            },
            to_len,
        )?;

        Ok(info
            .iter()
            .zip(maps.chunks(maplen))
            .take(count)
            .map(|(info, map)| (VcpuInfo::from(info), map.to_vec()))
            .collect())
    }

    /// Scheduler name and the number of parameters it exposes.
    pub fn scheduler_type(&self) -> Result<(String, usize)> {
        let dom = self.ptr()?;
        let get_type = native!(self.lib(), virDomainGetSchedulerType);
        let mut nparams: c_int = 0;
        let name = self.lib().invoke(
            || unsafe { get_type(dom, &mut nparams) },
            |s| unsafe { take_string(s) },
        )?;
        Ok((name, to_len(nparams)))
    }

    pub fn scheduler_parameters(&self) -> Result<Vec<SchedParameter>> {
        let (_, count) = self.scheduler_type()?;
        if count == 0 {
            return Ok(Vec::new());
        }

        let dom = self.ptr()?;
        let get_params = native!(self.lib(), virDomainGetSchedulerParameters);
        let mut params = vec![VirTypedParameter::default(); count];
        let mut nparams = count as c_int;
        self.lib()
            .check(|| unsafe { get_params(dom, params.as_mut_ptr(), &mut nparams) })?;
        params.truncate(to_len(nparams));
        Ok(params.iter().filter_map(SchedParameter::from_raw).collect())
    }

    pub fn set_scheduler_parameters(&self, params: &[SchedParameter]) -> Result<()> {
        let mut raw = params
            .iter()
            .map(SchedParameter::to_raw)
            .collect::<Result<Vec<_>>>()?;

        let dom = self.ptr()?;
        let set_params = native!(self.lib(), virDomainSetSchedulerParameters);
        let count = raw.len() as c_int;
        self.lib()
            .check(|| unsafe { set_params(dom, raw.as_mut_ptr(), count) })?;
        Ok(())
    }

    // Devices

    /// Hot-plug a device described by `xml`.
    pub fn attach_device(&self, xml: &str) -> Result<()> {
        let dom = self.ptr()?;
        let attach = native!(self.lib(), virDomainAttachDevice);
        let xml = to_cstring(xml)?;
        self.lib().check(|| unsafe { attach(dom, xml.as_ptr()) })?;
        Ok(())
    }

    pub fn attach_device_flags(&self, xml: &str, flags: DeviceModifyFlags) -> Result<()> {
        let dom = self.ptr()?;
        let attach = native!(self.lib(), virDomainAttachDeviceFlags);
        let xml = to_cstring(xml)?;
        self.lib()
            .check(|| unsafe { attach(dom, xml.as_ptr(), flags.bits()) })?;
        Ok(())
    }

    pub fn detach_device(&self, xml: &str) -> Result<()> {
        let dom = self.ptr()?;
        let detach = native!(self.lib(), virDomainDetachDevice);
        let xml = to_cstring(xml)?;
        self.lib().check(|| unsafe { detach(dom, xml.as_ptr()) })?;
        Ok(())
    }

    pub fn detach_device_flags(&self, xml: &str, flags: DeviceModifyFlags) -> Result<()> {
        let dom = self.ptr()?;
        let detach = native!(self.lib(), virDomainDetachDeviceFlags);
        let xml = to_cstring(xml)?;
        self.lib()
            .check(|| unsafe { detach(dom, xml.as_ptr(), flags.bits()) })?;
        Ok(())
    }

    pub fn update_device_flags(&self, xml: &str, flags: DeviceModifyFlags) -> Result<()> {
        let dom = self.ptr()?;
        let update = native!(self.lib(), virDomainUpdateDeviceFlags);
        let xml = to_cstring(xml)?;
        self.lib()
            .check(|| unsafe { update(dom, xml.as_ptr(), flags.bits()) })?;
        Ok(())
    }

    // Block and memory

    pub fn block_info(&self, disk: &str) -> Result<DomainBlockInfo> {
        let dom = self.ptr()?;
        let get_info = native!(self.lib(), virDomainGetBlockInfo);
        let disk = to_cstring(disk)?;
        let mut info = VirDomainBlockInfo::default();
        self.lib()
            .check(|| unsafe { get_info(dom, disk.as_ptr(), &mut info, 0) })?;
        Ok(DomainBlockInfo::from(&info))
    }

    pub fn block_stats(&self, disk: &str) -> Result<DomainBlockStats> {
        let dom = self.ptr()?;
        let get_stats = native!(self.lib(), virDomainBlockStats);
        let disk = to_cstring(disk)?;
        let mut stats = VirDomainBlockStats::default();
        self.lib().check(|| unsafe {
            get_stats(
                dom,
                disk.as_ptr(),
                &mut stats,
                std::mem::size_of::<VirDomainBlockStats>(),
            )
        })?;
        Ok(DomainBlockStats::from(&stats))
    }

    pub fn interface_stats(&self, device: &str) -> Result<DomainInterfaceStats> {
        let dom = self.ptr()?;
        let get_stats = native!(self.lib(), virDomainInterfaceStats);
        let device = to_cstring(device)?;
        let mut stats = VirDomainInterfaceStats::default();
        self.lib().check(|| unsafe {
            get_stats(
                dom,
                device.as_ptr(),
                &mut stats,
                std::mem::size_of::<VirDomainInterfaceStats>(),
            )
        })?;
        Ok(DomainInterfaceStats::from(&stats))
    }

    /// Resize a disk; `size` is in KiB unless `flags` has `BYTES`.
    pub fn block_resize(&self, disk: &str, size: u64, flags: BlockResizeFlags) -> Result<()> {
        let dom = self.ptr()?;
        let resize = native!(self.lib(), virDomainBlockResize);
        let disk = to_cstring(disk)?;
        self.lib()
            .check(|| unsafe { resize(dom, disk.as_ptr(), size, flags.bits()) })?;
        Ok(())
    }

    /// Fill `buf` with disk contents starting at byte `offset`.
    ///
    /// Large reads are split into chunks of at most the connection's peek
    /// chunk size. On failure the bytes before the failing chunk have been
    /// written and the rest of `buf` is untouched.
    pub fn block_peek(&self, disk: &str, offset: u64, buf: &mut [u8]) -> Result<()> {
        let dom = self.ptr()?;
        let peek = native!(self.lib(), virDomainBlockPeek);
        let disk = to_cstring(disk)?;

        let mut cursor = BufferCursor::new(buf);
        transfer(&mut cursor, self.context.peek_chunk_size, |done, window| {
            let start = chunk_offset(offset, done)?;
            self.lib().check(|| unsafe {
                peek(
                    dom,
                    disk.as_ptr(),
                    start,
                    window.len(),
                    window.as_mut_ptr() as *mut c_void,
                    0,
                )
            })?;
            Ok(())
        })
    }

    /// Fill `buf` with guest memory starting at address `start`.
    ///
    /// Chunked like [`Domain::block_peek`].
    pub fn memory_peek(&self, start: u64, buf: &mut [u8], mode: MemoryAddressMode) -> Result<()> {
        let dom = self.ptr()?;
        let peek = native!(self.lib(), virDomainMemoryPeek);
        let flags = u32::from(mode);

        let mut cursor = BufferCursor::new(buf);
        transfer(&mut cursor, self.context.peek_chunk_size, |done, window| {
            let address = chunk_offset(start, done)?;
            self.lib().check(|| unsafe {
                peek(
                    dom,
                    address,
                    window.len(),
                    window.as_mut_ptr() as *mut c_void,
                    flags,
                )
            })?;
            Ok(())
        })
    }

    /// Memory statistics from the guest balloon driver, at most `max` of them.
    ///
    /// [`MemoryStatTag::COUNT`] covers every tag this crate decodes; newer
    /// libvirt may report more, which come back with an undecoded `kind()`.
    pub fn memory_stats(&self, max: usize) -> Result<Vec<MemoryStatistic>> {
        let dom = self.ptr()?;
        let get_stats = native!(self.lib(), virDomainMemoryStats);
        if max == 0 {
            return Ok(Vec::new());
        }
        if c_uint::try_from(max).is_err() {
            return Err(Error::InvalidArgument(format!("too many memory stats: {}", max)));
        }
        let mut stats = vec![VirDomainMemoryStat::default(); max];
        let count = self.lib().invoke(
            || unsafe { get_stats(dom, stats.as_mut_ptr(), stats.len() as c_uint, 0) },
            to_len,
        )?;
        stats.truncate(count);
        Ok(stats.iter().map(MemoryStatistic::from).collect())
    }

    /// Progress of the block job on `disk`, `None` if there is none.
    pub fn block_job_info(&self, disk: &str) -> Result<Option<BlockJobInfo>> {
        let dom = self.ptr()?;
        let get_info = native!(self.lib(), virDomainGetBlockJobInfo);
        let disk = to_cstring(disk)?;
        let mut info = VirDomainBlockJobInfo::default();
        let found = self
            .lib()
            .check(|| unsafe { get_info(dom, disk.as_ptr(), &mut info, 0) })?;
        Ok((found > 0).then(|| BlockJobInfo::from(&info)))
    }

    pub fn block_job_abort(&self, disk: &str, flags: BlockJobAbortFlags) -> Result<()> {
        let dom = self.ptr()?;
        let abort = native!(self.lib(), virDomainBlockJobAbort);
        let disk = to_cstring(disk)?;
        self.lib()
            .check(|| unsafe { abort(dom, disk.as_ptr(), flags.bits()) })?;
        Ok(())
    }

    /// Limit the block job on `disk` to `bandwidth` MiB/s.
    pub fn block_job_set_speed(&self, disk: &str, bandwidth: u64) -> Result<()> {
        let dom = self.ptr()?;
        let set_speed = native!(self.lib(), virDomainBlockJobSetSpeed);
        let disk = to_cstring(disk)?;
        self.lib().check(|| unsafe {
            set_speed(dom, disk.as_ptr(), bandwidth as c_ulong, 0)
        })?;
        Ok(())
    }

    // Migration

    /// Migrate the domain to the host `dest` is connected to.
    ///
    /// Returns a handle on the destination connection.
    pub fn migrate(&self, dest: &Connect, options: &MigrateOptions) -> Result<Domain> {
        let dom = self.ptr()?;
        let dconn = dest.ptr()?;
        let dname = opt_cstring(options.dname.as_deref())?;
        let uri = opt_cstring(options.uri.as_deref())?;
        let flags = options.flags.bits() as c_ulong;
        let bandwidth = options.bandwidth as c_ulong;

        tracing::debug!(
            connection = self.context.id,
            destination = dest.context.id,
            flags = options.flags.bits(),
            "migrating domain"
        );

        // SAFETY: a successful migration hands over a reference on the
        // destination connection.
        let wrap = |ptr| unsafe { Domain::from_owned(dest.context.clone(), ptr) };
        match options.dxml.as_deref() {
            Some(dxml) => {
                let migrate = native!(self.lib(), virDomainMigrate2);
                let dxml = to_cstring(dxml)?;
                self.lib().invoke(
                    || unsafe {
                        migrate(
                            dom,
                            dconn,
                            dxml.as_ptr(),
                            flags,
                            opt_ptr(&dname),
                            opt_ptr(&uri),
                            bandwidth,
                        )
                    },
                    wrap,
                )
            }
            None => {
                let migrate = native!(self.lib(), virDomainMigrate);
                let (dname_ptr, uri_ptr) = (opt_ptr(&dname), opt_ptr(&uri));
                self.lib().invoke(
                    || unsafe { migrate(dom, dconn, flags, dname_ptr, uri_ptr, bandwidth) },
                    wrap,
                )
            }
        }
    }

    /// Migrate to the libvirtd at `duri` (peer-to-peer or tunnelled).
    ///
    /// `options.dxml` and `options.uri` are ignored; use
    /// [`Domain::migrate_to_uri2`] for those.
    pub fn migrate_to_uri(&self, duri: &str, options: &MigrateOptions) -> Result<()> {
        let dom = self.ptr()?;
        let migrate = native!(self.lib(), virDomainMigrateToURI);
        let duri = to_cstring(duri)?;
        let dname = opt_cstring(options.dname.as_deref())?;
        self.lib().check(|| unsafe {
            migrate(
                dom,
                duri.as_ptr(),
                options.flags.bits() as c_ulong,
                opt_ptr(&dname),
                options.bandwidth as c_ulong,
            )
        })?;
        Ok(())
    }

    /// Migrate with separate control (`dconnuri`) and data (`options.uri`)
    /// URIs.
    pub fn migrate_to_uri2(&self, dconnuri: Option<&str>, options: &MigrateOptions) -> Result<()> {
        let dom = self.ptr()?;
        let migrate = native!(self.lib(), virDomainMigrateToURI2);
        let dconnuri = opt_cstring(dconnuri)?;
        let miguri = opt_cstring(options.uri.as_deref())?;
        let dxml = opt_cstring(options.dxml.as_deref())?;
        let dname = opt_cstring(options.dname.as_deref())?;
        self.lib().check(|| unsafe {
            migrate(
                dom,
                opt_ptr(&dconnuri),
                opt_ptr(&miguri),
                opt_ptr(&dxml),
                options.flags.bits() as c_ulong,
                opt_ptr(&dname),
                options.bandwidth as c_ulong,
            )
        })?;
        Ok(())
    }

    /// Set the tolerable downtime of a live migration, in milliseconds.
    pub fn migrate_set_max_downtime(&self, downtime_ms: u64) -> Result<()> {
        let dom = self.ptr()?;
        let set_downtime = native!(self.lib(), virDomainMigrateSetMaxDowntime);
        self.lib().check(|| unsafe { set_downtime(dom, downtime_ms, 0) })?;
        Ok(())
    }

    /// Set the migration bandwidth limit in MiB/s.
    pub fn migrate_set_max_speed(&self, bandwidth: u64) -> Result<()> {
        let dom = self.ptr()?;
        let set_speed = native!(self.lib(), virDomainMigrateSetMaxSpeed);
        self.lib()
            .check(|| unsafe { set_speed(dom, bandwidth as c_ulong, 0) })?;
        Ok(())
    }
}

fn chunk_offset(base: u64, done: usize) -> Result<u64> {
    base.checked_add(done as u64)
        .ok_or_else(|| Error::InvalidArgument(format!("offset overflows: {} + {}", base, done)))
}

impl std::fmt::Debug for Domain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Domain")
            .field("connection", &self.context.id)
            .field("released", &self.handle.is_released())
            .finish()
    }
}
