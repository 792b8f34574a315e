//! Domain event callbacks.
//!
//! Handlers are registered on a [`Connect`] and run on whichever thread
//! drives libvirt's event loop (see [`run_default_impl_once`]). Each call
//! receives its own [`Domain`] handle, which it may keep.

use std::os::raw::{c_char, c_int, c_void};
use std::panic::{self, AssertUnwindSafe};
use std::ptr;
use std::sync::Mutex;

use num_derive::FromPrimitive;
use num_traits::FromPrimitive;

use crate::connect::{Connect, ConnectionContext};
use crate::domain::Domain;
use crate::error::{Error, Result};
use crate::ffi::call::{borrowed_string, native};
use crate::ffi::library::Library;
use crate::ffi::raw::*;

/// Kind of domain event to subscribe to (`virDomainEventID`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    Lifecycle,
    Reboot,
    IoError,
    PmWakeup,
    PmSuspend,
}

impl From<EventKind> for i32 {
    fn from(kind: EventKind) -> i32 {
        match kind {
            EventKind::Lifecycle => VIR_DOMAIN_EVENT_ID_LIFECYCLE,
            EventKind::Reboot => VIR_DOMAIN_EVENT_ID_REBOOT,
            EventKind::IoError => VIR_DOMAIN_EVENT_ID_IO_ERROR,
            EventKind::PmWakeup => VIR_DOMAIN_EVENT_ID_PMWAKEUP,
            EventKind::PmSuspend => VIR_DOMAIN_EVENT_ID_PMSUSPEND,
        }
    }
}

/// Lifecycle transition (`virDomainEventType`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, FromPrimitive)]
pub enum LifecycleEvent {
    Defined = 0,
    Undefined = 1,
    Started = 2,
    Suspended = 3,
    Resumed = 4,
    Stopped = 5,
    Shutdown = 6,
    PmSuspended = 7,
    Crashed = 8,
}

/// What the hypervisor did about an I/O error (`virDomainEventIOErrorAction`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, FromPrimitive)]
pub enum IoErrorAction {
    None = 0,
    Pause = 1,
    Report = 2,
}

/// A decoded domain event.
///
/// Enum values this crate does not know decode to `None`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DomainEvent {
    Lifecycle {
        event: Option<LifecycleEvent>,
        /// Event-specific detail code.
        detail: i32,
    },
    Reboot,
    IoError {
        src_path: String,
        dev_alias: String,
        action: Option<IoErrorAction>,
    },
    PmWakeup {
        reason: i32,
    },
    PmSuspend {
        reason: i32,
    },
}

type Handler = Box<dyn FnMut(Domain, DomainEvent) + Send>;

/// State behind the opaque pointer handed to libvirt.
struct CallbackContext {
    context: ConnectionContext,
    kind: EventKind,
    handler: Mutex<Handler>,
}

impl CallbackContext {
    /// # Safety
    ///
    /// `dom` must be null or live for the duration of the call.
    unsafe fn deliver(&self, dom: VirDomainPtr, event: DomainEvent) {
        let domain = match Domain::from_borrowed(self.context.clone(), dom) {
            Ok(domain) => domain,
            Err(err) => {
                tracing::warn!(kind = ?self.kind, error = %err, "dropping domain event");
                return;
            }
        };
        // A handler that panicked earlier poisons the lock; keep delivering.
        let mut handler = self
            .handler
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        (*handler)(domain, event);
    }
}

/// Run a handler without letting a panic unwind into libvirt.
unsafe fn dispatch(opaque: *mut c_void, dom: VirDomainPtr, event: DomainEvent) {
    if opaque.is_null() {
        return;
    }
    let callback = &*(opaque as *const CallbackContext);
    let result = panic::catch_unwind(AssertUnwindSafe(|| callback.deliver(dom, event)));
    if result.is_err() {
        tracing::warn!(
            kind = ?callback.kind,
            connection = callback.context.id,
            "domain event handler panicked"
        );
    }
}

unsafe fn opt_string(ptr: *const c_char) -> String {
    if ptr.is_null() {
        String::new()
    } else {
        borrowed_string(ptr)
    }
}

unsafe extern "C" fn lifecycle_trampoline(
    _conn: VirConnectPtr,
    dom: VirDomainPtr,
    event: c_int,
    detail: c_int,
    opaque: *mut c_void,
) -> c_int {
    let event = DomainEvent::Lifecycle {
        event: LifecycleEvent::from_i32(event),
        detail,
    };
    dispatch(opaque, dom, event);
    0
}

unsafe extern "C" fn reboot_trampoline(
    _conn: VirConnectPtr,
    dom: VirDomainPtr,
    opaque: *mut c_void,
) {
    dispatch(opaque, dom, DomainEvent::Reboot);
}

unsafe extern "C" fn io_error_trampoline(
    _conn: VirConnectPtr,
    dom: VirDomainPtr,
    src_path: *const c_char,
    dev_alias: *const c_char,
    action: c_int,
    opaque: *mut c_void,
) {
    let event = DomainEvent::IoError {
        src_path: opt_string(src_path),
        dev_alias: opt_string(dev_alias),
        action: IoErrorAction::from_i32(action),
    };
    dispatch(opaque, dom, event);
}

unsafe extern "C" fn pm_wakeup_trampoline(
    _conn: VirConnectPtr,
    dom: VirDomainPtr,
    reason: c_int,
    opaque: *mut c_void,
) {
    dispatch(opaque, dom, DomainEvent::PmWakeup { reason });
}

unsafe extern "C" fn pm_suspend_trampoline(
    _conn: VirConnectPtr,
    dom: VirDomainPtr,
    reason: c_int,
    opaque: *mut c_void,
) {
    dispatch(opaque, dom, DomainEvent::PmSuspend { reason });
}

/// Called by libvirt when a registration goes away.
unsafe extern "C" fn free_callback(opaque: *mut c_void) {
    if !opaque.is_null() {
        drop(Box::from_raw(opaque as *mut CallbackContext));
    }
}

type GenericCallback = unsafe extern "C" fn(VirConnectPtr, VirDomainPtr, *mut c_void);

/// Trampoline for `kind`, cast to the generic type libvirt registers.
fn trampoline(kind: EventKind) -> VirConnectDomainEventGenericCallback {
    // SAFETY: libvirt calls the callback with the signature matching the
    // event id it was registered for.
    unsafe {
        let callback: GenericCallback = match kind {
            EventKind::Lifecycle => {
                let f: VirConnectDomainEventLifecycleCallback = lifecycle_trampoline;
                std::mem::transmute(f)
            }
            EventKind::Reboot => reboot_trampoline,
            EventKind::IoError => {
                let f: VirConnectDomainEventIoErrorCallback = io_error_trampoline;
                std::mem::transmute(f)
            }
            EventKind::PmWakeup => {
                let f: VirConnectDomainEventPmCallback = pm_wakeup_trampoline;
                std::mem::transmute(f)
            }
            EventKind::PmSuspend => {
                let f: VirConnectDomainEventPmCallback = pm_suspend_trampoline;
                std::mem::transmute(f)
            }
        };
        Some(callback)
    }
}

impl Connect {
    /// Register `handler` for events of `kind`, on `domain` or on every
    /// domain of this connection.
    ///
    /// Returns the callback id for [`Connect::deregister_domain_event`].
    /// The handler is dropped when the registration is removed or the
    /// connection goes away.
    pub fn register_domain_event<F>(
        &self,
        domain: Option<&Domain>,
        kind: EventKind,
        handler: F,
    ) -> Result<i32>
    where
        F: FnMut(Domain, DomainEvent) + Send + 'static,
    {
        let conn = self.ptr()?;
        let dom = match domain {
            Some(domain) if domain.context.id != self.context.id => {
                return Err(Error::InvalidArgument(
                    "domain belongs to a different connection".to_string(),
                ));
            }
            Some(domain) => domain.ptr()?,
            None => ptr::null_mut(),
        };
        let register = native!(self.context.library, virConnectDomainEventRegisterAny);

        let callback = Box::new(CallbackContext {
            context: self.context.clone(),
            kind,
            handler: Mutex::new(Box::new(handler)),
        });
        let opaque = Box::into_raw(callback) as *mut c_void;

        let registered = self.context.library.check(|| unsafe {
            register(
                conn,
                dom,
                i32::from(kind),
                trampoline(kind),
                opaque,
                Some(free_callback),
            )
        });
        match registered {
            Ok(id) => {
                tracing::debug!(
                    connection = self.context.id,
                    kind = ?kind,
                    callback_id = id,
                    "registered domain event handler"
                );
                Ok(id)
            }
            Err(err) => {
                // SAFETY: libvirt did not take ownership of the context.
                unsafe { free_callback(opaque) };
                Err(err)
            }
        }
    }

    /// Remove a registration made with [`Connect::register_domain_event`].
    pub fn deregister_domain_event(&self, callback_id: i32) -> Result<()> {
        let conn = self.ptr()?;
        let deregister = native!(self.context.library, virConnectDomainEventDeregisterAny);
        self.context
            .library
            .check(|| unsafe { deregister(conn, callback_id) })?;
        tracing::debug!(
            connection = self.context.id,
            callback_id,
            "deregistered domain event handler"
        );
        Ok(())
    }
}

/// Install libvirt's default event loop. Call once, before opening
/// connections that register events.
pub fn register_default_impl(library: &Library) -> Result<()> {
    let register = native!(library, virEventRegisterDefaultImpl);
    library.check(|| unsafe { register() })?;
    Ok(())
}

/// Run one iteration of the default event loop, dispatching any pending
/// events on the calling thread.
pub fn run_default_impl_once(library: &Library) -> Result<()> {
    let run = native!(library, virEventRunDefaultImpl);
    library.check(|| unsafe { run() })?;
    Ok(())
}
