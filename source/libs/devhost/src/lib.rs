// Copyright 2026 Open Nexus OS Contributors
// SPDX-License-Identifier: Apache-2.0

//! Host-side device registration facility used by character-device services.
//!
//! The facility hands out device numbers (major/minor pairs) and records
//! which operation-table endpoint is bound to each number. Services talk to
//! it through the [`DeviceHost`] trait so test harnesses can stand in a
//! hostile host and exercise failure paths the in-memory table never takes.

#![forbid(unsafe_code)]
#![deny(clippy::all, missing_docs)]

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;

/// Result alias for registration-facility operations.
pub type Result<T> = core::result::Result<T, Error>;

/// Errors produced by the registration facility.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum Error {
    /// Every device number in the dynamic range is reserved.
    #[error("no device numbers available")]
    Exhausted,
    /// The device number was never reserved (or has been released).
    #[error("device number not reserved")]
    NotReserved,
    /// The device number already carries an operation-table binding.
    #[error("device number already bound")]
    AlreadyBound,
}

/// First major handed out by the dynamic allocator.
pub const FIRST_DYNAMIC_MAJOR: u32 = 240;

/// Addressable device identity: a major/minor pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DeviceId {
    major: u32,
    minor: u32,
}

impl DeviceId {
    /// Builds an identity from its raw parts.
    pub fn new(major: u32, minor: u32) -> Self {
        Self { major, minor }
    }

    /// Major component of the identity.
    pub fn major(self) -> u32 {
        self.major
    }

    /// Minor component of the identity.
    pub fn minor(self) -> u32 {
        self.minor
    }
}

impl fmt::Display for DeviceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.major, self.minor)
    }
}

/// Operation-table descriptor bound to a device number.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    label: String,
}

impl Endpoint {
    /// Creates an endpoint descriptor from the provided label.
    pub fn new(label: impl Into<String>) -> Self {
        Self { label: label.into() }
    }

    /// Returns the raw endpoint label.
    pub fn as_str(&self) -> &str {
        &self.label
    }
}

impl From<&str> for Endpoint {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.label)
    }
}

/// Host registration facility as seen by a device service.
pub trait DeviceHost {
    /// Reserves one device number for `name`.
    fn reserve(&self, name: &str) -> Result<DeviceId>;

    /// Binds `endpoint` as the operation table for `id`.
    fn bind(&self, id: DeviceId, endpoint: Endpoint) -> Result<()>;

    /// Removes the operation-table binding for `id`, if any.
    fn unbind(&self, id: DeviceId);

    /// Returns the reserved device number `id` to the allocator.
    fn release(&self, id: DeviceId);

    /// Reports whether `id` is currently reserved.
    fn is_allocated(&self, id: DeviceId) -> bool;
}

impl<T: DeviceHost + ?Sized> DeviceHost for &T {
    fn reserve(&self, name: &str) -> Result<DeviceId> {
        (**self).reserve(name)
    }

    fn bind(&self, id: DeviceId, endpoint: Endpoint) -> Result<()> {
        (**self).bind(id, endpoint)
    }

    fn unbind(&self, id: DeviceId) {
        (**self).unbind(id)
    }

    fn release(&self, id: DeviceId) {
        (**self).release(id)
    }

    fn is_allocated(&self, id: DeviceId) -> bool {
        (**self).is_allocated(id)
    }
}

impl<T: DeviceHost + ?Sized> DeviceHost for Arc<T> {
    fn reserve(&self, name: &str) -> Result<DeviceId> {
        (**self).reserve(name)
    }

    fn bind(&self, id: DeviceId, endpoint: Endpoint) -> Result<()> {
        (**self).bind(id, endpoint)
    }

    fn unbind(&self, id: DeviceId) {
        (**self).unbind(id)
    }

    fn release(&self, id: DeviceId) {
        (**self).release(id)
    }

    fn is_allocated(&self, id: DeviceId) -> bool {
        (**self).is_allocated(id)
    }
}

/// In-memory device-number table.
///
/// Majors are handed out from a bounded dynamic range starting at
/// [`FIRST_DYNAMIC_MAJOR`], so exhaustion is a reachable condition rather
/// than a theoretical one. Minor numbers are always zero; the facility
/// serves single-node devices.
pub struct DevTable {
    inner: Mutex<TableInner>,
}

struct TableInner {
    limit: usize,
    reserved: HashMap<DeviceId, Reservation>,
}

struct Reservation {
    name: String,
    endpoint: Option<Endpoint>,
}

/// Dynamic majors available from a freshly constructed [`DevTable`].
pub const DEFAULT_MAJOR_LIMIT: usize = 64;

impl Default for DevTable {
    fn default() -> Self {
        Self::with_limit(DEFAULT_MAJOR_LIMIT)
    }
}

impl DevTable {
    /// Creates a table with the default dynamic range.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a table with room for at most `limit` concurrent reservations.
    pub fn with_limit(limit: usize) -> Self {
        Self {
            inner: Mutex::new(TableInner { limit, reserved: HashMap::new() }),
        }
    }

    /// Returns the endpoint currently bound to `id`, if any.
    pub fn binding(&self, id: DeviceId) -> Option<Endpoint> {
        let inner = self.inner.lock();
        inner.reserved.get(&id).and_then(|r| r.endpoint.clone())
    }

    /// Returns the name a reservation was made under, if `id` is reserved.
    pub fn reserved_name(&self, id: DeviceId) -> Option<String> {
        let inner = self.inner.lock();
        inner.reserved.get(&id).map(|r| r.name.clone())
    }

    /// Number of device numbers currently reserved.
    pub fn reserved_count(&self) -> usize {
        self.inner.lock().reserved.len()
    }
}

impl DeviceHost for DevTable {
    fn reserve(&self, name: &str) -> Result<DeviceId> {
        let mut inner = self.inner.lock();
        if inner.reserved.len() >= inner.limit {
            return Err(Error::Exhausted);
        }
        let limit = inner.limit as u32;
        let id = (0..limit)
            .map(|offset| DeviceId::new(FIRST_DYNAMIC_MAJOR + offset, 0))
            .find(|candidate| !inner.reserved.contains_key(candidate))
            .ok_or(Error::Exhausted)?;
        inner
            .reserved
            .insert(id, Reservation { name: name.to_string(), endpoint: None });
        Ok(id)
    }

    fn bind(&self, id: DeviceId, endpoint: Endpoint) -> Result<()> {
        let mut inner = self.inner.lock();
        let reservation = inner.reserved.get_mut(&id).ok_or(Error::NotReserved)?;
        if reservation.endpoint.is_some() {
            return Err(Error::AlreadyBound);
        }
        reservation.endpoint = Some(endpoint);
        Ok(())
    }

    fn unbind(&self, id: DeviceId) {
        let mut inner = self.inner.lock();
        if let Some(reservation) = inner.reserved.get_mut(&id) {
            reservation.endpoint = None;
        }
    }

    fn release(&self, id: DeviceId) {
        let mut inner = self.inner.lock();
        inner.reserved.remove(&id);
    }

    fn is_allocated(&self, id: DeviceId) -> bool {
        self.inner.lock().reserved.contains_key(&id)
    }
}
