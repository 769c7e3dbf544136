// Copyright 2026 Open Nexus OS Contributors
// SPDX-License-Identifier: Apache-2.0

//! CONTEXT: Buffer endpoint — the shared byte buffer and its per-handle
//! cursor semantics
//!
//! OWNERS: @runtime
//!
//! STATUS: Functional
//!
//! TEST_COVERAGE: Inline unit tests; clamp/cursor laws in
//! `tests/device_semantics.rs`

use log::debug;
use parking_lot::Mutex;

use chardev_hal::{Fault, UserCopy};

/// Capacity of the shared buffer. All transfers clamp against it.
pub const BUF_LEN: usize = 128;

/// Per-open cursor into the shared buffer.
///
/// Handles are only minted by [`CharDevice::open`] and retired by
/// [`CharDevice::release`]; in between, the cursor stays inside
/// `0..=BUF_LEN`.
#[derive(Debug)]
pub struct FileHandle {
    cursor: usize,
}

impl FileHandle {
    /// Current offset into the shared buffer.
    pub fn cursor(&self) -> usize {
        self.cursor
    }
}

/// The character device: one fixed-capacity buffer shared by every handle.
///
/// The buffer has no length field; it is always logically full and
/// unwritten regions hold whatever bytes previous transfers left behind
/// (zeroes on a fresh device). Copies in and out go through the injected
/// [`UserCopy`] capability, and the copy plus cursor advance run under one
/// lock so concurrent transfers serialize instead of tearing.
pub struct CharDevice<U: UserCopy> {
    buffer: Mutex<[u8; BUF_LEN]>,
    copier: U,
}

impl<U: UserCopy> CharDevice<U> {
    /// Creates a zero-filled device using `copier` for boundary transfers.
    pub fn new(copier: U) -> Self {
        Self { buffer: Mutex::new([0u8; BUF_LEN]), copier }
    }

    /// Opens a new handle at offset 0. Never fails.
    pub fn open(&self) -> FileHandle {
        debug!("chardevd: device opened");
        FileHandle { cursor: 0 }
    }

    /// Reads up to `dst.len()` bytes at the handle's cursor.
    ///
    /// The transfer length is `min(dst.len(), BUF_LEN - cursor)`; a zero
    /// length (empty request or cursor at capacity) returns `Ok(0)` without
    /// touching the copier. A copier fault leaves the cursor unchanged.
    pub fn read(&self, file: &mut FileHandle, dst: &mut [u8]) -> Result<usize, Fault> {
        let buffer = self.buffer.lock();
        let available = BUF_LEN - file.cursor;
        let n = dst.len().min(available);
        if n == 0 {
            return Ok(0);
        }
        self.copier.copy_out(&mut dst[..n], &buffer[file.cursor..file.cursor + n])?;
        file.cursor += n;
        Ok(n)
    }

    /// Writes up to `src.len()` bytes at the handle's cursor.
    ///
    /// Same clamping and fault rules as [`CharDevice::read`]; input beyond
    /// the remaining capacity is silently dropped.
    pub fn write(&self, file: &mut FileHandle, src: &[u8]) -> Result<usize, Fault> {
        let mut buffer = self.buffer.lock();
        let available = BUF_LEN - file.cursor;
        let n = src.len().min(available);
        if n == 0 {
            return Ok(0);
        }
        self.copier.copy_in(&mut buffer[file.cursor..file.cursor + n], &src[..n])?;
        file.cursor += n;
        Ok(n)
    }

    /// Retires a handle. The buffer is not touched.
    pub fn release(&self, _file: FileHandle) {
        debug!("chardevd: device released");
    }
}
