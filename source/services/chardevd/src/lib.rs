// Copyright 2026 Open Nexus OS Contributors
// SPDX-License-Identifier: Apache-2.0

//! CONTEXT: Character-device daemon — one shared 128-byte buffer behind
//! open/read/write/release
//! OWNERS: @runtime
//! STATUS: Functional (host/std backend)
//! API_STABILITY: Stable (v1.0)
//! TEST_COVERAGE: Inline unit tests + tests/ + tests/chardev_e2e
//!
//! PUBLIC API: register()/Registration, CharDevice, FileHandle, protocol,
//!   run_with_transport(), loopback_transport()
//! DEPENDS_ON: chardev-hal (user copy capability), devhost (registration
//!   facility)
//!
//! INVARIANTS:
//!   - A handle cursor never leaves `0..=BUF_LEN`
//!   - Transfers never touch bytes past the buffer capacity
//!   - A failed user copy leaves cursor and buffer untouched
//!   - The shared buffer lives exactly as long as the registration

#![forbid(unsafe_code)]

pub mod device;
pub mod protocol;
pub mod registrar;
mod std_server;

pub use device::{CharDevice, FileHandle, BUF_LEN};
pub use registrar::{register, Registration, RegistrationError};
pub use std_server::{
    loopback_transport, run_with_transport, LoopbackClient, LoopbackServer, ServerError,
    Transport, TransportError,
};

/// Device-node name published at registration.
pub const DEVICE_NAME: &str = "chardev";
