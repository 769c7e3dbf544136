// Copyright 2026 Open Nexus OS Contributors
// SPDX-License-Identifier: Apache-2.0

//! CONTEXT: chardevd daemon entry point
//! OWNERS: @runtime
//! STATUS: Functional
//! TEST_COVERAGE: See lib.rs

#![forbid(unsafe_code)]

fn main() {
    println!("chardevd: host mode - use library API for testing");
}
