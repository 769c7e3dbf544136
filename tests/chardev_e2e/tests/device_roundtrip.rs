// Copyright 2026 Open Nexus OS Contributors
// SPDX-License-Identifier: Apache-2.0

//! CONTEXT: chardevd end-to-end tests
//! INTENT: Full stack over a loopback transport — register, open, write,
//! read, release, unregister
//! DEPS: chardevd, devhost, chardev-hal
//! TESTS: Wire roundtrip, clamping at the wire, EOF convention, handle
//! retirement, clean unregistration

use std::sync::Arc;
use std::thread;

use chardev_hal::DirectCopy;
use chardevd::protocol::{
    encode_open_request, encode_read_request, encode_release_request, encode_write_request,
    parse_open_response, parse_read_response, parse_release_response, parse_write_response,
    STATUS_BAD_HANDLE, STATUS_OK,
};
use chardevd::{loopback_transport, run_with_transport, BUF_LEN};
use devhost::{DevTable, DeviceHost, DeviceId, Endpoint, FIRST_DYNAMIC_MAJOR};

fn first_device() -> DeviceId {
    DeviceId::new(FIRST_DYNAMIC_MAJOR, 0)
}

#[test]
fn device_wire_roundtrip() {
    let table = Arc::new(DevTable::new());
    let (client, mut server) = loopback_transport();
    let host = table.clone();
    let server_thread = thread::spawn(move || {
        run_with_transport(&mut server, host, DirectCopy).unwrap();
    });

    let rsp = client.call(&encode_open_request()).expect("open call");
    let (status, writer) = parse_open_response(&rsp).expect("open response");
    assert_eq!(status, STATUS_OK);

    // The first response proves registration completed; the number and
    // binding must be visible in the host table.
    assert!(table.is_allocated(first_device()));
    assert_eq!(table.binding(first_device()), Some(Endpoint::from("chardev")));

    let rsp = client.call(&encode_write_request(writer, &[1, 2, 3])).expect("write call");
    assert_eq!(parse_write_response(&rsp), Some((STATUS_OK, 3)));

    // A fresh handle starts at offset 0 and sees the written bytes.
    let rsp = client.call(&encode_open_request()).expect("second open call");
    let (_, reader) = parse_open_response(&rsp).expect("second open response");
    let rsp = client.call(&encode_read_request(reader, 3)).expect("read call");
    let (status, payload) = parse_read_response(&rsp).expect("read response");
    assert_eq!(status, STATUS_OK);
    assert_eq!(payload, [1, 2, 3]);

    // Oversized requests clamp to the remaining capacity.
    let rsp = client.call(&encode_read_request(reader, 200)).expect("clamped read call");
    let (status, payload) = parse_read_response(&rsp).expect("clamped read response");
    assert_eq!(status, STATUS_OK);
    assert_eq!(payload.len(), BUF_LEN - 3);

    // At capacity the device answers with an empty transfer, not an error.
    let rsp = client.call(&encode_read_request(reader, 16)).expect("eof read call");
    let (status, payload) = parse_read_response(&rsp).expect("eof read response");
    assert_eq!(status, STATUS_OK);
    assert!(payload.is_empty());

    // Released handles stop resolving.
    let rsp = client.call(&encode_release_request(reader)).expect("release call");
    assert_eq!(parse_release_response(&rsp), Some(STATUS_OK));
    let rsp = client.call(&encode_read_request(reader, 1)).expect("post-release read call");
    assert_eq!(parse_read_response(&rsp).map(|(status, _)| status), Some(STATUS_BAD_HANDLE));

    // Dropping the client disconnects the transport; the server unregisters
    // on its way out.
    drop(client);
    server_thread.join().expect("chardevd exits cleanly");
    assert!(!table.is_allocated(first_device()));
    assert_eq!(table.reserved_count(), 0);
}

#[test]
fn oversized_write_is_clamped_at_the_wire() {
    let table = Arc::new(DevTable::new());
    let (client, mut server) = loopback_transport();
    let host = table.clone();
    let server_thread = thread::spawn(move || {
        run_with_transport(&mut server, host, DirectCopy).unwrap();
    });

    let rsp = client.call(&encode_open_request()).expect("open call");
    let (_, writer) = parse_open_response(&rsp).expect("open response");

    let rsp = client.call(&encode_write_request(writer, &[0xAB; 200])).expect("write call");
    assert_eq!(parse_write_response(&rsp), Some((STATUS_OK, BUF_LEN as u32)));

    let rsp = client.call(&encode_open_request()).expect("second open call");
    let (_, reader) = parse_open_response(&rsp).expect("second open response");
    let rsp = client.call(&encode_read_request(reader, BUF_LEN as u32)).expect("read call");
    let (status, payload) = parse_read_response(&rsp).expect("read response");
    assert_eq!(status, STATUS_OK);
    assert_eq!(payload, vec![0xAB; BUF_LEN]);

    drop(client);
    server_thread.join().expect("chardevd exits cleanly");
    assert_eq!(table.reserved_count(), 0);
}
