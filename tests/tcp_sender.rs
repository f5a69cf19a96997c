// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! End-to-end TCP sender tests against an in-process socket server.

use std::io::{BufRead, BufReader, Read, Write};
use std::net::TcpListener;
use std::sync::mpsc;
use std::thread;

use base64::engine::general_purpose::{STANDARD as BASE64_STANDARD, URL_SAFE_NO_PAD};
use base64::Engine;
use p256::ecdsa::signature::Verifier;
use p256::ecdsa::{Signature, SigningKey, VerifyingKey};

use tswire::{Error, ProtocolVersion, Sender, TimestampNanos};

/// Fixed P-256 scalar for the handshake tests (any value below the group
/// order works).
const TEST_KEY: [u8; 32] = [7u8; 32];

fn test_token() -> String {
    URL_SAFE_NO_PAD.encode(TEST_KEY)
}

#[test]
fn test_plain_tcp_send_reaches_the_socket() {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();
    let (tx, rx) = mpsc::channel();

    thread::spawn(move || {
        let (mut stream, _) = listener.accept().unwrap();
        let mut received = Vec::new();
        stream.read_to_end(&mut received).unwrap();
        tx.send(received).unwrap();
    });

    let mut sender = Sender::from_conf(&format!(
        "tcp::addr=127.0.0.1:{port};auto_flush=off;"
    ))
    .unwrap();
    assert_eq!(sender.protocol_version(), ProtocolVersion::V1);

    sender
        .table("weather")
        .unwrap()
        .symbol("city", "London")
        .unwrap()
        .column_f64("temp", 25.0)
        .unwrap()
        .at(TimestampNanos::new(1_000_000_000))
        .unwrap();
    sender.send().unwrap();
    assert_eq!(sender.pending_rows(), 0);
    drop(sender);

    let received = rx.recv().unwrap();
    assert_eq!(received, b"weather,city=London temp=25.0 1000000000\n");
}

#[test]
fn test_tcp_auth_handshake_and_send() {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();
    let (tx, rx) = mpsc::channel();
    let challenge = b"ram%pVmV6as6L7hsEPhq6Yz0EVIB3BpK".to_vec();
    let server_challenge = challenge.clone();

    thread::spawn(move || {
        let (stream, _) = listener.accept().unwrap();
        let mut reader = BufReader::new(stream);

        let mut key_id = String::new();
        reader.read_line(&mut key_id).unwrap();
        assert_eq!(key_id, "testkey1\n");

        let mut stream = reader.get_ref().try_clone().unwrap();
        stream.write_all(&server_challenge).unwrap();
        stream.write_all(b"\n").unwrap();

        let mut signature_line = String::new();
        reader.read_line(&mut signature_line).unwrap();
        let der = BASE64_STANDARD
            .decode(signature_line.trim_end())
            .expect("signature line is base64");
        let signature = Signature::from_der(&der).expect("signature is DER");
        let signing = SigningKey::from_slice(&TEST_KEY).unwrap();
        VerifyingKey::from(&signing)
            .verify(&server_challenge, &signature)
            .expect("challenge signature verifies");

        let mut rows = Vec::new();
        reader.read_to_end(&mut rows).unwrap();
        tx.send(rows).unwrap();
    });

    let mut sender = Sender::from_conf(&format!(
        "tcp::addr=127.0.0.1:{port};username=testkey1;token={};auto_flush=off;",
        test_token()
    ))
    .unwrap();

    sender
        .table("trades")
        .unwrap()
        .symbol("pair", "BTC-USD")
        .unwrap()
        .column_f64("price", 42000.5)
        .unwrap()
        .at(TimestampNanos::new(2_000_000_000))
        .unwrap();
    sender.send().unwrap();
    drop(sender);

    let rows = rx.recv().unwrap();
    assert_eq!(rows, b"trades,pair=BTC-USD price=42000.5 2000000000\n");
}

#[test]
fn test_tcp_auth_fails_without_challenge() {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();

    thread::spawn(move || {
        let (stream, _) = listener.accept().unwrap();
        let mut reader = BufReader::new(stream);
        let mut key_id = String::new();
        reader.read_line(&mut key_id).unwrap();
        // Close without sending a challenge.
    });

    let err = Sender::from_conf(&format!(
        "tcp::addr=127.0.0.1:{port};username=testkey1;token={};auth_timeout=2000;",
        test_token()
    ))
    .unwrap_err();
    assert!(matches!(err, Error::AuthError(_)), "{err:?}");
}

#[test]
fn test_tcp_rejects_transactions() {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();

    thread::spawn(move || {
        let _conn = listener.accept().unwrap();
        thread::park();
    });

    let mut sender = Sender::from_conf(&format!(
        "tcp::addr=127.0.0.1:{port};auto_flush=off;"
    ))
    .unwrap();
    let err = sender.transaction("weather").unwrap_err();
    assert!(matches!(err, Error::InvalidApiCall(_)), "{err:?}");
}

#[test]
fn test_connection_refused_at_connect_time() {
    let port = {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        listener.local_addr().unwrap().port()
    };
    let err =
        Sender::from_conf(&format!("tcp::addr=127.0.0.1:{port};")).unwrap_err();
    assert!(matches!(err, Error::SocketError(_)), "{err:?}");
}
