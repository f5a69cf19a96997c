// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! TCP transport.
//!
//! Opens a raw or TLS socket to the single configured endpoint and writes
//! the buffer straight to the stream. When a token is configured the
//! session starts with the challenge-response handshake:
//!
//! ```text
//! Client                                Server
//!    |------- key_id \n ------------------>|
//!    |<------ challenge bytes \n ----------|
//!    | (sign challenge with private key)   |
//!    |------- base64(DER signature) \n --->|
//!    |                                     | (verify, accept writes)
//! ```
//!
//! TCP has no retries and no transactions; an I/O failure is fatal to the
//! call and the connection.

use std::io::{self, BufRead, BufReader, Read, Write};
use std::net::{TcpStream, ToSocketAddrs};

use base64::engine::general_purpose::{STANDARD as BASE64_STANDARD, URL_SAFE_NO_PAD};
use base64::Engine;
use rustls::pki_types::ServerName;
use rustls::{ClientConnection, StreamOwned};

use crate::buffer::LineBuffer;
use crate::conf::{Endpoint, SenderOptions};
use crate::error::{Error, Result};
use crate::signing;
use crate::tls::configure_tls;

enum Connection {
    Direct(TcpStream),
    Tls(Box<StreamOwned<ClientConnection, TcpStream>>),
}

impl Read for Connection {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self {
            Connection::Direct(stream) => stream.read(buf),
            Connection::Tls(stream) => stream.read(buf),
        }
    }
}

impl Write for Connection {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self {
            Connection::Direct(stream) => stream.write(buf),
            Connection::Tls(stream) => stream.write(buf),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self {
            Connection::Direct(stream) => stream.flush(),
            Connection::Tls(stream) => stream.flush(),
        }
    }
}

pub(crate) struct TcpTransport {
    conn: Connection,
    peer: Endpoint,
    authenticated: bool,
}

impl TcpTransport {
    /// Open the socket, complete TLS if configured, and authenticate when a
    /// token is present.
    pub(crate) fn connect(options: &SenderOptions) -> Result<Self> {
        let peer = options.endpoints[0].clone();
        let addr = (peer.host.as_str(), peer.port)
            .to_socket_addrs()
            .map_err(|err| Error::CouldNotResolveAddr(format!("{peer}: {err}")))?
            .next()
            .ok_or_else(|| {
                Error::CouldNotResolveAddr(format!("{peer}: no addresses returned"))
            })?;
        let stream = TcpStream::connect(addr)
            .map_err(|err| Error::SocketError(format!("cannot connect to {peer}: {err}")))?;
        stream
            .set_nodelay(true)
            .map_err(|err| Error::SocketError(format!("could not set TCP_NODELAY: {err}")))?;
        // The handshake and authentication both read from the server; a
        // read timeout keeps a mismatched server from hanging the client.
        stream
            .set_read_timeout(Some(options.auth_timeout))
            .map_err(|err| {
                Error::SocketError(format!("could not set read timeout: {err}"))
            })?;

        let conn = match configure_tls(options)? {
            Some(tls_config) => {
                let server_name = ServerName::try_from(peer.host.clone())
                    .map_err(|err| Error::TlsError(format!("bad host {:?}: {err}", peer.host)))?;
                let tls_conn =
                    ClientConnection::new(tls_config, server_name).map_err(|err| {
                        Error::TlsError(format!("could not create TLS client: {err}"))
                    })?;
                let mut stream = StreamOwned::new(tls_conn, stream);
                complete_tls_handshake(&mut stream, options)?;
                if stream.conn.negotiated_cipher_suite().is_none() {
                    return Err(Error::TlsError(
                        "connection did not negotiate an encrypted session".to_string(),
                    ));
                }
                Connection::Tls(Box::new(stream))
            }
            None => Connection::Direct(stream),
        };

        let mut transport = TcpTransport {
            conn,
            peer,
            authenticated: false,
        };
        if let Some(token) = &options.token {
            let key_id = options.username.as_deref().ok_or_else(|| {
                Error::AuthError("TCP signing requires username (the key id)".to_string())
            })?;
            transport.authenticate(key_id, token, options.init_buf_size)?;
        }
        Ok(transport)
    }

    /// Run the challenge-response handshake. A second attempt on the same
    /// session is an error.
    fn authenticate(&mut self, key_id: &str, token: &str, challenge_cap: usize) -> Result<()> {
        if self.authenticated {
            return Err(Error::AuthError(
                "session is already authenticated".to_string(),
            ));
        }
        if key_id.contains('\n') {
            return Err(Error::AuthError(format!(
                "bad key id {key_id:?}: must not contain a newline"
            )));
        }

        self.conn
            .write_all(key_id.as_bytes())
            .and_then(|_| self.conn.write_all(b"\n"))
            .and_then(|_| self.conn.flush())
            .map_err(|err| Error::SocketError(format!("failed to send key id: {err}")))?;

        let challenge = self.read_challenge(challenge_cap)?;

        let private_key = URL_SAFE_NO_PAD
            .decode(token.trim_end_matches('='))
            .map_err(|err| Error::AuthError(format!("could not decode private key: {err}")))?;
        let signature = signing::sign_challenge(&private_key, &challenge)?;

        let mut line = BASE64_STANDARD.encode(signature);
        line.push('\n');
        self.conn
            .write_all(line.as_bytes())
            .and_then(|_| self.conn.flush())
            .map_err(|err| {
                Error::SocketError(format!("could not send signed challenge: {err}"))
            })?;

        self.authenticated = true;
        log::debug!("authenticated against {} as key id {key_id:?}", self.peer);
        Ok(())
    }

    /// Read the server challenge up to `\n`, bounded by the buffer size.
    fn read_challenge(&mut self, cap: usize) -> Result<Vec<u8>> {
        let mut reader = BufReader::new(Read::take(&mut self.conn, cap as u64));
        let mut challenge = Vec::new();
        reader.read_until(b'\n', &mut challenge).map_err(|err| {
            Error::SocketError(format!(
                "failed to read authentication challenge (timed out?): {err}"
            ))
        })?;
        if challenge.last() != Some(&b'\n') {
            return Err(Error::AuthError(if challenge.is_empty() {
                "did not receive an auth challenge; is the server configured to \
                 require authentication?"
                    .to_string()
            } else {
                format!(
                    "challenge did not terminate within {cap} bytes, or the \
                     connection closed mid-challenge"
                )
            }));
        }
        challenge.pop();
        Ok(challenge)
    }

    /// Stream the buffer to the socket. The caller clears the buffer after
    /// every outcome; a write failure here is fatal to the connection.
    pub(crate) fn send_buffer(&mut self, buffer: &LineBuffer) -> Result<()> {
        buffer
            .write_to(&mut self.conn)
            .and_then(|_| self.conn.flush())
            .map_err(|err| {
                Error::flush(format!(
                    "could not flush {} buffered rows to {}: {err}",
                    buffer.row_count(),
                    self.peer
                ))
            })
    }
}

/// Drive the rustls handshake to completion over the blocking socket.
fn complete_tls_handshake(
    stream: &mut StreamOwned<ClientConnection, TcpStream>,
    options: &SenderOptions,
) -> Result<()> {
    while stream.conn.is_handshaking() {
        stream.conn.complete_io(&mut stream.sock).map_err(|err| {
            if err.kind() == io::ErrorKind::TimedOut || err.kind() == io::ErrorKind::WouldBlock {
                Error::TlsError(format!(
                    "TLS handshake timed out waiting for the server after {:?}",
                    options.auth_timeout
                ))
            } else {
                Error::TlsError(format!("failed to complete TLS handshake: {err}"))
            }
        })?;
    }
    Ok(())
}
