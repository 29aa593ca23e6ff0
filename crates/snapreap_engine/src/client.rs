//! TCP client for the live namespace service.
//!
//! Speaks the service's length-framed binary protocol synchronously: one
//! request in flight at a time, guarded by a mutex. A transport failure drops
//! the socket; the next request reconnects and resumes the same session.

use crate::config::ServiceConfig;
use crate::error::{ServiceError, ServiceResult};
use crate::proto::{self, ConnectRequest, ConnectResponse, ReplyHeader};
use crate::service::NamespaceService;
use parking_lot::Mutex;
use snapreap_codec::{CodecError, RecordDecoder};
use std::io::{self, Write};
use std::net::{TcpStream, ToSocketAddrs};
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Port assumed when an address omits one.
pub const DEFAULT_PORT: u16 = 2181;

#[derive(Debug)]
struct ClientState {
    conn: Option<TcpStream>,
    session_id: i64,
    password: Vec<u8>,
    last_zxid: i64,
    next_xid: i32,
}

impl ClientState {
    /// Forgets the session so the next handshake asks for a new one.
    fn reset_session(&mut self) {
        self.conn = None;
        self.session_id = 0;
        self.password = vec![0; proto::PASSWORD_LEN];
        self.last_zxid = 0;
    }

    fn next_xid(&mut self) -> i32 {
        self.next_xid = self.next_xid.checked_add(1).unwrap_or(1);
        self.next_xid
    }
}

/// A session with the live namespace service.
#[derive(Debug)]
pub struct ZkClient {
    config: ServiceConfig,
    servers: Vec<String>,
    state: Mutex<ClientState>,
    closed: AtomicBool,
}

impl ZkClient {
    /// Connects and establishes a new session.
    ///
    /// Servers are tried in order. Whole rounds are retried per the
    /// configured retry policy until `connect_timeout` elapses.
    ///
    /// # Errors
    ///
    /// Returns `Connection` if no server accepted a session in time.
    pub fn connect(config: ServiceConfig) -> ServiceResult<Self> {
        let servers = parse_servers(&config.address);
        if servers.is_empty() {
            return Err(ServiceError::Connection(format!(
                "no servers in address {:?}",
                config.address
            )));
        }

        let client = Self {
            config,
            servers,
            state: Mutex::new(ClientState {
                conn: None,
                session_id: 0,
                password: vec![0; proto::PASSWORD_LEN],
                last_zxid: 0,
                next_xid: 0,
            }),
            closed: AtomicBool::new(false),
        };
        {
            let mut state = client.state.lock();
            client.establish(&mut state)?;
            info!(
                session_id = %format!("0x{:x}", state.session_id),
                "session established"
            );
        }
        Ok(client)
    }

    /// Session id assigned by the server.
    pub fn session_id(&self) -> i64 {
        self.state.lock().session_id
    }

    fn establish(&self, state: &mut ClientState) -> ServiceResult<()> {
        let deadline = Instant::now() + self.config.connect_timeout;
        let retry = &self.config.retry;
        let mut last_error = String::from("no attempt made");

        for attempt in 0..retry.max_attempts {
            if attempt > 0 {
                let delay = retry.delay_for_attempt(attempt);
                if Instant::now() + delay >= deadline {
                    break;
                }
                thread::sleep(delay);
            }
            for server in &self.servers {
                let remaining = deadline.saturating_duration_since(Instant::now());
                if remaining.is_zero() {
                    break;
                }
                let result = match self.handshake(server, remaining, state) {
                    Err(ServiceError::SessionExpired) if state.session_id != 0 => {
                        warn!(
                            server = %server,
                            session_id = %format!("0x{:x}", state.session_id),
                            "session expired, requesting a new one"
                        );
                        state.reset_session();
                        let remaining = deadline.saturating_duration_since(Instant::now());
                        self.handshake(server, remaining, state)
                    }
                    other => other,
                };
                match result {
                    Ok(stream) => {
                        state.conn = Some(stream);
                        return Ok(());
                    }
                    Err(e) => {
                        warn!(server = %server, attempt, error = %e, "connect attempt failed");
                        last_error = e.to_string();
                    }
                }
            }
        }
        Err(ServiceError::Connection(last_error))
    }

    fn handshake(
        &self,
        server: &str,
        timeout: Duration,
        state: &mut ClientState,
    ) -> ServiceResult<TcpStream> {
        let mut stream = open(server, timeout)?;
        let request_timeout = Some(self.config.request_timeout).filter(|t| !t.is_zero());
        stream.set_read_timeout(request_timeout).map_err(io_error)?;
        stream.set_write_timeout(request_timeout).map_err(io_error)?;

        let request = ConnectRequest {
            protocol_version: proto::PROTOCOL_VERSION,
            last_zxid_seen: state.last_zxid,
            timeout_ms: i32::try_from(self.config.session_timeout.as_millis()).unwrap_or(i32::MAX),
            session_id: state.session_id,
            password: state.password.clone(),
            read_only: false,
        };
        let body = request.encode().map_err(protocol_error)?;
        write_frame(&mut stream, &body)?;
        let reply = read_frame(&mut stream)?;
        let response = ConnectResponse::decode(&reply).map_err(protocol_error)?;

        if response.timeout_ms <= 0 {
            return Err(ServiceError::SessionExpired);
        }
        debug!(
            server,
            session_id = %format!("0x{:x}", response.session_id),
            timeout_ms = response.timeout_ms,
            "handshake complete"
        );
        state.session_id = response.session_id;
        state.password = response.password;
        Ok(stream)
    }

    /// Sends one request and waits for its reply header.
    fn round_trip(&self, state: &mut ClientState, xid: i32, body: &[u8]) -> ServiceResult<ReplyHeader> {
        if state.conn.is_none() {
            debug!("reconnecting");
            self.establish(state)?;
        }
        let Some(stream) = state.conn.as_mut() else {
            return Err(ServiceError::Closed);
        };

        let result = exchange(stream, xid, body);
        match &result {
            Ok(header) if header.zxid > state.last_zxid => state.last_zxid = header.zxid,
            Ok(_) => {}
            Err(_) => state.conn = None,
        }
        result
    }
}

impl NamespaceService for ZkClient {
    fn delete(&self, path: &str, expected_version: i32) -> ServiceResult<()> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(ServiceError::Closed);
        }
        let mut state = self.state.lock();
        let xid = state.next_xid();
        let body = proto::encode_delete(xid, path, expected_version).map_err(protocol_error)?;
        let header = self.round_trip(&mut state, xid, &body)?;

        match proto::error_for(header.err, path, expected_version) {
            None => Ok(()),
            Some(ServiceError::SessionExpired) => {
                warn!(
                    session_id = %format!("0x{:x}", state.session_id),
                    "session expired, the next request opens a new one"
                );
                state.reset_session();
                Err(ServiceError::SessionExpired)
            }
            Some(e) => Err(e),
        }
    }

    fn is_connected(&self) -> bool {
        !self.closed.load(Ordering::SeqCst) && self.state.lock().conn.is_some()
    }

    fn close(&self) -> ServiceResult<()> {
        if self.closed.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        let mut state = self.state.lock();
        if state.session_id == 0 {
            return Ok(());
        }
        if state.conn.is_none() {
            debug!("reconnecting to close session");
            if let Err(e) = self.establish(&mut state) {
                warn!(
                    session_id = %format!("0x{:x}", state.session_id),
                    error = %e,
                    "could not reconnect, session left to expire"
                );
                return Err(e);
            }
        }
        let Some(mut stream) = state.conn.take() else {
            return Ok(());
        };
        let xid = state.next_xid();
        let body = proto::encode_bare(xid, proto::op::CLOSE_SESSION);
        let result = exchange(&mut stream, xid, &body).map(|_| ());
        info!(
            session_id = %format!("0x{:x}", state.session_id),
            "session closed"
        );
        result
    }
}

fn exchange(stream: &mut TcpStream, xid: i32, body: &[u8]) -> ServiceResult<ReplyHeader> {
    write_frame(stream, body)?;
    loop {
        let reply = read_frame(stream)?;
        let header = ReplyHeader::decode(&reply).map_err(protocol_error)?;
        match header.xid {
            proto::xid::NOTIFICATION | proto::xid::PING => continue,
            got if got == xid => return Ok(header),
            got => {
                return Err(ServiceError::Protocol(format!(
                    "reply xid {got} does not match request xid {xid}"
                )))
            }
        }
    }
}

fn open(server: &str, timeout: Duration) -> ServiceResult<TcpStream> {
    let addrs = server
        .to_socket_addrs()
        .map_err(|e| ServiceError::Connection(format!("{server}: {e}")))?;

    let mut last_error = None;
    for addr in addrs {
        match TcpStream::connect_timeout(&addr, timeout) {
            Ok(stream) => {
                stream.set_nodelay(true).map_err(io_error)?;
                return Ok(stream);
            }
            Err(e) => last_error = Some(e),
        }
    }
    Err(ServiceError::Connection(match last_error {
        Some(e) => format!("{server}: {e}"),
        None => format!("{server}: no addresses resolved"),
    }))
}

fn write_frame(stream: &mut TcpStream, body: &[u8]) -> ServiceResult<()> {
    let framed = proto::frame(body).map_err(protocol_error)?;
    stream.write_all(&framed).map_err(io_error)?;
    stream.flush().map_err(io_error)
}

fn read_frame(stream: &mut TcpStream) -> ServiceResult<Vec<u8>> {
    let mut dec = RecordDecoder::new(stream).with_max_buffer_len(proto::MAX_FRAME_LEN);
    match dec.read_buffer() {
        Ok(Some(body)) => Ok(body),
        Ok(None) => Err(ServiceError::Protocol("absent reply frame".into())),
        Err(CodecError::Io(e)) => Err(io_error(e)),
        Err(e) if e.is_truncation() => Err(ServiceError::transport_retryable(
            "connection closed by server",
        )),
        Err(e) => Err(protocol_error(e)),
    }
}

fn io_error(e: io::Error) -> ServiceError {
    match e.kind() {
        io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut => ServiceError::Timeout,
        _ => ServiceError::transport_retryable(e.to_string()),
    }
}

fn protocol_error(e: CodecError) -> ServiceError {
    ServiceError::Protocol(e.to_string())
}

/// Splits a comma-separated server list, adding the default port where missing.
pub fn parse_servers(address: &str) -> Vec<String> {
    address
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| {
            if s.rsplit_once(':').is_some_and(|(_, port)| port.parse::<u16>().is_ok()) {
                s.to_string()
            } else {
                format!("{s}:{DEFAULT_PORT}")
            }
        })
        .collect()
}
