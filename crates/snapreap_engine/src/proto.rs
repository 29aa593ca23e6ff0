//! Wire messages for the namespace service's binary protocol.
//!
//! Every message travels as `length:int32` followed by that many bytes.
//! Bodies use the same big-endian record encoding as snapshots.

use crate::error::ServiceError;
use snapreap_codec::{CodecResult, RecordDecoder, RecordEncoder};

/// Protocol version sent in the handshake.
pub const PROTOCOL_VERSION: i32 = 0;

/// Length of the session password.
pub const PASSWORD_LEN: usize = 16;

/// Largest frame accepted from the server.
pub const MAX_FRAME_LEN: u64 = 4 * 1024 * 1024;

/// Operation codes.
pub mod op {
    /// Delete a node.
    pub const DELETE: i32 = 2;
    /// End the session.
    pub const CLOSE_SESSION: i32 = -11;
}

/// Reserved transaction ids.
pub mod xid {
    /// Server-initiated notification.
    pub const NOTIFICATION: i32 = -1;
    /// Ping reply.
    pub const PING: i32 = -2;
}

/// Server error codes.
pub mod code {
    /// Success.
    pub const OK: i32 = 0;
    /// Connection to the ensemble was lost.
    pub const CONNECTION_LOSS: i32 = -4;
    /// The server timed the operation out.
    pub const OPERATION_TIMEOUT: i32 = -7;
    /// The node does not exist.
    pub const NO_NODE: i32 = -101;
    /// Not authorized.
    pub const NO_AUTH: i32 = -102;
    /// Version check failed.
    pub const BAD_VERSION: i32 = -103;
    /// The node has children.
    pub const NOT_EMPTY: i32 = -111;
    /// The session has expired.
    pub const SESSION_EXPIRED: i32 = -112;
}

/// Handshake sent when opening or resuming a session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectRequest {
    /// Protocol version.
    pub protocol_version: i32,
    /// Highest transaction id the client has seen.
    pub last_zxid_seen: i64,
    /// Requested session timeout in milliseconds.
    pub timeout_ms: i32,
    /// Session to resume, zero for a new one.
    pub session_id: i64,
    /// Password of the session to resume.
    pub password: Vec<u8>,
    /// Whether a read-only server is acceptable.
    pub read_only: bool,
}

impl ConnectRequest {
    /// Encodes the request body.
    pub fn encode(&self) -> CodecResult<Vec<u8>> {
        let mut enc = RecordEncoder::with_capacity(48);
        enc.write_i32(self.protocol_version)
            .write_i64(self.last_zxid_seen)
            .write_i32(self.timeout_ms)
            .write_i64(self.session_id)
            .write_buffer(Some(&self.password))?
            .write_bool(self.read_only);
        Ok(enc.into_bytes())
    }
}

/// Handshake reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectResponse {
    /// Protocol version chosen by the server.
    pub protocol_version: i32,
    /// Negotiated session timeout. Zero means the session is expired.
    pub timeout_ms: i32,
    /// Session id.
    pub session_id: i64,
    /// Session password.
    pub password: Vec<u8>,
    /// Whether the server is read-only.
    pub read_only: bool,
}

impl ConnectResponse {
    /// Decodes a reply body. Older servers omit the read-only flag.
    pub fn decode(body: &[u8]) -> CodecResult<Self> {
        let mut dec = RecordDecoder::new(body);
        let protocol_version = dec.read_i32()?;
        let timeout_ms = dec.read_i32()?;
        let session_id = dec.read_i64()?;
        let password = dec.read_buffer()?.unwrap_or_default();
        let read_only = match dec.read_bool() {
            Ok(flag) => flag,
            Err(e) if e.is_truncation() => false,
            Err(e) => return Err(e),
        };
        Ok(Self {
            protocol_version,
            timeout_ms,
            session_id,
            password,
            read_only,
        })
    }

    /// Encodes the reply body.
    pub fn encode(&self) -> CodecResult<Vec<u8>> {
        let mut enc = RecordEncoder::with_capacity(40);
        enc.write_i32(self.protocol_version)
            .write_i32(self.timeout_ms)
            .write_i64(self.session_id)
            .write_buffer(Some(&self.password))?
            .write_bool(self.read_only);
        Ok(enc.into_bytes())
    }
}

/// Header preceding every request after the handshake.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RequestHeader {
    /// Client-chosen transaction id, echoed in the reply.
    pub xid: i32,
    /// Operation code.
    pub op: i32,
}

impl RequestHeader {
    fn write(&self, enc: &mut RecordEncoder) {
        enc.write_i32(self.xid).write_i32(self.op);
    }

    /// Decodes a request header, returning it with the decoder positioned at the body.
    pub fn decode(body: &[u8]) -> CodecResult<(Self, RecordDecoder<&[u8]>)> {
        let mut dec = RecordDecoder::new(body);
        let xid = dec.read_i32()?;
        let op = dec.read_i32()?;
        Ok((Self { xid, op }, dec))
    }
}

/// Header preceding every reply after the handshake.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReplyHeader {
    /// Transaction id of the request being answered.
    pub xid: i32,
    /// Transaction id of the server state after the request.
    pub zxid: i64,
    /// Error code, [`code::OK`] on success.
    pub err: i32,
}

impl ReplyHeader {
    /// Decodes a reply header.
    pub fn decode(body: &[u8]) -> CodecResult<Self> {
        let mut dec = RecordDecoder::new(body);
        Ok(Self {
            xid: dec.read_i32()?,
            zxid: dec.read_i64()?,
            err: dec.read_i32()?,
        })
    }

    /// Encodes a reply header.
    pub fn encode(&self) -> Vec<u8> {
        let mut enc = RecordEncoder::with_capacity(16);
        enc.write_i32(self.xid).write_i64(self.zxid).write_i32(self.err);
        enc.into_bytes()
    }
}

/// Encodes a version-checked delete.
pub fn encode_delete(xid: i32, path: &str, version: i32) -> CodecResult<Vec<u8>> {
    let mut enc = RecordEncoder::with_capacity(16 + path.len());
    RequestHeader {
        xid,
        op: op::DELETE,
    }
    .write(&mut enc);
    enc.write_string(path)?.write_i32(version);
    Ok(enc.into_bytes())
}

/// Encodes a body-less request such as close or ping.
pub fn encode_bare(xid: i32, op: i32) -> Vec<u8> {
    let mut enc = RecordEncoder::with_capacity(8);
    RequestHeader { xid, op }.write(&mut enc);
    enc.into_bytes()
}

/// Prefixes a body with its length.
pub fn frame(body: &[u8]) -> CodecResult<Vec<u8>> {
    let mut enc = RecordEncoder::with_capacity(body.len() + 4);
    enc.write_buffer(Some(body))?;
    Ok(enc.into_bytes())
}

/// Maps a reply error code onto a service error.
pub fn error_for(err: i32, path: &str, expected_version: i32) -> Option<ServiceError> {
    let path = path.to_string();
    match err {
        code::OK => None,
        code::NO_NODE => Some(ServiceError::NoNode { path }),
        code::BAD_VERSION => Some(ServiceError::BadVersion {
            path,
            expected: expected_version,
        }),
        code::NOT_EMPTY => Some(ServiceError::NotEmpty { path }),
        code::SESSION_EXPIRED => Some(ServiceError::SessionExpired),
        code::CONNECTION_LOSS => Some(ServiceError::transport_retryable("connection loss")),
        code::OPERATION_TIMEOUT => Some(ServiceError::Timeout),
        code::NO_AUTH => Some(ServiceError::transport_fatal(format!("not authorized for {path}"))),
        code => Some(ServiceError::Server { code, path }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn connect_request_layout() {
        let request = ConnectRequest {
            protocol_version: PROTOCOL_VERSION,
            last_zxid_seen: 0,
            timeout_ms: 30_000,
            session_id: 0,
            password: vec![0; PASSWORD_LEN],
            read_only: false,
        };
        let body = request.encode().unwrap();
        // 4 + 8 + 4 + 8 + (4 + 16) + 1
        assert_eq!(body.len(), 45);
        assert_eq!(&body[12..16], &30_000i32.to_be_bytes());
    }

    #[test]
    fn connect_response_without_read_only_flag() {
        let response = ConnectResponse {
            protocol_version: 0,
            timeout_ms: 4_000,
            session_id: 0x1234,
            password: vec![7; PASSWORD_LEN],
            read_only: true,
        };
        let mut body = response.encode().unwrap();
        body.pop();

        let decoded = ConnectResponse::decode(&body).unwrap();
        assert_eq!(decoded.session_id, 0x1234);
        assert_eq!(decoded.timeout_ms, 4_000);
        assert!(!decoded.read_only);
    }

    #[test]
    fn delete_request_layout() {
        let body = encode_delete(5, "/a", 9).unwrap();
        let (header, mut dec) = RequestHeader::decode(&body).unwrap();
        assert_eq!(header, RequestHeader { xid: 5, op: op::DELETE });
        assert_eq!(dec.read_string().unwrap(), "/a");
        assert_eq!(dec.read_i32().unwrap(), 9);
    }

    #[test]
    fn framing() {
        let framed = frame(&[1, 2, 3]).unwrap();
        assert_eq!(framed, vec![0, 0, 0, 3, 1, 2, 3]);

        let mut dec = RecordDecoder::new(framed.as_slice()).with_max_buffer_len(MAX_FRAME_LEN);
        assert_eq!(dec.read_buffer().unwrap(), Some(vec![1, 2, 3]));
    }

    #[test]
    fn error_codes_map() {
        assert_eq!(error_for(code::OK, "/a", 0), None);
        assert!(matches!(
            error_for(code::NO_NODE, "/a", 0),
            Some(ServiceError::NoNode { .. })
        ));
        assert!(matches!(
            error_for(code::BAD_VERSION, "/a", 3),
            Some(ServiceError::BadVersion { expected: 3, .. })
        ));
        assert!(error_for(code::CONNECTION_LOSS, "/a", 0)
            .unwrap()
            .is_retryable());
        assert!(matches!(
            error_for(-999, "/a", 0),
            Some(ServiceError::Server { code: -999, .. })
        ));
    }
}
