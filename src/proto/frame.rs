//! Wire framing for the transaction protocol.
//!
//! # Responsibilities
//! - Encode/decode the fixed 8-byte frame header
//! - Map the action and response bytes to typed enums
//!
//! # Design Decisions
//! - Magic is checked before anything else; a frame without it is garbage
//! - Sizes are big-endian u32, explicit `to_be_bytes`/`from_be_bytes`
//! - Unknown action bytes decode successfully so the server can answer
//!   them with a protocol error instead of dropping the connection

/// Protocol magic, the first three bytes of every frame.
pub const MAGIC: [u8; 3] = *b"HLT";

/// Length of the fixed frame header (magic + type byte + BE size).
pub const HEADER_LEN: usize = 8;

/// Upper bound on the body of an `error` response, in bytes.
pub const MAX_ERROR_MESSAGE: usize = 100;

/// Client-initiated transaction actions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Action {
    AddQueue = 0,
    InstallId = 1,
    InstallUrl = 2,
    InstallData = 3,
    Nothing = 4,
    Launch = 5,
    Sleep = 6,
}

impl Action {
    /// Decode an action byte. Returns `None` for bytes outside the table.
    pub fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            0 => Some(Action::AddQueue),
            1 => Some(Action::InstallId),
            2 => Some(Action::InstallUrl),
            3 => Some(Action::InstallData),
            4 => Some(Action::Nothing),
            5 => Some(Action::Launch),
            6 => Some(Action::Sleep),
            _ => None,
        }
    }
}

/// Server response codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Response {
    Accept = 0,
    Busy = 1,
    Untrusted = 2,
    Error = 3,
    Success = 4,
    NotFound = 5,
}

impl Response {
    /// Decode a response byte. Returns `None` for bytes outside the table.
    pub fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            0 => Some(Response::Accept),
            1 => Some(Response::Busy),
            2 => Some(Response::Untrusted),
            3 => Some(Response::Error),
            4 => Some(Response::Success),
            5 => Some(Response::NotFound),
            _ => None,
        }
    }
}

/// Errors produced while decoding a frame header.
#[derive(Debug, PartialEq, Eq)]
pub enum FrameError {
    /// The first three bytes were not the protocol magic.
    BadMagic,
    /// The type byte does not name a known response.
    UnknownResponse(u8),
}

impl std::fmt::Display for FrameError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FrameError::BadMagic => write!(f, "frame does not start with the protocol magic"),
            FrameError::UnknownResponse(b) => write!(f, "unknown response byte {:#04x}", b),
        }
    }
}

impl std::error::Error for FrameError {}

/// A decoded request header: the raw action byte plus the body size.
///
/// The action byte is kept raw so the server can reply with a protocol
/// error for unknown actions rather than failing the decode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RequestHeader {
    pub action: u8,
    pub size: u32,
}

/// Encode a request header for the given action and body size.
pub fn encode_request(action: Action, size: u32) -> [u8; HEADER_LEN] {
    encode_header(action as u8, size)
}

/// Encode a response header for the given response code and body size.
pub fn encode_response(resp: Response, size: u32) -> [u8; HEADER_LEN] {
    encode_header(resp as u8, size)
}

fn encode_header(kind: u8, size: u32) -> [u8; HEADER_LEN] {
    let mut buf = [0u8; HEADER_LEN];
    buf[..3].copy_from_slice(&MAGIC);
    buf[3] = kind;
    buf[4..].copy_from_slice(&size.to_be_bytes());
    buf
}

/// Decode a request header, verifying only the magic.
pub fn decode_request(buf: &[u8; HEADER_LEN]) -> Result<RequestHeader, FrameError> {
    if buf[..3] != MAGIC {
        return Err(FrameError::BadMagic);
    }
    let size = u32::from_be_bytes([buf[4], buf[5], buf[6], buf[7]]);
    Ok(RequestHeader { action: buf[3], size })
}

/// Decode a response header, verifying the magic and the response byte.
pub fn decode_response(buf: &[u8; HEADER_LEN]) -> Result<(Response, u32), FrameError> {
    if buf[..3] != MAGIC {
        return Err(FrameError::BadMagic);
    }
    let resp = Response::from_byte(buf[3]).ok_or(FrameError::UnknownResponse(buf[3]))?;
    let size = u32::from_be_bytes([buf[4], buf[5], buf[6], buf[7]]);
    Ok((resp, size))
}
