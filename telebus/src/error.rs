use crate::types::UnitId;

/// Top level error type for processing a single request on a session
///
/// Framing and I/O errors close the session. Request errors are answered
/// with a Modbus exception and the session continues.
#[derive(Clone, Copy, Debug, PartialEq, Eq, thiserror::Error)]
pub enum RequestError {
    /// An I/O error occurred
    #[error("i/o error: {0}")]
    Io(std::io::ErrorKind),
    /// A framing error occurred on the stream
    #[error("{0}")]
    BadFrame(#[from] FrameParseError),
    /// The PDU could not be parsed
    #[error("{0}")]
    BadPdu(#[from] AduParseError),
    /// The request parameters are not valid
    #[error("{0}")]
    BadRequest(#[from] InvalidRequest),
    /// An internal error occurred while serializing a response
    #[error("{0}")]
    Internal(#[from] InternalError),
    /// The session was asked to shut down
    #[error("the session was shut down")]
    Shutdown,
}

impl From<std::io::Error> for RequestError {
    fn from(err: std::io::Error) -> Self {
        RequestError::Io(err.kind())
    }
}

impl From<scursor::ReadError> for RequestError {
    fn from(_: scursor::ReadError) -> Self {
        RequestError::BadPdu(AduParseError::InsufficientBytes)
    }
}

impl From<scursor::TrailingBytes> for RequestError {
    fn from(x: scursor::TrailingBytes) -> Self {
        RequestError::BadPdu(AduParseError::TrailingBytes(x.count.get()))
    }
}

/// Errors that occur while parsing a frame off a stream
#[derive(Clone, Copy, Debug, PartialEq, Eq, thiserror::Error)]
pub enum FrameParseError {
    /// Received TCP frame with the length field set to zero
    #[error("received TCP frame with the length field set to zero")]
    MbapLengthZero,
    /// Received TCP frame with length that exceeds max allowed size
    #[error("received TCP frame with length ({0}) that exceeds max allowed size ({1})")]
    MbapLengthTooBig(usize, usize),
    /// Received TCP frame with a non-Modbus protocol id
    #[error("received TCP frame with non-Modbus protocol id: {0}")]
    UnknownProtocolId(u16),
}

/// Errors that occur while parsing the body of a request
#[derive(Clone, Copy, Debug, PartialEq, Eq, thiserror::Error)]
pub enum AduParseError {
    /// Request is too short to be valid
    #[error("request is too short to be valid")]
    InsufficientBytes,
    /// Request contains extra trailing bytes
    #[error("request contains {0} extra trailing bytes")]
    TrailingBytes(usize),
    /// Byte count does not match the quantity of objects in the request
    #[error("byte count ({0}) does not match the expected value ({1})")]
    ByteCountMismatch(usize, usize),
    /// Bad value for the coil state
    #[error("received coil state with unspecified value: {0:#06X}")]
    UnknownCoilState(u16),
    /// MEI type other than Read Device Identification
    #[error("unsupported MEI type: {0:#04X}")]
    UnknownMeiType(u8),
    /// Read device id code outside of 1..=4
    #[error("unsupported read device id code: {0:#04X}")]
    UnknownReadDeviceCode(u8),
}

/// Errors that result from invalid request parameters
#[derive(Clone, Copy, Debug, PartialEq, Eq, thiserror::Error)]
pub enum InvalidRequest {
    /// Frame did not contain a function code
    #[error("received a frame without a function code")]
    MissingFunctionCode,
    /// Request contains a count of zero
    #[error("request contains a count of zero")]
    CountOfZero,
    /// Start and count would overflow the u16 address space
    #[error("start == {0} and count == {1} would overflow the representation of u16")]
    AddressOverflow(u16, u16),
    /// Count exceeds the limit for the request type
    #[error("the request count of {0} exceeds maximum allowed count of {1} for this type")]
    CountTooBigForType(u16, u16),
}

/// Errors that indicate faulty logic in the library itself
#[derive(Clone, Copy, Debug, PartialEq, Eq, thiserror::Error)]
pub enum InternalError {
    /// Attempted to write more bytes than allowed
    #[error("attempted to write {0} bytes with {1} bytes remaining")]
    InsufficientWriteSpace(usize, usize),
    /// Attempted to read more bytes than present
    #[error("attempted to read {0} bytes with only {1} remaining")]
    InsufficientBytesForRead(usize, usize),
    /// The calculated frame size exceeds what is allowed by the protocol
    #[error("frame length of {0} exceeds the maximum allowed length")]
    FrameTooBig(usize),
    /// Cursor seek operation exceeded the bounds of the underlying buffer
    #[error("cursor seek operation exceeded the bounds of the underlying buffer")]
    BadSeekOperation,
    /// Byte count would exceed maximum size of u8
    #[error("byte count would exceed maximum size of u8: {0}")]
    BadByteCount(usize),
}

/// Out of bounds access to a register bank
#[derive(Clone, Copy, Debug, PartialEq, Eq, thiserror::Error)]
#[error("range [{start}, {start} + {count}) is outside of the bank [{bank_start}, {bank_start} + {bank_len})")]
pub struct BankError {
    /// first requested address
    pub start: u16,
    /// number of requested values
    pub count: usize,
    /// first address held by the bank
    pub bank_start: u16,
    /// number of values held by the bank
    pub bank_len: usize,
}

/// Errors reported by [`SlaveContext`](crate::context::SlaveContext) operations
#[derive(Clone, Copy, Debug, PartialEq, Eq, thiserror::Error)]
pub enum ContextError {
    /// Request was addressed to a unit id other than the one served
    #[error("unit id {requested} is not served (serving {served})")]
    IllegalSlaveId {
        /// unit id in the request
        requested: UnitId,
        /// unit id of the context
        served: UnitId,
    },
    /// Requested range is outside of the bank
    #[error("illegal data address: {0}")]
    IllegalDataAddress(#[from] BankError),
}

impl From<ContextError> for crate::exception::ExceptionCode {
    fn from(err: ContextError) -> Self {
        match err {
            ContextError::IllegalSlaveId { .. } => crate::exception::ExceptionCode::IllegalFunction,
            ContextError::IllegalDataAddress(_) => {
                crate::exception::ExceptionCode::IllegalDataAddress
            }
        }
    }
}
