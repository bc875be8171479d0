use crate::common::buffer::ReadBuffer;
use crate::common::cursor::WriteCursor;
use crate::common::function::FunctionCode;
use crate::common::phys::PhysLayer;
use crate::common::traits::{Loggable, LoggableDisplay, Serialize};
use crate::decode::DecodeLevel;
use crate::error::{InternalError, RequestError};
use crate::server::response::ErrorResponse;
use crate::tcp::frame::{format_mbap, MbapDisplay, MbapParser};
use crate::types::UnitId;

pub(crate) mod constants {
    pub(crate) const MAX_ADU_LENGTH: usize = 253;
}

#[derive(PartialEq, Eq, Copy, Clone, Debug)]
pub(crate) struct TxId {
    value: u16,
}

impl TxId {
    pub(crate) fn new(value: u16) -> Self {
        TxId { value }
    }

    pub(crate) fn to_u16(self) -> u16 {
        self.value
    }
}

impl std::fmt::Display for TxId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:#06X}", self.value)
    }
}

#[derive(PartialEq, Eq, Copy, Clone, Debug)]
pub(crate) struct FrameHeader {
    pub(crate) unit_id: UnitId,
    pub(crate) tx_id: TxId,
}

impl FrameHeader {
    pub(crate) fn new(unit_id: UnitId, tx_id: TxId) -> Self {
        FrameHeader { unit_id, tx_id }
    }
}

pub(crate) struct Frame {
    pub(crate) header: FrameHeader,
    length: usize,
    pdu: [u8; constants::MAX_ADU_LENGTH],
}

impl Frame {
    pub(crate) fn new(header: FrameHeader) -> Frame {
        Frame {
            header,
            length: 0,
            pdu: [0; constants::MAX_ADU_LENGTH],
        }
    }

    pub(crate) fn set(&mut self, src: &[u8]) -> bool {
        if src.len() > self.pdu.len() {
            return false;
        }

        self.pdu[0..src.len()].copy_from_slice(src);
        self.length = src.len();
        true
    }

    pub(crate) fn payload(&self) -> &[u8] {
        &self.pdu[0..self.length]
    }
}

/// Reads complete MBAP frames off a physical layer
pub(crate) struct FramedReader {
    parser: MbapParser,
    buffer: ReadBuffer,
}

impl FramedReader {
    pub(crate) fn new() -> Self {
        Self {
            parser: MbapParser::new(),
            buffer: ReadBuffer::new(crate::tcp::frame::constants::MAX_FRAME_LENGTH),
        }
    }

    pub(crate) async fn next_frame(
        &mut self,
        io: &mut PhysLayer,
        level: DecodeLevel,
    ) -> Result<Frame, RequestError> {
        loop {
            match self.parser.parse(&mut self.buffer, level.frame)? {
                Some(frame) => return Ok(frame),
                None => {
                    self.buffer.read_some(io, level.physical).await?;
                }
            }
        }
    }
}

// function code followed by the body of the response
struct Reply<'a> {
    function: FunctionCode,
    body: &'a dyn Serialize,
}

impl Serialize for Reply<'_> {
    fn serialize(&self, cursor: &mut WriteCursor) -> Result<(), RequestError> {
        cursor.write_u8(self.function.get_value())?;
        self.body.serialize(cursor)
    }
}

/// Formats complete MBAP frames into an owned buffer
pub(crate) struct FrameWriter {
    buffer: [u8; crate::tcp::frame::constants::MAX_FRAME_LENGTH],
}

impl FrameWriter {
    pub(crate) fn new() -> Self {
        Self {
            buffer: [0; crate::tcp::frame::constants::MAX_FRAME_LENGTH],
        }
    }

    pub(crate) fn format_reply<T>(
        &mut self,
        header: FrameHeader,
        function: FunctionCode,
        body: &T,
        level: DecodeLevel,
    ) -> Result<&[u8], RequestError>
    where
        T: Serialize + Loggable,
    {
        if level.app.enabled() {
            tracing::info!(
                "PDU TX - {} {}",
                function,
                LoggableDisplay::new(body, level.app)
            );
        }

        self.format(header, &Reply { function, body }, level)
    }

    pub(crate) fn format_ex(
        &mut self,
        header: FrameHeader,
        response: ErrorResponse,
        level: DecodeLevel,
    ) -> Result<&[u8], RequestError> {
        if level.app.enabled() {
            tracing::warn!(
                "PDU TX - Modbus exception {:?} ({:#04X}) for function {:#04X}",
                response.exception,
                u8::from(response.exception),
                response.function
            );
        }

        self.format(header, &response, level)
    }

    fn format(
        &mut self,
        header: FrameHeader,
        msg: &dyn Serialize,
        level: DecodeLevel,
    ) -> Result<&[u8], RequestError> {
        let length = format_mbap(&mut self.buffer, header, msg)?;
        let frame = self
            .buffer
            .get(..length)
            .ok_or(InternalError::BadSeekOperation)?;

        if level.frame.enabled() {
            tracing::info!("MBAP TX - {}", MbapDisplay::new(level.frame, header, frame));
        }

        Ok(frame)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exception::ExceptionCode;
    use crate::types::Indexed;

    fn header() -> FrameHeader {
        FrameHeader::new(UnitId::new(0x01), TxId::new(0x0102))
    }

    #[test]
    fn formats_reply_with_function_code() {
        let mut writer = FrameWriter::new();
        let bytes = writer
            .format_reply(
                header(),
                FunctionCode::WriteSingleRegister,
                &Indexed::new(0x0001, 0xCAFEu16),
                DecodeLevel::nothing(),
            )
            .unwrap();
        assert_eq!(
            bytes,
            &[0x01, 0x02, 0x00, 0x00, 0x00, 0x06, 0x01, 0x06, 0x00, 0x01, 0xCA, 0xFE]
        );
    }

    #[test]
    fn formats_exception_response() {
        let mut writer = FrameWriter::new();
        let bytes = writer
            .format_ex(
                header(),
                ErrorResponse::new(
                    FunctionCode::ReadInputRegisters,
                    ExceptionCode::IllegalDataAddress,
                ),
                DecodeLevel::nothing(),
            )
            .unwrap();
        assert_eq!(
            bytes,
            &[0x01, 0x02, 0x00, 0x00, 0x00, 0x03, 0x01, 0x84, 0x02]
        );
    }

    #[test]
    fn frame_rejects_oversized_payload() {
        let mut frame = Frame::new(header());
        assert!(!frame.set(&[0u8; constants::MAX_ADU_LENGTH + 1]));
        assert!(frame.set(&[0x03, 0x00]));
        assert_eq!(frame.payload(), &[0x03, 0x00]);
    }
}
