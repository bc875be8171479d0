use crate::common::buffer::ReadBuffer;
use crate::common::cursor::WriteCursor;
use crate::common::frame::{Frame, FrameHeader, TxId};
use crate::common::phys::format_bytes;
use crate::common::traits::Serialize;
use crate::decode::FrameDecodeLevel;
use crate::error::{FrameParseError, InternalError, RequestError};
use crate::types::UnitId;

pub(crate) mod constants {
    pub(crate) const HEADER_LENGTH: usize = 7;
    pub(crate) const MAX_FRAME_LENGTH: usize =
        HEADER_LENGTH + crate::common::frame::constants::MAX_ADU_LENGTH;
    // includes the 1 byte unit id
    pub(crate) const MAX_LENGTH_FIELD: usize = crate::common::frame::constants::MAX_ADU_LENGTH + 1;
}

#[derive(Clone, Copy)]
struct MbapHeader {
    tx_id: TxId,
    adu_length: usize,
    unit_id: UnitId,
}

#[derive(Clone, Copy)]
enum ParseState {
    Begin,
    Header(MbapHeader),
}

pub(crate) struct MbapParser {
    state: ParseState,
}

impl MbapParser {
    pub(crate) fn new() -> Self {
        Self {
            state: ParseState::Begin,
        }
    }

    /// Ok(None) means more data is required
    pub(crate) fn parse(
        &mut self,
        cursor: &mut ReadBuffer,
        level: FrameDecodeLevel,
    ) -> Result<Option<Frame>, RequestError> {
        match self.state {
            ParseState::Header(header) => {
                if cursor.len() < header.adu_length {
                    return Ok(None);
                }

                let frame = Self::parse_body(&header, cursor)?;
                self.state = ParseState::Begin;

                if level.enabled() {
                    tracing::info!(
                        "MBAP RX - {}",
                        MbapDisplay::new(level, frame.header, frame.payload())
                    );
                }

                Ok(Some(frame))
            }
            ParseState::Begin => {
                if cursor.len() < constants::HEADER_LENGTH {
                    return Ok(None);
                }

                self.state = ParseState::Header(Self::parse_header(cursor)?);
                self.parse(cursor, level)
            }
        }
    }

    fn parse_header(cursor: &mut ReadBuffer) -> Result<MbapHeader, RequestError> {
        let tx_id = TxId::new(cursor.read_u16_be()?);
        let protocol_id = cursor.read_u16_be()?;
        let length = cursor.read_u16_be()? as usize;
        let unit_id = UnitId::new(cursor.read_u8()?);

        if protocol_id != 0 {
            return Err(FrameParseError::UnknownProtocolId(protocol_id).into());
        }

        if length > constants::MAX_LENGTH_FIELD {
            return Err(
                FrameParseError::MbapLengthTooBig(length, constants::MAX_LENGTH_FIELD).into(),
            );
        }

        // must be > 0 b/c the 1-byte unit identifier counts towards length
        if length == 0 {
            return Err(FrameParseError::MbapLengthZero.into());
        }

        Ok(MbapHeader {
            tx_id,
            adu_length: length - 1,
            unit_id,
        })
    }

    fn parse_body(header: &MbapHeader, cursor: &mut ReadBuffer) -> Result<Frame, RequestError> {
        let mut frame = Frame::new(FrameHeader::new(header.unit_id, header.tx_id));
        if !frame.set(cursor.read(header.adu_length)?) {
            return Err(InternalError::FrameTooBig(header.adu_length).into());
        }
        Ok(frame)
    }
}

/// Write a complete MBAP frame into `buffer`, returning the number of bytes written
pub(crate) fn format_mbap(
    buffer: &mut [u8],
    header: FrameHeader,
    msg: &dyn Serialize,
) -> Result<usize, RequestError> {
    let mut cursor = WriteCursor::new(buffer);
    cursor.write_u16_be(header.tx_id.to_u16())?;
    cursor.write_u16_be(0)?;
    cursor.seek_from_current(2)?; // write the length later
    cursor.write_u8(header.unit_id.value)?;

    let adu_length: usize = {
        let start = cursor.position();
        msg.serialize(&mut cursor)?;
        cursor.position() - start
    };

    if adu_length > crate::common::frame::constants::MAX_ADU_LENGTH {
        return Err(InternalError::FrameTooBig(adu_length).into());
    }

    // length field counts the unit id
    let length_field =
        u16::try_from(adu_length + 1).map_err(|_| InternalError::FrameTooBig(adu_length))?;
    cursor.seek_from_start(4)?;
    cursor.write_u16_be(length_field)?;

    Ok(constants::HEADER_LENGTH + adu_length)
}

pub(crate) struct MbapDisplay<'a> {
    level: FrameDecodeLevel,
    header: FrameHeader,
    bytes: &'a [u8],
}

impl<'a> MbapDisplay<'a> {
    pub(crate) fn new(level: FrameDecodeLevel, header: FrameHeader, bytes: &'a [u8]) -> Self {
        MbapDisplay {
            level,
            header,
            bytes,
        }
    }
}

impl std::fmt::Display for MbapDisplay<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(
            f,
            "tx_id: {} unit: {} len: {}",
            self.header.tx_id,
            self.header.unit_id,
            self.bytes.len()
        )?;
        if self.level.payload_enabled() {
            format_bytes(f, self.bytes)?;
        }
        Ok(())
    }
}
