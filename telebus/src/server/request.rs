use crate::common::frame::{FrameHeader, FrameWriter};
use crate::common::function::FunctionCode;
use crate::common::traits::{Loggable, Parse, Serialize};
use crate::constants::limits;
use crate::context::SlaveContext;
use crate::decode::{AppDecodeLevel, DecodeLevel};
use crate::error::RequestError;
use crate::exception::ExceptionCode;
use crate::server::identity::ReadDeviceRequest;
use crate::server::response::{BitWriter, ErrorResponse, RegisterWriter};
use crate::types::*;

use scursor::ReadCursor;

#[derive(Debug)]
pub(crate) enum Request<'a> {
    ReadCoils(ReadBitsRange),
    ReadDiscreteInputs(ReadBitsRange),
    ReadHoldingRegisters(ReadRegistersRange),
    ReadInputRegisters(ReadRegistersRange),
    WriteSingleCoil(Indexed<bool>),
    WriteSingleRegister(Indexed<u16>),
    WriteMultipleCoils(BitIterator<'a>),
    WriteMultipleRegisters(RegisterIterator<'a>),
    ReadDeviceIdentification(ReadDeviceRequest),
}

impl<'a> Request<'a> {
    pub(crate) fn get_function(&self) -> FunctionCode {
        match self {
            Request::ReadCoils(_) => FunctionCode::ReadCoils,
            Request::ReadDiscreteInputs(_) => FunctionCode::ReadDiscreteInputs,
            Request::ReadHoldingRegisters(_) => FunctionCode::ReadHoldingRegisters,
            Request::ReadInputRegisters(_) => FunctionCode::ReadInputRegisters,
            Request::WriteSingleCoil(_) => FunctionCode::WriteSingleCoil,
            Request::WriteSingleRegister(_) => FunctionCode::WriteSingleRegister,
            Request::WriteMultipleCoils(_) => FunctionCode::WriteMultipleCoils,
            Request::WriteMultipleRegisters(_) => FunctionCode::WriteMultipleRegisters,
            Request::ReadDeviceIdentification(_) => FunctionCode::ReadDeviceIdentification,
        }
    }

    pub(crate) fn get_reply<'b>(
        &self,
        header: FrameHeader,
        context: &SlaveContext,
        writer: &'b mut FrameWriter,
        level: DecodeLevel,
    ) -> Result<&'b [u8], RequestError> {
        fn write_result<T, E>(
            function: FunctionCode,
            header: FrameHeader,
            writer: &mut FrameWriter,
            result: Result<T, E>,
            level: DecodeLevel,
        ) -> Result<&[u8], RequestError>
        where
            T: Serialize + Loggable,
            E: Into<ExceptionCode>,
        {
            match result {
                Ok(response) => writer.format_reply(header, function, &response, level),
                Err(err) => {
                    writer.format_ex(header, ErrorResponse::new(function, err.into()), level)
                }
            }
        }

        let function = self.get_function();

        match self {
            Request::ReadCoils(range) => {
                let range = range.get();
                let result = context
                    .read_coils(range.start, range.count)
                    .map(|values| BitWriter::new(range, values));
                write_result(function, header, writer, result, level)
            }
            Request::ReadDiscreteInputs(range) => {
                let range = range.get();
                let result = context
                    .read_discrete_inputs(range.start, range.count)
                    .map(|values| BitWriter::new(range, values));
                write_result(function, header, writer, result, level)
            }
            Request::ReadHoldingRegisters(range) => {
                let range = range.get();
                let result = context
                    .read_holding_registers(range.start, range.count)
                    .map(|values| RegisterWriter::new(range, values));
                write_result(function, header, writer, result, level)
            }
            Request::ReadInputRegisters(range) => {
                let range = range.get();
                let result = context
                    .read_input_registers(range.start, range.count)
                    .map(|values| RegisterWriter::new(range, values));
                write_result(function, header, writer, result, level)
            }
            Request::WriteSingleCoil(request) => {
                let result = context
                    .write_coils(request.index, &[request.value])
                    .map(|_| *request);
                write_result(function, header, writer, result, level)
            }
            Request::WriteSingleRegister(request) => {
                let result = context
                    .write_holding_registers(request.index, &[request.value])
                    .map(|_| *request);
                write_result(function, header, writer, result, level)
            }
            Request::WriteMultipleCoils(items) => {
                let range = items.range();
                let values: Vec<bool> = items.map(|x| x.value).collect();
                let result = context.write_coils(range.start, &values).map(|_| range);
                write_result(function, header, writer, result, level)
            }
            Request::WriteMultipleRegisters(items) => {
                let range = items.range();
                let values: Vec<u16> = items.map(|x| x.value).collect();
                let result = context
                    .write_holding_registers(range.start, &values)
                    .map(|_| range);
                write_result(function, header, writer, result, level)
            }
            Request::ReadDeviceIdentification(request) => {
                let result = match context.identity() {
                    Some(identity) => identity.respond(*request),
                    None => Err(ExceptionCode::IllegalFunction),
                };
                write_result(function, header, writer, result, level)
            }
        }
    }

    pub(crate) fn parse(
        function: FunctionCode,
        cursor: &mut ReadCursor<'a>,
    ) -> Result<Self, RequestError> {
        match function {
            FunctionCode::ReadCoils => {
                let x = Request::ReadCoils(AddressRange::parse(cursor)?.of_read_bits()?);
                cursor.expect_empty()?;
                Ok(x)
            }
            FunctionCode::ReadDiscreteInputs => {
                let x = Request::ReadDiscreteInputs(AddressRange::parse(cursor)?.of_read_bits()?);
                cursor.expect_empty()?;
                Ok(x)
            }
            FunctionCode::ReadHoldingRegisters => {
                let x = Request::ReadHoldingRegisters(
                    AddressRange::parse(cursor)?.of_read_registers()?,
                );
                cursor.expect_empty()?;
                Ok(x)
            }
            FunctionCode::ReadInputRegisters => {
                let x =
                    Request::ReadInputRegisters(AddressRange::parse(cursor)?.of_read_registers()?);
                cursor.expect_empty()?;
                Ok(x)
            }
            FunctionCode::WriteSingleCoil => {
                let x = Request::WriteSingleCoil(Indexed::<bool>::parse(cursor)?);
                cursor.expect_empty()?;
                Ok(x)
            }
            FunctionCode::WriteSingleRegister => {
                let x = Request::WriteSingleRegister(Indexed::<u16>::parse(cursor)?);
                cursor.expect_empty()?;
                Ok(x)
            }
            FunctionCode::WriteMultipleCoils => {
                let range =
                    AddressRange::parse(cursor)?.limited_count(limits::MAX_WRITE_COILS_COUNT)?;
                Ok(Request::WriteMultipleCoils(BitIterator::parse_all(
                    range, cursor,
                )?))
            }
            FunctionCode::WriteMultipleRegisters => {
                let range = AddressRange::parse(cursor)?
                    .limited_count(limits::MAX_WRITE_REGISTERS_COUNT)?;
                Ok(Request::WriteMultipleRegisters(RegisterIterator::parse_all(
                    range, cursor,
                )?))
            }
            FunctionCode::ReadDeviceIdentification => {
                let x = Request::ReadDeviceIdentification(ReadDeviceRequest::parse(cursor)?);
                cursor.expect_empty()?;
                Ok(x)
            }
        }
    }
}

pub(crate) struct RequestDisplay<'a, 'b> {
    request: &'a Request<'b>,
    level: AppDecodeLevel,
}

impl<'a, 'b> RequestDisplay<'a, 'b> {
    pub(crate) fn new(level: AppDecodeLevel, request: &'a Request<'b>) -> Self {
        Self { request, level }
    }
}

impl std::fmt::Display for RequestDisplay<'_, '_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.request.get_function())?;

        if self.level.data_headers() {
            match self.request {
                Request::ReadCoils(range) => {
                    write!(f, " {}", range.get())?;
                }
                Request::ReadDiscreteInputs(range) => {
                    write!(f, " {}", range.get())?;
                }
                Request::ReadHoldingRegisters(range) => {
                    write!(f, " {}", range.get())?;
                }
                Request::ReadInputRegisters(range) => {
                    write!(f, " {}", range.get())?;
                }
                Request::WriteSingleCoil(request) => {
                    write!(f, " {request}")?;
                }
                Request::WriteSingleRegister(request) => {
                    write!(f, " {request}")?;
                }
                Request::WriteMultipleCoils(items) => {
                    write!(f, " {}", BitIteratorDisplay::new(self.level, *items))?;
                }
                Request::WriteMultipleRegisters(items) => {
                    write!(f, " {}", RegisterIteratorDisplay::new(self.level, *items))?;
                }
                Request::ReadDeviceIdentification(request) => {
                    write!(f, " {request}")?;
                }
            }
        }

        Ok(())
    }
}
