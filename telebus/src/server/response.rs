use crate::common::function::FunctionCode;
use crate::common::traits::Loggable;
use crate::decode::AppDecodeLevel;
use crate::exception::ExceptionCode;
use crate::types::{AddressRange, Indexed};

/// Bit values read from a bank, serialized packed LSB first
pub(crate) struct BitWriter {
    pub(crate) range: AddressRange,
    pub(crate) values: Vec<bool>,
}

impl BitWriter {
    pub(crate) fn new(range: AddressRange, values: Vec<bool>) -> Self {
        Self { range, values }
    }
}

/// Register values read from a bank
pub(crate) struct RegisterWriter {
    pub(crate) range: AddressRange,
    pub(crate) values: Vec<u16>,
}

impl RegisterWriter {
    pub(crate) fn new(range: AddressRange, values: Vec<u16>) -> Self {
        Self { range, values }
    }
}

pub(crate) struct ErrorResponse {
    pub(crate) function: u8,
    pub(crate) exception: ExceptionCode,
}

impl ErrorResponse {
    pub(crate) fn new(function: FunctionCode, exception: ExceptionCode) -> Self {
        ErrorResponse {
            function: function.as_error(),
            exception,
        }
    }

    pub(crate) fn unknown_function(unknown: u8) -> Self {
        ErrorResponse {
            function: unknown | 0x80,
            exception: ExceptionCode::IllegalFunction,
        }
    }
}

impl Loggable for BitWriter {
    fn log(&self, level: AppDecodeLevel, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        if level.data_headers() {
            write!(f, "{}", self.range)?;
        }
        if level.data_values() {
            for (index, value) in self.range.iter().zip(self.values.iter()) {
                write!(f, "\n{}", Indexed::new(index, *value))?;
            }
        }
        Ok(())
    }
}

impl Loggable for RegisterWriter {
    fn log(&self, level: AppDecodeLevel, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        if level.data_headers() {
            write!(f, "{}", self.range)?;
        }
        if level.data_values() {
            for (index, value) in self.range.iter().zip(self.values.iter()) {
                write!(f, "\n{}", Indexed::new(index, *value))?;
            }
        }
        Ok(())
    }
}

impl Loggable for AddressRange {
    fn log(&self, level: AppDecodeLevel, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        if level.data_headers() {
            write!(f, "{self}")?;
        }
        Ok(())
    }
}

impl Loggable for Indexed<bool> {
    fn log(&self, level: AppDecodeLevel, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        if level.data_headers() {
            write!(f, "{self}")?;
        }
        Ok(())
    }
}

impl Loggable for Indexed<u16> {
    fn log(&self, level: AppDecodeLevel, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        if level.data_headers() {
            write!(f, "{self}")?;
        }
        Ok(())
    }
}
