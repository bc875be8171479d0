use crate::common::cursor::WriteCursor;
use crate::decode::AppDecodeLevel;
use crate::error::RequestError;

use scursor::ReadCursor;

pub(crate) trait Serialize {
    fn serialize(&self, cursor: &mut WriteCursor) -> Result<(), RequestError>;
}

pub(crate) trait Loggable {
    fn log(&self, level: AppDecodeLevel, f: &mut std::fmt::Formatter) -> std::fmt::Result;
}

pub(crate) struct LoggableDisplay<'a> {
    loggable: &'a dyn Loggable,
    level: AppDecodeLevel,
}

impl<'a> LoggableDisplay<'a> {
    pub(crate) fn new(loggable: &'a dyn Loggable, level: AppDecodeLevel) -> Self {
        Self { loggable, level }
    }
}

impl std::fmt::Display for LoggableDisplay<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        self.loggable.log(self.level, f)
    }
}

pub(crate) trait Parse: Sized {
    fn parse(cursor: &mut ReadCursor) -> Result<Self, RequestError>;
}
