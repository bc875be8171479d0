use std::sync::Arc;

use scursor::ReadCursor;
use tokio_util::sync::CancellationToken;

use crate::common::frame::{Frame, FrameWriter, FramedReader};
use crate::common::function::FunctionCode;
use crate::common::phys::PhysLayer;
use crate::context::SlaveContext;
use crate::decode::DecodeLevel;
use crate::error::{InvalidRequest, RequestError};
use crate::exception::ExceptionCode;
use crate::server::request::{Request, RequestDisplay};
use crate::server::response::ErrorResponse;

/// Serves requests on a single connection until the peer disconnects,
/// a framing error occurs, or the session is cancelled
pub(crate) struct SessionTask {
    io: PhysLayer,
    context: Arc<SlaveContext>,
    shutdown: CancellationToken,
    reader: FramedReader,
    writer: FrameWriter,
    decode: DecodeLevel,
}

impl SessionTask {
    pub(crate) fn new(
        io: PhysLayer,
        context: Arc<SlaveContext>,
        decode: DecodeLevel,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            io,
            context,
            shutdown,
            reader: FramedReader::new(),
            writer: FrameWriter::new(),
            decode,
        }
    }

    /// Returns the reason the session ended
    pub(crate) async fn run(&mut self) -> RequestError {
        loop {
            if let Err(err) = self.run_one().await {
                return err;
            }
        }
    }

    async fn run_one(&mut self) -> Result<(), RequestError> {
        // cancellation is only observed between requests
        let frame = tokio::select! {
            biased;
            _ = self.shutdown.cancelled() => return Err(RequestError::Shutdown),
            frame = self.reader.next_frame(&mut self.io, self.decode) => frame?,
        };

        self.handle_frame(frame).await
    }

    async fn handle_frame(&mut self, frame: Frame) -> Result<(), RequestError> {
        let mut cursor = ReadCursor::new(frame.payload());

        let function = match cursor.read_u8() {
            Err(_) => {
                tracing::warn!("received request without a function code");
                return Err(InvalidRequest::MissingFunctionCode.into());
            }
            Ok(value) => match FunctionCode::get(value) {
                Some(x) => x,
                None => {
                    tracing::warn!("received unknown function code: {:#04X}", value);
                    let reply = self.writer.format_ex(
                        frame.header,
                        ErrorResponse::unknown_function(value),
                        self.decode,
                    )?;
                    return send(&mut self.io, &self.shutdown, reply, self.decode).await;
                }
            },
        };

        let reply = if let Err(err) = self.context.check_unit_id(frame.header.unit_id) {
            tracing::warn!("{} request: {}", function, err);
            self.writer.format_ex(
                frame.header,
                ErrorResponse::new(function, err.into()),
                self.decode,
            )?
        } else {
            match Request::parse(function, &mut cursor) {
                Ok(request) => {
                    if self.decode.app.enabled() {
                        tracing::info!(
                            "PDU RX - {}",
                            RequestDisplay::new(self.decode.app, &request)
                        );
                    }
                    request.get_reply(
                        frame.header,
                        self.context.as_ref(),
                        &mut self.writer,
                        self.decode,
                    )?
                }
                Err(err) => {
                    tracing::warn!("error parsing {} request: {}", function, err);
                    self.writer.format_ex(
                        frame.header,
                        ErrorResponse::new(function, parse_exception(err)),
                        self.decode,
                    )?
                }
            }
        };

        send(&mut self.io, &self.shutdown, reply, self.decode).await
    }
}

/// A range running past the end of the address space can never be inside a bank
fn parse_exception(err: RequestError) -> ExceptionCode {
    match err {
        RequestError::BadRequest(InvalidRequest::AddressOverflow(_, _)) => {
            ExceptionCode::IllegalDataAddress
        }
        _ => ExceptionCode::IllegalDataValue,
    }
}

/// Writes a reply unless the session is cancelled while the peer is not reading
async fn send(
    io: &mut PhysLayer,
    shutdown: &CancellationToken,
    reply: &[u8],
    decode: DecodeLevel,
) -> Result<(), RequestError> {
    tokio::select! {
        biased;
        result = io.write(reply, decode.physical) => Ok(result?),
        _ = shutdown.cancelled() => Err(RequestError::Shutdown),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::ContextConfig;
    use tokio_test::io::Builder;

    fn run(input: &[u8], output: &[u8]) -> RequestError {
        let context = Arc::new(SlaveContext::new(ContextConfig {
            count: 5,
            ..Default::default()
        }));
        let io = PhysLayer::new_mock(Builder::new().read(input).write(output).build());
        let mut task = SessionTask::new(
            io,
            context,
            DecodeLevel::nothing(),
            CancellationToken::new(),
        );
        tokio_test::block_on(task.run())
    }

    #[test]
    fn answers_read_then_closes_on_disconnect() {
        let err = run(
            &[0x00, 0x01, 0x00, 0x00, 0x00, 0x06, 0x01, 0x04, 0x00, 0x00, 0x00, 0x01],
            &[0x00, 0x01, 0x00, 0x00, 0x00, 0x05, 0x01, 0x04, 0x02, 0x7A, 0xB8],
        );
        assert_eq!(err, RequestError::Io(std::io::ErrorKind::UnexpectedEof));
    }

    #[test]
    fn unknown_function_is_illegal_function() {
        run(
            &[0x00, 0x02, 0x00, 0x00, 0x00, 0x02, 0x01, 0x41],
            &[0x00, 0x02, 0x00, 0x00, 0x00, 0x03, 0x01, 0xC1, 0x01],
        );
    }

    #[test]
    fn other_unit_id_is_illegal_function() {
        run(
            &[0x00, 0x03, 0x00, 0x00, 0x00, 0x06, 0x07, 0x03, 0x00, 0x00, 0x00, 0x01],
            &[0x00, 0x03, 0x00, 0x00, 0x00, 0x03, 0x07, 0x83, 0x01],
        );
    }

    #[test]
    fn malformed_body_is_illegal_data_value() {
        run(
            &[0x00, 0x04, 0x00, 0x00, 0x00, 0x06, 0x01, 0x05, 0x00, 0x00, 0x12, 0x34],
            &[0x00, 0x04, 0x00, 0x00, 0x00, 0x03, 0x01, 0x85, 0x03],
        );
    }

    #[test]
    fn read_over_limit_is_illegal_data_value() {
        run(
            &[0x00, 0x05, 0x00, 0x00, 0x00, 0x06, 0x01, 0x03, 0x00, 0x00, 0x00, 0x7E],
            &[0x00, 0x05, 0x00, 0x00, 0x00, 0x03, 0x01, 0x83, 0x03],
        );
    }

    #[test]
    fn range_past_end_of_address_space_is_illegal_data_address() {
        run(
            &[0x00, 0x09, 0x00, 0x00, 0x00, 0x06, 0x01, 0x04, 0xFF, 0xFF, 0x00, 0x02],
            &[0x00, 0x09, 0x00, 0x00, 0x00, 0x03, 0x01, 0x84, 0x02],
        );
    }

    #[test]
    fn zero_count_is_illegal_data_value() {
        run(
            &[0x00, 0x0A, 0x00, 0x00, 0x00, 0x06, 0x01, 0x04, 0x00, 0x00, 0x00, 0x00],
            &[0x00, 0x0A, 0x00, 0x00, 0x00, 0x03, 0x01, 0x84, 0x03],
        );
    }

    #[test]
    fn empty_pdu_closes_without_response() {
        let context = Arc::new(SlaveContext::new(ContextConfig::default()));
        let io = PhysLayer::new_mock(
            Builder::new()
                .read(&[0x00, 0x06, 0x00, 0x00, 0x00, 0x01, 0x01])
                .build(),
        );
        let mut task = SessionTask::new(
            io,
            context,
            DecodeLevel::nothing(),
            CancellationToken::new(),
        );
        assert_eq!(
            tokio_test::block_on(task.run()),
            RequestError::BadRequest(InvalidRequest::MissingFunctionCode)
        );
    }

    #[test]
    fn cancelled_session_stops_before_reading() {
        let context = Arc::new(SlaveContext::new(ContextConfig::default()));
        let token = CancellationToken::new();
        token.cancel();
        let io = PhysLayer::new_mock(Builder::new().build());
        let mut task = SessionTask::new(io, context, DecodeLevel::nothing(), token);
        assert_eq!(tokio_test::block_on(task.run()), RequestError::Shutdown);
    }
}
