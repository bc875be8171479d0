use crate::common::cursor::WriteCursor;
use crate::common::traits::{Loggable, Serialize};
use crate::constants::device_id;
use crate::decode::AppDecodeLevel;
use crate::error::{AduParseError, RequestError};
use crate::exception::ExceptionCode;

/// Identification strings served through Read Device Identification (0x2B / 0x0E)
///
/// Objects 0x00 - 0x02 make up the mandatory basic category, objects 0x03 - 0x06
/// the optional regular category.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ServerIdentity {
    /// object 0x00
    pub vendor_name: String,
    /// object 0x01
    pub product_code: String,
    /// object 0x02
    pub major_minor_revision: String,
    /// object 0x03
    pub vendor_url: Option<String>,
    /// object 0x04
    pub product_name: Option<String>,
    /// object 0x05
    pub model_name: Option<String>,
    /// object 0x06
    pub user_application_name: Option<String>,
}

impl Default for ServerIdentity {
    fn default() -> Self {
        Self {
            vendor_name: "telebus".to_string(),
            product_code: "TB".to_string(),
            major_minor_revision: "1.0".to_string(),
            vendor_url: Some("https://docs.rs/telebus".to_string()),
            product_name: Some("telebus Server".to_string()),
            model_name: Some("telebus Server".to_string()),
            user_application_name: None,
        }
    }
}

impl ServerIdentity {
    /// value of an object by id, if the object is defined
    pub fn object(&self, id: u8) -> Option<&str> {
        match id {
            0x00 => Some(self.vendor_name.as_str()),
            0x01 => Some(self.product_code.as_str()),
            0x02 => Some(self.major_minor_revision.as_str()),
            0x03 => self.vendor_url.as_deref(),
            0x04 => self.product_name.as_deref(),
            0x05 => self.model_name.as_deref(),
            0x06 => self.user_application_name.as_deref(),
            _ => None,
        }
    }

    pub(crate) fn respond(
        &self,
        request: ReadDeviceRequest,
    ) -> Result<DeviceIdentificationResponse<'_>, ExceptionCode> {
        let objects = match request.code.last_object() {
            Some(last) => {
                let first = if request.object_id > last {
                    0
                } else {
                    request.object_id
                };
                (first..=last)
                    .filter_map(|id| self.object(id).map(|value| (id, value)))
                    .collect()
            }
            None => match self.object(request.object_id) {
                Some(value) => vec![(request.object_id, value)],
                None => return Err(ExceptionCode::IllegalDataAddress),
            },
        };

        Ok(DeviceIdentificationResponse {
            code: request.code,
            objects,
        })
    }
}

/// Read device id code of a Read Device Identification request
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum ReadDeviceCode {
    BasicStreaming,
    RegularStreaming,
    ExtendedStreaming,
    Specific,
}

impl ReadDeviceCode {
    pub(crate) fn get(value: u8) -> Result<Self, AduParseError> {
        match value {
            0x01 => Ok(Self::BasicStreaming),
            0x02 => Ok(Self::RegularStreaming),
            0x03 => Ok(Self::ExtendedStreaming),
            0x04 => Ok(Self::Specific),
            _ => Err(AduParseError::UnknownReadDeviceCode(value)),
        }
    }

    pub(crate) fn get_value(self) -> u8 {
        match self {
            Self::BasicStreaming => 0x01,
            Self::RegularStreaming => 0x02,
            Self::ExtendedStreaming => 0x03,
            Self::Specific => 0x04,
        }
    }

    // no extended objects are defined, so extended streams stop at the last regular object
    fn last_object(self) -> Option<u8> {
        match self {
            Self::BasicStreaming => Some(device_id::LAST_BASIC_OBJECT),
            Self::RegularStreaming | Self::ExtendedStreaming => {
                Some(device_id::LAST_REGULAR_OBJECT)
            }
            Self::Specific => None,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) struct ReadDeviceRequest {
    pub(crate) code: ReadDeviceCode,
    pub(crate) object_id: u8,
}

impl std::fmt::Display for ReadDeviceRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "code: {:?} object: {:#04X}", self.code, self.object_id)
    }
}

pub(crate) struct DeviceIdentificationResponse<'a> {
    code: ReadDeviceCode,
    objects: Vec<(u8, &'a str)>,
}

// object id + object length
const OBJECT_HEADER_LENGTH: usize = 2;

impl Serialize for DeviceIdentificationResponse<'_> {
    fn serialize(&self, cursor: &mut WriteCursor) -> Result<(), RequestError> {
        cursor.write_u8(device_id::MEI_READ_DEVICE_ID)?;
        cursor.write_u8(self.code.get_value())?;
        cursor.write_u8(device_id::CONFORMITY_LEVEL)?;
        let more_follows_pos = cursor.position();
        cursor.write_u8(device_id::NO_MORE_FOLLOWS)?;
        cursor.write_u8(0)?;
        let count_pos = cursor.position();
        cursor.write_u8(0)?;

        let mut count: u8 = 0;
        for (id, value) in self.objects.iter() {
            let bytes = value.as_bytes();
            let space = cursor.remaining().saturating_sub(OBJECT_HEADER_LENGTH);
            let bytes = if bytes.len() <= space {
                bytes
            } else if count == 0 {
                // a single object that can never fit is truncated
                &bytes[..space.min(u8::MAX as usize)]
            } else {
                cursor.write_u8_at(more_follows_pos, device_id::MORE_FOLLOWS)?;
                cursor.write_u8_at(more_follows_pos + 1, *id)?;
                break;
            };
            cursor.write_u8(*id)?;
            cursor.write_u8(bytes.len() as u8)?;
            cursor.write_bytes(bytes)?;
            count += 1;
        }

        cursor.write_u8_at(count_pos, count)?;
        Ok(())
    }
}

impl Loggable for DeviceIdentificationResponse<'_> {
    fn log(&self, level: AppDecodeLevel, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        if level.data_headers() {
            write!(f, "code: {:?} objects: {}", self.code, self.objects.len())?;
        }
        if level.data_values() {
            for (id, value) in self.objects.iter() {
                write!(f, "\n{id:#04X}: {value}")?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // mei type + code + conformity + more follows + next object + object count
    const RESPONSE_HEADER_LENGTH: usize = 6;

    fn serialize(response: &DeviceIdentificationResponse, size: usize) -> Vec<u8> {
        let mut buffer = vec![0u8; size];
        let mut cursor = WriteCursor::new(&mut buffer);
        response.serialize(&mut cursor).unwrap();
        let len = cursor.position();
        buffer.truncate(len);
        buffer
    }

    fn request(code: ReadDeviceCode, object_id: u8) -> ReadDeviceRequest {
        ReadDeviceRequest { code, object_id }
    }

    #[test]
    fn basic_stream_returns_mandatory_objects() {
        let identity = ServerIdentity::default();
        let response = identity
            .respond(request(ReadDeviceCode::BasicStreaming, 0x00))
            .unwrap();
        let ids: Vec<u8> = response.objects.iter().map(|(id, _)| *id).collect();
        assert_eq!(ids, vec![0x00, 0x01, 0x02]);
    }

    #[test]
    fn stream_restarts_when_object_id_outside_category() {
        let identity = ServerIdentity::default();
        let response = identity
            .respond(request(ReadDeviceCode::BasicStreaming, 0x05))
            .unwrap();
        assert_eq!(response.objects.first().map(|(id, _)| *id), Some(0x00));
    }

    #[test]
    fn regular_stream_skips_undefined_objects() {
        let identity = ServerIdentity::default();
        let response = identity
            .respond(request(ReadDeviceCode::RegularStreaming, 0x02))
            .unwrap();
        let ids: Vec<u8> = response.objects.iter().map(|(id, _)| *id).collect();
        assert_eq!(ids, vec![0x02, 0x03, 0x04, 0x05]);
    }

    #[test]
    fn default_identity_serves_vendor_url() {
        let identity = ServerIdentity::default();
        let response = identity
            .respond(request(ReadDeviceCode::Specific, 0x03))
            .unwrap();
        assert_eq!(
            serialize(&response, 64),
            [
                &[0x0E, 0x04, 0x82, 0x00, 0x00, 0x01, 0x03, 0x17][..],
                &b"https://docs.rs/telebus"[..]
            ]
            .concat()
        );
    }

    #[test]
    fn unknown_individual_object_is_illegal_address() {
        let identity = ServerIdentity::default();
        assert_eq!(
            identity
                .respond(request(ReadDeviceCode::Specific, 0x06))
                .err(),
            Some(ExceptionCode::IllegalDataAddress)
        );
    }

    #[test]
    fn serializes_individual_object() {
        let identity = ServerIdentity::default();
        let response = identity
            .respond(request(ReadDeviceCode::Specific, 0x01))
            .unwrap();
        assert_eq!(
            serialize(&response, 64),
            vec![0x0E, 0x04, 0x82, 0x00, 0x00, 0x01, 0x01, 0x02, b'T', b'B']
        );
    }

    #[test]
    fn sets_more_follows_when_objects_do_not_fit() {
        let identity = ServerIdentity {
            vendor_name: "a".repeat(10),
            product_code: "b".repeat(10),
            major_minor_revision: "1.0".to_string(),
            vendor_url: None,
            product_name: None,
            model_name: None,
            user_application_name: None,
        };
        let response = identity
            .respond(request(ReadDeviceCode::BasicStreaming, 0x00))
            .unwrap();
        // room for the header and exactly one object
        let bytes = serialize(&response, RESPONSE_HEADER_LENGTH + OBJECT_HEADER_LENGTH + 15);
        assert_eq!(&bytes[..RESPONSE_HEADER_LENGTH], &[0x0E, 0x01, 0x82, 0xFF, 0x01, 0x01]);
        assert_eq!(bytes.len(), RESPONSE_HEADER_LENGTH + OBJECT_HEADER_LENGTH + 10);
    }
}
