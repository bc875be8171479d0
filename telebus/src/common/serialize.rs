use crate::common::cursor::WriteCursor;
use crate::common::traits::Serialize;
use crate::error::{InternalError, RequestError};
use crate::exception::ExceptionCode;
use crate::server::response::{BitWriter, ErrorResponse, RegisterWriter};
use crate::types::{coil_to_u16, AddressRange, Indexed};

pub(crate) fn calc_bytes_for_bits(num_bits: usize) -> Result<u8, InternalError> {
    let count = num_bits.div_ceil(8);
    u8::try_from(count).map_err(|_| InternalError::BadByteCount(count))
}

pub(crate) fn calc_bytes_for_registers(num_registers: usize) -> Result<u8, InternalError> {
    let count = 2 * num_registers;
    u8::try_from(count).map_err(|_| InternalError::BadByteCount(count))
}

impl Serialize for AddressRange {
    fn serialize(&self, cur: &mut WriteCursor) -> Result<(), RequestError> {
        cur.write_u16_be(self.start)?;
        cur.write_u16_be(self.count)?;
        Ok(())
    }
}

impl Serialize for ExceptionCode {
    fn serialize(&self, cursor: &mut WriteCursor) -> Result<(), RequestError> {
        cursor.write_u8((*self).into())?;
        Ok(())
    }
}

impl Serialize for Indexed<bool> {
    fn serialize(&self, cur: &mut WriteCursor) -> Result<(), RequestError> {
        cur.write_u16_be(self.index)?;
        cur.write_u16_be(coil_to_u16(self.value))?;
        Ok(())
    }
}

impl Serialize for Indexed<u16> {
    fn serialize(&self, cursor: &mut WriteCursor) -> Result<(), RequestError> {
        cursor.write_u16_be(self.index)?;
        cursor.write_u16_be(self.value)?;
        Ok(())
    }
}

impl Serialize for &[bool] {
    fn serialize(&self, cursor: &mut WriteCursor) -> Result<(), RequestError> {
        let num_bytes = calc_bytes_for_bits(self.len())?;
        cursor.write_u8(num_bytes)?;

        for byte in self.chunks(8) {
            let mut acc: u8 = 0;
            for (count, bit) in byte.iter().enumerate() {
                if *bit {
                    acc |= 1 << count;
                }
            }
            cursor.write_u8(acc)?;
        }

        Ok(())
    }
}

impl Serialize for &[u16] {
    fn serialize(&self, cursor: &mut WriteCursor) -> Result<(), RequestError> {
        let num_bytes = calc_bytes_for_registers(self.len())?;
        cursor.write_u8(num_bytes)?;

        for value in *self {
            cursor.write_u16_be(*value)?
        }

        Ok(())
    }
}

impl Serialize for BitWriter {
    fn serialize(&self, cursor: &mut WriteCursor) -> Result<(), RequestError> {
        self.values.as_slice().serialize(cursor)
    }
}

impl Serialize for RegisterWriter {
    fn serialize(&self, cursor: &mut WriteCursor) -> Result<(), RequestError> {
        self.values.as_slice().serialize(cursor)
    }
}

impl Serialize for ErrorResponse {
    fn serialize(&self, cursor: &mut WriteCursor) -> Result<(), RequestError> {
        cursor.write_u8(self.function)?;
        self.exception.serialize(cursor)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn serialize(msg: &dyn Serialize) -> Vec<u8> {
        let mut buffer = [0u8; 64];
        let mut cursor = WriteCursor::new(&mut buffer);
        msg.serialize(&mut cursor).unwrap();
        let len = cursor.position();
        buffer[..len].to_vec()
    }

    #[test]
    fn serializes_address_range() {
        let range = AddressRange::try_from(3, 512).unwrap();
        assert_eq!(serialize(&range), vec![0x00, 0x03, 0x02, 0x00]);
    }

    #[test]
    fn packs_bits_lsb_first() {
        let bits: &[bool] = &[true, false, true, true, false, false, false, false, true];
        assert_eq!(serialize(&bits), vec![0x02, 0x0D, 0x01]);
    }

    #[test]
    fn serializes_registers_big_endian_with_byte_count() {
        let registers: &[u16] = &[0xCAFE, 0x0102];
        assert_eq!(serialize(&registers), vec![0x04, 0xCA, 0xFE, 0x01, 0x02]);
    }

    #[test]
    fn serializes_write_single_coil_echo() {
        assert_eq!(
            serialize(&Indexed::new(0x0007, true)),
            vec![0x00, 0x07, 0xFF, 0x00]
        );
    }

    #[test]
    fn serializes_unknown_function_exception() {
        assert_eq!(
            serialize(&ErrorResponse::unknown_function(0x41)),
            vec![0xC1, 0x01]
        );
    }

    #[test]
    fn byte_count_must_fit_in_u8() {
        assert_eq!(
            calc_bytes_for_registers(128),
            Err(InternalError::BadByteCount(256))
        );
        assert_eq!(calc_bytes_for_bits(2000), Ok(250));
    }
}
