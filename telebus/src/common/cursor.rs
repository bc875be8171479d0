use crate::error::InternalError;

/// custom write cursor
pub(crate) struct WriteCursor<'a> {
    dest: &'a mut [u8],
    pos: usize,
}

impl<'a> WriteCursor<'a> {
    pub(crate) fn new(dest: &'a mut [u8]) -> WriteCursor<'a> {
        WriteCursor { dest, pos: 0 }
    }

    pub(crate) fn position(&self) -> usize {
        self.pos
    }

    pub(crate) fn remaining(&self) -> usize {
        self.dest.len() - self.pos
    }

    pub(crate) fn seek_from_current(&mut self, count: usize) -> Result<(), InternalError> {
        if self.remaining() < count {
            return Err(InternalError::BadSeekOperation);
        }
        self.pos += count;
        Ok(())
    }

    pub(crate) fn seek_from_start(&mut self, count: usize) -> Result<(), InternalError> {
        if self.dest.len() < count {
            return Err(InternalError::BadSeekOperation);
        }
        self.pos = count;
        Ok(())
    }

    pub(crate) fn write_u8(&mut self, value: u8) -> Result<(), InternalError> {
        match self.dest.get_mut(self.pos) {
            Some(x) => {
                *x = value;
                self.pos += 1;
                Ok(())
            }
            None => Err(InternalError::InsufficientWriteSpace(1, 0)),
        }
    }

    pub(crate) fn write_u16_be(&mut self, value: u16) -> Result<(), InternalError> {
        if self.remaining() < 2 {
            // don't write any bytes if there's isn't space for the whole thing
            return Err(InternalError::InsufficientWriteSpace(2, self.remaining()));
        }
        let [upper, lower] = value.to_be_bytes();
        self.write_u8(upper)?;
        self.write_u8(lower)
    }

    pub(crate) fn write_bytes(&mut self, bytes: &[u8]) -> Result<(), InternalError> {
        if self.remaining() < bytes.len() {
            return Err(InternalError::InsufficientWriteSpace(
                bytes.len(),
                self.remaining(),
            ));
        }
        self.dest[self.pos..self.pos + bytes.len()].copy_from_slice(bytes);
        self.pos += bytes.len();
        Ok(())
    }

    /// overwrite a single byte at a previous position without moving the cursor
    pub(crate) fn write_u8_at(&mut self, pos: usize, value: u8) -> Result<(), InternalError> {
        match self.dest.get_mut(pos) {
            Some(x) if pos < self.pos => {
                *x = value;
                Ok(())
            }
            _ => Err(InternalError::BadSeekOperation),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn does_not_write_partial_u16() {
        let mut buffer = [0u8; 3];
        let mut cursor = WriteCursor::new(&mut buffer);
        cursor.write_u16_be(0xCAFE).unwrap();
        assert_eq!(
            cursor.write_u16_be(0xBEEF),
            Err(InternalError::InsufficientWriteSpace(2, 1))
        );
        assert_eq!(cursor.position(), 2);
        assert_eq!(buffer, [0xCA, 0xFE, 0x00]);
    }

    #[test]
    fn can_patch_previously_written_byte() {
        let mut buffer = [0u8; 4];
        let mut cursor = WriteCursor::new(&mut buffer);
        cursor.write_bytes(&[0x01, 0x02, 0x03]).unwrap();
        cursor.write_u8_at(1, 0xFF).unwrap();
        assert_eq!(cursor.write_u8_at(3, 0xFF), Err(InternalError::BadSeekOperation));
        assert_eq!(buffer, [0x01, 0xFF, 0x03, 0x00]);
    }
}
