use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::error::BankError;

/// Fixed length table of values for one Modbus data category
///
/// Addresses start at a configurable offset. Every access validates the complete
/// range before the lock is taken, and the copy in or out happens under a single
/// guard, so a reader never observes a partially applied write.
#[derive(Debug)]
pub struct RegisterBank<T> {
    start: u16,
    len: usize,
    values: Mutex<Vec<T>>,
}

impl<T: Copy> RegisterBank<T> {
    /// Create a bank whose first value lives at `start`
    pub fn new(start: u16, values: Vec<T>) -> Self {
        Self {
            start,
            len: values.len(),
            values: Mutex::new(values),
        }
    }

    /// Create a bank of `len` copies of `value`
    pub fn filled(start: u16, len: usize, value: T) -> Self {
        Self::new(start, vec![value; len])
    }

    /// First address held by the bank
    pub fn start(&self) -> u16 {
        self.start
    }

    /// Number of values held by the bank
    pub fn len(&self) -> usize {
        self.len
    }

    /// True if the bank holds no values
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Copy `count` values beginning at address `start`
    pub fn get(&self, start: u16, count: usize) -> Result<Vec<T>, BankError> {
        let offset = self.offset(start, count)?;
        let values = self.lock();
        Ok(values[offset..offset + count].to_vec())
    }

    /// Overwrite values beginning at address `start`
    pub fn set(&self, start: u16, values: &[T]) -> Result<(), BankError> {
        let offset = self.offset(start, values.len())?;
        self.lock()[offset..offset + values.len()].copy_from_slice(values);
        Ok(())
    }

    fn offset(&self, start: u16, count: usize) -> Result<usize, BankError> {
        let err = BankError {
            start,
            count,
            bank_start: self.start,
            bank_len: self.len,
        };

        let offset = start.checked_sub(self.start).ok_or(err)? as usize;
        match offset.checked_add(count) {
            Some(end) if end <= self.len => Ok(offset),
            _ => Err(err),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Vec<T>> {
        self.values.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn write_then_read_returns_written_values() {
        let bank = RegisterBank::filled(0, 5, 31416u16);
        bank.set(1, &[1, 2, 3]).unwrap();
        assert_eq!(bank.get(0, 5).unwrap(), vec![31416, 1, 2, 3, 31416]);
        assert_eq!(bank.get(2, 2).unwrap(), vec![2, 3]);
    }

    #[test]
    fn addresses_are_relative_to_the_bank_start() {
        let bank = RegisterBank::filled(10, 3, false);
        bank.set(12, &[true]).unwrap();
        assert_eq!(bank.get(10, 3).unwrap(), vec![false, false, true]);
        assert_eq!(
            bank.get(9, 1),
            Err(BankError {
                start: 9,
                count: 1,
                bank_start: 10,
                bank_len: 3
            })
        );
    }

    #[test]
    fn out_of_range_write_leaves_bank_unchanged() {
        let bank = RegisterBank::filled(0, 5, 7u16);
        assert!(bank.set(3, &[1, 2, 3]).is_err());
        assert!(bank.set(10, &[1]).is_err());
        assert_eq!(bank.get(0, 5).unwrap(), vec![7; 5]);
    }

    #[test]
    fn rejects_reads_past_the_end() {
        let bank = RegisterBank::filled(0, 5, 0u16);
        assert!(bank.get(0, 6).is_err());
        assert!(bank.get(5, 1).is_err());
        assert!(bank.get(u16::MAX, usize::MAX).is_err());
        assert_eq!(bank.get(5, 0).unwrap(), Vec::<u16>::new());
    }

    #[test]
    fn concurrent_readers_never_observe_torn_writes() {
        let bank = Arc::new(RegisterBank::filled(0, 3, 0u16));

        let writer = {
            let bank = bank.clone();
            std::thread::spawn(move || {
                for i in 0..10_000u16 {
                    bank.set(0, &[i, i, i]).unwrap();
                }
            })
        };

        let readers: Vec<_> = (0..4)
            .map(|_| {
                let bank = bank.clone();
                std::thread::spawn(move || {
                    for _ in 0..10_000 {
                        let values = bank.get(0, 3).unwrap();
                        assert!(values.iter().all(|x| *x == values[0]), "{values:?}");
                    }
                })
            })
            .collect();

        writer.join().unwrap();
        for reader in readers {
            reader.join().unwrap();
        }
    }
}
