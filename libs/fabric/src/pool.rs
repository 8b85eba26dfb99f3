//! Fixed-size slot pool shared by every publisher of a transport.
//!
//! All slots are allocated up front. A [`LoanedSample`] owns a slot
//! exclusively until it is published or dropped; a published [`Sample`] is
//! shared by reference between every subscriber that received it and goes
//! back to the pool when the last reader lets go.

use std::fmt;
use std::ops::Deref;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::error::{Error, Result};

pub(crate) struct SlotPool {
    slot_size: usize,
    slot_count: usize,
    free: Mutex<Vec<Box<[u8]>>>,
}

impl SlotPool {
    pub(crate) fn new(slot_size: usize, slot_count: usize) -> Arc<Self> {
        let free = (0..slot_count)
            .map(|_| vec![0u8; slot_size].into_boxed_slice())
            .collect();
        Arc::new(Self {
            slot_size,
            slot_count,
            free: Mutex::new(free),
        })
    }

    pub(crate) fn free_slots(&self) -> usize {
        self.free.lock().len()
    }

    pub(crate) fn loan(self: &Arc<Self>) -> Result<LoanedSample> {
        let buf = self.free.lock().pop().ok_or(Error::PoolExhausted {
            capacity: self.slot_count,
        })?;
        Ok(LoanedSample {
            buf: Some(buf),
            len: 0,
            pool: Arc::clone(self),
        })
    }

    fn release(&self, buf: Box<[u8]>) {
        self.free.lock().push(buf);
    }
}

/// A writable slot loaned from the pool
///
/// Dropping it without publishing returns the slot.
pub struct LoanedSample {
    buf: Option<Box<[u8]>>,
    len: usize,
    pool: Arc<SlotPool>,
}

impl LoanedSample {
    /// Size of the underlying slot
    pub fn capacity(&self) -> usize {
        self.pool.slot_size
    }

    /// Number of bytes that will be published
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// The whole slot, for encoders that write in place
    pub fn as_mut_slice(&mut self) -> &mut [u8] {
        match self.buf.as_deref_mut() {
            Some(buf) => buf,
            None => &mut [],
        }
    }

    /// Mark the first `len` bytes of the slot as the payload
    pub fn set_len(&mut self, len: usize) -> Result<()> {
        if len > self.capacity() {
            return Err(Error::PayloadTooLarge {
                size: len,
                capacity: self.capacity(),
            });
        }
        self.len = len;
        Ok(())
    }

    /// Copy `bytes` into the slot and mark them as the payload
    pub fn write(&mut self, bytes: &[u8]) -> Result<()> {
        self.set_len(bytes.len())?;
        self.as_mut_slice()[..bytes.len()].copy_from_slice(bytes);
        Ok(())
    }

    pub(crate) fn into_sample(mut self) -> Sample {
        Sample {
            chunk: Arc::new(Chunk {
                buf: self.buf.take(),
                len: self.len,
                pool: Arc::clone(&self.pool),
            }),
        }
    }
}

impl Drop for LoanedSample {
    fn drop(&mut self) {
        if let Some(buf) = self.buf.take() {
            self.pool.release(buf);
        }
    }
}

impl fmt::Debug for LoanedSample {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoanedSample")
            .field("len", &self.len)
            .field("capacity", &self.capacity())
            .finish()
    }
}

struct Chunk {
    buf: Option<Box<[u8]>>,
    len: usize,
    pool: Arc<SlotPool>,
}

impl Drop for Chunk {
    fn drop(&mut self) {
        if let Some(buf) = self.buf.take() {
            self.pool.release(buf);
        }
    }
}

/// A published, read-only sample
#[derive(Clone)]
pub struct Sample {
    chunk: Arc<Chunk>,
}

impl Sample {
    pub fn as_slice(&self) -> &[u8] {
        match self.chunk.buf.as_deref() {
            Some(buf) => &buf[..self.chunk.len],
            None => &[],
        }
    }
}

impl Deref for Sample {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        self.as_slice()
    }
}

impl fmt::Debug for Sample {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Sample").field("len", &self.chunk.len).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn loan_fails_when_every_slot_is_out() {
        let pool = SlotPool::new(16, 2);
        let _a = pool.loan().unwrap();
        let _b = pool.loan().unwrap();
        assert_eq!(pool.loan().unwrap_err(), Error::PoolExhausted { capacity: 2 });
    }

    #[test]
    fn dropped_loan_returns_its_slot() {
        let pool = SlotPool::new(16, 1);
        let loan = pool.loan().unwrap();
        assert_eq!(pool.free_slots(), 0);
        drop(loan);
        assert_eq!(pool.free_slots(), 1);
    }

    #[test]
    fn sample_returns_slot_after_last_reader() {
        let pool = SlotPool::new(16, 1);
        let mut loan = pool.loan().unwrap();
        loan.write(b"hello").unwrap();

        let sample = loan.into_sample();
        let copy = sample.clone();
        assert_eq!(&*copy, b"hello");

        drop(sample);
        assert_eq!(pool.free_slots(), 0);
        drop(copy);
        assert_eq!(pool.free_slots(), 1);
    }

    #[test]
    fn write_rejects_oversized_payload() {
        let pool = SlotPool::new(4, 1);
        let mut loan = pool.loan().unwrap();
        assert_eq!(
            loan.write(b"too long").unwrap_err(),
            Error::PayloadTooLarge { size: 8, capacity: 4 }
        );
        assert!(loan.is_empty());
    }
}
