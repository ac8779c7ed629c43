use std::{
    fmt::{self, Debug, Formatter},
    mem,
    ops::Deref,
    sync::{Arc, Mutex},
};

/// A parse buffer with a compaction offset.
///
/// Bytes are appended at the back and consumed from the front;
/// consumption advances an offset instead of memmoving on every
/// request, and the storage is compacted once the consumed prefix
/// outgrows the live region. Storage is rented from a [`BufferPool`]
/// and returned on drop.
pub struct Buffer {
    offset: usize,
    filled: usize,
    data: Vec<u8>,
    pool: Option<BufferPool>,
}

impl Buffer {
    /// a buffer with unpooled storage
    pub fn new() -> Self {
        Self {
            offset: 0,
            filled: 0,
            data: Vec::new(),
            pool: None,
        }
    }

    /// number of unconsumed bytes
    pub fn len(&self) -> usize {
        self.filled - self.offset
    }

    /// are there zero unconsumed bytes?
    pub fn is_empty(&self) -> bool {
        self.filled == self.offset
    }

    /// append bytes at the back
    pub fn extend_from_slice(&mut self, slice: &[u8]) {
        self.data.truncate(self.filled);
        self.data.extend_from_slice(slice);
        self.filled = self.data.len();
    }

    /// Consume `n` bytes from the front. When everything has been
    /// consumed the buffer resets; when the dead prefix outgrows the
    /// live bytes, the live bytes are copied down.
    pub fn ignore_front(&mut self, n: usize) {
        self.offset += n;
        debug_assert!(self.offset <= self.filled);
        if self.offset >= self.filled {
            self.offset = 0;
            self.filled = 0;
        } else if self.offset > self.filled - self.offset {
            self.data.copy_within(self.offset..self.filled, 0);
            self.filled -= self.offset;
            self.offset = 0;
        }
    }

    /// Grow and expose writable spare room of at least `min` bytes,
    /// doubling the backing storage as needed but never beyond
    /// `ceiling` live bytes. Returns `None` when the ceiling has been
    /// reached.
    pub fn spare_mut(&mut self, min: usize, ceiling: usize) -> Option<&mut [u8]> {
        if self.len() >= ceiling {
            return None;
        }

        let spare = self.data.len() - self.filled;
        if spare < min {
            let floor = self.filled + min;
            let cap = (self.offset + ceiling).max(floor);
            let target = (self.data.len() * 2).clamp(floor, cap);
            self.data.resize(target, 0);
        }

        Some(&mut self.data[self.filled..])
    }

    /// record that `n` bytes of the spare room returned by
    /// [`Buffer::spare_mut`] now contain data
    pub fn commit(&mut self, n: usize) {
        self.filled += n;
        debug_assert!(self.filled <= self.data.len());
    }

    /// copy the unconsumed bytes out, leaving the buffer empty
    pub fn take_residual(&mut self) -> Vec<u8> {
        let residual = self[..].to_vec();
        self.offset = 0;
        self.filled = 0;
        residual
    }
}

impl Default for Buffer {
    fn default() -> Self {
        Self::new()
    }
}

impl Deref for Buffer {
    type Target = [u8];

    fn deref(&self) -> &Self::Target {
        &self.data[self.offset..self.filled]
    }
}

impl Debug for Buffer {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("Buffer")
            .field("len", &self.len())
            .field("capacity", &self.data.capacity())
            .finish()
    }
}

impl Drop for Buffer {
    fn drop(&mut self) {
        if let Some(pool) = self.pool.take() {
            pool.restore(mem::take(&mut self.data));
        }
    }
}

const POOL_MAX_BUFFERS: usize = 64;

/// A shared pool of byte buffers.
///
/// Sessions check a [`Buffer`] out on accept and the storage finds its
/// way back when the buffer drops, bounding allocation churn under
/// connection turnover.
#[derive(Clone, Debug, Default)]
pub struct BufferPool(Arc<Mutex<Vec<Vec<u8>>>>);

impl BufferPool {
    /// construct an empty pool
    pub fn new() -> Self {
        Self::default()
    }

    /// Rent a buffer, reusing pooled storage when available.
    pub fn check_out(&self, initial_capacity: usize) -> Buffer {
        let data = self
            .0
            .lock()
            .ok()
            .and_then(|mut pool| pool.pop())
            .unwrap_or_else(|| Vec::with_capacity(initial_capacity));

        Buffer {
            offset: 0,
            filled: 0,
            data,
            pool: Some(self.clone()),
        }
    }

    fn restore(&self, mut data: Vec<u8>) {
        if let Ok(mut pool) = self.0.lock() {
            if pool.len() < POOL_MAX_BUFFERS {
                data.clear();
                pool.push(data);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extend_consume_compact() {
        let mut buffer = Buffer::new();
        buffer.extend_from_slice(b"hello world");
        assert_eq!(&buffer[..], b"hello world");
        buffer.ignore_front(6);
        assert_eq!(&buffer[..], b"world");
        buffer.ignore_front(5);
        assert!(buffer.is_empty());
        buffer.extend_from_slice(b"again");
        assert_eq!(&buffer[..], b"again");
    }

    #[test]
    fn spare_room_respects_ceiling() {
        let mut buffer = Buffer::new();
        let spare = buffer.spare_mut(8, 16).unwrap();
        spare[..8].copy_from_slice(b"01234567");
        buffer.commit(8);
        let spare = buffer.spare_mut(8, 16).unwrap();
        spare[..8].copy_from_slice(b"89abcdef");
        buffer.commit(8);
        assert!(buffer.spare_mut(1, 16).is_none());
        assert_eq!(buffer.len(), 16);
    }

    #[test]
    fn pool_reuses_storage() {
        let pool = BufferPool::new();
        let mut buffer = pool.check_out(32);
        buffer.extend_from_slice(b"data");
        let capacity = {
            let Buffer { ref data, .. } = buffer;
            data.capacity()
        };
        drop(buffer);
        let reused = pool.check_out(32);
        assert!(reused.is_empty());
        assert!(reused.data.capacity() >= capacity.min(4));
    }
}
