use super::StorageIo;
use fieldstore_core::{Error, Result};
use std::io;

/// Fixed-capacity buffer adapter, grounded on the original's
/// `StaticBufferAdapter<MaxSize>` — used for the WAL's 4096-byte block.
///
/// Writing past `capacity` is a logic error (the WAL never lets an entry
/// overflow a block; see `wal::Block::fits`), so it's reported as an I/O
/// error rather than silently growing.
pub struct BoundedBufferIo {
    data: Box<[u8]>,
    len: usize,
    pos: usize,
}

impl BoundedBufferIo {
    pub fn new(capacity: usize) -> Self {
        BoundedBufferIo {
            data: vec![0u8; capacity].into_boxed_slice(),
            len: 0,
            pos: 0,
        }
    }

    pub fn capacity(&self) -> usize {
        self.data.len()
    }

    pub fn remaining_capacity(&self) -> usize {
        self.capacity() - self.pos
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.data[..self.len]
    }

    /// The full backing slice, including any zero padding beyond `len`.
    pub fn full_slice(&self) -> &[u8] {
        &self.data
    }

    pub fn full_slice_mut(&mut self) -> &mut [u8] {
        &mut self.data
    }

    /// Zero-fills from the current length out to full capacity.
    pub fn zero_pad_to_capacity(&mut self) {
        for b in &mut self.data[self.len..] {
            *b = 0;
        }
        self.len = self.capacity();
    }
}

impl StorageIo for BoundedBufferIo {
    fn read_exact(&mut self, buf: &mut [u8]) -> Result<()> {
        if self.pos + buf.len() > self.len {
            return Err(Error::Io(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "read past end of bounded buffer",
            )));
        }
        buf.copy_from_slice(&self.data[self.pos..self.pos + buf.len()]);
        self.pos += buf.len();
        Ok(())
    }

    fn write_all(&mut self, buf: &[u8]) -> Result<()> {
        if self.pos + buf.len() > self.capacity() {
            return Err(Error::Io(io::Error::new(
                io::ErrorKind::WriteZero,
                "write exceeds bounded buffer capacity",
            )));
        }
        self.data[self.pos..self.pos + buf.len()].copy_from_slice(buf);
        self.pos += buf.len();
        self.len = self.len.max(self.pos);
        Ok(())
    }

    fn seek(&mut self, position: u64) -> Result<()> {
        let position = position as usize;
        if position > self.capacity() {
            return Err(Error::Io(io::Error::new(
                io::ErrorKind::InvalidInput,
                "seek past bounded buffer capacity",
            )));
        }
        self.pos = position;
        Ok(())
    }

    fn seek_to_end(&mut self) -> Result<u64> {
        self.pos = self.len;
        Ok(self.pos as u64)
    }

    fn pos(&self) -> u64 {
        self.pos as u64
    }

    fn size(&self) -> u64 {
        self.len as u64
    }

    fn flush(&mut self) -> Result<()> {
        Ok(())
    }

    fn clear(&mut self) -> Result<()> {
        self.len = 0;
        self.pos = 0;
        Ok(())
    }
}

/// Growable, `Vec<u8>`-backed adapter for scratch buffers whose final size
/// isn't known ahead of time (e.g. an operation payload before it's known
/// to fit in the current WAL block).
pub struct GrowableBufferIo {
    data: Vec<u8>,
    pos: usize,
}

impl GrowableBufferIo {
    pub fn new() -> Self {
        GrowableBufferIo {
            data: Vec::new(),
            pos: 0,
        }
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.data
    }

    pub fn into_vec(self) -> Vec<u8> {
        self.data
    }
}

impl Default for GrowableBufferIo {
    fn default() -> Self {
        Self::new()
    }
}

impl StorageIo for GrowableBufferIo {
    fn read_exact(&mut self, buf: &mut [u8]) -> Result<()> {
        if self.pos + buf.len() > self.data.len() {
            return Err(Error::Io(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "read past end of growable buffer",
            )));
        }
        buf.copy_from_slice(&self.data[self.pos..self.pos + buf.len()]);
        self.pos += buf.len();
        Ok(())
    }

    fn write_all(&mut self, buf: &[u8]) -> Result<()> {
        let end = self.pos + buf.len();
        if end > self.data.len() {
            self.data.resize(end, 0);
        }
        self.data[self.pos..end].copy_from_slice(buf);
        self.pos = end;
        Ok(())
    }

    fn seek(&mut self, position: u64) -> Result<()> {
        self.pos = position as usize;
        Ok(())
    }

    fn seek_to_end(&mut self) -> Result<u64> {
        self.pos = self.data.len();
        Ok(self.pos as u64)
    }

    fn pos(&self) -> u64 {
        self.pos as u64
    }

    fn size(&self) -> u64 {
        self.data.len() as u64
    }

    fn flush(&mut self) -> Result<()> {
        Ok(())
    }

    fn clear(&mut self) -> Result<()> {
        self.data.clear();
        self.pos = 0;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bounded_buffer_rejects_writes_past_capacity() {
        let mut io = BoundedBufferIo::new(4);
        assert!(io.write_all(&[1, 2, 3, 4]).is_ok());
        assert!(io.write_all(&[5]).is_err());
    }

    #[test]
    fn zero_pad_extends_len_to_capacity() {
        let mut io = BoundedBufferIo::new(8);
        io.write_all(&[1, 2, 3]).unwrap();
        io.zero_pad_to_capacity();
        assert_eq!(io.as_slice(), &[1, 2, 3, 0, 0, 0, 0, 0]);
    }

    #[test]
    fn growable_buffer_grows_on_write() {
        let mut io = GrowableBufferIo::new();
        io.write_all(&[1, 2, 3]).unwrap();
        assert_eq!(io.size(), 3);
        assert_eq!(io.as_slice(), &[1, 2, 3]);
    }
}
