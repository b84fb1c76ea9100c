//! Storage IO adapters.
//!
//! [`StorageIo`] is the Rust trait standing in for the original's
//! `StorageIO<IOAdapter>` template: a small set of positioned read/write
//! primitives, plus default-provided helpers for every fixed-width scalar
//! and for length-prefixed strings, built on top of them. Three concrete
//! adapters implement it: [`FileIo`] over a real file, and
//! [`BoundedBufferIo`]/[`GrowableBufferIo`] over in-memory scratch buffers.

mod buffer;
mod file;

pub use buffer::{BoundedBufferIo, GrowableBufferIo};
pub use file::{FileIo, OpenMode};

use fieldstore_core::Result;

/// Positioned read/write access to a byte-addressable backing store.
pub trait StorageIo {
    fn read_exact(&mut self, buf: &mut [u8]) -> Result<()>;
    fn write_all(&mut self, buf: &[u8]) -> Result<()>;

    /// Sets the absolute position from the start of the store.
    fn seek(&mut self, position: u64) -> Result<()>;
    fn seek_to_end(&mut self) -> Result<u64>;

    fn pos(&self) -> u64;
    fn size(&self) -> u64;

    fn flush(&mut self) -> Result<()>;

    /// Truncates the store back to empty and resets the position.
    fn clear(&mut self) -> Result<()>;

    fn at_end(&self) -> bool {
        self.pos() == self.size()
    }

    fn read_u8(&mut self) -> Result<u8> {
        let mut b = [0u8; 1];
        self.read_exact(&mut b)?;
        Ok(b[0])
    }

    fn write_u8(&mut self, v: u8) -> Result<()> {
        self.write_all(&[v])
    }

    fn read_bool(&mut self) -> Result<bool> {
        Ok(self.read_u8()? != 0)
    }

    fn write_bool(&mut self, v: bool) -> Result<()> {
        self.write_u8(v as u8)
    }

    fn read_i8(&mut self) -> Result<i8> {
        Ok(self.read_u8()? as i8)
    }

    fn write_i8(&mut self, v: i8) -> Result<()> {
        self.write_u8(v as u8)
    }

    fn read_u16(&mut self) -> Result<u16> {
        let mut b = [0u8; 2];
        self.read_exact(&mut b)?;
        Ok(u16::from_le_bytes(b))
    }

    fn write_u16(&mut self, v: u16) -> Result<()> {
        self.write_all(&v.to_le_bytes())
    }

    fn read_i16(&mut self) -> Result<i16> {
        Ok(self.read_u16()? as i16)
    }

    fn write_i16(&mut self, v: i16) -> Result<()> {
        self.write_u16(v as u16)
    }

    fn read_u32(&mut self) -> Result<u32> {
        let mut b = [0u8; 4];
        self.read_exact(&mut b)?;
        Ok(u32::from_le_bytes(b))
    }

    fn write_u32(&mut self, v: u32) -> Result<()> {
        self.write_all(&v.to_le_bytes())
    }

    fn read_i32(&mut self) -> Result<i32> {
        Ok(self.read_u32()? as i32)
    }

    fn write_i32(&mut self, v: i32) -> Result<()> {
        self.write_u32(v as u32)
    }

    fn read_u64(&mut self) -> Result<u64> {
        let mut b = [0u8; 8];
        self.read_exact(&mut b)?;
        Ok(u64::from_le_bytes(b))
    }

    fn write_u64(&mut self, v: u64) -> Result<()> {
        self.write_all(&v.to_le_bytes())
    }

    fn read_i64(&mut self) -> Result<i64> {
        Ok(self.read_u64()? as i64)
    }

    fn write_i64(&mut self, v: i64) -> Result<()> {
        self.write_u64(v as u64)
    }

    fn read_f32(&mut self) -> Result<f32> {
        Ok(f32::from_bits(self.read_u32()?))
    }

    fn write_f32(&mut self, v: f32) -> Result<()> {
        self.write_u32(v.to_bits())
    }

    fn read_f64(&mut self) -> Result<f64> {
        Ok(f64::from_bits(self.read_u64()?))
    }

    fn write_f64(&mut self, v: f64) -> Result<()> {
        self.write_u64(v.to_bits())
    }

    /// Length-prefixed (u32) UTF-8 string.
    fn read_string(&mut self) -> Result<String> {
        let len = self.read_u32()? as usize;
        let mut buf = vec![0u8; len];
        self.read_exact(&mut buf)?;
        Ok(String::from_utf8_lossy(&buf).into_owned())
    }

    fn write_string(&mut self, v: &str) -> Result<()> {
        self.write_u32(v.len() as u32)?;
        self.write_all(v.as_bytes())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scalar_round_trips_through_a_growable_buffer() {
        let mut io = GrowableBufferIo::new();
        io.write_u32(42).unwrap();
        io.write_f64(3.5).unwrap();
        io.write_string("hello").unwrap();

        io.seek(0).unwrap();
        assert_eq!(io.read_u32().unwrap(), 42);
        assert_eq!(io.read_f64().unwrap(), 3.5);
        assert_eq!(io.read_string().unwrap(), "hello");
    }
}
