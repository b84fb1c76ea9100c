use super::StorageIo;
use fieldstore_core::Result;
use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::Path;

/// Mirrors the original's `io::OpenMode`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpenMode {
    Read,
    Write,
    ReadWrite,
}

/// [`StorageIo`] over a real file on disk.
///
/// Tracks position and length itself rather than querying the OS on every
/// call, since `StorageIo::pos`/`size` take `&self` but `File` only offers
/// `stream_position` through `&mut self`.
pub struct FileIo {
    file: File,
    pos: u64,
    len: u64,
}

impl FileIo {
    pub fn open(path: impl AsRef<Path>, mode: OpenMode) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let mut options = OpenOptions::new();
        match mode {
            OpenMode::Read => {
                options.read(true);
            }
            OpenMode::Write => {
                options.write(true).create(true).truncate(true);
            }
            OpenMode::ReadWrite => {
                options.read(true).write(true).create(true);
            }
        }

        let mut file = options.open(path)?;
        let len = file.metadata()?.len();
        let pos = file.stream_position()?;
        Ok(FileIo { file, pos, len })
    }
}

impl StorageIo for FileIo {
    fn read_exact(&mut self, buf: &mut [u8]) -> Result<()> {
        self.file.read_exact(buf)?;
        self.pos += buf.len() as u64;
        Ok(())
    }

    fn write_all(&mut self, buf: &[u8]) -> Result<()> {
        self.file.write_all(buf)?;
        self.pos += buf.len() as u64;
        self.len = self.len.max(self.pos);
        Ok(())
    }

    fn seek(&mut self, position: u64) -> Result<()> {
        self.file.seek(SeekFrom::Start(position))?;
        self.pos = position;
        Ok(())
    }

    fn seek_to_end(&mut self) -> Result<u64> {
        self.pos = self.file.seek(SeekFrom::End(0))?;
        Ok(self.pos)
    }

    fn pos(&self) -> u64 {
        self.pos
    }

    fn size(&self) -> u64 {
        self.len
    }

    fn flush(&mut self) -> Result<()> {
        self.file.flush()?;
        self.file.sync_data()?;
        Ok(())
    }

    fn clear(&mut self) -> Result<()> {
        self.file.set_len(0)?;
        self.file.seek(SeekFrom::Start(0))?;
        self.pos = 0;
        self.len = 0;
        Ok(())
    }
}
