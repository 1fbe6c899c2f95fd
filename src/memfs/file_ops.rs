/*!
 * File Operations
 * Read, write and seek over an in-memory file's bytes
 */

use std::io::{self, Read, Seek, SeekFrom, Write};

use super::handle::MemHandle;
use super::node::Content;
use crate::limits::MAX_MEMFS_FILE_SIZE;
use crate::traits::File;
use crate::types::*;

fn not_opened_for(action: &str) -> FsError {
    FsError::InvalidArgument {
        layer: Layer::MEMFS,
        message: format!("file not opened for {}", action),
    }
}

fn too_large() -> FsError {
    FsError::InvalidArgument {
        layer: Layer::MEMFS,
        message: format!("file size would exceed {} bytes", MAX_MEMFS_FILE_SIZE),
    }
}

impl MemHandle {
    /// Extend `data` to `new_len`, charging the cabinet capacity first
    ///
    /// Allocation failure is reported as OutOfSpace and leaves the capacity
    /// accounting untouched.
    fn grow(&self, data: &mut Vec<u8>, new_len: u64) -> FsResult<()> {
        if new_len > MAX_MEMFS_FILE_SIZE {
            return Err(too_large());
        }
        let additional = new_len - data.len() as u64;
        self.shared.reserve(additional)?;
        if data.try_reserve_exact(additional as usize).is_err() {
            self.shared.release(additional);
            return Err(FsError::OutOfSpace { layer: Layer::MEMFS });
        }
        data.resize(new_len as usize, 0);
        Ok(())
    }

    fn read_into(&mut self, buf: &mut [u8], offset: u64, advance: bool) -> FsResult<usize> {
        if !self.mode.read {
            return Err(not_opened_for("reading"));
        }
        let node = self.node()?.clone();
        let mut node = node.write();
        let Content::File(data) = &node.content else {
            return Err(not_opened_for("reading"));
        };

        let start = (offset as usize).min(data.len());
        let count = buf.len().min(data.len() - start);
        buf[..count].copy_from_slice(&data[start..start + count]);
        node.touch_accessed();
        if advance {
            self.pos = offset + count as u64;
        }
        Ok(count)
    }

    fn write_from(&mut self, buf: &[u8]) -> FsResult<usize> {
        if !self.mode.is_writable() {
            return Err(not_opened_for("writing"));
        }
        let node = self.node()?.clone();
        let mut node = node.write();
        let Content::File(data) = &mut node.content else {
            return Err(not_opened_for("writing"));
        };

        let start = if self.mode.append {
            data.len() as u64
        } else {
            self.pos
        };
        let end = start.checked_add(buf.len() as u64).ok_or_else(too_large)?;
        if end > data.len() as u64 {
            self.grow(data, end)?;
        }
        data[start as usize..end as usize].copy_from_slice(buf);
        node.touch_modified();
        self.pos = end;
        Ok(buf.len())
    }
}

impl Read for MemHandle {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let pos = self.pos;
        self.read_into(buf, pos, true).map_err(FsError::into_io)
    }
}

impl Write for MemHandle {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.write_from(buf).map_err(FsError::into_io)
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl Seek for MemHandle {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        let len = self.node().map_err(FsError::into_io)?.read().stored_bytes();
        let target = match pos {
            SeekFrom::Start(offset) => Some(offset),
            SeekFrom::End(delta) => len.checked_add_signed(delta),
            SeekFrom::Current(delta) => self.pos.checked_add_signed(delta),
        };
        match target {
            Some(target) => {
                self.pos = target;
                Ok(target)
            }
            None => Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "seek to a negative or overflowing position",
            )),
        }
    }
}

impl File for MemHandle {
    fn read_at(&mut self, buf: &mut [u8], offset: u64) -> FsResult<usize> {
        self.read_into(buf, offset, false)
    }

    fn set_len(&mut self, size: u64) -> FsResult<()> {
        if !self.mode.is_writable() {
            return Err(not_opened_for("writing"));
        }
        let node = self.node()?.clone();
        let mut node = node.write();
        let Content::File(data) = &mut node.content else {
            return Err(not_opened_for("writing"));
        };

        let current = data.len() as u64;
        if size > current {
            self.grow(data, size)?;
        } else {
            self.shared.release(current - size);
            data.truncate(size as usize);
        }
        node.touch_modified();
        Ok(())
    }

    fn sync(&mut self) -> FsResult<()> {
        self.node()?;
        Ok(())
    }
}
