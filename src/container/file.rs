// File-backed BlockContainer: one file, blocks addressed by id * stride,
// an 8-byte checksum prefix validated on read.

use std::cell::RefCell;
use std::collections::hash_map::DefaultHasher;
use std::fs::{File, OpenOptions};
use std::hash::{Hash, Hasher};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::Path;

use crate::container::{BlockContainer, PageId};
use crate::error::{Error, Result};

const CHECKSUM_SIZE: usize = 8;

// block_size() reports the usable payload size; on-disk stride is
// block_size + CHECKSUM_SIZE. The file handle sits behind a RefCell so
// get() can keep &self while still seeking through a shared handle.
pub struct FileBlockContainer {
    file: RefCell<File>,
    block_size: usize,
    next_id: PageId,
    free_ids: Vec<PageId>,
    live: Vec<bool>,
}

impl FileBlockContainer {
    pub fn open<P: AsRef<Path>>(path: P, block_size: usize) -> Result<Self> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .open(path)?;
        Ok(FileBlockContainer {
            file: RefCell::new(file),
            block_size,
            next_id: 0,
            free_ids: Vec::new(),
            live: Vec::new(),
        })
    }

    fn stride(&self) -> usize {
        self.block_size + CHECKSUM_SIZE
    }

    fn offset(&self, id: PageId) -> u64 {
        id as u64 * self.stride() as u64
    }

    fn write_at(&self, id: PageId, block: &[u8]) -> Result<()> {
        let mut buf = vec![0u8; self.stride()];
        buf[CHECKSUM_SIZE..].copy_from_slice(block);
        let checksum = compute_checksum(&buf[CHECKSUM_SIZE..]);
        buf[0..CHECKSUM_SIZE].copy_from_slice(&checksum.to_le_bytes());
        let mut file = self.file.borrow_mut();
        file.seek(SeekFrom::Start(self.offset(id)))?;
        write_all_counted(&mut file, &buf)?;
        file.sync_data()?;
        Ok(())
    }

    fn read_at(&self, id: PageId) -> Result<Vec<u8>> {
        let mut buf = vec![0u8; self.stride()];
        let mut file = self.file.borrow_mut();
        file.seek(SeekFrom::Start(self.offset(id)))?;
        read_all_counted(&mut file, &mut buf)?;
        drop(file);
        let stored = u64::from_le_bytes(buf[0..CHECKSUM_SIZE].try_into().unwrap());
        let actual = compute_checksum(&buf[CHECKSUM_SIZE..]);
        if stored != actual {
            return Err(Error::InvariantViolation(format!(
                "block {} failed checksum validation",
                id
            )));
        }
        Ok(buf[CHECKSUM_SIZE..].to_vec())
    }

    fn check_live(&self, id: PageId) -> Result<()> {
        if !self.live.get(id as usize).copied().unwrap_or(false) {
            return Err(Error::NotFound("block id"));
        }
        Ok(())
    }
}

impl BlockContainer for FileBlockContainer {
    fn insert(&mut self, block: &[u8]) -> Result<PageId> {
        if block.len() != self.block_size {
            return Err(Error::SizeExceeded(format!(
                "block length {} does not match container block_size {}",
                block.len(),
                self.block_size
            )));
        }
        let id = match self.free_ids.pop() {
            Some(id) => id,
            None => {
                let id = self.next_id;
                self.next_id += 1;
                self.live.push(false);
                id
            }
        };
        self.write_at(id, block)?;
        self.live[id as usize] = true;
        Ok(id)
    }

    fn get(&self, id: PageId) -> Result<Vec<u8>> {
        self.check_live(id)?;
        self.read_at(id)
    }

    fn update(&mut self, id: PageId, block: &[u8]) -> Result<()> {
        self.check_live(id)?;
        if block.len() != self.block_size {
            return Err(Error::SizeExceeded(format!(
                "block length {} does not match container block_size {}",
                block.len(),
                self.block_size
            )));
        }
        self.write_at(id, block)
    }

    fn remove(&mut self, id: PageId) -> Result<()> {
        self.check_live(id)?;
        self.live[id as usize] = false;
        self.free_ids.push(id);
        Ok(())
    }

    fn clear(&mut self) {
        self.live.iter_mut().for_each(|v| *v = false);
        self.free_ids.clear();
        self.next_id = 0;
    }

    fn block_size(&self) -> usize {
        self.block_size
    }
}

fn compute_checksum(data: &[u8]) -> u64 {
    let mut hasher = DefaultHasher::new();
    data.hash(&mut hasher);
    hasher.finish()
}

fn write_all_counted(file: &mut File, data: &[u8]) -> Result<()> {
    let mut pos = 0;
    while pos < data.len() {
        let n = file.write(&data[pos..])?;
        if n == 0 {
            return Err(Error::IoFailure(std::io::Error::new(
                std::io::ErrorKind::WriteZero,
                "wrote 0 bytes",
            )));
        }
        pos += n;
    }
    Ok(())
}

fn read_all_counted(file: &mut File, data: &mut [u8]) -> Result<()> {
    let mut pos = 0;
    while pos < data.len() {
        let n = file.read(&mut data[pos..])?;
        if n == 0 {
            return Err(Error::IoFailure(std::io::Error::new(
                std::io::ErrorKind::UnexpectedEof,
                "read 0 bytes",
            )));
        }
        pos += n;
    }
    Ok(())
}
