// Slotted page layout:
//  | header | directory (grows down) | ... free ... | data (grows up) |
// Header (4 bytes): number_of_records: u16, bytes_used_by_records: u16.
// Directory entry (7 bytes): record_nr: i16, offset: u16, length: u16,
// is_link: u8 (0/1).
//
// In memory, entries live in a dense Vec in directory order; offsets are
// recomputed at write() time by packing from the tail of the page, so
// removing an entry compacts the data region on the next write.

use crate::error::{Error, Result};
use crate::reinterpret;

pub const HEADER_LEN: usize = 4;
pub const DIR_ENTRY_LEN: usize = 7;

pub fn size(num_records: usize, bytes_used: usize) -> usize {
    HEADER_LEN + num_records * DIR_ENTRY_LEN + bytes_used
}

// Largest single record a page of page_size bytes can ever hold.
pub fn max_record_size(page_size: usize) -> usize {
    page_size.saturating_sub(size(1, 0))
}

#[derive(Clone, Copy, Debug)]
pub struct DirEntryMeta {
    pub record_nr: i16,
    pub length: usize,
    pub is_link: bool,
}

struct DirEntry {
    record_nr: i16,
    is_link: bool,
    data: Vec<u8>,
}

pub struct Page {
    page_size: usize,
    entries: Vec<DirEntry>,
}

impl Page {
    pub fn new(page_size: usize) -> Self {
        Page {
            page_size,
            entries: Vec::new(),
        }
    }

    pub fn page_size(&self) -> usize {
        self.page_size
    }

    pub fn number_of_records(&self) -> usize {
        self.entries.len()
    }

    pub fn number_of_link_records(&self) -> usize {
        self.entries.iter().filter(|e| e.is_link).count()
    }

    pub fn number_of_bytes_used_by_records(&self) -> usize {
        self.entries.iter().map(|e| e.data.len()).sum()
    }

    pub fn insert_record(&mut self, bytes: &[u8], record_nr: i16, is_link: bool) -> Result<()> {
        if self.entries.iter().any(|e| e.record_nr == record_nr) {
            return Err(Error::InvariantViolation(format!(
                "record number {} already present on page",
                record_nr
            )));
        }
        let new_count = self.entries.len() + 1;
        if new_count > i16::MAX as usize {
            return Err(Error::CapacityExceeded(
                "page record count would exceed i16::MAX".to_string(),
            ));
        }
        let new_bytes_used = self.number_of_bytes_used_by_records() + bytes.len();
        if size(new_count, new_bytes_used) > self.page_size {
            return Err(Error::SizeExceeded(format!(
                "record of {} bytes does not fit on page (page_size={})",
                bytes.len(),
                self.page_size
            )));
        }
        self.entries.push(DirEntry {
            record_nr,
            is_link,
            data: bytes.to_vec(),
        });
        Ok(())
    }

    pub fn remove(&mut self, record_nr: i16) -> Result<()> {
        let idx = self.find(record_nr)?;
        self.entries.remove(idx);
        Ok(())
    }

    // In-place replacement; bytes.len() must equal the current record's
    // length. A same-length is_link flip is permitted.
    pub fn update(&mut self, bytes: &[u8], record_nr: i16, is_link: bool) -> Result<()> {
        let idx = self.find(record_nr)?;
        if self.entries[idx].data.len() != bytes.len() {
            return Err(Error::SizeExceeded(format!(
                "in-place update requires matching length (old={}, new={})",
                self.entries[idx].data.len(),
                bytes.len()
            )));
        }
        self.entries[idx].data = bytes.to_vec();
        self.entries[idx].is_link = is_link;
        Ok(())
    }

    pub fn get_record(&self, record_nr: i16) -> Result<(&[u8], bool)> {
        let idx = self.find(record_nr)?;
        Ok((&self.entries[idx].data, self.entries[idx].is_link))
    }

    // min - 1 when min > 0, else max + 1.
    pub fn get_free_record_number(&self) -> i16 {
        match (
            self.entries.iter().map(|e| e.record_nr).min(),
            self.entries.iter().map(|e| e.record_nr).max(),
        ) {
            (Some(min), Some(max)) => {
                if min > 0 {
                    min - 1
                } else {
                    max + 1
                }
            }
            _ => 0,
        }
    }

    pub fn ids_without_link_records(&self) -> impl Iterator<Item = i16> + '_ {
        self.entries.iter().filter(|e| !e.is_link).map(|e| e.record_nr)
    }

    pub fn record_nr_bounds(&self) -> Option<(i16, i16)> {
        let min = self.entries.iter().map(|e| e.record_nr).min()?;
        let max = self.entries.iter().map(|e| e.record_nr).max()?;
        Some((min, max))
    }

    pub fn write(&self, buf: &mut [u8]) -> Result<()> {
        if buf.len() != self.page_size {
            return Err(Error::InvariantViolation(format!(
                "write buffer length {} does not match page_size {}",
                buf.len(),
                self.page_size
            )));
        }
        let num_records = self.entries.len();
        let bytes_used = self.number_of_bytes_used_by_records();
        if size(num_records, bytes_used) > self.page_size {
            return Err(Error::InvariantViolation(
                "page contents exceed page_size at write time".to_string(),
            ));
        }
        reinterpret::write_u16(&mut buf[0..2], num_records as u16);
        reinterpret::write_u16(&mut buf[2..4], bytes_used as u16);

        let mut data_cursor = self.page_size;
        for (i, entry) in self.entries.iter().enumerate() {
            data_cursor -= entry.data.len();
            let dir_off = HEADER_LEN + i * DIR_ENTRY_LEN;
            reinterpret::write_i16(&mut buf[dir_off..dir_off + 2], entry.record_nr);
            reinterpret::write_u16(&mut buf[dir_off + 2..dir_off + 4], data_cursor as u16);
            reinterpret::write_u16(&mut buf[dir_off + 4..dir_off + 6], entry.data.len() as u16);
            buf[dir_off + 6] = entry.is_link as u8;
            buf[data_cursor..data_cursor + entry.data.len()].copy_from_slice(&entry.data);
        }
        Ok(())
    }

    pub fn read(buf: &[u8], page_size: usize) -> Result<Page> {
        if buf.len() != page_size {
            return Err(Error::InvariantViolation(format!(
                "read buffer length {} does not match page_size {}",
                buf.len(),
                page_size
            )));
        }
        let num_records = reinterpret::read_u16(&buf[0..2]) as usize;
        let mut entries = Vec::with_capacity(num_records);
        for i in 0..num_records {
            let dir_off = HEADER_LEN + i * DIR_ENTRY_LEN;
            let record_nr = reinterpret::read_i16(&buf[dir_off..dir_off + 2]);
            let offset = reinterpret::read_u16(&buf[dir_off + 2..dir_off + 4]) as usize;
            let length = reinterpret::read_u16(&buf[dir_off + 4..dir_off + 6]) as usize;
            let is_link = buf[dir_off + 6] != 0;
            entries.push(DirEntry {
                record_nr,
                is_link,
                data: buf[offset..offset + length].to_vec(),
            });
        }
        Ok(Page { page_size, entries })
    }

    // Header/directory only, no payload materialization.
    pub fn read_header(buf: &[u8]) -> Result<Vec<DirEntryMeta>> {
        let num_records = reinterpret::read_u16(&buf[0..2]) as usize;
        let mut out = Vec::with_capacity(num_records);
        for i in 0..num_records {
            let dir_off = HEADER_LEN + i * DIR_ENTRY_LEN;
            let record_nr = reinterpret::read_i16(&buf[dir_off..dir_off + 2]);
            let length = reinterpret::read_u16(&buf[dir_off + 4..dir_off + 6]) as usize;
            let is_link = buf[dir_off + 6] != 0;
            out.push(DirEntryMeta {
                record_nr,
                length,
                is_link,
            });
        }
        Ok(out)
    }

    fn find(&self, record_nr: i16) -> Result<usize> {
        self.entries
            .iter()
            .position(|e| e.record_nr == record_nr)
            .ok_or(Error::NotFound("record number"))
    }
}
