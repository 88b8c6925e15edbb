// Composes a block container, a placement strategy, and a TID manager over
// the page layout into a get/insert/reserve/update/remove API over opaque
// byte records.

use std::collections::BTreeMap;
use std::io::{Read, Write};

use log::{debug, info, trace};

use crate::container::{BlockContainer, PageId};
use crate::error::{Error, Result};
use crate::record::page::{self, Page};
use crate::record::page_info::PageInformation;
use crate::record::placement::PlacementStrategy;
use crate::record::tid::{Tid, TID_WIRE_SIZE};
use crate::record::tid_manager::TidManager;

pub struct RecordManager<C, S, M>
where
    C: BlockContainer,
    S: PlacementStrategy,
    M: TidManager,
{
    container: C,
    page_size: usize,
    strategy: S,
    tid_manager: M,
    pages: BTreeMap<PageId, PageInformation>,
    number_of_direct_reserves: usize,
}

impl<C, S, M> RecordManager<C, S, M>
where
    C: BlockContainer,
    S: PlacementStrategy,
    M: TidManager,
{
    pub fn new(
        container: C,
        page_size: usize,
        mut strategy: S,
        tid_manager: M,
        number_of_direct_reserves: usize,
    ) -> Result<Self> {
        if page_size != container.block_size() {
            return Err(Error::InvariantViolation(format!(
                "page_size {} must match container block_size {}",
                page_size,
                container.block_size()
            )));
        }
        if page::max_record_size(page_size) == 0 {
            return Err(Error::SizeExceeded(format!(
                "page_size {} too small to hold a single record",
                page_size
            )));
        }
        let pages = BTreeMap::new();
        strategy.init(&pages);
        Ok(RecordManager {
            container,
            page_size,
            strategy,
            tid_manager,
            pages,
            number_of_direct_reserves,
        })
    }

    // Reopens a manager from a previously written pages-map blob.
    pub fn open(
        container: C,
        page_size: usize,
        mut strategy: S,
        tid_manager: M,
        number_of_direct_reserves: usize,
        mut source: impl Read,
    ) -> Result<Self> {
        let pages = read_pages_map(&mut source, number_of_direct_reserves)?;
        strategy.init(&pages);
        info!("record manager reopened with {} pages", pages.len());
        Ok(RecordManager {
            container,
            page_size,
            strategy,
            tid_manager,
            pages,
            number_of_direct_reserves,
        })
    }

    pub fn get(&mut self, id: M::Id) -> Result<Vec<u8>> {
        let tid = self.tid_manager.query(id)?;
        self.get_at(tid)
    }

    fn get_at(&mut self, tid: Tid) -> Result<Vec<u8>> {
        self.ensure_materialized(tid.page_id)?;
        let page = self.read_page(tid.page_id)?;
        let (bytes, is_link) = page.get_record(tid.record_nr)?;
        if !is_link {
            return Ok(bytes.to_vec());
        }
        let target = Tid::read_from(bytes);
        self.ensure_materialized(target.page_id)?;
        let target_page = self.read_page(target.page_id)?;
        let (target_bytes, target_is_link) = target_page.get_record(target.record_nr)?;
        if target_is_link {
            return Err(Error::LinkDepthExceeded(format!(
                "link target {} is itself a link",
                target
            )));
        }
        Ok(target_bytes.to_vec())
    }

    pub fn insert(&mut self, record: &[u8]) -> Result<M::Id> {
        self.validate_len(record.len())?;
        let tid = self.insert_raw(record)?;
        trace!("inserted record at {}", tid);
        self.tid_manager.insert(tid)
    }

    // Materializes producer()'s bytes once, then prefers an in-memory
    // reservation slot over touching the page immediately.
    pub fn reserve<F: FnOnce() -> Vec<u8>>(&mut self, producer: F) -> Result<M::Id> {
        let bytes = producer();
        self.validate_len(bytes.len())?;
        let tid = self.reserve_raw(bytes)?;
        trace!("reserved record at {}", tid);
        self.tid_manager.insert(tid)
    }

    pub fn update(&mut self, id: M::Id, record: &[u8]) -> Result<()> {
        self.validate_len(record.len())?;
        let new_len = record.len();
        let home_tid = self.tid_manager.query(id)?;
        self.ensure_materialized(home_tid.page_id)?;
        let mut home_page = self.read_page(home_tid.page_id)?;
        let (home_bytes, was_link) = home_page.get_record(home_tid.record_nr)?;

        if !was_link {
            let old_len = home_bytes.len();
            home_page.remove(home_tid.record_nr)?;

            if self.fits_in_place(home_tid.page_id, old_len, new_len) {
                home_page.insert_record(record, home_tid.record_nr, false)?;
                self.write_page(home_tid.page_id, &home_page)?;
                self.account_in_place_update(home_tid.page_id, &home_page, old_len, new_len)?;
                debug!("updated record {} in place", home_tid);
                return Ok(());
            }

            self.write_page(home_tid.page_id, &home_page)?;
            self.account_payload_removed(home_tid.page_id, &home_page, old_len)?;
            // The page cannot be empty yet: we are about to reinsert a
            // link or payload at `home_tid.record_nr` on this same page.
            self.relocate_and_relink(id, home_tid, &mut home_page, false, record)?;
            return Ok(());
        }

        let current_tid = Tid::read_from(home_bytes);
        self.ensure_materialized(current_tid.page_id)?;
        let mut current_page = self.read_page(current_tid.page_id)?;
        let (current_bytes, current_is_link) = current_page.get_record(current_tid.record_nr)?;
        if current_is_link {
            return Err(Error::LinkDepthExceeded(format!(
                "link target {} is itself a link",
                current_tid
            )));
        }
        let old_len = current_bytes.len();
        current_page.remove(current_tid.record_nr)?;

        if self.fits_in_place(current_tid.page_id, old_len, new_len) {
            current_page.insert_record(record, current_tid.record_nr, false)?;
            self.write_page(current_tid.page_id, &current_page)?;
            self.account_in_place_update(current_tid.page_id, &current_page, old_len, new_len)?;
            debug!("updated record {} (via link {}) in place", current_tid, home_tid);
            return Ok(());
        }

        self.write_page(current_tid.page_id, &current_page)?;
        self.account_payload_removed(current_tid.page_id, &current_page, old_len)?;
        self.reclaim_if_empty(current_tid.page_id)?;

        let home_pi = self.pages.get(&home_tid.page_id).unwrap();
        let fits_home_in_place = page::size(
            home_pi.number_of_records() + home_pi.number_of_link_records(),
            (home_pi.number_of_bytes_used_by_records() + new_len).saturating_sub(TID_WIRE_SIZE),
        ) <= self.page_size;
        if fits_home_in_place {
            home_page.remove(home_tid.record_nr)?;
            home_page.insert_record(record, home_tid.record_nr, false)?;
            self.write_page(home_tid.page_id, &home_page)?;
            let bounds = home_page.record_nr_bounds();
            let pi = self.pages.get_mut(&home_tid.page_id).unwrap();
            pi.update_counts(1, new_len as i64 - TID_WIRE_SIZE as i64, -1)?;
            pi.set_bounds_from(bounds);
            self.strategy.record_updated(home_tid.page_id, &self.pages);
            debug!("update {} replaced link with in-place payload", home_tid);
            return Ok(());
        }

        self.relocate_and_relink(id, home_tid, &mut home_page, true, record)?;
        Ok(())
    }

    fn fits_in_place(&self, page_id: PageId, old_len: usize, new_len: usize) -> bool {
        let pi = self.pages.get(&page_id).unwrap();
        let total_records = pi.number_of_records() + pi.number_of_link_records();
        let new_bytes_used = pi.number_of_bytes_used_by_records() as i64 + new_len as i64 - old_len as i64;
        new_bytes_used >= 0 && page::size(total_records, new_bytes_used as usize) <= self.page_size
    }

    fn account_in_place_update(&mut self, page_id: PageId, page: &Page, old_len: usize, new_len: usize) -> Result<()> {
        let bounds = page.record_nr_bounds();
        let pi = self.pages.get_mut(&page_id).unwrap();
        pi.update_counts(0, new_len as i64 - old_len as i64, 0)?;
        pi.set_bounds_from(bounds);
        self.strategy.record_updated(page_id, &self.pages);
        Ok(())
    }

    fn account_payload_removed(&mut self, page_id: PageId, page: &Page, old_len: usize) -> Result<()> {
        let bounds = page.record_nr_bounds();
        let pi = self.pages.get_mut(&page_id).unwrap();
        pi.update_counts(-1, -(old_len as i64), 0)?;
        pi.set_bounds_from(bounds);
        Ok(())
    }

    // Places record on a (possibly new) page and points home_tid at it,
    // either via a link record or by repointing the TID manager's table
    // when it doesn't use links. already_linked distinguishes rewriting an
    // existing link from inserting a fresh one.
    fn relocate_and_relink(
        &mut self,
        id: M::Id,
        home_tid: Tid,
        home_page: &mut Page,
        already_linked: bool,
        record: &[u8],
    ) -> Result<()> {
        let last_tid = self.insert_raw(record)?;
        if self.tid_manager.uses_links() {
            let mut link_bytes = [0u8; TID_WIRE_SIZE];
            last_tid.write_to(&mut link_bytes);
            if already_linked {
                home_page.update(&link_bytes, home_tid.record_nr, true)?;
                self.write_page(home_tid.page_id, home_page)?;
            } else {
                home_page.insert_record(&link_bytes, home_tid.record_nr, true)?;
                self.write_page(home_tid.page_id, home_page)?;
                let bounds = home_page.record_nr_bounds();
                let pi = self.pages.get_mut(&home_tid.page_id).unwrap();
                pi.update_counts(0, TID_WIRE_SIZE as i64, 1)?;
                pi.set_bounds_from(bounds);
                self.strategy.record_updated(home_tid.page_id, &self.pages);
            }
            debug!("update {} now links to {}", home_tid, last_tid);
        } else {
            self.tid_manager.update(id, last_tid)?;
            debug!("update {} repointed to {}", home_tid, last_tid);
        }
        Ok(())
    }


    pub fn remove(&mut self, id: M::Id) -> Result<()> {
        let home_tid = self.tid_manager.query(id)?;
        self.ensure_materialized(home_tid.page_id)?;
        let mut home_page = self.read_page(home_tid.page_id)?;
        let (home_bytes, is_link) = home_page.get_record(home_tid.record_nr)?;

        if is_link {
            let target = Tid::read_from(home_bytes);
            self.ensure_materialized(target.page_id)?;
            let mut target_page = self.read_page(target.page_id)?;
            let (_, target_is_link) = target_page.get_record(target.record_nr)?;
            if target_is_link {
                return Err(Error::LinkDepthExceeded(format!(
                    "link target {} is itself a link",
                    target
                )));
            }
            let removed_len = target_page.get_record(target.record_nr)?.0.len();
            target_page.remove(target.record_nr)?;
            self.write_page(target.page_id, &target_page)?;
            {
                let bounds = target_page.record_nr_bounds();
                let pi = self.pages.get_mut(&target.page_id).unwrap();
                pi.update_counts(-1, -(removed_len as i64), 0)?;
                pi.set_bounds_from(bounds);
            }
            self.reclaim_if_empty(target.page_id)?;

            home_page.remove(home_tid.record_nr)?;
            self.write_page(home_tid.page_id, &home_page)?;
            {
                let bounds = home_page.record_nr_bounds();
                let pi = self.pages.get_mut(&home_tid.page_id).unwrap();
                pi.update_counts(0, -(TID_WIRE_SIZE as i64), -1)?;
                pi.set_bounds_from(bounds);
            }
            self.reclaim_if_empty(home_tid.page_id)?;
        } else {
            let removed_len = home_bytes.len();
            home_page.remove(home_tid.record_nr)?;
            self.write_page(home_tid.page_id, &home_page)?;
            {
                let bounds = home_page.record_nr_bounds();
                let pi = self.pages.get_mut(&home_tid.page_id).unwrap();
                pi.update_counts(-1, -(removed_len as i64), 0)?;
                pi.set_bounds_from(bounds);
            }
            self.reclaim_if_empty(home_tid.page_id)?;
        }

        self.tid_manager.remove(id)?;
        trace!("removed record {}", home_tid);
        Ok(())
    }

    pub fn clear(&mut self) -> Result<()> {
        self.container.clear();
        self.pages.clear();
        self.tid_manager.remove_all();
        self.strategy.init(&self.pages);
        info!("record manager cleared");
        Ok(())
    }

    pub fn size(&self) -> usize {
        self.pages.values().map(|pi| pi.number_of_records()).sum()
    }

    pub fn size_of_all_stored_records(&self) -> usize {
        self.pages
            .values()
            .map(|pi| pi.number_of_bytes_used_by_records())
            .sum()
    }

    pub fn number_of_pages(&self) -> usize {
        self.pages.len()
    }

    pub fn space_usage(&self) -> f64 {
        let pages = self.number_of_pages();
        if pages == 0 {
            return 0.0;
        }
        self.size_of_all_stored_records() as f64 / (pages * self.page_size) as f64
    }

    // Re-reads every page's header and checks the accounting invariants
    // hold against the in-memory PageInformation. Outstanding reservations
    // are materialized first: PageInformation counts them immediately, so
    // the on-disk header would otherwise lag behind and look inconsistent.
    pub fn check_consistency(&mut self) -> Result<()> {
        self.flush_reservations()?;
        for (&page_id, pi) in &self.pages {
            let bytes = self.container.get(page_id)?;
            let entries = Page::read_header(&bytes)?;
            let records = entries.iter().filter(|e| !e.is_link).count();
            let links = entries.iter().filter(|e| e.is_link).count();
            let used: usize = entries.iter().map(|e| e.length).sum();

            if records != pi.number_of_records() || links != pi.number_of_link_records() {
                return Err(Error::InvariantViolation(format!(
                    "page {} record/link count mismatch: page=({}, {}) pi=({}, {})",
                    page_id,
                    records,
                    links,
                    pi.number_of_records(),
                    pi.number_of_link_records()
                )));
            }
            if used != pi.number_of_bytes_used_by_records() {
                return Err(Error::InvariantViolation(format!(
                    "page {} bytes-used mismatch: page={} pi={}",
                    page_id,
                    used,
                    pi.number_of_bytes_used_by_records()
                )));
            }
            if page::size(records + links, 0) > self.page_size {
                return Err(Error::InvariantViolation(format!(
                    "page {} directory overhead exceeds page_size", page_id
                )));
            }
        }
        Ok(())
    }

    // Any outstanding in-memory reservations are materialized onto their
    // pages first, since reservations themselves never round-trip.
    pub fn write(&mut self, mut sink: impl Write) -> Result<()> {
        self.flush_reservations()?;
        write_pages_map(&mut sink, &self.pages)
    }

    fn flush_reservations(&mut self) -> Result<()> {
        let page_ids: Vec<PageId> = self
            .pages
            .iter()
            .filter(|(_, pi)| pi.has_outstanding_reservations())
            .map(|(&id, _)| id)
            .collect();
        for page_id in page_ids {
            self.ensure_materialized(page_id)?;
        }
        Ok(())
    }

    fn validate_len(&self, len: usize) -> Result<()> {
        if len == 0 {
            return Err(Error::SizeExceeded("records must be at least 1 byte".to_string()));
        }
        let max = page::max_record_size(self.page_size);
        if len > max {
            return Err(Error::SizeExceeded(format!(
                "record of {} bytes exceeds max record size {}",
                len, max
            )));
        }
        Ok(())
    }

    fn read_page(&self, page_id: PageId) -> Result<Page> {
        let bytes = self.container.get(page_id)?;
        Page::read(&bytes, self.page_size)
    }

    fn write_page(&mut self, page_id: PageId, page: &Page) -> Result<()> {
        let mut buf = vec![0u8; self.page_size];
        page.write(&mut buf)?;
        self.container.update(page_id, &buf)
    }

    fn write_new_page(&mut self, page: &Page) -> Result<PageId> {
        let mut buf = vec![0u8; self.page_size];
        page.write(&mut buf)?;
        self.container.insert(&buf)
    }

    fn reclaim_if_empty(&mut self, page_id: PageId) -> Result<()> {
        let empty = self.pages.get(&page_id).map_or(false, PageInformation::is_empty);
        if empty {
            self.container.remove(page_id)?;
            self.pages.remove(&page_id);
            self.strategy.page_removed(page_id, &self.pages);
            debug!("reclaimed empty page {}", page_id);
        }
        Ok(())
    }

    // Writes any outstanding in-memory reservations for page_id onto the
    // on-disk page, per spec §4.2/§4.5: reservations materialize "on the
    // next read/write touching" the page. Every path that reads a page for
    // any purpose must call this first, or a record allocated into a
    // reservation slot and never otherwise written would be invisible to
    // that read despite its id being live.
    fn ensure_materialized(&mut self, page_id: PageId) -> Result<()> {
        let has_reservations = self
            .pages
            .get(&page_id)
            .map_or(false, PageInformation::has_outstanding_reservations);
        if !has_reservations {
            return Ok(());
        }
        let mut page = self.read_page(page_id)?;
        self.materialize_reservations(page_id, &mut page)?;
        self.write_page(page_id, &page)
    }

    fn materialize_reservations(&mut self, page_id: PageId, page: &mut Page) -> Result<()> {
        let has_reservations = self
            .pages
            .get(&page_id)
            .map_or(false, PageInformation::has_outstanding_reservations);
        if !has_reservations {
            return Ok(());
        }
        let reservations = self.pages.get_mut(&page_id).unwrap().drain_reservations();
        for reservation in reservations {
            page.insert_record(&reservation.bytes, reservation.record_nr, false)?;
        }
        Ok(())
    }

    fn insert_raw(&mut self, record: &[u8]) -> Result<Tid> {
        let len = record.len();
        match self.strategy.page_for_record(&self.pages, self.page_size, len) {
            Some(page_id) => {
                let mut page = self.read_page(page_id)?;
                self.materialize_reservations(page_id, &mut page)?;
                let record_nr = page.get_free_record_number();
                page.insert_record(record, record_nr, false)?;
                self.write_page(page_id, &page)?;
                let bounds = page.record_nr_bounds();
                let pi = self.pages.get_mut(&page_id).unwrap();
                pi.update_counts(1, len as i64, 0)?;
                pi.set_bounds_from(bounds);
                self.strategy.record_updated(page_id, &self.pages);
                Ok(Tid::new(page_id, record_nr))
            }
            None => {
                let mut page = Page::new(self.page_size);
                page.insert_record(record, 0, false)?;
                let page_id = self.write_new_page(&page)?;
                let mut pi = PageInformation::new(self.number_of_direct_reserves);
                pi.update_counts(1, len as i64, 0)?;
                pi.set_bounds_from(page.record_nr_bounds());
                self.pages.insert(page_id, pi);
                self.strategy.page_inserted(page_id, &self.pages);
                Ok(Tid::new(page_id, 0))
            }
        }
    }

    fn reserve_raw(&mut self, bytes: Vec<u8>) -> Result<Tid> {
        let len = bytes.len();
        let page_id = match self.strategy.page_for_record(&self.pages, self.page_size, len) {
            Some(page_id) => page_id,
            None => return self.insert_raw(&bytes),
        };
        let proposal = self.pages.get(&page_id).unwrap().propose_reservation_number();
        match proposal {
            Some((slot, record_nr)) => {
                let pi = self.pages.get_mut(&page_id).unwrap();
                pi.reserve(slot, record_nr, bytes)?;
                self.strategy.record_updated(page_id, &self.pages);
                Ok(Tid::new(page_id, record_nr))
            }
            None => {
                let mut page = self.read_page(page_id)?;
                self.materialize_reservations(page_id, &mut page)?;
                let record_nr = page.get_free_record_number();
                page.insert_record(&bytes, record_nr, false)?;
                self.write_page(page_id, &page)?;
                let bounds = page.record_nr_bounds();
                let pi = self.pages.get_mut(&page_id).unwrap();
                pi.update_counts(1, len as i64, 0)?;
                pi.set_bounds_from(bounds);
                self.strategy.record_updated(page_id, &self.pages);
                Ok(Tid::new(page_id, record_nr))
            }
        }
    }
}

// page id (4) + records (4) + link records (4) + bytes used (4) +
// min/max record number (2 each, big-endian like Tid's record number).
const PAGE_ENTRY_SIZE: usize = 4 + 4 + 4 + 4 + 2 + 2;

fn write_pages_map(sink: &mut impl Write, pages: &BTreeMap<PageId, PageInformation>) -> Result<()> {
    let mut buf = Vec::with_capacity(4 + pages.len() * PAGE_ENTRY_SIZE);
    buf.extend_from_slice(&(pages.len() as u32).to_le_bytes());
    for (&page_id, pi) in pages {
        buf.extend_from_slice(&page_id.to_le_bytes());
        buf.extend_from_slice(&(pi.number_of_records() as u32).to_le_bytes());
        buf.extend_from_slice(&(pi.number_of_link_records() as u32).to_le_bytes());
        buf.extend_from_slice(&(pi.number_of_bytes_used_by_records() as u32).to_le_bytes());
        buf.extend_from_slice(&pi.min_record_number().to_be_bytes());
        buf.extend_from_slice(&pi.max_record_number().to_be_bytes());
    }
    sink.write_all(&buf)?;
    Ok(())
}

// number_of_direct_reserves seeds each reconstructed PageInformation with a
// fresh, empty reservation slot array, since reservations are never
// persisted.
fn read_pages_map(
    source: &mut impl Read,
    number_of_direct_reserves: usize,
) -> Result<BTreeMap<PageId, PageInformation>> {
    let mut count_buf = [0u8; 4];
    source.read_exact(&mut count_buf)?;
    let count = u32::from_le_bytes(count_buf) as usize;

    let mut pages = BTreeMap::new();
    let mut entry_buf = [0u8; PAGE_ENTRY_SIZE];
    for _ in 0..count {
        source.read_exact(&mut entry_buf)?;
        let page_id = u32::from_le_bytes(entry_buf[0..4].try_into().unwrap());
        let number_of_records = u32::from_le_bytes(entry_buf[4..8].try_into().unwrap()) as usize;
        let number_of_link_records = u32::from_le_bytes(entry_buf[8..12].try_into().unwrap()) as usize;
        let number_of_bytes_used_by_records =
            u32::from_le_bytes(entry_buf[12..16].try_into().unwrap()) as usize;
        let min_record_number = i16::from_be_bytes(entry_buf[16..18].try_into().unwrap());
        let max_record_number = i16::from_be_bytes(entry_buf[18..20].try_into().unwrap());
        pages.insert(
            page_id,
            PageInformation::from_parts(
                number_of_direct_reserves,
                number_of_records,
                number_of_link_records,
                number_of_bytes_used_by_records,
                min_record_number,
                max_record_number,
            ),
        );
    }
    Ok(pages)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::container::MemBlockContainer;
    use crate::record::placement::FirstFitStrategy;
    use crate::record::tid_manager::{LinkTidManager, SyntheticTidManager};

    fn new_manager(
        block_size: usize,
    ) -> RecordManager<MemBlockContainer, FirstFitStrategy, LinkTidManager> {
        RecordManager::new(
            MemBlockContainer::new(block_size),
            block_size,
            FirstFitStrategy::default(),
            LinkTidManager::default(),
            2,
        )
        .unwrap()
    }

    #[test]
    fn insert_then_get_round_trips() {
        let mut mgr = new_manager(512);
        let id = mgr.insert(b"hello world").unwrap();
        assert_eq!(b"hello world".to_vec(), mgr.get(id).unwrap());
        assert_eq!(1, mgr.size());
    }

    #[test]
    fn update_that_outgrows_the_page_leaves_a_link() {
        let mut mgr = new_manager(128);
        let a = mgr.insert(&[1u8; 50]).unwrap();
        mgr.insert(&[2u8; 50]).unwrap();

        mgr.update(a, &[3u8; 100]).unwrap();
        assert_eq!(vec![3u8; 100], mgr.get(a).unwrap());
        assert_eq!(2, mgr.number_of_pages());
    }

    #[test]
    fn update_that_outgrows_the_page_rewrites_the_synthetic_table_instead_of_linking() {
        let mut mgr: RecordManager<MemBlockContainer, FirstFitStrategy, SyntheticTidManager> =
            RecordManager::new(
                MemBlockContainer::new(128),
                128,
                FirstFitStrategy::default(),
                SyntheticTidManager::new(),
                0,
            )
            .unwrap();
        let a = mgr.insert(&[1u8; 50]).unwrap();
        mgr.insert(&[2u8; 50]).unwrap();

        mgr.update(a, &[3u8; 100]).unwrap();
        assert_eq!(vec![3u8; 100], mgr.get(a).unwrap());
        assert_eq!(2, mgr.number_of_pages());
        // No link record anywhere: total stored bytes is exactly the two
        // payloads (50 + 100), not 156 (50 + a 6-byte link + 100).
        assert_eq!(150, mgr.size_of_all_stored_records());
        mgr.check_consistency().unwrap();
    }

    #[test]
    fn update_that_shrinks_back_after_a_link_replaces_it_in_place_at_home() {
        let mut mgr = new_manager(128);
        let a = mgr.insert(&[1u8; 20]).unwrap();
        let b = mgr.insert(&[2u8; 85]).unwrap();

        // Grow `a` past what fits alongside `b` on the home page: forces a
        // link out to a second page.
        mgr.update(a, &[3u8; 40]).unwrap();
        assert_eq!(2, mgr.number_of_pages());

        // A filler record large enough that home (still holding `b` plus
        // the link) has no room for it, so it lands on the same page as
        // the linked-out `a`, crowding it.
        let filler = mgr.insert(&[4u8; 50]).unwrap();
        assert_eq!(2, mgr.number_of_pages());

        // Freeing `b` leaves home holding nothing but the link, clearing
        // room there while the linked-to page stays crowded with `filler`.
        mgr.remove(b).unwrap();
        assert_eq!(2, mgr.number_of_pages());

        // Growing `a` again no longer fits at its linked-to location (the
        // filler crowds it out), but now fits directly back on the home
        // page in place of the link.
        mgr.update(a, &[5u8; 90]).unwrap();
        assert_eq!(vec![5u8; 90], mgr.get(a).unwrap());
        assert_eq!(vec![4u8; 50], mgr.get(filler).unwrap());
        assert_eq!(2, mgr.number_of_pages());
        mgr.check_consistency().unwrap();
    }

    #[test]
    fn remove_reclaims_an_emptied_page() {
        let mut mgr = new_manager(256);
        let id = mgr.insert(b"small").unwrap();
        assert_eq!(1, mgr.number_of_pages());
        mgr.remove(id).unwrap();
        assert_eq!(0, mgr.number_of_pages());
    }

    #[test]
    fn reservation_falls_back_once_slots_are_full() {
        // One direct-reserve slot: the first reserve() allocates a fresh
        // page directly (no page exists yet to reserve against), the
        // second fills the one reservation slot, and the third finds the
        // slot occupied and falls back to the on-page path.
        let mut mgr: RecordManager<MemBlockContainer, FirstFitStrategy, SyntheticTidManager> =
            RecordManager::new(
                MemBlockContainer::new(256),
                256,
                FirstFitStrategy::default(),
                SyntheticTidManager::new(),
                1,
            )
            .unwrap();

        let a = mgr.reserve(|| b"aaaa".to_vec()).unwrap();
        let b = mgr.reserve(|| b"bbbb".to_vec()).unwrap();
        let c = mgr.reserve(|| b"cccc".to_vec()).unwrap();

        assert_eq!(b"aaaa".to_vec(), mgr.get(a).unwrap());
        assert_eq!(b"bbbb".to_vec(), mgr.get(b).unwrap());
        assert_eq!(b"cccc".to_vec(), mgr.get(c).unwrap());
        assert_eq!(1, mgr.number_of_pages());
    }

    #[test]
    fn get_materializes_a_pending_reservation_before_reading() {
        // Two direct-reserve slots: the first reserve() allocates a fresh
        // page (no page exists yet), the second fills a reservation slot
        // in memory only. get() on that id must materialize it rather
        // than reading the on-disk page directory as-is.
        let mut mgr: RecordManager<MemBlockContainer, FirstFitStrategy, SyntheticTidManager> =
            RecordManager::new(
                MemBlockContainer::new(256),
                256,
                FirstFitStrategy::default(),
                SyntheticTidManager::new(),
                2,
            )
            .unwrap();

        mgr.reserve(|| b"first".to_vec()).unwrap();
        let b = mgr.reserve(|| b"second".to_vec()).unwrap();

        assert_eq!(b"second".to_vec(), mgr.get(b).unwrap());
        mgr.check_consistency().unwrap();
    }

    #[test]
    fn pages_map_round_trips_through_write_and_open() {
        let mut mgr = new_manager(256);
        mgr.insert(b"one").unwrap();
        mgr.insert(b"two").unwrap();

        let mut buf = Vec::new();
        mgr.write(&mut buf).unwrap();

        let reopened = RecordManager::open(
            MemBlockContainer::new(256),
            256,
            FirstFitStrategy::default(),
            LinkTidManager::default(),
            2,
            &buf[..],
        )
        .unwrap();
        assert_eq!(mgr.number_of_pages(), reopened.number_of_pages());
    }

    #[test]
    fn check_consistency_passes_after_a_mix_of_operations() {
        let mut mgr = new_manager(256);
        let a = mgr.insert(b"first").unwrap();
        mgr.insert(b"second").unwrap();
        mgr.update(a, b"first-updated").unwrap();
        mgr.check_consistency().unwrap();
    }
}
