// Placement strategy: decides which page a new record of a given size
// should land on. Pluggable and notification-driven, rather than one the
// manager queries for its internal state.

use std::collections::BTreeMap;

use crate::container::PageId;
use crate::record::page_info::PageInformation;

pub trait PlacementStrategy {
    // Called once, after the pages map has been loaded from persisted
    // state (or is empty, on a fresh store), so a stateful strategy can
    // rebuild whatever index it needs.
    fn init(&mut self, pages: &BTreeMap<PageId, PageInformation>);

    // Picks a page with enough room for a record_size-byte record, or
    // None if every existing page is full.
    fn page_for_record(
        &mut self,
        pages: &BTreeMap<PageId, PageInformation>,
        page_size: usize,
        record_size: usize,
    ) -> Option<PageId>;

    fn page_inserted(&mut self, page_id: PageId, pages: &BTreeMap<PageId, PageInformation>);

    fn page_removed(&mut self, page_id: PageId, pages: &BTreeMap<PageId, PageInformation>);

    fn record_updated(&mut self, page_id: PageId, pages: &BTreeMap<PageId, PageInformation>);
}

// First-fit scan over pages in ascending PageId order. Stateless, so the
// lifecycle notifications are no-ops.
#[derive(Default)]
pub struct FirstFitStrategy;

impl PlacementStrategy for FirstFitStrategy {
    fn init(&mut self, _pages: &BTreeMap<PageId, PageInformation>) {}

    fn page_for_record(
        &mut self,
        pages: &BTreeMap<PageId, PageInformation>,
        page_size: usize,
        record_size: usize,
    ) -> Option<PageId> {
        pages
            .iter()
            .find(|(_, info)| info.bytes_free_after_possible_reservation(page_size, record_size) >= 0)
            .map(|(id, _)| *id)
    }

    fn page_inserted(&mut self, _page_id: PageId, _pages: &BTreeMap<PageId, PageInformation>) {}

    fn page_removed(&mut self, _page_id: PageId, _pages: &BTreeMap<PageId, PageInformation>) {}

    fn record_updated(&mut self, _page_id: PageId, _pages: &BTreeMap<PageId, PageInformation>) {}
}
