// In-memory per-page accounting. The reservation slot array is kept purely
// in memory rather than serialized, since reservations are explicitly the
// not-yet-on-disk half of a page's state.

use crate::error::{Error, Result};
use crate::record::page;

#[derive(Clone, Debug)]
pub struct Reservation {
    pub record_nr: i16,
    pub bytes: Vec<u8>,
}

pub struct PageInformation {
    number_of_records: usize,
    number_of_link_records: usize,
    number_of_bytes_used_by_records: usize,
    min_record_number: i16,
    max_record_number: i16,
    reservations: Vec<Option<Reservation>>,
}

impl PageInformation {
    pub fn new(number_of_direct_reserves: usize) -> Self {
        PageInformation {
            number_of_records: 0,
            number_of_link_records: 0,
            number_of_bytes_used_by_records: 0,
            min_record_number: -1,
            max_record_number: -1,
            reservations: vec![None; number_of_direct_reserves],
        }
    }

    pub fn number_of_records(&self) -> usize {
        self.number_of_records
    }

    pub fn number_of_link_records(&self) -> usize {
        self.number_of_link_records
    }

    pub fn number_of_bytes_used_by_records(&self) -> usize {
        self.number_of_bytes_used_by_records
    }

    pub fn min_record_number(&self) -> i16 {
        self.min_record_number
    }

    pub fn max_record_number(&self) -> i16 {
        self.max_record_number
    }

    pub fn is_empty(&self) -> bool {
        self.number_of_records == 0 && self.number_of_link_records == 0
    }

    // Rebuilds committed accounting from persisted fields, with a fresh
    // (empty) reservation slot array — used when reloading a pages map.
    pub fn from_parts(
        number_of_direct_reserves: usize,
        number_of_records: usize,
        number_of_link_records: usize,
        number_of_bytes_used_by_records: usize,
        min_record_number: i16,
        max_record_number: i16,
    ) -> Self {
        PageInformation {
            number_of_records,
            number_of_link_records,
            number_of_bytes_used_by_records,
            min_record_number,
            max_record_number,
            reservations: vec![None; number_of_direct_reserves],
        }
    }

    // Bytes that would remain free if one more record of extra_bytes bytes
    // were added, given the current logical record count (including any
    // outstanding reservations). Negative means it would not fit.
    pub fn bytes_free_after_possible_reservation(&self, page_size: usize, extra_bytes: usize) -> i64 {
        let total_records = self.number_of_records + self.number_of_link_records + 1;
        let total_bytes = self.number_of_bytes_used_by_records + extra_bytes;
        page_size as i64 - page::size(total_records, total_bytes) as i64
    }

    // Net accounting update: delta_records/delta_bytes/delta_links are
    // applied directly to the running counters. Fails with
    // InvariantViolation if a delta would drive a counter negative.
    pub fn update_counts(&mut self, delta_records: i64, delta_bytes: i64, delta_links: i64) -> Result<()> {
        self.number_of_records = apply_delta(self.number_of_records, delta_records)?;
        self.number_of_bytes_used_by_records =
            apply_delta(self.number_of_bytes_used_by_records, delta_bytes)?;
        self.number_of_link_records = apply_delta(self.number_of_link_records, delta_links)?;
        Ok(())
    }

    // Recomputes min/max from the authoritative set of record numbers
    // currently live on the page (including links), plus any outstanding
    // reservations.
    pub fn set_bounds_from(&mut self, page_bounds: Option<(i16, i16)>) {
        let mut min = page_bounds.map(|(lo, _)| lo);
        let mut max = page_bounds.map(|(_, hi)| hi);
        for reservation in self.reservations.iter().flatten() {
            min = Some(min.map_or(reservation.record_nr, |m| m.min(reservation.record_nr)));
            max = Some(max.map_or(reservation.record_nr, |m| m.max(reservation.record_nr)));
        }
        self.min_record_number = min.unwrap_or(-1);
        self.max_record_number = max.unwrap_or(-1);
    }

    fn free_reservation_slot(&self) -> Option<usize> {
        self.reservations.iter().position(|slot| slot.is_none())
    }

    // min - 1 (when min > 0) or max + 1, whichever is available as a fresh
    // reservation slot. None if no reservation slot is free.
    pub fn propose_reservation_number(&self) -> Option<(usize, i16)> {
        let slot = self.free_reservation_slot()?;
        let candidate = if self.min_record_number > 0 {
            self.min_record_number - 1
        } else if self.max_record_number >= 0 {
            self.max_record_number + 1
        } else {
            0
        };
        Some((slot, candidate))
    }

    // Records a reservation in the given slot and updates counters. The
    // caller (record manager) has already verified record_nr is free.
    pub fn reserve(&mut self, slot: usize, record_nr: i16, bytes: Vec<u8>) -> Result<()> {
        let len = bytes.len();
        self.reservations[slot] = Some(Reservation { record_nr, bytes });
        self.update_counts(1, len as i64, 0)?;
        if self.min_record_number < 0 {
            self.min_record_number = record_nr;
            self.max_record_number = record_nr;
        } else {
            self.min_record_number = self.min_record_number.min(record_nr);
            self.max_record_number = self.max_record_number.max(record_nr);
        }
        Ok(())
    }

    // Drains all outstanding reservations so the caller can materialize
    // them into the on-disk page. Accounting is unaffected — it was
    // already updated at reservation time.
    pub fn drain_reservations(&mut self) -> Vec<Reservation> {
        let mut drained = Vec::new();
        for slot in self.reservations.iter_mut() {
            if let Some(reservation) = slot.take() {
                drained.push(reservation);
            }
        }
        drained
    }

    pub fn has_outstanding_reservations(&self) -> bool {
        self.reservations.iter().any(|slot| slot.is_some())
    }
}

fn apply_delta(value: usize, delta: i64) -> Result<usize> {
    let result = value as i64 + delta;
    if result < 0 {
        return Err(Error::InvariantViolation(format!(
            "accounting counter would go negative: {} + {} = {}",
            value, delta, result
        )));
    }
    Ok(result as usize)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reservation_fills_first_free_slot_then_falls_back() {
        let mut pi = PageInformation::new(2);
        assert_eq!(Some((0, 0)), pi.propose_reservation_number());
        pi.reserve(0, 0, vec![0u8; 10]).unwrap();
        assert_eq!(Some((1, 1)), pi.propose_reservation_number());
        pi.reserve(1, 1, vec![0u8; 20]).unwrap();
        // Both slots occupied now.
        assert_eq!(None, pi.propose_reservation_number());
        assert_eq!(2, pi.number_of_records());
        assert_eq!(30, pi.number_of_bytes_used_by_records());
    }

    #[test]
    fn drain_clears_slots_without_touching_counts() {
        let mut pi = PageInformation::new(1);
        pi.reserve(0, 5, vec![0u8; 40]).unwrap();
        let drained = pi.drain_reservations();
        assert_eq!(1, drained.len());
        assert_eq!(1, pi.number_of_records());
        assert!(pi.propose_reservation_number().is_some());
    }

    #[test]
    fn bounds_prefer_min_minus_one() {
        let mut pi = PageInformation::new(1);
        pi.set_bounds_from(Some((3, 7)));
        assert_eq!(Some((0, 2)), pi.propose_reservation_number());
    }
}
