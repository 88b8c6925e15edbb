// Tuple identifier: {page_id, record_nr}.

use std::fmt;

use crate::container::PageId;
use crate::reinterpret;

pub const TID_WIRE_SIZE: usize = 4 + 2;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Tid {
    pub page_id: PageId,
    pub record_nr: i16,
}

impl Tid {
    pub fn new(page_id: PageId, record_nr: i16) -> Self {
        Tid { page_id, record_nr }
    }

    pub fn write_to(&self, dst: &mut [u8]) {
        reinterpret::write_u32(dst, self.page_id);
        // Record number is big-endian; page id stays little-endian.
        dst[4..6].copy_from_slice(&self.record_nr.to_be_bytes());
    }

    pub fn read_from(src: &[u8]) -> Self {
        let page_id = reinterpret::read_u32(src);
        let record_nr = i16::from_be_bytes([src[4], src[5]]);
        Tid { page_id, record_nr }
    }
}

impl fmt::Display for Tid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Tid[page_id={}, record_nr={}]", self.page_id, self.record_nr)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_through_wire_format() {
        let tid = Tid::new(42, -7);
        let mut buf = [0u8; TID_WIRE_SIZE];
        tid.write_to(&mut buf);
        assert_eq!(tid, Tid::read_from(&buf));
    }

    #[test]
    fn display_matches_fields() {
        let tid = Tid::new(1, 2);
        assert_eq!("Tid[page_id=1, record_nr=2]", tid.to_string());
    }
}
