// Flat Vec of slots plus a free list of reusable indices.

use crate::container::{BlockContainer, PageId};
use crate::error::{Error, Result};

pub struct MemBlockContainer {
    block_size: usize,
    slots: Vec<Option<Box<[u8]>>>,
    free_ids: Vec<PageId>,
}

impl MemBlockContainer {
    pub fn new(block_size: usize) -> Self {
        MemBlockContainer {
            block_size,
            slots: Vec::new(),
            free_ids: Vec::new(),
        }
    }
}

impl BlockContainer for MemBlockContainer {
    fn insert(&mut self, block: &[u8]) -> Result<PageId> {
        if block.len() != self.block_size {
            return Err(Error::SizeExceeded(format!(
                "block length {} does not match container block_size {}",
                block.len(),
                self.block_size
            )));
        }
        let boxed: Box<[u8]> = block.into();
        match self.free_ids.pop() {
            Some(id) => {
                self.slots[id as usize] = Some(boxed);
                Ok(id)
            }
            None => {
                self.slots.push(Some(boxed));
                Ok((self.slots.len() - 1) as PageId)
            }
        }
    }

    fn get(&self, id: PageId) -> Result<Vec<u8>> {
        self.slots
            .get(id as usize)
            .and_then(|slot| slot.as_ref())
            .map(|block| block.to_vec())
            .ok_or(Error::NotFound("block id"))
    }

    fn update(&mut self, id: PageId, block: &[u8]) -> Result<()> {
        if block.len() != self.block_size {
            return Err(Error::SizeExceeded(format!(
                "block length {} does not match container block_size {}",
                block.len(),
                self.block_size
            )));
        }
        match self.slots.get_mut(id as usize) {
            Some(slot @ Some(_)) => {
                *slot = Some(block.into());
                Ok(())
            }
            _ => Err(Error::NotFound("block id")),
        }
    }

    fn remove(&mut self, id: PageId) -> Result<()> {
        match self.slots.get_mut(id as usize) {
            Some(slot @ Some(_)) => {
                *slot = None;
                self.free_ids.push(id);
                Ok(())
            }
            _ => Err(Error::NotFound("block id")),
        }
    }

    fn clear(&mut self) {
        self.slots.clear();
        self.free_ids.clear();
    }

    fn block_size(&self) -> usize {
        self.block_size
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insert_get_update_remove() {
        let mut container = MemBlockContainer::new(16);
        let id = container.insert(&[1u8; 16]).unwrap();
        assert_eq!(vec![1u8; 16], container.get(id).unwrap());

        container.update(id, &[2u8; 16]).unwrap();
        assert_eq!(vec![2u8; 16], container.get(id).unwrap());

        container.remove(id).unwrap();
        assert!(container.get(id).is_err());
    }

    #[test]
    fn reuses_removed_ids() {
        let mut container = MemBlockContainer::new(8);
        let a = container.insert(&[0u8; 8]).unwrap();
        let _b = container.insert(&[0u8; 8]).unwrap();
        container.remove(a).unwrap();
        let c = container.insert(&[9u8; 8]).unwrap();
        assert_eq!(a, c);
    }

    #[test]
    fn wrong_size_rejected() {
        let mut container = MemBlockContainer::new(8);
        assert!(container.insert(&[0u8; 4]).is_err());
    }
}
