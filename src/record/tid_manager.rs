// Maps an externally visible identifier to a record's current Tid, in one
// of two modes. A small, swappable policy object the manager drives.

use std::collections::HashMap;

use crate::error::{Error, Result};
use crate::record::tid::{Tid, TID_WIRE_SIZE};

pub trait TidManager {
    type Id: Copy + Eq + std::hash::Hash + std::fmt::Debug;

    fn insert(&mut self, tid: Tid) -> Result<Self::Id>;

    fn query(&self, id: Self::Id) -> Result<Tid>;

    fn update(&mut self, id: Self::Id, tid: Tid) -> Result<()>;

    fn remove(&mut self, id: Self::Id) -> Result<()>;

    fn remove_all(&mut self);

    // `None` when this mode cannot enumerate ids at all (the id space isn't
    // tracked anywhere but on the pages themselves); `Some` otherwise.
    fn ids(&self) -> Option<Vec<Self::Id>>;

    fn uses_links(&self) -> bool;

    fn id_size(&self) -> usize;

    fn close(&mut self) -> Result<()>;
}

// TID-as-id mode: the external id *is* the Tid, so ids stay stable across a
// record's lifetime by forwarding through link records rather than
// rewriting a table. Keeps no state of its own, so it cannot enumerate ids.
#[derive(Default)]
pub struct LinkTidManager;

impl TidManager for LinkTidManager {
    type Id = Tid;

    fn insert(&mut self, tid: Tid) -> Result<Self::Id> {
        Ok(tid)
    }

    fn query(&self, id: Self::Id) -> Result<Tid> {
        Ok(id)
    }

    fn update(&mut self, _id: Self::Id, _tid: Tid) -> Result<()> {
        // The id *is* the home TID; any physical move must be represented
        // as a link record on the page the id still names.
        Ok(())
    }

    fn remove(&mut self, _id: Self::Id) -> Result<()> {
        Ok(())
    }

    fn remove_all(&mut self) {}

    fn ids(&self) -> Option<Vec<Self::Id>> {
        None
    }

    fn uses_links(&self) -> bool {
        true
    }

    fn id_size(&self) -> usize {
        TID_WIRE_SIZE
    }

    fn close(&mut self) -> Result<()> {
        Ok(())
    }
}

// Synthetic-id mode: a dense u64 id maps to the record's current Tid
// through an explicit table; a move updates the table entry in place
// instead of leaving a link record behind, so no page ever holds a link.
#[derive(Default)]
pub struct SyntheticTidManager {
    next_id: u64,
    free_ids: Vec<u64>,
    table: HashMap<u64, Tid>,
}

impl SyntheticTidManager {
    pub fn new() -> Self {
        SyntheticTidManager {
            next_id: 0,
            free_ids: Vec::new(),
            table: HashMap::new(),
        }
    }

    // Rebuilds the table from persisted (id, tid) pairs (reload path).
    pub fn load(entries: Vec<(u64, Tid)>) -> Self {
        let next_id = entries.iter().map(|(id, _)| *id + 1).max().unwrap_or(0);
        let table = entries.into_iter().collect();
        SyntheticTidManager {
            next_id,
            free_ids: Vec::new(),
            table,
        }
    }

    pub fn entries(&self) -> Vec<(u64, Tid)> {
        let mut out: Vec<(u64, Tid)> = self.table.iter().map(|(id, tid)| (*id, *tid)).collect();
        out.sort_by_key(|(id, _)| *id);
        out
    }
}

impl TidManager for SyntheticTidManager {
    type Id = u64;

    fn insert(&mut self, tid: Tid) -> Result<Self::Id> {
        let id = match self.free_ids.pop() {
            Some(id) => id,
            None => {
                let id = self.next_id;
                self.next_id += 1;
                id
            }
        };
        self.table.insert(id, tid);
        Ok(id)
    }

    fn query(&self, id: Self::Id) -> Result<Tid> {
        self.table.get(&id).copied().ok_or(Error::NotFound("synthetic id"))
    }

    fn update(&mut self, id: Self::Id, tid: Tid) -> Result<()> {
        if !self.table.contains_key(&id) {
            return Err(Error::NotFound("synthetic id"));
        }
        self.table.insert(id, tid);
        Ok(())
    }

    fn remove(&mut self, id: Self::Id) -> Result<()> {
        if self.table.remove(&id).is_none() {
            return Err(Error::NotFound("synthetic id"));
        }
        self.free_ids.push(id);
        Ok(())
    }

    fn remove_all(&mut self) {
        self.table.clear();
        self.free_ids.clear();
        self.next_id = 0;
    }

    fn ids(&self) -> Option<Vec<Self::Id>> {
        Some(self.table.keys().copied().collect())
    }

    fn uses_links(&self) -> bool {
        false
    }

    fn id_size(&self) -> usize {
        std::mem::size_of::<u64>()
    }

    fn close(&mut self) -> Result<()> {
        Ok(())
    }
}
