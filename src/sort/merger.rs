// K-way merger: binary min-heap over a fixed set of run queues, ties broken
// by lower source index.

use std::cmp::Ordering;

use crate::error::Result;
use crate::sort::queue::RunQueue;

struct HeapEntry<T> {
    value: T,
    source: usize,
}

pub struct KWayMerger<T, C>
where
    C: Fn(&T, &T) -> Ordering,
{
    sources: Vec<Box<dyn RunQueue<T>>>,
    heap: Vec<HeapEntry<T>>,
    cmp: C,
}

impl<T, C> KWayMerger<T, C>
where
    C: Fn(&T, &T) -> Ordering,
{
    pub fn new(sources: Vec<Box<dyn RunQueue<T>>>, cmp: C) -> Result<Self> {
        let mut merger = KWayMerger {
            sources,
            heap: Vec::new(),
            cmp,
        };
        for i in 0..merger.sources.len() {
            merger.refill(i)?;
        }
        Ok(merger)
    }

    fn less(&self, a: &HeapEntry<T>, b: &HeapEntry<T>) -> bool {
        match (self.cmp)(&a.value, &b.value) {
            Ordering::Equal => a.source < b.source,
            other => other == Ordering::Less,
        }
    }

    fn sift_up(&mut self, mut i: usize) {
        while i > 0 {
            let parent = (i - 1) / 2;
            if self.less(&self.heap[i], &self.heap[parent]) {
                self.heap.swap(i, parent);
                i = parent;
            } else {
                break;
            }
        }
    }

    fn sift_down(&mut self, mut i: usize) {
        let len = self.heap.len();
        loop {
            let (l, r) = (2 * i + 1, 2 * i + 2);
            let mut smallest = i;
            if l < len && self.less(&self.heap[l], &self.heap[smallest]) {
                smallest = l;
            }
            if r < len && self.less(&self.heap[r], &self.heap[smallest]) {
                smallest = r;
            }
            if smallest == i {
                break;
            }
            self.heap.swap(i, smallest);
            i = smallest;
        }
    }

    fn refill(&mut self, source: usize) -> Result<()> {
        if let Some(value) = self.sources[source].dequeue()? {
            self.heap.push(HeapEntry { value, source });
            let last = self.heap.len() - 1;
            self.sift_up(last);
        }
        Ok(())
    }

    pub fn next(&mut self) -> Result<Option<T>> {
        if self.heap.is_empty() {
            return Ok(None);
        }
        let last = self.heap.len() - 1;
        self.heap.swap(0, last);
        let popped = self.heap.pop().unwrap();
        if !self.heap.is_empty() {
            self.sift_down(0);
        }
        self.refill(popped.source)?;
        Ok(Some(popped.value))
    }

    pub fn close(&mut self) -> Result<()> {
        for source in &mut self.sources {
            source.close()?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sort::queue::MemRunQueue;

    fn queue_of(values: &[i32]) -> Box<dyn RunQueue<i32>> {
        let mut q = MemRunQueue::new();
        for &v in values {
            q.enqueue(v).unwrap();
        }
        Box::new(q)
    }

    #[test]
    fn merges_several_sorted_runs_in_order() {
        let sources = vec![queue_of(&[1, 4, 7]), queue_of(&[2, 3, 9]), queue_of(&[0, 5])];
        let mut merger = KWayMerger::new(sources, i32::cmp).unwrap();
        let mut out = Vec::new();
        while let Some(v) = merger.next().unwrap() {
            out.push(v);
        }
        assert_eq!(vec![0, 1, 2, 3, 4, 5, 7, 9], out);
    }

    #[test]
    fn ties_break_by_lower_source_index() {
        // Equal keys: source 0's entry must come out before source 1's.
        let sources = vec![queue_of(&[(1, 'a'), (2, 'b')]), queue_of(&[(1, 'c'), (2, 'd')])];
        let mut merger = KWayMerger::new(sources, |a: &(i32, char), b: &(i32, char)| a.0.cmp(&b.0)).unwrap();
        let mut out = Vec::new();
        while let Some(v) = merger.next().unwrap() {
            out.push(v);
        }
        assert_eq!(vec![(1, 'a'), (1, 'c'), (2, 'b'), (2, 'd')], out);
    }

    #[test]
    fn empty_sources_yield_nothing() {
        let sources: Vec<Box<dyn RunQueue<i32>>> = vec![queue_of(&[]), queue_of(&[])];
        let mut merger = KWayMerger::new(sources, i32::cmp).unwrap();
        assert_eq!(None, merger.next().unwrap());
    }
}
