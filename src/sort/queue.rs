// Run queues plus the pluggable factory that builds one. Buffer sizes are
// passed as closures so a factory queries them at open() time rather than
// construction time.

use std::cmp::Ordering;
use std::collections::{BinaryHeap, VecDeque};

use crate::container::{BlockContainer, PageId};
use crate::error::Result;

pub trait RunQueue<T> {
    fn open(&mut self) -> Result<()>;
    fn close(&mut self) -> Result<()>;
    fn enqueue(&mut self, value: T) -> Result<()>;
    fn dequeue(&mut self) -> Result<Option<T>>;
    fn size(&self) -> usize;
}

// `input_buffer_size`/`output_buffer_size` are queried at open() time, not
// construction time, so one factory instance can serve several phases.
pub trait QueueFactory<T> {
    fn create(
        &self,
        input_buffer_size: Box<dyn Fn() -> usize>,
        output_buffer_size: Box<dyn Fn() -> usize>,
    ) -> Box<dyn RunQueue<T>>;
}

pub trait ObjectCodec<T>: Clone {
    fn encoded_size(&self) -> usize;
    fn encode(&self, value: &T, buf: &mut [u8]);
    fn decode(&self, buf: &[u8]) -> T;
}

pub struct MemRunQueue<T> {
    items: VecDeque<T>,
}

impl<T> MemRunQueue<T> {
    pub fn new() -> Self {
        MemRunQueue { items: VecDeque::new() }
    }
}

impl<T> Default for MemRunQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> RunQueue<T> for MemRunQueue<T> {
    fn open(&mut self) -> Result<()> {
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        Ok(())
    }

    fn enqueue(&mut self, value: T) -> Result<()> {
        self.items.push_back(value);
        Ok(())
    }

    fn dequeue(&mut self) -> Result<Option<T>> {
        Ok(self.items.pop_front())
    }

    fn size(&self) -> usize {
        self.items.len()
    }
}

#[derive(Default)]
pub struct MemQueueFactory;

impl<T: 'static> QueueFactory<T> for MemQueueFactory {
    fn create(&self, _input: Box<dyn Fn() -> usize>, _output: Box<dyn Fn() -> usize>) -> Box<dyn RunQueue<T>> {
        Box::new(MemRunQueue::new())
    }
}

// Each block holds one encoded object; the buffer-size closures size the
// read-ahead/write-behind caches in object counts.
pub struct FileRunQueue<T, B, Codec> {
    container: B,
    codec: Codec,
    object_size: usize,
    input_buffer_size: Box<dyn Fn() -> usize>,
    output_buffer_size: Box<dyn Fn() -> usize>,
    write_cache_capacity: usize,
    read_cache_capacity: usize,
    order: VecDeque<PageId>,
    write_cache: VecDeque<T>,
    read_cache: VecDeque<T>,
}

impl<T, B, Codec> FileRunQueue<T, B, Codec>
where
    B: BlockContainer,
    Codec: ObjectCodec<T>,
{
    pub fn new(
        container: B,
        codec: Codec,
        input_buffer_size: Box<dyn Fn() -> usize>,
        output_buffer_size: Box<dyn Fn() -> usize>,
    ) -> Self {
        let object_size = codec.encoded_size();
        FileRunQueue {
            container,
            codec,
            object_size,
            input_buffer_size,
            output_buffer_size,
            write_cache_capacity: 1,
            read_cache_capacity: 1,
            order: VecDeque::new(),
            write_cache: VecDeque::new(),
            read_cache: VecDeque::new(),
        }
    }

    fn flush_write_cache(&mut self) -> Result<()> {
        let block_size = self.container.block_size();
        while let Some(value) = self.write_cache.pop_front() {
            let mut buf = vec![0u8; block_size];
            self.codec.encode(&value, &mut buf[..self.object_size]);
            let id = self.container.insert(&buf)?;
            self.order.push_back(id);
        }
        Ok(())
    }

    fn refill_read_cache(&mut self) -> Result<()> {
        for _ in 0..self.read_cache_capacity {
            match self.order.pop_front() {
                Some(id) => {
                    let buf = self.container.get(id)?;
                    self.container.remove(id)?;
                    self.read_cache.push_back(self.codec.decode(&buf[..self.object_size]));
                }
                None => break,
            }
        }
        Ok(())
    }
}

impl<T, B, Codec> RunQueue<T> for FileRunQueue<T, B, Codec>
where
    B: BlockContainer,
    Codec: ObjectCodec<T>,
{
    fn open(&mut self) -> Result<()> {
        self.write_cache_capacity = ((self.output_buffer_size)() / self.object_size.max(1)).max(1);
        self.read_cache_capacity = ((self.input_buffer_size)() / self.object_size.max(1)).max(1);
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        self.flush_write_cache()
    }

    fn enqueue(&mut self, value: T) -> Result<()> {
        self.write_cache.push_back(value);
        if self.write_cache.len() >= self.write_cache_capacity {
            self.flush_write_cache()?;
        }
        Ok(())
    }

    fn dequeue(&mut self) -> Result<Option<T>> {
        if self.read_cache.is_empty() {
            if !self.write_cache.is_empty() && self.order.is_empty() {
                self.flush_write_cache()?;
            }
            self.refill_read_cache()?;
        }
        if self.read_cache.is_empty() {
            return Ok(self.write_cache.pop_front());
        }
        Ok(self.read_cache.pop_front())
    }

    fn size(&self) -> usize {
        self.order.len() + self.write_cache.len() + self.read_cache.len()
    }
}

struct PrioritizedQueue<T> {
    size: usize,
    seq: u64,
    queue: Box<dyn RunQueue<T>>,
}

impl<T> PartialEq for PrioritizedQueue<T> {
    fn eq(&self, other: &Self) -> bool {
        self.size == other.size && self.seq == other.seq
    }
}

impl<T> Eq for PrioritizedQueue<T> {}

impl<T> PartialOrd for PrioritizedQueue<T> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<T> Ord for PrioritizedQueue<T> {
    // Reversed so `BinaryHeap` (a max-heap) pops the smallest queue first.
    fn cmp(&self, other: &Self) -> Ordering {
        other.size.cmp(&self.size).then_with(|| other.seq.cmp(&self.seq))
    }
}

// Ordered by size, smaller first — cascaded merges pop `k` runs at a time.
pub struct RunQueuePriority<T> {
    heap: BinaryHeap<PrioritizedQueue<T>>,
    next_seq: u64,
}

impl<T> RunQueuePriority<T> {
    pub fn new() -> Self {
        RunQueuePriority {
            heap: BinaryHeap::new(),
            next_seq: 0,
        }
    }

    pub fn push(&mut self, queue: Box<dyn RunQueue<T>>) {
        let size = queue.size();
        let seq = self.next_seq;
        self.next_seq += 1;
        self.heap.push(PrioritizedQueue { size, seq, queue });
    }

    pub fn pop(&mut self) -> Option<Box<dyn RunQueue<T>>> {
        self.heap.pop().map(|entry| entry.queue)
    }

    // Pops up to `k` smallest queues (fewer if the priority queue is shorter).
    pub fn pop_k(&mut self, k: usize) -> Vec<Box<dyn RunQueue<T>>> {
        let mut out = Vec::with_capacity(k);
        for _ in 0..k {
            match self.pop() {
                Some(q) => out.push(q),
                None => break,
            }
        }
        out
    }

    pub fn len(&self) -> usize {
        self.heap.len()
    }

    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }

    // Drains every remaining queue, in arbitrary order.
    pub fn drain_all(&mut self) -> Vec<Box<dyn RunQueue<T>>> {
        self.heap.drain().map(|entry| entry.queue).collect()
    }
}

impl<T> Default for RunQueuePriority<T> {
    fn default() -> Self {
        Self::new()
    }
}
