// Buffer sizes are derived once, at construction, from object size, the two
// memory budgets and the four buffer ratios, all rounded up to block_size.

use std::cmp::Ordering;

use crate::error::{Error, Result};
use crate::sort::merger::KWayMerger;
use crate::sort::queue::{QueueFactory, RunQueue, RunQueuePriority};
use crate::sort::run_generator::{RunEvent, RunGenerator};

// Each ratio is expected in [0.0, 1.0].
#[derive(Clone, Copy, Debug)]
pub struct BufferRatios {
    pub first_output_buffer_ratio: f64,
    pub output_buffer_ratio: f64,
    pub input_buffer_ratio: f64,
    pub final_input_buffer_ratio: f64,
}

#[derive(Clone, Copy, Debug)]
pub struct DerivedSizes {
    pub first_output_buffer_size: usize,
    pub heap_size: usize,
    pub output_buffer_size: usize,
    pub input_buffer_size: usize,
    pub fan_in: usize,
    pub final_input_buffer_size: usize,
    pub final_fan_in: usize,
}

fn align_up(value: i64, block_size: usize) -> usize {
    let value = value.max(0);
    let block_size = block_size as i64;
    (((value + block_size - 1) / block_size) * block_size) as usize
}

impl DerivedSizes {
    pub fn compute(
        object_size: usize,
        mem_size: usize,
        final_mem_size: usize,
        block_size: usize,
        ratios: BufferRatios,
    ) -> Result<Self> {
        let (object_size, mem_size, final_mem_size, block_size) =
            (object_size as i64, mem_size as i64, final_mem_size as i64, block_size as i64);

        let first_output_buffer_size = align_up(
            ((mem_size - object_size - block_size) as f64 * ratios.first_output_buffer_ratio) as i64,
            block_size as usize,
        )
        .max(block_size as usize);

        let heap_size = ((mem_size - first_output_buffer_size as i64) / object_size.max(1)).max(0) as usize;

        let output_buffer_size = align_up(
            ((mem_size - block_size - 2 * (object_size + block_size)) as f64 * ratios.output_buffer_ratio)
                as i64,
            block_size as usize,
        );

        let input_buffer_size = align_up(
            (((mem_size - output_buffer_size as i64) / 2 - (object_size + block_size)) as f64
                * ratios.input_buffer_ratio) as i64,
            block_size as usize,
        );

        let fan_in = ((mem_size - output_buffer_size as i64)
            / (input_buffer_size as i64 + object_size).max(1))
        .max(0) as usize;

        let final_input_buffer_size = align_up(
            ((final_mem_size - object_size - block_size) as f64 * ratios.final_input_buffer_ratio) as i64,
            block_size as usize,
        );

        let final_fan_in =
            (final_mem_size / (final_input_buffer_size as i64 + object_size).max(1)).max(0) as usize;

        let sizes = DerivedSizes {
            first_output_buffer_size,
            heap_size,
            output_buffer_size,
            input_buffer_size,
            fan_in,
            final_input_buffer_size,
            final_fan_in,
        };

        if sizes.heap_size == 0 {
            return Err(Error::SizeExceeded(
                "mem_size too small to hold even a single-record replacement-selection heap".to_string(),
            ));
        }
        if sizes.fan_in < 2 {
            return Err(Error::SizeExceeded(
                "mem_size too small to support a k-way merge fan-in of at least 2".to_string(),
            ));
        }
        if sizes.final_fan_in == 0 {
            return Err(Error::SizeExceeded(
                "final_mem_size too small to support the online final merge".to_string(),
            ));
        }
        Ok(sizes)
    }
}

pub struct MergeSorter<T, C>
where
    C: Fn(&T, &T) -> Ordering + Clone,
{
    queue_factory: Box<dyn QueueFactory<T>>,
    cmp: C,
    sizes: DerivedSizes,
    final_merger: Option<KWayMerger<T, C>>,
    peeked: Option<T>,
}

impl<T: 'static, C> MergeSorter<T, C>
where
    C: Fn(&T, &T) -> Ordering + Clone,
{
    pub fn new(
        queue_factory: Box<dyn QueueFactory<T>>,
        cmp: C,
        object_size: usize,
        mem_size: usize,
        final_mem_size: usize,
        block_size: usize,
        ratios: BufferRatios,
    ) -> Result<Self> {
        let sizes = DerivedSizes::compute(object_size, mem_size, final_mem_size, block_size, ratios)?;
        Ok(MergeSorter {
            queue_factory,
            cmp,
            sizes,
            final_merger: None,
            peeked: None,
        })
    }

    pub fn derived_sizes(&self) -> DerivedSizes {
        self.sizes
    }

    // Builds the initial sorted runs via replacement-selection, then drives
    // the cascaded intermediate merges down to at most final_fan_in queues
    // and opens the online final merge over them.
    pub fn open<I: Iterator<Item = T>>(&mut self, source: I) -> Result<()> {
        let mut queues = self.build_initial_runs(source)?;
        let initial_run_count = queues.len();
        self.cascade(&mut queues, initial_run_count)?;

        let remaining = queues.drain_all();
        self.final_merger = Some(KWayMerger::new(remaining, self.cmp.clone())?);
        self.peeked = None;
        self.advance()?;
        Ok(())
    }

    fn build_initial_runs(&self, source: impl Iterator<Item = T>) -> Result<RunQueuePriority<T>> {
        let mut priority = RunQueuePriority::new();
        let mut generator = RunGenerator::new(source, self.sizes.heap_size, self.cmp.clone());
        let input_size = self.sizes.input_buffer_size;
        let first_output_size = self.sizes.first_output_buffer_size;
        let mut current = self
            .queue_factory
            .create(Box::new(move || input_size), Box::new(move || first_output_size));
        current.open()?;
        let mut has_run = false;
        loop {
            match generator.next() {
                Some(RunEvent::Record(value)) => {
                    current.enqueue(value)?;
                    has_run = true;
                }
                Some(RunEvent::EndOfRun) => {
                    current.close()?;
                    priority.push(current);
                    current = self
                        .queue_factory
                        .create(Box::new(move || input_size), Box::new(move || first_output_size));
                    current.open()?;
                    has_run = false;
                }
                None => {
                    if has_run {
                        current.close()?;
                        priority.push(current);
                    }
                    break;
                }
            }
        }
        Ok(priority)
    }

    // Repeatedly pops the k smallest queues and K-way-merges them into a
    // new queue until at most final_fan_in queues remain.
    fn cascade(&self, queues: &mut RunQueuePriority<T>, initial_run_count: usize) -> Result<()> {
        if initial_run_count <= self.sizes.final_fan_in {
            return Ok(());
        }
        let fan_in = self.sizes.fan_in as i64;
        let n = initial_run_count as i64;
        let final_fan_in = self.sizes.final_fan_in as i64;
        let k0 = ((n - final_fan_in + fan_in - 2).rem_euclid(fan_in - 1)) + 2;

        let mut first = true;
        while queues.len() > self.sizes.final_fan_in {
            let k = if first { k0 as usize } else { self.sizes.fan_in };
            first = false;
            let k = k.min(queues.len()).max(2);

            let popped = queues.pop_k(k);
            let new_len = queues.len() + 1;
            let is_last = new_len <= self.sizes.final_fan_in;
            let input_size = if is_last {
                self.sizes.final_input_buffer_size
            } else {
                self.sizes.input_buffer_size
            };

            let mut merger = KWayMerger::new(popped, self.cmp.clone())?;
            let output_size = self.sizes.output_buffer_size;
            let mut merged = self
                .queue_factory
                .create(Box::new(move || input_size), Box::new(move || output_size));
            merged.open()?;
            while let Some(value) = merger.next()? {
                merged.enqueue(value)?;
            }
            merger.close()?;
            merged.close()?;
            queues.push(merged);
        }
        Ok(())
    }

    fn advance(&mut self) -> Result<()> {
        match &mut self.final_merger {
            Some(merger) => {
                self.peeked = merger.next()?;
                Ok(())
            }
            None => Err(Error::InvariantViolation("sorter has not been opened".to_string())),
        }
    }

    pub fn has_next(&self) -> bool {
        self.peeked.is_some()
    }

    pub fn peek(&self) -> Option<&T> {
        self.peeked.as_ref()
    }

    pub fn next(&mut self) -> Result<Option<T>> {
        let out = self.peeked.take();
        if out.is_some() {
            self.advance()?;
        }
        Ok(out)
    }

    pub fn close(&mut self) -> Result<()> {
        if let Some(merger) = &mut self.final_merger {
            merger.close()?;
        }
        self.final_merger = None;
        self.peeked = None;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sort::queue::MemQueueFactory;

    fn zero_ratios() -> BufferRatios {
        BufferRatios {
            first_output_buffer_ratio: 0.0,
            output_buffer_ratio: 0.0,
            input_buffer_ratio: 0.0,
            final_input_buffer_ratio: 0.0,
        }
    }

    fn new_sorter(object_size: usize, mem_size: usize, final_mem_size: usize) -> MergeSorter<i32, fn(&i32, &i32) -> Ordering> {
        MergeSorter::new(
            Box::new(MemQueueFactory),
            i32::cmp,
            object_size,
            mem_size,
            final_mem_size,
            16,
            zero_ratios(),
        )
        .unwrap()
    }

    #[test]
    fn sorts_a_small_shuffled_input() {
        let mut sorter = new_sorter(4, 16 * 8, 16 * 4);
        let input: Vec<i32> = vec![9, 2, 7, 1, 5, 3, 8, 4, 6, 0];
        sorter.open(input.clone().into_iter()).unwrap();

        let mut out = Vec::new();
        while let Some(v) = sorter.next().unwrap() {
            out.push(v);
        }
        let mut expected = input;
        expected.sort();
        assert_eq!(expected, out);
    }

    #[test]
    fn empty_input_yields_nothing() {
        let mut sorter = new_sorter(4, 16 * 8, 16 * 4);
        sorter.open(std::iter::empty()).unwrap();
        assert!(!sorter.has_next());
        assert_eq!(None, sorter.next().unwrap());
    }

    #[test]
    fn sort_is_stable_on_tied_keys() {
        let mut sorter: MergeSorter<(i32, char), fn(&(i32, char), &(i32, char)) -> Ordering> =
            MergeSorter::new(
                Box::new(MemQueueFactory),
                |a: &(i32, char), b: &(i32, char)| a.0.cmp(&b.0),
                8,
                16 * 8,
                16 * 4,
                16,
                zero_ratios(),
            )
            .unwrap();
        let input = vec![(1, 'a'), (2, 'b'), (1, 'c'), (2, 'd')];
        sorter.open(input.into_iter()).unwrap();
        let mut out = Vec::new();
        while let Some(v) = sorter.next().unwrap() {
            out.push(v);
        }
        assert_eq!(vec![(1, 'a'), (1, 'c'), (2, 'b'), (2, 'd')], out);
    }

    #[test]
    fn sorts_many_records_across_several_cascaded_merges() {
        // Small heap/fan-in forces multiple runs and multiple merge levels.
        let mut sorter = new_sorter(4, 16 * 4, 16 * 3);
        let input: Vec<i32> = (0..2000).map(|i| (i * 2654435761u32) as i32).collect();
        sorter.open(input.clone().into_iter()).unwrap();

        let mut out = Vec::new();
        while let Some(v) = sorter.next().unwrap() {
            out.push(v);
        }
        let mut expected = input;
        expected.sort();
        assert_eq!(expected.len(), out.len());
        assert_eq!(expected, out);
    }

    #[test]
    fn rejects_a_memory_budget_too_small_for_any_fan_in() {
        let err = DerivedSizes::compute(4, 16, 16, 16, zero_ratios());
        assert!(err.is_err());
    }
}
