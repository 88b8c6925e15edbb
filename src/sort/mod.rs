pub mod merger;
pub mod queue;
pub mod run_generator;
pub mod sorter;

pub use merger::KWayMerger;
pub use queue::{
    FileRunQueue, MemQueueFactory, MemRunQueue, ObjectCodec, QueueFactory, RunQueue, RunQueuePriority,
};
pub use run_generator::{RunEvent, RunGenerator};
pub use sorter::{BufferRatios, DerivedSizes, MergeSorter};
