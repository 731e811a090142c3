//! Sequential certificate numbering.
//!
//! Each (organization, counter key) pair owns a persisted counter row;
//! the key encodes certificate type, school, and year, so different
//! schools and years number independently. Increments happen only inside
//! an immediate transaction: a concurrent allocator against the same key
//! blocks until the first transaction commits or rolls back, so committed
//! values per key form a strictly increasing, gap-free sequence and a
//! rollback never consumes a value.

mod allocator;


pub use allocator::{CounterKey, NumberFormat, SequenceNumberAllocator, slug};

pub(crate) use allocator::next_value;
