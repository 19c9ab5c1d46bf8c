// Copyright (c) 2026 Hypermesh Foundation. All rights reserved.
// Licensed under the Business Source License 1.1.
// See the LICENSE file in the repository root for full license text.

//! Bucketed event log
//!
//! An append-only sequence of observations stored as a chain of
//! fixed-capacity buckets. No single allocation ever exceeds one bucket,
//! however many events a long run produces:
//!
//! ```text
//! [ b0: full ] -> [ b1: full ] -> ... -> [ bN: partial ]
//! ```
//!
//! The first bucket starts unallocated and grows geometrically up to the
//! bucket capacity, so cells that never see an event cost nothing. Every
//! later bucket is reserved at full capacity when it is opened.
//!
//! When growing the current bucket fails, the log opens one fresh bucket
//! and retries the value there. If that also fails the append returns
//! [`EventLogError::AllocationFailure`] carrying the bucket diagnostics.
//! A bucket sealed by that recovery path may be short; outside of it
//! every bucket but the last is full.

use crate::config::DEFAULT_BUCKET_CAPACITY;

/// Initial allocation of the first bucket, in values.
const FIRST_GROWTH: usize = 16;

// ---------------------------------------------------------------------------
// Allocation seam
// ---------------------------------------------------------------------------

/// The allocator refused to provide `requested` more slots.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("allocator refused {requested} additional event slots")]
pub struct AllocError {
    pub requested: usize,
}

/// Grows bucket storage without aborting the process on exhaustion.
pub trait SegmentAllocator {
    fn reserve(&self, bucket: &mut Vec<f64>, additional: usize) -> Result<(), AllocError>;
}

/// The global allocator, via `Vec::try_reserve_exact`.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemAllocator;

impl SegmentAllocator for SystemAllocator {
    fn reserve(&self, bucket: &mut Vec<f64>, additional: usize) -> Result<(), AllocError> {
        bucket
            .try_reserve_exact(additional)
            .map_err(|_| AllocError { requested: additional })
    }
}

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EventLogError {
    #[error(
        "out of memory after bucket retry: {buckets} bucket(s) allocated, \
         current bucket holds {fill} of {capacity} (reserved {reserved})"
    )]
    AllocationFailure {
        buckets: usize,
        fill: usize,
        capacity: usize,
        reserved: usize,
    },
}

// ---------------------------------------------------------------------------
// BucketedEventLog
// ---------------------------------------------------------------------------

/// Iterator over every stored value, oldest bucket first.
pub type Events<'a> = std::iter::Copied<std::iter::Flatten<std::slice::Iter<'a, Vec<f64>>>>;

/// Append-only chain of fixed-capacity buckets. Never empty of buckets.
#[derive(Debug, Clone)]
pub struct BucketedEventLog<A = SystemAllocator> {
    buckets: Vec<Vec<f64>>,
    capacity: usize,
    len: usize,
    alloc: A,
}

impl Default for BucketedEventLog {
    fn default() -> Self {
        Self::new()
    }
}

impl BucketedEventLog {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_BUCKET_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self::with_allocator(capacity, SystemAllocator)
    }
}

impl<A: SegmentAllocator> BucketedEventLog<A> {
    /// A capacity of zero is treated as one.
    pub fn with_allocator(capacity: usize, alloc: A) -> Self {
        Self {
            buckets: vec![Vec::new()],
            capacity: capacity.max(1),
            len: 0,
            alloc,
        }
    }

    /// Append one value to the newest bucket, opening a new bucket when
    /// the current one is at capacity.
    pub fn append(&mut self, value: f64) -> Result<(), EventLogError> {
        if self.make_room().is_err() && self.open_bucket().is_err() {
            return Err(self.allocation_failure());
        }
        if let Some(current) = self.buckets.last_mut() {
            current.push(value);
            self.len += 1;
        }
        Ok(())
    }

    /// Drop every bucket and return to the freshly constructed state.
    pub fn clear(&mut self) {
        self.buckets = vec![Vec::new()];
        self.len = 0;
    }

    /// Keep the first `len` values and drop the rest. Buckets that end up
    /// empty are released, except the first.
    pub fn truncate(&mut self, len: usize) {
        if len >= self.len {
            return;
        }
        let mut kept = 0;
        let mut last = 0;
        for (i, bucket) in self.buckets.iter().enumerate() {
            last = i;
            if kept + bucket.len() >= len {
                break;
            }
            kept += bucket.len();
        }
        self.buckets.truncate(last + 1);
        if let Some(bucket) = self.buckets.last_mut() {
            bucket.truncate(len - kept);
        }
        self.len = len;
    }

    /// All stored values in insertion order. Restartable.
    pub fn iter(&self) -> Events<'_> {
        self.buckets.iter().flatten().copied()
    }

    /// Stored buckets, oldest first.
    pub fn buckets(&self) -> impl Iterator<Item = &[f64]> + '_ {
        self.buckets.iter().map(Vec::as_slice)
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn bucket_count(&self) -> usize {
        self.buckets.len()
    }

    pub fn bucket_capacity(&self) -> usize {
        self.capacity
    }

    /// Ensure the newest bucket can take one more value.
    fn make_room(&mut self) -> Result<(), AllocError> {
        let capacity = self.capacity;
        if let Some(current) = self.buckets.last_mut() {
            if current.len() < current.capacity().min(capacity) {
                return Ok(());
            }
            if current.len() < capacity {
                let target = (current.capacity() * 2).clamp(FIRST_GROWTH.min(capacity), capacity);
                return self.alloc.reserve(current, target - current.len());
            }
        }
        self.open_bucket()
    }

    /// Start a new bucket reserved at full capacity. An empty newest
    /// bucket is replaced instead of being left behind in the chain.
    fn open_bucket(&mut self) -> Result<(), AllocError> {
        let mut bucket = Vec::new();
        self.alloc.reserve(&mut bucket, self.capacity)?;
        match self.buckets.last_mut() {
            Some(current) if current.is_empty() => *current = bucket,
            _ => {
                self.buckets
                    .try_reserve(1)
                    .map_err(|_| AllocError { requested: 1 })?;
                self.buckets.push(bucket);
            }
        }
        Ok(())
    }

    fn allocation_failure(&self) -> EventLogError {
        let (fill, reserved) = self
            .buckets
            .last()
            .map(|b| (b.len(), b.capacity()))
            .unwrap_or((0, 0));
        EventLogError::AllocationFailure {
            buckets: self.buckets.len(),
            fill,
            capacity: self.capacity,
            reserved,
        }
    }
}

impl<'a, A> IntoIterator for &'a BucketedEventLog<A> {
    type Item = f64;
    type IntoIter = Events<'a>;

    fn into_iter(self) -> Self::IntoIter {
        self.buckets.iter().flatten().copied()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
