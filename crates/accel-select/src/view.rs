//! Index-based views over a [`DeviceContextCollection`].
//!
//! A view is an ordered list of device indices. Filtering, sorting and
//! reversing produce new views without copying or moving device handles, and
//! never touch the collection they borrow.

use std::cmp::Ordering;
use std::fmt;
use std::ops::Index;

use crate::collection::DeviceContextCollection;
use crate::error::{Result, RuntimeOperation, SelectError};
use crate::runtime::ComputeRuntime;

/// The capability metric used to rank devices: the maximum number of
/// work-items schedulable in one work-group.
///
/// # Errors
///
/// Returns the runtime status annotated with [`RuntimeOperation::DeviceInfo`].
pub fn capability_metric<R: ComputeRuntime + ?Sized>(
    runtime: &R,
    device: R::Device,
) -> Result<usize> {
    runtime
        .device_max_work_group_size(device)
        .map_err(SelectError::runtime(RuntimeOperation::DeviceInfo))
}

/// Bottom-up merge sort with a fallible comparator.
///
/// Stable. The first comparator error aborts the sort and leaves `items` in
/// an unspecified order.
fn try_merge_sort<T, F>(items: &mut Vec<T>, mut compare: F) -> Result<()>
where
    T: Copy,
    F: FnMut(&T, &T) -> Result<Ordering>,
{
    let len = items.len();
    if len < 2 {
        return Ok(());
    }
    let mut merged: Vec<T> = Vec::new();
    merged.try_reserve_exact(len)?;

    let mut width = 1usize;
    while width < len {
        merged.clear();
        let mut start = 0;
        while start < len {
            let middle = start.saturating_add(width).min(len);
            let end = middle.saturating_add(width).min(len);
            let (mut left, mut right) = (start, middle);
            while left < middle && right < end {
                if compare(&items[right], &items[left])? == Ordering::Less {
                    merged.push(items[right]);
                    right += 1;
                } else {
                    merged.push(items[left]);
                    left += 1;
                }
            }
            merged.extend_from_slice(&items[left..middle]);
            merged.extend_from_slice(&items[right..end]);
            start = end;
        }
        std::mem::swap(items, &mut merged);
        width = width.saturating_mul(2);
    }
    Ok(())
}

/// An ordered sequence of indices into a borrowed collection.
pub struct DeviceIndexView<'c, 'rt, R: ComputeRuntime + ?Sized> {
    collection: &'c DeviceContextCollection<'rt, R>,
    indices: Vec<usize>,
}

impl<'c, 'rt, R: ComputeRuntime + ?Sized> DeviceIndexView<'c, 'rt, R> {
    /// The identity view `[0, 1, .., n - 1]` over `collection`.
    ///
    /// # Errors
    ///
    /// Returns [`SelectError::OutOfHostMemory`] if the indices cannot be
    /// allocated.
    pub fn new(collection: &'c DeviceContextCollection<'rt, R>) -> Result<Self> {
        let len = collection.device_count();
        let mut indices = Vec::new();
        indices.try_reserve_exact(len)?;
        indices.extend(0..len);
        Ok(Self {
            collection,
            indices,
        })
    }

    fn derived(&self, indices: Vec<usize>) -> Self {
        Self {
            collection: self.collection,
            indices,
        }
    }

    fn copy_indices(&self) -> Result<Vec<usize>> {
        let mut indices = Vec::new();
        indices.try_reserve_exact(self.indices.len())?;
        indices.extend_from_slice(&self.indices);
        Ok(indices)
    }

    /// The collection this view indexes into.
    #[must_use]
    pub fn collection(&self) -> &'c DeviceContextCollection<'rt, R> {
        self.collection
    }

    /// The indices, in view order.
    #[must_use]
    pub fn indices(&self) -> &[usize] {
        &self.indices
    }

    /// Number of indices.
    #[must_use]
    pub fn len(&self) -> usize {
        self.indices.len()
    }

    /// Whether the view is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }

    /// The device index at `position`.
    #[must_use]
    pub fn get(&self, position: usize) -> Option<usize> {
        self.indices.get(position).copied()
    }

    /// The first device index.
    #[must_use]
    pub fn first(&self) -> Option<usize> {
        self.indices.first().copied()
    }

    /// The last device index.
    #[must_use]
    pub fn last(&self) -> Option<usize> {
        self.indices.last().copied()
    }

    /// `(device index, device)` pairs in view order.
    pub fn iter(&self) -> impl Iterator<Item = (usize, R::Device)> + '_ {
        self.indices
            .iter()
            .map(|&index| (index, self.collection.device(index)))
    }

    /// A new view ordered by `compare`.
    ///
    /// The comparator may fail, e.g. when it queries the runtime; the first
    /// failure aborts the sort and is returned.
    ///
    /// # Errors
    ///
    /// Returns the comparator's error, or [`SelectError::OutOfHostMemory`].
    pub fn sort_by<F>(&self, mut compare: F) -> Result<Self>
    where
        F: FnMut(R::Device, R::Device) -> Result<Ordering>,
    {
        let mut indices = self.copy_indices()?;
        let collection = self.collection;
        try_merge_sort(&mut indices, |&a, &b| {
            compare(collection.device(a), collection.device(b))
        })?;
        Ok(self.derived(indices))
    }

    /// A new view ordered ascending by `key`, evaluated once per device.
    ///
    /// Equal keys keep their current relative order.
    ///
    /// # Errors
    ///
    /// Returns the first error from `key`, or [`SelectError::OutOfHostMemory`].
    pub fn sort_by_key<K, F>(&self, mut key: F) -> Result<Self>
    where
        K: Ord + Copy,
        F: FnMut(R::Device) -> Result<K>,
    {
        let mut keyed = Vec::new();
        keyed.try_reserve_exact(self.indices.len())?;
        for (index, device) in self.iter() {
            keyed.push((key(device)?, index));
        }
        try_merge_sort(&mut keyed, |a, b| Ok(a.0.cmp(&b.0)))?;

        let mut indices = Vec::new();
        indices.try_reserve_exact(keyed.len())?;
        indices.extend(keyed.into_iter().map(|(_, index)| index));
        Ok(self.derived(indices))
    }

    /// A new view ordered by ascending capability metric.
    ///
    /// # Errors
    ///
    /// Returns the runtime status of the first failing metric query.
    pub fn sort_by_capability_metric(&self) -> Result<Self> {
        let runtime = self.collection.runtime();
        self.sort_by_key(|device| capability_metric(runtime, device))
    }

    /// A new view keeping only devices for which `predicate` holds, in order.
    ///
    /// # Errors
    ///
    /// Returns the predicate's first error, or
    /// [`SelectError::OutOfHostMemory`].
    pub fn filter<F>(&self, mut predicate: F) -> Result<Self>
    where
        F: FnMut(R::Device) -> Result<bool>,
    {
        let mut indices = Vec::new();
        indices.try_reserve_exact(self.indices.len())?;
        for (index, device) in self.iter() {
            if predicate(device)? {
                indices.push(index);
            }
        }
        Ok(self.derived(indices))
    }

    /// A new view with the indices in reverse order.
    ///
    /// # Errors
    ///
    /// Returns [`SelectError::OutOfHostMemory`] if allocation fails.
    pub fn reverse(&self) -> Result<Self> {
        let mut indices = Vec::new();
        indices.try_reserve_exact(self.indices.len())?;
        indices.extend(self.indices.iter().rev());
        Ok(self.derived(indices))
    }
}

impl<R: ComputeRuntime + ?Sized> Index<usize> for DeviceIndexView<'_, '_, R> {
    type Output = usize;

    fn index(&self, position: usize) -> &usize {
        &self.indices[position]
    }
}

impl<R: ComputeRuntime + ?Sized> fmt::Debug for DeviceIndexView<'_, '_, R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeviceIndexView")
            .field("indices", &self.indices)
            .finish_non_exhaustive()
    }
}
