//! Partition types

/// One contiguous slice of the ordered account list
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Batch<'a, T> {
    /// 1-based batch number
    pub index: u32,
    /// Offset of the first item in the full list
    pub start: usize,
    /// Offset one past the last item in the full list
    pub end: usize,
    /// The items of this batch
    pub items: &'a [T],
}

impl<T> Batch<'_, T> {
    /// Number of items in the batch
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Whether the batch holds no items
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}
