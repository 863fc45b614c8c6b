use std::cmp::Ordering;

/// Binary max-heap ordered by a caller-supplied comparator. The comparator is
/// passed per call because ordering rows needs access to columnar storage the
/// heap does not own, and reading it can fail.
#[derive(Debug, Clone)]
pub struct ComparatorHeap<T> {
    items: Vec<T>,
}

impl<T> Default for ComparatorHeap<T> {
    fn default() -> Self {
        Self { items: Vec::new() }
    }
}

impl<T> ComparatorHeap<T> {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            items: Vec::with_capacity(capacity),
        }
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// The greatest element.
    pub fn peek(&self) -> Option<&T> {
        self.items.first()
    }

    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.items.iter()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut T> {
        self.items.iter_mut()
    }

    pub fn into_vec(self) -> Vec<T> {
        self.items
    }

    pub fn push<E, F>(&mut self, item: T, cmp: &mut F) -> Result<(), E>
    where
        F: FnMut(&T, &T) -> Result<Ordering, E>,
    {
        self.items.push(item);
        self.sift_up(self.items.len() - 1, cmp)
    }

    pub fn pop<E, F>(&mut self, cmp: &mut F) -> Result<Option<T>, E>
    where
        F: FnMut(&T, &T) -> Result<Ordering, E>,
    {
        if self.items.is_empty() {
            return Ok(None);
        }
        let last = self.items.len() - 1;
        self.items.swap(0, last);
        let top = self.items.pop();
        if !self.items.is_empty() {
            self.sift_down(0, cmp)?;
        }
        Ok(top)
    }

    /// Replaces the greatest element and restores heap order, returning the old top.
    pub fn replace_top<E, F>(&mut self, item: T, cmp: &mut F) -> Result<Option<T>, E>
    where
        F: FnMut(&T, &T) -> Result<Ordering, E>,
    {
        if self.items.is_empty() {
            self.items.push(item);
            return Ok(None);
        }
        let old = std::mem::replace(&mut self.items[0], item);
        self.sift_down(0, cmp)?;
        Ok(Some(old))
    }

    /// Re-establishes heap order after elements were mutated in place.
    pub fn rebuild<E, F>(&mut self, cmp: &mut F) -> Result<(), E>
    where
        F: FnMut(&T, &T) -> Result<Ordering, E>,
    {
        for index in (0..self.items.len() / 2).rev() {
            self.sift_down(index, cmp)?;
        }
        Ok(())
    }

    fn sift_up<E, F>(&mut self, mut index: usize, cmp: &mut F) -> Result<(), E>
    where
        F: FnMut(&T, &T) -> Result<Ordering, E>,
    {
        while index > 0 {
            let parent = (index - 1) / 2;
            if cmp(&self.items[index], &self.items[parent])? != Ordering::Greater {
                break;
            }
            self.items.swap(index, parent);
            index = parent;
        }
        Ok(())
    }

    fn sift_down<E, F>(&mut self, mut index: usize, cmp: &mut F) -> Result<(), E>
    where
        F: FnMut(&T, &T) -> Result<Ordering, E>,
    {
        let len = self.items.len();
        loop {
            let left = 2 * index + 1;
            if left >= len {
                break;
            }
            let right = left + 1;
            let mut largest = left;
            if right < len && cmp(&self.items[right], &self.items[left])? == Ordering::Greater {
                largest = right;
            }
            if cmp(&self.items[largest], &self.items[index])? != Ordering::Greater {
                break;
            }
            self.items.swap(index, largest);
            index = largest;
        }
        Ok(())
    }
}
