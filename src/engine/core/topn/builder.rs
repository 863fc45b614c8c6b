use std::cmp::Ordering;
use std::mem;

use rustc_hash::FxHashSet;
use tracing::trace;

use super::group_by_hash::GroupByHash;
use crate::engine::core::page::{Page, PageBuilder, RowComparator};
use crate::engine::core::utils::ComparatorHeap;
use crate::engine::errors::{BlockError, PageError};
use crate::engine::types::{ScalarValue, Type};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct RowRef {
    page: usize,
    position: usize,
}

const ROW_REF_BYTES: u64 = mem::size_of::<RowRef>() as u64;

fn retained_page(pages: &[Option<Page>], id: usize) -> Result<&Page, PageError> {
    pages.get(id).and_then(Option::as_ref).ok_or(PageError::Block(
        BlockError::PositionOutOfBounds {
            position: id,
            count: pages.len(),
        },
    ))
}

fn compare_rows(
    comparator: &RowComparator,
    pages: &[Option<Page>],
    left: &RowRef,
    right: &RowRef,
) -> Result<Ordering, PageError> {
    comparator.compare(
        retained_page(pages, left.page)?,
        left.position,
        retained_page(pages, right.page)?,
        right.position,
    )
}

/// Keeps the first `top_n` rows per group under `comparator`.
///
/// Each group owns a max-heap of row references, worst row on top. Rows of an
/// input page that survive are gathered into a compact retained page; a
/// retained page is compacted again once at least half its rows are evicted.
#[derive(Debug)]
pub struct GroupedTopNBuilder {
    types: Vec<Type>,
    comparator: RowComparator,
    top_n: usize,
    produce_row_number: bool,
    group_by: GroupByHash,
    pages: Vec<Option<Page>>,
    live: Vec<usize>,
    free_ids: Vec<usize>,
    groups: Vec<ComparatorHeap<RowRef>>,
    retained_bytes: u64,
}

impl GroupedTopNBuilder {
    pub fn new(
        types: Vec<Type>,
        comparator: RowComparator,
        top_n: usize,
        produce_row_number: bool,
        group_by: GroupByHash,
    ) -> Self {
        Self {
            types,
            comparator,
            top_n,
            produce_row_number,
            group_by,
            pages: Vec::new(),
            live: Vec::new(),
            free_ids: Vec::new(),
            groups: Vec::new(),
            retained_bytes: 0,
        }
    }

    pub fn estimated_size_in_bytes(&self) -> u64 {
        let refs: usize = self.groups.iter().map(ComparatorHeap::len).sum();
        self.retained_bytes + refs as u64 * ROW_REF_BYTES + self.group_by.estimated_size_in_bytes()
    }

    pub fn retained_row_count(&self) -> usize {
        self.groups.iter().map(ComparatorHeap::len).sum()
    }

    fn allocate(&mut self, page: Page) -> usize {
        self.retained_bytes += page.retained_size_in_bytes();
        match self.free_ids.pop() {
            Some(id) => {
                self.pages[id] = Some(page);
                self.live[id] = 0;
                id
            }
            None => {
                self.pages.push(Some(page));
                self.live.push(0);
                self.pages.len() - 1
            }
        }
    }

    fn release(&mut self, id: usize) {
        if let Some(page) = self.pages[id].take() {
            self.retained_bytes -= page.retained_size_in_bytes();
        }
        self.live[id] = 0;
        self.free_ids.push(id);
    }

    /// Replaces page `id` with only the rows still referenced from `groups`.
    fn compact(&mut self, id: usize, groups: &[usize]) -> Result<(), PageError> {
        let page = retained_page(&self.pages, id)?;
        let mut survivors: Vec<usize> = groups
            .iter()
            .flat_map(|g| self.groups[*g].iter())
            .filter(|r| r.page == id)
            .map(|r| r.position)
            .collect();
        survivors.sort_unstable();
        if survivors.len() == page.position_count() {
            return Ok(());
        }
        let compacted = page.copy_positions(&survivors)?;
        let mut remap = vec![usize::MAX; page.position_count()];
        for (new_position, old_position) in survivors.iter().enumerate() {
            remap[*old_position] = new_position;
        }
        for g in groups {
            for row in self.groups[*g].iter_mut().filter(|r| r.page == id) {
                row.position = remap[row.position];
            }
        }
        trace!(target: "snapflow::topn", page = id, kept = survivors.len(), "Compacted retained page");
        self.retained_bytes -= page.retained_size_in_bytes();
        self.retained_bytes += compacted.retained_size_in_bytes();
        self.pages[id] = Some(compacted);
        Ok(())
    }

    pub fn add_page(&mut self, page: &Page) -> Result<(), PageError> {
        if self.top_n == 0 || page.position_count() == 0 {
            return Ok(());
        }
        if page.is_marker() {
            return Err(PageError::MarkerPage);
        }
        let group_ids = self.group_by.get_group_ids(page)?;
        let group_count = self.group_by.group_count();
        if self.groups.len() < group_count {
            self.groups.resize_with(group_count, ComparatorHeap::default);
        }

        let page_id = self.allocate(page.clone());
        let mut touched_groups = FxHashSet::default();
        let mut evicted_pages = FxHashSet::default();
        {
            let Self {
                comparator,
                pages,
                groups,
                live,
                top_n,
                ..
            } = self;
            let mut cmp = |a: &RowRef, b: &RowRef| compare_rows(comparator, pages, a, b);

            for (position, group) in group_ids.iter().enumerate() {
                let group = *group as usize;
                let heap = &mut groups[group];
                let candidate = RowRef {
                    page: page_id,
                    position,
                };
                if heap.len() < *top_n {
                    heap.push(candidate, &mut cmp)?;
                    live[page_id] += 1;
                    touched_groups.insert(group);
                    continue;
                }
                let Some(worst) = heap.peek().copied() else {
                    continue;
                };
                if cmp(&candidate, &worst)? != Ordering::Less {
                    continue;
                }
                if let Some(evicted) = heap.replace_top(candidate, &mut cmp)? {
                    live[evicted.page] -= 1;
                    if evicted.page != page_id {
                        evicted_pages.insert(evicted.page);
                    }
                }
                live[page_id] += 1;
                touched_groups.insert(group);
            }
        }

        let touched: Vec<usize> = touched_groups.into_iter().collect();
        if self.live[page_id] == 0 {
            self.release(page_id);
        } else if self.live[page_id] < page.position_count() {
            self.compact(page_id, &touched)?;
        }

        let all_groups: Vec<usize> = (0..self.groups.len()).collect();
        for id in evicted_pages {
            let rows = retained_page(&self.pages, id)?.position_count();
            if self.live[id] == 0 {
                self.release(id);
            } else if self.live[id] * 2 <= rows {
                self.compact(id, &all_groups)?;
            }
        }
        Ok(())
    }

    fn output_types(&self) -> Vec<Type> {
        let mut types = self.types.clone();
        if self.produce_row_number {
            types.push(Type::BigInt);
        }
        types
    }

    /// Every retained row, grouped by group id but unsorted within a group.
    pub fn retained_pages(&self, max_positions: usize) -> Result<Vec<Page>, PageError> {
        let mut builder = PageBuilder::with_limits(self.types.clone(), max_positions, u64::MAX);
        let mut out = Vec::new();
        for heap in &self.groups {
            for row in heap.iter() {
                let page = retained_page(&self.pages, row.page)?;
                for channel in 0..self.types.len() {
                    page.block(channel)?
                        .write_position_to(row.position, builder.builder(channel)?)?;
                }
                builder.declare_position();
                if builder.is_full() {
                    out.push(builder.build()?);
                }
            }
        }
        if !builder.is_empty() {
            out.push(builder.build()?);
        }
        Ok(out)
    }

    /// Drains the builder into a one-shot iterator over the sorted result.
    pub fn build_result(&mut self, max_positions: usize) -> Result<TopNResult, PageError> {
        let mut heaps = mem::take(&mut self.groups);
        let mut sorted = Vec::with_capacity(heaps.len());
        {
            let comparator = &self.comparator;
            let pages = &self.pages;
            let mut cmp = |a: &RowRef, b: &RowRef| compare_rows(comparator, pages, a, b);
            for heap in heaps.iter_mut() {
                let mut rows = Vec::with_capacity(heap.len());
                while let Some(row) = heap.pop(&mut cmp)? {
                    rows.push(row);
                }
                rows.reverse();
                sorted.push(rows);
            }
        }
        let output_types = self.output_types();
        let result = TopNResult {
            channels: self.types.len(),
            produce_row_number: self.produce_row_number,
            pages: mem::take(&mut self.pages),
            groups: sorted.into_iter(),
            current: Vec::new().into_iter(),
            row_number: 0,
            builder: PageBuilder::with_limits(output_types, max_positions, u64::MAX),
            done: false,
        };
        self.live.clear();
        self.free_ids.clear();
        self.retained_bytes = 0;
        Ok(result)
    }
}

/// Sorted rows of every group, in group-id order, cut into pages.
#[derive(Debug)]
pub struct TopNResult {
    channels: usize,
    produce_row_number: bool,
    pages: Vec<Option<Page>>,
    groups: std::vec::IntoIter<Vec<RowRef>>,
    current: std::vec::IntoIter<RowRef>,
    row_number: i64,
    builder: PageBuilder,
    done: bool,
}

impl TopNResult {
    fn next_page(&mut self) -> Result<Option<Page>, PageError> {
        loop {
            for row in self.current.by_ref() {
                let page = retained_page(&self.pages, row.page)?;
                for channel in 0..self.channels {
                    page.block(channel)?
                        .write_position_to(row.position, self.builder.builder(channel)?)?;
                }
                if self.produce_row_number {
                    self.row_number += 1;
                    Type::BigInt.write_value(
                        self.builder.builder(self.channels)?,
                        &ScalarValue::BigInt(self.row_number),
                    )?;
                }
                self.builder.declare_position();
                if self.builder.is_full() {
                    return Ok(Some(self.builder.build()?));
                }
            }
            match self.groups.next() {
                Some(rows) => {
                    self.current = rows.into_iter();
                    self.row_number = 0;
                }
                None => break,
            }
        }
        if self.builder.is_empty() {
            return Ok(None);
        }
        Ok(Some(self.builder.build()?))
    }
}

impl Iterator for TopNResult {
    type Item = Result<Page, PageError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        match self.next_page() {
            Ok(Some(page)) => Some(Ok(page)),
            Ok(None) => {
                self.done = true;
                None
            }
            Err(err) => {
                self.done = true;
                Some(Err(err))
            }
        }
    }
}
