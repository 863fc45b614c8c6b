use super::{Page, PageBuilder, RowComparator};
use crate::engine::core::utils::ComparatorHeap;
use crate::engine::errors::PageError;
use crate::engine::types::Type;

struct Cursor {
    stream: usize,
    page: Page,
    position: usize,
}

/// K-way merge of page streams that are each already sorted by `comparator`.
/// Rows are re-packed into output pages of at most `max_positions` rows.
pub struct MergeSortedPages<I, E>
where
    I: Iterator<Item = Result<Page, E>>,
{
    streams: Vec<I>,
    comparator: RowComparator,
    heap: ComparatorHeap<Cursor>,
    builder: PageBuilder,
    primed: bool,
    done: bool,
}

impl<I, E> MergeSortedPages<I, E>
where
    I: Iterator<Item = Result<Page, E>>,
    E: From<PageError>,
{
    pub fn new(
        streams: Vec<I>,
        types: Vec<Type>,
        comparator: RowComparator,
        max_positions: usize,
    ) -> Self {
        let heap = ComparatorHeap::with_capacity(streams.len());
        Self {
            streams,
            comparator,
            heap,
            builder: PageBuilder::with_limits(types, max_positions, u64::MAX),
            primed: false,
            done: false,
        }
    }

    fn next_data_page(&mut self, stream: usize) -> Result<Option<Page>, E> {
        while let Some(page) = self.streams[stream].next() {
            let page = page?;
            if !page.is_marker() && page.position_count() > 0 {
                return Ok(Some(page));
            }
        }
        Ok(None)
    }

    fn push_cursor(&mut self, cursor: Cursor) -> Result<(), PageError> {
        let comparator = &self.comparator;
        // Min-heap on the row ordering; ties resolve by stream index.
        self.heap.push(cursor, &mut |a: &Cursor, b: &Cursor| {
            Ok::<_, PageError>(
                comparator
                    .compare(&b.page, b.position, &a.page, a.position)?
                    .then(b.stream.cmp(&a.stream)),
            )
        })
    }

    fn pop_cursor(&mut self) -> Result<Option<Cursor>, PageError> {
        let comparator = &self.comparator;
        self.heap.pop(&mut |a: &Cursor, b: &Cursor| {
            Ok::<_, PageError>(
                comparator
                    .compare(&b.page, b.position, &a.page, a.position)?
                    .then(b.stream.cmp(&a.stream)),
            )
        })
    }

    fn prime(&mut self) -> Result<(), E> {
        for stream in 0..self.streams.len() {
            if let Some(page) = self.next_data_page(stream)? {
                self.push_cursor(Cursor {
                    stream,
                    page,
                    position: 0,
                })?;
            }
        }
        self.primed = true;
        Ok(())
    }

    fn next_page(&mut self) -> Result<Option<Page>, E> {
        if !self.primed {
            self.prime()?;
        }
        while let Some(mut cursor) = self.pop_cursor()? {
            for channel in 0..cursor.page.channel_count() {
                let block = cursor.page.block(channel)?;
                block
                    .write_position_to(cursor.position, self.builder.builder(channel)?)
                    .map_err(PageError::from)?;
            }
            self.builder.declare_position();

            cursor.position += 1;
            if cursor.position < cursor.page.position_count() {
                self.push_cursor(cursor)?;
            } else if let Some(page) = self.next_data_page(cursor.stream)? {
                self.push_cursor(Cursor {
                    stream: cursor.stream,
                    page,
                    position: 0,
                })?;
            }

            if self.builder.is_full() {
                return Ok(Some(self.builder.build()?));
            }
        }
        if self.builder.is_empty() {
            return Ok(None);
        }
        Ok(Some(self.builder.build()?))
    }
}

impl<I, E> Iterator for MergeSortedPages<I, E>
where
    I: Iterator<Item = Result<Page, E>>,
    E: From<PageError>,
{
    type Item = Result<Page, E>;

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
