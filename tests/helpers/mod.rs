pub mod factories;
pub mod factory;

use crate::engine::core::page::Page;
use crate::engine::types::{ScalarValue, Type};

/// Materializes every row of `page` as scalar values.
pub fn page_rows(page: &Page, types: &[Type]) -> Vec<Vec<ScalarValue>> {
    (0..page.position_count())
        .map(|position| {
            types
                .iter()
                .enumerate()
                .map(|(channel, ty)| {
                    let block = page.block(channel).expect("channel exists");
                    ty.get_value(block, position).expect("value readable")
                })
                .collect()
        })
        .collect()
}

pub fn pages_rows(pages: &[Page], types: &[Type]) -> Vec<Vec<ScalarValue>> {
    pages
        .iter()
        .filter(|page| !page.is_marker())
        .flat_map(|page| page_rows(page, types))
        .collect()
}
