use std::sync::Arc;

use super::{
    FilterAndProjectProcessor, FilterProjectOperator, Operator, PageProcessor, RowFilter,
};
use crate::engine::core::page::{MarkerPage, Page};
use crate::engine::errors::OperatorError;
use crate::engine::types::{ScalarValue, Type};
use crate::test_helpers::factories::PageFactory;
use crate::test_helpers::factory::Factory;
use crate::test_helpers::page_rows;

fn input() -> Page {
    PageFactory::new()
        .with_types(vec![Type::BigInt, Type::Varchar])
        .with_rows(
            (0..6)
                .map(|i| vec![ScalarValue::BigInt(i), ScalarValue::Varchar(format!("v{i}"))])
                .collect(),
        )
        .create()
}

fn even_rows() -> RowFilter {
    Arc::new(|page: &Page, position: usize| -> Result<bool, OperatorError> {
        let value = Type::BigInt.get_value(page.block(0)?, position)?;
        Ok(value.as_i64().is_some_and(|v| v % 2 == 0))
    })
}

#[test]
fn filters_rows_and_projects_channels() {
    let processor = FilterAndProjectProcessor::new(Some(even_rows()), vec![1]);
    let page = processor.process(&input()).unwrap().unwrap();
    assert_eq!(
        page_rows(&page, &[Type::Varchar]),
        vec![
            vec![ScalarValue::Varchar("v0".into())],
            vec![ScalarValue::Varchar("v2".into())],
            vec![ScalarValue::Varchar("v4".into())],
        ]
    );
}

#[test]
fn all_rows_filtered_yields_nothing() {
    let none: RowFilter = Arc::new(|_: &Page, _: usize| -> Result<bool, OperatorError> { Ok(false) });
    let processor = FilterAndProjectProcessor::new(Some(none), vec![0]);
    assert!(processor.process(&input()).unwrap().is_none());
}

#[test]
fn operator_forwards_markers_untouched() {
    let processor = Arc::new(FilterAndProjectProcessor::new(None, vec![1, 0]));
    let mut operator =
        FilterProjectOperator::new(Factory::task().operator("FilterProjectOperator"), processor);

    operator
        .add_input(Page::marker(MarkerPage::snapshot_page(2)))
        .unwrap();
    assert!(!operator.needs_input());
    assert!(operator.get_output().unwrap().unwrap().is_marker());

    operator.add_input(input()).unwrap();
    let page = operator.get_output().unwrap().unwrap();
    assert_eq!(page.channel_count(), 2);
    assert_eq!(
        page_rows(&page, &[Type::Varchar, Type::BigInt])[5],
        vec![ScalarValue::Varchar("v5".into()), ScalarValue::BigInt(5)]
    );

    operator.finish().unwrap();
    assert!(operator.is_finished());
    assert_eq!(operator.operator_context().stats().output_positions, 6);
}
