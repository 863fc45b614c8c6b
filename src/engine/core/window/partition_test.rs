use super::{
    FrameBound, FrameInfo, FramedWindowFunction, WindowFunctionDefinition, WindowFunctionKind,
    WindowPartition,
};
use crate::engine::core::page::{PageBuilder, PagesIndex};
use crate::engine::errors::WindowError;
use crate::engine::types::{ScalarValue, Type};
use crate::test_helpers::factories::PageFactory;
use crate::test_helpers::page_rows;

/// Columns: order key, start offset, end offset.
fn index(rows: Vec<[Option<i64>; 3]>) -> PagesIndex {
    let types = vec![Type::BigInt; 3];
    let page = PageFactory::new()
        .with_types(types.clone())
        .with_rows(
            rows.into_iter()
                .map(|row| {
                    row.iter()
                        .map(|v| v.map_or(ScalarValue::Null, ScalarValue::BigInt))
                        .collect()
                })
                .collect(),
        )
        .create();
    let mut index = PagesIndex::new(types, 16);
    index.add_page(&page).unwrap();
    index
}

fn keys(keys: &[i64], start: i64, end: i64) -> PagesIndex {
    index(keys.iter().map(|k| [Some(*k), Some(start), Some(end)]).collect())
}

fn functions(frame: FrameInfo, kinds: &[WindowFunctionKind]) -> Vec<FramedWindowFunction> {
    kinds
        .iter()
        .map(|kind| {
            WindowFunctionDefinition::new(kind.clone(), frame)
                .create(&[Type::BigInt; 3])
                .unwrap()
        })
        .collect()
}

/// Runs one partition and returns `[key, function outputs...]` per row.
fn run(
    index: &PagesIndex,
    start: usize,
    end: usize,
    functions: &mut [FramedWindowFunction],
) -> Result<Vec<Vec<ScalarValue>>, WindowError> {
    let mut types = vec![Type::BigInt];
    types.extend(functions.iter().map(FramedWindowFunction::output_type));
    let mut builder = PageBuilder::new(types.clone());
    let mut partition = WindowPartition::new(index, start, end, &[0], functions)?;
    while partition.has_next() {
        partition.process_next_row(index, &[0], &[0], functions, &mut builder)?;
    }
    let page = builder.build()?;
    Ok(page_rows(&page, &types))
}

fn big(v: i64) -> ScalarValue {
    ScalarValue::BigInt(v)
}

const FRAME_PROBES: [WindowFunctionKind; 3] = [
    WindowFunctionKind::CountRows,
    WindowFunctionKind::FirstValue { channel: 0 },
    WindowFunctionKind::LastValue { channel: 0 },
];

#[test]
fn rows_frame_one_preceding_one_following() {
    let index = keys(&[10, 20, 30, 40, 50], 1, 1);
    let frame = FrameInfo::rows(
        FrameBound::Preceding,
        Some(1),
        FrameBound::Following,
        Some(2),
    )
    .unwrap();
    let mut fns = functions(frame, &FRAME_PROBES);

    let rows = run(&index, 0, 5, &mut fns).unwrap();
    assert_eq!(
        rows,
        vec![
            vec![big(10), big(2), big(10), big(20)],
            vec![big(20), big(3), big(10), big(30)],
            vec![big(30), big(3), big(20), big(40)],
            vec![big(40), big(3), big(30), big(50)],
            vec![big(50), big(2), big(40), big(50)],
        ]
    );
}

#[test]
fn range_current_row_spans_the_peer_group() {
    let index = keys(&[1, 1, 2, 3, 3], 0, 0);
    let mut fns = functions(
        FrameInfo::default_frame(),
        &[
            WindowFunctionKind::Rank,
            WindowFunctionKind::CountRows,
            WindowFunctionKind::SumBigInt { channel: 0 },
        ],
    );

    let rows = run(&index, 0, 5, &mut fns).unwrap();
    let summary: Vec<_> = rows.iter().map(|row| row[1..].to_vec()).collect();
    assert_eq!(
        summary,
        vec![
            vec![big(1), big(2), big(2)],
            vec![big(1), big(2), big(2)],
            vec![big(3), big(3), big(4)],
            vec![big(4), big(5), big(10)],
            vec![big(4), big(5), big(10)],
        ]
    );
}

#[test]
fn range_current_row_to_unbounded_following() {
    let index = keys(&[1, 1, 2], 0, 0);
    let frame = FrameInfo::range(FrameBound::CurrentRow, FrameBound::UnboundedFollowing).unwrap();
    let mut fns = functions(frame, &FRAME_PROBES);

    let rows = run(&index, 0, 3, &mut fns).unwrap();
    let counts: Vec<_> = rows.iter().map(|row| row[1].clone()).collect();
    assert_eq!(counts, vec![big(3), big(3), big(1)]);
}

#[test]
fn frames_outside_the_partition_are_empty() {
    let index = keys(&[1, 2, 3], 2, 1);
    let preceding = FrameInfo::rows(
        FrameBound::Preceding,
        Some(1),
        FrameBound::Preceding,
        Some(2),
    )
    .unwrap();
    let mut fns = functions(preceding, &FRAME_PROBES);
    let rows = run(&index, 0, 3, &mut fns).unwrap();
    assert_eq!(
        rows,
        vec![
            vec![big(1), big(0), ScalarValue::Null, ScalarValue::Null],
            vec![big(2), big(1), big(1), big(1)],
            vec![big(3), big(2), big(1), big(2)],
        ]
    );

    let index = keys(&[1, 2, 3], 1, 2);
    let following = FrameInfo::rows(
        FrameBound::Following,
        Some(1),
        FrameBound::Following,
        Some(2),
    )
    .unwrap();
    let mut fns = functions(following, &FRAME_PROBES);
    let rows = run(&index, 0, 3, &mut fns).unwrap();
    assert_eq!(
        rows,
        vec![
            vec![big(1), big(2), big(2), big(3)],
            vec![big(2), big(1), big(3), big(3)],
            vec![big(3), big(0), ScalarValue::Null, ScalarValue::Null],
        ]
    );
}

#[test]
fn inverted_frames_around_the_current_row_are_empty() {
    let empty = vec![big(0), ScalarValue::Null, ScalarValue::Null];

    let index = keys(&[1, 2, 3], 1, 1);
    let to_preceding =
        FrameInfo::rows(FrameBound::CurrentRow, None, FrameBound::Preceding, Some(2)).unwrap();
    let mut fns = functions(to_preceding, &FRAME_PROBES);
    let rows = run(&index, 0, 3, &mut fns).unwrap();
    assert!(rows.iter().all(|row| row[1..] == empty[..]));

    let from_following =
        FrameInfo::rows(FrameBound::Following, Some(1), FrameBound::CurrentRow, None).unwrap();
    let mut fns = functions(from_following, &FRAME_PROBES);
    let rows = run(&index, 0, 3, &mut fns).unwrap();
    assert!(rows.iter().all(|row| row[1..] == empty[..]));

    // A zero offset collapses both frames onto the current row.
    let index = keys(&[1, 2, 3], 0, 0);
    let mut fns = functions(to_preceding, &FRAME_PROBES);
    let rows = run(&index, 0, 3, &mut fns).unwrap();
    assert_eq!(rows[1], vec![big(2), big(1), big(2), big(2)]);
}

#[test]
fn positions_are_partition_local() {
    let index = keys(&[7, 8, 1, 2, 3], 0, 0);
    let frame = FrameInfo::rows(
        FrameBound::UnboundedPreceding,
        None,
        FrameBound::UnboundedFollowing,
        None,
    )
    .unwrap();
    let mut fns = functions(
        frame,
        &[
            WindowFunctionKind::RowNumber,
            WindowFunctionKind::FirstValue { channel: 0 },
        ],
    );

    let first = run(&index, 0, 2, &mut fns).unwrap();
    let second = run(&index, 2, 5, &mut fns).unwrap();
    assert_eq!(first[1], vec![big(8), big(2), big(7)]);
    assert_eq!(
        second,
        vec![
            vec![big(1), big(1), big(1)],
            vec![big(2), big(2), big(1)],
            vec![big(3), big(3), big(1)],
        ]
    );
}

#[test]
fn null_offset_is_rejected() {
    let index = index(vec![[Some(1), None, Some(0)]]);
    let frame = FrameInfo::rows(FrameBound::Preceding, Some(1), FrameBound::CurrentRow, None).unwrap();
    let mut fns = functions(frame, &[WindowFunctionKind::CountRows]);

    let err = run(&index, 0, 1, &mut fns).unwrap_err();
    assert!(matches!(err, WindowError::NullFrameOffset("starting")));
}

#[test]
fn negative_offset_is_rejected() {
    let index = index(vec![[Some(1), Some(0), Some(-1)]]);
    let frame = FrameInfo::rows(FrameBound::CurrentRow, None, FrameBound::Following, Some(2)).unwrap();
    let mut fns = functions(frame, &[WindowFunctionKind::CountRows]);

    let err = run(&index, 0, 1, &mut fns).unwrap_err();
    assert!(matches!(err, WindowError::NegativeFrameOffset(-1)));
}

#[test]
fn processing_past_the_end_fails() {
    let index = keys(&[1], 0, 0);
    let mut fns = functions(FrameInfo::default_frame(), &[WindowFunctionKind::RowNumber]);
    let mut builder = PageBuilder::new(vec![Type::BigInt, Type::BigInt]);
    let mut partition = WindowPartition::new(&index, 0, 1, &[0], &mut fns).unwrap();

    partition
        .process_next_row(&index, &[0], &[0], &mut fns, &mut builder)
        .unwrap();
    assert!(!partition.has_next());
    let err = partition
        .process_next_row(&index, &[0], &[0], &mut fns, &mut builder)
        .unwrap_err();
    assert!(matches!(err, WindowError::PartitionExhausted));
}
