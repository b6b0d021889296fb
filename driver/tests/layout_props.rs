use lcdbridge_driver::LcdError;
use lcdbridge_driver::layout::{
    BlockMapping, LayoutDescriptor, MAX_LOGICAL_ROWS, MAX_PHYSICAL_SPAN, RowMapping,
};
use proptest::prelude::*;
use std::collections::HashSet;

/// Mostly small values, with the odd huge one.
fn size(small: std::ops::Range<usize>) -> impl Strategy<Value = usize> {
    prop_oneof![
        8 => small,
        1 => Just(usize::MAX),
        1 => Just(usize::MAX / 2),
        1 => (MAX_PHYSICAL_SPAN + 1)..1000,
    ]
}

fn block() -> impl Strategy<Value = BlockMapping> {
    (size(0..5), size(0..24), size(0..24))
        .prop_map(|(row, offset, width)| BlockMapping::new(row, offset, width))
}

fn covered(row: &RowMapping) -> usize {
    row.blocks().iter().fold(0usize, |sum, b| sum.saturating_add(b.width))
}

fn row_mapping(base_address: u8) -> impl Strategy<Value = RowMapping> {
    (prop::collection::vec(block(), 0..=3), 0usize..=48).prop_map(move |(blocks, slack)| {
        let covered = blocks.iter().fold(0usize, |sum, b| sum.saturating_add(b.width));
        // Mostly exact spans, sometimes off by a few.
        let span = match slack % 4 {
            0 => slack,
            _ => covered,
        };
        RowMapping::new(base_address, span, blocks)
    })
}

fn layout_parts() -> impl Strategy<Value = (usize, usize, Vec<RowMapping>)> {
    (
        size(0..5),
        size(0..24),
        row_mapping(0x00),
        prop::option::of(row_mapping(0x40)),
    )
        .prop_map(|(rows, columns, first, second)| {
            let mut physical = vec![first];
            physical.extend(second);
            (rows, columns, physical)
        })
}

/// A valid 1-row-per-line layout of the given size.
fn simple_layout() -> impl Strategy<Value = (usize, usize)> {
    (1usize..=2, 1usize..=MAX_PHYSICAL_SPAN)
}

proptest! {
    #[test]
    fn accepted_layouts_cover_each_physical_row_exactly(
        (rows, columns, physical) in layout_parts()
    ) {
        if let Ok(layout) = LayoutDescriptor::new(rows, columns, physical) {
            let mut seen_cells = HashSet::new();
            for row in layout.physical_rows() {
                let addresses: Vec<usize> = row.cells().map(|(address, _, _)| address).collect();
                let base = row.base_address() as usize;
                let expected: Vec<usize> = (base..base + row.span()).collect();
                prop_assert_eq!(addresses, expected);

                for (_, logical_row, logical_column) in row.cells() {
                    prop_assert!(logical_row < rows);
                    prop_assert!(logical_column < columns);
                    prop_assert!(seen_cells.insert((logical_row, logical_column)));
                }
            }
        }
    }

    #[test]
    fn span_mismatch_is_rejected((rows, columns, physical) in layout_parts()) {
        let mismatched = physical.iter().any(|r| covered(r) != r.span());
        if mismatched {
            prop_assert!(matches!(
                LayoutDescriptor::new(rows, columns, physical),
                Err(LcdError::Config(_))
            ));
        }
    }

    #[test]
    fn oversized_grids_are_rejected(
        (rows, columns, physical) in layout_parts()
    ) {
        if rows > MAX_LOGICAL_ROWS || columns > MAX_PHYSICAL_SPAN {
            prop_assert!(matches!(
                LayoutDescriptor::new(rows, columns, physical),
                Err(LcdError::Config(_))
            ));
        }
    }

    #[test]
    fn one_block_per_line_is_accepted((rows, columns) in simple_layout()) {
        let physical = (0..rows)
            .map(|row| {
                RowMapping::new(row as u8 * 0x40, columns, vec![BlockMapping::new(row, 0, columns)])
            })
            .collect();
        let layout = LayoutDescriptor::new(rows, columns, physical).unwrap();
        prop_assert_eq!(layout.logical_rows(), rows);
        prop_assert_eq!(layout.logical_columns(), columns);
    }

    #[test]
    fn split_lines_are_accepted(half in 1usize..=MAX_PHYSICAL_SPAN / 2) {
        let layout = LayoutDescriptor::new(
            4,
            half,
            vec![
                RowMapping::new(
                    0x00,
                    half * 2,
                    vec![BlockMapping::new(0, 0, half), BlockMapping::new(2, 0, half)],
                ),
                RowMapping::new(
                    0x40,
                    half * 2,
                    vec![BlockMapping::new(1, 0, half), BlockMapping::new(3, 0, half)],
                ),
            ],
        );
        prop_assert!(layout.is_ok());
    }
}
