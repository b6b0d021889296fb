//! Logical grid to DDRAM address mapping.
//!
//! An HD44780 exposes (at most) two contiguous DDRAM lines, starting at `0x00` and `0x40`, each
//! up to 40 characters long. Displays with more visible rows than that simply continue a line on
//! another visible row: on a 20x4 module, visible row 2 is the second half of DDRAM line 0, and
//! visible row 3 the second half of line 1.
//!
//! A [LayoutDescriptor] describes this with one [RowMapping] per DDRAM line ("physical row"),
//! and each row mapping lists the [BlockMapping]s it is made of, in address order.

use crate::{LcdError, LcdResult};
use serde::{Deserialize, Serialize};

/// Number of characters one DDRAM line can hold.
pub const MAX_PHYSICAL_SPAN: usize = 0x28;
/// Address displacement between the two DDRAM lines.
pub const PHYSICAL_ROW_STEP: u8 = 0x40;
/// Highest DDRAM address + 1.
pub const DDRAM_SIZE: usize = 0x80;

pub const MAX_PHYSICAL_ROWS: usize = 2;
pub const MAX_BLOCKS_PER_ROW: usize = 2;
/// Every block fills one logical row, so this is as tall as a grid can get.
pub const MAX_LOGICAL_ROWS: usize = MAX_PHYSICAL_ROWS * MAX_BLOCKS_PER_ROW;

/// A run of `width` consecutive cells of the logical row `logical_row`, starting at
/// `logical_column_offset`.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct BlockMapping {
    pub logical_row: usize,
    pub logical_column_offset: usize,
    pub width: usize,
}

impl BlockMapping {
    pub const fn new(logical_row: usize, logical_column_offset: usize, width: usize) -> Self {
        BlockMapping {
            logical_row,
            logical_column_offset,
            width,
        }
    }
}

/// One contiguous DDRAM address range, written with a single address-set command followed by
/// auto-incremented data writes.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct RowMapping {
    base_address: u8,
    span: usize,
    blocks: Vec<BlockMapping>,
}

impl RowMapping {
    /// Creates a physical row covering `span` addresses from `base_address`, filled by `blocks`
    /// in address order. Validated as part of [LayoutDescriptor::new].
    pub fn new(base_address: u8, span: usize, blocks: Vec<BlockMapping>) -> Self {
        RowMapping {
            base_address,
            span,
            blocks,
        }
    }

    pub fn base_address(&self) -> u8 {
        self.base_address
    }

    pub fn span(&self) -> usize {
        self.span
    }

    pub fn blocks(&self) -> &[BlockMapping] {
        &self.blocks
    }

    /// Iterates over `(address, logical_row, logical_column)` for every address of the row.
    pub fn cells(&self) -> impl Iterator<Item = (usize, usize, usize)> + '_ {
        let base = self.base_address as usize;
        self.blocks
            .iter()
            .flat_map(|block| {
                (0..block.width).map(move |i| {
                    (block.logical_row, block.logical_column_offset + i)
                })
            })
            .enumerate()
            .map(move |(i, (row, column))| (base + i, row, column))
    }
}

/// Validated description of a display model.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct LayoutDescriptor {
    rows: usize,
    columns: usize,
    physical_rows: Vec<RowMapping>,
}

impl LayoutDescriptor {
    /// Validates and creates a layout.
    ///
    /// # Errors
    /// [LcdError::Config] if:
    /// - `rows` or `columns` is zero, `rows` exceeds [MAX_LOGICAL_ROWS], or `columns` exceeds
    ///   [MAX_PHYSICAL_SPAN],
    /// - there are no physical rows, or more than [MAX_PHYSICAL_ROWS],
    /// - a physical row has no blocks, or more than [MAX_BLOCKS_PER_ROW],
    /// - a block is empty or points outside the logical grid,
    /// - the block widths of a physical row leave a gap in, or overflow, its declared span,
    /// - a physical row does not fit in its DDRAM line, or overlaps another physical row,
    /// - a logical cell is mapped more than once.
    pub fn new(rows: usize, columns: usize, physical_rows: Vec<RowMapping>) -> LcdResult<Self> {
        if rows == 0 || columns == 0 {
            return Err(LcdError::Config(format!(
                "logical size must be positive, got {rows}x{columns}"
            )));
        }

        if rows > MAX_LOGICAL_ROWS || columns > MAX_PHYSICAL_SPAN {
            return Err(LcdError::Config(format!(
                "logical size {rows}x{columns} exceeds {MAX_LOGICAL_ROWS}x{MAX_PHYSICAL_SPAN}"
            )));
        }

        if physical_rows.is_empty() || physical_rows.len() > MAX_PHYSICAL_ROWS {
            return Err(LcdError::Config(format!(
                "expected 1 to {MAX_PHYSICAL_ROWS} physical rows, got {}",
                physical_rows.len()
            )));
        }

        let mut mapped = vec![false; rows * columns];
        let mut used_addresses = [false; DDRAM_SIZE];

        for (index, row) in physical_rows.iter().enumerate() {
            if row.blocks.is_empty() || row.blocks.len() > MAX_BLOCKS_PER_ROW {
                return Err(LcdError::Config(format!(
                    "physical row {index}: expected 1 to {MAX_BLOCKS_PER_ROW} blocks, got {}",
                    row.blocks.len()
                )));
            }

            if row.span == 0 || row.span > MAX_PHYSICAL_SPAN {
                return Err(LcdError::Config(format!(
                    "physical row {index}: span {} outside 1..={MAX_PHYSICAL_SPAN}",
                    row.span
                )));
            }

            let line_start = row.base_address & PHYSICAL_ROW_STEP;
            let line_end = line_start as usize + MAX_PHYSICAL_SPAN;
            if row.base_address as usize + row.span > line_end {
                return Err(LcdError::Config(format!(
                    "physical row {index}: {:#04x}+{} runs past the DDRAM line",
                    row.base_address, row.span
                )));
            }

            for block in &row.blocks {
                if block.width == 0 {
                    return Err(LcdError::Config(format!(
                        "physical row {index}: empty block"
                    )));
                }
                let end = block.logical_column_offset.checked_add(block.width);
                if block.logical_row >= rows || end.is_none_or(|end| end > columns) {
                    return Err(LcdError::Config(format!(
                        "physical row {index}: block {:?} outside the {rows}x{columns} grid",
                        block
                    )));
                }
            }

            let covered: usize = row.blocks.iter().map(|b| b.width).sum();
            if covered < row.span {
                return Err(LcdError::Config(format!(
                    "physical row {index}: blocks cover {covered} of {} addresses",
                    row.span
                )));
            }
            if covered > row.span {
                return Err(LcdError::Config(format!(
                    "physical row {index}: blocks cover {covered} addresses, span is {}",
                    row.span
                )));
            }

            for (address, logical_row, logical_column) in row.cells() {
                if used_addresses[address] {
                    return Err(LcdError::Config(format!(
                        "physical row {index}: address {address:#04x} mapped twice"
                    )));
                }
                used_addresses[address] = true;

                let cell = &mut mapped[logical_row * columns + logical_column];
                if *cell {
                    return Err(LcdError::Config(format!(
                        "physical row {index}: cell ({logical_row}, {logical_column}) mapped twice"
                    )));
                }
                *cell = true;
            }
        }

        Ok(LayoutDescriptor {
            rows,
            columns,
            physical_rows,
        })
    }

    /// 16 columns, 2 rows. Each visible row is its own DDRAM line.
    pub fn lcd_16x2() -> Self {
        LayoutDescriptor {
            rows: 2,
            columns: 16,
            physical_rows: vec![
                RowMapping::new(0x00, 16, vec![BlockMapping::new(0, 0, 16)]),
                RowMapping::new(PHYSICAL_ROW_STEP, 16, vec![BlockMapping::new(1, 0, 16)]),
            ],
        }
    }

    /// 20 columns, 4 rows. Visible rows 2 and 3 continue DDRAM lines 0 and 1.
    pub fn lcd_20x4() -> Self {
        LayoutDescriptor {
            rows: 4,
            columns: 20,
            physical_rows: vec![
                RowMapping::new(
                    0x00,
                    40,
                    vec![BlockMapping::new(0, 0, 20), BlockMapping::new(2, 0, 20)],
                ),
                RowMapping::new(
                    PHYSICAL_ROW_STEP,
                    40,
                    vec![BlockMapping::new(1, 0, 20), BlockMapping::new(3, 0, 20)],
                ),
            ],
        }
    }

    pub fn logical_rows(&self) -> usize {
        self.rows
    }

    pub fn logical_columns(&self) -> usize {
        self.columns
    }

    pub fn physical_rows(&self) -> &[RowMapping] {
        &self.physical_rows
    }

    /// Size of the largest physical row, in characters.
    pub fn max_span(&self) -> usize {
        self.physical_rows.iter().map(|r| r.span).max().unwrap_or(0)
    }
}

/// The layouts shipped out of the box, selectable from configuration.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LayoutPreset {
    Lcd16x2,
    #[default]
    Lcd20x4,
}

impl LayoutPreset {
    pub fn descriptor(&self) -> LayoutDescriptor {
        match self {
            LayoutPreset::Lcd16x2 => LayoutDescriptor::lcd_16x2(),
            LayoutPreset::Lcd20x4 => LayoutDescriptor::lcd_20x4(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn revalidate(layout: &LayoutDescriptor) -> LcdResult<LayoutDescriptor> {
        LayoutDescriptor::new(
            layout.logical_rows(),
            layout.logical_columns(),
            layout.physical_rows().to_vec(),
        )
    }

    #[test]
    fn presets_are_valid() {
        assert_eq!(revalidate(&LayoutDescriptor::lcd_16x2()), Ok(LayoutDescriptor::lcd_16x2()));
        assert_eq!(revalidate(&LayoutDescriptor::lcd_20x4()), Ok(LayoutDescriptor::lcd_20x4()));
    }

    #[test]
    fn preset_20x4_interleaves_rows() {
        let layout = LayoutDescriptor::lcd_20x4();
        let line0: Vec<_> = layout.physical_rows()[0].cells().collect();
        assert_eq!(line0.len(), 40);
        assert_eq!(line0[0], (0x00, 0, 0));
        assert_eq!(line0[19], (0x13, 0, 19));
        assert_eq!(line0[20], (0x14, 2, 0));
        assert_eq!(line0[39], (0x27, 2, 19));

        let line1: Vec<_> = layout.physical_rows()[1].cells().collect();
        assert_eq!(line1[0], (0x40, 1, 0));
        assert_eq!(line1[20], (0x54, 3, 0));
    }

    #[test]
    fn preset_16x2_is_one_block_per_row() {
        let layout = LayoutDescriptor::lcd_16x2();
        assert_eq!(layout.logical_rows(), 2);
        assert_eq!(layout.logical_columns(), 16);
        for row in layout.physical_rows() {
            assert_eq!(row.blocks().len(), 1);
            assert_eq!(row.span(), 16);
        }
        assert_eq!(layout.physical_rows()[1].base_address(), 0x40);
    }

    #[test]
    fn rejects_zero_size() {
        let rows = vec![RowMapping::new(0, 1, vec![BlockMapping::new(0, 0, 1)])];
        assert!(matches!(LayoutDescriptor::new(0, 16, rows.clone()), Err(LcdError::Config(_))));
        assert!(matches!(LayoutDescriptor::new(1, 0, rows), Err(LcdError::Config(_))));
    }

    #[test]
    fn rejects_oversized_grid() {
        let rows = vec![RowMapping::new(0, 16, vec![BlockMapping::new(0, 0, 16)])];
        assert!(matches!(
            LayoutDescriptor::new(usize::MAX / 2, 16, rows.clone()),
            Err(LcdError::Config(_))
        ));
        assert!(matches!(
            LayoutDescriptor::new(MAX_LOGICAL_ROWS + 1, 16, rows.clone()),
            Err(LcdError::Config(_))
        ));
        assert!(matches!(
            LayoutDescriptor::new(1, MAX_PHYSICAL_SPAN + 1, rows),
            Err(LcdError::Config(_))
        ));
    }

    #[test]
    fn rejects_block_offset_overflow() {
        let rows = vec![RowMapping::new(0, 16, vec![BlockMapping::new(0, usize::MAX, 16)])];
        assert!(matches!(LayoutDescriptor::new(1, 16, rows), Err(LcdError::Config(_))));

        let rows = vec![RowMapping::new(0, 16, vec![BlockMapping::new(0, 1, usize::MAX)])];
        assert!(matches!(LayoutDescriptor::new(1, 16, rows), Err(LcdError::Config(_))));
    }

    #[test]
    fn rejects_gap_in_span() {
        let rows = vec![RowMapping::new(0, 20, vec![BlockMapping::new(0, 0, 16)])];
        assert!(matches!(LayoutDescriptor::new(1, 16, rows), Err(LcdError::Config(_))));
    }

    #[test]
    fn rejects_overflowing_span() {
        let rows = vec![RowMapping::new(
            0,
            20,
            vec![BlockMapping::new(0, 0, 16), BlockMapping::new(1, 0, 16)],
        )];
        assert!(matches!(LayoutDescriptor::new(2, 16, rows), Err(LcdError::Config(_))));
    }

    #[test]
    fn rejects_cell_mapped_twice() {
        let rows = vec![
            RowMapping::new(0x00, 8, vec![BlockMapping::new(0, 0, 8)]),
            RowMapping::new(0x40, 8, vec![BlockMapping::new(0, 4, 4), BlockMapping::new(1, 0, 4)]),
        ];
        assert!(matches!(LayoutDescriptor::new(2, 8, rows), Err(LcdError::Config(_))));
    }

    #[test]
    fn rejects_block_outside_grid() {
        let rows = vec![RowMapping::new(0, 16, vec![BlockMapping::new(0, 4, 16)])];
        assert!(matches!(LayoutDescriptor::new(1, 16, rows), Err(LcdError::Config(_))));

        let rows = vec![RowMapping::new(0, 16, vec![BlockMapping::new(2, 0, 16)])];
        assert!(matches!(LayoutDescriptor::new(2, 16, rows), Err(LcdError::Config(_))));
    }

    #[test]
    fn rejects_row_past_ddram_line() {
        let rows = vec![RowMapping::new(0x20, 16, vec![BlockMapping::new(0, 0, 16)])];
        assert!(matches!(LayoutDescriptor::new(1, 16, rows), Err(LcdError::Config(_))));
    }

    #[test]
    fn rejects_overlapping_physical_rows() {
        let rows = vec![
            RowMapping::new(0x00, 16, vec![BlockMapping::new(0, 0, 16)]),
            RowMapping::new(0x08, 16, vec![BlockMapping::new(1, 0, 16)]),
        ];
        assert!(matches!(LayoutDescriptor::new(2, 16, rows), Err(LcdError::Config(_))));
    }

    #[test]
    fn preset_from_config_name() {
        assert_eq!(LayoutPreset::default().descriptor(), LayoutDescriptor::lcd_20x4());
        assert_eq!(LayoutPreset::Lcd16x2.descriptor().logical_columns(), 16);
    }
}
