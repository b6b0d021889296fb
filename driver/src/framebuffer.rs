use log::warn;

/// Character code of the blank cell.
pub const SPACE: u8 = 0x20;
/// Stand-in for characters the controller's ROM cannot show.
pub const REPLACEMENT: u8 = b'?';

/// The logical text grid, plus a revision counter bumped on every mutation.
#[derive(Debug, Clone)]
pub struct FrameBuffer {
    rows: usize,
    columns: usize,
    cells: Vec<u8>,
    revision: u32,
}

impl FrameBuffer {
    /// Creates a blank grid. The revision starts at zero.
    pub fn new(rows: usize, columns: usize) -> Self {
        FrameBuffer {
            rows,
            columns,
            cells: vec![SPACE; rows * columns],
            revision: 0,
        }
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn columns(&self) -> usize {
        self.columns
    }

    pub fn revision(&self) -> u32 {
        self.revision
    }

    /// Marks the content as changed.
    pub fn invalidate(&mut self) {
        self.revision = self.revision.wrapping_add(1);
    }

    /// Fills every cell with spaces.
    pub fn clear(&mut self) {
        self.cells.fill(SPACE);
        self.invalidate();
    }

    pub fn row(&self, row: usize) -> &[u8] {
        &self.cells[row * self.columns..(row + 1) * self.columns]
    }

    /// Writes raw character codes left to right from `(row, column)`.
    ///
    /// Nothing happens if `bytes` is empty, `row` is outside the grid, or `column` is past the
    /// last column. Otherwise, codes landing outside `0..columns` are dropped and the revision is
    /// bumped once.
    pub fn write_bytes(&mut self, bytes: &[u8], row: isize, column: isize) {
        if bytes.is_empty()
            || row < 0
            || row as usize >= self.rows
            || column >= self.columns as isize
        {
            return;
        }

        let start = row as usize * self.columns;
        for (i, &byte) in bytes.iter().enumerate() {
            let x = column + i as isize;
            if x >= 0 && (x as usize) < self.columns {
                self.cells[start + x as usize] = byte;
            }
        }

        self.invalidate();
    }

    /// Same as [Self::write_bytes], one cell per `char`. Characters outside ASCII are written as
    /// [REPLACEMENT].
    pub fn write_text(&mut self, text: &str, row: isize, column: isize) {
        let bytes: Vec<u8> = text
            .chars()
            .map(|c| {
                if c.is_ascii() {
                    c as u8
                } else {
                    warn!("Non-ASCII character: {}", c);
                    REPLACEMENT
                }
            })
            .collect();
        self.write_bytes(&bytes, row, column);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn text(fb: &FrameBuffer, row: usize) -> String {
        String::from_utf8_lossy(fb.row(row)).into_owned()
    }

    #[test]
    fn starts_blank() {
        let fb = FrameBuffer::new(2, 16);
        assert_eq!(text(&fb, 0), " ".repeat(16));
        assert_eq!(text(&fb, 1), " ".repeat(16));
        assert_eq!(fb.revision(), 0);
    }

    #[test]
    fn writes_and_bumps_revision_once() {
        let mut fb = FrameBuffer::new(2, 16);
        fb.write_text("Hello", 1, 2);
        assert_eq!(text(&fb, 1), "  Hello         ");
        assert_eq!(fb.revision(), 1);
    }

    #[test]
    fn clips_at_right_edge() {
        let mut fb = FrameBuffer::new(2, 16);
        fb.write_text("ABC", 0, 15);
        assert_eq!(text(&fb, 0), format!("{}A", " ".repeat(15)));
        assert_eq!(text(&fb, 1), " ".repeat(16));
    }

    #[test]
    fn clips_at_left_edge() {
        let mut fb = FrameBuffer::new(1, 8);
        fb.write_text("ABCDE", 0, -3);
        assert_eq!(text(&fb, 0), "DE      ");
        assert_eq!(fb.revision(), 1);
    }

    #[test]
    fn out_of_range_is_noop() {
        let mut fb = FrameBuffer::new(2, 16);
        fb.write_text("", 0, 0);
        fb.write_text("x", -1, 0);
        fb.write_text("x", 2, 0);
        fb.write_text("x", 0, 16);
        assert_eq!(fb.revision(), 0);
        assert_eq!(text(&fb, 0), " ".repeat(16));
    }

    #[test]
    fn last_write_wins() {
        let mut fb = FrameBuffer::new(1, 8);
        fb.write_text("AAAA", 0, 0);
        fb.write_text("BB", 0, 1);
        assert_eq!(text(&fb, 0), "ABBA    ");
        assert_eq!(fb.revision(), 2);
    }

    #[test]
    fn non_ascii_is_replaced() {
        let mut fb = FrameBuffer::new(1, 4);
        fb.write_text("a\u{e9}\u{1}", 0, 0);
        assert_eq!(fb.row(0), &[b'a', REPLACEMENT, 0x01, SPACE]);
    }

    #[test]
    fn clear_blanks_and_bumps() {
        let mut fb = FrameBuffer::new(2, 4);
        fb.write_text("abcd", 0, 0);
        fb.clear();
        assert_eq!(text(&fb, 0), "    ");
        assert_eq!(fb.revision(), 2);
    }

    #[test]
    fn revision_wraps() {
        let mut fb = FrameBuffer::new(1, 1);
        fb.revision = u32::MAX;
        fb.invalidate();
        assert_eq!(fb.revision(), 0);
    }
}
