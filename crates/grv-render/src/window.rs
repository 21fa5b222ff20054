//! Rendering primitives (spec.md §4.6): a `Window` is a fixed-size grid of
//! `Cell`s; a `LineBuilder` writes one row at a time, expanding tabs,
//! escaping non-printable code points, and giving wide glyphs two cells.

use crate::theme::ThemeComponentId;
use bitflags::bitflags;
use unicode_segmentation::UnicodeSegmentation;
use unicode_width::UnicodeWidthStr;

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct Attrs: u8 {
        const BOLD    = 0b001;
        const DIM     = 0b010;
        const REVERSE = 0b100;
    }
}

/// One terminal cell. `cluster` holds the grapheme for a leader cell and is
/// empty for the continuation cell of a wide glyph.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cell {
    pub cluster: String,
    pub width: u8,
    pub component: ThemeComponentId,
    pub attrs: Attrs,
}

impl Cell {
    pub fn blank() -> Self {
        Self {
            cluster: " ".to_string(),
            width: 1,
            component: ThemeComponentId::Default,
            attrs: Attrs::empty(),
        }
    }

    pub fn is_leader(&self) -> bool {
        self.width > 0
    }
}

impl Default for Cell {
    fn default() -> Self {
        Self::blank()
    }
}

/// A fixed-size grid of cells. Stateless regarding scrolling (spec.md §4.6):
/// callers decide what row range of a logical document maps to row 0.
#[derive(Debug, Clone)]
pub struct Window {
    pub rows: u16,
    pub cols: u16,
    cells: Vec<Cell>,
}

impl Window {
    pub fn new(rows: u16, cols: u16) -> Self {
        Self {
            rows,
            cols,
            cells: vec![Cell::default(); rows as usize * cols as usize],
        }
    }

    fn index(&self, row: u16, col: u16) -> Option<usize> {
        if row < self.rows && col < self.cols {
            Some(row as usize * self.cols as usize + col as usize)
        } else {
            None
        }
    }

    pub fn cell(&self, row: u16, col: u16) -> Option<&Cell> {
        self.index(row, col).map(|i| &self.cells[i])
    }

    pub fn clear_row(&mut self, row: u16) {
        if row >= self.rows {
            return;
        }
        for col in 0..self.cols {
            if let Some(i) = self.index(row, col) {
                self.cells[i] = Cell::default();
            }
        }
    }

    /// Paint `text` into `row` starting at `col`, returning a `LineBuilder`
    /// bound to that row for convenience chaining.
    pub fn line(&mut self, row: u16) -> LineBuilder<'_> {
        LineBuilder {
            window: self,
            row,
            col: 0,
        }
    }

    /// Set `component`'s colours over an already-written span, used by the
    /// search highlight overlay to re-theme matched byte ranges.
    pub fn apply_component_span(&mut self, row: u16, start_col: u16, width: u16, component: ThemeComponentId) {
        for dx in 0..width {
            if let Some(i) = self.index(row, start_col + dx) {
                self.cells[i].component = component;
            }
        }
    }

    /// Copy `src` into `self` at `(row_offset, col_offset)`, clipping
    /// whatever falls outside `self`'s bounds. Used to compose a child
    /// view's window into its parent's region.
    pub fn blit(&mut self, src: &Window, row_offset: u16, col_offset: u16) {
        for row in 0..src.rows {
            let dst_row = row + row_offset;
            if dst_row >= self.rows {
                continue;
            }
            for col in 0..src.cols {
                let dst_col = col + col_offset;
                if dst_col >= self.cols {
                    continue;
                }
                if let (Some(si), Some(di)) = (src.index(row, col), self.index(dst_row, dst_col)) {
                    self.cells[di] = src.cells[si].clone();
                }
            }
        }
    }

    pub fn row_text(&self, row: u16) -> String {
        if row >= self.rows {
            return String::new();
        }
        (0..self.cols)
            .filter_map(|col| self.cell(row, col))
            .filter(|c| c.is_leader())
            .map(|c| c.cluster.as_str())
            .collect()
    }
}

pub struct LineBuilder<'w> {
    window: &'w mut Window,
    row: u16,
    col: u16,
}

impl<'w> LineBuilder<'w> {
    pub fn at(mut self, col: u16) -> Self {
        self.col = col;
        self
    }

    /// Write `text`, expanding tabs to `tab_width`, rendering non-printable
    /// code points as `^X`, and giving wide glyphs two cells.
    pub fn write(mut self, text: &str, component: ThemeComponentId, attrs: Attrs, tab_width: u16) -> Self {
        for grapheme in text.graphemes(true) {
            if self.col >= self.window.cols {
                break;
            }
            if grapheme == "\t" {
                let next_stop = ((self.col / tab_width) + 1) * tab_width;
                let next_stop = next_stop.min(self.window.cols);
                while self.col < next_stop {
                    self.put_cell(" ", 1, component, attrs);
                }
                continue;
            }
            if let Some(ctrl) = non_printable_caret(grapheme) {
                self.put_cell(&ctrl, 2, component, attrs);
                continue;
            }
            let w = grapheme.width().max(1) as u16;
            self.put_cell(grapheme, w, component, attrs);
        }
        self
    }

    fn put_cell(&mut self, cluster: &str, width: u16, component: ThemeComponentId, attrs: Attrs) {
        let width = width.min(self.window.cols.saturating_sub(self.col)).max(1);
        if let Some(i) = self.window.index(self.row, self.col) {
            self.window.cells[i] = Cell {
                cluster: cluster.to_string(),
                width: width as u8,
                component,
                attrs,
            };
        }
        for dx in 1..width {
            if let Some(i) = self.window.index(self.row, self.col + dx) {
                self.window.cells[i] = Cell {
                    cluster: String::new(),
                    width: 0,
                    component,
                    attrs,
                };
            }
        }
        self.col = self.col.saturating_add(width);
    }

    pub fn col(&self) -> u16 {
        self.col
    }
}

/// Spell a single non-printable ASCII control code point as `^X` notation
/// (spec.md §4.6); returns `None` for anything that prints normally.
fn non_printable_caret(grapheme: &str) -> Option<String> {
    let mut chars = grapheme.chars();
    let c = chars.next()?;
    if chars.next().is_some() {
        return None;
    }
    if (c as u32) < 0x20 && c != '\t' {
        let caret = ((c as u8) + 0x40) as char;
        Some(format!("^{caret}"))
    } else if c as u32 == 0x7f {
        Some("^?".to_string())
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tabs_expand_to_the_next_stop() {
        let mut window = Window::new(1, 20);
        window.line(0).at(0).write("a\tb", ThemeComponentId::Default, Attrs::empty(), 4);
        assert_eq!(window.row_text(0).trim_end(), "a   b");
    }

    #[test]
    fn control_characters_render_as_caret_notation() {
        let mut window = Window::new(1, 10);
        window.line(0).write("\x01", ThemeComponentId::Default, Attrs::empty(), 4);
        assert_eq!(window.cell(0, 0).unwrap().cluster, "^A");
        assert_eq!(window.cell(0, 0).unwrap().width, 2);
    }

    #[test]
    fn wide_glyph_occupies_two_cells() {
        let mut window = Window::new(1, 10);
        window.line(0).write("\u{4e2d}", ThemeComponentId::Default, Attrs::empty(), 4);
        let leader = window.cell(0, 0).unwrap();
        assert_eq!(leader.width, 2);
        let continuation = window.cell(0, 1).unwrap();
        assert!(!continuation.is_leader());
    }

    #[test]
    fn apply_component_span_re_themes_written_cells() {
        let mut window = Window::new(1, 10);
        window
            .line(0)
            .write("hello", ThemeComponentId::Default, Attrs::empty(), 4);
        window.apply_component_span(0, 1, 3, ThemeComponentId::AllViewSearchMatch);
        assert_eq!(window.cell(0, 1).unwrap().component, ThemeComponentId::AllViewSearchMatch);
        assert_eq!(window.cell(0, 0).unwrap().component, ThemeComponentId::Default);
    }
}
