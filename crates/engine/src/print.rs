//! Rendering of the printable rectangle to an output stream.
//!
//! Cells within a row are tab-separated, rows end with a newline, and
//! positions without a cell emit an empty field.

use std::io::{self, Write};

use crate::cell::Cell;
use crate::position::Position;
use crate::sheet::Sheet;

impl Sheet {
    /// Write every cell's value; evaluation errors appear as their
    /// `#...!` sentinel.
    pub fn print_values<W: Write>(&self, out: &mut W) -> io::Result<()> {
        self.print_grid(out, |cell| cell.value().to_string())
    }

    /// Write every cell's stored text (formulas canonicalised, quotes kept).
    pub fn print_texts<W: Write>(&self, out: &mut W) -> io::Result<()> {
        self.print_grid(out, |cell| cell.text())
    }

    fn print_grid<W, F>(&self, out: &mut W, render: F) -> io::Result<()>
    where
        W: Write,
        F: Fn(&Cell) -> String,
    {
        let size = self.printable_size();
        for row in 0..size.rows {
            for col in 0..size.cols {
                if col > 0 {
                    out.write_all(b"\t")?;
                }
                if let Ok(Some(cell)) = self.get_cell(Position::new(row, col)) {
                    out.write_all(render(cell).as_bytes())?;
                }
            }
            out.write_all(b"\n")?;
        }
        Ok(())
    }
}
