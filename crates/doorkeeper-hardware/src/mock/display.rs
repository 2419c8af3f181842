//! Virtual character LCD.
//!
//! Simulates a 20x4 HD44780-style display: a cursor, a grid of cells, and
//! printing that stops at the right edge. The frame is shared with a
//! [`DisplayHandle`] so tests (or a console renderer) can read what is on
//! screen while the controller owns the display.
//!
//! # Examples
//!
//! ```
//! use doorkeeper_hardware::mock::VirtualDisplay;
//! use doorkeeper_hardware::traits::DisplayDevice;
//!
//! #[tokio::main]
//! async fn main() -> doorkeeper_hardware::Result<()> {
//!     let (mut display, handle) = VirtualDisplay::new(20, 4);
//!
//!     display.print_at(0, 0, "Enter password:").await?;
//!     display.print_at(0, 1, "****").await?;
//!
//!     assert_eq!(handle.line(0).trim_end(), "Enter password:");
//!     assert_eq!(handle.line(1).trim_end(), "****");
//!     Ok(())
//! }
//! ```

use std::sync::{Arc, Mutex, MutexGuard};

use doorkeeper_core::constants::{LCD_COLUMNS, LCD_ROWS};

use crate::text::sanitize_text;
use crate::traits::DisplayDevice;
use crate::{HardwareError, Result};

type Frame = Arc<Mutex<Vec<String>>>;

fn lock(frame: &Frame) -> MutexGuard<'_, Vec<String>> {
    frame.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Virtual LCD implementing [`DisplayDevice`].
#[derive(Debug)]
pub struct VirtualDisplay {
    /// Number of columns per line.
    columns: usize,

    /// Number of lines.
    rows: usize,

    /// Cursor as (column, row).
    cursor: (usize, usize),

    /// Shared screen contents, one fixed-width string per row.
    frame: Frame,
}

impl VirtualDisplay {
    /// Create a blank display of the given size.
    pub fn new(columns: usize, rows: usize) -> (Self, DisplayHandle) {
        let frame = Arc::new(Mutex::new(vec![" ".repeat(columns); rows]));

        let display = Self {
            columns,
            rows,
            cursor: (0, 0),
            frame: frame.clone(),
        };

        (display, DisplayHandle { frame })
    }

    /// Create a blank 20x4 display.
    pub fn lcd2004() -> (Self, DisplayHandle) {
        Self::new(LCD_COLUMNS, LCD_ROWS)
    }
}

impl DisplayDevice for VirtualDisplay {
    async fn clear(&mut self) -> Result<()> {
        let mut frame = lock(&self.frame);
        for line in frame.iter_mut() {
            *line = " ".repeat(self.columns);
        }
        self.cursor = (0, 0);
        Ok(())
    }

    async fn set_cursor(&mut self, column: usize, row: usize) -> Result<()> {
        if row >= self.rows || column >= self.columns {
            return Err(HardwareError::invalid_data(format!(
                "Cursor ({column}, {row}) outside {}x{} display",
                self.columns, self.rows
            )));
        }
        self.cursor = (column, row);
        Ok(())
    }

    async fn print(&mut self, text: &str) -> Result<()> {
        let (column, row) = self.cursor;
        let mut frame = lock(&self.frame);
        let Some(line) = frame.get_mut(row) else {
            return Ok(());
        };

        let mut cells: Vec<char> = line.chars().collect();
        let mut written = 0;
        for (offset, ch) in sanitize_text(text).chars().enumerate() {
            let Some(cell) = cells.get_mut(column + offset) else {
                break;
            };
            *cell = ch;
            written += 1;
        }
        *line = cells.into_iter().collect();
        self.cursor = ((column + written).min(self.columns), row);
        Ok(())
    }

    fn dimensions(&self) -> (usize, usize) {
        (self.columns, self.rows)
    }
}

/// Read-only view of a [`VirtualDisplay`]'s screen.
#[derive(Debug, Clone)]
pub struct DisplayHandle {
    frame: Frame,
}

impl DisplayHandle {
    /// Text of one row, padded to the display width. Empty if out of range.
    pub fn line(&self, row: usize) -> String {
        lock(&self.frame).get(row).cloned().unwrap_or_default()
    }

    /// Every row, top to bottom.
    pub fn lines(&self) -> Vec<String> {
        lock(&self.frame).clone()
    }

    /// Whether any row contains `needle`.
    pub fn contains(&self, needle: &str) -> bool {
        lock(&self.frame).iter().any(|line| line.contains(needle))
    }

    /// The screen as one string, rows separated by newlines and trailing
    /// blanks trimmed.
    pub fn render(&self) -> String {
        lock(&self.frame)
            .iter()
            .map(|line| line.trim_end())
            .collect::<Vec<_>>()
            .join("\n")
    }
}
