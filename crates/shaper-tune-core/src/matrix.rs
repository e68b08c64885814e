//! Contiguous row-major sample storage.
//!
//! Raw accelerometer captures are a table of `time, accel_x, accel_y,
//! accel_z, ...` rows. [`Matrix`] owns one such table in a single buffer and
//! [`MatrixView`] borrows a range of its rows, which lets long captures be
//! processed in batches without copying.

use crate::error::{CalibrateError, Result};
use std::ops::Range;

/// Column holding the sample timestamp in seconds.
pub const TIME_COLUMN: usize = 0;
/// Columns holding the X, Y and Z acceleration.
pub const ACCEL_COLUMNS: [usize; 3] = [1, 2, 3];
/// Minimum number of columns a raw sample table must carry.
pub const MIN_SAMPLE_COLUMNS: usize = 4;

#[derive(Clone, Debug, Default, PartialEq)]
pub struct Matrix {
    data: Vec<f64>,
    rows: usize,
    cols: usize,
}

impl Matrix {
    /// Empty matrix with room for `rows` rows of `cols` values.
    pub fn with_capacity(rows: usize, cols: usize) -> Self {
        Self {
            data: Vec::with_capacity(rows * cols),
            rows: 0,
            cols,
        }
    }

    /// Append one row. The row must match the matrix width.
    pub fn push_row(&mut self, row: &[f64]) -> Result<()> {
        if row.len() != self.cols {
            return Err(CalibrateError::RowLength {
                row: self.rows,
                expected: self.cols,
                actual: row.len(),
            });
        }
        self.data.extend_from_slice(row);
        self.rows += 1;
        Ok(())
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    pub fn is_empty(&self) -> bool {
        self.rows == 0
    }

    pub fn get(&self, row: usize, col: usize) -> f64 {
        self.data[row * self.cols + col]
    }

    pub fn row(&self, row: usize) -> &[f64] {
        &self.data[row * self.cols..(row + 1) * self.cols]
    }

    /// Borrow every row.
    pub fn view(&self) -> MatrixView<'_> {
        MatrixView {
            data: &self.data,
            rows: self.rows,
            cols: self.cols,
        }
    }

    /// Borrow a contiguous range of rows.
    pub fn row_range(&self, range: Range<usize>) -> MatrixView<'_> {
        self.view().row_range(range)
    }

    /// Split into consecutive views of `batch_rows` rows. A trailing partial
    /// batch is dropped.
    pub fn batches(&self, batch_rows: usize) -> impl Iterator<Item = MatrixView<'_>> + '_ {
        let count = if batch_rows == 0 {
            0
        } else {
            self.rows / batch_rows
        };
        (0..count).map(move |i| self.row_range(i * batch_rows..(i + 1) * batch_rows))
    }
}

/// Borrowed, read-only window over the rows of a [`Matrix`].
#[derive(Clone, Copy, Debug)]
pub struct MatrixView<'a> {
    data: &'a [f64],
    rows: usize,
    cols: usize,
}

impl<'a> MatrixView<'a> {
    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    pub fn is_empty(&self) -> bool {
        self.rows == 0
    }

    pub fn get(&self, row: usize, col: usize) -> f64 {
        self.data[row * self.cols + col]
    }

    pub fn row(&self, row: usize) -> &'a [f64] {
        &self.data[row * self.cols..(row + 1) * self.cols]
    }

    /// Copy one column out into its own buffer.
    pub fn column(&self, col: usize) -> Vec<f64> {
        (0..self.rows).map(|row| self.get(row, col)).collect()
    }

    pub fn row_range(&self, range: Range<usize>) -> MatrixView<'a> {
        let end = range.end.min(self.rows);
        let start = range.start.min(end);
        MatrixView {
            data: &self.data[start * self.cols..end * self.cols],
            rows: end - start,
            cols: self.cols,
        }
    }
}
