//! Deterministic frame construction.
//!
//! Every column of a built frame holds `1.0, 2.0, ..., rows`, so the receiver
//! can detect corruption by checking that the last row equals the row count.

use crate::proto::{DataColumn, DataFrame, Datum};

/// Name of the 1-indexed column `index`.
pub fn column_name(index: usize) -> String {
    format!("col_{index}")
}

/// Builds a `rows` x `cols` frame where row `i` (1-indexed) of every column
/// holds the value `i`.
pub fn build_frame(rows: usize, cols: usize) -> DataFrame {
    let columns = (1..=cols)
        .map(|col| DataColumn {
            name: column_name(col),
            data: (1..=rows).map(|row| Datum::float(row as f64)).collect(),
        })
        .collect();

    DataFrame { columns }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_cell_holds_its_row_number() {
        for (rows, cols) in [(1, 1), (3, 7), (100, 5), (17, 1)] {
            let frame = build_frame(rows, cols);
            assert_eq!(frame.col_count(), cols);
            assert_eq!(frame.row_count(), rows);

            for (j, column) in frame.columns.iter().enumerate() {
                assert_eq!(column.name, format!("col_{}", j + 1));
                assert_eq!(column.data.len(), rows);
                for (i, datum) in column.data.iter().enumerate() {
                    assert_eq!(datum.as_f64(), Some((i + 1) as f64));
                }
            }
        }
    }

    #[test]
    fn column_names_are_unique() {
        let frame = build_frame(2, 50);
        let mut names: Vec<_> = frame.columns.iter().map(|c| c.name.as_str()).collect();
        names.sort_unstable();
        names.dedup();
        assert_eq!(names.len(), 50);
    }

    #[test]
    fn zero_columns_yield_an_empty_frame() {
        let frame = build_frame(10, 0);
        assert_eq!(frame.col_count(), 0);
        assert_eq!(frame.row_count(), 0);
    }
}
