use serde::{Deserialize, Serialize};

/// Rows of per-cell activation levels in `[0, 1]`.
///
/// Serialises as a plain JSON array of arrays, which is what heatmap
/// clients consume.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ActivityMatrix {
    rows: Vec<Vec<f32>>,
}

impl ActivityMatrix {
    /// A matrix where every element is exactly `0.0`.
    pub fn silent(rows: usize, columns: usize) -> Self {
        Self {
            rows: vec![vec![0.0; columns]; rows],
        }
    }

    pub(crate) fn from_rows(rows: Vec<Vec<f32>>) -> Self {
        Self { rows }
    }

    pub fn rows(&self) -> &[Vec<f32>] {
        &self.rows
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn column_count(&self) -> usize {
        self.rows.first().map_or(0, Vec::len)
    }

    pub fn cell_count(&self) -> usize {
        self.rows.iter().map(Vec::len).sum()
    }

    pub fn get(&self, row: usize, column: usize) -> Option<f32> {
        self.rows.get(row)?.get(column).copied()
    }

    pub fn values(&self) -> impl Iterator<Item = f32> + '_ {
        self.rows.iter().flatten().copied()
    }

    pub fn total(&self) -> f32 {
        self.values().sum()
    }

    pub fn active_count(&self) -> usize {
        self.values().filter(|v| *v != 0.0).count()
    }

    pub fn is_silent(&self) -> bool {
        self.values().all(|v| v == 0.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn silent_matrix_shape_and_values() {
        let m = ActivityMatrix::silent(3, 4);
        assert_eq!(m.row_count(), 3);
        assert_eq!(m.column_count(), 4);
        assert_eq!(m.cell_count(), 12);
        assert!(m.is_silent());
        assert_eq!(m.total(), 0.0);
    }

    #[test]
    fn serialises_as_nested_arrays() {
        let m = ActivityMatrix::from_rows(vec![vec![0.0, 0.5], vec![1.0, 0.0]]);
        let json = serde_json::to_string(&m).unwrap();
        assert_eq!(json, "[[0.0,0.5],[1.0,0.0]]");

        let back: ActivityMatrix = serde_json::from_str(&json).unwrap();
        assert_eq!(back.active_count(), 2);
        assert_eq!(back.get(1, 0), Some(1.0));
        assert_eq!(back.get(2, 0), None);
    }

    #[test]
    fn zero_rows_reports_zero_columns() {
        let m = ActivityMatrix::silent(0, 5);
        assert_eq!(m.row_count(), 0);
        assert_eq!(m.column_count(), 0);
        assert!(m.rows().is_empty());
    }
}
