use crate::Kinetics::rate_model::State;
use nalgebra::{DMatrix, DVector};

/// number of rows shown by `pretty_print`
const ROWS_TO_PRINT: usize = 11;

/// result of a simulation: one row per sample time, one column per species
#[derive(Debug, Clone, PartialEq)]
pub struct TimeSeries {
    species: Vec<String>,
    times: Vec<f64>,
    data: DMatrix<f64>,
}

impl TimeSeries {
    /// builds the table from recorded states, `rows[i]` is the state at `times[i]`
    pub fn new(species: Vec<String>, times: Vec<f64>, rows: &[DVector<f64>]) -> Self {
        let data = DMatrix::from_fn(rows.len(), species.len(), |i, j| rows[i][j]);
        Self {
            species,
            times,
            data,
        }
    }
    pub fn species(&self) -> &[String] {
        &self.species
    }
    pub fn times(&self) -> &[f64] {
        &self.times
    }
    /// concentrations, rows are samples and columns are species
    pub fn data(&self) -> &DMatrix<f64> {
        &self.data
    }
    pub fn len(&self) -> usize {
        self.times.len()
    }
    pub fn is_empty(&self) -> bool {
        self.times.is_empty()
    }
    /// concentration history of one species
    pub fn column(&self, species: &str) -> Option<Vec<f64>> {
        let j = self.species.iter().position(|s| s == species)?;
        Some(self.data.column(j).iter().copied().collect())
    }
    pub fn state_at(&self, row: usize) -> Option<State> {
        if row >= self.data.nrows() {
            return None;
        }
        Some(
            self.species
                .iter()
                .enumerate()
                .map(|(j, s)| (s.clone(), self.data[(row, j)]))
                .collect(),
        )
    }
    pub fn last_state(&self) -> Option<State> {
        self.len().checked_sub(1).and_then(|row| self.state_at(row))
    }
    /// copy without the given species columns (e.g. intermediates)
    pub fn without_species(&self, hidden: &[String]) -> TimeSeries {
        let kept: Vec<usize> = (0..self.species.len())
            .filter(|j| !hidden.contains(&self.species[*j]))
            .collect();
        let species = kept.iter().map(|j| self.species[*j].clone()).collect();
        let data = DMatrix::from_fn(self.data.nrows(), kept.len(), |i, k| {
            self.data[(i, kept[k])]
        });
        TimeSeries {
            species,
            times: self.times.clone(),
            data,
        }
    }
    /// prints evenly spread rows of the series as a table
    pub fn pretty_print(&self) {
        use prettytable::{Cell, Row, Table};
        println!(
            "\n=== TIME SERIES: {} points, {} species ===",
            self.len(),
            self.species.len()
        );
        let mut table = Table::new();
        let mut header = vec![Cell::new("t")];
        header.extend(self.species.iter().map(|s| Cell::new(s)));
        table.add_row(Row::new(header));
        let stride = (self.len() / (ROWS_TO_PRINT - 1)).max(1);
        let mut rows: Vec<usize> = (0..self.len()).step_by(stride).collect();
        if let Some(last) = self.len().checked_sub(1) {
            if rows.last() != Some(&last) {
                rows.push(last);
            }
        }
        for i in rows {
            let mut cells = vec![Cell::new(&format!("{:.4}", self.times[i]))];
            cells.extend(
                self.data
                    .row(i)
                    .iter()
                    .map(|c| Cell::new(&format!("{:.6e}", c))),
            );
            table.add_row(Row::new(cells));
        }
        table.printstd();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn series() -> TimeSeries {
        let rows = vec![
            DVector::from_vec(vec![1.0, 0.0, 0.0]),
            DVector::from_vec(vec![0.5, 0.25, 0.25]),
            DVector::from_vec(vec![0.0, 0.5, 0.5]),
        ];
        TimeSeries::new(
            vec!["A".to_string(), "B".to_string(), "C".to_string()],
            vec![0.0, 1.0, 2.0],
            &rows,
        )
    }

    #[test]
    fn test_accessors() {
        let ts = series();
        assert_eq!(ts.len(), 3);
        assert_eq!(ts.times(), &[0.0, 1.0, 2.0]);
        assert_eq!(ts.column("B"), Some(vec![0.0, 0.25, 0.5]));
        assert_eq!(ts.column("X"), None);
        assert_eq!(ts.state_at(1).unwrap()["A"], 0.5);
        assert_eq!(ts.state_at(3), None);
        assert_eq!(ts.last_state().unwrap()["C"], 0.5);
        ts.pretty_print();
    }

    #[test]
    fn test_without_species() {
        let ts = series().without_species(&["B".to_string()]);
        assert_eq!(ts.species(), &["A", "C"]);
        assert_eq!(ts.data().ncols(), 2);
        assert_eq!(ts.column("C"), Some(vec![0.0, 0.25, 0.5]));
    }

    #[test]
    fn test_empty_series() {
        let ts = TimeSeries::new(vec!["A".to_string()], vec![], &[]);
        assert!(ts.is_empty());
        assert_eq!(ts.last_state(), None);
    }
}
