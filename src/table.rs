//! Named numeric columns of equal length.
//!
//! Used for the astrometric star table, the photometric catalog and its
//! intersection with the stars, and the tabulated ephemeris. Masked entries
//! are stored as NaN and read back as `None` by [`ColumnTable::value`].
use crate::exarata_errors::ExarataError;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ColumnTable {
    names: Vec<String>,
    columns: Vec<Vec<f64>>,
}

impl ColumnTable {
    /// An empty table with the given columns.
    pub fn new<S: AsRef<str>>(names: &[S]) -> Self {
        ColumnTable {
            names: names.iter().map(|n| n.as_ref().to_string()).collect(),
            columns: vec![Vec::new(); names.len()],
        }
    }

    /// Build a table from whole columns, which must share a length.
    pub fn from_columns(columns: Vec<(String, Vec<f64>)>) -> Result<Self, ExarataError> {
        let length = columns.first().map_or(0, |(_, values)| values.len());
        if let Some((name, values)) = columns.iter().find(|(_, values)| values.len() != length) {
            return Err(ExarataError::Input(format!(
                "The column `{name}` has {} rows, the table has {length}",
                values.len()
            )));
        }
        let (names, columns) = columns.into_iter().unzip();
        Ok(ColumnTable { names, columns })
    }

    pub fn len(&self) -> usize {
        self.columns.first().map_or(0, Vec::len)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn column_names(&self) -> &[String] {
        &self.names
    }

    fn index_of(&self, name: &str) -> Option<usize> {
        self.names.iter().position(|n| n == name)
    }

    pub fn column(&self, name: &str) -> Option<&[f64]> {
        self.index_of(name).map(|index| self.columns[index].as_slice())
    }

    /// The column, or an [`ExarataError::Input`] naming it.
    pub fn require_column(&self, name: &str) -> Result<&[f64], ExarataError> {
        self.column(name)
            .ok_or_else(|| ExarataError::Input(format!("The table has no `{name}` column")))
    }

    /// A single entry, `None` when masked or out of range.
    pub fn value(&self, name: &str, row: usize) -> Option<f64> {
        self.column(name)?.get(row).copied().filter(|v| v.is_finite())
    }

    /// Append a row, values in column order.
    pub fn push_row(&mut self, row: &[f64]) -> Result<(), ExarataError> {
        if row.len() != self.columns.len() {
            return Err(ExarataError::Input(format!(
                "A row of {} values cannot be added to a table of {} columns",
                row.len(),
                self.columns.len()
            )));
        }
        for (column, value) in self.columns.iter_mut().zip(row) {
            column.push(*value);
        }
        Ok(())
    }

    /// Rename a column; returns whether it existed.
    pub fn rename_column(&mut self, old: &str, new: &str) -> bool {
        match self.index_of(old) {
            Some(index) => {
                self.names[index] = new.to_string();
                true
            }
            None => false,
        }
    }
}

#[cfg(test)]
mod table_test {
    use super::*;

    #[test]
    fn test_rows_and_masked_values() {
        let mut table = ColumnTable::new(&["ra", "dec"]);
        table.push_row(&[10.0, -5.0]).unwrap();
        table.push_row(&[11.0, f64::NAN]).unwrap();
        assert_eq!(table.len(), 2);
        assert_eq!(table.value("dec", 0), Some(-5.0));
        assert_eq!(table.value("dec", 1), None);
        assert_eq!(table.value("dec", 7), None);
        assert!(table.push_row(&[1.0]).is_err());

        assert!(table.rename_column("ra", "ra_astro"));
        assert_eq!(table.column("ra_astro"), Some(&[10.0, 11.0][..]));
        assert!(table.require_column("ra").is_err());
    }

    #[test]
    fn test_from_columns_requires_equal_lengths() {
        let bad = ColumnTable::from_columns(vec![
            ("a".into(), vec![1.0, 2.0]),
            ("b".into(), vec![1.0]),
        ]);
        assert!(matches!(bad, Err(ExarataError::Input(_))));
        let empty = ColumnTable::from_columns(Vec::new()).unwrap();
        assert!(empty.is_empty());
    }
}
