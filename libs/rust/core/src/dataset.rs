//! Labeled regression observations and their CSV form (`date,y,X`).

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DatasetError {
    #[error("csv error: {0}")] Csv(#[from] csv::Error),
    #[error("io error: {0}")] Io(#[from] std::io::Error),
    #[error("dataset has no rows")] Empty,
    #[error("row {row} has a non-finite value")] NonFinite { row: usize },
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Observation {
    pub date: NaiveDate,
    pub y: f64,
    #[serde(rename = "X")]
    pub x: f64,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Dataset {
    rows: Vec<Observation>,
}

impl Dataset {
    pub fn new(rows: Vec<Observation>) -> Self { Self { rows } }

    /// Parse a CSV body with a `date,y,X` header (column order is free).
    /// Empty files and non-finite values are rejected.
    pub fn from_csv(bytes: &[u8]) -> Result<Self, DatasetError> {
        let mut reader = csv::ReaderBuilder::new().trim(csv::Trim::All).from_reader(bytes);
        let mut rows = Vec::new();
        for (i, rec) in reader.deserialize::<Observation>().enumerate() {
            let obs = rec?;
            if !obs.x.is_finite() || !obs.y.is_finite() { return Err(DatasetError::NonFinite { row: i + 1 }); }
            rows.push(obs);
        }
        if rows.is_empty() { return Err(DatasetError::Empty); }
        Ok(Self { rows })
    }

    pub fn to_csv(&self) -> Result<Vec<u8>, DatasetError> {
        let mut writer = csv::Writer::from_writer(Vec::new());
        for row in &self.rows { writer.serialize(row)?; }
        writer.into_inner().map_err(|e| DatasetError::Io(e.into_error()))
    }

    pub fn rows(&self) -> &[Observation] { &self.rows }
    pub fn len(&self) -> usize { self.rows.len() }
    pub fn is_empty(&self) -> bool { self.rows.is_empty() }
    pub fn features(&self) -> Vec<f64> { self.rows.iter().map(|r| r.x).collect() }
    pub fn labels(&self) -> Vec<f64> { self.rows.iter().map(|r| r.y).collect() }
    pub fn latest_date(&self) -> Option<NaiveDate> { self.rows.iter().map(|r| r.date).max() }

    /// Append all rows of `other`, keeping their order.
    pub fn extend(&mut self, other: Dataset) { self.rows.extend(other.rows); }
}

impl FromIterator<Dataset> for Dataset {
    fn from_iter<I: IntoIterator<Item = Dataset>>(iter: I) -> Self {
        let mut out = Dataset::default();
        for ds in iter { out.extend(ds); }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "date,y,X\n2021-07-15,20.0,10.0\n2021-07-15,40.0,20.0\n2021-07-16,59.0,30.0\n";

    #[test]
    fn parses_rows_by_header_name() {
        let ds = Dataset::from_csv(SAMPLE.as_bytes()).unwrap();
        assert_eq!(ds.len(), 3);
        assert_eq!(ds.features(), vec![10.0, 20.0, 30.0]);
        assert_eq!(ds.labels(), vec![20.0, 40.0, 59.0]);
        assert_eq!(ds.latest_date(), NaiveDate::from_ymd_opt(2021, 7, 16));

        let reordered = "X,date,y\n10.0,2021-07-15,20.0\n";
        let ds = Dataset::from_csv(reordered.as_bytes()).unwrap();
        assert_eq!(ds.rows()[0].x, 10.0);
        assert_eq!(ds.rows()[0].y, 20.0);
    }

    #[test]
    fn csv_output_keeps_schema_columns() {
        let ds = Dataset::from_csv(SAMPLE.as_bytes()).unwrap();
        let text = String::from_utf8(ds.to_csv().unwrap()).unwrap();
        assert!(text.starts_with("date,y,X\n"));
        assert_eq!(Dataset::from_csv(text.as_bytes()).unwrap(), ds);
    }

    #[test]
    fn rejects_empty_and_malformed_input() {
        assert!(matches!(Dataset::from_csv(b"date,y,X\n"), Err(DatasetError::Empty)));
        assert!(matches!(Dataset::from_csv(b"date,y,X\n2021-07-15,abc,1.0\n"), Err(DatasetError::Csv(_))));
        assert!(matches!(Dataset::from_csv(b"date,y\n2021-07-15,1.0\n"), Err(DatasetError::Csv(_))));
        assert!(matches!(Dataset::from_csv(b"date,y,X\n2021-07-15,NaN,1.0\n"), Err(DatasetError::NonFinite { row: 1 })));
    }

    #[test]
    fn concatenation_preserves_order() {
        let a = Dataset::from_csv(b"date,y,X\n2021-07-15,1.0,1.0\n").unwrap();
        let b = Dataset::from_csv(b"date,y,X\n2021-07-16,2.0,2.0\n").unwrap();
        let all: Dataset = vec![a, b].into_iter().collect();
        assert_eq!(all.labels(), vec![1.0, 2.0]);
    }
}
