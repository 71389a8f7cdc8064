//! Raw CSV table: named columns of string cells.

use std::io::Read;
use std::path::Path;

use auditor_common::error::{AuditorError, Result};

/// Whether a column holds numbers or free text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnKind {
    Numeric,
    Text,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Table {
    headers: Vec<String>,
    rows: Vec<Vec<String>>,
}

impl Table {
    pub fn new(headers: Vec<String>, rows: Vec<Vec<String>>) -> Result<Self> {
        if headers.is_empty() {
            return Err(AuditorError::invalid_data("CSV has no header row"));
        }
        if let Some((i, row)) = rows.iter().enumerate().find(|(_, r)| r.len() != headers.len()) {
            return Err(AuditorError::invalid_data(format!(
                "row {} has {} fields, expected {}",
                i + 1,
                row.len(),
                headers.len()
            )));
        }
        Ok(Self { headers, rows })
    }

    /// Parse a CSV document with a header row.
    pub fn from_csv_reader<R: Read>(reader: R) -> Result<Self> {
        let mut rdr = csv::ReaderBuilder::new()
            .has_headers(true)
            .trim(csv::Trim::All)
            .from_reader(reader);

        let headers: Vec<String> = rdr.headers()?.iter().map(str::to_string).collect();
        if headers.iter().all(|h| h.is_empty()) {
            return Err(AuditorError::invalid_data("CSV has no header row"));
        }

        let mut rows = Vec::new();
        for record in rdr.records() {
            let record = record?;
            rows.push(record.iter().map(str::to_string).collect());
        }

        Self::new(headers, rows)
    }

    /// Parse an uploaded file body. The body must be UTF-8.
    pub fn from_csv_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.is_empty() {
            return Err(AuditorError::invalid_data("uploaded file is empty"));
        }
        std::str::from_utf8(bytes)
            .map_err(|e| AuditorError::invalid_data(format!("file is not valid UTF-8: {e}")))?;
        Self::from_csv_reader(bytes)
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let bytes = std::fs::read(path)?;
        Self::from_csv_bytes(&bytes)
    }

    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    pub fn rows(&self) -> &[Vec<String>] {
        &self.rows
    }

    pub fn n_rows(&self) -> usize {
        self.rows.len()
    }

    pub fn n_cols(&self) -> usize {
        self.headers.len()
    }

    pub fn column(&self, idx: usize) -> impl Iterator<Item = &str> + '_ {
        self.rows.iter().map(move |r| r[idx].as_str())
    }

    /// Return a copy without any row that contains a missing cell.
    pub fn drop_missing(&self, na_tokens: &[String]) -> Self {
        let rows: Vec<Vec<String>> = self
            .rows
            .iter()
            .filter(|row| !row.iter().any(|cell| is_missing(cell, na_tokens)))
            .cloned()
            .collect();

        let dropped = self.rows.len() - rows.len();
        if dropped > 0 {
            tracing::debug!(dropped, remaining = rows.len(), "dropped rows with missing values");
        }

        Self { headers: self.headers.clone(), rows }
    }

    /// A column is numeric when every cell parses as a number or boolean literal.
    pub fn column_kind(&self, idx: usize) -> ColumnKind {
        if self.column(idx).all(|cell| parse_numeric(cell).is_some()) {
            ColumnKind::Numeric
        } else {
            ColumnKind::Text
        }
    }

    /// Serialise back to CSV text.
    pub fn to_csv_string(&self) -> Result<String> {
        let mut wtr = csv::Writer::from_writer(Vec::new());
        wtr.write_record(&self.headers)?;
        for row in &self.rows {
            wtr.write_record(row)?;
        }
        let bytes = wtr.into_inner().map_err(|e| AuditorError::Io(e.into_error()))?;
        String::from_utf8(bytes).map_err(|e| AuditorError::invalid_data(e.to_string()))
    }
}

fn is_missing(cell: &str, na_tokens: &[String]) -> bool {
    na_tokens.iter().any(|t| t == cell)
}

/// Parse a cell as a number; boolean literals map to 1/0.
pub fn parse_numeric(cell: &str) -> Option<f64> {
    match cell {
        "true" | "True" | "TRUE" => Some(1.0),
        "false" | "False" | "FALSE" => Some(0.0),
        _ => cell.parse::<f64>().ok(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn na() -> Vec<String> {
        auditor_common::DataConfig::default().na_tokens
    }

    #[test]
    fn test_parse_basic_csv() {
        let t = Table::from_csv_bytes(b"a,b,c\n1,x,0\n2,y,1\n").unwrap();
        assert_eq!(t.headers(), &["a", "b", "c"]);
        assert_eq!(t.n_rows(), 2);
        assert_eq!(t.column(1).collect::<Vec<_>>(), vec!["x", "y"]);
    }

    #[test]
    fn test_empty_input_rejected() {
        assert!(matches!(Table::from_csv_bytes(b""), Err(AuditorError::InvalidData(_))));
    }

    #[test]
    fn test_ragged_rows_rejected() {
        let err = Table::from_csv_bytes(b"a,b\n1,2\n3\n").unwrap_err();
        assert!(err.is_client_error());
    }

    #[test]
    fn test_non_utf8_rejected() {
        let err = Table::from_csv_bytes(&[b'a', b'\n', 0xff, 0xfe]).unwrap_err();
        assert!(matches!(err, AuditorError::InvalidData(_)));
    }

    #[test]
    fn test_drop_missing() {
        let t = Table::from_csv_bytes(b"a,b\n1,x\n,y\n3,NA\n4, z \n").unwrap();
        let clean = t.drop_missing(&na());
        assert_eq!(clean.n_rows(), 2);
        // cells are trimmed on read
        assert_eq!(clean.rows()[1], vec!["4".to_string(), "z".to_string()]);
    }

    #[test]
    fn test_column_kind() {
        let t = Table::from_csv_bytes(b"n,s,b\n1.5,x,true\n-2,3,False\n").unwrap();
        assert_eq!(t.column_kind(0), ColumnKind::Numeric);
        assert_eq!(t.column_kind(1), ColumnKind::Text);
        assert_eq!(t.column_kind(2), ColumnKind::Numeric);
    }

    #[test]
    fn test_to_csv_string() {
        let t = Table::new(
            vec!["a".into(), "b".into()],
            vec![vec!["1".into(), "x,y".into()]],
        )
        .unwrap();
        assert_eq!(t.to_csv_string().unwrap(), "a,b\n1,\"x,y\"\n");
    }
}
