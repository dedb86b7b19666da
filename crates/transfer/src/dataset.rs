use std::io::Cursor;

use calamine::{open_workbook_from_rs, Data, Reader, Xlsx, XlsxError};

use crate::TransferError;

#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    Empty,
    Text(String),
    Int(i64),
    Float(f64),
    Bool(bool),
}

impl Cell {
    /// Renders the cell the way a form field would have submitted it.
    ///
    /// Spreadsheet applications store every number as a float, so integral
    /// floats print without a fractional part.
    pub fn as_text(&self) -> String {
        match self {
            Cell::Empty => String::new(),
            Cell::Text(text) => text.trim().to_string(),
            Cell::Int(n) => n.to_string(),
            Cell::Float(f) if f.fract() == 0.0 && f.abs() < 9.0e15 => (*f as i64).to_string(),
            Cell::Float(f) => f.to_string(),
            Cell::Bool(b) => b.to_string(),
        }
    }

    pub fn is_blank(&self) -> bool {
        match self {
            Cell::Empty => true,
            Cell::Text(text) => text.trim().is_empty(),
            _ => false,
        }
    }
}

impl From<&Data> for Cell {
    fn from(value: &Data) -> Self {
        match value {
            Data::Empty => Cell::Empty,
            Data::String(s) => Cell::Text(s.clone()),
            Data::Int(n) => Cell::Int(*n),
            Data::Float(f) => Cell::Float(*f),
            Data::Bool(b) => Cell::Bool(*b),
            other => Cell::Text(other.to_string()),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct DataRow {
    /// 1-based spreadsheet row number.
    pub line: usize,
    pub cells: Vec<Cell>,
}

impl DataRow {
    pub fn text(&self, column: Option<usize>) -> String {
        column
            .and_then(|index| self.cells.get(index))
            .map(Cell::as_text)
            .unwrap_or_default()
    }

    pub fn is_blank(&self) -> bool {
        self.cells.iter().all(Cell::is_blank)
    }
}

/// Row-oriented view of the first worksheet: a header row and data rows.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Dataset {
    headers: Vec<String>,
    rows: Vec<DataRow>,
}

impl Dataset {
    pub fn new(headers: Vec<String>, rows: Vec<DataRow>) -> Self {
        let headers = headers.iter().map(|h| normalize_header(h)).collect();
        Self { headers, rows }
    }

    pub fn from_xlsx(bytes: &[u8]) -> Result<Self, TransferError> {
        let mut workbook: Xlsx<_> = open_workbook_from_rs(Cursor::new(bytes))
            .map_err(|error: XlsxError| TransferError::Malformed(error.to_string()))?;
        let range = workbook
            .worksheet_range_at(0)
            .ok_or_else(|| TransferError::Malformed("workbook has no worksheets".to_string()))?
            .map_err(|error| TransferError::Malformed(error.to_string()))?;

        let first_line = range.start().map(|(row, _)| row as usize + 1).unwrap_or(1);
        let mut rows = range.rows();
        let headers = rows
            .next()
            .map(|cells| cells.iter().map(|c| Cell::from(c).as_text()).collect())
            .unwrap_or_default();
        let rows = rows
            .enumerate()
            .map(|(offset, cells)| DataRow {
                line: first_line + offset + 1,
                cells: cells.iter().map(Cell::from).collect(),
            })
            .filter(|row| !row.is_blank())
            .collect();

        Ok(Self::new(headers, rows))
    }

    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    pub fn rows(&self) -> &[DataRow] {
        &self.rows
    }

    pub fn column(&self, name: &str) -> Option<usize> {
        let name = normalize_header(name);
        self.headers.iter().position(|h| *h == name)
    }
}

fn normalize_header(raw: &str) -> String {
    raw.trim().to_ascii_lowercase()
}
