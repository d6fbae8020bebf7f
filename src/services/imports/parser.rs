//! Quote-aware CSV reading shared by detection and row extraction.

use crate::errors::ServiceError;
use csv::{ReaderBuilder, Trim};
use std::collections::HashMap;

/// Header spellings used by the downloadable templates, mapped to the keys the
/// validators read.
const HEADER_ALIASES: &[(&str, &str)] = &[
    ("product_name", "name"),
    ("weight_(kg)", "weight_kg"),
    ("weight", "weight_kg"),
];

/// Lowercases, trims and joins whitespace runs with `_`, then applies aliases.
pub fn normalize_header(raw: &str) -> String {
    let collapsed = raw
        .trim_start_matches('\u{feff}')
        .split_whitespace()
        .map(str::to_lowercase)
        .collect::<Vec<_>>()
        .join("_");

    HEADER_ALIASES
        .iter()
        .find(|(from, _)| *from == collapsed)
        .map(|(_, to)| (*to).to_string())
        .unwrap_or(collapsed)
}

/// One data line keyed by normalized header
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawRow {
    cells: HashMap<String, String>,
}

impl RawRow {
    pub fn from_pairs<K, V, I>(pairs: I) -> Self
    where
        K: AsRef<str>,
        V: Into<String>,
        I: IntoIterator<Item = (K, V)>,
    {
        Self {
            cells: pairs
                .into_iter()
                .map(|(k, v)| (normalize_header(k.as_ref()), v.into()))
                .collect(),
        }
    }

    /// Trimmed cell value, empty when the column is absent
    pub fn get(&self, key: &str) -> &str {
        self.cells.get(key).map(|v| v.trim()).unwrap_or("")
    }

    /// Trimmed cell value, `None` when absent or blank
    pub fn value(&self, key: &str) -> Option<&str> {
        Some(self.get(key)).filter(|v| !v.is_empty())
    }

    fn is_blank(&self) -> bool {
        self.cells.values().all(|v| v.trim().is_empty())
    }
}

#[derive(Debug, Clone, Default)]
pub struct ParsedCsv {
    pub headers: Vec<String>,
    pub rows: Vec<RawRow>,
}

impl ParsedCsv {
    pub fn has_header(&self, name: &str) -> bool {
        self.headers.iter().any(|h| h == name)
    }
}

fn reader_builder() -> ReaderBuilder {
    let mut builder = ReaderBuilder::new();
    builder.has_headers(true).flexible(true).trim(Trim::All);
    builder
}

/// Reads only the header line.
pub fn parse_headers(text: &str) -> Result<Vec<String>, ServiceError> {
    let mut reader = reader_builder().from_reader(text.as_bytes());
    let headers = reader.headers()?;
    Ok(headers
        .iter()
        .map(normalize_header)
        .filter(|h| !h.is_empty())
        .collect())
}

/// Reads the header line plus every non-blank data line.
///
/// Short lines get empty cells for the missing columns; extra cells beyond the
/// header are dropped.
pub fn parse_csv(text: &str) -> Result<ParsedCsv, ServiceError> {
    let mut reader = reader_builder().from_reader(text.as_bytes());
    let headers: Vec<String> = reader.headers()?.iter().map(normalize_header).collect();

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record?;
        let mut cells = HashMap::with_capacity(headers.len());
        for (idx, header) in headers.iter().enumerate() {
            if header.is_empty() || cells.contains_key(header) {
                continue;
            }
            let value = record.get(idx).unwrap_or("").to_string();
            cells.insert(header.clone(), value);
        }

        let row = RawRow { cells };
        if row.is_blank() {
            continue;
        }
        rows.push(row);
    }

    Ok(ParsedCsv {
        headers: headers.into_iter().filter(|h| !h.is_empty()).collect(),
        rows,
    })
}
