//! CSV reading and writing operations.

use std::io::Cursor;

use anyhow::{Context, Result};
use polars::{frame::DataFrame, io::{SerReader, SerWriter}, prelude::{CsvReadOptions, CsvReader, CsvWriter, StringChunked}};

/// Read a CSV table from bytes into a DataFrame with every column typed as String.
/// Identifier columns keep their leading zeros; numeric parsing is left to the caller.
pub(crate) fn read_csv_bytes(bytes: &[u8]) -> Result<DataFrame> {
    // Strip a UTF-8 byte order mark, which some feed publishers emit.
    let bytes = bytes.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(bytes);

    let options = CsvReadOptions::default()
        .with_has_header(true)
        .with_infer_schema_length(Some(0));

    CsvReader::new(Cursor::new(bytes))
        .with_options(options)
        .finish()
        .context("[io::csv] Failed to read CSV from bytes")
}

/// Write a DataFrame to CSV bytes.
pub(crate) fn write_csv_bytes(df: &DataFrame) -> Result<Vec<u8>> {
    let mut out = Vec::new();
    CsvWriter::new(&mut out)
        .finish(&mut df.clone())
        .context("[io::csv] Failed to write CSV bytes")?;
    Ok(out)
}

/// Get a required String column by name.
pub(crate) fn str_column<'a>(df: &'a DataFrame, name: &str) -> Result<&'a StringChunked> {
    df.column(name)
        .with_context(|| format!("[io::csv] missing column {name:?}"))?
        .str()
        .with_context(|| format!("[io::csv] column {name:?} is not a string column"))
}

/// Get an optional String column by name (None if absent).
pub(crate) fn opt_str_column<'a>(df: &'a DataFrame, name: &str) -> Option<&'a StringChunked> {
    df.column(name).ok()?.str().ok()
}

/// Parse an optional trimmed cell as f64.
pub(crate) fn parse_f64(cell: Option<&str>) -> Option<f64> {
    cell.map(str::trim).filter(|s| !s.is_empty())?.parse().ok()
}

/// Parse an optional trimmed cell as i64, accepting integral decimals such as "120.0".
pub(crate) fn parse_i64(cell: Option<&str>) -> Option<i64> {
    let cell = cell.map(str::trim).filter(|s| !s.is_empty())?;
    cell.parse::<i64>().ok().or_else(|| {
        let x = cell.parse::<f64>().ok()?;
        (x.is_finite() && x.fract() == 0.0).then_some(x as i64)
    })
}

/// Non-empty trimmed cell text.
pub(crate) fn non_empty(cell: Option<&str>) -> Option<&str> {
    cell.map(str::trim).filter(|s| !s.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_every_column_as_string() {
        let df = read_csv_bytes(b"\xEF\xBB\xBFstop_id,stop_lat\n007,39.29\n").unwrap();
        let ids = str_column(&df, "stop_id").unwrap();
        assert_eq!(ids.get(0), Some("007"));
        assert_eq!(parse_f64(str_column(&df, "stop_lat").unwrap().get(0)), Some(39.29));
    }

    #[test]
    fn missing_column_is_an_error() {
        let df = read_csv_bytes(b"a,b\n1,2\n").unwrap();
        assert!(str_column(&df, "c").is_err());
        assert!(opt_str_column(&df, "c").is_none());
    }

    #[test]
    fn integer_parsing_accepts_integral_decimals() {
        assert_eq!(parse_i64(Some(" 42 ")), Some(42));
        assert_eq!(parse_i64(Some("120.0")), Some(120));
        assert_eq!(parse_i64(Some("1.5")), None);
        assert_eq!(parse_i64(Some("")), None);
        assert_eq!(parse_i64(None), None);
    }
}
