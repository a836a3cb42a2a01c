use csv::{QuoteStyle, ReaderBuilder, Terminator, WriterBuilder};
use sheetpull_error::{Result, ResultExt};

use crate::table::Table;

pub const DEFAULT_DELIMITER: u8 = b'\t';

/// Write a table as delimited text.
///
/// The header line comes first, lines end with '\n', and fields are only
/// quoted when they contain the delimiter, a quote, or a line break. No row
/// index is written.
pub fn write_delimited(table: &Table, delimiter: u8) -> Result<Vec<u8>> {
    let mut writer = WriterBuilder::new()
        .delimiter(delimiter)
        .terminator(Terminator::Any(b'\n'))
        .quote_style(QuoteStyle::Necessary)
        .from_writer(Vec::new());

    writer
        .write_record(table.columns())
        .context("Failed to write header")?;
    for row in table.rows() {
        writer.write_record(row).context("Failed to write row")?;
    }

    writer
        .into_inner()
        .map_err(|e| e.into_error())
        .context("Failed to flush delimited output")
}

/// Read delimited text written by `write_delimited` back into a table.
pub fn read_delimited(buf: &[u8], delimiter: u8) -> Result<Table> {
    let mut reader = ReaderBuilder::new()
        .delimiter(delimiter)
        .has_headers(true)
        .flexible(true)
        .from_reader(buf);

    let columns = reader
        .headers()
        .context("Failed to read header")?
        .iter()
        .map(|s| s.to_string())
        .collect();

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record.context("Failed to read record")?;
        rows.push(record.iter().map(|s| s.to_string()).collect());
    }

    Table::try_new(columns, rows)
}
