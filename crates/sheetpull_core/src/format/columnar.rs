use std::sync::Arc;

use arrow_array::{ArrayRef, RecordBatch, StringArray};
use arrow_schema::{DataType, Field, Schema};
use bytes::Bytes;
use parquet::arrow::ArrowWriter;
use parquet::basic::Compression as ParquetCompression;
use parquet::file::properties::WriterProperties;
use sheetpull_error::{PullError, Result, ResultExt};

use super::Compression;
use crate::table::Table;

/// Arrow schema for a table, every column is utf8.
pub fn table_schema(table: &Table) -> Arc<Schema> {
    let fields: Vec<Field> = table
        .columns()
        .iter()
        .map(|name| Field::new(name, DataType::Utf8, true))
        .collect();
    Arc::new(Schema::new(fields))
}

fn parquet_compression(compression: Option<Compression>) -> Result<ParquetCompression> {
    match compression {
        None => Ok(ParquetCompression::UNCOMPRESSED),
        Some(Compression::Snappy) => Ok(ParquetCompression::SNAPPY),
        Some(other) => Err(PullError::Config(format!(
            "Compression '{other}' is not supported for parquet output"
        ))),
    }
}

/// Write a table as a single row group parquet file.
pub fn write_parquet(table: &Table, compression: Option<Compression>) -> Result<Bytes> {
    let schema = table_schema(table);

    let columns: Vec<ArrayRef> = (0..table.num_columns())
        .map(|idx| Arc::new(StringArray::from_iter_values(table.column_values(idx))) as ArrayRef)
        .collect();
    let batch = RecordBatch::try_new(schema.clone(), columns)
        .context("Failed to build record batch from table")?;

    let props = WriterProperties::builder()
        .set_compression(parquet_compression(compression)?)
        .build();

    let mut writer = ArrowWriter::try_new(Vec::new(), schema, Some(props))
        .context("Failed to create parquet writer")?;
    writer
        .write(&batch)
        .context("Failed to write parquet record batch")?;
    let buf = writer
        .into_inner()
        .context("Failed to finish parquet file")?;

    Ok(Bytes::from(buf))
}

#[cfg(test)]
mod tests {
    use arrow_array::Array;
    use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
    use parquet::file::reader::{FileReader, SerializedFileReader};

    use super::*;
    use crate::table::SheetValueRange;

    fn table() -> Table {
        Table::try_from_value_range(SheetValueRange::new(vec![
            vec!["id".to_string(), "name".to_string()],
            vec!["1".to_string(), "Alice".to_string()],
            vec!["2".to_string()],
        ]))
        .unwrap()
    }

    fn read_back(buf: Bytes) -> Vec<RecordBatch> {
        ParquetRecordBatchReaderBuilder::try_new(buf)
            .unwrap()
            .build()
            .unwrap()
            .collect::<std::result::Result<Vec<_>, _>>()
            .unwrap()
    }

    fn column_compression(buf: Bytes) -> ParquetCompression {
        let reader = SerializedFileReader::new(buf).unwrap();
        reader.metadata().row_group(0).column(0).compression()
    }

    #[test]
    fn strings_round_trip() {
        let buf = write_parquet(&table(), None).unwrap();
        let batches = read_back(buf);
        assert_eq!(1, batches.len());

        let batch = &batches[0];
        assert_eq!(2, batch.num_rows());
        assert_eq!("id", batch.schema().field(0).name());
        assert_eq!("name", batch.schema().field(1).name());
        assert_eq!(&DataType::Utf8, batch.schema().field(1).data_type());

        let names = batch
            .column(1)
            .as_any()
            .downcast_ref::<StringArray>()
            .unwrap();
        assert_eq!("Alice", names.value(0));
        // Padded, not null.
        assert!(!names.is_null(1));
        assert_eq!("", names.value(1));
    }

    #[test]
    fn snappy_compression_applied() {
        let buf = write_parquet(&table(), Some(Compression::Snappy)).unwrap();
        assert_eq!(ParquetCompression::SNAPPY, column_compression(buf));

        let buf = write_parquet(&table(), None).unwrap();
        assert_eq!(ParquetCompression::UNCOMPRESSED, column_compression(buf));
    }

    #[test]
    fn header_only_table() {
        let t = Table::try_new(vec!["a".to_string(), "b".to_string()], Vec::new()).unwrap();
        let batches = read_back(write_parquet(&t, None).unwrap());
        let rows: usize = batches.iter().map(|b| b.num_rows()).sum();
        assert_eq!(0, rows);
    }

    #[test]
    fn zip_rejected() {
        assert!(write_parquet(&table(), Some(Compression::Zip)).is_err());
    }
}
