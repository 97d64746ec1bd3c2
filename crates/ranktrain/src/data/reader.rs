//! CSV record source.

use std::fs::File;
use std::io::Read;
use std::path::Path;

use csv::{ReaderBuilder, StringRecord, Trim};

use super::record::{FeedbackRecord, RecordError, RecordLayout};
use crate::schema::FeatureSchema;

/// Lazily yields typed [`FeedbackRecord`]s from a CSV source with a header row.
///
/// The header is validated against the schema on construction, so a
/// `SchemaMismatch` surfaces before any row is read. A source with no header
/// at all yields no records. Iteration stops being useful after the first
/// error; callers are expected to abort on it.
pub struct CsvRecordReader<R> {
    reader: csv::Reader<R>,
    layout: Option<RecordLayout>,
    row: StringRecord,
}

impl CsvRecordReader<File> {
    /// Open a CSV file.
    pub fn from_path(
        path: impl AsRef<Path>,
        schema: &FeatureSchema,
        max_label: u32,
    ) -> Result<Self, RecordError> {
        let reader = builder().from_path(path).map_err(RecordError::Read)?;
        Self::with_reader(reader, schema, max_label)
    }
}

impl<R: Read> CsvRecordReader<R> {
    /// Wrap any byte source.
    pub fn new(source: R, schema: &FeatureSchema, max_label: u32) -> Result<Self, RecordError> {
        Self::with_reader(builder().from_reader(source), schema, max_label)
    }

    fn with_reader(
        mut reader: csv::Reader<R>,
        schema: &FeatureSchema,
        max_label: u32,
    ) -> Result<Self, RecordError> {
        let headers: Vec<String> = reader
            .headers()
            .map_err(RecordError::Read)?
            .iter()
            .map(str::to_string)
            .collect();
        let layout = if headers.is_empty() {
            None
        } else {
            Some(RecordLayout::from_headers(&headers, schema, max_label)?)
        };
        Ok(Self {
            reader,
            layout,
            row: StringRecord::new(),
        })
    }
}

impl<R: Read> Iterator for CsvRecordReader<R> {
    type Item = Result<FeedbackRecord, RecordError>;

    fn next(&mut self) -> Option<Self::Item> {
        let layout = self.layout.as_ref()?;
        match self.reader.read_record(&mut self.row) {
            Ok(false) => None,
            Ok(true) => {
                let line = self.row.position().map_or(0, |p| p.line());
                Some(layout.parse(&self.row, line))
            }
            Err(err) => Some(Err(RecordError::Read(err))),
        }
    }
}

fn builder() -> ReaderBuilder {
    let mut builder = ReaderBuilder::new();
    // Field counts are checked per row so the error can name the line.
    builder.has_headers(true).trim(Trim::All).flexible(true);
    builder
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::SchemaError;

    fn schema() -> FeatureSchema {
        FeatureSchema::new("test", ["a", "b"]).unwrap()
    }

    #[test]
    fn reads_rows_in_order() {
        let csv = "qid,label,a,b\nq1,0,0.1,0.2\nq1, 2 ,0.3,0.4\nq2,1,1,2\n";
        let reader = CsvRecordReader::new(csv.as_bytes(), &schema(), 2).unwrap();
        let records: Vec<_> = reader.collect::<Result<_, _>>().unwrap();
        assert_eq!(records.len(), 3);
        assert_eq!(records[1].label, 2);
        assert_eq!(records[2].query_id, "q2");
    }

    #[test]
    fn header_without_label_is_schema_mismatch() {
        let csv = "qid,a,b\nq1,0.1,0.2\n";
        let err = CsvRecordReader::new(csv.as_bytes(), &schema(), 2).err().unwrap();
        assert!(matches!(
            err,
            RecordError::SchemaMismatch(SchemaError::MissingColumns { ref missing })
                if missing == &vec!["label".to_string()]
        ));
    }

    #[test]
    fn malformed_row_reports_source_line() {
        let csv = "qid,label,a,b\nq1,0,0.1,0.2\nq1,1,oops,0.4\n";
        let mut reader = CsvRecordReader::new(csv.as_bytes(), &schema(), 2).unwrap();
        assert!(reader.next().unwrap().is_ok());
        match reader.next().unwrap() {
            Err(RecordError::Malformed { line, field, value, .. }) => {
                assert_eq!(line, 3);
                assert_eq!(field, "a");
                assert_eq!(value, "oops");
            }
            other => panic!("expected malformed record, got {other:?}"),
        }
    }

    #[test]
    fn header_only_source_yields_nothing() {
        let reader = CsvRecordReader::new("qid,label,a,b\n".as_bytes(), &schema(), 2).unwrap();
        assert_eq!(reader.count(), 0);
    }

    #[test]
    fn empty_source_yields_nothing() {
        let reader = CsvRecordReader::new("".as_bytes(), &schema(), 2).unwrap();
        assert_eq!(reader.count(), 0);
    }
}
