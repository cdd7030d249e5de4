//! CSV import and export of records.
//!
//! Decoding reads every column as text with polars and recognises the six fixed
//! field names in the header, ignoring case. Encoding writes the visible columns
//! with their labels as header.

use std::io::Cursor;
use std::path::Path;

use ::chrono::{NaiveDate, Utc};
use polars::prelude::*;
use rayon::prelude::*;
use tracing::{debug, trace};

use crate::columns::ColumnSpec;
use crate::domain::TMError;
use crate::record::{FIXED_FIELDS, Record};

/// A frame column with every value rendered as text, nulls as "".
struct TextColumn {
    name: String,
    data: Vec<String>,
}

/// Decodes CSV text into records with freshly generated ids. Fails as a whole on malformed input.
pub fn decode(content: &str) -> Result<Vec<Record>, TMError> {
    decode_with_stamp(content, Utc::now().timestamp_millis())
}

/// Like `decode`, ids are `imported-<stamp>-<row>`.
pub fn decode_with_stamp(content: &str, stamp: i64) -> Result<Vec<Record>, TMError> {
    let df = read_frame(content).map_err(|e| TMError::ImportFormat(e.to_string()))?;
    let records =
        records_from_frame(&df, |row| format!("imported-{stamp}-{row}")).map_err(|e| match e {
            TMError::PolarsError(e) => TMError::ImportFormat(e.to_string()),
            other => other,
        })?;
    debug!("Decoded {} records", records.len());
    Ok(records)
}

fn read_frame(content: &str) -> Result<DataFrame, PolarsError> {
    CsvReadOptions::default()
        .with_has_header(true)
        .with_infer_schema_length(Some(0))
        .into_reader_with_file_handle(Cursor::new(content.as_bytes().to_vec()))
        .finish()
}

fn text_column(df: &DataFrame, col_name: &str) -> Result<TextColumn, PolarsError> {
    let col = df.column(col_name)?.cast(&DataType::String)?;
    let series = col.str()?;
    let data = series
        .into_iter()
        .map(|value| value.unwrap_or_default().to_string())
        .collect();
    Ok(TextColumn {
        name: col_name.to_string(),
        data,
    })
}

fn is_fixed_field(name: &str) -> bool {
    FIXED_FIELDS.contains(&name.trim().to_lowercase().as_str())
}

/// Maps a frame onto records. Headers are matched against the fixed field names after
/// trimming and lowercasing; unknown headers are ignored and never cast.
///
/// Rows without any value are skipped, `id_for` gets the position among the kept rows.
pub fn records_from_frame(
    df: &DataFrame,
    id_for: impl Fn(usize) -> String,
) -> Result<Vec<Record>, TMError> {
    let c_: Result<Vec<TextColumn>, _> = df
        .get_column_names()
        .par_iter()
        .filter(|name| is_fixed_field(name.as_str()))
        .map(|name| text_column(df, name))
        .collect();
    let columns = c_?;
    let ignored: Vec<BooleanChunked> = df
        .get_columns()
        .iter()
        .filter(|c| !is_fixed_field(c.name().as_str()))
        .map(|c| c.is_not_null())
        .collect();

    // For every fixed field, the frame columns carrying it, in header order.
    let sources: Vec<Vec<&TextColumn>> = FIXED_FIELDS
        .iter()
        .map(|field| {
            columns
                .iter()
                .filter(|c| c.name.trim().to_lowercase() == *field)
                .collect()
        })
        .collect();
    for (field, found) in FIXED_FIELDS.iter().zip(sources.iter()) {
        trace!("Field {field} read from {} column(s)", found.len());
    }

    let is_blank = |row: usize| {
        columns.iter().all(|c| c.data[row].trim().is_empty())
            && ignored.iter().all(|present| present.get(row) != Some(true))
    };
    let records: Vec<Record> = (0..df.height())
        .filter(|row| !is_blank(*row))
        .enumerate()
        .map(|(index, row)| {
            let value = |field: usize| -> String {
                sources[field]
                    .iter()
                    .map(|c| c.data[row].as_str())
                    .find(|v| !v.is_empty())
                    .unwrap_or_default()
                    .to_string()
            };
            let mut record = Record::new(id_for(index));
            record.name = value(0);
            record.email = value(1);
            record.age = parse_age(&value(2));
            record.role = value(3);
            record.department = Some(value(4));
            record.location = Some(value(5));
            record
        })
        .collect();
    if records.len() < df.height() {
        debug!("Skipped {} blank rows", df.height() - records.len());
    }
    Ok(records)
}

/// Leading integer of `text`, e.g. "42 years" is 42. Anything else is 0.
pub fn parse_age(text: &str) -> i64 {
    let text = text.trim_start();
    let (sign, digits) = match text.strip_prefix('-') {
        Some(rest) => (-1, rest),
        None => (1, text.strip_prefix('+').unwrap_or(text)),
    };
    let end = digits
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(digits.len());
    digits[..end].parse::<i64>().map(|v| sign * v).unwrap_or(0)
}

/// Encodes `records` with one column per entry of `columns`, labels as header.
pub fn encode(records: &[&Record], columns: &[&ColumnSpec]) -> Result<String, TMError> {
    let mut writer = ::csv::WriterBuilder::new()
        .terminator(::csv::Terminator::Any(b'\n'))
        .from_writer(Vec::new());
    writer.write_record(columns.iter().map(|c| c.label.as_str()))?;
    for record in records {
        writer.write_record(columns.iter().map(|c| {
            record
                .field_text(&c.key)
                .map(|v| v.into_owned())
                .unwrap_or_default()
        }))?;
    }
    let bytes = writer.into_inner().map_err(|e| e.into_error())?;
    Ok(String::from_utf8(bytes)?)
}

/// One CSV line for `record`, without header and line terminator.
pub fn encode_row(record: &Record, columns: &[&ColumnSpec]) -> Result<String, TMError> {
    let mut writer = ::csv::WriterBuilder::new()
        .terminator(::csv::Terminator::Any(b'\n'))
        .from_writer(Vec::new());
    writer.write_record(columns.iter().map(|c| {
        record
            .field_text(&c.key)
            .map(|v| v.into_owned())
            .unwrap_or_default()
    }))?;
    let bytes = writer.into_inner().map_err(|e| e.into_error())?;
    let mut line = String::from_utf8(bytes)?;
    line.truncate(line.trim_end_matches('\n').len());
    Ok(line)
}

/// Only the file name is checked, the content is not inspected.
pub fn ensure_csv_file_name(path: &Path) -> Result<(), TMError> {
    let is_csv = path
        .file_name()
        .and_then(|n| n.to_str())
        .is_some_and(|n| n.to_lowercase().ends_with(".csv"));
    if is_csv {
        Ok(())
    } else {
        Err(TMError::NotCsvFile(path.to_path_buf()))
    }
}

pub fn export_file_name(date: NaiveDate) -> String {
    format!("table-data-{}.csv", date.format("%Y-%m-%d"))
}

pub fn export_file_name_now() -> String {
    export_file_name(Utc::now().date_naive())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::columns::{default_columns, visible_columns};

    fn fixed_fields(record: &Record) -> [String; 6] {
        FIXED_FIELDS.map(|key| {
            record
                .field_text(key)
                .map(|v| v.into_owned())
                .unwrap_or_default()
        })
    }

    #[test]
    fn decode_recognises_header_spellings() {
        let content = "Name,email,AGE,Role,department,Notes\nAl,al@x.io,41,Dev,R&D,ignored\n";
        let records = decode_with_stamp(content, 1700).unwrap();

        assert_eq!(records.len(), 1);
        let r = &records[0];
        assert_eq!(r.id(), "imported-1700-0");
        assert_eq!(r.name, "Al");
        assert_eq!(r.email, "al@x.io");
        assert_eq!(r.age, 41);
        assert_eq!(r.role, "Dev");
        assert_eq!(r.department.as_deref(), Some("R&D"));
        assert_eq!(r.location.as_deref(), Some(""));
        assert!(r.extra.is_empty());
    }

    #[test]
    fn decode_defaults_missing_fields() {
        let content = "name,age\nBea,unknown\nCy,\n";
        let records = decode_with_stamp(content, 1).unwrap();

        assert_eq!(records.len(), 2);
        assert_eq!(records[0].age, 0);
        assert_eq!(records[0].email, "");
        assert_eq!(records[1].age, 0);
        assert_eq!(records[1].role, "");
        assert_eq!(records[1].id(), "imported-1-1");
    }

    #[test]
    fn decode_handles_quoted_fields() {
        let content = "name,role\n\"Doe, Jane\",\"says \"\"hi\"\"\"\n";
        let records = decode_with_stamp(content, 1).unwrap();
        assert_eq!(records[0].name, "Doe, Jane");
        assert_eq!(records[0].role, "says \"hi\"");
    }

    #[test]
    fn decode_skips_blank_lines() {
        let records = decode_with_stamp("name,role\nA,x\n\nB,y\n", 1).unwrap();
        let names: Vec<&str> = records.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["A", "B"]);
        assert_eq!(records[1].id(), "imported-1-1");

        let records = decode_with_stamp("name,role\nA,x\n\n\n", 1).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].role, "x");
    }

    #[test]
    fn rows_with_only_unknown_columns_are_kept() {
        let records = decode_with_stamp("name,notes\n,remember\nBo,\n", 1).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].name, "");
        assert_eq!(records[1].name, "Bo");
    }

    #[test]
    fn unknown_columns_are_not_cast() {
        let tags = Series::new(
            "tags".into(),
            [Series::new("".into(), [1i32, 2]), Series::new("".into(), [3i32])],
        );
        let df = DataFrame::new(vec![
            Column::new("Name".into(), ["Al", "Bo"]),
            tags.into_column(),
        ])
        .unwrap();

        let records = records_from_frame(&df, |row| row.to_string()).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[1].name, "Bo");
        assert_eq!(records[1].id(), "1");
    }

    #[test]
    fn decode_rejects_malformed_rows() {
        let content = "name,email\nAl,al@x.io,extra,fields\n";
        let err = decode_with_stamp(content, 1).unwrap_err();
        assert!(matches!(err, TMError::ImportFormat(_)));
    }

    #[test]
    fn decode_rejects_empty_input() {
        assert!(matches!(
            decode_with_stamp("", 1),
            Err(TMError::ImportFormat(_))
        ));
    }

    #[test]
    fn parse_age_takes_leading_integer() {
        assert_eq!(parse_age("42"), 42);
        assert_eq!(parse_age(" 42 years"), 42);
        assert_eq!(parse_age("3.9"), 3);
        assert_eq!(parse_age("-5"), -5);
        assert_eq!(parse_age("abc"), 0);
        assert_eq!(parse_age(""), 0);
    }

    #[test]
    fn encode_writes_visible_columns_only() {
        let mut record = Record::new("1");
        record.name = "Al".into();
        record.email = "al@x.io".into();
        record.age = 41;
        record.role = "Dev, Ops".into();
        record.location = Some("Oslo".into());
        let columns = default_columns();

        let text = encode(&[&record], &visible_columns(&columns)).unwrap();
        assert_eq!(text, "Name,Email,Age,Role\nAl,al@x.io,41,\"Dev, Ops\"\n");
    }

    #[test]
    fn encode_writes_missing_values_as_empty() {
        let record = Record::new("1");
        let columns = [
            ColumnSpec::new("department", "Department", true),
            ColumnSpec::new("start_date", "Start Date", true),
        ];
        let text = encode(&[&record], &[&columns[0], &columns[1]]).unwrap();
        assert_eq!(text, "Department,Start Date\n,\n");
    }

    #[test]
    fn encode_row_quotes_like_a_csv_line() {
        let mut record = Record::new("1");
        record.name = "Doe, Jane".into();
        record.role = "say \"hi\"".into();
        let columns = default_columns();
        let line = encode_row(&record, &visible_columns(&columns)).unwrap();
        assert_eq!(line, "\"Doe, Jane\",,0,\"say \"\"hi\"\"\"");
    }

    #[test]
    fn round_trip_keeps_fixed_fields() {
        let mut originals = crate::record::seed_records();
        for (idx, record) in originals.iter_mut().enumerate() {
            record.department = Some(format!("Dept {idx}"));
            record.location = Some(format!("City, {idx}"));
            record.extra.insert("team".into(), "dropped".into());
        }
        let mut columns = default_columns();
        for column in columns.iter_mut() {
            column.visible = true;
        }
        let rows: Vec<&Record> = originals.iter().collect();

        let text = encode(&rows, &visible_columns(&columns)).unwrap();
        let decoded = decode_with_stamp(&text, 99).unwrap();

        assert_eq!(decoded.len(), originals.len());
        for (original, copy) in originals.iter().zip(decoded.iter()) {
            assert_eq!(fixed_fields(original), fixed_fields(copy));
            assert_ne!(original.id(), copy.id());
            assert!(copy.extra.is_empty());
        }
    }

    #[test]
    fn csv_file_names_are_checked_case_insensitively() {
        assert!(ensure_csv_file_name(Path::new("/tmp/data.csv")).is_ok());
        assert!(ensure_csv_file_name(Path::new("DATA.CSV")).is_ok());
        assert!(matches!(
            ensure_csv_file_name(Path::new("data.xlsx")),
            Err(TMError::NotCsvFile(_))
        ));
        assert!(ensure_csv_file_name(Path::new("csv")).is_err());
    }

    #[test]
    fn export_file_name_uses_iso_date() {
        let date = NaiveDate::from_ymd_opt(2024, 3, 9).unwrap();
        assert_eq!(export_file_name(date), "table-data-2024-03-09.csv");
    }
}
