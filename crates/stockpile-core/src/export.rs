//! Export a record set as CSV or JSON

use crate::error::{Error, Result};
use crate::record::Record;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use std::str::FromStr;

/// Headers written on export, in import column order
pub const EXPORT_HEADERS: [&str; 6] = [
    "product_id",
    "product_name",
    "product_price",
    "product_category",
    "product_stock",
    "product_description",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    Csv,
    Json,
}

impl FromStr for ExportFormat {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "csv" => Ok(ExportFormat::Csv),
            "json" => Ok(ExportFormat::Json),
            other => Err(Error::InvalidConfig(format!(
                "unknown export format '{}', supported formats: csv, json",
                other
            ))),
        }
    }
}

/// Write records as CSV.
///
/// Fields containing the delimiter are quoted, which the importer does not
/// understand; such files need cleanup before being imported again.
pub fn write_csv<W: Write>(records: &[Record], writer: W) -> Result<()> {
    let mut csv_writer = csv::WriterBuilder::new()
        .quote_style(csv::QuoteStyle::Necessary)
        .from_writer(writer);

    csv_writer.write_record(EXPORT_HEADERS)?;
    for record in records {
        let price = record.price.to_string();
        let stock = record.stock.to_string();
        csv_writer.write_record([
            record.id.as_str(),
            record.name.as_str(),
            price.as_str(),
            record.category.as_str(),
            stock.as_str(),
            record.description.as_str(),
        ])?;
    }
    csv_writer.flush()?;
    Ok(())
}

/// Export records to `path` in the given format. Returns the number written.
pub fn export_records<P: AsRef<Path>>(records: &[Record], format: ExportFormat, path: P) -> Result<usize> {
    let path = path.as_ref();
    let file = File::create(path).map_err(|e| Error::FileWrite {
        path: path.to_path_buf(),
        source: e,
    })?;
    let mut writer = BufWriter::new(file);

    match format {
        ExportFormat::Csv => write_csv(records, &mut writer)?,
        ExportFormat::Json => {
            serde_json::to_writer_pretty(&mut writer, records)?;
            writeln!(writer)?;
        }
    }
    writer.flush()?;
    Ok(records.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::{parse_records, ParseOptions};

    fn sample() -> Vec<Record> {
        vec![
            Record::new("P1", "Ball")
                .with_price(19.99)
                .with_category("Football")
                .with_stock(10),
            Record::new("P2", "Net").with_description("Regulation size"),
        ]
    }

    #[test]
    fn test_write_csv() {
        let mut out = Vec::new();
        write_csv(&sample(), &mut out).unwrap();
        let text = String::from_utf8(out).unwrap();

        let mut lines = text.lines();
        assert_eq!(lines.next(), Some(EXPORT_HEADERS.join(",").as_str()));
        assert_eq!(lines.next(), Some("P1,Ball,19.99,Football,10,"));
        assert_eq!(lines.next(), Some("P2,Net,0,,0,Regulation size"));
    }

    #[test]
    fn test_exported_csv_imports_cleanly() {
        let mut out = Vec::new();
        write_csv(&sample(), &mut out).unwrap();
        let text = String::from_utf8(out).unwrap();

        let batch = parse_records(&text, &ParseOptions::default());
        assert_eq!(batch.records, sample());
    }

    #[test]
    fn test_export_format_from_str() {
        assert_eq!("CSV".parse::<ExportFormat>().unwrap(), ExportFormat::Csv);
        assert_eq!("json".parse::<ExportFormat>().unwrap(), ExportFormat::Json);
        assert!("xml".parse::<ExportFormat>().is_err());
    }

    #[test]
    fn test_export_json_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.json");

        let written = export_records(&sample(), ExportFormat::Json, &path).unwrap();
        assert_eq!(written, 2);

        let loaded: Vec<Record> =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(loaded, sample());
    }
}
