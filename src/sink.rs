use anyhow::{Context, Result};
use serde::Serialize;
use std::fs::{self, File};
use std::path::{Path, PathBuf};
use tracing::info;

use crate::record::Record;

/// Final destination for a run's records.
pub trait RecordSink {
    fn accept(&mut self, record: &Record) -> Result<()>;

    /// Flushes whatever is buffered. Called once, after the last record.
    fn finalize(&mut self) -> Result<()>;

    fn accept_all(&mut self, records: &[Record]) -> Result<()> {
        for record in records {
            self.accept(record)?;
        }
        self.finalize()
    }
}

const HEADER: [&str; 11] = [
    "Name",
    "Category",
    "Year",
    "ClassStanding",
    "Position",
    "Hometown",
    "HighSchool",
    "Height",
    "Weight",
    "SourceURL",
    "CompletionYear",
];

#[derive(Serialize)]
struct CsvRow<'a> {
    #[serde(rename = "Name")]
    name: &'a str,
    #[serde(rename = "Category")]
    category: &'a str,
    #[serde(rename = "Year")]
    year: u16,
    #[serde(rename = "ClassStanding")]
    class_standing: &'a str,
    #[serde(rename = "Position")]
    position: &'a str,
    #[serde(rename = "Hometown")]
    hometown: &'a str,
    #[serde(rename = "HighSchool")]
    high_school: &'a str,
    #[serde(rename = "Height")]
    height: &'a str,
    #[serde(rename = "Weight")]
    weight: &'a str,
    #[serde(rename = "SourceURL")]
    source_url: &'a str,
    #[serde(rename = "CompletionYear")]
    completion_year: u16,
}

impl<'a> From<&'a Record> for CsvRow<'a> {
    fn from(r: &'a Record) -> Self {
        Self {
            name: &r.name,
            category: &r.category,
            year: r.year,
            class_standing: &r.class_standing,
            position: &r.position,
            hometown: &r.hometown,
            high_school: &r.high_school,
            height: &r.height,
            weight: &r.weight,
            source_url: &r.source_url,
            completion_year: r.completion_year(),
        }
    }
}

/// Writes one CSV row per record, header first.
pub struct CsvSink {
    path: PathBuf,
    writer: csv::Writer<File>,
    rows: usize,
}

impl CsvSink {
    pub fn create(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .with_context(|| format!("creating output directory {}", parent.display()))?;
        }
        let writer = csv::Writer::from_path(&path)
            .with_context(|| format!("opening {}", path.display()))?;
        Ok(Self {
            path,
            writer,
            rows: 0,
        })
    }
}

impl RecordSink for CsvSink {
    fn accept(&mut self, record: &Record) -> Result<()> {
        self.writer.serialize(CsvRow::from(record))?;
        self.rows += 1;
        Ok(())
    }

    fn finalize(&mut self) -> Result<()> {
        // serialize() writes the header lazily, so an empty run needs it here.
        if self.rows == 0 {
            self.writer.write_record(HEADER)?;
        }
        self.writer.flush()?;
        info!("💾 {} records saved to {}", self.rows, self.path.display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn writes_header_and_rows() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("roster.csv");

        let mut jane = Record::blank("womens-soccer", 2012, "https://x/roster/2012-13");
        jane.name = "Jane Doe".into();
        jane.class_standing = "So.".into();
        jane.hometown = "Austin, TX".into();

        let mut sink = CsvSink::create(&path).unwrap();
        sink.accept_all(&[jane]).unwrap();

        let written = std::fs::read_to_string(&path).unwrap();
        let mut lines = written.lines();
        assert_eq!(
            lines.next().unwrap(),
            "Name,Category,Year,ClassStanding,Position,Hometown,HighSchool,Height,Weight,SourceURL,CompletionYear"
        );
        assert_eq!(
            lines.next().unwrap(),
            "Jane Doe,Womens Soccer,2012,So.,N/A,\"Austin, TX\",N/A,N/A,N/A,https://x/roster/2012-13,2015"
        );
        assert!(lines.next().is_none());
    }

    #[test]
    fn empty_run_still_writes_the_header() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("empty.csv");
        let mut sink = CsvSink::create(&path).unwrap();
        sink.accept_all(&[]).unwrap();

        let written = std::fs::read_to_string(&path).unwrap();
        assert_eq!(written.lines().collect::<Vec<_>>(), vec![HEADER.join(",")]);
    }
}
