//! CSV output

use anyhow::{Context, Result};
use cycle_log_engine::Record;
use std::fs;
use std::io;
use std::path::Path;

/// Write one row per record under a `columns` header
///
/// Parent directories are created as needed. Returns the number of rows written.
pub fn save_results(path: &Path, columns: &[String], records: &[Record]) -> Result<usize> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create output directory: {:?}", parent))?;
    }
    let file = fs::File::create(path).with_context(|| format!("Failed to create {:?}", path))?;
    write_csv(file, columns, records).with_context(|| format!("Failed to write {:?}", path))?;
    log::info!("Saved {} records to {:?}", records.len(), path);
    Ok(records.len())
}

/// Serialize records as CSV into any writer
pub fn write_csv<W: io::Write>(writer: W, columns: &[String], records: &[Record]) -> csv::Result<()> {
    let mut csv = csv::WriterBuilder::new()
        .terminator(csv::Terminator::Any(b'\n'))
        .from_writer(writer);
    csv.write_record(columns)?;
    for record in records {
        csv.write_record(record.to_row(columns))?;
    }
    csv.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use cycle_log_engine::FieldValue;

    fn columns() -> Vec<String> {
        ["SourceFiles", "StartTime", "Step", "AvgValue", "Duration(s)", "frames"]
            .iter()
            .map(|s| s.to_string())
            .collect()
    }

    #[test]
    fn test_write_csv() {
        let mut record = Record::new();
        record.insert("SourceFiles", "logs/a.log+logs/b,1.log");
        record.insert("StartTime", "25/07/09 00:00:00");
        record.insert("Step", "1");
        record.insert("AvgValue", Some(100.0));
        record.insert("frames", FieldValue::Integer(1));
        record.insert("Extra", "ignored");

        let mut out = Vec::new();
        write_csv(&mut out, &columns(), &[record]).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert_eq!(
            text,
            "SourceFiles,StartTime,Step,AvgValue,Duration(s),frames\n\
             \"logs/a.log+logs/b,1.log\",25/07/09 00:00:00,1,100.0,,1\n"
        );
    }

    #[test]
    fn test_save_creates_directories() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("results").join("out.csv");
        let written = save_results(&path, &columns(), &[Record::new()]).unwrap();
        assert_eq!(written, 1);
        let text = fs::read_to_string(&path).unwrap();
        assert_eq!(text.lines().nth(1), Some(",,,,,"));
    }
}
