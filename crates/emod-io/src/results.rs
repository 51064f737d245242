//! Result persistence: one CSV table per solved variable family.
//!
//! Each table is written to a hidden temporary file in the results directory
//! and renamed into place, so a family is either fully persisted or absent.

use chrono::{DateTime, SecondsFormat, Utc};
use emod_core::{EmodError, EmodResult, Key};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

pub const RESULTS_DIR: &str = "results";

/// Solved values of one variable family.
#[derive(Debug, Clone, PartialEq)]
pub struct ResultTable {
    pub family: String,
    /// Dimension column names of the family
    pub columns: Vec<String>,
    pub rows: Vec<(Key, f64)>,
    pub solved_at: DateTime<Utc>,
}

impl ResultTable {
    pub fn new(
        family: impl Into<String>,
        columns: Vec<String>,
        rows: Vec<(Key, f64)>,
        solved_at: DateTime<Utc>,
    ) -> Self {
        Self {
            family: family.into(),
            columns,
            rows,
            solved_at,
        }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Destination for persisted result tables.
pub trait ResultSink {
    /// Persist one family; on failure nothing of that family remains.
    fn write_table(&mut self, table: &ResultTable) -> EmodResult<()>;
}

/// Writes `results/<family>.csv` files under a scenario directory.
#[derive(Debug, Clone)]
pub struct CsvResultWriter {
    dir: PathBuf,
}

impl CsvResultWriter {
    pub fn new(dir: impl Into<PathBuf>) -> EmodResult<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    /// Writer targeting the `results` directory of a scenario.
    pub fn for_scenario(scenario: &Path) -> EmodResult<Self> {
        Self::new(scenario.join(RESULTS_DIR))
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn table_path(&self, family: &str) -> PathBuf {
        self.dir.join(format!("{}.csv", family))
    }

    fn temp_path(&self, family: &str) -> PathBuf {
        self.dir.join(format!(".{}.csv.tmp", family))
    }

    fn write_temp(&self, path: &Path, table: &ResultTable) -> Result<(), csv::Error> {
        let mut writer = csv::Writer::from_path(path)?;
        let mut header: Vec<&str> = table.columns.iter().map(String::as_str).collect();
        header.push("value");
        header.push("solved_at");
        writer.write_record(&header)?;

        let stamp = table.solved_at.to_rfc3339_opts(SecondsFormat::Secs, true);
        for (row_key, value) in &table.rows {
            let mut record: Vec<String> = row_key.clone();
            record.push(value.to_string());
            record.push(stamp.clone());
            writer.write_record(&record)?;
        }
        writer.flush()?;
        Ok(())
    }
}

impl ResultSink for CsvResultWriter {
    fn write_table(&mut self, table: &ResultTable) -> EmodResult<()> {
        let temp = self.temp_path(&table.family);
        let target = self.table_path(&table.family);

        let outcome = self
            .write_temp(&temp, table)
            .map_err(|err| EmodError::persistence(&table.family, err))
            .and_then(|()| {
                fs::rename(&temp, &target)
                    .map_err(|err| EmodError::persistence(&table.family, err))
            });

        if outcome.is_err() && temp.exists() {
            // Best effort; the persistence error is what gets reported
            let _ = fs::remove_file(&temp);
        }
        outcome?;

        debug!(family = %table.family, rows = table.len(), "persisted result table");
        Ok(())
    }
}

/// Persist tables in order, stopping at the first failure. Families written
/// before the failing one stay committed.
pub fn persist_tables(sink: &mut dyn ResultSink, tables: &[ResultTable]) -> EmodResult<usize> {
    for table in tables {
        sink.write_table(table)?;
    }
    info!(families = tables.len(), "persisted results");
    Ok(tables.len())
}

/// Re-read a persisted result table.
pub fn read_result_table(dir: &Path, family: &str) -> EmodResult<ResultTable> {
    let path = dir.join(format!("{}.csv", family));
    let mut reader =
        csv::Reader::from_path(&path).map_err(|err| EmodError::Parse(err.to_string()))?;
    let headers = reader
        .headers()
        .map_err(|err| EmodError::Parse(err.to_string()))?
        .clone();
    if headers.len() < 2 {
        return Err(EmodError::Parse(format!(
            "result table {} lacks value columns",
            path.display()
        )));
    }
    let key_len = headers.len() - 2;
    let columns: Vec<String> = headers.iter().take(key_len).map(str::to_string).collect();

    let mut rows = Vec::new();
    let mut solved_at = None;
    for record in reader.records() {
        let record = record.map_err(|err| EmodError::Parse(err.to_string()))?;
        let row_key: Key = record.iter().take(key_len).map(str::to_string).collect();
        let raw = record.get(key_len).unwrap_or_default();
        let value: f64 = raw
            .parse()
            .map_err(|_| EmodError::Parse(format!("value '{}' is not a number", raw)))?;
        if solved_at.is_none() {
            let stamp = record.get(key_len + 1).unwrap_or_default();
            let parsed = DateTime::parse_from_rfc3339(stamp)
                .map_err(|err| EmodError::Parse(format!("solved_at '{}': {}", stamp, err)))?;
            solved_at = Some(parsed.with_timezone(&Utc));
        }
        rows.push((row_key, value));
    }

    Ok(ResultTable {
        family: family.to_string(),
        columns,
        rows,
        solved_at: solved_at.unwrap_or_else(Utc::now),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use emod_core::key;

    fn table(family: &str) -> ResultTable {
        ResultTable::new(
            family,
            vec!["r".into(), "t".into(), "y".into()],
            vec![
                (key(&["R1", "T1", "2020"]), 1.25),
                (key(&["R1", "T1", "2021"]), 0.1 + 0.2),
            ],
            Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap(),
        )
    }

    #[test]
    fn written_table_reads_back_identically() {
        let dir = tempfile::tempdir().unwrap();
        let mut writer = CsvResultWriter::new(dir.path()).unwrap();
        let original = table("new_capacity");
        writer.write_table(&original).unwrap();

        let reread = read_result_table(dir.path(), "new_capacity").unwrap();
        assert_eq!(reread, original);
        assert!(!dir.path().join(".new_capacity.csv.tmp").exists());
    }

    #[test]
    fn failed_write_leaves_no_partial_file() {
        let dir = tempfile::tempdir().unwrap();
        let mut writer = CsvResultWriter::new(dir.path()).unwrap();
        writer.write_table(&table("new_capacity")).unwrap();

        // A directory in place of the target makes the rename fail
        fs::create_dir(dir.path().join("trade.csv")).unwrap();
        let err = writer.write_table(&table("trade")).unwrap_err();
        assert!(matches!(err, EmodError::Persistence { ref family, .. } if family == "trade"));
        assert!(!dir.path().join(".trade.csv.tmp").exists());
        assert!(dir.path().join("new_capacity.csv").exists());
    }

    #[test]
    fn persist_tables_stops_at_first_failure() {
        struct FailOn(&'static str, Vec<String>);
        impl ResultSink for FailOn {
            fn write_table(&mut self, table: &ResultTable) -> EmodResult<()> {
                if table.family == self.0 {
                    return Err(EmodError::persistence(&table.family, "disk full"));
                }
                self.1.push(table.family.clone());
                Ok(())
            }
        }

        let mut sink = FailOn("b", Vec::new());
        let tables = vec![table("a"), table("b"), table("c")];
        assert!(persist_tables(&mut sink, &tables).is_err());
        assert_eq!(sink.1, vec!["a".to_string()]);
    }

    #[test]
    fn missing_table_is_a_parse_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(read_result_table(dir.path(), "absent").is_err());
    }
}
