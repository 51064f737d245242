//! Table inventory of a scenario directory.

use std::io::{self, Write};
use std::path::Path;

use anyhow::{Context, Result};
use emod_cli::cli::OutputFormat;
use emod_io::{Compatibility, FactStore};
use serde::Serialize;
use tabwriter::TabWriter;

#[derive(Serialize)]
struct Inventory<'a> {
    schema_version: Option<&'a str>,
    tables: Vec<TableEntry>,
}

#[derive(Serialize)]
struct TableEntry {
    table: String,
    rows: usize,
}

pub fn handle(scenario: &Path, format: OutputFormat) -> Result<()> {
    let store = FactStore::open(scenario)
        .with_context(|| format!("opening scenario {}", scenario.display()))?;
    let inventory = Inventory {
        schema_version: store.manifest().map(|m| m.schema_version.as_str()),
        tables: store
            .inventory()
            .into_iter()
            .map(|(table, rows)| TableEntry { table, rows })
            .collect(),
    };

    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&inventory)?),
        OutputFormat::Plain => {
            if let Some(manifest) = store.manifest() {
                let note = match manifest.check_compatibility() {
                    Ok(Compatibility::NeedsMigration) => " (needs migration)",
                    _ => "",
                };
                println!("Schema version: {}{}", manifest.schema_version, note);
            }
            let mut writer = TabWriter::new(io::stdout());
            writeln!(writer, "TABLE\tROWS")?;
            for entry in &inventory.tables {
                writeln!(writer, "{}\t{}", entry.table, entry.rows)?;
            }
            writer.flush()?;
        }
    }
    Ok(())
}
