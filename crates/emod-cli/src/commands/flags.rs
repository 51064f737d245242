use std::io::{self, Write};
use std::path::Path;

use anyhow::{Context, Result};
use emod_algo::ModelFlags;
use emod_cli::cli::OutputFormat;
use emod_core::ScenarioFlags;
use emod_io::FactStore;
use tabwriter::TabWriter;

pub fn handle(scenario: &Path, format: OutputFormat) -> Result<()> {
    let store = FactStore::open(scenario)
        .with_context(|| format!("opening scenario {}", scenario.display()))?;
    let flags = ModelFlags::resolve(&store, &ScenarioFlags::default())?;
    match format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&flags)?);
        }
        OutputFormat::Plain => {
            let mut writer = TabWriter::new(io::stdout());
            writeln!(writer, "FLAG\tVALUE")?;
            for (name, value) in [
                ("nodal", flags.nodal),
                ("storage", flags.storage),
                ("reserve_margin", flags.reserve_margin),
                ("re_target", flags.re_target),
                ("model_period_activity_limits", flags.model_period_activity_limits),
                ("model_period_emission_limits", flags.model_period_emission_limits),
                ("technology_units", flags.technology_units),
                ("trade", flags.trade),
            ] {
                writeln!(writer, "{name}\t{value}")?;
            }
            writer.flush()?;
        }
    }
    Ok(())
}
