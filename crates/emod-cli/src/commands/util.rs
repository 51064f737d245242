use anyhow::{bail, Result};

/// Worker count from a command-line value; "auto" and "0" mean one per CPU.
pub fn parse_workers(spec: &str) -> Result<usize> {
    if spec.eq_ignore_ascii_case("auto") {
        return Ok(num_cpus::get());
    }
    match spec.trim().parse::<usize>() {
        Ok(0) => Ok(num_cpus::get()),
        Ok(count) => Ok(count),
        Err(_) => bail!("invalid worker count '{spec}'; expected a number or 'auto'"),
    }
}

/// Comma-separated list with blanks dropped.
pub fn parse_list(spec: &str) -> Vec<String> {
    spec.split(',')
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}
