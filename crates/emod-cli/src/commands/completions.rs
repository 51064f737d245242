use std::{fs, io::Write, path::Path};

use anyhow::{Context, Result};
use clap_complete::{generate, Shell};
use tracing::info;

use emod_cli::cli::{build_cli_command, BIN_NAME};

/// Completion script for `shell`, covering every subcommand and solve override.
pub fn render(shell: Shell) -> Vec<u8> {
    let mut cmd = build_cli_command();
    let mut script = Vec::new();
    generate(shell, &mut cmd, BIN_NAME, &mut script);
    script
}

pub fn handle(shell: Shell, out: Option<&Path>) -> Result<()> {
    let script = render(shell);
    match out {
        Some(path) => {
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent)?;
            }
            fs::write(path, &script)
                .with_context(|| format!("writing completion script {}", path.display()))?;
            info!(?shell, path = %path.display(), "wrote completion script");
        }
        None => std::io::stdout().write_all(&script)?,
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bash_script_offers_solve_overrides() {
        let script = String::from_utf8(render(Shell::Bash)).unwrap();
        assert!(script.contains(BIN_NAME));
        assert!(script.contains("solve"));
        assert!(script.contains("--no-nodal"));
        assert!(script.contains("--continuous-transmission"));
    }

    #[test]
    fn scripts_are_written_to_nested_paths() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("completions").join("emod.zsh");
        handle(Shell::Zsh, Some(&path)).unwrap();
        let script = fs::read_to_string(&path).unwrap();
        assert!(script.contains("inspect"));
    }
}
