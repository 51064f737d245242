//! Manifest schema for scenario directories with version tracking and integrity validation.
//!
//! Each scenario directory contains a `manifest.json` file that:
//! - Tracks the schema version, consulted once at start-up to decide whether
//!   forward-compatible migrations are needed
//! - Stores SHA256 checksums of all table files
//! - Carries declared parameter defaults
//! - Records the emod version that wrote the directory

use chrono::{DateTime, Utc};
use emod_core::{EmodError, EmodResult};
use semver::Version;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

/// Current schema version (semver)
pub const CURRENT_SCHEMA_VERSION: &str = "1.1.0";

/// File name of the manifest inside a scenario directory
pub const MANIFEST_FILE: &str = "manifest.json";

/// Complete manifest for a scenario directory
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreManifest {
    /// Schema version for migration support (e.g., "1.1.0")
    pub schema_version: String,

    /// Timestamp when the directory was written
    pub created_at: DateTime<Utc>,

    /// emod version that wrote this directory
    pub emod_version: String,

    /// Metadata for each table file, keyed by path relative to the directory
    #[serde(default)]
    pub tables: BTreeMap<String, TableInfo>,

    /// Parameter defaults overriding the built-in catalogue defaults
    #[serde(default)]
    pub defaults: BTreeMap<String, f64>,
}

/// Metadata for a single table file
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TableInfo {
    /// SHA256 checksum of the file
    pub sha256: String,

    /// Number of data rows in the table
    pub row_count: u64,
}

/// Outcome of the start-up schema check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Compatibility {
    Current,
    /// Older schema; readable, but forward migrations would apply
    NeedsMigration,
}

impl StoreManifest {
    /// Create a new manifest for the current schema version
    pub fn new(emod_version: String) -> Self {
        Self {
            schema_version: CURRENT_SCHEMA_VERSION.to_string(),
            created_at: Utc::now(),
            emod_version,
            tables: BTreeMap::new(),
            defaults: BTreeMap::new(),
        }
    }

    /// Add table metadata to the manifest
    pub fn add_table(&mut self, name: impl Into<String>, info: TableInfo) {
        self.tables.insert(name.into(), info);
    }

    /// Check this manifest's schema version against the current code
    pub fn check_compatibility(&self) -> EmodResult<Compatibility> {
        let manifest_version = Version::parse(&self.schema_version).map_err(|e| {
            EmodError::Input(format!("Invalid schema version in manifest: {}", e))
        })?;
        let current_version = Version::parse(CURRENT_SCHEMA_VERSION)
            .map_err(|e| EmodError::Other(e.to_string()))?;

        if manifest_version.major > current_version.major {
            return Err(EmodError::Input(format!(
                "Schema v{} is too new (this version supports up to v{})",
                self.schema_version, CURRENT_SCHEMA_VERSION
            )));
        }

        if manifest_version < current_version {
            Ok(Compatibility::NeedsMigration)
        } else {
            Ok(Compatibility::Current)
        }
    }

    /// Validate checksums of all table files
    pub fn validate_checksums(&self, base_path: &Path) -> EmodResult<()> {
        for (table_name, info) in &self.tables {
            let file_path = base_path.join(table_name);

            if !file_path.exists() {
                return Err(EmodError::Input(format!(
                    "Table file not found: {}",
                    file_path.display()
                )));
            }

            let actual_hash = compute_sha256(&file_path)?;

            if actual_hash != info.sha256 {
                return Err(EmodError::Input(format!(
                    "Checksum mismatch for table '{}': expected {}, got {}",
                    table_name, info.sha256, actual_hash
                )));
            }
        }

        Ok(())
    }
}

/// Compute SHA256 hash of a file
pub fn compute_sha256(path: &Path) -> EmodResult<String> {
    use sha2::{Digest, Sha256};
    use std::fs::File;
    use std::io::Read;

    let mut file = File::open(path).map_err(|e| {
        EmodError::Input(format!(
            "Failed to open file for hashing {}: {}",
            path.display(),
            e
        ))
    })?;

    let mut hasher = Sha256::new();
    let mut buffer = [0; 8192];

    loop {
        let n = file.read(&mut buffer)?;
        if n == 0 {
            break;
        }
        hasher.update(&buffer[..n]);
    }

    Ok(format!("{:x}", hasher.finalize()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_manifest_creation() {
        let manifest = StoreManifest::new(env!("CARGO_PKG_VERSION").to_string());

        assert_eq!(manifest.schema_version, CURRENT_SCHEMA_VERSION);
        assert_eq!(manifest.emod_version, env!("CARGO_PKG_VERSION"));
        assert!(manifest.tables.is_empty());
    }

    #[test]
    fn test_version_current() {
        let manifest = StoreManifest::new("0.3.0".to_string());
        assert_eq!(
            manifest.check_compatibility().unwrap(),
            Compatibility::Current
        );
    }

    #[test]
    fn test_version_older_needs_migration() {
        let mut manifest = StoreManifest::new("0.3.0".to_string());
        manifest.schema_version = "1.0.0".to_string();
        assert_eq!(
            manifest.check_compatibility().unwrap(),
            Compatibility::NeedsMigration
        );
    }

    #[test]
    fn test_version_major_newer() {
        let mut manifest = StoreManifest::new("0.3.0".to_string());
        manifest.schema_version = "2.0.0".to_string();
        let err = manifest.check_compatibility().unwrap_err();
        assert!(err.is_input_error());
    }

    #[test]
    fn test_invalid_version_string() {
        let mut manifest = StoreManifest::new("0.3.0".to_string());
        manifest.schema_version = "one".to_string();
        assert!(manifest.check_compatibility().is_err());
    }

    #[test]
    fn test_checksum_mismatch_detected() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("REGION.csv"), "id\nR1\n").unwrap();

        let mut manifest = StoreManifest::new("0.3.0".to_string());
        manifest.add_table(
            "REGION.csv",
            TableInfo {
                sha256: "0".repeat(64),
                row_count: 1,
            },
        );
        let err = manifest.validate_checksums(dir.path()).unwrap_err();
        assert!(err.to_string().contains("Checksum mismatch"));

        let actual = compute_sha256(&dir.path().join("REGION.csv")).unwrap();
        manifest.add_table(
            "REGION.csv",
            TableInfo {
                sha256: actual,
                row_count: 1,
            },
        );
        assert!(manifest.validate_checksums(dir.path()).is_ok());
    }

    #[test]
    fn test_manifest_serialization_keeps_defaults() {
        let mut manifest = StoreManifest::new("0.3.0".to_string());
        manifest.defaults.insert("DiscountRate".to_string(), 0.07);

        let json = serde_json::to_string(&manifest).unwrap();
        let parsed: StoreManifest = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.defaults.get("DiscountRate"), Some(&0.07));
    }
}
