//! Attestation file persistence
//!
//! `<path>` holds the exact attestation bytes and is the only input Redeem trusts.
//! `<path>.json` (the full file name plus `.json`, e.g. `transfer.bin.json`)
//! holds the structured form for humans and never aliases `<path>`.

use std::path::{Path, PathBuf};
use tracing::info;

use crate::attestation::{self, Attestation};
use crate::error::Result;
use crate::types::MessageKind;

/// Reads and writes attestation files.
#[derive(Debug, Clone)]
pub struct AttestationStore {
    path: PathBuf,
}

impl AttestationStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Path of the companion inspection file
    pub fn json_path(&self) -> PathBuf {
        let mut name = self.path.clone().into_os_string();
        name.push(".json");
        PathBuf::from(name)
    }

    /// Writes the canonical bytes, then the structured companion.
    pub async fn persist(&self, attestation: &Attestation) -> Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }

        let bytes = attestation::encode(attestation)?;
        tokio::fs::write(&self.path, bytes).await?;

        let json = serde_json::to_vec_pretty(&attestation.canonical_form())
            .map_err(std::io::Error::from)?;
        tokio::fs::write(self.json_path(), json).await?;

        info!(
            "📝 Attestation saved to {} (inspection copy: {})",
            self.path.display(),
            self.json_path().display()
        );
        Ok(())
    }

    /// Loads the canonical bytes and decodes them as `expected_kind`.
    pub async fn load(&self, expected_kind: MessageKind) -> Result<Attestation> {
        let bytes = tokio::fs::read(&self.path).await?;
        attestation::decode(&bytes, expected_kind)
    }
}
