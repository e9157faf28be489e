//! Model artifact: the fitted network and the bin configuration it was
//! trained with, saved as one file.
//!
//! # Layout
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │ Magic "FSBN" (4 bytes)                  │
//! │ Version (u16 LE)                        │
//! │ Flags (u16 LE), bit 0 = has bin config  │
//! │ Payload (bincode)                       │
//! │ CRC32 of everything above (u32 LE)      │
//! └─────────────────────────────────────────┘
//! ```
//!
//! An artifact without a bin configuration is a legacy artifact: it loads,
//! but new records cannot be discretized against training-time boundaries.

use std::fmt;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::bayes::BayesianModel;
use crate::discretize::{BinConfig, Strategy};
use crate::error::{FaultsenseError, Result};

/// Magic bytes at the start of every artifact.
pub const MAGIC: [u8; 4] = *b"FSBN";

/// Current artifact version.
pub const FORMAT_VERSION: u16 = 1;

const HEADER_SIZE: usize = 8;
const FLAG_HAS_BINS: u16 = 1;

fn crc32(data: &[u8]) -> u32 {
    // IEEE polynomial 0xEDB88320
    const TABLE: [u32; 256] = {
        let mut table = [0u32; 256];
        let mut i = 0;
        while i < 256 {
            let mut crc = i as u32;
            let mut j = 0;
            while j < 8 {
                if crc & 1 != 0 {
                    crc = (crc >> 1) ^ 0xEDB8_8320;
                } else {
                    crc >>= 1;
                }
                j += 1;
            }
            table[i] = crc;
            i += 1;
        }
        table
    };

    let mut crc = 0xFFFF_FFFF_u32;
    for &byte in data {
        let idx = ((crc ^ u32::from(byte)) & 0xFF) as usize;
        crc = (crc >> 8) ^ TABLE[idx];
    }
    !crc
}

/// Provenance of a training run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ArtifactMetadata {
    /// Crate version that wrote the artifact.
    pub created_by: String,
    pub training_rows: usize,
    pub rule_count: usize,
    pub validation_accuracy: Option<f64>,
}

#[derive(Serialize, Deserialize)]
struct Payload {
    model: BayesianModel,
    bins: Option<BinConfig>,
    metadata: ArtifactMetadata,
}

/// Fitted model plus the bin configuration used for training.
#[derive(Debug, Clone, PartialEq)]
pub struct ModelArtifact {
    model: BayesianModel,
    bins: Option<BinConfig>,
    metadata: ArtifactMetadata,
}

impl ModelArtifact {
    #[must_use]
    pub fn new(model: BayesianModel, bins: BinConfig, metadata: ArtifactMetadata) -> Self {
        Self {
            model,
            bins: Some(bins),
            metadata,
        }
    }

    /// Artifact without a bin configuration.
    #[must_use]
    pub fn legacy(model: BayesianModel, metadata: ArtifactMetadata) -> Self {
        Self {
            model,
            bins: None,
            metadata,
        }
    }

    #[must_use]
    pub fn model(&self) -> &BayesianModel {
        &self.model
    }

    #[must_use]
    pub fn bins(&self) -> Option<&BinConfig> {
        self.bins.as_ref()
    }

    #[must_use]
    pub fn metadata(&self) -> &ArtifactMetadata {
        &self.metadata
    }

    #[must_use]
    pub fn is_legacy(&self) -> bool {
        self.bins.is_none()
    }

    /// Serialize to bytes.
    ///
    /// # Errors
    ///
    /// Returns a serialization error if bincode fails.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let payload = Payload {
            model: self.model.clone(),
            bins: self.bins.clone(),
            metadata: self.metadata.clone(),
        };
        let body = bincode::serialize(&payload)?;
        let flags = if self.bins.is_some() { FLAG_HAS_BINS } else { 0 };

        let mut bytes = Vec::with_capacity(HEADER_SIZE + body.len() + 4);
        bytes.extend_from_slice(&MAGIC);
        bytes.extend_from_slice(&FORMAT_VERSION.to_le_bytes());
        bytes.extend_from_slice(&flags.to_le_bytes());
        bytes.extend_from_slice(&body);
        let checksum = crc32(&bytes);
        bytes.extend_from_slice(&checksum.to_le_bytes());
        Ok(bytes)
    }

    /// Parse bytes written by [`ModelArtifact::to_bytes`].
    ///
    /// # Errors
    ///
    /// Returns a format error for a bad magic, checksum or flag/payload
    /// disagreement, and [`FaultsenseError::UnsupportedVersion`] for
    /// artifacts newer than this build.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < HEADER_SIZE + 4 {
            return Err(FaultsenseError::Format {
                message: format!("artifact too small: {} bytes", bytes.len()),
            });
        }
        if bytes[0..4] != MAGIC {
            return Err(FaultsenseError::Format {
                message: "not a faultsense model (bad magic)".to_string(),
            });
        }
        let version = u16::from_le_bytes([bytes[4], bytes[5]]);
        if version == 0 || version > FORMAT_VERSION {
            return Err(FaultsenseError::UnsupportedVersion {
                found: version,
                supported: FORMAT_VERSION,
            });
        }
        let (content, trailer) = bytes.split_at(bytes.len() - 4);
        let stored = u32::from_le_bytes([trailer[0], trailer[1], trailer[2], trailer[3]]);
        if stored != crc32(content) {
            return Err(FaultsenseError::Format {
                message: "checksum mismatch: artifact is corrupt".to_string(),
            });
        }
        let flags = u16::from_le_bytes([bytes[6], bytes[7]]);

        let payload: Payload = bincode::deserialize(&content[HEADER_SIZE..])?;
        if payload.bins.is_some() != (flags & FLAG_HAS_BINS != 0) {
            return Err(FaultsenseError::Format {
                message: "header flags disagree with payload".to_string(),
            });
        }
        Ok(Self {
            model: payload.model,
            bins: payload.bins,
            metadata: payload.metadata,
        })
    }

    /// Write to `path`, replacing any existing file.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization or the write fails.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        std::fs::write(path, self.to_bytes()?)?;
        info!(path = %path.display(), legacy = self.is_legacy(), "model artifact saved");
        Ok(())
    }

    /// Read from `path`. Legacy artifacts load with a warning.
    ///
    /// # Errors
    ///
    /// See [`ModelArtifact::from_bytes`].
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let artifact = Self::from_bytes(&std::fs::read(path)?)?;
        if artifact.is_legacy() {
            warn!(
                path = %path.display(),
                "model has no bin configuration; new records cannot be discretized reliably"
            );
        }
        Ok(artifact)
    }

    /// Inspection summary.
    #[must_use]
    pub fn summary(&self) -> ArtifactSummary {
        let nodes = self
            .model
            .nodes()
            .into_iter()
            .map(|node| NodeSummary {
                name: node.name().to_string(),
                states: self.model.states(node).map_or(0, <[String]>::len),
            })
            .collect();
        ArtifactSummary {
            nodes,
            edges: self
                .model
                .structure()
                .edges()
                .map(|(from, to)| format!("{from} → {to}"))
                .collect(),
            estimator: self.model.estimator().name().to_string(),
            strategy: self.bins.as_ref().map(BinConfig::strategy),
            num_bins: self.bins.as_ref().map(BinConfig::num_bins),
            legacy: self.is_legacy(),
            metadata: self.metadata.clone(),
        }
    }
}

/// One node in an [`ArtifactSummary`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NodeSummary {
    pub name: String,
    pub states: usize,
}

/// What an artifact contains.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ArtifactSummary {
    pub nodes: Vec<NodeSummary>,
    pub edges: Vec<String>,
    pub estimator: String,
    pub strategy: Option<Strategy>,
    pub num_bins: Option<usize>,
    pub legacy: bool,
    pub metadata: ArtifactMetadata,
}

impl fmt::Display for ArtifactSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "estimator: {}", self.estimator)?;
        match (self.strategy, self.num_bins) {
            (Some(strategy), Some(n)) => writeln!(f, "bins: {strategy}, {n} per feature")?,
            _ => writeln!(f, "bins: none (legacy model)")?,
        }
        writeln!(f, "nodes:")?;
        for node in &self.nodes {
            writeln!(f, "  {} ({} states)", node.name, node.states)?;
        }
        writeln!(f, "edges:")?;
        for edge in &self.edges {
            writeln!(f, "  {edge}")?;
        }
        write!(
            f,
            "trained on {} rows from {} rules",
            self.metadata.training_rows, self.metadata.rule_count
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bayes::ParameterEstimator;
    use crate::fixtures;
    use crate::network::NetworkStructure;
    use crate::schema::{Feature, NodeId};

    fn artifact() -> ModelArtifact {
        let dataset = fixtures::plant(200, 4);
        let bins = BinConfig::fit(&dataset, 5, Strategy::Quantile).unwrap();
        let rows = bins.discretize(&dataset);
        let structure = NetworkStructure::from_parents([
            NodeId::Department,
            NodeId::Feature(Feature::Temp),
        ])
        .unwrap();
        let model = ParameterEstimator::default().fit(&structure, &rows).unwrap();
        let metadata = ArtifactMetadata {
            created_by: "test".into(),
            training_rows: rows.len(),
            rule_count: 2,
            validation_accuracy: Some(0.9),
        };
        ModelArtifact::new(model, bins, metadata)
    }

    #[test]
    fn test_crc32_known_value() {
        assert_eq!(crc32(b"123456789"), 0xCBF4_3926);
    }

    #[test]
    fn test_bytes_round_trip_is_exact() {
        let original = artifact();
        let bytes = original.to_bytes().unwrap();
        assert_eq!(&bytes[0..4], b"FSBN");
        let loaded = ModelArtifact::from_bytes(&bytes).unwrap();
        assert_eq!(loaded, original);
        assert_eq!(loaded.to_bytes().unwrap(), bytes);
    }

    #[test]
    fn test_file_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("model.fsbn");
        let original = artifact();
        original.save(&path).unwrap();
        let loaded = ModelArtifact::load(&path).unwrap();
        assert_eq!(loaded.bins(), original.bins());
        assert!(!loaded.is_legacy());
    }

    #[test]
    fn test_legacy_artifact_is_flagged() {
        let full = artifact();
        let legacy = ModelArtifact::legacy(full.model().clone(), ArtifactMetadata::default());
        let loaded = ModelArtifact::from_bytes(&legacy.to_bytes().unwrap()).unwrap();
        assert!(loaded.is_legacy());
        assert!(loaded.summary().legacy);
        assert!(loaded.summary().to_string().contains("legacy"));
    }

    #[test]
    fn test_corruption_is_detected() {
        let mut bytes = artifact().to_bytes().unwrap();
        let mid = bytes.len() / 2;
        bytes[mid] ^= 0xFF;
        let err = ModelArtifact::from_bytes(&bytes).unwrap_err();
        assert!(err.to_string().contains("checksum"));
    }

    #[test]
    fn test_bad_magic_and_version() {
        let bytes = artifact().to_bytes().unwrap();
        let mut bad_magic = bytes.clone();
        bad_magic[0] = b'X';
        assert!(matches!(
            ModelArtifact::from_bytes(&bad_magic),
            Err(FaultsenseError::Format { .. })
        ));

        let mut future = bytes;
        future[4..6].copy_from_slice(&9u16.to_le_bytes());
        assert!(matches!(
            ModelArtifact::from_bytes(&future),
            Err(FaultsenseError::UnsupportedVersion { found: 9, supported: 1 })
        ));
        assert!(ModelArtifact::from_bytes(b"FSBN").is_err());
    }

    #[test]
    fn test_summary_lists_structure() {
        let summary = artifact().summary();
        assert_eq!(summary.nodes.len(), 3);
        assert_eq!(summary.nodes[2].name, "故障类型");
        assert_eq!(summary.edges.len(), 2);
        assert_eq!(summary.strategy, Some(Strategy::Quantile));
        assert_eq!(summary.estimator, "bdeu");
        assert_eq!(summary.nodes[1].states, 5);
    }
}
