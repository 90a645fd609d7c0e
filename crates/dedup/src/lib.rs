//! Exact content deduplication over ordered capture sequences
//!
//! Byte identity (SHA-256 of file bytes) is the sole equality criterion.
//! Near-identical-but-not-byte-identical frames are intentionally left in
//! place; there is no perceptual tier. A single linear pass keyed by a
//! fingerprint map decides survival, so the cost is one hash per artifact.

use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::fs;
use std::path::Path;
use tracing::{debug, warn};
use video_snapshot_common::{CaptureArtifact, Result};

/// SHA-256 digest of an artifact's raw bytes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Fingerprint([u8; 32]);

impl Fingerprint {
    /// Hash a file's bytes once
    pub fn of_file(path: &Path) -> Result<Self> {
        let bytes = fs::read(path)?;
        Ok(Self(Sha256::digest(&bytes).into()))
    }

    /// Lowercase hex rendering, for log lines
    #[must_use]
    pub fn to_hex(&self) -> String {
        self.0.iter().map(|b| format!("{b:02x}")).collect()
    }
}

/// Deduplication settings
#[derive(Debug, Clone, Default)]
pub struct DedupConfig {
    /// Re-open fingerprint-colliding pairs and compare decoded pixel
    /// buffers before removal. Fingerprint equality alone remains
    /// authoritative when this is off.
    pub verify_pixels: bool,
}

/// Result of one deduplication pass
#[derive(Debug)]
pub struct DedupOutcome {
    /// Artifacts that survived, in their original order
    pub survivors: Vec<CaptureArtifact>,
    /// Number of duplicate files deleted from disk
    pub removed: usize,
}

/// Deduplicate with default settings
pub fn dedupe(artifacts: Vec<CaptureArtifact>) -> Result<DedupOutcome> {
    dedupe_with(artifacts, &DedupConfig::default())
}

/// Walk the sequence in order, keeping the first artifact per fingerprint
/// and deleting every later byte-identical one from disk.
///
/// Zero or one artifact is a no-op that removes nothing.
pub fn dedupe_with(
    artifacts: Vec<CaptureArtifact>,
    config: &DedupConfig,
) -> Result<DedupOutcome> {
    if artifacts.len() <= 1 {
        return Ok(DedupOutcome {
            survivors: artifacts,
            removed: 0,
        });
    }

    let mut first_seen: HashMap<Fingerprint, usize> = HashMap::with_capacity(artifacts.len());
    let mut keep = vec![true; artifacts.len()];

    for (index, artifact) in artifacts.iter().enumerate() {
        let fingerprint = Fingerprint::of_file(&artifact.path)?;
        match first_seen.get(&fingerprint) {
            Some(&holder) => {
                if config.verify_pixels
                    && !pixels_identical(&artifacts[holder].path, &artifact.path)?
                {
                    // A genuine hash collision between distinct frames:
                    // keep both rather than discard real content.
                    warn!(
                        "Fingerprint {} collides for non-identical frames {} and {}",
                        fingerprint.to_hex(),
                        artifacts[holder].path.display(),
                        artifact.path.display()
                    );
                    continue;
                }
                keep[index] = false;
            }
            None => {
                first_seen.insert(fingerprint, index);
            }
        }
    }

    let mut removed = 0;
    let mut survivors = Vec::with_capacity(artifacts.len());
    for (index, artifact) in artifacts.into_iter().enumerate() {
        if keep[index] {
            survivors.push(artifact);
        } else {
            fs::remove_file(&artifact.path)?;
            removed += 1;
        }
    }

    debug!(
        "Removed {removed} duplicate captures, {} survive",
        survivors.len()
    );

    Ok(DedupOutcome { survivors, removed })
}

/// Decode both images and compare dimensions and raw RGB buffers
fn pixels_identical(a: &Path, b: &Path) -> Result<bool> {
    let image_a = image::open(a)?.to_rgb8();
    let image_b = image::open(b)?.to_rgb8();
    Ok(image_a.dimensions() == image_b.dimensions() && image_a.as_raw() == image_b.as_raw())
}

/// Audit that no two surviving artifacts share a fingerprint
pub fn verify_unique(artifacts: &[CaptureArtifact]) -> Result<bool> {
    if artifacts.len() <= 1 {
        return Ok(true);
    }

    let mut seen: HashMap<Fingerprint, &Path> = HashMap::with_capacity(artifacts.len());
    for artifact in artifacts {
        let fingerprint = Fingerprint::of_file(&artifact.path)?;
        if let Some(previous) = seen.insert(fingerprint, &artifact.path) {
            warn!(
                "Duplicate surviving captures: {} == {}",
                previous.display(),
                artifact.path.display()
            );
            return Ok(false);
        }
    }

    Ok(true)
}
