//! Determinism verification: render a fixed fixture twice and compare.
//!
//! The two manifests must match byte for byte once `rendered_at` is
//! blanked. Observed content hashes are then checked against the pins
//! file. A caption mismatch always fails; a video mismatch fails only in
//! strict mode since encoder builds differ across machines.

use std::path::{Path, PathBuf};

use anyhow::Context;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use beatreel_common::config::AppConfig;
use beatreel_edit_model::{AssetManifest, RenderOutput, RenderPlan};
use beatreel_render_engine::MANIFEST_FILE;

use super::render::assembler;

/// Pinned content hashes (bare hex).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pins {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub captions_sha256: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub video_sha256: Option<String>,
}

impl Pins {
    fn load(path: &Path) -> anyhow::Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read pins {}", path.display()))?;
        serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse pins {}", path.display()))
    }

    fn observed(output: &RenderOutput) -> Self {
        Self {
            captions_sha256: Some(output.hashes.captions_sha256.clone()),
            video_sha256: Some(output.hashes.video_sha256.clone()),
        }
    }
}

/// Outcome of comparing one observed hash with its pin.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PinCheck {
    Match,
    Unpinned,
    Mismatch { expected: String, actual: String },
}

fn check_pin(pinned: Option<&str>, actual: &str) -> PinCheck {
    match pinned {
        None => PinCheck::Unpinned,
        Some(expected) if expected == actual => PinCheck::Match,
        Some(expected) => PinCheck::Mismatch {
            expected: expected.to_string(),
            actual: actual.to_string(),
        },
    }
}

/// Hard failures and soft warnings collected during verification.
#[derive(Debug, Default)]
pub struct Report {
    pub failures: Vec<String>,
    pub warnings: Vec<String>,
}

impl Report {
    pub fn passed(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Manifest file contents with the `provenance.rendered_at` value blanked
/// in place. Every other byte is kept as written.
pub fn blanked_manifest(path: &Path) -> anyhow::Result<Vec<u8>> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read manifest {}", path.display()))?;
    let value: Value = serde_json::from_str(&text)
        .with_context(|| format!("Failed to parse manifest {}", path.display()))?;
    let rendered_at = value
        .pointer("/provenance/rendered_at")
        .and_then(Value::as_str)
        .with_context(|| format!("{} has no provenance.rendered_at", path.display()))?;
    if rendered_at.is_empty() {
        return Ok(text.into_bytes());
    }
    let quoted = serde_json::to_string(rendered_at)?;
    Ok(text.replacen(&quoted, "\"\"", 1).into_bytes())
}

/// Whether two manifests on disk are byte-identical once `rendered_at`
/// is blanked.
pub fn manifests_match(first: &Path, second: &Path) -> anyhow::Result<bool> {
    Ok(blanked_manifest(first)? == blanked_manifest(second)?)
}

/// Fold the manifest comparison and the pins into a report; pure so it can
/// be tested without an encoder.
pub fn evaluate(manifests_match: bool, observed: &RenderOutput, pins: &Pins, strict: bool) -> Report {
    let mut report = Report::default();

    if !manifests_match {
        report
            .failures
            .push("manifests differ between runs (rendered_at excluded)".to_string());
    }

    match check_pin(pins.captions_sha256.as_deref(), &observed.hashes.captions_sha256) {
        PinCheck::Match => {}
        PinCheck::Unpinned => report
            .warnings
            .push("no captions_sha256 pin; skipped".to_string()),
        PinCheck::Mismatch { expected, actual } => report
            .failures
            .push(format!("captions hash {actual} != pinned {expected}")),
    }

    match check_pin(pins.video_sha256.as_deref(), &observed.hashes.video_sha256) {
        PinCheck::Match => {}
        PinCheck::Unpinned => report
            .warnings
            .push("no video_sha256 pin; skipped".to_string()),
        PinCheck::Mismatch { expected, actual } => {
            let message = format!("video hash {actual} != pinned {expected}");
            if strict {
                report.failures.push(message);
            } else {
                report.warnings.push(message);
            }
        }
    }

    report
}

pub async fn run(
    config: AppConfig,
    fixture: PathBuf,
    pins_path: PathBuf,
    record: bool,
    strict: bool,
) -> anyhow::Result<()> {
    println!("Beatreel Verification");
    println!("{}", "=".repeat(50));
    println!("Fixture: {}", fixture.display());

    let (first, identical) = tokio::task::spawn_blocking(move || render_twice(&config, &fixture))
        .await
        .context("Verification task panicked")??;

    if record {
        let observed = Pins::observed(&first);
        if let Some(parent) = pins_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&pins_path, serde_json::to_string_pretty(&observed)? + "\n")
            .with_context(|| format!("Failed to write pins {}", pins_path.display()))?;
        println!("[OK] Recorded pins to {}", pins_path.display());
    }

    let pins = Pins::load(&pins_path)?;
    let report = evaluate(identical, &first, &pins, strict);

    println!("     Output id:       {}", first.output_id);
    println!("     Captions sha256: {}", first.hashes.captions_sha256);
    println!("     Video sha256:    {}", first.hashes.video_sha256);
    for warning in &report.warnings {
        println!("[WARN] {warning}");
    }
    for failure in &report.failures {
        println!("[FAIL] {failure}");
    }

    println!();
    if report.passed() {
        println!("Verification passed.");
        Ok(())
    } else {
        println!("Verification failed.");
        std::process::exit(1);
    }
}

/// Two independent renders of the fixture sharing one fresh motion cache,
/// so the second run also exercises cache hits. Returns the first run's
/// output and whether the two written manifests match.
fn render_twice(config: &AppConfig, fixture: &Path) -> anyhow::Result<(RenderOutput, bool)> {
    let plan_path = fixture.join("plan.json");
    let manifest_path = fixture.join("manifest.json");
    let plan = RenderPlan::load(&plan_path)
        .with_context(|| format!("Failed to load {}", plan_path.display()))?;
    let manifest = AssetManifest::load(&manifest_path)
        .with_context(|| format!("Failed to load {}", manifest_path.display()))?;

    let scratch = tempfile::Builder::new().prefix("beatreel-verify-").tempdir()?;
    let cache_root = scratch.path().join("cache");
    let assembler = assembler(config, Some(fixture.to_path_buf()), true, Some(cache_root));

    let (run1, run2) = (scratch.path().join("run1"), scratch.path().join("run2"));
    let first = assembler.render(&manifest, &plan, &run1)?;
    let second = assembler.render(&manifest, &plan, &run2)?;
    let identical = manifests_match(&run1.join(MANIFEST_FILE), &run2.join(MANIFEST_FILE))?;
    tracing::info!(
        first = %first.output_id,
        second = %second.output_id,
        identical,
        "Verification renders complete"
    );
    Ok((first, identical))
}
