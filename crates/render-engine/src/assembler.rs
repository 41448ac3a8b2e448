//! Deterministic final assembly.
//!
//! Resolves one visual per shot (or EDL segment), builds a single encoder
//! command, and writes `render.mp4`, `captions.srt` and
//! `render_output.json` into the output directory.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde_json::json;
use tracing::{debug, info, warn};

use beatreel_common::clock::now_rfc3339;
use beatreel_common::config::EncoderConfig;
use beatreel_common::error::{BeatreelError, BeatreelResult};
use beatreel_common::hashing::{canonical_hash, canonical_json, sha256_file, sha256_hex};
use beatreel_edit_model::{
    AssetEntry, AssetManifest, AssetRole, BeatGrid, Edl, Lineage, MediaKind,
    OutputHashes, Provenance, RenderOutput, RenderPlan, SegmentEffect, Shot,
    RENDER_OUTPUT_SCHEMA_VERSION,
};

use crate::captions::{cues_from_plan, write_srt};
use crate::command::FfmpegCommand;
use crate::compositor::{build_filter_graph, AudioTrack, Canvas, CompositeClip, AUDIO_OUT, VIDEO_OUT};
use crate::motion::{BeatSync, ClipGeometry, MotionEngine};
use crate::placeholder::write_placeholder;
use crate::subprocess::CommandRunner;

pub const VIDEO_FILE: &str = "render.mp4";
pub const CAPTIONS_FILE: &str = "captions.srt";
pub const MANIFEST_FILE: &str = "render_output.json";

const VIDEO_EXTENSIONS: &[&str] = &["mp4", "mov", "mkv", "webm", "m4v", "avi"];

/// How an input enters the encoder command.
#[derive(Debug, Clone, PartialEq, Eq)]
enum PreparedInput {
    /// Still image looped for the clip length.
    Looped { path: PathBuf, duration_ms: u64 },
    /// Video (or pre-rendered motion clip) read from an offset.
    Trimmed {
        path: PathBuf,
        start_ms: u64,
        duration_ms: u64,
    },
}

/// Everything the final encoder command needs.
#[derive(Debug)]
struct Assembly {
    canvas: Canvas,
    inputs: Vec<PreparedInput>,
    clips: Vec<CompositeClip>,
    audio: Option<(PathBuf, u64)>,
    total_ms: u64,
}

impl Assembly {
    fn new(canvas: Canvas) -> Self {
        Self {
            canvas,
            inputs: Vec::new(),
            clips: Vec::new(),
            audio: None,
            total_ms: 0,
        }
    }

    fn push(&mut self, input: PreparedInput, mut clip: CompositeClip) {
        clip.input_index = self.inputs.len();
        self.inputs.push(input);
        self.clips.push(clip);
    }

    fn audio_track(&self) -> Option<AudioTrack> {
        self.audio.as_ref().map(|(_, start_ms)| AudioTrack {
            input_index: self.inputs.len(),
            start_ms: *start_ms,
            duration_ms: self.total_ms,
        })
    }
}

/// A shot's chosen visual.
#[derive(Debug, Clone)]
struct ResolvedVisual {
    path: PathBuf,
    kind: MediaKind,
}

/// Manifest fields that differ between plan and EDL renders.
struct Finish<'a> {
    request_id: &'a str,
    profile_name: String,
    timing_lock_hash: String,
    encoder_version: String,
    placeholder_count: usize,
    lineage: Lineage,
    captions: String,
}

/// The only component that runs the terminal encoder command.
pub struct DeterministicAssembler {
    encoder: EncoderConfig,
    runner: Arc<dyn CommandRunner>,
    resolved: HashMap<String, PathBuf>,
    asset_root: Option<PathBuf>,
    motion: Option<MotionEngine>,
}

impl DeterministicAssembler {
    pub fn new(encoder: EncoderConfig, runner: Arc<dyn CommandRunner>) -> Self {
        Self {
            encoder,
            runner,
            resolved: HashMap::new(),
            asset_root: None,
            motion: None,
        }
    }

    /// An externally resolved file for `asset_id`; preferred over the
    /// manifest URI.
    pub fn with_resolved_path(mut self, asset_id: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        self.resolved.insert(asset_id.into(), path.into());
        self
    }

    /// Base directory for relative manifest URIs.
    pub fn with_asset_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.asset_root = Some(root.into());
        self
    }

    /// Render Ken Burns requests through `engine`. Without one, still
    /// images are looped as-is.
    pub fn with_motion_engine(mut self, engine: MotionEngine) -> Self {
        self.motion = Some(engine);
        self
    }

    /// Render a shot-list plan.
    ///
    /// Missing visuals become placeholders; only encoder failures and
    /// invalid plans abort.
    pub fn render(
        &self,
        manifest: &AssetManifest,
        plan: &RenderPlan,
        output_dir: &Path,
    ) -> BeatreelResult<RenderOutput> {
        validate_plan(plan)?;
        let canvas = self.canvas(plan.profile.width, plan.profile.height, plan.profile.fps)?;
        let encoder_version = self.runner.encoder_version(&self.encoder.ffmpeg)?;

        info!(
            request_id = %plan.request_id,
            shots = plan.shots.len(),
            profile = %plan.profile.name,
            "Assembling render plan"
        );

        fs::create_dir_all(output_dir)?;
        let work = work_dir(output_dir)?;
        let index = manifest.index();
        let geometry = geometry(&canvas);

        let mut assembly = Assembly::new(canvas);
        let mut placeholder_count = 0;
        for shot in &plan.shots {
            let timeline_in_ms = assembly.total_ms;
            let input = match self.resolve_shot_visual(shot, &index) {
                Some(visual) => self.shot_input(shot, visual, geometry, timeline_in_ms)?,
                None => {
                    placeholder_count += 1;
                    warn!(shot_id = %shot.shot_id, "No resolvable visual, using placeholder");
                    PreparedInput::Looped {
                        path: write_placeholder(work.path(), &shot.shot_id, geometry.width, geometry.height)?,
                        duration_ms: shot.duration_ms,
                    }
                }
            };
            assembly.push(input, CompositeClip::cut(0, timeline_in_ms, shot.duration_ms));
            assembly.total_ms += shot.duration_ms;
        }

        if let Some(music_id) = &plan.background_music {
            let entry = index.get(music_id.as_str()).copied();
            match self.existing_path(music_id, entry) {
                Some(path) => assembly.audio = Some((path, 0)),
                None => warn!(asset_id = %music_id, "Background music not resolvable, rendering silent"),
            }
        }

        let video_path = self.encode(&assembly, output_dir)?;
        let captions = write_srt(&output_dir.join(CAPTIONS_FILE), &cues_from_plan(plan))?;

        let timing_lock_hash = match &plan.timing_lock_hash {
            Some(hash) => hash.clone(),
            None => shot_timing_hash(&plan.shots)?,
        };
        let lineage = Lineage {
            asset_manifest_hash: canonical_hash(manifest)?,
            render_plan_hash: canonical_hash(plan)?,
        };

        self.finish(
            Finish {
                request_id: &plan.request_id,
                profile_name: plan.profile.name.clone(),
                timing_lock_hash,
                encoder_version,
                placeholder_count,
                lineage,
                captions,
            },
            &video_path,
            output_dir,
        )
    }

    /// Render a compiled EDL.
    ///
    /// A manifest file that is declared but absent is a `MissingAsset`
    /// error here; assets unknown to the manifest still get placeholders.
    pub fn render_edl(
        &self,
        edl: &Edl,
        manifest: &AssetManifest,
        beat_grid: Option<&BeatGrid>,
        output_dir: &Path,
    ) -> BeatreelResult<RenderOutput> {
        edl.validate()
            .map_err(|e| BeatreelError::validation(e.to_string()))?;
        if edl.segments.is_empty() {
            return Err(BeatreelError::validation("EDL has no segments"));
        }
        let canvas = self.canvas(edl.output.width, edl.output.height, edl.output.fps)?;
        let encoder_version = self.runner.encoder_version(&self.encoder.ffmpeg)?;

        info!(
            edl_hash = %edl.edl_hash,
            segments = edl.segment_count,
            total_ms = edl.total_duration_ms,
            "Assembling EDL"
        );

        fs::create_dir_all(output_dir)?;
        let work = work_dir(output_dir)?;
        let index = manifest.index();
        let geometry = geometry(&canvas);
        let audio_start_ms = edl.audio.as_ref().map(|a| a.start_offset_ms).unwrap_or(0);

        let mut assembly = Assembly::new(canvas);
        let mut placeholder_count = 0;
        for segment in &edl.segments {
            let entry = index.get(segment.asset_id.as_str()).copied();
            let candidates = self.candidate_paths(&segment.asset_id, entry);
            let duration_ms = segment.render_duration_ms;

            let input = if candidates.is_empty() {
                placeholder_count += 1;
                warn!(
                    segment = segment.segment_index,
                    asset_id = %segment.asset_id,
                    "Asset has no file, using placeholder"
                );
                let label = format!("{}-{}", segment.segment_index, segment.asset_id);
                PreparedInput::Looped {
                    path: write_placeholder(work.path(), &label, geometry.width, geometry.height)?,
                    duration_ms,
                }
            } else {
                let path = candidates
                    .iter()
                    .find(|p| p.is_file())
                    .cloned()
                    .ok_or_else(|| BeatreelError::MissingAsset {
                        path: candidates[0].clone(),
                    })?;

                match (segment.media_type, &segment.effect) {
                    (MediaKind::Video, _) => PreparedInput::Trimmed {
                        path,
                        start_ms: segment.source_in_ms.unwrap_or(0),
                        duration_ms,
                    },
                    (
                        _,
                        Some(SegmentEffect::KenBurns {
                            preset,
                            strength,
                            beat_sync,
                        }),
                    ) => {
                        let sync = BeatSync::new(
                            *beat_sync,
                            beat_grid,
                            audio_start_ms + segment.timeline_in_ms,
                        );
                        self.motion_input(&path, preset, *strength, &sync, duration_ms, geometry)?
                    }
                    _ => PreparedInput::Looped { path, duration_ms },
                }
            };

            assembly.push(
                input,
                CompositeClip {
                    input_index: 0,
                    duration_ms,
                    timeline_in_ms: segment.timeline_in_ms,
                    transition_in: segment.transition_in,
                },
            );
        }
        assembly.total_ms = edl.total_duration_ms;

        if let Some(audio) = &edl.audio {
            match index.get(audio.asset_id.as_str()).copied() {
                Some(entry) => {
                    let candidates = self.candidate_paths(&audio.asset_id, Some(entry));
                    let path = candidates.iter().find(|p| p.is_file()).cloned();
                    match (path, candidates.first()) {
                        (Some(path), _) => assembly.audio = Some((path, audio.start_offset_ms)),
                        (None, Some(declared)) => {
                            return Err(BeatreelError::MissingAsset {
                                path: declared.clone(),
                            })
                        }
                        (None, None) => {
                            warn!(asset_id = %audio.asset_id, "Audio asset has no file, rendering silent")
                        }
                    }
                }
                None => warn!(asset_id = %audio.asset_id, "Audio asset not in manifest, rendering silent"),
            }
        }

        let video_path = self.encode(&assembly, output_dir)?;
        let captions = write_srt(&output_dir.join(CAPTIONS_FILE), &[])?;

        let mut stable_edl = edl.clone();
        stable_edl.generated_at = String::new();
        let lineage = Lineage {
            asset_manifest_hash: canonical_hash(manifest)?,
            render_plan_hash: canonical_hash(&stable_edl)?,
        };

        self.finish(
            Finish {
                request_id: &edl.edl_hash,
                profile_name: format!("{}x{}@{}", edl.output.width, edl.output.height, edl.output.fps),
                timing_lock_hash: edl.edl_hash.clone(),
                encoder_version,
                placeholder_count,
                lineage,
                captions,
            },
            &video_path,
            output_dir,
        )
    }

    fn canvas(&self, width: u32, height: u32, fps: u32) -> BeatreelResult<Canvas> {
        if width == 0 || height == 0 || fps == 0 {
            return Err(BeatreelError::validation(format!(
                "invalid output profile {width}x{height}@{fps}"
            )));
        }
        if width % 2 != 0 || height % 2 != 0 {
            return Err(BeatreelError::validation(format!(
                "output resolution {width}x{height} must be even"
            )));
        }
        Ok(Canvas {
            width,
            height,
            fps,
            pixel_format: self.encoder.pixel_format.clone(),
        })
    }

    /// Resolved path first, then the manifest URI.
    fn candidate_paths(&self, asset_id: &str, entry: Option<&AssetEntry>) -> Vec<PathBuf> {
        let mut paths = Vec::new();
        if let Some(path) = self.resolved.get(asset_id) {
            paths.push(path.clone());
        }
        if let Some(local) = entry.and_then(AssetEntry::local_path) {
            let path = match &self.asset_root {
                Some(root) if local.is_relative() => root.join(local),
                _ => local.to_path_buf(),
            };
            paths.push(path);
        }
        paths
    }

    fn existing_path(&self, asset_id: &str, entry: Option<&AssetEntry>) -> Option<PathBuf> {
        self.candidate_paths(asset_id, entry)
            .into_iter()
            .find(|p| p.is_file())
    }

    /// Best-ranked visual with a file on disk. Background beats character
    /// beats overlay; ties keep plan order.
    fn resolve_shot_visual(
        &self,
        shot: &Shot,
        index: &HashMap<&str, &AssetEntry>,
    ) -> Option<ResolvedVisual> {
        let mut candidates: Vec<(u8, usize, &str, Option<&AssetEntry>)> = shot
            .asset_ids
            .iter()
            .enumerate()
            .filter_map(|(order, id)| match index.get(id.as_str()).copied() {
                Some(entry) if !entry.kind.is_visual() => None,
                Some(entry) => Some((entry.role.visual_rank(), order, id.as_str(), Some(entry))),
                None => Some((AssetRole::Background.visual_rank(), order, id.as_str(), None)),
            })
            .collect();
        candidates.sort_by_key(|(rank, order, _, _)| (*rank, *order));

        candidates.into_iter().find_map(|(_, _, id, entry)| {
            let path = self.existing_path(id, entry)?;
            let kind = entry
                .map(|e| e.kind)
                .unwrap_or_else(|| kind_from_extension(&path));
            debug!(shot_id = %shot.shot_id, asset_id = id, path = %path.display(), "Shot visual resolved");
            Some(ResolvedVisual { path, kind })
        })
    }

    fn shot_input(
        &self,
        shot: &Shot,
        visual: ResolvedVisual,
        geometry: ClipGeometry,
        timeline_in_ms: u64,
    ) -> BeatreelResult<PreparedInput> {
        let duration_ms = shot.duration_ms;
        if visual.kind == MediaKind::Video {
            return Ok(PreparedInput::Trimmed {
                path: visual.path,
                start_ms: shot.source_in_ms.unwrap_or(0),
                duration_ms,
            });
        }
        match &shot.motion {
            Some(motion) => {
                let sync = BeatSync::new(motion.beat_sync, None, timeline_in_ms);
                self.motion_input(&visual.path, &motion.preset, motion.strength, &sync, duration_ms, geometry)
            }
            None => Ok(PreparedInput::Looped {
                path: visual.path,
                duration_ms,
            }),
        }
    }

    fn motion_input(
        &self,
        image: &Path,
        preset: &str,
        strength: f64,
        sync: &BeatSync<'_>,
        duration_ms: u64,
        geometry: ClipGeometry,
    ) -> BeatreelResult<PreparedInput> {
        let Some(engine) = &self.motion else {
            debug!(preset, "No motion engine configured, looping still image");
            return Ok(PreparedInput::Looped {
                path: image.to_path_buf(),
                duration_ms,
            });
        };
        let clip = engine.render_with_cache(image, preset, duration_ms, geometry, sync, strength)?;
        Ok(PreparedInput::Trimmed {
            path: clip,
            start_ms: 0,
            duration_ms,
        })
    }

    /// Run the single terminal encoder command and move its output to
    /// `render.mp4`.
    fn encode(&self, assembly: &Assembly, output_dir: &Path) -> BeatreelResult<PathBuf> {
        let mut cmd = FfmpegCommand::new(&self.encoder.ffmpeg);
        for input in &assembly.inputs {
            match input {
                PreparedInput::Looped { path, duration_ms } => {
                    cmd.looped_image(path, assembly.canvas.fps, *duration_ms)
                }
                PreparedInput::Trimmed {
                    path,
                    start_ms,
                    duration_ms,
                } => cmd.trimmed_input(path, *start_ms, *duration_ms),
            };
        }
        if let Some((path, _)) = &assembly.audio {
            cmd.input(path);
        }

        let audio = assembly.audio_track();
        cmd.filter_complex(build_filter_graph(&assembly.clips, &assembly.canvas, audio))
            .map_label(VIDEO_OUT);
        if audio.is_some() {
            cmd.map_label(AUDIO_OUT).deterministic_audio(&self.encoder);
        } else {
            cmd.no_audio();
        }
        cmd.deterministic_video(&self.encoder)
            .duration(assembly.total_ms)
            .deterministic_container();

        let temp = tempfile::Builder::new()
            .prefix(".render-")
            .suffix(".mp4")
            .tempfile_in(output_dir)?
            .into_temp_path();
        cmd.output(&temp);

        debug!(command = %cmd, "Final encoder command");
        info!(
            inputs = assembly.inputs.len(),
            total_ms = assembly.total_ms,
            audio = audio.is_some(),
            "Encoding"
        );

        let mut last = 0u8;
        self.runner.run(
            &cmd,
            assembly.total_ms,
            &mut |percent| {
                if percent / 10 > last / 10 || percent == 100 {
                    info!(percent, "Render progress");
                }
                last = percent;
            },
            self.encoder.timeout_secs,
        )?;

        if fs::metadata(&temp)?.len() == 0 {
            return Err(BeatreelError::render("encoder produced an empty file"));
        }
        let final_path = output_dir.join(VIDEO_FILE);
        temp.persist(&final_path).map_err(|e| {
            BeatreelError::render(format!(
                "failed to move render into {}: {}",
                final_path.display(),
                e.error
            ))
        })?;
        Ok(final_path)
    }

    fn finish(&self, finish: Finish<'_>, video_path: &Path, output_dir: &Path) -> BeatreelResult<RenderOutput> {
        let output_id = output_id(
            finish.request_id,
            &finish.timing_lock_hash,
            &finish.lineage.render_plan_hash,
        )?;
        let output = RenderOutput {
            schema_version: RENDER_OUTPUT_SCHEMA_VERSION.to_string(),
            output_id,
            request_id: finish.request_id.to_string(),
            video_uri: VIDEO_FILE.to_string(),
            captions_uri: CAPTIONS_FILE.to_string(),
            hashes: OutputHashes {
                video_sha256: sha256_file(video_path)?,
                captions_sha256: sha256_hex(finish.captions.as_bytes()),
            },
            provenance: Provenance {
                render_profile: finish.profile_name,
                timing_lock_hash: finish.timing_lock_hash,
                rendered_at: now_rfc3339(),
                encoder_version: finish.encoder_version,
                placeholder_count: finish.placeholder_count,
            },
            lineage: finish.lineage,
        };

        output
            .save(&output_dir.join(MANIFEST_FILE))
            .map_err(|e| BeatreelError::render(e.to_string()))?;
        info!(
            output_id = %output.output_id,
            video_sha256 = %output.hashes.video_sha256,
            placeholders = output.provenance.placeholder_count,
            "Render complete"
        );
        Ok(output)
    }
}

fn validate_plan(plan: &RenderPlan) -> BeatreelResult<()> {
    if plan.shots.is_empty() {
        return Err(BeatreelError::validation("render plan has no shots"));
    }
    if let Some(shot) = plan.shots.iter().find(|s| s.duration_ms == 0) {
        return Err(BeatreelError::validation(format!(
            "shot '{}' has zero duration",
            shot.shot_id
        )));
    }
    Ok(())
}

fn geometry(canvas: &Canvas) -> ClipGeometry {
    ClipGeometry {
        width: canvas.width,
        height: canvas.height,
        fps: canvas.fps,
    }
}

fn work_dir(output_dir: &Path) -> BeatreelResult<tempfile::TempDir> {
    Ok(tempfile::Builder::new()
        .prefix(".beatreel-work-")
        .tempdir_in(output_dir)?)
}

fn kind_from_extension(path: &Path) -> MediaKind {
    let is_video = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| VIDEO_EXTENSIONS.contains(&e.to_ascii_lowercase().as_str()))
        .unwrap_or(false);
    if is_video {
        MediaKind::Video
    } else {
        MediaKind::Image
    }
}

/// Hex SHA-256 over the ordered `(shot_id, duration_ms)` list.
fn shot_timing_hash(shots: &[Shot]) -> BeatreelResult<String> {
    let timings: Vec<_> = shots
        .iter()
        .map(|s| json!({"shot_id": s.shot_id, "duration_ms": s.duration_ms}))
        .collect();
    canonical_hash(&timings)
}

/// `out_` plus 16 hex characters, stable for identical inputs.
fn output_id(request_id: &str, timing_lock_hash: &str, plan_hash: &str) -> BeatreelResult<String> {
    let doc = json!({
        "request_id": request_id,
        "timing_lock_hash": timing_lock_hash,
        "render_plan_hash": plan_hash,
    });
    Ok(format!("out_{}", &sha256_hex(canonical_json(&doc)?)[..16]))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_output_id_is_stable_and_sensitive() {
        let a = output_id("req", "lock", "plan").unwrap();
        assert_eq!(a, output_id("req", "lock", "plan").unwrap());
        assert_eq!(a.len(), 4 + 16);
        assert!(a.starts_with("out_"));
        assert_ne!(a, output_id("req", "lock2", "plan").unwrap());
    }

    #[test]
    fn test_kind_from_extension() {
        assert_eq!(kind_from_extension(Path::new("a/clip.MOV")), MediaKind::Video);
        assert_eq!(kind_from_extension(Path::new("a/still.png")), MediaKind::Image);
        assert_eq!(kind_from_extension(Path::new("noext")), MediaKind::Image);
    }

    #[test]
    fn test_shot_timing_hash_tracks_durations() {
        let shot = |ms| Shot {
            shot_id: "s1".to_string(),
            duration_ms: ms,
            asset_ids: vec!["a".to_string()],
            source_in_ms: None,
            motion: None,
        };
        assert_eq!(
            shot_timing_hash(&[shot(2000)]).unwrap(),
            shot_timing_hash(&[shot(2000)]).unwrap()
        );
        assert_ne!(
            shot_timing_hash(&[shot(2000)]).unwrap(),
            shot_timing_hash(&[shot(2001)]).unwrap()
        );
    }

    #[test]
    fn test_assembly_audio_follows_visual_inputs() {
        let mut assembly = Assembly::new(Canvas {
            width: 640,
            height: 360,
            fps: 30,
            pixel_format: "yuv420p".to_string(),
        });
        for i in 0..2 {
            assembly.push(
                PreparedInput::Looped {
                    path: PathBuf::from(format!("{i}.png")),
                    duration_ms: 1000,
                },
                CompositeClip::cut(99, i * 1000, 1000),
            );
        }
        assembly.total_ms = 2000;
        assembly.audio = Some((PathBuf::from("song.wav"), 250));

        assert_eq!(assembly.clips[1].input_index, 1);
        assert_eq!(
            assembly.audio_track(),
            Some(AudioTrack {
                input_index: 2,
                start_ms: 250,
                duration_ms: 2000
            })
        );
    }
}
