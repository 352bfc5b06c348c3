//! Recolor session
//!
//! One session per loaded image. It owns:
//! - **current**: the raster being edited (source of truth for the next edit)
//! - **original**: the raster as loaded, for reset
//! - **index**: color buckets of `current`, rebuilt after every change
//! - **history**: bounded undo snapshots
//! - **selection**: the picked bucket and replacement color
//! - **worker**: background thread for offloaded commits, created on first use
//!
//! Only one recolor runs per session at a time. Cooperative edits take
//! `&mut self`; while an offloaded edit is pending every other edit fails with
//! [`RecolorError::Busy`].

use image::RgbaImage;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use crate::color::{hex_to_rgb, Channel, ColorKey, Quantizer, Rgb, DEFAULT_QUANTIZATION_LEVELS};
use crate::error::{Result, RecolorError};
use crate::history::{HistoryStack, DEFAULT_HISTORY_CAPACITY};
use crate::index::{ColorIndex, ColorInfo};
use crate::raster::{Coord, RasterBuffer};
use crate::recolor::{BatchRecolorer, ProgressObserver, DEFAULT_BATCH_SIZE};
use crate::resolver::{self, SimilaritySettings};
use crate::selection::Selection;
use crate::worker::{RecolorTask, RecolorWorker, WorkerEvent};

/// Default stride for preview sampling (every 10th pixel)
pub const DEFAULT_PREVIEW_STRIDE: usize = 10;

// ============================================================================
// SETTINGS
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionSettings {
    /// Quantization levels per channel (default: 8)
    pub quantization_levels: u16,
    /// Initial similarity toggle and threshold (default: off, 100)
    pub similarity: SimilaritySettings,
    /// Pixels rewritten between yields (default: 5000)
    pub batch_size: usize,
    /// Preview keeps every Nth resolved pixel (default: 10)
    pub preview_stride: usize,
    /// Undo snapshots kept before the oldest is evicted (default: 20)
    pub history_capacity: usize,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            quantization_levels: DEFAULT_QUANTIZATION_LEVELS,
            similarity: SimilaritySettings::default(),
            batch_size: DEFAULT_BATCH_SIZE,
            preview_stride: DEFAULT_PREVIEW_STRIDE,
            history_capacity: DEFAULT_HISTORY_CAPACITY,
        }
    }
}

impl SessionSettings {
    /// Load settings from a JSON file; missing fields take their defaults
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        let settings: SessionSettings = serde_json::from_str(&content)?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> Result<()> {
        Quantizer::new(self.quantization_levels)?;
        validate_threshold(self.similarity.threshold)?;
        if self.batch_size == 0 {
            return Err(RecolorError::InvalidParameter("batch_size must be at least 1".to_string()));
        }
        if self.preview_stride == 0 {
            return Err(RecolorError::InvalidParameter("preview_stride must be at least 1".to_string()));
        }
        if self.history_capacity == 0 {
            return Err(RecolorError::InvalidParameter("history_capacity must be at least 1".to_string()));
        }
        Ok(())
    }
}

fn validate_threshold(threshold: f32) -> Result<()> {
    if !threshold.is_finite() || threshold < 0.0 {
        return Err(RecolorError::InvalidParameter(format!(
            "similarity threshold must be a non-negative number, got {}",
            threshold
        )));
    }
    Ok(())
}

/// Whether an edit is a sampled preview or the full committed change
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ApplyMode {
    Preview,
    #[default]
    Commit,
}

// ============================================================================
// SESSION
// ============================================================================

struct PendingChange {
    task: RecolorTask,
    source_key: ColorKey,
    /// Copy of the image handed to the worker, restored if the job is lost
    restore: RasterBuffer,
}

pub struct RecolorSession {
    settings: SessionSettings,
    quantizer: Quantizer,
    recolorer: BatchRecolorer,
    current: Option<RasterBuffer>,
    original: Option<RasterBuffer>,
    index: Option<ColorIndex>,
    history: HistoryStack,
    selection: Selection,
    worker: Option<RecolorWorker>,
    pending: Option<PendingChange>,
}

impl RecolorSession {
    pub fn new(settings: SessionSettings) -> Result<Self> {
        settings.validate()?;
        let quantizer = Quantizer::new(settings.quantization_levels)?;

        Ok(Self {
            quantizer,
            recolorer: BatchRecolorer::new(settings.batch_size),
            current: None,
            original: None,
            index: None,
            history: HistoryStack::with_capacity(settings.history_capacity),
            selection: Selection::new(settings.similarity),
            worker: None,
            pending: None,
            settings,
        })
    }

    pub fn settings(&self) -> &SessionSettings {
        &self.settings
    }

    pub fn quantizer(&self) -> &Quantizer {
        &self.quantizer
    }

    // ------------------------------------------------------------------------
    // Image lifecycle
    // ------------------------------------------------------------------------

    /// Make `buffer` the current image. Drops the previous image, its
    /// history and the selection.
    pub fn load(&mut self, buffer: RasterBuffer) -> Result<()> {
        self.ensure_idle()?;

        let index = ColorIndex::build(&buffer, &self.quantizer);
        tracing::info!(
            width = buffer.width(),
            height = buffer.height(),
            colors = index.len(),
            "Loaded image"
        );

        self.index = Some(index);
        self.original = Some(buffer.clone());
        self.current = Some(buffer);
        self.history.clear();
        self.selection.reset(self.settings.similarity);
        Ok(())
    }

    pub fn load_image(&mut self, img: RgbaImage) -> Result<()> {
        self.load(RasterBuffer::from_rgba_image(img))
    }

    /// Forget the loaded image
    pub fn clear(&mut self) -> Result<()> {
        self.ensure_idle()?;
        self.current = None;
        self.original = None;
        self.index = None;
        self.history.clear();
        self.selection.reset(self.settings.similarity);
        Ok(())
    }

    pub fn has_image(&self) -> bool {
        self.current.is_some() || self.pending.is_some()
    }

    /// True while an offloaded change is in flight
    pub fn is_busy(&self) -> bool {
        self.pending.is_some()
    }

    /// The current raster; `None` with no image or while it is with the worker
    pub fn current(&self) -> Option<&RasterBuffer> {
        self.current.as_ref()
    }

    pub fn original(&self) -> Option<&RasterBuffer> {
        self.original.as_ref()
    }

    pub fn index(&self) -> Option<&ColorIndex> {
        self.index.as_ref()
    }

    pub fn history(&self) -> &HistoryStack {
        &self.history
    }

    /// Buckets of the current image, most common first
    pub fn colors(&self) -> Vec<ColorInfo> {
        self.index.as_ref().map(ColorIndex::color_infos).unwrap_or_default()
    }

    pub fn set_quantization_levels(&mut self, levels: u16) -> Result<()> {
        self.ensure_idle()?;
        self.quantizer = Quantizer::new(levels)?;
        self.settings.quantization_levels = levels;
        self.rebuild_index();
        Ok(())
    }

    // ------------------------------------------------------------------------
    // Selection
    // ------------------------------------------------------------------------

    pub fn selection(&self) -> &Selection {
        &self.selection
    }

    pub fn select_color(&mut self, color: ColorInfo) {
        self.selection.select(color);
    }

    pub fn set_new_color(&mut self, color: Rgb) {
        self.selection.new_color = color;
    }

    pub fn update_channel(&mut self, channel: Channel, value: u8) {
        self.selection.update_channel(channel, value);
    }

    pub fn set_include_similar(&mut self, include: bool) {
        self.selection.similarity.include_similar = include;
    }

    pub fn set_similarity_threshold(&mut self, threshold: f32) -> Result<()> {
        validate_threshold(threshold)?;
        self.selection.similarity.threshold = threshold;
        Ok(())
    }

    pub fn reset_selection(&mut self) {
        self.selection.reset(self.settings.similarity);
    }

    pub fn selected_color_hex(&self) -> String {
        self.selection.new_color_hex()
    }

    // ------------------------------------------------------------------------
    // Editing
    // ------------------------------------------------------------------------

    /// Pixels a change of `key` would touch under the current similarity
    /// settings. Empty when no image is loaded.
    pub fn resolve(&self, key: &str) -> Result<Vec<Coord>> {
        let key = parse_key(key)?;
        Ok(self.resolve_key(key))
    }

    fn resolve_key(&self, key: ColorKey) -> Vec<Coord> {
        match &self.index {
            Some(index) => resolver::resolve(index, key, &self.selection.similarity),
            None => Vec::new(),
        }
    }

    /// Recolor every pixel of bucket `key` (plus similar buckets when enabled)
    /// to `new_color_hex`.
    ///
    /// `Preview` rewrites only every `preview_stride`-th pixel and returns the
    /// result without touching the session. `Commit` rewrites all of them,
    /// snapshots the prior image, makes the result current, and returns a
    /// copy of it. Returns `Ok(None)` when no image is loaded.
    pub async fn apply_color_change<O>(
        &mut self,
        key: &str,
        new_color_hex: &str,
        mode: ApplyMode,
        observer: &mut O,
    ) -> Result<Option<RasterBuffer>>
    where
        O: ProgressObserver + ?Sized,
    {
        match mode {
            ApplyMode::Preview => self.preview_color_change(key, new_color_hex, observer).await,
            ApplyMode::Commit => {
                let committed = self.commit_color_change(key, new_color_hex, observer).await?;
                Ok(if committed { self.current.clone() } else { None })
            }
        }
    }

    pub async fn preview_color_change<O>(
        &mut self,
        key: &str,
        new_color_hex: &str,
        observer: &mut O,
    ) -> Result<Option<RasterBuffer>>
    where
        O: ProgressObserver + ?Sized,
    {
        self.ensure_idle()?;
        let key = parse_key(key)?;
        let color = hex_to_rgb(new_color_hex)?;

        let Some(current) = &self.current else {
            return Ok(None);
        };

        let coords = resolver::sample(&self.resolve_key(key), self.settings.preview_stride);
        let preview = self.recolorer.recolor(current, &coords, color, observer).await;
        Ok(Some(preview))
    }

    /// Full-resolution change; returns `false` when no image is loaded
    pub async fn commit_color_change<O>(
        &mut self,
        key: &str,
        new_color_hex: &str,
        observer: &mut O,
    ) -> Result<bool>
    where
        O: ProgressObserver + ?Sized,
    {
        self.ensure_idle()?;
        let key = parse_key(key)?;
        let color = hex_to_rgb(new_color_hex)?;

        let Some(current) = &self.current else {
            return Ok(false);
        };

        let coords = self.resolve_key(key);
        let output = self.recolorer.recolor(current, &coords, color, observer).await;
        self.commit(output, key, coords.len());
        Ok(true)
    }

    /// Full-resolution change by direct scan: every pixel whose quantized
    /// color is `key` is rewritten, without consulting the index or the
    /// similarity settings. Returns `false` when no image is loaded.
    pub async fn commit_direct_color_change<O>(
        &mut self,
        key: &str,
        new_color_hex: &str,
        observer: &mut O,
    ) -> Result<bool>
    where
        O: ProgressObserver + ?Sized,
    {
        self.ensure_idle()?;
        let key = parse_key(key)?;
        let color = hex_to_rgb(new_color_hex)?;

        let Some(current) = &self.current else {
            return Ok(false);
        };

        let pixels = self.index.as_ref().map_or(0, |index| index.get(&key).len());
        let output = self
            .recolorer
            .recolor_by_color(current, &self.quantizer, key, color, observer)
            .await;
        self.commit(output, key, pixels);
        Ok(true)
    }

    /// Apply the selection state: the selected bucket becomes `new_color`.
    /// Returns `Ok(None)` when nothing is selected.
    pub async fn apply_selection<O>(
        &mut self,
        mode: ApplyMode,
        observer: &mut O,
    ) -> Result<Option<RasterBuffer>>
    where
        O: ProgressObserver + ?Sized,
    {
        let Some(selected) = &self.selection.selected else {
            return Ok(None);
        };
        let key = selected.key.to_string();
        let hex = self.selection.new_color_hex();
        self.apply_color_change(&key, &hex, mode, observer).await
    }

    /// Start a committed change on the session's worker thread. The current
    /// image moves to the worker until [`finish_color_change`] collects it.
    /// Returns `false` when no image is loaded.
    ///
    /// [`finish_color_change`]: Self::finish_color_change
    pub fn start_color_change(&mut self, key: &str, new_color_hex: &str) -> Result<bool> {
        self.ensure_idle()?;
        let key = parse_key(key)?;
        let color = hex_to_rgb(new_color_hex)?;

        let Some(width) = self.current.as_ref().map(RasterBuffer::width) else {
            return Ok(false);
        };

        let offsets: Vec<usize> = self
            .resolve_key(key)
            .iter()
            .map(|c| c.byte_offset(width))
            .collect();

        let worker = match self.worker.take() {
            Some(worker) => worker,
            None => RecolorWorker::new()?,
        };
        let Some(source) = self.current.take() else {
            self.worker = Some(worker);
            return Ok(false);
        };

        tracing::debug!(key = %key, pixels = offsets.len(), "Submitting recolor to worker");
        let restore = source.clone();
        let task = worker.submit(source, offsets, color, self.settings.batch_size);
        self.worker = Some(worker);
        self.pending = Some(PendingChange { task, source_key: key, restore });
        Ok(true)
    }

    /// Wait for the pending offloaded change, forwarding progress, and commit
    /// it. Returns `false` when nothing was pending.
    ///
    /// Dropping the returned future before it completes leaves the change
    /// pending; calling this again picks it up.
    pub async fn finish_color_change<O>(&mut self, observer: &mut O) -> Result<bool>
    where
        O: ProgressObserver + ?Sized,
    {
        let Some(pending) = self.pending.as_mut() else {
            return Ok(false);
        };

        loop {
            match pending.task.next_event().await {
                Some(WorkerEvent::Progress(p)) => observer.on_progress(p),
                Some(WorkerEvent::Complete { source, output }) => {
                    let pixels = pending.task.len();
                    let key = pending.source_key;
                    self.pending = None;
                    self.current = Some(source);
                    self.commit(output, key, pixels);
                    return Ok(true);
                }
                None => {
                    let lost = self.pending.take();
                    // History is untouched: nothing was committed
                    self.current = lost.map(|p| p.restore);
                    self.rebuild_index();
                    tracing::error!("Recolor worker stopped early; restored pre-change image");
                    return Err(RecolorError::Processing(
                        "Recolor worker stopped before completing".to_string(),
                    ));
                }
            }
        }
    }

    pub fn can_undo(&self) -> bool {
        self.history.can_undo()
    }

    /// Restore the previous snapshot; `false` when there is nothing to undo
    pub fn undo(&mut self) -> Result<bool> {
        self.ensure_idle()?;
        if self.current.is_none() {
            return Ok(false);
        }

        match self.history.pop() {
            Some(previous) => {
                self.current = Some(previous);
                self.rebuild_index();
                tracing::info!(remaining = self.history.len(), "Undo");
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Go back to the image as loaded. The replaced image is snapshotted, so
    /// this can be undone.
    pub fn reset_to_original(&mut self) -> Result<bool> {
        self.ensure_idle()?;
        let Some(original) = self.original.clone() else {
            return Ok(false);
        };

        if let Some(prior) = self.current.replace(original) {
            self.history.push_owned(prior);
        }
        self.rebuild_index();
        tracing::info!("Reset to original image");
        Ok(true)
    }

    // ------------------------------------------------------------------------
    // Internals
    // ------------------------------------------------------------------------

    fn ensure_idle(&self) -> Result<()> {
        if self.pending.is_some() {
            return Err(RecolorError::Busy);
        }
        Ok(())
    }

    fn commit(&mut self, output: RasterBuffer, key: ColorKey, pixels: usize) {
        if let Some(prior) = self.current.replace(output) {
            self.history.push_owned(prior);
        }
        self.rebuild_index();
        self.selection.follow_change(&self.quantizer);

        tracing::info!(
            key = %key,
            pixels,
            colors = self.index.as_ref().map_or(0, ColorIndex::len),
            undo_depth = self.history.len(),
            "Committed color change"
        );
    }

    fn rebuild_index(&mut self) {
        self.index = self
            .current
            .as_ref()
            .map(|buffer| ColorIndex::build(buffer, &self.quantizer));
    }
}

fn parse_key(key: &str) -> Result<ColorKey> {
    key.parse().map_err(|e| {
        tracing::error!(key, "Color key does not match the index key format");
        e
    })
}

// ============================================================================
// TESTS
// ============================================================================
