//! Batch recoloring.
//!
//! Writes go to a private copy of the source raster, a chunk of coordinates
//! at a time. Between chunks the async variants yield to the scheduler so a
//! multi-megapixel rewrite never monopolizes the thread driving the UI.
//!
//! Progress is reported after every chunk as `processed / total`; the last
//! report is exactly `1.0`. An empty request still reports `1.0` once.

use crate::color::{ColorKey, Quantizer, Rgb};
use crate::raster::{Coord, RasterBuffer};

/// Default number of pixels rewritten between yields
pub const DEFAULT_BATCH_SIZE: usize = 5000;

/// Receives fractional progress in `(0, 1]`, non-decreasing within a run
pub trait ProgressObserver {
    fn on_progress(&mut self, fraction: f32);
}

impl<F: FnMut(f32)> ProgressObserver for F {
    fn on_progress(&mut self, fraction: f32) {
        self(fraction)
    }
}

/// Observer that discards progress
#[derive(Debug, Default, Clone, Copy)]
pub struct NoProgress;

impl ProgressObserver for NoProgress {
    fn on_progress(&mut self, _fraction: f32) {}
}

#[derive(Debug, Clone, Copy)]
pub struct BatchRecolorer {
    batch_size: usize,
}

impl Default for BatchRecolorer {
    fn default() -> Self {
        Self::new(DEFAULT_BATCH_SIZE)
    }
}

impl BatchRecolorer {
    /// A batch size of 0 is treated as 1
    pub fn new(batch_size: usize) -> Self {
        Self {
            batch_size: batch_size.max(1),
        }
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    /// Copy `source` and set R,G,B of every listed pixel to `color`, keeping
    /// alpha. `source` is left untouched.
    pub async fn recolor<O>(
        &self,
        source: &RasterBuffer,
        coords: &[Coord],
        color: Rgb,
        observer: &mut O,
    ) -> RasterBuffer
    where
        O: ProgressObserver + ?Sized,
    {
        let mut output = source.clone();
        let total = coords.len();

        if total == 0 {
            observer.on_progress(1.0);
            return output;
        }

        let mut processed = 0;
        for chunk in coords.chunks(self.batch_size) {
            paint(&mut output, chunk, color);
            processed += chunk.len();
            observer.on_progress(processed as f32 / total as f32);

            if processed < total {
                tokio::task::yield_now().await;
            }
        }

        tracing::debug!(
            pixels = total,
            batch_size = self.batch_size,
            color = %color.to_hex(),
            "Recolor finished"
        );

        output
    }

    /// Same rewrite as [`recolor`](Self::recolor) without yielding, for
    /// callers already running off the UI thread.
    pub fn recolor_blocking<O>(
        &self,
        source: &RasterBuffer,
        coords: &[Coord],
        color: Rgb,
        observer: &mut O,
    ) -> RasterBuffer
    where
        O: ProgressObserver + ?Sized,
    {
        let mut output = source.clone();
        let total = coords.len();

        if total == 0 {
            observer.on_progress(1.0);
            return output;
        }

        let mut processed = 0;
        for chunk in coords.chunks(self.batch_size) {
            paint(&mut output, chunk, color);
            processed += chunk.len();
            observer.on_progress(processed as f32 / total as f32);
        }

        output
    }

    /// Index-free variant: scan every pixel and rewrite those whose quantized
    /// color equals `target`. Progress counts scanned pixels, not matches.
    pub async fn recolor_by_color<O>(
        &self,
        source: &RasterBuffer,
        quantizer: &Quantizer,
        target: ColorKey,
        color: Rgb,
        observer: &mut O,
    ) -> RasterBuffer
    where
        O: ProgressObserver + ?Sized,
    {
        let mut output = source.clone();
        let total = output.pixel_count();

        if total == 0 {
            observer.on_progress(1.0);
            return output;
        }

        let mut processed = 0;
        let mut changed = 0usize;
        let chunk_bytes = self.batch_size * 4;
        let mut start = 0;

        while start < total * 4 {
            let end = (start + chunk_bytes).min(total * 4);
            for px in output.as_bytes_mut()[start..end].chunks_exact_mut(4) {
                if quantizer.quantize_rgb(px[0], px[1], px[2]) == target {
                    px[0] = color.r;
                    px[1] = color.g;
                    px[2] = color.b;
                    changed += 1;
                }
            }

            processed += (end - start) / 4;
            observer.on_progress(processed as f32 / total as f32);
            start = end;

            if processed < total {
                tokio::task::yield_now().await;
            }
        }

        tracing::debug!(key = %target, changed, "Direct recolor finished");

        output
    }
}

fn paint(buffer: &mut RasterBuffer, coords: &[Coord], color: Rgb) {
    for &coord in coords {
        let i = buffer.offset_of(coord);
        let data = buffer.as_bytes_mut();
        data[i] = color.r;
        data[i + 1] = color.g;
        data[i + 2] = color.b;
    }
}
