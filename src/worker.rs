//! Offloaded recoloring.
//!
//! A [`RecolorWorker`] owns a single background thread. A submitted job takes
//! ownership of the source raster, rewrites a copy of it there, and posts
//! progress and completion messages back over a channel. Both buffers come
//! back in the completion message.

use tokio::sync::mpsc;
use crate::color::Rgb;
use crate::error::{Result, RecolorError};
use crate::raster::RasterBuffer;
use crate::recolor::ProgressObserver;

#[derive(Debug)]
pub enum WorkerEvent {
    Progress(f32),
    Complete {
        source: RasterBuffer,
        output: RasterBuffer,
    },
}

pub struct RecolorWorker {
    pool: rayon::ThreadPool,
}

impl RecolorWorker {
    pub fn new() -> Result<Self> {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(1)
            .thread_name(|i| format!("recolor-worker-{}", i))
            .panic_handler(|_| tracing::error!("Recolor worker job panicked"))
            .build()
            .map_err(|e| RecolorError::Processing(format!("Failed to start recolor worker: {}", e)))?;

        tracing::debug!("Recolor worker started");
        Ok(Self { pool })
    }

    /// Hand `source` to the worker and rewrite R,G,B at each flat byte offset
    /// (see [`Coord::byte_offset`](crate::raster::Coord::byte_offset)).
    pub fn submit(
        &self,
        source: RasterBuffer,
        offsets: Vec<usize>,
        color: Rgb,
        batch_size: usize,
    ) -> RecolorTask {
        let (tx, rx) = mpsc::unbounded_channel();
        let total = offsets.len();
        let batch_size = batch_size.max(1);

        self.pool.spawn(move || {
            let mut output = source.clone();

            if total == 0 {
                let _ = tx.send(WorkerEvent::Progress(1.0));
            } else {
                let data = output.as_bytes_mut();
                let mut processed = 0;
                for chunk in offsets.chunks(batch_size) {
                    for &i in chunk {
                        debug_assert!(i + 3 < data.len(), "offset {} outside buffer", i);
                        data[i] = color.r;
                        data[i + 1] = color.g;
                        data[i + 2] = color.b;
                    }
                    processed += chunk.len();
                    // A closed channel only means nobody is listening; finish anyway
                    let _ = tx.send(WorkerEvent::Progress(processed as f32 / total as f32));
                }
            }

            let _ = tx.send(WorkerEvent::Complete { source, output });
        });

        RecolorTask { rx, total }
    }
}

impl std::fmt::Debug for RecolorWorker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RecolorWorker")
            .field("threads", &self.pool.current_num_threads())
            .finish()
    }
}

/// Handle to a job running on a [`RecolorWorker`]
#[derive(Debug)]
pub struct RecolorTask {
    rx: mpsc::UnboundedReceiver<WorkerEvent>,
    total: usize,
}

impl RecolorTask {
    /// Number of pixels the job rewrites
    pub fn len(&self) -> usize {
        self.total
    }

    pub fn is_empty(&self) -> bool {
        self.total == 0
    }

    /// Next message from the worker, `None` once the worker is gone
    pub async fn next_event(&mut self) -> Option<WorkerEvent> {
        self.rx.recv().await
    }

    /// Forward progress to `observer` until the job completes; returns
    /// `(source, output)`.
    pub async fn wait<O>(mut self, observer: &mut O) -> Result<(RasterBuffer, RasterBuffer)>
    where
        O: ProgressObserver + ?Sized,
    {
        while let Some(event) = self.rx.recv().await {
            match event {
                WorkerEvent::Progress(p) => observer.on_progress(p),
                WorkerEvent::Complete { source, output } => return Ok((source, output)),
            }
        }
        Err(RecolorError::Processing(
            "Recolor worker stopped before completing".to_string(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::raster::Coord;
    use crate::recolor::{BatchRecolorer, NoProgress};

    #[tokio::test]
    async fn test_worker_matches_cooperative_recolor() {
        let source = RasterBuffer::new(
            3,
            2,
            (0..24).map(|i| (i * 11) as u8).collect(),
        )
        .unwrap();
        let coords = vec![Coord::new(0, 0), Coord::new(2, 0), Coord::new(1, 1)];
        let offsets = coords.iter().map(|c| c.byte_offset(3)).collect();
        let color = Rgb::new(7, 8, 9);

        let expected = BatchRecolorer::new(2)
            .recolor(&source, &coords, color, &mut NoProgress)
            .await;

        let worker = RecolorWorker::new().unwrap();
        let mut seen = Vec::new();
        let (returned, output) = worker
            .submit(source.clone(), offsets, color, 2)
            .wait(&mut |p: f32| seen.push(p))
            .await
            .unwrap();

        assert_eq!(returned, source);
        assert_eq!(output, expected);
        assert_eq!(seen.len(), 2);
        assert!(seen.windows(2).all(|w| w[0] <= w[1]));
        assert_eq!(*seen.last().unwrap(), 1.0);
    }

    #[tokio::test]
    async fn test_worker_empty_job() {
        let source = RasterBuffer::filled(2, 2, [1, 1, 1, 1]);
        let worker = RecolorWorker::new().unwrap();
        let mut task = worker.submit(source.clone(), Vec::new(), Rgb::new(0, 0, 0), 10);
        assert!(task.is_empty());

        assert!(matches!(task.next_event().await, Some(WorkerEvent::Progress(p)) if p == 1.0));
        match task.next_event().await {
            Some(WorkerEvent::Complete { output, .. }) => assert_eq!(output, source),
            other => panic!("unexpected event: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_tasks_are_independent() {
        let worker = RecolorWorker::new().unwrap();
        let a = worker.submit(RasterBuffer::filled(1, 1, [0; 4]), vec![0], Rgb::new(1, 1, 1), 1);
        let b = worker.submit(RasterBuffer::filled(1, 1, [0; 4]), vec![0], Rgb::new(2, 2, 2), 1);

        let (_, out_b) = b.wait(&mut NoProgress).await.unwrap();
        let (_, out_a) = a.wait(&mut NoProgress).await.unwrap();
        assert_eq!(out_a.pixel(0, 0), [1, 1, 1, 0]);
        assert_eq!(out_b.pixel(0, 0), [2, 2, 2, 0]);
    }
}
