//! Color bucket indexing and batch recoloring for RGBA rasters.
//!
//! Pipeline: [`ColorIndex`] groups pixels by quantized color, the
//! [`resolver`] turns a "replace this color" request into pixel positions,
//! [`BatchRecolorer`] (or the offloaded [`RecolorWorker`]) rewrites a copy of
//! the raster, and [`HistoryStack`] keeps the prior versions for undo.
//! [`RecolorSession`] ties them together for one loaded image.

pub mod color;
pub mod error;
pub mod history;
pub mod index;
pub mod io;
pub mod raster;
pub mod recolor;
pub mod resolver;
pub mod selection;
pub mod session;
pub mod worker;

pub use color::{color_distance, hex_to_rgb, quantize, rgb_to_hex, Channel, ColorKey, Quantizer, Rgb};
pub use error::{RecolorError, Result};
pub use history::HistoryStack;
pub use index::{ColorCount, ColorIndex, ColorInfo};
pub use raster::{Coord, RasterBuffer};
pub use recolor::{BatchRecolorer, NoProgress, ProgressObserver};
pub use resolver::{SimilaritySettings, DEFAULT_SIMILARITY_THRESHOLD, FINE_SIMILARITY_THRESHOLD};
pub use selection::Selection;
pub use session::{ApplyMode, RecolorSession, SessionSettings};
pub use worker::{RecolorTask, RecolorWorker, WorkerEvent};
