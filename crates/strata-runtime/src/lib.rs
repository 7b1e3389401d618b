//! Frame-driven runtime: chunk registry, per-frame job scheduling and the
//! engine facade hosts call into.
#![forbid(unsafe_code)]

mod config;
mod engine;
mod error;
mod record;
mod scheduler;

pub use config::{CanvasTextures, EngineConfig};
pub use engine::{Diagnostic, Engine, EngineStats};
pub use error::EngineError;
pub use record::{BuildStateError, ChunkRecord, EditOutcome, TileEdit};
pub use scheduler::{Clock, FrameBudget, FrameScheduler, ManualClock, MonotonicClock, TickReport};
