//! Chunk-boundary stitching, timeline merging, and duplicate suppression.

pub mod dedup;
pub mod language_lock;
pub mod stitcher;
pub mod timeline;

pub use dedup::{DedupConfig, DuplicateSuppressor};
pub use language_lock::{LanguageLock, LanguageLockConfig, LockState};
pub use stitcher::{ChunkTail, ConfidenceStitcher, StitcherConfig, similarity};
pub use timeline::{TimelineConfig, TimelineMerger, TimelineWord};
