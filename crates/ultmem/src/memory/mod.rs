//! Memory types and operations
//!
//! Defines the stored item model together with the scoring, ranking,
//! compression and export pieces that operate on item content.

pub mod compression;
pub mod phi;
pub mod retrieval;
pub mod transfer;
pub mod types;

pub use compression::{CompressedContext, compress};
pub use phi::score_phi;
pub use retrieval::{MatchMethod, RetrieveOptions, RetrievedMemory, SearchHit};
pub use transfer::{ExportDocument, ExportFormat, ExportedMemory, ImportOptions, ImportReport};
pub use types::{DirectoryBody, FileBody, ItemKind, MemoryItem, Metadata, StorageTier};
