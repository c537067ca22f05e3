/// Data layer: core types, loading, caching, and derived tables.
///
/// Architecture:
/// ```text
///  upload (name + bytes) + kind + sheet + header row
///        │
///        ▼
///   ┌──────────────────┐
///   │ SourceDescriptor │  cache key
///   └──────────────────┘
///        │
///        ▼
///   ┌──────────────┐   hit   ┌───────────────┐
///   │ DatasetCache │ ──────▶ │ Arc<Dataset>  │
///   └──────────────┘         └───────────────┘
///        │ miss                      ▲
///        ▼                           │
///   ┌──────────┐                     │
///   │  loader   │  csv / calamine → normalized Dataset
///   └──────────┘
///
///   ┌──────────┐
///   │  filter   │  filter / sort / group → new Dataset
///   └──────────┘
/// ```

pub mod cache;
pub mod error;
pub mod filter;
pub mod loader;
pub mod model;
pub mod source;
