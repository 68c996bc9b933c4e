/// Data layer: table model, loading, boundaries and filtering.
///
/// Architecture:
/// ```text
///   .csv / .parquet                 .geojson
///        │                              │
///        ▼                              ▼
///   ┌──────────┐                  ┌──────────┐
///   │  loader   │ coerce + join    │ boundary │ state polygons
///   └──────────┘ state totals      └──────────┘
///        │
///        ▼
///   ┌───────────────┐
///   │ ProviderTable │  typed columns of CellValue
///   └───────────────┘
///        │
///        ▼
///   ┌──────────┐
///   │  filter   │  threshold + per-column controls → narrowed table
///   └──────────┘
/// ```

pub mod boundary;
pub mod columns;
pub mod filter;
pub mod loader;
pub mod model;
