// ============================================================
// Layer 4 — Data Pipeline
// ============================================================
// Everything from ingested tables to tensor batches:
//
//   ratings.csv / items.csv
//       │
//       ▼
//   CsvRatingSource   → RatingRecord rows + ItemMetadata
//       │
//       ▼
//   split_train_val   → seeded train / validation partition
//       │
//       ▼
//   EntityIndex       → (domain) external id ↔ index
//       │
//       ▼
//   ContentMatrix     → one genre vector per item index
//       │
//       ▼
//   RatingDataset     → implements Burn's Dataset trait
//       │
//       ▼
//   RatingBatcher     → stacks ratings into tensor batches
//       │
//       ▼
//   DataLoader        → feeds batches to the training loop
//
// Reference: Burn Book §4 (Datasets and Dataloaders)

/// Reads ratings and item metadata from CSV files
pub mod loader;

/// Per-item genre vectors aligned to the item index
pub mod content;

/// Implements Burn's Dataset trait for index-space ratings
pub mod dataset;

/// Implements Burn's Batcher trait to create tensor batches
pub mod batcher;

/// Seeded shuffle and train/validation split
pub mod splitter;
