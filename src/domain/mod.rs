// ============================================================
// Layer 3 — Domain Layer
// ============================================================
// Pure Rust structs, enums and traits that define the core
// concepts of the recommender.
//
// Rules for this layer:
//   - NO Burn framework types allowed here
//   - NO file I/O or network calls
//   - Only plain Rust structs, enums, and traits
//
// Everything in the ML layer speaks in internal indices; this
// layer owns the mapping between those indices and the external
// ids the rest of the world uses.

// Typed error taxonomy shared by every layer
pub mod error;

// Sorted, bijective external-id ↔ index mapping
pub mod entity_index;

// A single observed (user, item, rating) triple
pub mod rating;

// Genre label → content column resolution
pub mod genre;

// Core abstractions (traits) that other layers implement
pub mod traits;
