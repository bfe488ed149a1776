// ============================================================
// Layer 6: Infrastructure Layer
// ============================================================
// Persistence that the other layers use but do not own:
//
//   model_store.rs - Saving and loading trained models
//                    Weights through Burn's file recorder, plus a
//                    JSON manifest holding the architecture and
//                    both vocabularies, so inference rebuilds
//                    exactly the model that was trained.
//
//   metrics.rs     - Training progress CSV
//                    One row per progress event for plotting
//                    learning curves.

/// Model artifact saving, loading and compatibility checks
pub mod model_store;

/// Training progress CSV logger
pub mod metrics;
