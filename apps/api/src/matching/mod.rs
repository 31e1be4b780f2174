// Batch/sequential matching orchestration and caching.
// Chunked, strictly-sequential workflow calls with per-chunk retry, partial
// failure tolerance, idempotent persistence, and the two-phase job-detail
// resolver. All workflow traffic goes through scoring_client.

pub mod cache;
pub mod cancel;
pub mod chunk;
pub mod handlers;
pub mod orchestrator;
pub mod progress;
pub mod resolver;
pub mod retry;
pub mod store;
