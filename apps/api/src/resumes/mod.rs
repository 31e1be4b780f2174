// Resume intake: content-hash identity, idempotent creation, text blobs.

pub mod handlers;
pub mod ingest;
pub mod store;
