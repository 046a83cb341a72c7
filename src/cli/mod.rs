pub mod ingest;
pub mod topics;
