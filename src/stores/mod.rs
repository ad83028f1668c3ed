//! Persistent vector storage for chunk embeddings.
//!
//! One logical table per deployment holds every indexed chunk, possibly from
//! several sources; ingestion only ever appends. The SQLite backend pairs a
//! plain chunk table with a `vec0` virtual table (via the `sqlite-vec`
//! extension) sharing rowids, and answers nearest-neighbor queries by L2
//! distance.

pub mod sqlite;

pub use sqlite::SqliteVectorIndex;
