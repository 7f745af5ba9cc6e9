//! SQLite schema for the index store (spec.md §4.8).
//!
//! A single `claudemem.db` file per project holds code units, dense
//! embeddings (as a contiguous f32 blob), symbol-graph edges, and a metadata
//! table recording the schema version and the embedding model/dimension in
//! use. A version mismatch on open triggers a rebuild rather than an attempt
//! to migrate in place (spec.md §4.8, §7 Storage error kind).

use rusqlite::Connection;

use crate::error::Result;

/// Bumped whenever the on-disk layout changes incompatibly.
pub const SCHEMA_VERSION: i64 = 1;

pub fn initialize(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        PRAGMA journal_mode = WAL;
        PRAGMA foreign_keys = ON;

        CREATE TABLE IF NOT EXISTS metadata (
            key   TEXT PRIMARY KEY,
            value TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS units (
            id               TEXT PRIMARY KEY,
            parent_id        TEXT,
            unit_type        TEXT NOT NULL,
            file_path        TEXT NOT NULL,
            start_line       INTEGER NOT NULL,
            end_line         INTEGER NOT NULL,
            language         TEXT NOT NULL,
            depth            INTEGER NOT NULL,
            name             TEXT,
            signature        TEXT,
            content          TEXT NOT NULL,
            file_hash        TEXT NOT NULL,
            ast_metadata     TEXT NOT NULL,
            summary          TEXT,
            embedding        BLOB,
            pagerank         REAL
        );
        CREATE INDEX IF NOT EXISTS idx_units_file_path ON units(file_path);
        CREATE INDEX IF NOT EXISTS idx_units_parent_id ON units(parent_id);
        CREATE INDEX IF NOT EXISTS idx_units_name ON units(name);

        CREATE TABLE IF NOT EXISTS edges (
            source      TEXT NOT NULL,
            target      TEXT NOT NULL,
            edge_type   TEXT NOT NULL,
            occurrences INTEGER NOT NULL DEFAULT 1,
            PRIMARY KEY (source, target, edge_type)
        );
        CREATE INDEX IF NOT EXISTS idx_edges_source ON edges(source);
        CREATE INDEX IF NOT EXISTS idx_edges_target ON edges(target);

        CREATE TABLE IF NOT EXISTS file_hashes (
            file_path  TEXT PRIMARY KEY,
            file_hash  TEXT NOT NULL
        );
        ",
    )?;

    let version: Option<String> = conn
        .query_row(
            "SELECT value FROM metadata WHERE key = 'schema_version'",
            [],
            |row| row.get(0),
        )
        .ok();

    match version {
        None => {
            conn.execute(
                "INSERT INTO metadata (key, value) VALUES ('schema_version', ?1)",
                [SCHEMA_VERSION.to_string()],
            )?;
        }
        Some(v) if v.parse::<i64>().ok() != Some(SCHEMA_VERSION) => {
            rebuild(conn)?;
        }
        Some(_) => {}
    }

    Ok(())
}

/// Drop and recreate every table; called when the persisted schema version
/// doesn't match [`SCHEMA_VERSION`] (spec.md §4.8).
fn rebuild(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        DROP TABLE IF EXISTS units;
        DROP TABLE IF EXISTS edges;
        DROP TABLE IF EXISTS file_hashes;
        DROP TABLE IF EXISTS metadata;
        ",
    )?;
    initialize(conn)
}

pub mod meta_keys {
    pub const SCHEMA_VERSION: &str = "schema_version";
    pub const EMBEDDING_MODEL: &str = "embedding_model";
    pub const EMBEDDING_DIMENSION: &str = "embedding_dimension";
    pub const RETRIEVAL_WEIGHTS: &str = "retrieval_weights";
}
