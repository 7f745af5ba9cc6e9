//! Index Store (spec.md §4.8): persists code units, embeddings, symbol-graph
//! edges, and metadata in a single-writer sqlite database.
//!
//! Reads may run concurrently with each other; writes are serialized behind
//! a mutex around the one [`rusqlite::Connection`], which is the simplest
//! way to honor "single-writer, concurrent readers" for an embedded file
//! database (spec.md §5 Shared-resource policy). Retrieval and analysis
//! consumers that only ever call the `iter_*`/`knn`/`lexical` methods are
//! effectively taking a read-only snapshot of whatever committed state is
//! current when they call, per spec.md §5's "readers may see the previous
//! snapshot until a commit point advances".

use std::collections::HashMap;
use std::path::Path;
use std::sync::Mutex;

use claudemem_core::{AstMetadata, CodeUnit, Edge, EdgeType, UnitType};
use rusqlite::{params, Connection, OptionalExtension};
use serde::{Deserialize, Serialize};

use crate::error::{Result, SearchError};
use crate::lexical::LexicalIndex;
use crate::schema::{self, meta_keys};

/// Optional filters applied to `knn`/`lexical` candidate sets (spec.md §4.9).
#[derive(Debug, Clone, Default)]
pub struct QueryFilters {
    pub language: Option<String>,
    pub path_glob: Option<String>,
    pub unit_type: Option<UnitType>,
}

impl QueryFilters {
    fn matches(&self, unit: &CodeUnit) -> bool {
        if let Some(lang) = &self.language {
            if &unit.language != lang {
                return false;
            }
        }
        if let Some(glob) = &self.path_glob {
            if !glob_match(glob, &unit.file_path) {
                return false;
            }
        }
        if let Some(unit_type) = self.unit_type {
            if unit.unit_type != unit_type {
                return false;
            }
        }
        true
    }
}

/// Minimal `*`-wildcard glob matcher; sufficient for path-prefix/suffix
/// filters like `src/**/*.rs` reduced to substring segments.
fn glob_match(pattern: &str, text: &str) -> bool {
    let segments: Vec<&str> = pattern.split('*').collect();
    if segments.len() == 1 {
        return text == pattern;
    }
    let mut rest = text;
    for (i, seg) in segments.iter().enumerate() {
        if seg.is_empty() {
            continue;
        }
        if i == 0 {
            if !rest.starts_with(seg) {
                return false;
            }
            rest = &rest[seg.len()..];
        } else if i == segments.len() - 1 {
            return rest.ends_with(seg);
        } else if let Some(pos) = rest.find(seg) {
            rest = &rest[pos + seg.len()..];
        } else {
            return false;
        }
    }
    true
}

/// A ranked hit from [`IndexStore::knn`] or [`IndexStore::lexical`].
#[derive(Debug, Clone)]
pub struct ScoredUnit {
    pub unit: CodeUnit,
    pub score: f32,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
struct StoredWeights {
    dense: f64,
    lexical: f64,
    pagerank: f64,
}

pub struct IndexStore {
    conn: Mutex<Connection>,
}

impl IndexStore {
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path)?;
        schema::initialize(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        schema::initialize(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    // -- metadata -----------------------------------------------------

    /// Record the embedding model/dimension in use. Changing models
    /// invalidates all previously stored embeddings (spec.md §4.8).
    pub fn set_embedding_model(&self, model_id: &str, dimension: usize) -> Result<bool> {
        let conn = self.conn.lock().unwrap();
        let previous: Option<String> = conn
            .query_row(
                "SELECT value FROM metadata WHERE key = ?1",
                [meta_keys::EMBEDDING_MODEL],
                |r| r.get(0),
            )
            .optional()?;

        let changed = previous.as_deref() != Some(model_id);
        if changed {
            conn.execute(
                "UPDATE units SET embedding = NULL",
                [],
            )?;
        }
        upsert_metadata(&conn, meta_keys::EMBEDDING_MODEL, model_id)?;
        upsert_metadata(&conn, meta_keys::EMBEDDING_DIMENSION, &dimension.to_string())?;
        Ok(changed)
    }

    pub fn embedding_dimension(&self) -> Result<Option<usize>> {
        let conn = self.conn.lock().unwrap();
        let value: Option<String> = conn
            .query_row(
                "SELECT value FROM metadata WHERE key = ?1",
                [meta_keys::EMBEDDING_DIMENSION],
                |r| r.get(0),
            )
            .optional()?;
        Ok(value.and_then(|v| v.parse().ok()))
    }

    pub fn retrieval_weights(&self) -> Result<Option<(f64, f64, f64)>> {
        let conn = self.conn.lock().unwrap();
        let value: Option<String> = conn
            .query_row(
                "SELECT value FROM metadata WHERE key = ?1",
                [meta_keys::RETRIEVAL_WEIGHTS],
                |r| r.get(0),
            )
            .optional()?;
        let Some(value) = value else { return Ok(None) };
        let w: StoredWeights = serde_json::from_str(&value)?;
        Ok(Some((w.dense, w.lexical, w.pagerank)))
    }

    pub fn set_retrieval_weights(&self, dense: f64, lexical: f64, pagerank: f64) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        let encoded = serde_json::to_string(&StoredWeights {
            dense,
            lexical,
            pagerank,
        })?;
        upsert_metadata(&conn, meta_keys::RETRIEVAL_WEIGHTS, &encoded)
    }

    // -- units ----------------------------------------------------------

    pub fn upsert(&self, unit: &CodeUnit) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        let ast_metadata = serde_json::to_string(&unit.ast_metadata)?;
        let embedding_blob = unit.embedding.as_ref().map(|v| f32_to_blob(v));
        conn.execute(
            "INSERT INTO units (id, parent_id, unit_type, file_path, start_line, end_line,
                language, depth, name, signature, content, file_hash, ast_metadata,
                summary, embedding, pagerank)
             VALUES (?1,?2,?3,?4,?5,?6,?7,?8,?9,?10,?11,?12,?13,?14,?15,?16)
             ON CONFLICT(id) DO UPDATE SET
                parent_id=excluded.parent_id, unit_type=excluded.unit_type,
                file_path=excluded.file_path, start_line=excluded.start_line,
                end_line=excluded.end_line, language=excluded.language, depth=excluded.depth,
                name=excluded.name, signature=excluded.signature, content=excluded.content,
                file_hash=excluded.file_hash, ast_metadata=excluded.ast_metadata,
                summary=excluded.summary, embedding=excluded.embedding, pagerank=excluded.pagerank",
            params![
                unit.id,
                unit.parent_id,
                unit.unit_type.as_str(),
                unit.file_path,
                unit.start_line as i64,
                unit.end_line as i64,
                unit.language,
                unit.depth as i64,
                unit.name,
                unit.signature,
                unit.content,
                unit.file_hash,
                ast_metadata,
                unit.summary,
                embedding_blob,
                unit.pagerank,
            ],
        )?;
        Ok(())
    }

    /// Remove a unit and its incident edges (spec.md §3 Lifecycle).
    pub fn delete(&self, unit_id: &str) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute("DELETE FROM units WHERE id = ?1", [unit_id])?;
        conn.execute(
            "DELETE FROM edges WHERE source = ?1 OR target = ?1",
            [unit_id],
        )?;
        Ok(())
    }

    /// Remove every unit belonging to `file_path` and their incident edges;
    /// used when a file is deleted or re-extracted from scratch.
    pub fn delete_file(&self, file_path: &str) -> Result<Vec<String>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare("SELECT id FROM units WHERE file_path = ?1")?;
        let ids: Vec<String> = stmt
            .query_map([file_path], |r| r.get(0))?
            .collect::<std::result::Result<_, _>>()?;
        drop(stmt);
        for id in &ids {
            conn.execute(
                "DELETE FROM edges WHERE source = ?1 OR target = ?1",
                [id],
            )?;
        }
        conn.execute("DELETE FROM units WHERE file_path = ?1", [file_path])?;
        conn.execute("DELETE FROM file_hashes WHERE file_path = ?1", [file_path])?;
        Ok(ids)
    }

    pub fn find_by_id(&self, id: &str) -> Result<Option<CodeUnit>> {
        let conn = self.conn.lock().unwrap();
        conn.query_row("SELECT * FROM units WHERE id = ?1", [id], row_to_unit)
            .optional()
            .map_err(SearchError::from)
    }

    pub fn iter_all(&self) -> Result<Vec<CodeUnit>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare("SELECT * FROM units")?;
        let rows = stmt.query_map([], row_to_unit)?;
        rows.collect::<std::result::Result<_, _>>().map_err(SearchError::from)
    }

    pub fn iter_by_file(&self, file_path: &str) -> Result<Vec<CodeUnit>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare("SELECT * FROM units WHERE file_path = ?1")?;
        let rows = stmt.query_map([file_path], row_to_unit)?;
        rows.collect::<std::result::Result<_, _>>().map_err(SearchError::from)
    }

    pub fn count(&self) -> Result<usize> {
        let conn = self.conn.lock().unwrap();
        let n: i64 = conn.query_row("SELECT COUNT(*) FROM units", [], |r| r.get(0))?;
        Ok(n as usize)
    }

    /// Previously recorded `relative_path -> content_hash` for change detection.
    pub fn file_hashes(&self) -> Result<HashMap<String, String>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare("SELECT file_path, file_hash FROM file_hashes")?;
        let rows = stmt.query_map([], |r| Ok((r.get(0)?, r.get(1)?)))?;
        rows.collect::<std::result::Result<_, _>>().map_err(SearchError::from)
    }

    pub fn record_file_hash(&self, file_path: &str, hash: &str) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO file_hashes (file_path, file_hash) VALUES (?1, ?2)
             ON CONFLICT(file_path) DO UPDATE SET file_hash = excluded.file_hash",
            params![file_path, hash],
        )?;
        Ok(())
    }

    pub fn forget_file_hash(&self, file_path: &str) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute("DELETE FROM file_hashes WHERE file_path = ?1", [file_path])?;
        Ok(())
    }

    // -- edges ------------------------------------------------------------

    pub fn replace_edges(&self, edges: &[Edge]) -> Result<()> {
        let mut conn = self.conn.lock().unwrap();
        let tx = conn.transaction()?;
        tx.execute("DELETE FROM edges", [])?;
        {
            let mut stmt = tx.prepare(
                "INSERT INTO edges (source, target, edge_type, occurrences) VALUES (?1,?2,?3,?4)",
            )?;
            for edge in edges {
                stmt.execute(params![
                    edge.source,
                    edge.target,
                    edge.edge_type.as_str(),
                    edge.occurrences as i64,
                ])?;
            }
        }
        tx.commit()?;
        Ok(())
    }

    pub fn all_edges(&self) -> Result<Vec<Edge>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare("SELECT source, target, edge_type, occurrences FROM edges")?;
        let rows = stmt.query_map([], |r| {
            let edge_type: String = r.get(2)?;
            Ok(Edge {
                source: r.get(0)?,
                target: r.get(1)?,
                edge_type: parse_edge_type(&edge_type),
                occurrences: r.get::<_, i64>(3)? as u32,
            })
        })?;
        rows.collect::<std::result::Result<_, _>>().map_err(SearchError::from)
    }

    pub fn outgoing(&self, unit_id: &str, edge_type: EdgeType) -> Result<Vec<Edge>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT source, target, edge_type, occurrences FROM edges
             WHERE source = ?1 AND edge_type = ?2",
        )?;
        let rows = stmt.query_map(params![unit_id, edge_type.as_str()], |r| {
            Ok(Edge {
                source: r.get(0)?,
                target: r.get(1)?,
                edge_type,
                occurrences: r.get::<_, i64>(3)? as u32,
            })
        })?;
        rows.collect::<std::result::Result<_, _>>().map_err(SearchError::from)
    }

    pub fn incoming(&self, unit_id: &str, edge_type: EdgeType) -> Result<Vec<Edge>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT source, target, edge_type, occurrences FROM edges
             WHERE target = ?1 AND edge_type = ?2",
        )?;
        let rows = stmt.query_map(params![unit_id, edge_type.as_str()], |r| {
            Ok(Edge {
                source: r.get(0)?,
                target: r.get(1)?,
                edge_type,
                occurrences: r.get::<_, i64>(3)? as u32,
            })
        })?;
        rows.collect::<std::result::Result<_, _>>().map_err(SearchError::from)
    }

    pub fn incoming_count(&self, unit_id: &str) -> Result<usize> {
        let conn = self.conn.lock().unwrap();
        let n: i64 = conn.query_row(
            "SELECT COUNT(*) FROM edges WHERE target = ?1",
            [unit_id],
            |r| r.get(0),
        )?;
        Ok(n as usize)
    }

    // -- retrieval ----------------------------------------------------------

    /// Dense similarity search: cosine similarity over every stored embedding.
    /// A full scan is the simplest correct implementation for the scale this
    /// engine targets (single-project, tens of thousands of units); no ANN
    /// index is maintained.
    pub fn knn(&self, query: &[f32], k: usize, filters: &QueryFilters) -> Result<Vec<ScoredUnit>> {
        let units = self.iter_all()?;
        let mut scored: Vec<ScoredUnit> = units
            .into_iter()
            .filter(|u| filters.matches(u))
            .filter_map(|u| {
                let embedding = u.embedding.as_ref()?;
                let score = cosine_similarity(query, embedding);
                Some(ScoredUnit { unit: u, score })
            })
            .collect();
        scored.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.unit.id.cmp(&b.unit.id))
        });
        scored.truncate(k);
        Ok(scored)
    }

    /// Lexical (BM25-family) search over every unit's tokenized `content` +
    /// `summary` (spec.md §4.8's `lexical(query_terms, k, filters)`). Builds
    /// the inverted index fresh from the current snapshot on every call,
    /// same freshness guarantee `knn`'s full embedding scan gives — cheap
    /// enough at this engine's target scale to not warrant a persisted or
    /// incrementally maintained index.
    pub fn lexical(&self, query: &str, k: usize, filters: &QueryFilters) -> Result<Vec<ScoredUnit>> {
        let units = self.iter_all()?;
        let filtered: Vec<&CodeUnit> = units.iter().filter(|u| filters.matches(u)).collect();
        let entries = filtered
            .iter()
            .map(|u| (u.id.as_str(), u.content.as_str(), u.summary.as_deref()));
        let index = LexicalIndex::build(entries);
        let by_id: HashMap<&str, &CodeUnit> = filtered.iter().map(|u| (u.id.as_str(), *u)).collect();
        Ok(index
            .search(query, k)
            .into_iter()
            .filter_map(|(id, score)| {
                by_id.get(id.as_str()).map(|u| ScoredUnit {
                    unit: (*u).clone(),
                    score,
                })
            })
            .collect())
    }

    /// Project-scoped clear (spec.md §4.8).
    pub fn clear(&self) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute_batch(
            "DELETE FROM units; DELETE FROM edges; DELETE FROM file_hashes;
             DELETE FROM metadata WHERE key != 'schema_version';",
        )?;
        Ok(())
    }
}

fn upsert_metadata(conn: &Connection, key: &str, value: &str) -> Result<()> {
    conn.execute(
        "INSERT INTO metadata (key, value) VALUES (?1, ?2)
         ON CONFLICT(key) DO UPDATE SET value = excluded.value",
        params![key, value],
    )?;
    Ok(())
}

fn f32_to_blob(values: &[f32]) -> Vec<u8> {
    values.iter().flat_map(|v| v.to_le_bytes()).collect()
}

fn blob_to_f32(bytes: &[u8]) -> Vec<f32> {
    bytes
        .chunks_exact(4)
        .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
        .collect()
}

pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a * norm_b)
}

fn parse_edge_type(s: &str) -> EdgeType {
    match s {
        "calls" => EdgeType::Calls,
        "imports" => EdgeType::Imports,
        "extends" => EdgeType::Extends,
        _ => EdgeType::References,
    }
}

fn row_to_unit(row: &rusqlite::Row) -> rusqlite::Result<CodeUnit> {
    let unit_type: String = row.get("unit_type")?;
    let ast_metadata_json: String = row.get("ast_metadata")?;
    let embedding_blob: Option<Vec<u8>> = row.get("embedding")?;
    let ast_metadata: AstMetadata = serde_json::from_str(&ast_metadata_json).unwrap_or_default();

    Ok(CodeUnit {
        id: row.get("id")?,
        parent_id: row.get("parent_id")?,
        unit_type: parse_unit_type(&unit_type),
        file_path: row.get("file_path")?,
        start_line: row.get::<_, i64>("start_line")? as usize,
        end_line: row.get::<_, i64>("end_line")? as usize,
        language: row.get("language")?,
        depth: row.get::<_, i64>("depth")? as usize,
        name: row.get("name")?,
        signature: row.get("signature")?,
        content: row.get("content")?,
        file_hash: row.get("file_hash")?,
        ast_metadata,
        summary: row.get("summary")?,
        embedding: embedding_blob.map(|b| blob_to_f32(&b)),
        pagerank: row.get("pagerank")?,
    })
}

fn parse_unit_type(s: &str) -> UnitType {
    match s {
        "file" => UnitType::File,
        "class" => UnitType::Class,
        "interface" => UnitType::Interface,
        "enum" => UnitType::Enum,
        "type" => UnitType::Type,
        "method" => UnitType::Method,
        _ => UnitType::Function,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use claudemem_core::AstMetadata;

    fn unit(id: &str, file: &str, embedding: Option<Vec<f32>>) -> CodeUnit {
        content_unit(id, file, "def f(): pass", embedding)
    }

    fn content_unit(id: &str, file: &str, content: &str, embedding: Option<Vec<f32>>) -> CodeUnit {
        CodeUnit {
            id: id.to_string(),
            parent_id: None,
            unit_type: UnitType::Function,
            file_path: file.to_string(),
            start_line: 1,
            end_line: 2,
            language: "python".to_string(),
            depth: 1,
            name: Some(id.to_string()),
            signature: Some(format!("def {id}()")),
            content: content.to_string(),
            file_hash: "h".to_string(),
            ast_metadata: AstMetadata::default(),
            summary: None,
            embedding,
            pagerank: Some(0.1),
        }
    }

    #[test]
    fn upsert_and_find_roundtrip() {
        let store = IndexStore::open_in_memory().unwrap();
        store.upsert(&unit("a", "f.py", Some(vec![1.0, 0.0]))).unwrap();
        let found = store.find_by_id("a").unwrap().unwrap();
        assert_eq!(found.embedding, Some(vec![1.0, 0.0]));
    }

    #[test]
    fn delete_removes_unit_and_edges() {
        let store = IndexStore::open_in_memory().unwrap();
        store.upsert(&unit("a", "f.py", None)).unwrap();
        store.upsert(&unit("b", "f.py", None)).unwrap();
        store
            .replace_edges(&[Edge {
                source: "a".to_string(),
                target: "b".to_string(),
                edge_type: EdgeType::Calls,
                occurrences: 1,
            }])
            .unwrap();
        store.delete("a").unwrap();
        assert!(store.find_by_id("a").unwrap().is_none());
        assert!(store.outgoing("a", EdgeType::Calls).unwrap().is_empty());
    }

    #[test]
    fn knn_orders_by_cosine_similarity() {
        let store = IndexStore::open_in_memory().unwrap();
        store.upsert(&unit("close", "f.py", Some(vec![1.0, 0.0]))).unwrap();
        store.upsert(&unit("far", "f.py", Some(vec![0.0, 1.0]))).unwrap();
        let hits = store.knn(&[1.0, 0.0], 10, &QueryFilters::default()).unwrap();
        assert_eq!(hits[0].unit.id, "close");
    }

    #[test]
    fn lexical_ranks_matching_content_above_unrelated_content() {
        let store = IndexStore::open_in_memory().unwrap();
        store
            .upsert(&content_unit("a", "f.py", "fn validate_token(token) { }", None))
            .unwrap();
        store
            .upsert(&content_unit("b", "f.py", "fn unrelated_helper() { }", None))
            .unwrap();
        let hits = store.lexical("validate token", 10, &QueryFilters::default()).unwrap();
        assert_eq!(hits[0].unit.id, "a");
    }

    #[test]
    fn lexical_respects_language_filter() {
        let store = IndexStore::open_in_memory().unwrap();
        store
            .upsert(&content_unit("a", "f.py", "fn validate_token(token) { }", None))
            .unwrap();
        let mut other = content_unit("b", "f.go", "fn validate_token(token) { }", None);
        other.language = "go".to_string();
        store.upsert(&other).unwrap();

        let filters = QueryFilters {
            language: Some("go".to_string()),
            ..Default::default()
        };
        let hits = store.lexical("validate token", 10, &filters).unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].unit.id, "b");
    }

    #[test]
    fn changing_embedding_model_clears_vectors() {
        let store = IndexStore::open_in_memory().unwrap();
        store.upsert(&unit("a", "f.py", Some(vec![1.0, 0.0]))).unwrap();
        store.set_embedding_model("model-a", 2).unwrap();
        let changed = store.set_embedding_model("model-b", 3).unwrap();
        assert!(changed);
        assert!(store.find_by_id("a").unwrap().unwrap().embedding.is_none());
    }

    #[test]
    fn clear_empties_project_scope() {
        let store = IndexStore::open_in_memory().unwrap();
        store.upsert(&unit("a", "f.py", None)).unwrap();
        store.clear().unwrap();
        assert_eq!(store.count().unwrap(), 0);
    }

    #[test]
    fn glob_filter_matches_path_suffix() {
        assert!(glob_match("**/*.rs", "src/lib.rs"));
        assert!(!glob_match("**/*.rs", "src/lib.py"));
    }
}
