//! Tool server: a line-delimited JSON request/response loop over stdio
//! (spec.md §4.11), exposing [`claudemem_backend::Backend`]'s queries to an
//! assistant process without pulling in an external protocol SDK.
//!
//! Each line of input is one request: `{"id": ..., "tool": "...", "args": {...}}`.
//! Each line of output is one response: either `{"id": ..., "result": ...}`
//! or `{"id": ..., "error": {"kind": ..., "message": ...}}`. `id` echoes back
//! unchanged so a caller can match responses to requests even if pipelined.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tracing::{debug, warn};

use claudemem_backend::{Backend, SearchOptions};
use claudemem_core::UnitType;
use claudemem_search::RetrievalMode;

use crate::error::{McpError, Result};

#[derive(Debug, Deserialize)]
struct Request {
    id: Value,
    tool: String,
    #[serde(default)]
    args: Value,
}

#[derive(Debug, Serialize)]
struct Response {
    id: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<ErrorPayload>,
}

#[derive(Debug, Serialize)]
pub struct ErrorPayload {
    kind: String,
    message: String,
}

impl Response {
    fn ok(id: Value, result: Value) -> Self {
        Self {
            id,
            result: Some(result),
            error: None,
        }
    }

    fn err(id: Value, err: &McpError) -> Self {
        Self {
            id,
            result: None,
            error: Some(ErrorPayload {
                kind: err.kind().to_string(),
                message: err.to_string(),
            }),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct SearchArgs {
    query: String,
    top_k: Option<usize>,
    language: Option<String>,
    path_glob: Option<String>,
    unit_type: Option<String>,
    mode: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct MapArgs {
    query: Option<String>,
    limit: Option<usize>,
}

#[derive(Debug, Deserialize)]
struct SymbolArgs {
    symbol: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct DeadCodeArgs {
    include_exported: bool,
    max_pagerank: Option<f64>,
}

fn parse_mode(mode: Option<&str>) -> Result<RetrievalMode> {
    match mode {
        None | Some("hybrid") => Ok(RetrievalMode::Hybrid),
        Some("dense") => Ok(RetrievalMode::DenseOnly),
        Some("lexical") => Ok(RetrievalMode::LexicalOnly),
        Some("keyword") => Ok(RetrievalMode::KeywordOnly),
        Some(other) => Err(McpError::MalformedRequest(format!("unknown mode '{other}'"))),
    }
}

fn parse_unit_type(unit_type: Option<&str>) -> Result<Option<UnitType>> {
    let Some(s) = unit_type else { return Ok(None) };
    let parsed = match s {
        "file" => UnitType::File,
        "class" => UnitType::Class,
        "interface" => UnitType::Interface,
        "enum" => UnitType::Enum,
        "type" => UnitType::Type,
        "method" => UnitType::Method,
        "function" => UnitType::Function,
        other => return Err(McpError::MalformedRequest(format!("unknown unit_type '{other}'"))),
    };
    Ok(Some(parsed))
}

/// Dispatches one request to the backend and serializes its result to JSON.
/// Kept separate from the read/write loop so it's trivially unit-testable.
async fn dispatch(backend: &dyn Backend, tool: &str, args: Value) -> Result<Value> {
    match tool {
        "search" => {
            let args: SearchArgs = serde_json::from_value(args)?;
            let options = SearchOptions {
                language: args.language,
                path_glob: args.path_glob,
                unit_type: parse_unit_type(args.unit_type.as_deref())?,
                mode: parse_mode(args.mode.as_deref())?,
                top_k: args.top_k,
            };
            let results = backend.search(&args.query, options).await?;
            Ok(serde_json::to_value(results)?)
        }
        "map" => {
            let args: MapArgs = serde_json::from_value(args)?;
            let limit = args.limit.unwrap_or(20);
            let results = backend.map(args.query.as_deref(), limit).await?;
            Ok(serde_json::to_value(results)?)
        }
        "callers" => {
            let args: SymbolArgs = serde_json::from_value(args)?;
            Ok(serde_json::to_value(backend.callers(&args.symbol).await?)?)
        }
        "callees" => {
            let args: SymbolArgs = serde_json::from_value(args)?;
            Ok(serde_json::to_value(backend.callees(&args.symbol).await?)?)
        }
        "impact" => {
            let args: SymbolArgs = serde_json::from_value(args)?;
            Ok(serde_json::to_value(backend.impact(&args.symbol).await?)?)
        }
        "dead_code" => {
            let args: DeadCodeArgs = serde_json::from_value(args)?;
            Ok(serde_json::to_value(backend.dead_code(args.include_exported, args.max_pagerank).await?)?)
        }
        "test_gaps" => Ok(serde_json::to_value(backend.test_gaps().await?)?),
        "index_status" => Ok(serde_json::to_value(backend.index_status().await?)?),
        "clear" => {
            backend.clear().await?;
            Ok(Value::Null)
        }
        other => Err(McpError::UnknownTool(other.to_string())),
    }
}

/// Runs the request/response loop over the given reader/writer until the
/// input stream ends. Used with stdin/stdout in `claudemem mcp` and with
/// in-memory buffers in tests.
pub async fn serve<R, W>(backend: Arc<dyn Backend>, reader: R, mut writer: W) -> Result<()>
where
    R: tokio::io::AsyncRead + Unpin,
    W: AsyncWriteExt + Unpin,
{
    let mut lines = BufReader::new(reader).lines();

    while let Some(line) = lines.next_line().await? {
        if line.trim().is_empty() {
            continue;
        }

        let response = match serde_json::from_str::<Request>(&line) {
            Ok(request) => {
                debug!(tool = %request.tool, "dispatching tool call");
                match dispatch(backend.as_ref(), &request.tool, request.args).await {
                    Ok(result) => Response::ok(request.id, result),
                    Err(e) => {
                        warn!("tool call failed: {}", e);
                        Response::err(request.id, &e)
                    }
                }
            }
            Err(e) => {
                warn!("malformed request line: {}", e);
                Response::err(Value::Null, &McpError::MalformedRequest(e.to_string()))
            }
        };

        let mut payload = serde_json::to_vec(&response)?;
        payload.push(b'\n');
        writer.write_all(&payload).await?;
        writer.flush().await?;
    }

    Ok(())
}
