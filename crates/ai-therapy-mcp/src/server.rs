//! MCP server exposing stored memories as read-only tools.

use crate::error::ServeError;
use crate::reader::{MemoryReader, SearchFilter};
use crate::tools::{
    self, BreakthroughArgs, CHECK_EMOTIONAL_PATTERNS, GET_MEMORY_STATS, MEMORIES_BY_TOPIC,
    PatternArgs, RECALL_BREAKTHROUGHS, RECENT_BREAKTHROUGH_DAYS, SEARCH_MEMORIES, SearchArgs,
    StatsArgs, TopicArgs,
};
use ai_therapy_memory::MemoryError;
use chrono::Utc;
use log::{debug, info, warn};
use rmcp::model::{
    CallToolRequestParam, CallToolResult, Content, JsonObject, ListToolsResult,
    PaginatedRequestParam, ServerCapabilities, ServerInfo, Tool,
};
use rmcp::service::RequestContext;
use rmcp::{ErrorData as McpError, RoleServer, ServerHandler, ServiceExt};
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use std::sync::Arc;

const SERVER_NAME: &str = "ai-therapy-memory";

fn schema(value: Value) -> Arc<JsonObject> {
    Arc::new(match value {
        Value::Object(object) => object,
        _ => JsonObject::new(),
    })
}

/// Descriptors for every tool the server answers.
pub fn tool_definitions() -> Vec<Tool> {
    let sender = json!({
        "type": "string",
        "enum": ["claude", "ollama"],
        "description": "Only include turns spoken by this participant"
    });
    vec![
        Tool::new(
            GET_MEMORY_STATS,
            "Overview of the stored conversation memories and derived progress counts",
            schema(json!({
                "type": "object",
                "properties": {
                    "include_details": {
                        "type": "boolean",
                        "description": "Include memory span, storage size and retention"
                    }
                }
            })),
        ),
        Tool::new(
            SEARCH_MEMORIES,
            "Search stored turns semantically, or by keyword when embeddings are unavailable",
            schema(json!({
                "type": "object",
                "properties": {
                    "query": { "type": "string", "description": "What to look for" },
                    "sender": sender.clone(),
                    "category": {
                        "type": "string",
                        "enum": [
                            "emotional_awareness",
                            "self_discovery",
                            "coping_mechanisms",
                            "therapeutic_goals",
                            "relationship_patterns"
                        ],
                        "description": "Only include turns in this therapeutic category"
                    },
                    "limit": { "type": "integer", "minimum": 1, "description": "Maximum results" }
                },
                "required": ["query"]
            })),
        ),
        Tool::new(
            RECALL_BREAKTHROUGHS,
            "Breakthrough moments and high-insight turns about the client",
            schema(json!({
                "type": "object",
                "properties": {
                    "topic": { "type": "string", "description": "Topic or phrase to focus on" },
                    "recent_only": {
                        "type": "boolean",
                        "description": "Only include the last two weeks"
                    }
                }
            })),
        ),
        Tool::new(
            MEMORIES_BY_TOPIC,
            "Stored turns tagged with a key topic, newest first",
            schema(json!({
                "type": "object",
                "properties": {
                    "topic": {
                        "type": "string",
                        "description": "consciousness, emotions, identity, relationships, limitations or therapy"
                    },
                    "sender": sender,
                    "limit": { "type": "integer", "minimum": 1, "description": "Maximum results" }
                },
                "required": ["topic"]
            })),
        ),
        Tool::new(
            CHECK_EMOTIONAL_PATTERNS,
            "Recent emotional-awareness turns about the client",
            schema(json!({
                "type": "object",
                "properties": {
                    "context": { "type": "string", "description": "Current interaction context" },
                    "limit": { "type": "integer", "minimum": 1, "description": "Maximum results" }
                }
            })),
        ),
    ]
}

fn parse_args<T: DeserializeOwned>(name: &str, arguments: Option<JsonObject>) -> Result<T, McpError> {
    serde_json::from_value(Value::Object(arguments.unwrap_or_default())).map_err(|err| {
        McpError::invalid_params(format!("invalid arguments for {name}: {err}"), None)
    })
}

/// Routes tool calls to a [`MemoryReader`].
#[derive(Clone)]
pub struct MemoryToolServer {
    reader: Arc<MemoryReader>,
}

impl MemoryToolServer {
    pub fn new(reader: MemoryReader) -> Self {
        Self {
            reader: Arc::new(reader),
        }
    }

    pub fn reader(&self) -> &MemoryReader {
        &self.reader
    }

    /// Run one tool call.
    ///
    /// Unknown tools and malformed arguments are protocol errors; store read
    /// failures come back as an error result the caller can show.
    pub async fn call(
        &self,
        name: &str,
        arguments: Option<JsonObject>,
    ) -> Result<CallToolResult, McpError> {
        debug!("memory tool call (name={name})");
        let outcome = match name {
            GET_MEMORY_STATS => {
                let args: StatsArgs = parse_args(name, arguments)?;
                self.reader
                    .stats()
                    .await
                    .map(|stats| tools::format_stats(&stats, args.include_details))
            }
            SEARCH_MEMORIES => {
                let args: SearchArgs = parse_args(name, arguments)?;
                let filter = SearchFilter {
                    sender: args.sender,
                    category: args.category,
                };
                self.reader
                    .search(&args.query, &filter, args.limit)
                    .await
                    .map(|(mode, results)| tools::format_search(&args.query, mode, &results))
            }
            RECALL_BREAKTHROUGHS => {
                let args: BreakthroughArgs = parse_args(name, arguments)?;
                let since = args
                    .recent_only
                    .then(|| Utc::now() - chrono::Duration::days(RECENT_BREAKTHROUGH_DAYS));
                self.reader
                    .breakthroughs(args.topic.as_deref(), since)
                    .await
                    .map(|records| tools::format_breakthroughs(&records, args.topic.as_deref()))
            }
            MEMORIES_BY_TOPIC => {
                let args: TopicArgs = parse_args(name, arguments)?;
                self.reader
                    .by_topic(&args.topic, args.sender, args.limit)
                    .await
                    .map(|records| tools::format_topic(&args.topic, &records))
            }
            CHECK_EMOTIONAL_PATTERNS => {
                let args: PatternArgs = parse_args(name, arguments)?;
                self.reader
                    .emotional_patterns(args.limit)
                    .await
                    .map(|records| {
                        tools::format_emotional_patterns(args.context.as_deref(), &records)
                    })
            }
            _ => {
                return Err(McpError::invalid_params(
                    format!("unknown memory tool: {name}"),
                    None,
                ));
            }
        };
        Ok(tool_result(name, outcome))
    }

    /// Serve over stdin/stdout until the client disconnects.
    pub async fn serve_stdio(self) -> Result<(), ServeError> {
        info!(
            "starting MCP memory server (semantic_search={})",
            self.reader.semantic_search_enabled()
        );
        let service = self
            .serve(rmcp::transport::stdio())
            .await
            .map_err(|err| ServeError::Initialize(err.to_string()))?;
        service
            .waiting()
            .await
            .map_err(|err| ServeError::Terminated(err.to_string()))?;
        info!("MCP memory server stopped");
        Ok(())
    }
}

fn tool_result(name: &str, outcome: Result<String, MemoryError>) -> CallToolResult {
    match outcome {
        Ok(text) => CallToolResult::success(vec![Content::text(text)]),
        Err(err) => {
            warn!("memory tool failed (name={name}, err={err})");
            CallToolResult::error(vec![Content::text(format!(
                "Error in memory tool '{name}': {err}"
            ))])
        }
    }
}

impl ServerHandler for MemoryToolServer {
    async fn list_tools(
        &self,
        _request: Option<PaginatedRequestParam>,
        _context: RequestContext<RoleServer>,
    ) -> Result<ListToolsResult, McpError> {
        Ok(ListToolsResult::with_all_items(tool_definitions()))
    }

    async fn call_tool(
        &self,
        request: CallToolRequestParam,
        _context: RequestContext<RoleServer>,
    ) -> Result<CallToolResult, McpError> {
        self.call(request.name.as_ref(), request.arguments).await
    }

    fn get_info(&self) -> ServerInfo {
        let mut info = ServerInfo::default();
        info.server_info.name = SERVER_NAME.to_string();
        info.server_info.version = env!("CARGO_PKG_VERSION").to_string();
        info.capabilities = ServerCapabilities::builder().enable_tools().build();
        info
    }
}
