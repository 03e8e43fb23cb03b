//! Chunk entity, kinds, history, and the chunk<->IR/graph mapping tables.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Hierarchical code-unit kind. The first group is the repo->function entity
/// ladder from the data model; the second group covers domain-flavored leaf
/// kinds a chunk can also take (a function chunk that happens to be a route
/// handler is still tagged `Route`, not both); the third group is metadata
/// kinds exempt from sibling-overlap checking (8.1).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChunkKind {
    Repo,
    Project,
    Module,
    File,
    Class,
    Function,
    Route,
    Service,
    Repository,
    Config,
    Job,
    Middleware,
    Document,
    ModuleApi,
    Interface,
    Reexport,
    Diff,
    /// Meta kinds: allowed to overlap siblings at the same (parent, file).
    FileHeader,
    Skeleton,
    Docstring,
}

impl ChunkKind {
    /// Meta kinds are exempt from the sibling non-overlap invariant.
    pub fn is_meta(&self) -> bool {
        matches!(self, Self::FileHeader | Self::Skeleton | Self::Docstring)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Repo => "repo",
            Self::Project => "project",
            Self::Module => "module",
            Self::File => "file",
            Self::Class => "class",
            Self::Function => "function",
            Self::Route => "route",
            Self::Service => "service",
            Self::Repository => "repository",
            Self::Config => "config",
            Self::Job => "job",
            Self::Middleware => "middleware",
            Self::Document => "document",
            Self::ModuleApi => "module_api",
            Self::Interface => "interface",
            Self::Reexport => "reexport",
            Self::Diff => "diff",
            Self::FileHeader => "file_header",
            Self::Skeleton => "skeleton",
            Self::Docstring => "docstring",
        }
    }

    /// Priority used when resolving a `(file, line)` query to a single
    /// chunk: smaller number wins when spans tie. Lower is more specific.
    pub fn specificity(&self) -> u8 {
        match self {
            Self::Function => 0,
            Self::Class => 1,
            Self::File => 2,
            Self::Module => 3,
            Self::Project => 4,
            Self::Repo => 5,
            _ => 3,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SymbolVisibility {
    Public,
    Internal,
    Private,
}

/// Churn/ownership history attached to a chunk, mirroring the
/// `chunk_history` persisted table.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ChunkHistory {
    pub author: Option<String>,
    pub last_modified_by: Option<String>,
    pub last_modified_at: Option<String>,
    pub commit_sha: Option<String>,
    pub churn_score: f64,
    pub stability_index: f64,
    pub contributor_count: u32,
    pub co_changed_files: Vec<String>,
    pub co_change_strength: HashMap<String, f64>,
    pub first_commit_at: Option<String>,
    pub days_since_last_change: Option<u32>,
    pub last_analyzed_at: Option<String>,
    pub analysis_version: u32,
}

/// A hierarchical code unit: repo -> project -> module -> file -> class -> function,
/// plus the domain-flavored and meta leaf kinds.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Chunk {
    pub chunk_id: String,
    pub repo_id: String,
    pub snapshot_id: String,
    pub kind: ChunkKind,
    pub fqn: String,
    pub file_path: Option<String>,
    pub start_line: Option<u32>,
    pub end_line: Option<u32>,
    pub original_start_line: Option<u32>,
    pub original_end_line: Option<u32>,
    pub content_hash: String,
    pub parent_id: Option<String>,
    pub children: Vec<String>,
    pub language: Option<String>,
    pub symbol_visibility: Option<SymbolVisibility>,
    pub symbol_id: Option<String>,
    pub symbol_owner_id: Option<String>,
    pub summary: Option<String>,
    pub importance: Option<f64>,
    pub version: u32,
    pub last_indexed_commit: Option<String>,
    pub is_deleted: bool,
    pub is_test: Option<bool>,
    pub is_overlay: bool,
    pub overlay_session_id: Option<String>,
    pub base_chunk_id: Option<String>,
    pub history: Option<ChunkHistory>,
}

/// `chunk_id = "chunk:{repo}:{kind}:{fqn}[:{hash}]"`, per the data model.
/// The hash suffix is only attached on logical-key collision (invariant 4);
/// `build_chunk_id` covers the common case, `disambiguate_chunk_id` the rare one.
pub fn build_chunk_id(repo_id: &str, kind: ChunkKind, fqn: &str) -> String {
    format!("chunk:{repo_id}:{}:{fqn}", kind.as_str())
}

pub fn disambiguate_chunk_id(base_id: &str, content_hash: &str) -> String {
    let short = &content_hash[..content_hash.len().min(8)];
    format!("{base_id}:{short}")
}

/// Deterministic content hash: identical content in identical context
/// (here, `context` carries the parent fqn + kind so two functions with the
/// same body in different classes still hash differently is a caller
/// decision; this only hashes the byte content) yields an identical hash.
pub fn content_hash(content: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    format!("{:x}", hasher.finalize())
}

impl Chunk {
    pub fn new(repo_id: impl Into<String>, snapshot_id: impl Into<String>, kind: ChunkKind, fqn: impl Into<String>) -> Self {
        let repo_id = repo_id.into();
        let fqn = fqn.into();
        let chunk_id = build_chunk_id(&repo_id, kind, &fqn);
        Self {
            chunk_id,
            repo_id,
            snapshot_id: snapshot_id.into(),
            kind,
            fqn,
            file_path: None,
            start_line: None,
            end_line: None,
            original_start_line: None,
            original_end_line: None,
            content_hash: String::new(),
            parent_id: None,
            children: Vec::new(),
            language: None,
            symbol_visibility: None,
            symbol_id: None,
            symbol_owner_id: None,
            summary: None,
            importance: None,
            version: 1,
            last_indexed_commit: None,
            is_deleted: false,
            is_test: None,
            is_overlay: false,
            overlay_session_id: None,
            base_chunk_id: None,
            history: None,
        }
    }

    pub fn with_span(mut self, start_line: u32, end_line: u32) -> Self {
        self.start_line = Some(start_line);
        self.end_line = Some(end_line);
        self.original_start_line = Some(start_line);
        self.original_end_line = Some(end_line);
        self
    }

    pub fn with_parent(mut self, parent_id: impl Into<String>) -> Self {
        self.parent_id = Some(parent_id.into());
        self
    }

    pub fn with_content_hash(mut self, hash: impl Into<String>) -> Self {
        self.content_hash = hash.into();
        self
    }

    /// `[start_line, end_line]` as an inclusive range, when both are set.
    pub fn span(&self) -> Option<(u32, u32)> {
        match (self.start_line, self.end_line) {
            (Some(s), Some(e)) => Some((s, e)),
            _ => None,
        }
    }

    pub fn overlaps(&self, other: &Chunk) -> bool {
        match (self.span(), other.span()) {
            (Some((s1, e1)), Some((s2, e2))) => s1 <= e2 && s2 <= e1,
            _ => false,
        }
    }
}

/// `ChunkToIR: chunk_id -> set(IR node ids)`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ChunkToIrMapping {
    pub repo_id: String,
    pub snapshot_id: String,
    pub entries: HashMap<String, Vec<String>>,
}

/// `ChunkToGraph: chunk_id -> set(graph node ids)`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ChunkToGraphMapping {
    pub repo_id: String,
    pub snapshot_id: String,
    pub entries: HashMap<String, Vec<String>>,
}

/// The kind of divergence a drift report describes, between an overlay
/// chunk (a session-scoped speculative edit) and the base chunk it shadows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DriftType {
    /// Overlay content is unchanged from base.
    None,
    /// Same logical span, different content hash.
    ContentDivergence,
    /// Start/end lines shifted (e.g. upstream edits above the chunk).
    LineShift,
    /// The base chunk no longer exists (deleted or renamed away).
    BaseMissing,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DriftReport {
    pub overlay_chunk_id: String,
    pub base_chunk_id: String,
    pub drift_type: DriftType,
    pub detail: String,
}
