//! Schema metadata - ground truth the plan validator reconciles against
//!
//! Metadata is authoritative only when present: a project with no catalogued
//! tables gives the validator no opinion, and the reasoner's descriptors pass
//! through unchanged.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;

use crate::error::{EngineResult, WorkflowError};

/// Column descriptor as catalogued for a table
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ColumnMeta {
    /// Column name
    pub name: String,

    /// Data type as reported by the target engine
    #[serde(default)]
    pub data_type: String,

    /// Is nullable
    #[serde(default = "default_nullable")]
    pub nullable: bool,
}

fn default_nullable() -> bool {
    true
}

/// Per-table metadata
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct TableMeta {
    #[serde(default)]
    pub columns: Vec<ColumnMeta>,
}

/// Ground-truth schema for one project: qualified table name -> table metadata
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct SchemaMetadata {
    #[serde(default, flatten)]
    pub tables: HashMap<String, TableMeta>,
}

impl SchemaMetadata {
    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }

    pub fn has_table(&self, table: &str) -> bool {
        self.tables.contains_key(table)
    }

    /// Look up the authoritative descriptor for `(table, column)`.
    ///
    /// Qualified references (`table.column`) are matched on the short column
    /// name, the way the target engine reports them.
    pub fn column(&self, table: &str, column: &str) -> Option<&ColumnMeta> {
        let short = column.rsplit('.').next().unwrap_or(column);
        self.tables
            .get(table)
            .and_then(|t| t.columns.iter().find(|c| c.name == short))
    }

    /// Whether `column` resolves in any catalogued table.
    pub fn column_exists_anywhere(&self, column: &str) -> bool {
        let short = column.rsplit('.').next().unwrap_or(column);
        self.tables
            .values()
            .any(|t| t.columns.iter().any(|c| c.name == short))
    }
}

/// Metadata oracle boundary: schema lookup per project.
///
/// "No schema found" must surface as a reported error, never a panic, so the
/// coordinator can turn it into a phase failure.
pub trait MetadataStore: Send + Sync {
    fn get_schema(&self, project_id: &str) -> EngineResult<SchemaMetadata>;
}

/// File-backed store: one `tables_metadata.json` per project directory.
pub struct FileMetadataStore {
    root: PathBuf,
}

impl FileMetadataStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn project_path(&self, project_id: &str) -> PathBuf {
        self.root
            .join("projects")
            .join(project_id)
            .join("tables_metadata.json")
    }
}

impl MetadataStore for FileMetadataStore {
    fn get_schema(&self, project_id: &str) -> EngineResult<SchemaMetadata> {
        let path = self.project_path(project_id);
        if !path.exists() {
            return Err(WorkflowError::metadata_for_project(
                format!("No metadata found for project {}", project_id),
                project_id,
            ));
        }
        let raw = std::fs::read_to_string(&path).map_err(|e| {
            WorkflowError::metadata_for_project(
                format!("Failed to read {}: {}", path.display(), e),
                project_id,
            )
        })?;
        serde_json::from_str(&raw).map_err(|e| {
            WorkflowError::metadata_for_project(
                format!("Malformed metadata in {}: {}", path.display(), e),
                project_id,
            )
        })
    }
}

/// In-memory store, used by tests and embedding callers
#[derive(Default)]
pub struct InMemoryMetadataStore {
    projects: HashMap<String, SchemaMetadata>,
}

impl InMemoryMetadataStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, project_id: impl Into<String>, schema: SchemaMetadata) {
        self.projects.insert(project_id.into(), schema);
    }
}

impl MetadataStore for InMemoryMetadataStore {
    fn get_schema(&self, project_id: &str) -> EngineResult<SchemaMetadata> {
        self.projects.get(project_id).cloned().ok_or_else(|| {
            WorkflowError::metadata_for_project(
                format!("No metadata found for project {}", project_id),
                project_id,
            )
        })
    }
}
