use serde::{Deserialize, Serialize};

/// Tunables of the cascade engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineSettings {
    /// When false, edits raise notifications but no cascades run and foreign
    /// key columns are not locked. Used while bulk-loading a model.
    pub cascade_enabled: bool,
    /// Propagate parent column renames to mapped child columns that still
    /// carry the parent's previous name.
    pub propagate_renames: bool,
    /// Reuse compatible existing child columns instead of generating new ones.
    pub hijack_columns: bool,
    /// Identifying flag given to relationships between two different tables
    /// when the caller does not choose one. Self-references are never
    /// identifying unless asked for explicitly.
    pub identifying_by_default: bool,
    /// Separator used when generated column names need disambiguation.
    pub name_separator: String,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            cascade_enabled: true,
            propagate_renames: true,
            hijack_columns: true,
            identifying_by_default: false,
            name_separator: "_".to_string(),
        }
    }
}
