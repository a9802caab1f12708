//! Domain types for the asset catalogue.
//!
//! [`Manifest`] is the source-of-truth unit read from the repository.
//! [`StoredAsset`] is its denormalized projection in the key-value store,
//! [`SummaryEntry`] the lightweight row of the global index, and
//! [`SyncState`] the single progress record written by the engine.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};

/// Maximum number of characters of `description` kept in a [`SummaryEntry`].
pub const SUMMARY_DESCRIPTION_LIMIT: usize = 100;

/// Current time as unix seconds, the unit of every stored timestamp.
pub fn unix_now() -> i64 {
    chrono::Utc::now().timestamp()
}

// ---------------------------------------------------------------------------
// Enums
// ---------------------------------------------------------------------------

/// Asset category. Also selects the per-category index an asset lives in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Tool,
    Prompt,
    Skill,
}

impl Category {
    pub const ALL: [Category; 3] = [Category::Tool, Category::Prompt, Category::Skill];

    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Tool => "tool",
            Category::Prompt => "prompt",
            Category::Skill => "skill",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Category {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "tool" => Ok(Category::Tool),
            "prompt" => Ok(Category::Prompt),
            "skill" => Ok(Category::Skill),
            other => Err(format!(
                "unknown category '{other}'; expected: tool, prompt, skill"
            )),
        }
    }
}

/// Input widget type of a configuration item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConfigFieldType {
    String,
    Number,
    Select,
    Secret,
    Boolean,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum RuntimeLanguage {
    #[default]
    Python,
}

/// Lifecycle of the sync-state record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum SyncStatus {
    #[default]
    Idle,
    Syncing,
    Failed,
}

impl SyncStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SyncStatus::Idle => "idle",
            SyncStatus::Syncing => "syncing",
            SyncStatus::Failed => "failed",
        }
    }
}

impl fmt::Display for SyncStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SyncStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "idle" => Ok(SyncStatus::Idle),
            "syncing" => Ok(SyncStatus::Syncing),
            "failed" => Ok(SyncStatus::Failed),
            other => Err(format!("unknown sync status '{other}'")),
        }
    }
}

// ---------------------------------------------------------------------------
// Manifest
// ---------------------------------------------------------------------------

/// One choice of a `select` configuration item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SelectOption {
    pub label: String,
    pub value: Value,
}

/// One entry of `config_schema`: a form field the consumer must render.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfigItem {
    pub name: String,
    pub label: String,
    #[serde(rename = "type")]
    pub field_type: ConfigFieldType,
    #[serde(default)]
    pub required: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub placeholder: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub options: Option<Vec<SelectOption>>,
}

/// Function-calling descriptor handed to language models.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentSpecs {
    pub function_name: String,
    pub description: String,
    pub parameters: Value,
}

/// How a consumer loads the asset's code.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Runtime {
    pub language: RuntimeLanguage,
    pub entry: String,
    pub handler: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub dependencies: Vec<String>,
}

/// Sandbox flags. Everything is denied unless a manifest opts in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct Permissions {
    #[serde(default)]
    pub network_access: bool,
    #[serde(default)]
    pub filesystem_read: bool,
}

/// A validated asset manifest.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Manifest {
    pub id: String,
    pub version: String,
    pub category: Category,
    pub name: String,
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub config_schema: Vec<ConfigItem>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub agent_specs: Option<AgentSpecs>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub runtime: Option<Runtime>,
    #[serde(default)]
    pub permissions: Permissions,
}

impl Manifest {
    /// SHA-256 hex digest of the canonical JSON encoding.
    ///
    /// Every object, nested ones included, is re-keyed in sorted order before
    /// encoding, so equal manifests hash equal regardless of how the source
    /// YAML was laid out or whether `serde_json` preserves insertion order.
    pub fn content_hash(&self) -> String {
        let canonical = serde_json::to_value(self)
            .map(canonicalize)
            .and_then(|v| serde_json::to_vec(&v))
            .unwrap_or_default();
        let mut h = Sha256::new();
        h.update(&canonical);
        hex::encode(h.finalize())
    }
}

fn canonicalize(value: Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut entries: Vec<(String, Value)> = map.into_iter().collect();
            entries.sort_by(|a, b| a.0.cmp(&b.0));
            Value::Object(entries.into_iter().map(|(k, v)| (k, canonicalize(v))).collect())
        }
        Value::Array(items) => Value::Array(items.into_iter().map(canonicalize).collect()),
        other => other,
    }
}

// ---------------------------------------------------------------------------
// Asset (manifest + provenance)
// ---------------------------------------------------------------------------

/// A manifest together with where and at which revision it was found.
#[derive(Debug, Clone, PartialEq)]
pub struct Asset {
    pub manifest: Manifest,
    pub github_path: String,
    pub github_sha: String,
    pub github_url: Option<String>,
}

impl Asset {
    pub fn id(&self) -> &str {
        &self.manifest.id
    }

    pub fn version(&self) -> &str {
        &self.manifest.version
    }

    pub fn category(&self) -> Category {
        self.manifest.category
    }

    /// Project into a store record stamped at `now` (unix seconds).
    ///
    /// `created_at` is carried over from an earlier record when one exists.
    pub fn to_stored(&self, now: i64, created_at: Option<i64>) -> StoredAsset {
        let m = &self.manifest;
        StoredAsset {
            id: m.id.clone(),
            version: m.version.clone(),
            category: m.category,
            name: m.name.clone(),
            description: m.description.clone(),
            author: m.author.clone(),
            config_schema: serde_json::to_string(&m.config_schema)
                .unwrap_or_else(|_| "[]".to_string()),
            agent_specs: m
                .agent_specs
                .as_ref()
                .and_then(|specs| serde_json::to_string(specs).ok()),
            runtime: m
                .runtime
                .as_ref()
                .and_then(|rt| serde_json::to_string(rt).ok()),
            permissions: serde_json::to_string(&m.permissions).unwrap_or_else(|_| "{}".to_string()),
            github_path: self.github_path.clone(),
            github_sha: self.github_sha.clone(),
            content_hash: m.content_hash(),
            created_at: created_at.unwrap_or(now),
            updated_at: now,
        }
    }
}

// ---------------------------------------------------------------------------
// Store-side projections
// ---------------------------------------------------------------------------

/// Denormalized store record. Nested structures are kept as JSON strings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredAsset {
    pub id: String,
    pub version: String,
    pub category: Category,
    pub name: String,
    pub description: String,
    pub author: Option<String>,
    pub config_schema: String,
    pub agent_specs: Option<String>,
    pub runtime: Option<String>,
    pub permissions: String,
    pub github_path: String,
    pub github_sha: String,
    /// Empty for records written before content hashing existed.
    pub content_hash: String,
    pub created_at: i64,
    pub updated_at: i64,
}

/// Lightweight row of the global summary index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SummaryEntry {
    pub id: String,
    pub name: String,
    pub category: Category,
    pub version: String,
    pub description: String,
}

impl SummaryEntry {
    pub fn from_asset(asset: &StoredAsset) -> Self {
        Self {
            id: asset.id.clone(),
            name: asset.name.clone(),
            category: asset.category,
            version: asset.version.clone(),
            description: asset
                .description
                .chars()
                .take(SUMMARY_DESCRIPTION_LIMIT)
                .collect(),
        }
    }
}

/// The single sync progress record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct SyncState {
    pub last_sync_time: Option<i64>,
    pub last_commit_sha: Option<String>,
    pub sync_status: SyncStatus,
    pub synced_count: u64,
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
