//! Flat string-field encoding of store records.
//!
//! Optional fields are omitted rather than written empty; decoding treats a
//! missing optional as `None`.

use std::collections::HashMap;

use assetsync_core::{StoredAsset, SyncState, SyncStatus};

use crate::error::{corrupt, StoreError};

pub fn encode_asset(asset: &StoredAsset) -> Vec<(String, String)> {
    let mut fields = vec![
        ("id".to_string(), asset.id.clone()),
        ("version".to_string(), asset.version.clone()),
        ("category".to_string(), asset.category.to_string()),
        ("name".to_string(), asset.name.clone()),
        ("description".to_string(), asset.description.clone()),
        ("config_schema".to_string(), asset.config_schema.clone()),
        ("permissions".to_string(), asset.permissions.clone()),
        ("github_path".to_string(), asset.github_path.clone()),
        ("github_sha".to_string(), asset.github_sha.clone()),
        ("content_hash".to_string(), asset.content_hash.clone()),
        ("created_at".to_string(), asset.created_at.to_string()),
        ("updated_at".to_string(), asset.updated_at.to_string()),
    ];
    let optional = [
        ("author", &asset.author),
        ("agent_specs", &asset.agent_specs),
        ("runtime", &asset.runtime),
    ];
    for (name, value) in optional {
        if let Some(value) = value {
            fields.push((name.to_string(), value.clone()));
        }
    }
    fields
}

/// Decode a record hash read from `key`.
pub fn decode_asset(key: &str, mut fields: HashMap<String, String>) -> Result<StoredAsset, StoreError> {
    let mut take = |name: &str| {
        fields
            .remove(name)
            .ok_or_else(|| corrupt(key, format!("missing field '{name}'")))
    };
    let id = take("id")?;
    let version = take("version")?;
    let category = take("category")?
        .parse()
        .map_err(|e: String| corrupt(key, e))?;
    let name = take("name")?;
    let description = take("description")?;
    let config_schema = take("config_schema")?;
    let github_path = take("github_path")?;
    let github_sha = take("github_sha")?;
    let created_at = parse_timestamp(key, "created_at", &take("created_at")?)?;
    let updated_at = parse_timestamp(key, "updated_at", &take("updated_at")?)?;

    Ok(StoredAsset {
        id,
        version,
        category,
        name,
        description,
        config_schema,
        github_path,
        github_sha,
        created_at,
        updated_at,
        // Records written before these fields existed.
        permissions: fields.remove("permissions").unwrap_or_else(|| "{}".to_string()),
        content_hash: fields.remove("content_hash").unwrap_or_default(),
        author: fields.remove("author"),
        agent_specs: fields.remove("agent_specs"),
        runtime: fields.remove("runtime"),
    })
}

fn parse_timestamp(key: &str, field: &str, raw: &str) -> Result<i64, StoreError> {
    raw.parse()
        .map_err(|_| corrupt(key, format!("field '{field}' is not an integer: '{raw}'")))
}

pub fn encode_sync_state(state: &SyncState) -> Vec<(String, String)> {
    let mut fields = vec![
        ("sync_status".to_string(), state.sync_status.to_string()),
        ("synced_count".to_string(), state.synced_count.to_string()),
    ];
    if let Some(t) = state.last_sync_time {
        fields.push(("last_sync_time".to_string(), t.to_string()));
    }
    if let Some(sha) = &state.last_commit_sha {
        fields.push(("last_commit_sha".to_string(), sha.clone()));
    }
    fields
}

/// Decode the sync-state hash. Missing or unreadable fields fall back to
/// their defaults; an absent record is an idle state that never synced.
pub fn decode_sync_state(fields: &HashMap<String, String>) -> SyncState {
    SyncState {
        last_sync_time: fields.get("last_sync_time").and_then(|v| v.parse().ok()),
        last_commit_sha: fields
            .get("last_commit_sha")
            .filter(|v| !v.is_empty())
            .cloned(),
        sync_status: fields
            .get("sync_status")
            .and_then(|v| v.parse::<SyncStatus>().ok())
            .unwrap_or_default(),
        synced_count: fields
            .get("synced_count")
            .and_then(|v| v.parse().ok())
            .unwrap_or(0),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assetsync_core::Category;

    fn stored() -> StoredAsset {
        StoredAsset {
            id: "web_search".into(),
            version: "1.0.0".into(),
            category: Category::Tool,
            name: "Web search".into(),
            description: "Search the web".into(),
            author: Some("ops".into()),
            config_schema: "[]".into(),
            agent_specs: None,
            runtime: None,
            permissions: "{}".into(),
            github_path: "tools/web_search/manifest.yaml".into(),
            github_sha: "abc".into(),
            content_hash: "h".into(),
            created_at: 10,
            updated_at: 20,
        }
    }

    #[test]
    fn encoded_asset_decodes_back() {
        let fields: HashMap<_, _> = encode_asset(&stored()).into_iter().collect();
        assert!(!fields.contains_key("runtime"));
        let decoded = decode_asset("k", fields).expect("decode");
        assert_eq!(decoded, stored());
    }

    #[test]
    fn legacy_record_without_new_fields_decodes() {
        let mut fields: HashMap<_, _> = encode_asset(&stored()).into_iter().collect();
        fields.remove("content_hash");
        fields.remove("permissions");
        let decoded = decode_asset("k", fields).expect("decode");
        assert_eq!(decoded.content_hash, "");
        assert_eq!(decoded.permissions, "{}");
    }

    #[test]
    fn bad_timestamp_is_corrupt() {
        let mut fields: HashMap<_, _> = encode_asset(&stored()).into_iter().collect();
        fields.insert("created_at".into(), "yesterday".into());
        let err = decode_asset("asset:metadata:web_search", fields).unwrap_err();
        assert!(err.to_string().contains("asset:metadata:web_search"));
        assert!(err.to_string().contains("created_at"));
    }

    #[test]
    fn absent_sync_state_is_idle() {
        let state = decode_sync_state(&HashMap::new());
        assert_eq!(state, SyncState::default());
    }
}
