//! Repository backed by the GitHub REST v3 contents API.
//!
//! File revisions are blob SHAs. Requests that fail at the transport level
//! or with a 5xx status are retried `max_retries` times, `retry_delay` apart.

use std::collections::VecDeque;
use std::time::Duration;

use base64::Engine as _;
use chrono::{DateTime, TimeZone, Utc};
use serde::Deserialize;
use serde_json::json;

use assetsync_core::config::RepositoryConfig;

use crate::client::{is_manifest_name, ChangeDescriptor, FileRecord, ManifestRepository};
use crate::error::RepositoryError;

const USER_AGENT: &str = concat!("assetsync/", env!("CARGO_PKG_VERSION"));
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Deserialize)]
struct ContentEntry {
    #[serde(rename = "type")]
    kind: String,
    name: String,
    path: String,
    sha: String,
    #[serde(default)]
    download_url: Option<String>,
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    encoding: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ContentsReply {
    Listing(Vec<ContentEntry>),
    Single(ContentEntry),
}

#[derive(Debug, Deserialize)]
struct BranchReply {
    commit: CommitRef,
}

#[derive(Debug, Deserialize)]
struct CommitRef {
    sha: String,
}

#[derive(Debug, Deserialize)]
struct CommitItem {
    sha: String,
    commit: CommitDetail,
}

#[derive(Debug, Deserialize)]
struct CommitDetail {
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    committer: Option<Signature>,
}

#[derive(Debug, Deserialize)]
struct Signature {
    #[serde(default)]
    date: Option<DateTime<Utc>>,
}

pub struct GitHubRepository {
    agent: ureq::Agent,
    api_url: String,
    repo: String,
    branch: String,
    token: String,
    max_retries: u32,
    retry_delay: Duration,
}

impl std::fmt::Debug for GitHubRepository {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GitHubRepository")
            .field("repo", &self.repo)
            .field("branch", &self.branch)
            .finish_non_exhaustive()
    }
}

impl GitHubRepository {
    pub fn new(config: &RepositoryConfig) -> Self {
        let agent = ureq::AgentBuilder::new()
            .timeout(REQUEST_TIMEOUT)
            .user_agent(USER_AGENT)
            .build();
        Self {
            agent,
            api_url: config.api_url.trim_end_matches('/').to_string(),
            repo: config.repo.clone(),
            branch: config.branch.clone(),
            token: config.token.clone().unwrap_or_default(),
            max_retries: config.max_retries,
            retry_delay: config.retry_delay(),
        }
    }

    fn contents_url(&self, path: &str) -> String {
        let path = encode_path(path.trim_matches('/'));
        format!("{}/repos/{}/contents/{path}", self.api_url, self.repo)
    }

    fn request(&self, method: &str, url: &str) -> ureq::Request {
        self.agent
            .request(method, url)
            .set("Accept", "application/vnd.github+json")
            .set("Authorization", &format!("Bearer {}", self.token))
            .set("X-GitHub-Api-Version", "2022-11-28")
    }

    /// Send with retries. `Ok(None)` on 404; 409/422 become conflicts on `path`.
    fn send(
        &self,
        path: &str,
        attempt: impl Fn() -> Result<ureq::Response, ureq::Error>,
    ) -> Result<Option<ureq::Response>, RepositoryError> {
        let mut tries = 0;
        loop {
            let err = match attempt() {
                Ok(response) => return Ok(Some(response)),
                Err(ureq::Error::Status(404, _)) => return Ok(None),
                Err(err) => err,
            };
            let retryable = match &err {
                ureq::Error::Transport(_) => true,
                ureq::Error::Status(code, _) => *code >= 500,
            };
            if retryable && tries < self.max_retries {
                tries += 1;
                tracing::warn!(path = %path, attempt = tries, error = %err, "retrying GitHub request");
                std::thread::sleep(self.retry_delay);
                continue;
            }
            return Err(map_error(path, err));
        }
    }

    fn get_json<T: serde::de::DeserializeOwned>(
        &self,
        path: &str,
        url: &str,
        query: &[(&str, &str)],
    ) -> Result<Option<T>, RepositoryError> {
        let Some(response) = self.send(path, || {
            let mut req = self.request("GET", url);
            for (k, v) in query {
                req = req.query(k, v);
            }
            req.call()
        })?
        else {
            return Ok(None);
        };
        let parsed = response.into_json::<T>().map_err(|e| RepositoryError::Api {
            status: None,
            message: format!("unreadable response for {path}: {e}"),
        })?;
        Ok(Some(parsed))
    }

    fn contents(&self, path: &str) -> Result<Option<ContentsReply>, RepositoryError> {
        let url = self.contents_url(path);
        self.get_json(path, &url, &[("ref", self.branch.as_str())])
    }

    fn put_contents(
        &self,
        path: &str,
        content: &str,
        message: &str,
        revision: Option<&str>,
    ) -> Result<(), RepositoryError> {
        let mut body = json!({
            "message": message,
            "content": base64::engine::general_purpose::STANDARD.encode(content.as_bytes()),
            "branch": self.branch,
        });
        if let Some(sha) = revision {
            body["sha"] = json!(sha);
        }
        let url = self.contents_url(path);
        let response = self.send(path, || self.request("PUT", &url).send_json(body.clone()))?;
        if response.is_none() {
            return Err(RepositoryError::NotFound {
                path: path.to_string(),
            });
        }
        Ok(())
    }
}

fn map_error(path: &str, err: ureq::Error) -> RepositoryError {
    match err {
        ureq::Error::Status(code @ (409 | 422), response) => RepositoryError::Conflict {
            path: path.to_string(),
            message: format!("status {code}: {}", response_message(response)),
        },
        ureq::Error::Status(code, response) => RepositoryError::Api {
            status: Some(code),
            message: format!("{path}: {}", response_message(response)),
        },
        ureq::Error::Transport(t) => RepositoryError::Api {
            status: None,
            message: format!("{path}: {t}"),
        },
    }
}

/// The `message` field of a GitHub error body, or the raw body.
fn response_message(response: ureq::Response) -> String {
    let body = response.into_string().unwrap_or_default();
    serde_json::from_str::<serde_json::Value>(&body)
        .ok()
        .and_then(|v| v.get("message").and_then(|m| m.as_str()).map(str::to_string))
        .unwrap_or(body)
}

fn decode_content(entry: &ContentEntry) -> Result<String, RepositoryError> {
    let raw = entry.content.as_deref().unwrap_or("");
    if let Some(encoding) = entry.encoding.as_deref() {
        if encoding != "base64" {
            return Err(RepositoryError::Decode {
                path: entry.path.clone(),
                reason: format!("unsupported encoding '{encoding}'"),
            });
        }
    }
    let compact: String = raw.chars().filter(|c| !c.is_whitespace()).collect();
    let bytes = base64::engine::general_purpose::STANDARD
        .decode(compact)
        .map_err(|e| RepositoryError::Decode {
            path: entry.path.clone(),
            reason: e.to_string(),
        })?;
    String::from_utf8(bytes).map_err(|e| RepositoryError::Decode {
        path: entry.path.clone(),
        reason: e.to_string(),
    })
}

/// Percent-encode a repository path, keeping `/` separators.
fn encode_path(path: &str) -> String {
    let mut out = String::with_capacity(path.len());
    for b in path.bytes() {
        match b {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' | b'/' => {
                out.push(b as char)
            }
            _ => out.push_str(&format!("%{b:02X}")),
        }
    }
    out
}

impl ManifestRepository for GitHubRepository {
    fn scan_manifests(&self, base_path: &str) -> Result<Vec<FileRecord>, RepositoryError> {
        let base = base_path.trim_matches('/').to_string();
        let mut queue = VecDeque::from([base.clone()]);
        let mut records = Vec::new();

        while let Some(dir) = queue.pop_front() {
            let listing = match self.contents(&dir)? {
                Some(ContentsReply::Listing(entries)) => entries,
                Some(ContentsReply::Single(entry)) => vec![entry],
                None if dir == base => {
                    return Err(RepositoryError::NotFound { path: dir });
                }
                None => continue,
            };
            for entry in listing {
                if entry.kind == "dir" {
                    queue.push_back(entry.path);
                } else if entry.kind == "file" && is_manifest_name(&entry.name) {
                    if let Some(record) = self.get_file(&entry.path)? {
                        records.push(record);
                    }
                }
            }
        }
        tracing::debug!(repo = %self.repo, base = %base, found = records.len(), "scanned repository");
        Ok(records)
    }

    fn get_file(&self, path: &str) -> Result<Option<FileRecord>, RepositoryError> {
        let entry = match self.contents(path)? {
            None => return Ok(None),
            Some(ContentsReply::Single(entry)) if entry.kind == "file" => entry,
            Some(_) => {
                return Err(RepositoryError::Decode {
                    path: path.to_string(),
                    reason: "not a file".to_string(),
                })
            }
        };
        let content = decode_content(&entry)?;
        Ok(Some(FileRecord {
            path: entry.path,
            content,
            revision: entry.sha,
            download_url: entry.download_url,
        }))
    }

    fn create_file(&self, path: &str, content: &str, message: &str) -> Result<(), RepositoryError> {
        self.put_contents(path, content, message, None)
    }

    fn update_file(
        &self,
        path: &str,
        content: &str,
        message: &str,
        revision: &str,
    ) -> Result<(), RepositoryError> {
        self.put_contents(path, content, message, Some(revision))
    }

    fn delete_file(&self, path: &str, message: &str, revision: &str) -> Result<(), RepositoryError> {
        let body = json!({
            "message": message,
            "sha": revision,
            "branch": self.branch,
        });
        let url = self.contents_url(path);
        match self.send(path, || self.request("DELETE", &url).send_json(body.clone()))? {
            Some(_) => Ok(()),
            None => Err(RepositoryError::NotFound {
                path: path.to_string(),
            }),
        }
    }

    fn latest_revision(&self) -> Result<Option<String>, RepositoryError> {
        let url = format!("{}/repos/{}/branches/{}", self.api_url, self.repo, encode_path(&self.branch));
        let reply: Option<BranchReply> = self.get_json(&self.branch, &url, &[])?;
        Ok(reply.map(|b| b.commit.sha))
    }

    fn changes_since(&self, since: i64) -> Result<Vec<ChangeDescriptor>, RepositoryError> {
        let since = Utc
            .timestamp_opt(since, 0)
            .single()
            .map(|t| t.to_rfc3339())
            .unwrap_or_default();
        let url = format!("{}/repos/{}/commits", self.api_url, self.repo);
        let commits: Option<Vec<CommitItem>> = self.get_json(
            "commits",
            &url,
            &[("sha", self.branch.as_str()), ("since", since.as_str())],
        )?;
        Ok(commits
            .unwrap_or_default()
            .into_iter()
            .map(|c| ChangeDescriptor {
                revision: c.sha,
                timestamp: c
                    .commit
                    .committer
                    .and_then(|s| s.date)
                    .map(|d| d.timestamp()),
                summary: c.commit.message.map(|m| m.lines().next().unwrap_or("").to_string()),
            })
            .collect())
    }

    fn ping(&self) -> bool {
        let url = format!("{}/repos/{}", self.api_url, self.repo);
        match self.request("GET", &url).call() {
            Ok(_) => true,
            Err(e) => {
                tracing::warn!(repo = %self.repo, error = %e, "GitHub health check failed");
                false
            }
        }
    }

    fn location(&self, path: &str) -> String {
        format!(
            "https://github.com/{}/blob/{}/{}",
            self.repo,
            self.branch,
            path.trim_start_matches('/')
        )
    }
}
