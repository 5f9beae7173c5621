// ABOUTME: S3-compatible object storage backend for deck YAML documents
// ABOUTME: Talks to the S3 REST API over reqwest with AWS Signature Version 4 signing
//
// Licensed under either of Apache License, Version 2.0 or MIT License at your option.
// Copyright ©2026 Cardbox Project

//! S3-compatible deck storage.
//!
//! Works against Amazon S3 (virtual-host addressing) or any S3-compatible
//! service via `S3_ENDPOINT_URL` (path-style addressing). Requests are
//! signed with SigV4; the ListObjectsV2 XML response is read with a minimal
//! tag scanner since only `Key`, `LastModified`, and pagination fields are
//! needed.

use super::{filename_stem, is_deck_filename, DeckStorage, StorageError};
use crate::config::environment::StorageConfig;
use crate::models::DeckDocument;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Method;
use ring::hmac;
use sha2::{Digest, Sha256};
use tracing::warn;
use uuid::Uuid;

const SIGNED_HEADERS: &str = "host;x-amz-content-sha256;x-amz-date";

/// S3-backed storage for decks
pub struct S3DeckStorage {
    http: reqwest::Client,
    bucket: String,
    prefix: String,
    region: String,
    /// Scheme + authority of the service, e.g. `https://examplebucket.s3.eu-central-1.amazonaws.com`
    base_url: String,
    /// Authority as signed into the `host` header
    host: String,
    /// Path-style addressing (custom endpoints) prefixes object paths with the bucket
    path_style: bool,
    access_key: String,
    secret_key: String,
}

impl S3DeckStorage {
    /// Build the backend from storage configuration
    pub fn new(config: &StorageConfig) -> anyhow::Result<Self> {
        let (base_url, host, path_style) = match &config.s3_endpoint_url {
            Some(endpoint) => {
                let parsed = url::Url::parse(endpoint)?;
                let host = parsed
                    .host_str()
                    .ok_or_else(|| anyhow::anyhow!("S3_ENDPOINT_URL has no host"))?;
                let authority = match parsed.port() {
                    Some(port) => format!("{host}:{port}"),
                    None => host.to_string(),
                };
                (
                    format!("{}://{authority}", parsed.scheme()),
                    authority,
                    true,
                )
            }
            None => {
                let host = format!("{}.s3.{}.amazonaws.com", config.s3_bucket, config.s3_region);
                (format!("https://{host}"), host, false)
            }
        };

        Ok(Self {
            http: reqwest::Client::new(),
            bucket: config.s3_bucket.clone(),
            prefix: config.s3_prefix.clone(),
            region: config.s3_region.clone(),
            base_url,
            host,
            path_style,
            access_key: config.s3_access_key_id.clone(),
            secret_key: config.s3_secret_access_key.clone(),
        })
    }

    fn object_key(&self, filename: &str) -> String {
        format!("{}{filename}", self.prefix)
    }

    fn user_object_key(&self, user_id: Uuid, filename: &str) -> String {
        format!("{}users/{user_id}/{filename}", self.prefix)
    }

    /// URL path for an object (empty key addresses the bucket itself)
    fn object_path(&self, key: &str) -> String {
        if self.path_style {
            if key.is_empty() {
                format!("/{}", self.bucket)
            } else {
                format!("/{}/{key}", self.bucket)
            }
        } else if key.is_empty() {
            "/".to_string()
        } else {
            format!("/{key}")
        }
    }

    /// Issue a signed request and return the response
    async fn request(
        &self,
        method: Method,
        key: &str,
        query: &[(String, String)],
        body: Vec<u8>,
        content_type: Option<&str>,
    ) -> Result<reqwest::Response, StorageError> {
        let path = self.object_path(key);
        let now = Utc::now();
        let payload_hash = hex_sha256(&body);
        let (amz_date, authorization) = self.sign(method.as_str(), &path, query, &payload_hash, now);

        let mut url = format!("{}{}", self.base_url, encode_path(&path));
        let canonical_query = canonical_query_string(query);
        if !canonical_query.is_empty() {
            url.push('?');
            url.push_str(&canonical_query);
        }

        let mut request = self
            .http
            .request(method, &url)
            .header("x-amz-date", amz_date)
            .header("x-amz-content-sha256", payload_hash)
            .header("authorization", authorization);
        if let Some(ct) = content_type {
            request = request.header("content-type", ct);
        }
        if !body.is_empty() {
            request = request.body(body);
        }

        Ok(request.send().await?)
    }

    /// Compute the SigV4 `x-amz-date` and `Authorization` values
    fn sign(
        &self,
        method: &str,
        path: &str,
        query: &[(String, String)],
        payload_hash: &str,
        now: DateTime<Utc>,
    ) -> (String, String) {
        let amz_date = now.format("%Y%m%dT%H%M%SZ").to_string();
        let date = now.format("%Y%m%d").to_string();

        let canonical_request = format!(
            "{method}\n{}\n{}\nhost:{}\nx-amz-content-sha256:{payload_hash}\nx-amz-date:{amz_date}\n\n{SIGNED_HEADERS}\n{payload_hash}",
            encode_path(path),
            canonical_query_string(query),
            self.host,
        );

        let scope = format!("{date}/{}/s3/aws4_request", self.region);
        let string_to_sign = format!(
            "AWS4-HMAC-SHA256\n{amz_date}\n{scope}\n{}",
            hex_sha256(canonical_request.as_bytes())
        );

        let mut key = hmac_sha256(
            format!("AWS4{}", self.secret_key).as_bytes(),
            date.as_bytes(),
        );
        for part in [self.region.as_str(), "s3", "aws4_request"] {
            key = hmac_sha256(&key, part.as_bytes());
        }
        let signature = hex::encode(hmac_sha256(&key, string_to_sign.as_bytes()));

        let authorization = format!(
            "AWS4-HMAC-SHA256 Credential={}/{scope}, SignedHeaders={SIGNED_HEADERS}, Signature={signature}",
            self.access_key
        );
        (amz_date, authorization)
    }

    /// Fetch an object's content; `None` when the key does not exist
    async fn get_object(&self, key: &str) -> Result<Option<String>, StorageError> {
        let response = self
            .request(Method::GET, key, &[], Vec::new(), None)
            .await?;
        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let status = response.status();
        if !status.is_success() {
            return Err(StorageError::Remote {
                status: status.as_u16(),
                message: truncate(&response.text().await.unwrap_or_default()),
            });
        }
        Ok(Some(response.text().await?))
    }

    async fn head_object(&self, key: &str) -> Result<bool, StorageError> {
        let response = self
            .request(Method::HEAD, key, &[], Vec::new(), None)
            .await?;
        Ok(response.status().is_success())
    }

    async fn put_object(&self, key: &str, content: &str) -> Result<(), StorageError> {
        let response = self
            .request(
                Method::PUT,
                key,
                &[],
                content.as_bytes().to_vec(),
                Some("application/x-yaml"),
            )
            .await?;
        let status = response.status();
        if !status.is_success() {
            return Err(StorageError::Remote {
                status: status.as_u16(),
                message: truncate(&response.text().await.unwrap_or_default()),
            });
        }
        Ok(())
    }

    async fn delete_object(&self, key: &str) -> Result<(), StorageError> {
        let response = self
            .request(Method::DELETE, key, &[], Vec::new(), None)
            .await?;
        let status = response.status();
        // S3 reports 204 for deletes, including of absent keys
        if !status.is_success() {
            return Err(StorageError::Remote {
                status: status.as_u16(),
                message: truncate(&response.text().await.unwrap_or_default()),
            });
        }
        Ok(())
    }

    /// List object keys (with modification times) under a prefix
    async fn list_keys(
        &self,
        prefix: &str,
    ) -> Result<Vec<(String, Option<DateTime<Utc>>)>, StorageError> {
        let mut keys = Vec::new();
        let mut continuation: Option<String> = None;

        loop {
            let mut query = vec![
                ("list-type".to_string(), "2".to_string()),
                ("prefix".to_string(), prefix.to_string()),
            ];
            if let Some(token) = &continuation {
                query.push(("continuation-token".to_string(), token.clone()));
            }

            let response = self
                .request(Method::GET, "", &query, Vec::new(), None)
                .await?;
            let status = response.status();
            if !status.is_success() {
                return Err(StorageError::Remote {
                    status: status.as_u16(),
                    message: truncate(&response.text().await.unwrap_or_default()),
                });
            }
            let body = response.text().await?;

            for block in xml_blocks(&body, "Contents") {
                let Some(key) = xml_text(block, "Key") else {
                    continue;
                };
                let modified = xml_text(block, "LastModified")
                    .and_then(|t| DateTime::parse_from_rfc3339(&t).ok())
                    .map(|t| t.with_timezone(&Utc));
                keys.push((key, modified));
            }

            if xml_text(&body, "IsTruncated").as_deref() == Some("true") {
                continuation = xml_text(&body, "NextContinuationToken");
                if continuation.is_none() {
                    break;
                }
            } else {
                break;
            }
        }

        Ok(keys)
    }

    /// Materialize deck documents for every YAML key under a prefix,
    /// skipping keys under `exclude_prefix`
    async fn list_documents(
        &self,
        prefix: &str,
        exclude_prefix: Option<&str>,
    ) -> Result<Vec<DeckDocument>, StorageError> {
        let mut documents = Vec::new();
        for (key, modified_time) in self.list_keys(prefix).await? {
            if exclude_prefix.is_some_and(|p| key.starts_with(p)) {
                continue;
            }
            let filename = match key.rsplit('/').next() {
                Some(name) if is_deck_filename(name) => name.to_string(),
                _ => continue,
            };
            match self.get_object(&key).await {
                Ok(Some(content)) => documents.push(DeckDocument {
                    id: filename_stem(&filename).to_string(),
                    filename,
                    content,
                    modified_time,
                }),
                Ok(None) => {}
                Err(e) => warn!(key = %key, error = %e, "skipping unreadable deck object"),
            }
        }
        documents.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(documents)
    }

    /// Find the existing key for a deck id under a key-builder
    async fn find_key<F>(&self, deck_id: &str, build: F) -> Result<Option<String>, StorageError>
    where
        F: Fn(&str) -> String,
    {
        for ext in ["yaml", "yml"] {
            let key = build(&format!("{deck_id}.{ext}"));
            if self.head_object(&key).await? {
                return Ok(Some(key));
            }
        }
        Ok(None)
    }

    async fn get_by_key(&self, key: Option<String>) -> Result<Option<DeckDocument>, StorageError> {
        let Some(key) = key else { return Ok(None) };
        let Some(content) = self.get_object(&key).await? else {
            return Ok(None);
        };
        let filename = key.rsplit('/').next().unwrap_or(&key).to_string();
        Ok(Some(DeckDocument {
            id: filename_stem(&filename).to_string(),
            filename,
            content,
            modified_time: None,
        }))
    }

    async fn save_at<F>(
        &self,
        filename: &str,
        content: &str,
        overwrite: bool,
        build: F,
    ) -> Result<DeckDocument, StorageError>
    where
        F: Fn(&str) -> String,
    {
        let key = build(filename);
        if !overwrite && self.head_object(&key).await? {
            return Err(StorageError::AlreadyExists {
                filename: filename.to_string(),
            });
        }
        self.put_object(&key, content).await?;
        Ok(DeckDocument {
            id: filename_stem(filename).to_string(),
            filename: filename.to_string(),
            content: content.to_string(),
            modified_time: Some(Utc::now()),
        })
    }

    async fn delete_at<F>(&self, deck_id: &str, build: F) -> Result<Vec<String>, StorageError>
    where
        F: Fn(&str) -> String,
    {
        let mut deleted = Vec::new();
        for ext in ["yaml", "yml"] {
            let filename = format!("{deck_id}.{ext}");
            let key = build(&filename);
            if self.head_object(&key).await? {
                self.delete_object(&key).await?;
                deleted.push(filename);
            }
        }
        Ok(deleted)
    }
}

#[async_trait]
impl DeckStorage for S3DeckStorage {
    async fn list(&self) -> Result<Vec<DeckDocument>, StorageError> {
        // The users/ subtree holds user decks and is excluded here
        let user_prefix = format!("{}users/", self.prefix);
        self.list_documents(&self.prefix, Some(&user_prefix)).await
    }

    async fn get(&self, deck_id: &str) -> Result<Option<DeckDocument>, StorageError> {
        let key = self.find_key(deck_id, |f| self.object_key(f)).await?;
        self.get_by_key(key).await
    }

    async fn save(
        &self,
        filename: &str,
        content: &str,
        overwrite: bool,
    ) -> Result<DeckDocument, StorageError> {
        self.save_at(filename, content, overwrite, |f| self.object_key(f))
            .await
    }

    async fn delete(&self, deck_id: &str) -> Result<Vec<String>, StorageError> {
        self.delete_at(deck_id, |f| self.object_key(f)).await
    }

    async fn exists(&self, deck_id: &str) -> Result<bool, StorageError> {
        Ok(self
            .find_key(deck_id, |f| self.object_key(f))
            .await?
            .is_some())
    }

    async fn list_user(&self, user_id: Uuid) -> Result<Vec<DeckDocument>, StorageError> {
        let prefix = format!("{}users/{user_id}/", self.prefix);
        self.list_documents(&prefix, None).await
    }

    async fn get_user(
        &self,
        user_id: Uuid,
        deck_id: &str,
    ) -> Result<Option<DeckDocument>, StorageError> {
        let key = self
            .find_key(deck_id, |f| self.user_object_key(user_id, f))
            .await?;
        self.get_by_key(key).await
    }

    async fn save_user(
        &self,
        user_id: Uuid,
        filename: &str,
        content: &str,
        overwrite: bool,
    ) -> Result<DeckDocument, StorageError> {
        self.save_at(filename, content, overwrite, |f| {
            self.user_object_key(user_id, f)
        })
        .await
    }

    async fn delete_user(
        &self,
        user_id: Uuid,
        deck_id: &str,
    ) -> Result<Vec<String>, StorageError> {
        self.delete_at(deck_id, |f| self.user_object_key(user_id, f))
            .await
    }
}

/// Hex-encoded SHA-256 of a payload
fn hex_sha256(data: &[u8]) -> String {
    hex::encode(Sha256::digest(data))
}

/// Raw HMAC-SHA256
fn hmac_sha256(key: &[u8], data: &[u8]) -> Vec<u8> {
    let key = hmac::Key::new(hmac::HMAC_SHA256, key);
    hmac::sign(&key, data).as_ref().to_vec()
}

/// URI-encode a path, keeping `/` separators
fn encode_path(path: &str) -> String {
    path.split('/')
        .map(|segment| urlencoding::encode(segment).into_owned())
        .collect::<Vec<_>>()
        .join("/")
}

/// Canonical query string: keys sorted, RFC 3986 encoding
fn canonical_query_string(query: &[(String, String)]) -> String {
    let mut pairs: Vec<(String, String)> = query
        .iter()
        .map(|(k, v)| {
            (
                urlencoding::encode(k).into_owned(),
                urlencoding::encode(v).into_owned(),
            )
        })
        .collect();
    pairs.sort();
    pairs
        .into_iter()
        .map(|(k, v)| format!("{k}={v}"))
        .collect::<Vec<_>>()
        .join("&")
}

/// Extract the inner text of every `<tag>...</tag>` block
fn xml_blocks<'a>(xml: &'a str, tag: &str) -> Vec<&'a str> {
    let open = format!("<{tag}>");
    let close = format!("</{tag}>");
    let mut blocks = Vec::new();
    let mut rest = xml;
    while let Some(start) = rest.find(&open) {
        let after = &rest[start + open.len()..];
        let Some(end) = after.find(&close) else { break };
        blocks.push(&after[..end]);
        rest = &after[end + close.len()..];
    }
    blocks
}

/// First `<tag>` text inside a block, XML-unescaped
fn xml_text(block: &str, tag: &str) -> Option<String> {
    xml_blocks(block, tag).first().map(|s| xml_unescape(s))
}

fn xml_unescape(s: &str) -> String {
    s.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&apos;", "'")
        .replace("&amp;", "&")
}

fn truncate(s: &str) -> String {
    const MAX: usize = 200;
    match s.char_indices().nth(MAX) {
        Some((cut, _)) => format!("{}...", &s[..cut]),
        None => s.to_string(),
    }
}
