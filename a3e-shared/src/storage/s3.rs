/// S3-compatible object storage
///
/// Path-style requests (`{endpoint}/{bucket}/{key}`) signed with AWS
/// Signature Version 4, so the same client works against AWS, MinIO and R2.
/// The payload hash is always computed; no chunked uploads.

use super::{validate_key, StorageBackend, StorageError};
use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use reqwest::{Method, StatusCode};
use sha2::{Digest, Sha256};
use std::time::Duration;

const ALGORITHM: &str = "AWS4-HMAC-SHA256";
const SIGNED_HEADERS: &str = "host;x-amz-content-sha256;x-amz-date";

#[derive(Debug, Clone)]
pub struct S3Config {
    /// e.g. `https://s3.us-east-1.amazonaws.com` or `http://localhost:9000`
    pub endpoint: Option<String>,
    pub region: String,
    pub bucket: String,
    pub access_key: String,
    pub secret_key: String,
}

impl S3Config {
    fn endpoint(&self) -> String {
        match &self.endpoint {
            Some(endpoint) => endpoint.trim_end_matches('/').to_string(),
            None => format!("https://s3.{}.amazonaws.com", self.region),
        }
    }
}

pub struct S3Storage {
    http: reqwest::Client,
    config: S3Config,
    endpoint: String,
    host: String,
}

impl std::fmt::Debug for S3Storage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("S3Storage")
            .field("endpoint", &self.endpoint)
            .field("bucket", &self.config.bucket)
            .field("region", &self.config.region)
            .finish()
    }
}

fn hmac(key: &[u8], data: &[u8]) -> Vec<u8> {
    let mut mac = <Hmac<Sha256> as Mac>::new_from_slice(key).expect("HMAC can take key of any size");
    mac.update(data);
    mac.finalize().into_bytes().to_vec()
}

fn sha256_hex(data: &[u8]) -> String {
    hex::encode(Sha256::digest(data))
}

fn signing_key(secret: &str, date_stamp: &str, region: &str, service: &str) -> Vec<u8> {
    let k_date = hmac(format!("AWS4{secret}").as_bytes(), date_stamp.as_bytes());
    let k_region = hmac(&k_date, region.as_bytes());
    let k_service = hmac(&k_region, service.as_bytes());
    hmac(&k_service, b"aws4_request")
}

/// URI-encodes each path segment, keeping the slashes
fn encode_path(path: &str) -> String {
    path.split('/')
        .map(|seg| urlencoding::encode(seg).into_owned())
        .collect::<Vec<_>>()
        .join("/")
}

fn host_of(endpoint: &str) -> String {
    let without_scheme = endpoint.split_once("://").map(|(_, rest)| rest).unwrap_or(endpoint);
    without_scheme.split('/').next().unwrap_or(without_scheme).to_string()
}

/// Headers to attach to one signed request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedHeaders {
    pub authorization: String,
    pub amz_date: String,
    pub content_sha256: String,
}

impl S3Storage {
    pub fn new(config: S3Config) -> Result<Self, StorageError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(60))
            .build()
            .map_err(|e| StorageError::Backend(e.to_string()))?;

        let endpoint = config.endpoint();
        let host = host_of(&endpoint);

        Ok(Self {
            http,
            config,
            endpoint,
            host,
        })
    }

    fn canonical_uri(&self, key: &str) -> String {
        format!("/{}/{}", encode_path(&self.config.bucket), encode_path(key))
    }

    /// SigV4 headers for a request with an empty query string
    pub fn sign(&self, method: &Method, key: &str, payload: &[u8], now: DateTime<Utc>) -> SignedHeaders {
        let amz_date = now.format("%Y%m%dT%H%M%SZ").to_string();
        let date_stamp = now.format("%Y%m%d").to_string();
        let content_sha256 = sha256_hex(payload);

        let canonical_request = format!(
            "{}\n{}\n\nhost:{}\nx-amz-content-sha256:{}\nx-amz-date:{}\n\n{}\n{}",
            method.as_str(),
            self.canonical_uri(key),
            self.host,
            content_sha256,
            amz_date,
            SIGNED_HEADERS,
            content_sha256,
        );

        let scope = format!("{}/{}/s3/aws4_request", date_stamp, self.config.region);
        let string_to_sign = format!(
            "{ALGORITHM}\n{amz_date}\n{scope}\n{}",
            sha256_hex(canonical_request.as_bytes())
        );

        let key = signing_key(&self.config.secret_key, &date_stamp, &self.config.region, "s3");
        let signature = hex::encode(hmac(&key, string_to_sign.as_bytes()));

        SignedHeaders {
            authorization: format!(
                "{ALGORITHM} Credential={}/{scope}, SignedHeaders={SIGNED_HEADERS}, Signature={signature}",
                self.config.access_key
            ),
            amz_date,
            content_sha256,
        }
    }

    async fn request(
        &self,
        method: Method,
        key: &str,
        body: Option<(Bytes, &str)>,
    ) -> Result<reqwest::Response, StorageError> {
        validate_key(key)?;

        let payload: &[u8] = body.as_ref().map(|(b, _)| b.as_ref()).unwrap_or(&[]);
        let signed = self.sign(&method, key, payload, Utc::now());
        let url = format!("{}{}", self.endpoint, self.canonical_uri(key));

        let mut request = self
            .http
            .request(method, url)
            .header("authorization", signed.authorization)
            .header("x-amz-date", signed.amz_date)
            .header("x-amz-content-sha256", signed.content_sha256);

        if let Some((data, content_type)) = body {
            request = request.header("content-type", content_type).body(data);
        }

        request.send().await.map_err(|e| StorageError::Backend(e.to_string()))
    }

    async fn fail(key: &str, response: reqwest::Response) -> StorageError {
        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return StorageError::NotFound(key.to_string());
        }
        let body = response.text().await.unwrap_or_default();
        tracing::warn!(key, status = status.as_u16(), "S3 request failed");
        StorageError::Backend(format!("S3 returned {status}: {body}"))
    }
}

#[async_trait]
impl StorageBackend for S3Storage {
    fn name(&self) -> &'static str {
        "s3"
    }

    async fn put(&self, key: &str, data: Bytes, content_type: &str) -> Result<(), StorageError> {
        let size = data.len();
        let response = self.request(Method::PUT, key, Some((data, content_type))).await?;
        if !response.status().is_success() {
            return Err(Self::fail(key, response).await);
        }

        tracing::debug!(key, bytes = size, bucket = %self.config.bucket, "Stored object in S3");
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Bytes, StorageError> {
        let response = self.request(Method::GET, key, None).await?;
        if !response.status().is_success() {
            return Err(Self::fail(key, response).await);
        }
        response.bytes().await.map_err(|e| StorageError::Backend(e.to_string()))
    }

    async fn delete(&self, key: &str) -> Result<(), StorageError> {
        let response = self.request(Method::DELETE, key, None).await?;
        match response.status() {
            s if s.is_success() || s == StatusCode::NOT_FOUND => Ok(()),
            _ => Err(Self::fail(key, response).await),
        }
    }

    async fn exists(&self, key: &str) -> Result<bool, StorageError> {
        let response = self.request(Method::HEAD, key, None).await?;
        match response.status() {
            s if s.is_success() => Ok(true),
            StatusCode::NOT_FOUND => Ok(false),
            _ => Err(Self::fail(key, response).await),
        }
    }
}
