use super::{ApiError, ApiResult};
use crate::model::{
    Artifact, ClientConfig, ConvertRequest, ConvertResponse, DownloadedFile, ExportToken,
    ExportTokenRequest, HealthStatus, Mode, EXPORT_TOKEN_TTL_SECONDS,
};
use futures::StreamExt;
use reqwest::header::{HeaderMap, HeaderValue, CONTENT_DISPOSITION, CONTENT_TYPE};
use serde::de::DeserializeOwned;

const API_KEY_HEADER: &str = "X-API-Key";

/// Thin wrapper over the engine's HTTP API.
///
/// Every call is a single request: no retries, no client-side timeout, and
/// no cancellation once issued.
#[derive(Clone)]
pub struct EngineClient {
    pub http: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
}

impl std::fmt::Debug for EngineClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EngineClient")
            .field("base_url", &self.base_url)
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

impl EngineClient {
    pub fn new(cfg: &ClientConfig) -> ApiResult<Self> {
        let cfg = ClientConfig::new(cfg.base_url.clone(), cfg.api_key.clone());
        reqwest::Url::parse(&cfg.base_url)
            .map_err(|_| ApiError::InvalidBaseUrl(cfg.base_url.clone()))?;

        let http = reqwest::Client::builder()
            .user_agent(format!("artifact-desk/{}", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(ApiError::Client)?;

        Ok(Self {
            http,
            base_url: cfg.base_url,
            api_key: cfg.api_key,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// JSON content type always; the API key only when one is configured.
    fn headers(&self) -> HeaderMap {
        let mut h = HeaderMap::new();
        h.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        if let Some(key) = self.api_key.as_deref() {
            match HeaderValue::from_str(key) {
                Ok(v) => {
                    h.insert(API_KEY_HEADER, v);
                }
                Err(_) => tracing::warn!("API key contains invalid header characters; not sent"),
            }
        }
        h
    }

    async fn send_json<T: DeserializeOwned>(
        &self,
        op: &'static str,
        req: reqwest::RequestBuilder,
    ) -> ApiResult<T> {
        tracing::debug!(op, "engine request");
        let resp = req
            .send()
            .await
            .map_err(|source| ApiError::Transport { op, source })?;
        let status = resp.status();
        if !status.is_success() {
            tracing::warn!(op, status = status.as_u16(), "engine request failed");
            return Err(ApiError::Http {
                op,
                status: status.as_u16(),
            });
        }
        let body = resp
            .json::<T>()
            .await
            .map_err(|source| ApiError::Decode { op, source })?;
        tracing::debug!(op, status = status.as_u16(), "engine request done");
        Ok(body)
    }

    pub async fn health(&self) -> ApiResult<HealthStatus> {
        let req = self.http.get(self.url("/health")).headers(self.headers());
        self.send_json("Health", req).await
    }

    pub async fn convert(&self, raw_input: &str, mode: Mode) -> ApiResult<ConvertResponse> {
        let req = self
            .http
            .post(self.url("/engine/convert"))
            .headers(self.headers())
            .json(&ConvertRequest { raw_input, mode });
        self.send_json("Convert", req).await
    }

    pub async fn get_artifact(&self, id: &str) -> ApiResult<Artifact> {
        let path = format!("/engine/artifacts/{}", urlencoding::encode(id));
        let req = self.http.get(self.url(&path)).headers(self.headers());
        self.send_json("Get artifact", req).await
    }

    pub async fn create_export_token(&self, artifact_id: &str) -> ApiResult<ExportToken> {
        let req = self
            .http
            .post(self.url("/engine/export-token"))
            .headers(self.headers())
            .json(&ExportTokenRequest {
                artifact_id,
                ttl_seconds: EXPORT_TOKEN_TTL_SECONDS,
            });
        self.send_json("Token", req).await
    }

    /// URL a browser would navigate to in order to fetch the export.
    pub fn download_url(&self, token: &str) -> String {
        self.url(&format!("/engine/download/{}", urlencoding::encode(token)))
    }

    /// Fetch a download URL the way a browser navigation would: no API key is sent.
    pub async fn download(&self, url: &str) -> ApiResult<(Option<String>, Vec<u8>)> {
        let op = "Download";
        tracing::debug!(op, "engine request");
        let resp = self
            .http
            .get(url)
            .send()
            .await
            .map_err(|source| ApiError::Transport { op, source })?;
        let status = resp.status();
        if !status.is_success() {
            tracing::warn!(op, status = status.as_u16(), "engine request failed");
            return Err(ApiError::Http {
                op,
                status: status.as_u16(),
            });
        }
        let file_name = resp
            .headers()
            .get(CONTENT_DISPOSITION)
            .and_then(|v| v.to_str().ok())
            .and_then(file_name_from_disposition);

        let mut bytes = Vec::new();
        let mut stream = resp.bytes_stream();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|source| ApiError::Transport { op, source })?;
            bytes.extend_from_slice(&chunk);
        }
        tracing::debug!(op, bytes = bytes.len(), "engine request done");
        Ok((file_name, bytes))
    }

    /// Download and name the file, falling back to `artifact_<id>.zip`.
    pub async fn download_file(&self, url: &str, artifact_id: &str) -> ApiResult<DownloadedFile> {
        let (name, bytes) = self.download(url).await?;
        let file_name = name.unwrap_or_else(|| format!("artifact_{}.zip", sanitize(artifact_id)));
        Ok(DownloadedFile { file_name, bytes })
    }
}

/// Extract a bare file name from a `Content-Disposition` value.
/// Handles both `filename="x.zip"` and RFC 5987 `filename*=UTF-8''x.zip`.
pub(crate) fn file_name_from_disposition(value: &str) -> Option<String> {
    let mut plain = None;
    for part in value.split(';') {
        let part = part.trim();
        if let Some(encoded) = part.strip_prefix("filename*=") {
            let encoded = encoded.rsplit('\'').next().unwrap_or(encoded);
            if let Ok(decoded) = urlencoding::decode(encoded.trim_matches('"')) {
                let name = sanitize(&decoded);
                if !name.is_empty() {
                    return Some(name);
                }
            }
        } else if let Some(name) = part.strip_prefix("filename=") {
            let name = sanitize(name.trim_matches('"'));
            if !name.is_empty() {
                plain = Some(name);
            }
        }
    }
    plain
}

/// Keep only the last path component and drop characters that are unsafe in file names.
fn sanitize(name: &str) -> String {
    let last = name.rsplit(['/', '\\']).next().unwrap_or(name);
    let cleaned: String = last
        .chars()
        .filter(|c| !c.is_control() && !matches!(c, ':' | '*' | '?' | '"' | '<' | '>' | '|'))
        .collect();
    cleaned.trim().trim_start_matches('.').to_string()
}
