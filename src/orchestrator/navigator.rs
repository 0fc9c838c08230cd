//! Download "navigation".
//!
//! In a browser the export is fetched by navigating to the download URL. Here
//! a [`Navigator`] performs that step; the default one saves the file locally.

use crate::api::EngineClient;
use anyhow::{Context, Result};
use std::future::Future;
use std::path::{Path, PathBuf};

pub(crate) trait Navigator: Send + Sync {
    /// Follow `url` for the artifact `artifact_id`. Returns where the export ended up, if anywhere.
    fn navigate(
        &self,
        url: &str,
        artifact_id: &str,
    ) -> impl Future<Output = Result<Option<PathBuf>>> + Send;
}

/// Fetches the export and writes it into `dir`.
pub(crate) struct SaveToDir {
    client: EngineClient,
    dir: PathBuf,
}

impl SaveToDir {
    pub fn new(client: EngineClient, dir: PathBuf) -> Self {
        Self { client, dir }
    }

    /// Default target: the user's download directory, else the working directory.
    pub fn default_dir() -> Result<PathBuf> {
        match dirs::download_dir() {
            Some(d) => Ok(d),
            None => std::env::current_dir().context("get current directory"),
        }
    }
}

impl Navigator for SaveToDir {
    async fn navigate(&self, url: &str, artifact_id: &str) -> Result<Option<PathBuf>> {
        let file = self.client.download_file(url, artifact_id).await?;
        tokio::fs::create_dir_all(&self.dir)
            .await
            .with_context(|| format!("create {}", self.dir.display()))?;
        let path = unique_path(&self.dir, &file.file_name);
        tokio::fs::write(&path, &file.bytes)
            .await
            .with_context(|| format!("write {}", path.display()))?;
        tracing::info!(path = %path.display(), bytes = file.bytes.len(), "export saved");
        Ok(Some(path))
    }
}

/// `dir/name`, or `dir/stem (n).ext` if that file already exists.
fn unique_path(dir: &Path, name: &str) -> PathBuf {
    let candidate = dir.join(name);
    if !candidate.exists() {
        return candidate;
    }
    let p = Path::new(name);
    let stem = p.file_stem().and_then(|s| s.to_str()).unwrap_or(name);
    let ext = p.extension().and_then(|s| s.to_str());
    (1..)
        .map(|n| match ext {
            Some(ext) => dir.join(format!("{stem} ({n}).{ext}")),
            None => dir.join(format!("{stem} ({n})")),
        })
        .find(|p| !p.exists())
        .unwrap_or(candidate)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ClientConfig;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test]
    fn unique_path_appends_counter() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(unique_path(dir.path(), "a.zip"), dir.path().join("a.zip"));
        std::fs::write(dir.path().join("a.zip"), b"1").unwrap();
        assert_eq!(unique_path(dir.path(), "a.zip"), dir.path().join("a (1).zip"));
        std::fs::write(dir.path().join("a (1).zip"), b"2").unwrap();
        assert_eq!(unique_path(dir.path(), "a.zip"), dir.path().join("a (2).zip"));
    }

    #[tokio::test]
    async fn save_to_dir_writes_export() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/engine/download/tok1"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"zipdata".to_vec()))
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let client = EngineClient::new(&ClientConfig::new(server.uri(), None)).unwrap();
        let nav = SaveToDir::new(client.clone(), dir.path().join("exports"));

        let saved = nav
            .navigate(&client.download_url("tok1"), "abc123")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(saved, dir.path().join("exports").join("artifact_abc123.zip"));
        assert_eq!(std::fs::read(&saved).unwrap(), b"zipdata");
    }
}
