//! Execution of a single session action against the engine.

use super::navigator::Navigator;
use crate::api::EngineClient;
use crate::session::{ActionRequest, DownloadRecord, Outcome};

/// Run the network side of `request`, reporting every step through `emit`.
///
/// Steps are emitted in order; the first failure is emitted as
/// [`Outcome::Failed`] and ends the action without rolling anything back.
pub(crate) async fn execute<N, F>(
    client: &EngineClient,
    navigator: &N,
    request: &ActionRequest,
    mut emit: F,
) where
    N: Navigator,
    F: FnMut(Outcome) + Send,
{
    match request {
        ActionRequest::Health => match client.health().await {
            Ok(h) => emit(Outcome::Reachable(h)),
            Err(e) => emit(Outcome::Failed(e.to_string())),
        },
        ActionRequest::Convert { raw_input, mode } => {
            let id = match client.convert(raw_input, *mode).await {
                Ok(resp) => resp.id,
                Err(e) => return emit(Outcome::Failed(e.to_string())),
            };
            tracing::info!(artifact_id = %id, %mode, "converted");
            emit(Outcome::ConvertAccepted { id: id.clone() });
            match client.get_artifact(&id).await {
                Ok(a) => emit(Outcome::ArtifactFetched(a)),
                Err(e) => emit(Outcome::Failed(e.to_string())),
            }
        }
        ActionRequest::Load { id } => match client.get_artifact(id).await {
            Ok(a) => emit(Outcome::ArtifactFetched(a)),
            Err(e) => emit(Outcome::Failed(e.to_string())),
        },
        ActionRequest::Download { artifact_id } => {
            let token = match client.create_export_token(artifact_id).await {
                Ok(t) => {
                    tracing::debug!(expires_at = ?t.expires_at, "export token issued");
                    t.token
                }
                Err(e) => return emit(Outcome::Failed(e.to_string())),
            };
            let url = client.download_url(&token);
            match navigator.navigate(&url, artifact_id).await {
                Ok(path) => emit(Outcome::Downloaded(DownloadRecord { url, path })),
                Err(e) => emit(Outcome::Failed(format!("{e:#}"))),
            }
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::model::{ClientConfig, Mode};
    use crate::session::{ActionKind, SessionState};
    use anyhow::Result;
    use serde_json::json;
    use std::path::PathBuf;
    use std::sync::Mutex;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    /// Records navigation targets instead of fetching them.
    #[derive(Default)]
    pub(crate) struct RecordingNavigator {
        pub visited: Mutex<Vec<String>>,
    }

    impl Navigator for RecordingNavigator {
        async fn navigate(&self, url: &str, _artifact_id: &str) -> Result<Option<PathBuf>> {
            self.visited.lock().unwrap().push(url.to_string());
            Ok(None)
        }
    }

    async fn run(
        client: &EngineClient,
        nav: &RecordingNavigator,
        state: &mut SessionState,
        kind: ActionKind,
    ) {
        let action = state.begin(kind).unwrap();
        let mut outcomes = Vec::new();
        execute(client, nav, &action.request, |o| outcomes.push(o)).await;
        for o in outcomes {
            state.apply(&action.ticket, o);
        }
        state.finish(&action.ticket);
    }

    #[tokio::test]
    async fn convert_fetches_the_new_artifact_exactly_once() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/engine/convert"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": "abc123"})))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/engine/artifacts/abc123"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({"id": "abc123", "structured_output": {"foo": 1}})),
            )
            .expect(1)
            .mount(&server)
            .await;

        let client = EngineClient::new(&ClientConfig::new(server.uri(), None)).unwrap();
        let nav = RecordingNavigator::default();
        let mut state = SessionState::new(Mode::Code);
        state.raw_input = "hello".into();

        run(&client, &nav, &mut state, ActionKind::Convert).await;

        assert_eq!(state.artifact_id, "abc123");
        let a = state.artifact.as_ref().unwrap();
        assert_eq!(a.id, "abc123");
        assert_eq!(a.pretty_output(), "{\n  \"foo\": 1\n}");
        assert!(!state.busy);
        assert_eq!(state.error, "");
    }

    #[tokio::test]
    async fn convert_with_failed_fetch_keeps_previous_artifact() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/engine/convert"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": "xyz"})))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/engine/artifacts/xyz"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let client = EngineClient::new(&ClientConfig::new(server.uri(), None)).unwrap();
        let nav = RecordingNavigator::default();
        let mut state = SessionState::default();
        state.artifact = Some(serde_json::from_value(json!({"id": "old"})).unwrap());
        state.raw_input = "text".into();

        run(&client, &nav, &mut state, ActionKind::Convert).await;

        assert_eq!(state.artifact_id, "xyz");
        assert_eq!(state.artifact.as_ref().unwrap().id, "old");
        assert_eq!(state.error, "Get artifact failed: 404");
        assert!(!state.busy);
    }

    #[tokio::test]
    async fn convert_failure_skips_the_fetch() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/engine/convert"))
            .respond_with(ResponseTemplate::new(401))
            .mount(&server)
            .await;

        let client = EngineClient::new(&ClientConfig::new(server.uri(), None)).unwrap();
        let nav = RecordingNavigator::default();
        let mut state = SessionState::default();
        state.artifact_id = "kept".into();
        state.raw_input = "text".into();

        run(&client, &nav, &mut state, ActionKind::Convert).await;

        assert_eq!(state.artifact_id, "kept");
        assert_eq!(state.error, "Convert failed: 401");
        assert_eq!(server.received_requests().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn download_navigates_to_token_url() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/engine/export-token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"token": "tok1"})))
            .expect(1)
            .mount(&server)
            .await;

        let client = EngineClient::new(&ClientConfig::new(server.uri(), None)).unwrap();
        let nav = RecordingNavigator::default();
        let mut state = SessionState::default();
        state.artifact = Some(serde_json::from_value(json!({"id": "abc123"})).unwrap());

        run(&client, &nav, &mut state, ActionKind::Download).await;

        let expected = format!("{}/engine/download/tok1", server.uri());
        assert_eq!(*nav.visited.lock().unwrap(), vec![expected.clone()]);
        assert_eq!(state.last_download.as_ref().unwrap().url, expected);
        assert!(!state.busy);
    }

    #[tokio::test]
    async fn failed_token_request_does_not_navigate() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/engine/export-token"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let client = EngineClient::new(&ClientConfig::new(server.uri(), None)).unwrap();
        let nav = RecordingNavigator::default();
        let mut state = SessionState::default();
        state.artifact = Some(serde_json::from_value(json!({"id": "gone"})).unwrap());

        run(&client, &nav, &mut state, ActionKind::Download).await;

        assert!(nav.visited.lock().unwrap().is_empty());
        assert!(state.last_download.is_none());
        assert_eq!(state.error, "Token failed: 404");
    }

    #[tokio::test]
    async fn unreachable_engine_reports_transport_error() {
        // Nothing listens on port 9 on test hosts.
        let client = EngineClient::new(&ClientConfig::new("http://127.0.0.1:9", None)).unwrap();
        let nav = RecordingNavigator::default();
        let mut state = SessionState::default();

        run(&client, &nav, &mut state, ActionKind::Startup).await;

        assert!(!state.connection.reachable);
        assert!(state.error.starts_with("Health failed"));
    }
}
