//! Integration tests for the Freesound HTTP stack.
//!
//! Runs the Harvester built from an `EngineConfig` against a wiremock
//! server standing in for the provider API.

use soundgrab_core::auth::AuthCodeSource;
use soundgrab_core::{
    AuthError, AuthToken, ClientCredentials, DownloadStatus, EngineConfig, Harvester,
    OAuthClient, Query, TracingReporter,
};
use serde_json::json;
use tempfile::TempDir;
use url::Url;
use wiremock::matchers::{header, method, path, path_regex, query_param, query_param_is_missing};
use wiremock::{Mock, MockServer, ResponseTemplate};

mod support;
use support::socket_guard::{socket_skip_return, start_mock_server_or_skip};

macro_rules! require_mock_server {
    () => {{
        let Some(mock_server) = start_mock_server_or_skip().await else {
            return socket_skip_return();
        };
        mock_server
    }};
}

const AUDIO: &[u8] = b"RIFF\x24\x00\x00\x00WAVEfmt ";

fn sound(id: u64) -> serde_json::Value {
    json!({
        "id": id,
        "name": format!("Thunder {id}.wav"),
        "type": "wav",
        "pack": "https://freesound.org/apiv2/packs/77/",
        "avg_rating": 4.5,
        "tags": ["thunder", "storm"]
    })
}

fn config_for(server: &MockServer) -> EngineConfig {
    EngineConfig {
        api_base: format!("{}/apiv2/", server.uri()),
        ..EngineConfig::default()
    }
}

/// Mounts a 16-result search over two pages plus the download endpoint.
async fn mount_provider(server: &MockServer, token: &str) {
    let authorization = format!("Bearer {token}");
    let next = format!(
        "{}/apiv2/search/text/?query=thunder&page=2&page_size=15",
        server.uri()
    );

    Mock::given(method("GET"))
        .and(path("/apiv2/search/text/"))
        .and(query_param("query", "thunder"))
        .and(query_param_is_missing("page"))
        .and(header("Authorization", authorization.as_str()))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "count": 16,
            "next": next,
            "previous": null,
            "results": (1..=15).map(sound).collect::<Vec<_>>()
        })))
        .expect(1)
        .mount(server)
        .await;

    Mock::given(method("GET"))
        .and(path("/apiv2/search/text/"))
        .and(query_param("page", "2"))
        .and(header("Authorization", authorization.as_str()))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "count": 16,
            "next": null,
            "results": [sound(16)]
        })))
        .expect(1)
        .mount(server)
        .await;

    Mock::given(method("GET"))
        .and(path_regex(r"^/apiv2/sounds/\d+/download/$"))
        .and(header("Authorization", authorization.as_str()))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(AUDIO.to_vec()))
        .expect(16)
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_harvest_over_http_writes_every_sound() {
    let server = require_mock_server!();
    mount_provider(&server, "tok").await;
    let temp_dir = TempDir::new().unwrap();

    let harvester = Harvester::from_config(&config_for(&server), AuthToken::bearer("tok")).unwrap();
    let report = harvester
        .run(
            Query::new(Some("thunder".to_string()), None),
            temp_dir.path(),
            &mut TracingReporter,
        )
        .await
        .unwrap();

    assert_eq!(report.total_count, 16);
    assert_eq!(report.pages_fetched, 2);
    assert_eq!(report.written(), 16);
    for id in 1..=16 {
        let file = temp_dir.path().join(format!("Thunder_{id}___{id}.wav"));
        assert_eq!(std::fs::read(&file).unwrap(), AUDIO, "{}", file.display());
    }
}

#[tokio::test]
async fn test_rerun_over_http_downloads_nothing() {
    let server = require_mock_server!();
    let temp_dir = TempDir::new().unwrap();
    for id in 1..=16 {
        std::fs::write(
            temp_dir.path().join(format!("Thunder_{id}___{id}.wav")),
            b"existing",
        )
        .unwrap();
    }

    let next = format!("{}/apiv2/search/text/?page=2", server.uri());
    Mock::given(method("GET"))
        .and(path("/apiv2/search/text/"))
        .and(query_param_is_missing("page"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "count": 16,
            "next": next,
            "results": (1..=15).map(sound).collect::<Vec<_>>()
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/apiv2/search/text/"))
        .and(query_param("page", "2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "count": 16,
            "next": null,
            "results": [sound(16)]
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path_regex(r"^/apiv2/sounds/\d+/download/$"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(AUDIO.to_vec()))
        .expect(0)
        .mount(&server)
        .await;

    let harvester = Harvester::from_config(&config_for(&server), AuthToken::bearer("tok")).unwrap();
    let report = harvester
        .run(
            Query::new(Some("thunder".to_string()), None),
            temp_dir.path(),
            &mut TracingReporter,
        )
        .await
        .unwrap();

    assert_eq!(report.skipped(), 16);
    assert!(
        report
            .outcomes
            .iter()
            .all(|o| o.status == DownloadStatus::SkippedExisting)
    );
    assert_eq!(
        std::fs::read(temp_dir.path().join("Thunder_1___1.wav")).unwrap(),
        b"existing"
    );
}

#[tokio::test]
async fn test_rejected_token_is_fatal() {
    let server = require_mock_server!();
    Mock::given(method("GET"))
        .and(path("/apiv2/search/text/"))
        .respond_with(ResponseTemplate::new(401).set_body_string("{\"detail\": \"Invalid token\"}"))
        .expect(1)
        .mount(&server)
        .await;
    let temp_dir = TempDir::new().unwrap();

    let harvester =
        Harvester::from_config(&config_for(&server), AuthToken::bearer("stale")).unwrap();
    let err = harvester
        .run(
            Query::new(Some("thunder".to_string()), None),
            temp_dir.path(),
            &mut TracingReporter,
        )
        .await
        .unwrap_err();

    assert!(err.is_auth_rejection());
}

struct PastedCode;

impl AuthCodeSource for PastedCode {
    fn obtain_auth_code(&self, authorize_url: &Url) -> Result<String, AuthError> {
        let client_id = authorize_url
            .query_pairs()
            .find(|(key, _)| key == "client_id")
            .map(|(_, value)| value.into_owned());
        if client_id.as_deref() == Some("app-id") {
            Ok("pasted-code".to_string())
        } else {
            Err(AuthError::code_source("authorize URL lacks client_id"))
        }
    }
}

#[tokio::test]
async fn test_oauth_token_drives_the_harvest() {
    let server = require_mock_server!();
    Mock::given(method("POST"))
        .and(path("/apiv2/oauth2/access_token/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "granted",
            "token_type": "Bearer",
            "expires_in": 86399
        })))
        .expect(1)
        .mount(&server)
        .await;
    mount_provider(&server, "granted").await;
    let temp_dir = TempDir::new().unwrap();

    let config = EngineConfig {
        credentials: Some(ClientCredentials {
            client_id: "app-id".to_string(),
            client_secret: "app-secret".to_string(),
        }),
        ..config_for(&server)
    };
    let credentials = config.credentials.clone().unwrap();
    let token = OAuthClient::with_base_url(&config.api_base, credentials)
        .unwrap()
        .authenticate(&PastedCode)
        .await
        .unwrap();
    assert_eq!(token, AuthToken::bearer("granted"));

    let report = Harvester::from_config(&config, token)
        .unwrap()
        .run(
            Query::new(Some("thunder".to_string()), None),
            temp_dir.path(),
            &mut TracingReporter,
        )
        .await
        .unwrap();
    assert_eq!(report.written(), 16);
}
