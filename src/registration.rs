//! The registration boundary: hands the finished record batch to a PID service and gets
//! back the mapping from local ids to assigned persistent identifiers.

use std::collections::BTreeMap;
use std::time::Duration;

use serde_json::{Value, json};
use thiserror::Error;
use tracing::{debug, info};

use crate::config::RegistrationConfig;
use crate::core::record::WireRecord;

#[derive(Debug, Error)]
pub enum RegistrationError {
    #[error("registration request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("registration service answered {status}: {body}")]
    Status { status: u16, body: String },
    #[error("unexpected registration response: {0}")]
    Decode(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct RegistrationResponse {
    /// local id -> persistent id, when the service sent one.
    pub mapping: Option<BTreeMap<String, String>>,
    /// The full response body.
    pub raw: Value,
}

impl RegistrationResponse {
    pub fn from_raw(raw: Value) -> Self {
        let mapping = raw.get("mapping").and_then(Value::as_object).map(|m| {
            m.iter()
                .filter_map(|(local, pid)| pid.as_str().map(|p| (local.clone(), p.to_string())))
                .collect()
        });
        Self { mapping, raw }
    }
}

pub trait Registrar {
    fn register(&self, batch: &[WireRecord]) -> Result<RegistrationResponse, RegistrationError>;
}

/// Talks to a Typed PID Maker instance over HTTP.
pub struct HttpRegistrar {
    client: reqwest::blocking::Client,
    endpoint: String,
    dryrun: bool,
}

impl HttpRegistrar {
    pub fn new(config: &RegistrationConfig) -> Result<Self, RegistrationError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self {
            client,
            endpoint: format!("{}/api/v1/pit/pids", config.host.trim_end_matches('/')),
            dryrun: config.dryrun,
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

impl Registrar for HttpRegistrar {
    fn register(&self, batch: &[WireRecord]) -> Result<RegistrationResponse, RegistrationError> {
        info!(endpoint = %self.endpoint, records = batch.len(), dryrun = self.dryrun, "sending record graph");
        let response = self
            .client
            .post(&self.endpoint)
            .query(&[("dryrun", self.dryrun)])
            .json(batch)
            .send()?;

        let status = response.status();
        let body = response.text()?;
        if !status.is_success() {
            return Err(RegistrationError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let raw: Value = serde_json::from_str(&body).map_err(|e| RegistrationError::Decode(e.to_string()))?;
        debug!("registration response received");
        Ok(RegistrationResponse::from_raw(raw))
    }
}

/// Registers nothing: every record keeps its provisional pid.
#[derive(Debug, Clone, Copy, Default)]
pub struct OfflineRegistrar;

impl Registrar for OfflineRegistrar {
    fn register(&self, batch: &[WireRecord]) -> Result<RegistrationResponse, RegistrationError> {
        let mapping: BTreeMap<String, String> = batch
            .iter()
            .map(|r| (r.pid.clone(), r.pid.clone()))
            .collect();
        let raw = json!({
            "pidRecords": batch,
            "mapping": mapping,
        });
        Ok(RegistrationResponse {
            mapping: Some(mapping),
            raw,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::record::PidRecord;
    use wiremock::matchers::{body_json, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn mk_batch() -> Vec<WireRecord> {
        let mut r = PidRecord::new();
        r.set_id("local-1").add_attribute("license", "Apache 2.0");
        vec![r.serialize()]
    }

    //the blocking client must not run on an async worker
    async fn register_on_blocking_thread(
        host: String,
        dryrun: bool,
    ) -> Result<RegistrationResponse, RegistrationError> {
        tokio::task::spawn_blocking(move || {
            let config = RegistrationConfig {
                host,
                dryrun,
                ..RegistrationConfig::default()
            };
            HttpRegistrar::new(&config)?.register(&mk_batch())
        })
        .await
        .unwrap()
    }

    #[test]
    fn mapping_is_read_from_response() {
        let resp = RegistrationResponse::from_raw(json!({
            "pidRecords": [],
            "mapping": {"local-1": "21.T11148/aaa", "local-2": "21.T11148/bbb", "odd": 3}
        }));
        let mapping = resp.mapping.unwrap();
        assert_eq!(mapping.len(), 2);
        assert_eq!(mapping["local-1"], "21.T11148/aaa");
    }

    #[test]
    fn response_without_mapping() {
        let resp = RegistrationResponse::from_raw(json!({"pidRecords": []}));
        assert!(resp.mapping.is_none());
    }

    #[test]
    fn offline_registrar_maps_records_to_themselves() {
        let mut a = PidRecord::new();
        a.set_id("a");
        let mut b = PidRecord::new();
        b.set_id("b").set_persistent_id("21.T11148/b");

        let resp = OfflineRegistrar.register(&[a.serialize(), b.serialize()]).unwrap();
        let mapping = resp.mapping.unwrap();
        assert_eq!(mapping["a"], "a");
        assert_eq!(mapping["21.T11148/b"], "21.T11148/b");
        assert_eq!(resp.raw["pidRecords"].as_array().unwrap().len(), 2);
    }

    #[test]
    fn endpoint_is_built_from_host() {
        let config = RegistrationConfig {
            host: "http://localhost:8090/".into(),
            ..RegistrationConfig::default()
        };
        let registrar = HttpRegistrar::new(&config).unwrap();
        assert_eq!(registrar.endpoint(), "http://localhost:8090/api/v1/pit/pids");
    }

    #[tokio::test]
    async fn http_registrar_posts_batch_and_reads_mapping() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/v1/pit/pids"))
            .and(query_param("dryrun", "true"))
            .and(body_json(json!([
                {"record": [{"key": "license", "value": "Apache 2.0"}], "pid": "local-1"}
            ])))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "pidRecords": [],
                "mapping": {"local-1": "21.T11148/aaa"}
            })))
            .expect(1)
            .mount(&server)
            .await;

        let resp = register_on_blocking_thread(server.uri(), true).await.unwrap();
        let mapping = resp.mapping.unwrap();
        assert_eq!(mapping.len(), 1);
        assert_eq!(mapping["local-1"], "21.T11148/aaa");
        assert_eq!(resp.raw["pidRecords"], json!([]));
    }

    #[tokio::test]
    async fn http_registrar_sends_dryrun_false_by_default() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/v1/pit/pids"))
            .and(query_param("dryrun", "false"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"pidRecords": []})))
            .expect(1)
            .mount(&server)
            .await;

        let resp = register_on_blocking_thread(server.uri(), false).await.unwrap();
        assert!(resp.mapping.is_none());
    }

    #[tokio::test]
    async fn http_registrar_maps_error_status() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/v1/pit/pids"))
            .respond_with(ResponseTemplate::new(503).set_body_string("down for maintenance"))
            .mount(&server)
            .await;

        let err = register_on_blocking_thread(server.uri(), false).await.unwrap_err();
        match err {
            RegistrationError::Status { status, body } => {
                assert_eq!(status, 503);
                assert_eq!(body, "down for maintenance");
            }
            other => panic!("unexpected error: {}", other),
        }
    }

    #[tokio::test]
    async fn http_registrar_rejects_non_json_body() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/v1/pit/pids"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>ok</html>"))
            .mount(&server)
            .await;

        let err = register_on_blocking_thread(server.uri(), false).await.unwrap_err();
        assert!(matches!(err, RegistrationError::Decode(_)));
    }
}
