//! `ResourceClient` over the upstream patient API.
//!
//! Endpoints, relative to `api.base_url`:
//!
//! | Operation                  | Request                                |
//! |----------------------------|----------------------------------------|
//! | `list_patient_identities`  | `GET  /identities?role=Patient`        |
//! | `get_vitals`               | `GET  /{id}/vitals`                    |
//! | `get_labs`                 | `GET  /{id}/labs`                      |
//! | `get_consultations`        | `GET  /{id}/consultations`             |
//! | `get_eligibility`          | `GET  /{id}/eligibility`               |
//! | `submit_consultation`      | `POST /{id}/consultations`             |
//!
//! No retries happen here; the assembler owns the retry policy.

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response, Url};
use serde::de::DeserializeOwned;
use tracing::debug;

use caseflow_contracts::{
    case::ResourceKind,
    consultation::Consultation,
    error::{CaseflowError, CaseflowResult},
    patient::{EligibilityVerdict, LabResult, PatientId, PatientIdentity, VitalsRecord},
};
use caseflow_core::{config::ApiConfig, traits::ResourceClient};

const IDENTITIES: &str = "identities";

#[derive(Debug, Clone)]
pub struct HttpResourceClient {
    http: Client,
    base_url: Url,
    bearer: Option<String>,
}

impl HttpResourceClient {
    /// Build a client for `config.base_url`.
    ///
    /// Returns `ConfigError` if the URL does not parse, is not `http`/`https`,
    /// or cannot carry path segments.
    pub fn new(config: &ApiConfig, bearer: Option<String>) -> CaseflowResult<Self> {
        let cleaned = config.base_url.trim().trim_end_matches('/');
        let base_url = Url::parse(cleaned).map_err(|e| CaseflowError::ConfigError {
            reason: format!("invalid api.base_url '{}': {}", cleaned, e),
        })?;

        if !matches!(base_url.scheme(), "http" | "https") {
            return Err(CaseflowError::ConfigError {
                reason: format!("api.base_url must use http or https, got: {}", base_url.scheme()),
            });
        }
        if base_url.cannot_be_a_base() {
            return Err(CaseflowError::ConfigError {
                reason: format!("api.base_url '{}' cannot carry a path", cleaned),
            });
        }

        let http = Client::builder()
            .timeout(config.timeout())
            .build()
            .map_err(|e| CaseflowError::ConfigError {
                reason: format!("failed to build HTTP client: {}", e),
            })?;

        Ok(Self {
            http,
            base_url,
            bearer: bearer.filter(|token| !token.trim().is_empty()),
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// `base_url` with `segments` appended, each percent-encoded.
    pub(crate) fn endpoint(&self, segments: &[&str]) -> Url {
        let mut url = self.base_url.clone();
        // Checked in `new`: an http(s) base always accepts segments.
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.bearer {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    async fn get_json<T: DeserializeOwned>(&self, resource: &str, url: Url) -> CaseflowResult<T> {
        debug!(resource, url = %url, "GET");
        let response = self
            .authorized(self.http.get(url))
            .send()
            .await
            .map_err(|e| request_failed(resource, e))?;
        let response = check_status(resource, response).await?;
        response.json::<T>().await.map_err(|e| CaseflowError::Transport {
            resource: resource.to_string(),
            status: None,
            reason: format!("response body could not be decoded: {}", e),
        })
    }

    async fn get_resource<T: DeserializeOwned>(&self, id: &PatientId, kind: ResourceKind) -> CaseflowResult<T> {
        self.get_json(kind.as_str(), self.endpoint(&[id.as_str(), kind.as_str()]))
            .await
    }
}

fn request_failed(resource: &str, e: reqwest::Error) -> CaseflowError {
    let reason = if e.is_timeout() {
        format!("request timed out: {}", e)
    } else if e.is_connect() {
        format!("connection failed: {}", e)
    } else {
        e.to_string()
    };
    CaseflowError::Transport {
        resource: resource.to_string(),
        status: e.status().map(|s| s.as_u16()),
        reason,
    }
}

async fn check_status(resource: &str, response: Response) -> CaseflowResult<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    let reason = match body.trim() {
        "" => status.canonical_reason().unwrap_or("request failed").to_string(),
        text => text.chars().take(200).collect(),
    };
    Err(CaseflowError::Transport {
        resource: resource.to_string(),
        status: Some(status.as_u16()),
        reason,
    })
}

#[async_trait]
impl ResourceClient for HttpResourceClient {
    async fn list_patient_identities(&self) -> CaseflowResult<Vec<PatientIdentity>> {
        let mut url = self.endpoint(&[IDENTITIES]);
        url.query_pairs_mut().append_pair("role", "Patient");
        self.get_json(IDENTITIES, url).await
    }

    async fn get_vitals(&self, id: &PatientId) -> CaseflowResult<VitalsRecord> {
        self.get_resource(id, ResourceKind::Vitals).await
    }

    async fn get_labs(&self, id: &PatientId) -> CaseflowResult<LabResult> {
        self.get_resource(id, ResourceKind::Labs).await
    }

    async fn get_consultations(&self, id: &PatientId) -> CaseflowResult<Vec<Consultation>> {
        self.get_resource(id, ResourceKind::Consultations).await
    }

    async fn get_eligibility(&self, id: &PatientId) -> CaseflowResult<EligibilityVerdict> {
        self.get_resource(id, ResourceKind::Eligibility).await
    }

    async fn submit_consultation(&self, id: &PatientId, payload: &Consultation) -> CaseflowResult<()> {
        let resource = ResourceKind::Consultations.as_str();
        let url = self.endpoint(&[id.as_str(), resource]);
        debug!(resource, url = %url, patient_id = %id, "POST");
        let response = self
            .authorized(self.http.post(url).json(payload))
            .send()
            .await
            .map_err(|e| request_failed(resource, e))?;
        check_status(resource, response).await?;
        Ok(())
    }
}
