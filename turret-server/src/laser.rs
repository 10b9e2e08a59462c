//! Laser Actuator (C12): a tiny async HTTP client for the three idempotent
//! GET routes of §6. Promoted `reqwest` from the teacher's build/dev
//! dependency tiers to a normal runtime dependency, since this is the one
//! place the spec needs an HTTP client at runtime (see DESIGN.md).

use std::time::Duration;

use serde::Deserialize;

#[derive(Debug, thiserror::Error)]
pub enum LaserError {
    #[error("laser endpoint request failed: {0}")]
    Request(String),
    #[error("laser endpoint returned an unrecognized status body: {0}")]
    UnrecognizedState(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LaserState {
    On,
    Off,
}

#[derive(Deserialize)]
struct StatusResponse {
    state: String,
}

/// Client for the laser's `/on`, `/off`, `/status` endpoints. Any transport
/// failure is reported but does not itself change turret mode (§4.12); the
/// safety state machine retries `off()` on its own next transition.
#[derive(Clone)]
pub struct LaserActuator {
    client: reqwest::Client,
    base_url: String,
}

impl LaserActuator {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Self {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .expect("reqwest client builder should not fail with no custom TLS config");
        LaserActuator {
            client,
            base_url: base_url.into(),
        }
    }

    pub async fn on(&self) -> Result<(), LaserError> {
        self.get("/on").await.map(|_| ())
    }

    pub async fn off(&self) -> Result<(), LaserError> {
        self.get("/off").await.map(|_| ())
    }

    pub async fn status(&self) -> Result<LaserState, LaserError> {
        let body = self.get("/status").await?;
        let parsed: StatusResponse =
            serde_json::from_str(&body).map_err(|e| LaserError::UnrecognizedState(e.to_string()))?;
        match parsed.state.as_str() {
            "HIGH" => Ok(LaserState::On),
            "LOW" => Ok(LaserState::Off),
            other => Err(LaserError::UnrecognizedState(other.to_string())),
        }
    }

    async fn get(&self, path: &str) -> Result<String, LaserError> {
        let url = format!("{}{}", self.base_url, path);
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| LaserError::Request(e.to_string()))?;
        response
            .text()
            .await
            .map_err(|e| LaserError::Request(e.to_string()))
    }
}
