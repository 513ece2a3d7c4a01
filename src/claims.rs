// 📜 Land Claims Client - one POST per band, empty on any failure
//
// Pages render with or without claims data, so `lookup` never returns an
// error: a non-success status, a transport failure after one retry, or an
// undecodable body all yield an empty list and a warning.

use crate::error::{BudgetError, Result};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;

pub const CLAIMS_TIMEOUT: Duration = Duration::from_secs(10);

/// One claim as returned by the claims service; unknown fields are kept
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClaimRecord {
    #[serde(default)]
    pub claim_id: Option<String>,
    #[serde(default)]
    pub claim_name: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub band_number: Option<serde_json::Value>,
    #[serde(flatten)]
    pub extra: HashMap<String, serde_json::Value>,
}

#[derive(Debug, Serialize)]
struct ClaimsRequest<'a> {
    band_number: &'a str,
}

pub struct ClaimsClient {
    client: Client,
    endpoint: String,
}

impl ClaimsClient {
    pub fn new(endpoint: impl Into<String>) -> Result<Self> {
        Self::with_timeout(endpoint, CLAIMS_TIMEOUT)
    }

    /// Client whose attempts each give up after `timeout`
    pub fn with_timeout(endpoint: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| BudgetError::Config(format!("claims client: {}", e)))?;

        Ok(ClaimsClient {
            client,
            endpoint: endpoint.into(),
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Claims for a band, or an empty list when the service cannot answer
    pub async fn lookup(&self, band: &str) -> Vec<ClaimRecord> {
        let request = ClaimsRequest { band_number: band };

        let mut attempt = 0;
        let response = loop {
            attempt += 1;
            match self.client.post(&self.endpoint).json(&request).send().await {
                Ok(response) => break response,
                Err(e) if attempt < 2 => {
                    tracing::debug!("Claims request for band {} failed, retrying: {}", band, e);
                }
                Err(e) => {
                    tracing::warn!("Claims lookup for band {} failed: {}", band, e);
                    return Vec::new();
                }
            }
        };

        let status = response.status();
        if !status.is_success() {
            tracing::warn!("Claims service returned {} for band {}", status, band);
            return Vec::new();
        }

        match response.json::<Vec<ClaimRecord>>().await {
            Ok(claims) => {
                tracing::debug!("Claims for band {}: {}", band, claims.len());
                claims
            }
            Err(e) => {
                tracing::warn!("Undecodable claims response for band {}: {}", band, e);
                Vec::new()
            }
        }
    }
}
