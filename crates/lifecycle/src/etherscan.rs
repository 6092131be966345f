//! Etherscan-compatible verification API.
//!
//! Submits solc standard-JSON input with `verifysourcecode`, then polls `checkverifystatus` until
//! the service reaches a verdict.

use std::time::Duration;

use alloy_core::primitives::hex;
use anyhow::{Context, Result};
use backon::{ConstantBuilder, Retryable};
use serde::Deserialize;
use url::Url;

use crate::{
    artifacts::ArtifactStore,
    rpc::create_client,
    verify::{VerificationOutcome, VerificationRequest, Verifier},
};

/// Etherscan's multichain endpoint.
pub const DEFAULT_ETHERSCAN_API_URL: &str = "https://api.etherscan.io/v2/api";

pub(crate) const DEFAULT_STATUS_POLL_INTERVAL: Duration = Duration::from_secs(5);
pub(crate) const DEFAULT_STATUS_MAX_POLLS: usize = 24;

/// Envelope shared by every Etherscan API response.
#[derive(Debug, Clone, Deserialize)]
struct ApiResponse {
    status: String,
    #[serde(default)]
    message: String,
    result: String,
}

impl ApiResponse {
    fn is_ok(&self) -> bool {
        self.status == "1"
    }
}

/// The service reports "already verified" only in free text; recognise it here so nothing above
/// this adapter has to.
fn is_already_verified(text: &str) -> bool {
    text.to_ascii_lowercase().contains("already verified")
}

/// Interpretation of a `verifysourcecode` response.
#[derive(Debug, PartialEq, Eq)]
enum Submission {
    Accepted { guid: String },
    Done(VerificationOutcome),
}

fn classify_submission(response: ApiResponse) -> Submission {
    if response.is_ok() {
        Submission::Accepted {
            guid: response.result,
        }
    } else if is_already_verified(&response.result) {
        Submission::Done(VerificationOutcome::AlreadyVerified)
    } else {
        Submission::Done(VerificationOutcome::Failed(format!(
            "{}: {}",
            response.message, response.result
        )))
    }
}

/// Interpretation of a `checkverifystatus` response; `None` while still queued.
fn classify_status(response: &ApiResponse) -> Option<VerificationOutcome> {
    let result = response.result.to_ascii_lowercase();
    if result.contains("pending") || result.contains("in queue") {
        None
    } else if is_already_verified(&result) {
        Some(VerificationOutcome::AlreadyVerified)
    } else if response.is_ok() || result.contains("pass - verified") {
        Some(VerificationOutcome::Verified)
    } else {
        Some(VerificationOutcome::Failed(response.result.clone()))
    }
}

/// [`Verifier`] backed by an Etherscan-compatible explorer.
#[derive(Debug, Clone)]
pub struct EtherscanVerifier {
    client: reqwest::Client,
    /// Parsed on use, so a bad URL only affects verification.
    api_url: String,
    api_key: Option<String>,
    chain_id: Option<u64>,
    artifacts: ArtifactStore,
    poll_interval: Duration,
    max_polls: usize,
}

impl EtherscanVerifier {
    pub fn new(
        api_url: impl Into<String>,
        api_key: Option<String>,
        artifacts: ArtifactStore,
    ) -> Result<Self> {
        Ok(Self {
            client: create_client()?,
            api_url: api_url.into(),
            api_key,
            chain_id: None,
            artifacts,
            poll_interval: DEFAULT_STATUS_POLL_INTERVAL,
            max_polls: DEFAULT_STATUS_MAX_POLLS,
        })
    }

    /// Chain the explorer should look on (required by multichain endpoints).
    pub fn with_chain_id(mut self, chain_id: Option<u64>) -> Self {
        self.chain_id = chain_id;
        self
    }

    pub fn with_polling(mut self, poll_interval: Duration, max_polls: usize) -> Self {
        self.poll_interval = poll_interval;
        self.max_polls = max_polls;
        self
    }

    fn endpoint(&self) -> Result<Url> {
        let mut url = Url::parse(&self.api_url)
            .with_context(|| format!("Invalid verifier API URL: {}", self.api_url))?;
        if let Some(chain_id) = self.chain_id {
            url.query_pairs_mut()
                .append_pair("chainid", &chain_id.to_string());
        }
        Ok(url)
    }

    async fn submit(&self, request: &VerificationRequest) -> Result<VerificationOutcome> {
        let endpoint = self.endpoint()?;
        let api_key = self
            .api_key
            .as_deref()
            .context("No verifier API key configured")?;

        let artifact = self.artifacts.load(&request.contract_name)?;
        let input = artifact
            .standard_json_input
            .as_ref()
            .context("Artifact carries no standard-JSON input")?;
        let compiler_version = artifact
            .compiler_version
            .as_deref()
            .context("Artifact carries no compiler version")?;
        let contract_path = request
            .contract_path
            .clone()
            .or_else(|| artifact.contract_path())
            .context("Contract path unknown: pass it explicitly or add sourceName to the artifact")?;

        let form = [
            ("apikey", api_key.to_string()),
            ("module", "contract".to_string()),
            ("action", "verifysourcecode".to_string()),
            ("contractaddress", request.address.to_string()),
            ("sourceCode", input.to_string()),
            ("codeformat", "solidity-standard-json-input".to_string()),
            ("contractname", contract_path),
            ("compilerversion", compiler_version.to_string()),
            (
                "constructorArguements",
                hex::encode(artifact.encode_constructor_args(&request.constructor_args)?),
            ),
        ];

        let response: ApiResponse = self
            .client
            .post(endpoint.clone())
            .form(&form)
            .send()
            .await
            .map_err(reqwest::Error::without_url)
            .context("Failed to submit verification")?
            .json()
            .await
            .map_err(reqwest::Error::without_url)
            .context("Failed to parse verification response")?;

        match classify_submission(response) {
            Submission::Done(outcome) => Ok(outcome),
            Submission::Accepted { guid } => {
                tracing::debug!(guid = %guid, "Verification submitted, polling status");
                self.poll_status(&endpoint, api_key, &guid).await
            }
        }
    }

    async fn poll_status(
        &self,
        endpoint: &Url,
        api_key: &str,
        guid: &str,
    ) -> Result<VerificationOutcome> {
        let check = move || async move {
            let response: ApiResponse = self
                .client
                .get(endpoint.clone())
                .query(&[
                    ("apikey", api_key),
                    ("module", "contract"),
                    ("action", "checkverifystatus"),
                    ("guid", guid),
                ])
                .send()
                .await
                .map_err(reqwest::Error::without_url)
                .context("Failed to check verification status")?
                .json()
                .await
                .map_err(reqwest::Error::without_url)
                .context("Failed to parse verification status")?;

            classify_status(&response).context("Verification still pending")
        };

        check
            .retry(
                ConstantBuilder::default()
                    .with_delay(self.poll_interval)
                    .with_max_times(self.max_polls),
            )
            .sleep(tokio::time::sleep)
            .notify(|err: &anyhow::Error, _| {
                tracing::trace!(guid = %guid, error = %err, "Polling verification status...");
            })
            .await
    }
}

impl Verifier for EtherscanVerifier {
    async fn submit_verification(&self, request: &VerificationRequest) -> VerificationOutcome {
        match self.submit(request).await {
            Ok(outcome) => outcome,
            Err(err) => VerificationOutcome::Failed(format!("{:#}", err)),
        }
    }
}
