//! Source verification against an external explorer service.

use std::future::Future;

use alloy_core::primitives::Address;

use crate::record::ConstructorArg;

/// What a verification service said about a submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VerificationOutcome {
    Verified,
    /// The service already has matching source for this address.
    AlreadyVerified,
    Failed(String),
}

impl VerificationOutcome {
    /// Already-verified counts as success, so repeated submissions are harmless.
    pub fn is_verified(&self) -> bool {
        matches!(self, Self::Verified | Self::AlreadyVerified)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerificationRequest {
    pub contract_name: String,
    pub address: Address,
    pub constructor_args: Vec<ConstructorArg>,
    /// Fully qualified `<source>:<name>`; the artifact's path is used when absent.
    pub contract_path: Option<String>,
}

/// An external verification service.
///
/// Implementations translate every service response into a [`VerificationOutcome`]; they never
/// return transport errors to the caller.
pub trait Verifier: Send + Sync {
    fn submit_verification(
        &self,
        request: &VerificationRequest,
    ) -> impl Future<Output = VerificationOutcome> + Send;
}

/// Submits verifications once and reports the result. No retries: an unverified contract is left
/// for the operator to re-submit.
pub struct VerificationClient<'a, V> {
    verifier: &'a V,
}

impl<'a, V: Verifier> VerificationClient<'a, V> {
    pub fn new(verifier: &'a V) -> Self {
        Self { verifier }
    }

    /// Returns whether the contract is now verified. Failures are logged, never raised.
    pub async fn verify(&self, request: &VerificationRequest) -> bool {
        tracing::info!(
            contract = %request.contract_name,
            address = %request.address,
            "Verifying contract..."
        );

        let outcome = self.verifier.submit_verification(request).await;
        match &outcome {
            VerificationOutcome::Verified => {
                tracing::info!(address = %request.address, "Contract verified");
            }
            VerificationOutcome::AlreadyVerified => {
                tracing::info!(address = %request.address, "Contract is already verified");
            }
            VerificationOutcome::Failed(reason) => {
                tracing::error!(
                    contract = %request.contract_name,
                    address = %request.address,
                    reason = %reason,
                    "Verification failed"
                );
            }
        }
        outcome.is_verified()
    }
}
