use async_trait::async_trait;
use tracing::info;
use uuid::Uuid;

use crate::db::models::BookingIntentRow;
use crate::utils::error::BookingError;

/// Seam for the payment provider. Finalization only ever sees this trait;
/// the concrete provider is wired in at startup.
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Open a payment for the quoted intent total and return an opaque
    /// token the client hands back at finalization.
    async fn initiate_payment(&self, intent: &BookingIntentRow) -> Result<String, BookingError>;

    /// Check whether the payment behind the token has settled.
    async fn verify_payment(&self, token: &str) -> Result<bool, BookingError>;
}

/// In-process gateway for development and tests. Every initiation
/// succeeds; verification fails only for the magic `fail_payment` token.
pub struct MockGateway;

#[async_trait]
impl PaymentGateway for MockGateway {
    async fn initiate_payment(&self, intent: &BookingIntentRow) -> Result<String, BookingError> {
        let token = format!("pay_{}", Uuid::new_v4().simple());
        info!(
            session_id = %intent.session_id,
            total = intent.total_amount,
            %token,
            "Mock payment initiated"
        );
        Ok(token)
    }

    async fn verify_payment(&self, token: &str) -> Result<bool, BookingError> {
        Ok(token != "fail_payment")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn mock_gateway_rejects_the_failure_token() {
        let gateway = MockGateway;
        assert!(gateway.verify_payment("pay_abc123").await.unwrap());
        assert!(!gateway.verify_payment("fail_payment").await.unwrap());
    }
}
