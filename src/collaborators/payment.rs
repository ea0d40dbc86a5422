use super::CollaboratorError;
use async_trait::async_trait;
use bigdecimal::BigDecimal;
use rand::Rng;
use tracing::log::{info, warn};
use uuid::Uuid;

pub const METHOD_CARD: &str = "card";
pub const METHOD_WALLET: &str = "wallet";

#[derive(Debug, Clone)]
pub struct ChargeRequest {
    pub amount: BigDecimal,
    pub method: String,
    pub reference: String,
}

/// A declined charge is a legitimate, retryable business outcome reported
/// back to the caller; only transport/gateway trouble is an error.
#[derive(Debug, Clone)]
pub enum ChargeOutcome {
    Approved { receipt: String },
    Declined { reason: String },
}

#[async_trait]
pub trait PaymentGateway: Send + Sync {
    async fn charge(&self, request: ChargeRequest) -> Result<ChargeOutcome, CollaboratorError>;
}

/// Stand-in gateway: `card` settles deterministically, `wallet` goes through
/// a provider that declines a configurable fraction of charges at random.
pub struct SimulatedPaymentGateway {
    wallet_decline_rate: f64,
}

impl SimulatedPaymentGateway {
    pub fn new(wallet_decline_rate: f64) -> Self {
        SimulatedPaymentGateway {
            wallet_decline_rate: wallet_decline_rate.clamp(0.0, 1.0),
        }
    }
}

#[async_trait]
impl PaymentGateway for SimulatedPaymentGateway {
    async fn charge(&self, request: ChargeRequest) -> Result<ChargeOutcome, CollaboratorError> {
        if request.amount <= BigDecimal::from(0) {
            return Err(CollaboratorError(format!(
                "charge amount must be positive, got {}",
                request.amount
            )));
        }

        match request.method.as_str() {
            METHOD_CARD => {
                let receipt = Uuid::new_v4().to_string();
                info!(
                    "Simulated card charge of {} approved, receipt {}",
                    request.amount, receipt
                );
                Ok(ChargeOutcome::Approved { receipt })
            }
            METHOD_WALLET => {
                if rand::rng().random_bool(self.wallet_decline_rate) {
                    warn!(
                        "Simulated wallet provider declined charge of {} (reference {})",
                        request.amount, request.reference
                    );
                    Ok(ChargeOutcome::Declined {
                        reason: "wallet provider declined the charge".to_string(),
                    })
                } else {
                    let receipt = Uuid::new_v4().to_string();
                    info!(
                        "Simulated wallet charge of {} approved, receipt {}",
                        request.amount, receipt
                    );
                    Ok(ChargeOutcome::Approved { receipt })
                }
            }
            other => Err(CollaboratorError(format!(
                "unsupported payment method '{other}'"
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn card_charges_always_settle() {
        let gateway = SimulatedPaymentGateway::new(1.0);
        let outcome = gateway
            .charge(ChargeRequest {
                amount: BigDecimal::from(10),
                method: METHOD_CARD.to_string(),
                reference: "ref".to_string(),
            })
            .await
            .expect("card charge should not error");
        assert!(matches!(outcome, ChargeOutcome::Approved { .. }));
    }

    #[tokio::test]
    async fn wallet_declines_at_full_rate() {
        let gateway = SimulatedPaymentGateway::new(1.0);
        let outcome = gateway
            .charge(ChargeRequest {
                amount: BigDecimal::from(10),
                method: METHOD_WALLET.to_string(),
                reference: "ref".to_string(),
            })
            .await
            .expect("wallet charge should not error");
        assert!(matches!(outcome, ChargeOutcome::Declined { .. }));
    }

    #[tokio::test]
    async fn non_positive_amounts_are_rejected() {
        let gateway = SimulatedPaymentGateway::new(0.0);
        let result = gateway
            .charge(ChargeRequest {
                amount: BigDecimal::from(0),
                method: METHOD_CARD.to_string(),
                reference: "ref".to_string(),
            })
            .await;
        assert!(result.is_err());
    }

    #[test]
    fn decline_rate_is_clamped() {
        // out-of-range rates must not panic random_bool
        let gateway = SimulatedPaymentGateway::new(7.5);
        assert!(rand::rng().random_bool(gateway.wallet_decline_rate));
    }
}
