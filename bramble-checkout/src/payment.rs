use async_trait::async_trait;
use bramble_shared::OrderId;
use chrono::Utc;
use rand::Rng;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentMethod {
    CreditCard,
    DebitCard,
    PayPal,
    ApplePay,
    GooglePay,
    CashOnDelivery,
}

impl PaymentMethod {
    pub fn display_name(&self) -> &'static str {
        match self {
            PaymentMethod::CreditCard => "Credit Card",
            PaymentMethod::DebitCard => "Debit Card",
            PaymentMethod::PayPal => "PayPal",
            PaymentMethod::ApplePay => "Apple Pay",
            PaymentMethod::GooglePay => "Google Pay",
            PaymentMethod::CashOnDelivery => "Cash on Delivery",
        }
    }
}

impl std::fmt::Display for PaymentMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.display_name())
    }
}

/// What the gateway reports back. The core treats this as an opaque boolean
/// gate: a clean decline is an outcome, not an error.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentOutcome {
    pub success: bool,
    pub transaction_id: Option<String>,
    pub method: PaymentMethod,
    pub message: String,
}

/// The external payment step.
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Charge `amount` (minor currency units) for an order.
    async fn charge(
        &self,
        order_id: OrderId,
        amount: i64,
        method: PaymentMethod,
    ) -> Result<PaymentOutcome, Box<dyn std::error::Error + Send + Sync>>;
}

/// Gateway stand-in that declines a configurable fraction of charges, like
/// the simulated bank in the desktop client it replaces. Rates of 0.0 and
/// 1.0 make it deterministic for tests.
pub struct MockPaymentGateway {
    decline_rate: f64,
}

impl MockPaymentGateway {
    pub fn new(decline_rate: f64) -> Self {
        Self { decline_rate }
    }
}

#[async_trait]
impl PaymentGateway for MockPaymentGateway {
    async fn charge(
        &self,
        order_id: OrderId,
        amount: i64,
        method: PaymentMethod,
    ) -> Result<PaymentOutcome, Box<dyn std::error::Error + Send + Sync>> {
        let declined = rand::thread_rng().gen::<f64>() < self.decline_rate;
        if declined {
            return Ok(PaymentOutcome {
                success: false,
                transaction_id: None,
                method,
                message: "Payment declined by bank. Please try a different payment method."
                    .to_string(),
            });
        }

        let transaction_id = format!(
            "TXN{}{:03}",
            Utc::now().timestamp_millis(),
            rand::thread_rng().gen_range(0..1000)
        );
        Ok(PaymentOutcome {
            success: true,
            transaction_id: Some(transaction_id.clone()),
            method,
            message: format!(
                "Payment successful for {order_id}: {} via {}",
                crate::trolley::format_price(amount),
                method
            ),
        })
    }
}
