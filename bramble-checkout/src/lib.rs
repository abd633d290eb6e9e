pub mod payment;
pub mod trolley;
pub mod workflow;

pub use payment::{MockPaymentGateway, PaymentGateway, PaymentMethod, PaymentOutcome};
pub use trolley::Trolley;
pub use workflow::{
    CheckoutError, CheckoutOutcome, CheckoutWorkflow, Receipt, RemediationDecision, ShortageReport,
};
