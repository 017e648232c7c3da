//! Card payments.
//!
//! Authorization is simulated against the card's available balance; a card
//! can also carry an issuer decline, which may come without a message.

use thiserror::Error;
use uuid::Uuid;

use forgeerp_observability::{
    Interceptor, InvocationPolicy, Marker, MethodSignature, checked_method_signature,
};

const CHARGE: MethodSignature = checked_method_signature!(PaymentService::charge);
const REFUND: MethodSignature = checked_method_signature!(PaymentService::refund);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Card {
    pub last4: String,
    /// Available balance in smallest currency unit.
    pub available: u64,
    /// Issuer decline text; `Some("")` is a decline without explanation.
    pub issuer_decline: Option<String>,
}

impl Card {
    pub fn new(last4: impl Into<String>, available: u64) -> Self {
        Self {
            last4: last4.into(),
            available,
            issuer_decline: None,
        }
    }

    pub fn declined_by_issuer(mut self, message: impl Into<String>) -> Self {
        self.issuer_decline = Some(message.into());
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Receipt {
    pub id: Uuid,
    pub last4: String,
    pub amount: u64,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PaymentError {
    /// Issuer or balance decline; the text is passed through verbatim.
    #[error("{0}")]
    Declined(String),

    #[error("amount must be positive")]
    InvalidAmount,

    #[error("receipt {0} was already refunded")]
    AlreadyRefunded(Uuid),
}

#[derive(Debug, Clone)]
pub struct PaymentService {
    charge: Interceptor,
    refund: Interceptor,
}

impl PaymentService {
    pub fn new(policy: &InvocationPolicy) -> Self {
        Self {
            charge: policy.register(CHARGE, Marker::Loggable),
            refund: policy.register(REFUND, Marker::Loggable),
        }
    }

    pub fn charge(&self, card: &Card, amount: u64) -> Result<Receipt, PaymentError> {
        self.charge.invoke(|| {
            if amount == 0 {
                return Err(PaymentError::InvalidAmount);
            }
            if let Some(message) = &card.issuer_decline {
                return Err(PaymentError::Declined(message.clone()));
            }
            if amount > card.available {
                return Err(PaymentError::Declined("insufficient funds".to_string()));
            }
            Ok(Receipt {
                id: Uuid::now_v7(),
                last4: card.last4.clone(),
                amount,
            })
        })
    }

    /// Refund a receipt. `refunded` lists receipts already refunded.
    pub async fn refund(&self, receipt: &Receipt, refunded: &[Uuid]) -> Result<u64, PaymentError> {
        self.refund
            .invoke_async(async {
                if refunded.contains(&receipt.id) {
                    return Err(PaymentError::AlreadyRefunded(receipt.id));
                }
                Ok(receipt.amount)
            })
            .await
    }
}
