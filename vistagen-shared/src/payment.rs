/// Payment gateway boundary
///
/// Tier upgrades are paid for through a [`PaymentGateway`]. The gateway
/// answers success or failure plus an optional human-readable reason; the
/// reason is passed through to the caller untouched and never branched on.
///
/// [`MockPaymentGateway`] simulates a card processor with a short network
/// delay and a handful of card checks. It never moves money.
///
/// # Mock Card Rules
///
/// - Number (whitespace removed) must be 15-16 digits
/// - Security code must be at least 3 digits
/// - Name on card must not be blank
/// - Numbers starting with `4000` are declined
///
/// # Example
///
/// ```
/// use vistagen_shared::models::account::Tier;
/// use vistagen_shared::payment::{CardDetails, MockPaymentGateway, PaymentGateway};
/// use std::time::Duration;
///
/// # async fn example() {
/// let gateway = MockPaymentGateway::with_latency(Duration::ZERO);
/// let card = CardDetails {
///     number: "4242 4242 4242 4242".to_string(),
///     expiry: "12/30".to_string(),
///     cvc: "123".to_string(),
///     name: "Ana Hoxha".to_string(),
/// };
///
/// let outcome = gateway.charge(Tier::Standard, &card).await;
/// assert!(outcome.success);
/// # }
/// ```

use crate::models::account::Tier;
use async_trait::async_trait;
use rand::distributions::Alphanumeric;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Default simulated network latency
pub const DEFAULT_LATENCY: Duration = Duration::from_secs(2);

/// Card fields as entered by the user
#[derive(Clone, Deserialize)]
pub struct CardDetails {
    /// Card number, possibly with spaces
    pub number: String,

    /// Expiry (MM/YY)
    pub expiry: String,

    /// Security code
    pub cvc: String,

    /// Name on card
    pub name: String,
}

impl std::fmt::Debug for CardDetails {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let digits: String = self.number.chars().filter(|c| c.is_ascii_digit()).collect();
        let last4 = digits.get(digits.len().saturating_sub(4)..).unwrap_or("");

        f.debug_struct("CardDetails")
            .field("number", &format!("**** {}", last4))
            .field("expiry", &self.expiry)
            .field("cvc", &"***")
            .field("name", &self.name)
            .finish()
    }
}

/// Gateway response
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentOutcome {
    /// Whether the charge went through
    pub success: bool,

    /// Processor transaction ID on success
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transaction_id: Option<String>,

    /// Human-readable failure reason
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl PaymentOutcome {
    /// Successful charge
    pub fn approved(transaction_id: impl Into<String>) -> Self {
        PaymentOutcome {
            success: true,
            transaction_id: Some(transaction_id.into()),
            error: None,
        }
    }

    /// Failed charge with a reason for the user
    pub fn declined(reason: impl Into<String>) -> Self {
        PaymentOutcome {
            success: false,
            transaction_id: None,
            error: Some(reason.into()),
        }
    }
}

/// Charges a card for a tier
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Charges `card` the price of `tier`
    async fn charge(&self, tier: Tier, card: &CardDetails) -> PaymentOutcome;
}

/// Simulated card processor
#[derive(Debug, Clone)]
pub struct MockPaymentGateway {
    latency: Duration,
}

impl MockPaymentGateway {
    /// Creates a gateway with the default simulated latency
    pub fn new() -> Self {
        Self::with_latency(DEFAULT_LATENCY)
    }

    /// Creates a gateway with a custom simulated latency
    pub fn with_latency(latency: Duration) -> Self {
        MockPaymentGateway { latency }
    }

    fn check_card(card: &CardDetails) -> Result<(), &'static str> {
        let number: String = card.number.chars().filter(|c| !c.is_whitespace()).collect();

        if !(15..=16).contains(&number.len()) || !number.chars().all(|c| c.is_ascii_digit()) {
            return Err("Your card number is incomplete.");
        }

        if card.cvc.len() < 3 || !card.cvc.chars().all(|c| c.is_ascii_digit()) {
            return Err("Your card's security code is incomplete.");
        }

        if card.name.trim().is_empty() {
            return Err("Name on card is required.");
        }

        if number.starts_with("4000") {
            return Err("Your card was declined.");
        }

        Ok(())
    }

    fn transaction_id() -> String {
        let suffix: String = rand::thread_rng()
            .sample_iter(&Alphanumeric)
            .take(24)
            .map(char::from)
            .collect();
        format!("ch_{}", suffix.to_lowercase())
    }
}

impl Default for MockPaymentGateway {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PaymentGateway for MockPaymentGateway {
    async fn charge(&self, tier: Tier, card: &CardDetails) -> PaymentOutcome {
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }

        match Self::check_card(card) {
            Ok(()) => {
                let outcome = PaymentOutcome::approved(Self::transaction_id());
                tracing::info!(
                    tier = %tier,
                    amount = tier.price(),
                    transaction_id = ?outcome.transaction_id,
                    "Payment approved"
                );
                outcome
            }
            Err(reason) => {
                tracing::info!(tier = %tier, reason, "Payment declined");
                PaymentOutcome::declined(reason)
            }
        }
    }
}
