/// Subscription endpoint
///
/// `POST /v1/subscriptions` charges the card for a paid tier and, on
/// success, moves the account to it. Usage already consumed today is kept.
///
/// ```text
/// POST /v1/subscriptions
/// Authorization: Bearer <token>
/// {
///   "tier": "standard",
///   "card": {"number": "4242 4242 4242 4242", "expiry": "12/30", "cvc": "123", "name": "Arta Hoxha"}
/// }
/// ```

use crate::{
    app::AppState,
    error::{ApiError, ApiResult},
};
use axum::{extract::State, Extension, Json};
use serde::{Deserialize, Serialize};
use vistagen_shared::auth::jwt::SessionContext;
use vistagen_shared::models::account::Tier;
use vistagen_shared::payment::CardDetails;
use vistagen_shared::quota::QuotaEvaluation;

/// Subscription request
#[derive(Debug, Deserialize)]
pub struct SubscriptionRequest {
    /// Tier to buy
    pub tier: Tier,

    /// Card to charge
    pub card: CardDetails,
}

/// Payment receipt
#[derive(Debug, Serialize)]
pub struct Receipt {
    /// Gateway transaction ID
    pub transaction_id: String,

    /// Tier bought
    pub tier: Tier,

    /// Amount charged
    pub amount: u32,

    /// Always "LEK"
    pub currency: &'static str,
}

/// Subscription response
#[derive(Debug, Serialize)]
pub struct SubscriptionResponse {
    pub receipt: Receipt,
    pub quota: QuotaEvaluation,
}

/// Buy a tier
///
/// # Errors
///
/// - `400 Bad Request`: Free tier, or the account is already on this tier
/// - `402 Payment Required`: The card was rejected
pub async fn subscribe(
    State(state): State<AppState>,
    Extension(session): Extension<SessionContext>,
    Json(req): Json<SubscriptionRequest>,
) -> ApiResult<Json<SubscriptionResponse>> {
    if req.tier == Tier::Free {
        return Err(ApiError::BadRequest(
            "The free plan does not need a subscription".to_string(),
        ));
    }

    let current = state.accounts.load(&session.identity).await?;
    if current.account.tier == req.tier {
        return Err(ApiError::BadRequest(format!(
            "You are already on the {} plan",
            req.tier
        )));
    }

    let outcome = state.payments.charge(req.tier, &req.card).await;
    let transaction_id = match (outcome.success, outcome.transaction_id) {
        (true, Some(id)) => id,
        _ => {
            let reason = outcome
                .error
                .unwrap_or_else(|| "Payment could not be completed.".to_string());
            tracing::info!(identity = %session.identity, tier = %req.tier, %reason, "Payment declined");
            return Err(ApiError::PaymentDeclined(reason));
        }
    };

    let quota = state.accounts.upgrade(&session.identity, req.tier).await?;

    tracing::info!(
        identity = %session.identity,
        tier = %req.tier,
        transaction_id = %transaction_id,
        "Subscription purchased"
    );

    Ok(Json(SubscriptionResponse {
        receipt: Receipt {
            transaction_id,
            tier: req.tier,
            amount: req.tier.price(),
            currency: "LEK",
        },
        quota,
    }))
}
