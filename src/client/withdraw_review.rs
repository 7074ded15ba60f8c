use crate::error::ClientError;
use crate::services::price_service::PriceSource;
use crate::types::{WithdrawBody, WithdrawalReceipt};
use async_trait::async_trait;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use tracing::{error, info, warn};
use uuid::Uuid;

/// Flat network fee shown while composing a withdrawal.
pub const NETWORK_FEE: Decimal = dec!(0.0005);

#[derive(Debug, Clone, PartialEq)]
pub struct WithdrawForm {
    pub wallet_id: Uuid,
    pub symbol: String,
    pub amount: Decimal,
    pub destination_address: String,
    pub network: String,
    pub email: String,
}

impl WithdrawForm {
    pub fn to_body(&self) -> WithdrawBody {
        WithdrawBody {
            wallet_id: self.wallet_id.to_string(),
            symbol: self.symbol.to_uppercase(),
            amount: self.amount,
            destination_address: self.destination_address.clone(),
            network: self.network.clone(),
            email: self.email.clone(),
        }
    }
}

/// Figures shown on the review screen. Nothing here is persisted.
#[derive(Debug, Clone, PartialEq)]
pub struct WithdrawalQuote {
    pub form: WithdrawForm,
    /// `None` when no price was available; USD figures are then zero.
    pub price_usd: Option<Decimal>,
    pub network_fee: Decimal,
    pub receive_amount: Decimal,
    pub amount_usd: Decimal,
    pub network_fee_usd: Decimal,
    pub receive_usd: Decimal,
}

impl WithdrawalQuote {
    pub fn is_estimate_degraded(&self) -> bool {
        self.price_usd.is_none()
    }
}

pub fn compose(form: WithdrawForm, price_usd: Option<Decimal>) -> WithdrawalQuote {
    let price = price_usd.unwrap_or(Decimal::ZERO);
    let receive_amount = form.amount - NETWORK_FEE;

    WithdrawalQuote {
        price_usd,
        network_fee: NETWORK_FEE,
        receive_amount,
        amount_usd: form.amount * price,
        network_fee_usd: NETWORK_FEE * price,
        receive_usd: receive_amount * price,
        form,
    }
}

/// Reads the latest price for the form's symbol and composes the quote.
pub async fn compose_with_latest_price(prices: &dyn PriceSource, form: WithdrawForm) -> WithdrawalQuote {
    let price = prices
        .get_price(&form.symbol.to_uppercase())
        .await
        .and_then(|q| q.price_decimal());
    if price.is_none() {
        warn!("⚠️ No price for {}, showing estimates as $0", form.symbol);
    }
    compose(form, price)
}

#[async_trait]
pub trait WithdrawalApi: Send + Sync {
    async fn submit_withdrawal(&self, body: &WithdrawBody) -> Result<WithdrawalReceipt, ClientError>;
}

#[derive(Debug, Clone, PartialEq)]
pub enum ReviewStep {
    Review,
    Confirming,
    Processing,
    Success(WithdrawalReceipt),
    Failure(String),
}

/// Review → Confirming → Processing → Success | Failure. One confirmation
/// submits exactly one request.
pub struct WithdrawReview {
    quote: WithdrawalQuote,
    step: ReviewStep,
}

impl WithdrawReview {
    pub fn new(quote: WithdrawalQuote) -> Self {
        Self {
            quote,
            step: ReviewStep::Review,
        }
    }

    pub fn quote(&self) -> &WithdrawalQuote {
        &self.quote
    }

    pub fn step(&self) -> &ReviewStep {
        &self.step
    }

    pub fn confirm(&mut self) -> &ReviewStep {
        if self.step == ReviewStep::Review {
            self.step = ReviewStep::Confirming;
        }
        &self.step
    }

    pub fn back(&mut self) -> &ReviewStep {
        if matches!(self.step, ReviewStep::Confirming | ReviewStep::Failure(_)) {
            self.step = ReviewStep::Review;
        }
        &self.step
    }

    /// Sends the request. Does nothing unless the user is on the
    /// confirmation step.
    pub async fn submit(&mut self, api: &dyn WithdrawalApi) -> &ReviewStep {
        if self.step != ReviewStep::Confirming {
            return &self.step;
        }
        self.step = ReviewStep::Processing;

        self.step = match api.submit_withdrawal(&self.quote.form.to_body()).await {
            Ok(receipt) => {
                info!("✅ Withdrawal {} submitted", receipt.id);
                ReviewStep::Success(receipt)
            }
            Err(ClientError::Api { message, .. }) => ReviewStep::Failure(message),
            Err(e) => {
                error!("❌ Withdrawal submission failed: {}", e);
                ReviewStep::Failure(e.to_string())
            }
        };
        &self.step
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::WithdrawalStatus;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn form(amount: Decimal) -> WithdrawForm {
        WithdrawForm {
            wallet_id: Uuid::new_v4(),
            symbol: "btc".to_string(),
            amount,
            destination_address: "bc1qxy2kgdygjrsqtzq2n0yrf2493p83kkfjhx0wlh".to_string(),
            network: "bitcoin".to_string(),
            email: "user@example.com".to_string(),
        }
    }

    struct CountingApi {
        calls: AtomicUsize,
        fail_with: Option<String>,
    }

    #[async_trait]
    impl WithdrawalApi for CountingApi {
        async fn submit_withdrawal(&self, body: &WithdrawBody) -> Result<WithdrawalReceipt, ClientError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if let Some(message) = &self.fail_with {
                return Err(ClientError::Api {
                    status: 400,
                    message: message.clone(),
                });
            }
            Ok(WithdrawalReceipt {
                id: Uuid::new_v4(),
                status: WithdrawalStatus::Pending,
                amount: body.amount,
                amount_usd: body.amount * dec!(42500),
                fee: dec!(0.01),
            })
        }
    }

    #[test]
    fn test_compose_with_price() {
        let quote = compose(form(dec!(1)), Some(dec!(42500)));
        assert_eq!(quote.network_fee, dec!(0.0005));
        assert_eq!(quote.receive_amount, dec!(0.9995));
        assert_eq!(quote.amount_usd, dec!(42500));
        assert_eq!(quote.receive_usd, dec!(42478.75));
        assert!(!quote.is_estimate_degraded());
    }

    #[test]
    fn test_compose_without_price_degrades_to_zero() {
        let quote = compose(form(dec!(2)), None);
        assert_eq!(quote.amount_usd, Decimal::ZERO);
        assert_eq!(quote.receive_amount, dec!(1.9995));
        assert!(quote.is_estimate_degraded());

        let mut review = WithdrawReview::new(quote);
        assert_eq!(review.confirm(), &ReviewStep::Confirming);
    }

    #[tokio::test]
    async fn test_submit_requires_confirmation() {
        let api = CountingApi {
            calls: AtomicUsize::new(0),
            fail_with: None,
        };
        let mut review = WithdrawReview::new(compose(form(dec!(1)), Some(dec!(42500))));

        assert_eq!(review.submit(&api).await, &ReviewStep::Review);
        assert_eq!(api.calls.load(Ordering::SeqCst), 0);

        review.confirm();
        assert!(matches!(review.submit(&api).await, ReviewStep::Success(r) if r.amount == dec!(1)));

        review.submit(&api).await;
        assert_eq!(api.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_failure_surfaces_server_message() {
        let api = CountingApi {
            calls: AtomicUsize::new(0),
            fail_with: Some("Insufficient balance. Available: 0.5 BTC".to_string()),
        };
        let mut review = WithdrawReview::new(compose(form(dec!(1)), Some(dec!(42500))));
        review.confirm();

        assert_eq!(
            review.submit(&api).await,
            &ReviewStep::Failure("Insufficient balance. Available: 0.5 BTC".to_string())
        );
        assert_eq!(review.back(), &ReviewStep::Review);
    }
}
