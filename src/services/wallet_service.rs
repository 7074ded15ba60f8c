use crate::database::PortfolioStore;
use crate::error::{PersistenceError, RegistrationError, VerificationError};
use crate::types::{AuditAction, NewAuditLog, NewWallet, Wallet, WalletVerifyBody};
use chrono::{DateTime, Utc};
use ethers::types::{Address, Signature};
use serde_json::json;
use std::str::FromStr;
use tracing::{info, warn};
use uuid::Uuid;

pub const DEFAULT_WALLET_TYPE: &str = "metamask";

/// Text the wallet is asked to sign. Embeds the claimed address and the time
/// of the request.
pub fn challenge_message(address: &str, at: DateTime<Utc>) -> String {
    format!(
        "Sign this message to verify you own wallet {}\nTimestamp: {}",
        address,
        at.timestamp_millis()
    )
}

pub fn parse_address(address: &str) -> Result<Address, VerificationError> {
    Address::from_str(address.trim())
        .map_err(|e| VerificationError::InvalidAddress(format!("{}: {}", address, e)))
}

/// Full lowercase `0x…` form. `Display` for `Address` abbreviates.
pub fn format_address(address: &Address) -> String {
    format!("{:?}", address)
}

/// Recovers the signer of `message` and checks it against the claimed
/// address, ignoring case.
pub fn verify_ownership(
    claimed: &str,
    message: &str,
    signature: &str,
) -> Result<Address, VerificationError> {
    let claimed_address = parse_address(claimed)?;

    if !message
        .to_lowercase()
        .contains(&format_address(&claimed_address))
    {
        return Err(VerificationError::ChallengeMismatch(claimed.to_string()));
    }

    let signature = Signature::from_str(signature.trim())
        .map_err(|e| VerificationError::InvalidSignature(e.to_string()))?;
    let recovered = signature
        .recover(message)
        .map_err(|e| VerificationError::InvalidSignature(e.to_string()))?;

    let recovered_text = format_address(&recovered);
    if !recovered_text.eq_ignore_ascii_case(&format_address(&claimed_address)) {
        return Err(VerificationError::SignerMismatch {
            claimed: claimed.to_string(),
            recovered: recovered_text,
        });
    }

    Ok(recovered)
}

/// Verifies a signed challenge and records the wallet for `user_id`.
pub async fn register_verified_wallet(
    store: &dyn PortfolioStore,
    user_id: Uuid,
    request: &WalletVerifyBody,
) -> Result<Wallet, RegistrationError> {
    let address = match verify_ownership(&request.address, &request.message, &request.signature) {
        Ok(address) => address,
        Err(e) => {
            warn!("⚠️ Wallet verification failed for {}: {}", request.address, e);
            return Err(e.into());
        }
    };

    let wallet = NewWallet {
        id: Uuid::new_v4(),
        user_id,
        address: format_address(&address),
        wallet_type: request
            .wallet_type
            .clone()
            .unwrap_or_else(|| DEFAULT_WALLET_TYPE.to_string()),
        label: request.label.clone(),
    };
    let audit = NewAuditLog {
        user_id,
        action: AuditAction::WalletConnected,
        entity_type: "wallets".to_string(),
        entity_id: wallet.id,
        old_values: None,
        new_values: Some(json!({
            "wallet_address": wallet.address,
            "wallet_type": wallet.wallet_type,
        })),
    };

    let saved = store.register_wallet(&wallet, &audit).await?;
    info!("✅ Wallet {} verified for user {}", saved.address, user_id);
    Ok(saved)
}

pub async fn disconnect_wallet(
    store: &dyn PortfolioStore,
    user_id: Uuid,
    wallet_id: Uuid,
) -> Result<Wallet, PersistenceError> {
    let audit = NewAuditLog {
        user_id,
        action: AuditAction::WalletDisconnected,
        entity_type: "wallets".to_string(),
        entity_id: wallet_id,
        old_values: Some(json!({ "is_active": true })),
        new_values: Some(json!({ "is_active": false })),
    };

    store.disconnect_wallet(wallet_id, user_id, &audit).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use ethers::signers::{LocalWallet, Signer};

    const KEY: &str = "4c0883a69102937d6231471b5dbb6204fe5129617082792ae468d01a3f362318";
    const OTHER_KEY: &str = "0123456789012345678901234567890123456789012345678901234567890123";

    fn signed(wallet: &LocalWallet, message: &str) -> String {
        tokio_test::block_on(wallet.sign_message(message))
            .unwrap()
            .to_string()
    }

    #[test]
    fn test_valid_signature_recovers_claimed_address() {
        let wallet: LocalWallet = KEY.parse().unwrap();
        let address = format_address(&wallet.address());
        let message = challenge_message(&address, Utc::now());
        let signature = signed(&wallet, &message);

        let recovered = verify_ownership(&address.to_uppercase().replace("0X", "0x"), &message, &signature);
        assert_eq!(recovered.unwrap(), wallet.address());
    }

    #[test]
    fn test_signature_from_other_key_is_rejected() {
        let owner: LocalWallet = KEY.parse().unwrap();
        let other: LocalWallet = OTHER_KEY.parse().unwrap();
        let address = format_address(&owner.address());
        let message = challenge_message(&address, Utc::now());
        let signature = signed(&other, &message);

        let err = verify_ownership(&address, &message, &signature).unwrap_err();
        assert!(matches!(err, VerificationError::SignerMismatch { .. }));
    }

    #[test]
    fn test_challenge_must_name_the_address() {
        let wallet: LocalWallet = KEY.parse().unwrap();
        let address = format_address(&wallet.address());
        let message = "Sign in".to_string();
        let signature = signed(&wallet, &message);

        let err = verify_ownership(&address, &message, &signature).unwrap_err();
        assert!(matches!(err, VerificationError::ChallengeMismatch(_)));
    }

    #[test]
    fn test_garbage_inputs() {
        assert!(matches!(
            verify_ownership("not-an-address", "m", "0x00"),
            Err(VerificationError::InvalidAddress(_))
        ));

        let address = "0x0000000000000000000000000000000000000001";
        let message = challenge_message(address, Utc::now());
        assert!(matches!(
            verify_ownership(address, &message, "0xdeadbeef"),
            Err(VerificationError::InvalidSignature(_))
        ));
    }
}
