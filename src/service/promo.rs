use rand::Rng;

use crate::db::ProfileExt;

use super::error::ServiceError;

/// Uppercase letters and digits minus the look-alikes I, O, 0 and 1.
pub const PROMO_CODE_ALPHABET: &[u8] = b"ABCDEFGHJKLMNPQRSTUVWXYZ23456789";
pub const PROMO_CODE_LENGTH: usize = 6;
pub const MAX_PROMO_CODE_ATTEMPTS: u32 = 8;

/// Six symbols drawn uniformly from [`PROMO_CODE_ALPHABET`]. Not suitable
/// as a secret.
pub fn generate_promo_code() -> String {
    let mut rng = rand::rng();
    (0..PROMO_CODE_LENGTH)
        .map(|_| PROMO_CODE_ALPHABET[rng.random_range(0..PROMO_CODE_ALPHABET.len())] as char)
        .collect()
}

pub fn normalize_promo_code(code: &str) -> String {
    code.trim().to_ascii_uppercase()
}

/// Draws codes until one is not yet assigned to any profile.
pub async fn generate_unique_promo_code<S>(store: &S) -> Result<String, ServiceError>
where
    S: ProfileExt + Send + Sync + ?Sized,
{
    for attempt in 1..=MAX_PROMO_CODE_ATTEMPTS {
        let code = generate_promo_code();
        if !store.promo_code_exists(&code).await? {
            return Ok(code);
        }
        tracing::debug!("Promo code collision on attempt {}: {}", attempt, code);
    }

    Err(ServiceError::PromoCodeExhausted(MAX_PROMO_CODE_ATTEMPTS))
}

pub fn generate_referral_link(base_url: &str, code: &str) -> String {
    format!("{}/register?ref={}", base_url.trim_end_matches('/'), code)
}
