//! Time-based one-time passwords (RFC 6238) for admin two-factor enrollment.
//!
//! SHA-1, 6 digits, 30-second period - the parameters every authenticator app
//! defaults to. Verification accepts the previous, current, and next time
//! step, tolerating minor clock drift.

use hmac::{Hmac, Mac};
use sha1::Sha1;
use subtle::ConstantTimeEq;

use crate::error::{AppError, AppResult};
use crate::services::secrets;

type HmacSha1 = Hmac<Sha1>;

/// Length of a generated shared secret in raw bytes (160 bits, per RFC 4226).
const SECRET_BYTES: usize = 20;
/// Code length in digits.
const DIGITS: u32 = 6;
/// Time-step in seconds.
pub const PERIOD_SECS: u64 = 30;
/// Accepted drift in time steps on either side of now.
const WINDOW: i64 = 1;

const BASE32_ALPHABET: base32::Alphabet = base32::Alphabet::Rfc4648 { padding: false };

/// Generate a new random shared secret, base32-encoded without padding.
pub fn generate_secret() -> String {
    base32::encode(BASE32_ALPHABET, &secrets::generate_bytes(SECRET_BYTES))
}

/// RFC 4226 HOTP value for a key and counter, truncated to 6 digits.
fn hotp(key: &[u8], counter: u64) -> AppResult<u32> {
    let mut mac = HmacSha1::new_from_slice(key)
        .map_err(|_| AppError::InvalidInput("invalid TOTP secret".to_string()))?;
    mac.update(&counter.to_be_bytes());
    let digest = mac.finalize().into_bytes();

    // Dynamic truncation (RFC 4226 §5.3)
    let offset = (digest[digest.len() - 1] & 0x0f) as usize;
    let bin = ((digest[offset] & 0x7f) as u32) << 24
        | (digest[offset + 1] as u32) << 16
        | (digest[offset + 2] as u32) << 8
        | digest[offset + 3] as u32;

    Ok(bin % 10u32.pow(DIGITS))
}

fn decode_secret(secret: &str) -> AppResult<Vec<u8>> {
    base32::decode(BASE32_ALPHABET, secret)
        .filter(|b| !b.is_empty())
        .ok_or_else(|| AppError::InvalidInput("invalid TOTP secret".to_string()))
}

/// The 6-digit code for a secret at a given unix time.
pub fn code_at(secret: &str, unix_time: u64) -> AppResult<String> {
    let key = decode_secret(secret)?;
    let value = hotp(&key, unix_time / PERIOD_SECS)?;
    Ok(format!("{:06}", value))
}

/// Validate a presented code against a secret at a given unix time,
/// accepting ±1 time step.
pub fn verify_code(secret: &str, code: &str, unix_time: u64) -> AppResult<bool> {
    if code.len() != DIGITS as usize || !code.chars().all(|c| c.is_ascii_digit()) {
        return Ok(false);
    }

    let key = decode_secret(secret)?;
    let current = (unix_time / PERIOD_SECS) as i64;

    for step in (current - WINDOW)..=(current + WINDOW) {
        if step < 0 {
            continue;
        }
        let expected = format!("{:06}", hotp(&key, step as u64)?);
        if expected.as_bytes().ct_eq(code.as_bytes()).into() {
            return Ok(true);
        }
    }
    Ok(false)
}

/// Validate a presented code against the current clock.
pub fn verify_code_now(secret: &str, code: &str) -> AppResult<bool> {
    verify_code(secret, code, chrono::Utc::now().timestamp() as u64)
}

/// Standard `otpauth://` enrollment URI for authenticator apps.
pub fn provisioning_uri(secret: &str, email: &str, issuer: &str) -> String {
    format!(
        "otpauth://totp/{}:{}?secret={}&issuer={}&algorithm=SHA1&digits={}&period={}",
        urlencoding::encode(issuer),
        urlencoding::encode(email),
        secret,
        urlencoding::encode(issuer),
        DIGITS,
        PERIOD_SECS,
    )
}

/// Render an enrollment URI as an SVG QR code wrapped in a data URL.
pub fn qr_data_url(uri: &str) -> AppResult<String> {
    use base64::Engine;
    use qrcode::render::svg;

    let code = qrcode::QrCode::new(uri.as_bytes())
        .map_err(|e| AppError::InvalidInput(format!("QR encoding failed: {}", e)))?;
    let image = code
        .render::<svg::Color<'_>>()
        .min_dimensions(200, 200)
        .build();
    let encoded = base64::engine::general_purpose::STANDARD.encode(image);
    Ok(format!("data:image/svg+xml;base64,{}", encoded))
}

#[cfg(test)]
mod tests {
    use super::*;

    // RFC 6238 appendix B test secret: ASCII "12345678901234567890"
    const RFC_SECRET: &str = "GEZDGNBVGY3TQOJQGEZDGNBVGY3TQOJQ";

    #[test]
    fn test_rfc6238_vectors() {
        // 6-digit truncations of the RFC 6238 SHA-1 reference values
        assert_eq!(code_at(RFC_SECRET, 59).unwrap(), "287082");
        assert_eq!(code_at(RFC_SECRET, 1_111_111_109).unwrap(), "081804");
        assert_eq!(code_at(RFC_SECRET, 1_234_567_890).unwrap(), "005924");
    }

    #[test]
    fn test_window_accepts_adjacent_steps() {
        let t: u64 = 1_111_111_109;
        let code = code_at(RFC_SECRET, t).unwrap();

        assert!(verify_code(RFC_SECRET, &code, t).unwrap());
        assert!(verify_code(RFC_SECRET, &code, t - 30).unwrap());
        assert!(verify_code(RFC_SECRET, &code, t + 30).unwrap());
    }

    #[test]
    fn test_window_rejects_two_steps_away() {
        let t: u64 = 1_111_111_109;
        let code = code_at(RFC_SECRET, t).unwrap();

        assert!(!verify_code(RFC_SECRET, &code, t - 90).unwrap());
        assert!(!verify_code(RFC_SECRET, &code, t + 90).unwrap());
    }

    #[test]
    fn test_code_from_different_secret_fails() {
        let other = generate_secret();
        let t: u64 = 1_111_111_109;
        let code = code_at(&other, t).unwrap();
        assert!(!verify_code(RFC_SECRET, &code, t).unwrap());
    }

    #[test]
    fn test_malformed_code_rejected() {
        assert!(!verify_code(RFC_SECRET, "12345", 59).unwrap());
        assert!(!verify_code(RFC_SECRET, "abcdef", 59).unwrap());
        assert!(!verify_code(RFC_SECRET, "1234567", 59).unwrap());
    }

    #[test]
    fn test_generate_secret_is_base32() {
        let secret = generate_secret();
        assert_eq!(secret.len(), 32); // 20 bytes -> 32 base32 chars, no padding
        assert!(decode_secret(&secret).is_ok());
        assert_ne!(secret, generate_secret());
    }

    #[test]
    fn test_invalid_secret_is_error() {
        assert!(code_at("not-base32!!", 59).is_err());
    }

    #[test]
    fn test_provisioning_uri_shape() {
        let uri = provisioning_uri("ABC234", "ops@fusion.io", "Fusion");
        assert!(uri.starts_with("otpauth://totp/Fusion:ops%40fusion.io?"));
        assert!(uri.contains("secret=ABC234"));
        assert!(uri.contains("algorithm=SHA1"));
        assert!(uri.contains("digits=6"));
        assert!(uri.contains("period=30"));
    }

    #[test]
    fn test_qr_data_url() {
        let uri = provisioning_uri(&generate_secret(), "ops@fusion.io", "Fusion");
        let data_url = qr_data_url(&uri).unwrap();
        assert!(data_url.starts_with("data:image/svg+xml;base64,"));
    }
}
