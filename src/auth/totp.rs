//! Time-based one-time passwords (RFC 4226 / RFC 6238) for the optional
//! second login factor.

use data_encoding::BASE32;
use hmac::{Hmac, Mac};
use sha1::Sha1;
use std::time::{SystemTime, UNIX_EPOCH};

use crate::config;

type HmacSha1 = Hmac<Sha1>;

pub fn now_unix() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap()
        .as_secs()
}

/// Generate a fresh 20-byte secret, returned as base32 for the enrollment QR
pub fn generate_secret() -> Result<String, getrandom::Error> {
    let mut bytes = [0u8; 20];
    getrandom::getrandom(&mut bytes)?;
    Ok(BASE32.encode(&bytes))
}

pub fn decode_secret(secret_base32: &str) -> Option<Vec<u8>> {
    BASE32.decode(secret_base32.as_bytes()).ok()
}

/// otpauth:// provisioning URL understood by authenticator apps
pub fn otpauth_url(secret_base32: &str, account: &str) -> String {
    let issuer = &config::config().security.totp_issuer;
    let label = format!("{}:{}", issuer, account);
    format!(
        "otpauth://totp/{}?secret={}&issuer={}",
        urlencoding::encode(&label),
        secret_base32,
        urlencoding::encode(issuer)
    )
}

fn hotp(secret: &[u8], counter: u64) -> u32 {
    let mut msg = [0u8; 8];
    msg.copy_from_slice(&counter.to_be_bytes());
    let mut mac = HmacSha1::new_from_slice(secret).expect("HMAC can take key of any size");
    mac.update(&msg);
    let hash = mac.finalize().into_bytes();
    let offset = (hash[19] & 0x0f) as usize;
    let bin_code: u32 = ((hash[offset] as u32 & 0x7f) << 24)
        | ((hash[offset + 1] as u32) << 16)
        | ((hash[offset + 2] as u32) << 8)
        | (hash[offset + 3] as u32);
    bin_code
}

fn totp(secret: &[u8], time: u64, period: u64, digits: u32) -> u32 {
    let counter = time / period;
    let code = hotp(secret, counter);
    let modulo = 10u32.pow(digits);
    code % modulo
}

fn format_code(code: u32, digits: u32) -> String {
    format!("{:0width$}", code, width = digits as usize)
}

/// Current code for a secret, mainly for enrollment self-checks in tests
pub fn current_code(secret: &[u8], time: u64) -> String {
    let cfg = &config::config().security;
    format_code(totp(secret, time, cfg.totp_period, cfg.totp_digits), cfg.totp_digits)
}

/// Verify a submitted code, accepting the configured clock drift window
/// (one period each way by default)
pub fn verify_code(secret: &[u8], code: &str, time: u64) -> bool {
    let cfg = &config::config().security;
    if code.len() != cfg.totp_digits as usize || !code.bytes().all(|b| b.is_ascii_digit()) {
        return false;
    }
    let drift = cfg.totp_drift_steps;
    let steps = time / cfg.totp_period;
    for step in steps.saturating_sub(drift)..=steps + drift {
        let candidate = format_code(
            hotp(secret, step) % 10u32.pow(cfg.totp_digits),
            cfg.totp_digits,
        );
        if candidate == code {
            return true;
        }
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;

    // RFC 4226 appendix D vectors, secret "12345678901234567890"
    const RFC_SECRET: &[u8] = b"12345678901234567890";
    const RFC_CODES: [u32; 10] = [
        755224, 287082, 359152, 969429, 338314, 254676, 287922, 162583, 399871, 520489,
    ];

    #[test]
    fn hotp_matches_rfc4226_vectors() {
        for (counter, expected) in RFC_CODES.iter().enumerate() {
            assert_eq!(hotp(RFC_SECRET, counter as u64) % 1_000_000, *expected);
        }
    }

    #[test]
    fn totp_is_stable_within_a_period() {
        let t = 59;
        assert_eq!(totp(RFC_SECRET, t, 30, 6), totp(RFC_SECRET, 30, 30, 6));
    }

    #[test]
    fn verify_accepts_adjacent_period() {
        let t = 1_000_000_000u64;
        let previous = format_code(totp(RFC_SECRET, t - 30, 30, 6), 6);
        assert!(verify_code(RFC_SECRET, &previous, t));
    }

    #[test]
    fn verify_rejects_garbage() {
        let t = 1_000_000_000u64;
        assert!(!verify_code(RFC_SECRET, "abc123", t));
        assert!(!verify_code(RFC_SECRET, "12345", t));

        // A code outside the whole drift window must fail
        let window: Vec<String> = [t - 30, t, t + 30]
            .iter()
            .map(|time| current_code(RFC_SECRET, *time))
            .collect();
        let wrong = (0..10)
            .map(|d| format!("00000{}", d))
            .find(|c| !window.contains(c))
            .unwrap();
        assert!(!verify_code(RFC_SECRET, &wrong, t));
    }

    #[test]
    fn secret_round_trips_base32() {
        let secret = generate_secret().unwrap();
        let decoded = decode_secret(&secret).unwrap();
        assert_eq!(decoded.len(), 20);
    }

    #[test]
    fn otpauth_url_is_well_formed() {
        let url = otpauth_url("JBSWY3DPEHPK3PXP", "mlopez");
        assert!(url.starts_with("otpauth://totp/"));
        assert!(url.contains("secret=JBSWY3DPEHPK3PXP"));
    }
}
