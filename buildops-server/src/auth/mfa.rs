//! TOTP second factor and single-use backup codes

use totp_rs::{Algorithm, Secret, TOTP};

use super::AuthError;

const DIGITS: usize = 6;
const SKEW: u8 = 1;
const STEP_SECS: u64 = 30;
const SECRET_BYTES: usize = 20;
const BACKUP_CODE_COUNT: usize = 10;
const BACKUP_CODE_LEN: usize = 8;

/// A TOTP secret in its base32 form, as stored on the user row
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MfaSecret(String);

impl MfaSecret {
    /// Generate a fresh random secret.
    pub fn generate() -> Self {
        let bytes: [u8; SECRET_BYTES] = rand::random();
        Self(Secret::Raw(bytes.to_vec()).to_encoded().to_string())
    }

    pub fn from_base32(encoded: impl Into<String>) -> Self {
        Self(encoded.into())
    }

    pub fn as_base32(&self) -> &str {
        &self.0
    }

    fn totp(&self) -> Result<TOTP, AuthError> {
        let bytes = Secret::Encoded(self.0.clone())
            .to_bytes()
            .map_err(|e| AuthError::Totp(format!("{e:?}")))?;
        TOTP::new(Algorithm::SHA1, DIGITS, SKEW, STEP_SECS, bytes)
            .map_err(|e| AuthError::Totp(format!("{e:?}")))
    }

    /// `otpauth://` URI for authenticator apps.
    pub fn provisioning_uri(&self, issuer: &str, account: &str) -> String {
        let issuer_enc = urlencoding::encode(issuer);
        format!(
            "otpauth://totp/{issuer_enc}:{account}?secret={secret}&issuer={issuer_enc}&algorithm=SHA1&digits={DIGITS}&period={STEP_SECS}",
            account = urlencoding::encode(account),
            secret = self.0,
        )
    }

    /// Check a code at unix time `now`, accepting one step either side.
    pub fn verify_at(&self, code: &str, now: u64) -> Result<bool, AuthError> {
        Ok(self.totp()?.check(code, now))
    }

    pub fn verify(&self, code: &str) -> Result<bool, AuthError> {
        self.totp()?
            .check_current(code)
            .map_err(|e| AuthError::Totp(e.to_string()))
    }

    /// Code for unix time `now`.
    pub fn code_at(&self, now: u64) -> Result<String, AuthError> {
        Ok(self.totp()?.generate(now))
    }
}

/// Ten upper-case alphanumeric codes, each valid once.
pub fn generate_backup_codes() -> Vec<String> {
    (0..BACKUP_CODE_COUNT)
        .map(|_| buildops_core::generate_token(BACKUP_CODE_LEN).to_uppercase())
        .collect()
}

/// Normalise user-typed backup codes before lookup.
pub fn normalize_backup_code(code: &str) -> String {
    code.trim().to_uppercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    const NOW: u64 = 1_760_000_000;

    #[test]
    fn generated_secret_is_base32() {
        let secret = MfaSecret::generate();
        assert_eq!(secret.as_base32().len(), 32);
        assert!(secret
            .as_base32()
            .chars()
            .all(|c| c.is_ascii_uppercase() || ('2'..='7').contains(&c)));
    }

    #[test]
    fn code_verifies_within_one_step() {
        let secret = MfaSecret::generate();
        let code = secret.code_at(NOW).unwrap();
        assert_eq!(code.len(), 6);
        assert!(secret.verify_at(&code, NOW).unwrap());
        assert!(secret.verify_at(&code, NOW + STEP_SECS).unwrap());
        assert!(!secret.verify_at(&code, NOW + 3 * STEP_SECS).unwrap());
    }

    #[test]
    fn uri_carries_issuer_and_secret() {
        let secret = MfaSecret::from_base32("JBSWY3DPEHPK3PXPJBSWY3DPEHPK3PXP");
        let uri = secret.provisioning_uri("BuildOps", "crew lead@example.com");
        assert!(uri.starts_with("otpauth://totp/BuildOps:crew%20lead%40example.com?"));
        assert!(uri.contains("secret=JBSWY3DPEHPK3PXPJBSWY3DPEHPK3PXP"));
        assert!(uri.contains("issuer=BuildOps"));
        assert!(uri.contains("period=30"));
    }

    #[test]
    fn backup_codes_shape() {
        let codes = generate_backup_codes();
        assert_eq!(codes.len(), 10);
        for code in &codes {
            assert_eq!(code.len(), 8);
            assert!(code.chars().all(|c| c.is_ascii_uppercase() || c.is_ascii_digit()));
        }
        assert_eq!(normalize_backup_code(" ab12cd34 "), "AB12CD34");
    }
}
