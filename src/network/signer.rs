use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use ring::hmac;

use crate::constants::AUTHORIZATION_SCHEME;

/// Produces request signatures for the configuration service
pub trait Signer: Send + Sync {
    fn sign(
        &self,
        timestamp: &str,
        path_with_query: &str,
    ) -> String;
}

/// `base64(HMAC-SHA1(secret, timestamp + "\n" + path_with_query))`
pub struct HmacSha1Signer {
    key: hmac::Key,
}

impl std::fmt::Debug for HmacSha1Signer {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        f.debug_struct("HmacSha1Signer").finish_non_exhaustive()
    }
}

impl HmacSha1Signer {
    pub fn new(secret: &str) -> Self {
        Self {
            key: hmac::Key::new(hmac::HMAC_SHA1_FOR_LEGACY_USE_ONLY, secret.as_bytes()),
        }
    }
}

impl Signer for HmacSha1Signer {
    fn sign(
        &self,
        timestamp: &str,
        path_with_query: &str,
    ) -> String {
        let string_to_sign = format!("{timestamp}\n{path_with_query}");
        let tag = hmac::sign(&self.key, string_to_sign.as_bytes());
        STANDARD.encode(tag.as_ref())
    }
}

/// Value of the `Authorization` header for `app_id`
pub(crate) fn authorization_value(
    app_id: &str,
    signature: &str,
) -> String {
    format!("{AUTHORIZATION_SCHEME} {app_id}:{signature}")
}
