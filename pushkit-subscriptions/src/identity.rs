//! Subscription authorization signing.
//!
//! Accepting a proposal produces a signed statement binding the subscribing
//! account to the dapp URL and the keyserver. It is encoded as a compact
//! JWT (`EdDSA`) and sent wrapped as `{"subscriptionAuth": <jwt>}`.

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use chrono::Utc;
use ed25519_dalek::{Signature, Signer, SigningKey, Verifier, VerifyingKey};
use pushkit_lib::Account;
use rand::rngs::OsRng;
use serde::{Deserialize, Serialize};

use crate::types::{AcceptSubscriptionPayload, SubscriptionAuthWrapper};
use crate::{Result, SubscriptionError};

/// Lifetime of a subscription authorization.
const AUTH_TTL_SECS: i64 = 30 * 24 * 60 * 60;

/// Action claim of an accepted subscription.
pub const ACT_PUSH_SUBSCRIPTION: &str = "push_subscription";

/// Signs subscription authorizations on behalf of an account.
pub trait IdentitySigner: Send + Sync {
    fn sign_and_create_wrapper(
        &self,
        payload: &AcceptSubscriptionPayload,
        account: &Account,
    ) -> Result<SubscriptionAuthWrapper>;
}

#[derive(Serialize, Deserialize)]
struct JwtHeader {
    alg: String,
    typ: String,
}

/// Claims of the authorization JWT.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AcceptSubscriptionClaims {
    /// Signer identity key, `ed25519:<hex>`.
    pub iss: String,
    /// Subscribing account, `did:pkh:<caip-10>`.
    pub sub: String,
    /// Dapp URL.
    pub aud: String,
    /// Keyserver URL.
    pub ksu: String,
    pub iat: i64,
    pub exp: i64,
    pub act: String,
}

/// [`IdentitySigner`] backed by an Ed25519 identity key.
pub struct Ed25519IdentitySigner {
    signing_key: SigningKey,
}

impl Ed25519IdentitySigner {
    pub fn new(signing_key: SigningKey) -> Self {
        Self { signing_key }
    }

    pub fn generate() -> Self {
        Self::new(SigningKey::generate(&mut OsRng))
    }

    pub fn verifying_key(&self) -> VerifyingKey {
        self.signing_key.verifying_key()
    }
}

impl IdentitySigner for Ed25519IdentitySigner {
    fn sign_and_create_wrapper(
        &self,
        payload: &AcceptSubscriptionPayload,
        account: &Account,
    ) -> Result<SubscriptionAuthWrapper> {
        let iat = Utc::now().timestamp();
        let claims = AcceptSubscriptionClaims {
            iss: format!("ed25519:{}", hex::encode(self.verifying_key().as_bytes())),
            sub: format!("did:pkh:{}", account),
            aud: payload.dapp_url.clone(),
            ksu: payload.keyserver.clone(),
            iat,
            exp: iat + AUTH_TTL_SECS,
            act: ACT_PUSH_SUBSCRIPTION.to_string(),
        };
        let header = JwtHeader {
            alg: "EdDSA".to_string(),
            typ: "JWT".to_string(),
        };

        let signing_input = format!(
            "{}.{}",
            URL_SAFE_NO_PAD.encode(serde_json::to_vec(&header)?),
            URL_SAFE_NO_PAD.encode(serde_json::to_vec(&claims)?)
        );
        let signature = self.signing_key.sign(signing_input.as_bytes());

        Ok(SubscriptionAuthWrapper {
            subscription_auth: format!(
                "{}.{}",
                signing_input,
                URL_SAFE_NO_PAD.encode(signature.to_bytes())
            ),
        })
    }
}

/// Verify a subscription authorization and return its claims.
///
/// Checks the algorithm, the signature and expiry.
pub fn verify_subscription_auth(
    jwt: &str,
    verifying_key: &VerifyingKey,
) -> Result<AcceptSubscriptionClaims> {
    let signing_error = |msg: &str| SubscriptionError::Signing(msg.to_string());

    let mut parts = jwt.split('.');
    let (Some(header), Some(claims), Some(signature), None) =
        (parts.next(), parts.next(), parts.next(), parts.next())
    else {
        return Err(signing_error("expected three JWT segments"));
    };

    let decode = |segment: &str| {
        URL_SAFE_NO_PAD
            .decode(segment)
            .map_err(|e| SubscriptionError::Signing(e.to_string()))
    };

    let header: JwtHeader = serde_json::from_slice(&decode(header)?)?;
    if header.alg != "EdDSA" {
        return Err(signing_error("unsupported JWT algorithm"));
    }

    let signature_bytes: [u8; 64] = decode(signature)?
        .try_into()
        .map_err(|_| signing_error("signature has wrong length"))?;
    let signing_input_len = jwt.len() - signature.len() - 1;
    verifying_key
        .verify(
            &jwt.as_bytes()[..signing_input_len],
            &Signature::from_bytes(&signature_bytes),
        )
        .map_err(|_| signing_error("signature verification failed"))?;

    let claims: AcceptSubscriptionClaims = serde_json::from_slice(&decode(claims)?)?;
    if claims.exp <= Utc::now().timestamp() {
        return Err(signing_error("authorization expired"));
    }
    Ok(claims)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn payload() -> AcceptSubscriptionPayload {
        AcceptSubscriptionPayload {
            keyserver: "https://keys.walletconnect.com".into(),
            subscription_account: "eip155:1:0xabc".parse().unwrap(),
            dapp_url: "https://gm.example".into(),
        }
    }

    #[test]
    fn test_sign_and_verify() {
        let signer = Ed25519IdentitySigner::generate();
        let payload = payload();
        let wrapper = signer
            .sign_and_create_wrapper(&payload, &payload.subscription_account)
            .unwrap();

        let claims =
            verify_subscription_auth(&wrapper.subscription_auth, &signer.verifying_key()).unwrap();
        assert_eq!(claims.aud, "https://gm.example");
        assert_eq!(claims.ksu, "https://keys.walletconnect.com");
        assert_eq!(claims.sub, "did:pkh:eip155:1:0xabc");
        assert_eq!(claims.act, ACT_PUSH_SUBSCRIPTION);
    }

    #[test]
    fn test_wrong_key_rejected() {
        let signer = Ed25519IdentitySigner::generate();
        let payload = payload();
        let wrapper = signer
            .sign_and_create_wrapper(&payload, &payload.subscription_account)
            .unwrap();

        let other = Ed25519IdentitySigner::generate();
        assert!(verify_subscription_auth(&wrapper.subscription_auth, &other.verifying_key()).is_err());
    }

    #[test]
    fn test_malformed_jwt_rejected() {
        let key = Ed25519IdentitySigner::generate().verifying_key();
        assert!(verify_subscription_auth("a.b", &key).is_err());
        assert!(verify_subscription_auth("a.b.c.d", &key).is_err());
        assert!(verify_subscription_auth("!!.??.**", &key).is_err());
    }

    #[test]
    fn test_wrapper_json_shape() {
        let signer = Ed25519IdentitySigner::generate();
        let payload = payload();
        let wrapper = signer
            .sign_and_create_wrapper(&payload, &payload.subscription_account)
            .unwrap();
        let value = serde_json::to_value(&wrapper).unwrap();
        assert!(value["subscriptionAuth"].as_str().unwrap().starts_with("ey"));
    }
}
