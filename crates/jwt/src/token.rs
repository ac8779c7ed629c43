use crate::{EncodeError, JwtError, JwtOptions};
use base64::{engine::general_purpose::URL_SAFE_NO_PAD as BASE64URL, Engine};
use hmac::{Hmac, Mac};
use serde_json::{json, Map, Value};
use sha2::Sha256;
use std::time::{SystemTime, UNIX_EPOCH};

type HmacSha256 = Hmac<Sha256>;

const REGISTERED: [&str; 6] = ["exp", "nbf", "iat", "iss", "sub", "aud"];

/// seconds since the unix epoch, for building `exp`/`nbf`/`iat`
pub fn epoch_seconds() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_secs())
        .unwrap_or_default()
}

/// The registered claims of a token under construction. All are
/// optional; set the ones the application cares about.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Claims {
    pub(crate) exp: Option<u64>,
    pub(crate) nbf: Option<u64>,
    pub(crate) iat: Option<u64>,
    pub(crate) iss: Option<String>,
    pub(crate) sub: Option<String>,
    pub(crate) aud: Option<String>,
}

impl Claims {
    /// an empty claim set
    pub fn new() -> Self {
        Self::default()
    }

    /// expiry, epoch seconds
    pub fn with_exp(mut self, exp: u64) -> Self {
        self.exp = Some(exp);
        self
    }

    /// not-before, epoch seconds
    pub fn with_nbf(mut self, nbf: u64) -> Self {
        self.nbf = Some(nbf);
        self
    }

    /// issued-at, epoch seconds
    pub fn with_iat(mut self, iat: u64) -> Self {
        self.iat = Some(iat);
        self
    }

    /// issuer
    pub fn with_iss(mut self, iss: impl Into<String>) -> Self {
        self.iss = Some(iss.into());
        self
    }

    /// subject
    pub fn with_sub(mut self, sub: impl Into<String>) -> Self {
        self.sub = Some(sub.into());
        self
    }

    /// audience
    pub fn with_aud(mut self, aud: impl Into<String>) -> Self {
        self.aud = Some(aud.into());
        self
    }

    fn into_map(self) -> Map<String, Value> {
        let mut map = Map::new();
        if let Some(exp) = self.exp {
            map.insert("exp".into(), json!(exp));
        }
        if let Some(nbf) = self.nbf {
            map.insert("nbf".into(), json!(nbf));
        }
        if let Some(iat) = self.iat {
            map.insert("iat".into(), json!(iat));
        }
        if let Some(iss) = self.iss {
            map.insert("iss".into(), json!(iss));
        }
        if let Some(sub) = self.sub {
            map.insert("sub".into(), json!(sub));
        }
        if let Some(aud) = self.aud {
            map.insert("aud".into(), json!(aud));
        }
        map
    }
}

/// Issue an HS256 token from registered claims plus custom claims.
///
/// A custom claim whose key collides with a registered claim name is
/// an [`EncodeError::DuplicateClaim`] rather than a silent overwrite.
pub fn encode(
    secret: &[u8],
    claims: Claims,
    custom: &Map<String, Value>,
) -> Result<String, EncodeError> {
    let mut payload = claims.into_map();

    for (key, value) in custom {
        if REGISTERED.contains(&key.as_str()) {
            return Err(EncodeError::DuplicateClaim(key.clone()));
        }
        payload.insert(key.clone(), value.clone());
    }

    let header = BASE64URL.encode(br#"{"alg":"HS256","typ":"JWT"}"#);
    let payload = serde_json::to_string(&Value::Object(payload))
        .map_err(|error| EncodeError::Serialization(error.to_string()))?;
    let payload = BASE64URL.encode(payload);

    let signature = sign(secret, format!("{header}.{payload}").as_bytes());
    Ok(format!("{header}.{payload}.{}", BASE64URL.encode(signature)))
}

fn sign(secret: &[u8], input: &[u8]) -> Vec<u8> {
    let mut mac = HmacSha256::new_from_slice(secret)
        .unwrap_or_else(|_| unreachable!("hmac accepts keys of any length"));
    mac.update(input);
    mac.finalize().into_bytes().to_vec()
}

/// A decoded and validated token.
#[derive(Debug, Clone, PartialEq)]
pub struct JwtToken {
    header: Map<String, Value>,
    payload: Map<String, Value>,
    raw_payload: String,
    signature: Vec<u8>,
}

impl JwtToken {
    /// the decoded header object
    pub fn header(&self) -> &Map<String, Value> {
        &self.header
    }

    /// the payload object
    pub fn payload(&self) -> &Map<String, Value> {
        &self.payload
    }

    /// the payload exactly as carried in the token
    pub fn raw_payload(&self) -> &str {
        &self.raw_payload
    }

    /// the verified signature bytes
    pub fn signature(&self) -> &[u8] {
        &self.signature
    }

    /// a claim by name
    pub fn claim(&self, name: &str) -> Option<&Value> {
        self.payload.get(name)
    }

    /// a claim by name, as a string
    pub fn claim_str(&self, name: &str) -> Option<&str> {
        self.claim(name).and_then(Value::as_str)
    }

    /// a claim by name, as epoch seconds
    pub fn claim_seconds(&self, name: &str) -> Option<u64> {
        self.claim(name).and_then(Value::as_u64)
    }

    /// the subject claim
    pub fn sub(&self) -> Option<&str> {
        self.claim_str("sub")
    }

    /// the issuer claim
    pub fn iss(&self) -> Option<&str> {
        self.claim_str("iss")
    }
}

/// Decode and validate a token against the configured secret, skew,
/// and issuer.
pub fn decode(token: &str, options: &JwtOptions) -> Result<JwtToken, JwtError> {
    decode_at(token, options, epoch_seconds())
}

pub(crate) fn decode_at(token: &str, options: &JwtOptions, now: u64) -> Result<JwtToken, JwtError> {
    let mut segments = token.split('.');
    let (Some(header), Some(payload), Some(signature), None) = (
        segments.next(),
        segments.next(),
        segments.next(),
        segments.next(),
    ) else {
        return Err(JwtError::InvalidFormat);
    };

    let signing_input_len = header.len() + 1 + payload.len();

    let header = BASE64URL.decode(header).map_err(|_| JwtError::InvalidBase64)?;
    let payload_bytes = BASE64URL
        .decode(payload)
        .map_err(|_| JwtError::InvalidBase64)?;
    let signature = BASE64URL
        .decode(signature)
        .map_err(|_| JwtError::InvalidBase64)?;

    let header: Value = serde_json::from_slice(&header).map_err(|_| JwtError::InvalidJson)?;
    let Value::Object(header) = header else {
        return Err(JwtError::InvalidJson);
    };

    match header.get("alg").and_then(Value::as_str) {
        Some("HS256") => {}
        _ => return Err(JwtError::UnsupportedAlg),
    }

    let mut mac = HmacSha256::new_from_slice(&options.secret)
        .map_err(|_| JwtError::BadSignature)?;
    mac.update(&token.as_bytes()[..signing_input_len]);
    mac.verify_slice(&signature)
        .map_err(|_| JwtError::BadSignature)?;

    let raw_payload =
        String::from_utf8(payload_bytes).map_err(|_| JwtError::InvalidJson)?;
    let payload: Value =
        serde_json::from_str(&raw_payload).map_err(|_| JwtError::InvalidJson)?;
    let Value::Object(payload) = payload else {
        return Err(JwtError::InvalidJsonOptions);
    };

    let token = JwtToken {
        header,
        payload,
        raw_payload,
        signature,
    };

    validate_claims(&token, options, now)?;
    Ok(token)
}

fn validate_claims(token: &JwtToken, options: &JwtOptions, now: u64) -> Result<(), JwtError> {
    let skew = options.skew_seconds;

    if options.validate_exp {
        if let Some(exp) = token.claim_seconds("exp") {
            if now.saturating_sub(skew) > exp {
                return Err(JwtError::Expired);
            }
        }
    }

    if options.validate_nbf {
        if let Some(nbf) = token.claim_seconds("nbf") {
            if now.saturating_add(skew) < nbf {
                return Err(JwtError::NotYetValid);
            }
        }
    }

    if options.validate_iss {
        if let Some(valid_issuer) = &options.valid_issuer {
            if token.iss() != Some(valid_issuer.as_str()) {
                return Err(JwtError::InvalidIssuer);
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn options() -> JwtOptions {
        JwtOptions::new(b"k".to_vec())
    }

    #[test]
    fn round_trip_preserves_claims() {
        let mut custom = Map::new();
        custom.insert("role".into(), json!("admin"));

        let token = encode(
            b"k",
            Claims::new().with_sub("u").with_exp(epoch_seconds() + 60),
            &custom,
        )
        .unwrap();

        let decoded = decode(&token, &options()).unwrap();
        assert_eq!(decoded.sub(), Some("u"));
        assert_eq!(decoded.claim_str("role"), Some("admin"));
        assert_eq!(
            decoded.header().get("alg").and_then(Value::as_str),
            Some("HS256")
        );
    }

    #[test]
    fn duplicate_custom_claim_is_an_error() {
        let mut custom = Map::new();
        custom.insert("sub".into(), json!("other"));

        assert_eq!(
            encode(b"k", Claims::new().with_sub("u"), &custom),
            Err(EncodeError::DuplicateClaim("sub".into()))
        );
    }

    #[test]
    fn wrong_secret_is_a_bad_signature() {
        let token = encode(b"k", Claims::new().with_sub("u"), &Map::new()).unwrap();
        assert_eq!(
            decode(&token, &JwtOptions::new(b"other".to_vec())).unwrap_err(),
            JwtError::BadSignature
        );
    }

    #[test]
    fn tampered_payload_is_a_bad_signature() {
        let token = encode(b"k", Claims::new().with_sub("u"), &Map::new()).unwrap();
        let mut segments = token.split('.').map(String::from).collect::<Vec<_>>();
        segments[1] = BASE64URL.encode(r#"{"sub":"mallory"}"#);
        assert_eq!(
            decode(&segments.join("."), &options()).unwrap_err(),
            JwtError::BadSignature
        );
    }

    #[test]
    fn expiry_honors_skew() {
        let now = 1_700_000_000;
        let token = encode(b"k", Claims::new().with_exp(now - 10), &Map::new()).unwrap();
        assert!(decode_at(&token, &options(), now).is_ok());

        let token = encode(b"k", Claims::new().with_exp(now - 31), &Map::new()).unwrap();
        assert_eq!(
            decode_at(&token, &options(), now).unwrap_err(),
            JwtError::Expired
        );

        assert!(decode_at(
            &token,
            &options().without_exp_validation(),
            now
        )
        .is_ok());
    }

    #[test]
    fn not_before_honors_skew() {
        let now = 1_700_000_000;
        let token = encode(b"k", Claims::new().with_nbf(now + 10), &Map::new()).unwrap();
        assert!(decode_at(&token, &options(), now).is_ok());

        let token = encode(b"k", Claims::new().with_nbf(now + 31), &Map::new()).unwrap();
        assert_eq!(
            decode_at(&token, &options(), now).unwrap_err(),
            JwtError::NotYetValid
        );
    }

    #[test]
    fn issuer_equality_when_configured() {
        let token = encode(b"k", Claims::new().with_iss("sorrel"), &Map::new()).unwrap();
        assert!(decode(&token, &options().with_valid_issuer("sorrel")).is_ok());
        assert_eq!(
            decode(&token, &options().with_valid_issuer("someone-else")).unwrap_err(),
            JwtError::InvalidIssuer
        );
        // no configured issuer means no check
        assert!(decode(&token, &options()).is_ok());
    }

    #[test]
    fn non_hs256_tokens_are_rejected() {
        let header = BASE64URL.encode(r#"{"alg":"none","typ":"JWT"}"#);
        let payload = BASE64URL.encode(r#"{"sub":"u"}"#);
        let forged = format!("{header}.{payload}.");
        assert_eq!(
            decode(&forged, &options()).unwrap_err(),
            JwtError::UnsupportedAlg
        );
    }

    #[test]
    fn format_errors() {
        assert_eq!(
            decode("a.b", &options()).unwrap_err(),
            JwtError::InvalidFormat
        );
        assert_eq!(
            decode("a.b.c.d", &options()).unwrap_err(),
            JwtError::InvalidFormat
        );
        assert_eq!(
            decode("!!!.###.$$$", &options()).unwrap_err(),
            JwtError::InvalidBase64
        );
    }

    #[test]
    fn payload_must_be_a_json_object() {
        let header = BASE64URL.encode(r#"{"alg":"HS256","typ":"JWT"}"#);
        let payload = BASE64URL.encode("[1,2,3]");
        let input = format!("{header}.{payload}");
        let signature = BASE64URL.encode(sign(b"k", input.as_bytes()));
        assert_eq!(
            decode(&format!("{input}.{signature}"), &options()).unwrap_err(),
            JwtError::InvalidJsonOptions
        );
    }
}
