/// Validation parameters for [`decode`][crate::decode].
///
/// The skew is applied on both ends: a token is accepted until
/// `exp + skew` and from `nbf - skew`. Issuer equality is only
/// enforced when a valid issuer is configured.
#[derive(Debug, Clone)]
pub struct JwtOptions {
    pub(crate) secret: Vec<u8>,
    pub(crate) skew_seconds: u64,
    pub(crate) valid_issuer: Option<String>,
    pub(crate) validate_exp: bool,
    pub(crate) validate_nbf: bool,
    pub(crate) validate_iss: bool,
}

impl JwtOptions {
    /// options with the provided signing secret and the defaults: 30
    /// seconds of skew, every validation enabled, no required issuer
    pub fn new(secret: impl Into<Vec<u8>>) -> Self {
        Self {
            secret: secret.into(),
            skew_seconds: 30,
            valid_issuer: None,
            validate_exp: true,
            validate_nbf: true,
            validate_iss: true,
        }
    }

    /// allowed clock skew in seconds. default 30
    pub fn with_skew_seconds(mut self, skew_seconds: u64) -> Self {
        self.skew_seconds = skew_seconds;
        self
    }

    /// require `iss` to equal this value
    pub fn with_valid_issuer(mut self, issuer: impl Into<String>) -> Self {
        self.valid_issuer = Some(issuer.into());
        self
    }

    /// disable expiry validation
    pub fn without_exp_validation(mut self) -> Self {
        self.validate_exp = false;
        self
    }

    /// disable not-before validation
    pub fn without_nbf_validation(mut self) -> Self {
        self.validate_nbf = false;
        self
    }

    /// disable issuer validation
    pub fn without_iss_validation(mut self) -> Self {
        self.validate_iss = false;
        self
    }
}
