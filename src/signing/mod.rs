//! Authentication schemes for private endpoints.
//!
//! A [`Signer`] is a pure function of the request, the credentials and the
//! timestamp/nonce carried in [`SignRequest`]. Adapters pick one scheme at
//! construction time; the context fills in the clock readings.

pub mod digest;
pub mod hmac;
pub mod rsa;
pub mod token;

pub use self::digest::{Md5Layout, Md5Signer};
pub use self::hmac::{
    HeaderNames, HmacDigest, HmacPayload, HmacSigner, OutputEncoding, Placement, SecretEncoding,
    TimestampFormat,
};
pub use self::rsa::RsaSigner;
pub use self::token::TokenSigner;

use crate::{Error, Result};
use reqwest::Method;

#[derive(Clone, Default, PartialEq, Eq)]
pub struct Credentials {
    pub api_key: String,
    pub api_secret: String,
    pub passphrase: Option<String>,
}

impl Credentials {
    pub fn new(api_key: impl Into<String>, api_secret: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            api_secret: api_secret.into(),
            passphrase: None,
        }
    }

    pub fn with_passphrase(mut self, passphrase: impl Into<String>) -> Self {
        self.passphrase = Some(passphrase.into());
        self
    }

    pub fn is_present(&self) -> bool {
        !self.api_key.trim().is_empty() && !self.api_secret.trim().is_empty()
    }

    pub fn ensure_present(&self) -> Result<()> {
        if self.api_key.trim().is_empty() {
            return Err(Error::AuthMissing("api_key must be set".to_string()));
        }
        if self.api_secret.trim().is_empty() {
            return Err(Error::AuthMissing("api_secret must be set".to_string()));
        }
        Ok(())
    }

    pub fn passphrase(&self) -> Result<&str> {
        match self.passphrase.as_deref() {
            Some(value) if !value.trim().is_empty() => Ok(value),
            _ => Err(Error::AuthMissing("passphrase must be set".to_string())),
        }
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("api_key", &self.api_key)
            .field("api_secret", &"<redacted>")
            .field("passphrase", &self.passphrase.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

pub struct SignRequest<'a> {
    pub method: &'a Method,
    pub path: &'a str,
    pub params: &'a [(String, String)],
    pub body: Option<&'a str>,
    pub timestamp_ms: i64,
    pub nonce: u64,
}

/// What a scheme adds to a request.
///
/// `params` is the complete parameter list to send (the originals plus any
/// signature fields), `headers` are appended, and `body` replaces the request
/// body when set.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct AuthArtifact {
    pub params: Vec<(String, String)>,
    pub headers: Vec<(String, String)>,
    pub body: Option<String>,
}

pub trait Signer: Send + Sync {
    fn sign(&self, request: &SignRequest<'_>, credentials: &Credentials) -> Result<AuthArtifact>;
}

/// Where a single-value signature is attached.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SignatureTarget {
    Param(&'static str),
    Header(&'static str),
}

impl SignatureTarget {
    pub(crate) fn attach(self, artifact: &mut AuthArtifact, signature: String) {
        match self {
            SignatureTarget::Param(name) => artifact.params.push((name.to_string(), signature)),
            SignatureTarget::Header(name) => artifact.headers.push((name.to_string(), signature)),
        }
    }
}

pub fn build_query_string(params: &[(String, String)]) -> String {
    params
        .iter()
        .map(|(key, value)| format!("{key}={value}"))
        .collect::<Vec<String>>()
        .join("&")
}

pub fn sorted_params(params: &[(String, String)]) -> Vec<(String, String)> {
    let mut sorted = params.to_vec();
    sorted.sort();
    sorted
}
