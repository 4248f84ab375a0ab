use super::{build_query_string, AuthArtifact, Credentials, SignRequest, Signer};
use crate::{Error, Result};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use chrono::{SecondsFormat, TimeZone, Utc};
use hmac::{Hmac, Mac};
use sha2::{Sha256, Sha384, Sha512};

type HmacSha256 = Hmac<Sha256>;
type HmacSha384 = Hmac<Sha384>;
type HmacSha512 = Hmac<Sha512>;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum HmacDigest {
    Sha256,
    Sha384,
    Sha512,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OutputEncoding {
    Hex,
    Base64,
}

/// How the API secret is turned into key bytes.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SecretEncoding {
    Raw,
    Base64,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TimestampFormat {
    Millis,
    Iso8601,
}

/// The message that gets authenticated.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum HmacPayload {
    /// `k=v&k=v` query string, optionally sorted, optionally with a timestamp field appended first.
    Query {
        sorted: bool,
        timestamp_param: Option<&'static str>,
    },
    /// `timestamp + METHOD + path[?query] + body`.
    Prehash { timestamp: TimestampFormat },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct HeaderNames {
    pub key: &'static str,
    pub signature: &'static str,
    pub timestamp: &'static str,
    pub passphrase: Option<&'static str>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Placement {
    /// Signature appended as a query field; the key optionally sent as a header.
    Param {
        name: &'static str,
        key_header: Option<&'static str>,
    },
    Headers(HeaderNames),
}

#[derive(Clone, Debug)]
pub struct HmacSigner {
    pub digest: HmacDigest,
    pub output: OutputEncoding,
    pub secret: SecretEncoding,
    pub payload: HmacPayload,
    pub placement: Placement,
}

impl HmacSigner {
    pub fn mac(digest: HmacDigest, key: &[u8], message: &[u8]) -> Result<Vec<u8>> {
        let invalid = |_| Error::Signing("invalid hmac key".to_string());
        let bytes = match digest {
            HmacDigest::Sha256 => {
                let mut mac = HmacSha256::new_from_slice(key).map_err(invalid)?;
                mac.update(message);
                mac.finalize().into_bytes().to_vec()
            }
            HmacDigest::Sha384 => {
                let mut mac = HmacSha384::new_from_slice(key).map_err(invalid)?;
                mac.update(message);
                mac.finalize().into_bytes().to_vec()
            }
            HmacDigest::Sha512 => {
                let mut mac = HmacSha512::new_from_slice(key).map_err(invalid)?;
                mac.update(message);
                mac.finalize().into_bytes().to_vec()
            }
        };
        Ok(bytes)
    }

    pub fn hmac_sha256_hex(secret: &str, message: &str) -> Result<String> {
        let bytes = Self::mac(HmacDigest::Sha256, secret.as_bytes(), message.as_bytes())?;
        Ok(hex::encode(bytes))
    }

    fn key_bytes(&self, secret: &str) -> Result<Vec<u8>> {
        match self.secret {
            SecretEncoding::Raw => Ok(secret.as_bytes().to_vec()),
            SecretEncoding::Base64 => STANDARD
                .decode(secret.trim())
                .map_err(|err| Error::Signing(format!("api_secret is not valid base64: {err}"))),
        }
    }

    fn encode(&self, bytes: &[u8]) -> String {
        match self.output {
            OutputEncoding::Hex => hex::encode(bytes),
            OutputEncoding::Base64 => STANDARD.encode(bytes),
        }
    }
}

fn format_timestamp(timestamp_ms: i64, format: TimestampFormat) -> Result<String> {
    match format {
        TimestampFormat::Millis => Ok(timestamp_ms.to_string()),
        TimestampFormat::Iso8601 => Utc
            .timestamp_millis_opt(timestamp_ms)
            .single()
            .map(|time| time.to_rfc3339_opts(SecondsFormat::Millis, true))
            .ok_or_else(|| Error::Signing(format!("timestamp {timestamp_ms} out of range"))),
    }
}

impl Signer for HmacSigner {
    fn sign(&self, request: &SignRequest<'_>, credentials: &Credentials) -> Result<AuthArtifact> {
        credentials.ensure_present()?;
        let key = self.key_bytes(&credentials.api_secret)?;

        let mut params = request.params.to_vec();
        let (message, timestamp) = match self.payload {
            HmacPayload::Query {
                sorted,
                timestamp_param,
            } => {
                if let Some(name) = timestamp_param {
                    params.push((name.to_string(), request.timestamp_ms.to_string()));
                }
                if sorted {
                    params.sort();
                }
                (build_query_string(&params), request.timestamp_ms.to_string())
            }
            HmacPayload::Prehash { timestamp } => {
                let timestamp = format_timestamp(request.timestamp_ms, timestamp)?;
                let query = build_query_string(&params);
                let request_path = if query.is_empty() {
                    request.path.to_string()
                } else {
                    format!("{}?{query}", request.path)
                };
                let body = request.body.unwrap_or("");
                (
                    format!("{timestamp}{}{request_path}{body}", request.method.as_str()),
                    timestamp,
                )
            }
        };

        let signature = self.encode(&Self::mac(self.digest, &key, message.as_bytes())?);

        let mut artifact = AuthArtifact::default();
        match self.placement {
            Placement::Param { name, key_header } => {
                params.push((name.to_string(), signature));
                if let Some(header) = key_header {
                    artifact
                        .headers
                        .push((header.to_string(), credentials.api_key.clone()));
                }
            }
            Placement::Headers(names) => {
                artifact
                    .headers
                    .push((names.key.to_string(), credentials.api_key.clone()));
                artifact
                    .headers
                    .push((names.signature.to_string(), signature));
                artifact
                    .headers
                    .push((names.timestamp.to_string(), timestamp));
                if let Some(header) = names.passphrase {
                    artifact
                        .headers
                        .push((header.to_string(), credentials.passphrase()?.to_string()));
                }
            }
        }
        artifact.params = params;
        Ok(artifact)
    }
}
