use super::{AuthArtifact, Credentials, SignRequest, Signer};
use crate::{Error, Result};
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use serde::Serialize;

/// Three-part HS256 bearer token whose payload carries the key and a nonce.
#[derive(Clone, Debug)]
pub struct TokenSigner {
    pub token_type: &'static str,
    pub header: &'static str,
}

#[derive(Debug, Serialize)]
pub struct TokenClaims<'a> {
    #[serde(rename = "type")]
    pub kind: &'a str,
    pub sub: &'a str,
    pub nonce: String,
}

impl TokenSigner {
    pub fn token(&self, nonce: u64, credentials: &Credentials) -> Result<String> {
        credentials.ensure_present()?;
        let claims = TokenClaims {
            kind: self.token_type,
            sub: &credentials.api_key,
            nonce: nonce.to_string(),
        };
        encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(credentials.api_secret.as_bytes()),
        )
        .map_err(|err| Error::Signing(format!("token encode failed: {err}")))
    }
}

impl Signer for TokenSigner {
    fn sign(&self, request: &SignRequest<'_>, credentials: &Credentials) -> Result<AuthArtifact> {
        let token = self.token(request.nonce, credentials)?;
        Ok(AuthArtifact {
            params: request.params.to_vec(),
            headers: vec![(self.header.to_string(), format!("Bearer {token}"))],
            body: None,
        })
    }
}
