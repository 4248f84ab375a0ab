use super::{
    build_query_string, sorted_params, AuthArtifact, Credentials, SignRequest, SignatureTarget,
    Signer,
};
use crate::Result;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Md5Layout {
    /// `k=v&k=v` sorted by key, then `&{secret_field}={secret}`.
    KeyValuePairs { secret_field: &'static str },
    /// Values concatenated in key order, then the secret.
    ValuesOnly,
}

#[derive(Clone, Debug)]
pub struct Md5Signer {
    pub layout: Md5Layout,
    pub uppercase: bool,
    pub signature: SignatureTarget,
    pub key_param: Option<&'static str>,
    pub timestamp_param: Option<&'static str>,
}

impl Md5Signer {
    pub fn digest_message(&self, params: &[(String, String)], secret: &str) -> String {
        match self.layout {
            Md5Layout::KeyValuePairs { secret_field } => {
                let query = build_query_string(params);
                if query.is_empty() {
                    format!("{secret_field}={secret}")
                } else {
                    format!("{query}&{secret_field}={secret}")
                }
            }
            Md5Layout::ValuesOnly => {
                let mut message: String = params.iter().map(|(_, value)| value.as_str()).collect();
                message.push_str(secret);
                message
            }
        }
    }
}

impl Signer for Md5Signer {
    fn sign(&self, request: &SignRequest<'_>, credentials: &Credentials) -> Result<AuthArtifact> {
        credentials.ensure_present()?;

        let mut params = request.params.to_vec();
        if let Some(name) = self.key_param {
            params.push((name.to_string(), credentials.api_key.clone()));
        }
        if let Some(name) = self.timestamp_param {
            params.push((name.to_string(), request.timestamp_ms.to_string()));
        }
        let params = sorted_params(&params);

        let message = self.digest_message(&params, &credentials.api_secret);
        let digest = format!("{:x}", md5::compute(message.as_bytes()));
        let signature = if self.uppercase {
            digest.to_uppercase()
        } else {
            digest
        };

        let mut artifact = AuthArtifact {
            params,
            ..AuthArtifact::default()
        };
        self.signature.attach(&mut artifact, signature);
        Ok(artifact)
    }
}
