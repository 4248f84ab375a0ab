use crate::{Error, Result};
use reqwest::blocking::Client;
use reqwest::Method;
use std::time::Duration;

#[derive(Clone, Debug, PartialEq)]
pub struct HttpRequest {
    pub method: Method,
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub body: Option<String>,
}

impl HttpRequest {
    pub fn get(url: impl Into<String>) -> Self {
        Self {
            method: Method::GET,
            url: url.into(),
            headers: Vec::new(),
            body: None,
        }
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct HttpResponse {
    pub status: u16,
    pub body: Vec<u8>,
}

impl HttpResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Blocking "send request, get raw bytes" primitive.
///
/// Implementations own timeouts; nothing above this layer retries.
pub trait Transport: Send + Sync {
    fn send(&self, request: &HttpRequest) -> Result<HttpResponse>;
}

pub struct BlockingTransport {
    client: Client,
}

impl BlockingTransport {
    pub fn new(timeout_secs: u64) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs.max(1)))
            .build()
            .map_err(|err| Error::Transport(format!("http client build failed: {err}")))?;
        Ok(Self { client })
    }
}

impl Transport for BlockingTransport {
    fn send(&self, request: &HttpRequest) -> Result<HttpResponse> {
        let mut builder = self
            .client
            .request(request.method.clone(), request.url.as_str());
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if let Some(body) = &request.body {
            builder = builder
                .header("Content-Type", "application/json")
                .body(body.clone());
        }

        let response = builder
            .send()
            .map_err(|err| Error::Transport(format!("http request failed: {err}")))?;
        let status = response.status().as_u16();
        let body = response
            .bytes()
            .map_err(|err| Error::Transport(format!("http read failed: {err}")))?;
        Ok(HttpResponse {
            status,
            body: body.to_vec(),
        })
    }
}
