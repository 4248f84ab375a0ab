#![allow(dead_code)]

use reqwest::{Method, Url};
use std::fs;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use tradebridge::clock::FixedClock;
use tradebridge::config::ExchangeConfig;
use tradebridge::exchange::{self, Collaborators, Exchange};
use tradebridge::registry::Registry;
use tradebridge::transport::{HttpRequest, HttpResponse, Transport};
use tradebridge::{Error, Result};

pub const BASE_URL: &str = "http://mock.local";
pub const START_MS: i64 = 1_700_000_000_000;

struct Route {
    method: Method,
    path: String,
    status: u16,
    body: String,
}

/// Scripted transport: answers by (method, path) and records every request.
/// A later route for the same key wins.
#[derive(Default)]
pub struct MockTransport {
    routes: Mutex<Vec<Route>>,
    requests: Mutex<Vec<HttpRequest>>,
}

impl MockTransport {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn respond(&self, method: Method, path: &str, status: u16, body: impl Into<String>) {
        self.routes.lock().expect("routes").push(Route {
            method,
            path: path.to_string(),
            status,
            body: body.into(),
        });
    }

    pub fn respond_ok(&self, method: Method, path: &str, body: impl Into<String>) {
        self.respond(method, path, 200, body);
    }

    pub fn respond_fixture(&self, method: Method, path: &str, name: &str) {
        self.respond(method, path, 200, fixture(name));
    }

    pub fn requests(&self) -> Vec<HttpRequest> {
        self.requests.lock().expect("requests").clone()
    }

    pub fn count(&self, path: &str) -> usize {
        self.requests()
            .iter()
            .filter(|request| path_of(&request.url) == path)
            .count()
    }

    pub fn last(&self) -> HttpRequest {
        self.requests().pop().expect("at least one request")
    }
}

fn path_of(url: &str) -> &str {
    let rest = url.strip_prefix(BASE_URL).unwrap_or(url);
    rest.split('?').next().unwrap_or(rest)
}

/// Form-decoded query parameters of a recorded request, in order.
pub fn query_params(request: &HttpRequest) -> Vec<(String, String)> {
    let url = Url::parse(&request.url).expect("recorded url");
    url.query_pairs()
        .map(|(key, value)| (key.into_owned(), value.into_owned()))
        .collect()
}

pub fn query_value(request: &HttpRequest, key: &str) -> Option<String> {
    query_params(request)
        .into_iter()
        .find(|(name, _)| name == key)
        .map(|(_, value)| value)
}

impl Transport for MockTransport {
    fn send(&self, request: &HttpRequest) -> Result<HttpResponse> {
        self.requests
            .lock()
            .expect("requests")
            .push(request.clone());
        let path = path_of(&request.url);
        let routes = self.routes.lock().expect("routes");
        let route = routes
            .iter()
            .rev()
            .find(|route| route.method == request.method && route.path == path)
            .ok_or_else(|| Error::Transport(format!("no route for {} {path}", request.method)))?;
        Ok(HttpResponse {
            status: route.status,
            body: route.body.clone().into_bytes(),
        })
    }
}

pub fn fixture_path(name: &str) -> PathBuf {
    let mut path = PathBuf::from(env!("CARGO_MANIFEST_DIR"));
    path.push("tests");
    path.push("fixtures");
    path.push(name);
    path
}

pub fn fixture(name: &str) -> String {
    fs::read_to_string(fixture_path(name)).expect("read fixture")
}

pub fn private_key_pem() -> String {
    fixture("rsa_private_pkcs8.pem")
}

pub fn public_config(name: &str) -> ExchangeConfig {
    ExchangeConfig::defaults_for(name)
        .expect("known exchange")
        .with_base_url(BASE_URL)
}

pub fn private_config(name: &str) -> ExchangeConfig {
    let secret = if name == "lbank" {
        private_key_pem()
    } else {
        "secret".to_string()
    };
    let config = public_config(name).with_credentials("key", secret);
    if name == "okx" {
        config.with_passphrase("phrase")
    } else {
        config
    }
}

pub struct Harness {
    pub transport: Arc<MockTransport>,
    pub clock: Arc<FixedClock>,
    pub registry: Arc<Registry>,
}

impl Harness {
    pub fn new() -> Self {
        Self {
            transport: MockTransport::new(),
            clock: Arc::new(FixedClock::at_millis(START_MS)),
            registry: Arc::new(Registry::new()),
        }
    }

    pub fn collaborators(&self) -> Collaborators {
        Collaborators::new(
            self.transport.clone(),
            self.clock.clone(),
            self.registry.clone(),
        )
    }

    pub fn build(&self, config: ExchangeConfig) -> Arc<dyn Exchange> {
        exchange::build(&config, self.collaborators()).expect("build exchange")
    }

    pub fn private(&self, name: &str) -> Arc<dyn Exchange> {
        self.build(private_config(name))
    }

    pub fn public(&self, name: &str) -> Arc<dyn Exchange> {
        self.build(public_config(name))
    }
}
