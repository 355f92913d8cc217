//! Remote SPARQL endpoint executor (SPARQL 1.1 Protocol, query via POST form).

use crate::error::{Error, Result};
use crate::parsing::sparql_results::{parse_results, RawRow};
use crate::querying::query_processing::QueryExecutor;
use reqwest::blocking::Client;
use reqwest::header::ACCEPT;
use serde::{Deserialize, Serialize};
use std::time::Duration;

pub const SPARQL_RESULTS_JSON: &str = "application/sparql-results+json";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EndpointConfig {
    pub url: String,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_timeout_secs() -> u64 {
    60
}

impl EndpointConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self { url: url.into(), username: None, password: None, timeout_secs: default_timeout_secs() }
    }

    pub fn with_credentials(mut self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.username = Some(username.into());
        self.password = Some(password.into());
        self
    }
}

pub struct HttpSparqlExecutor {
    client: Client,
    config: EndpointConfig,
}

impl HttpSparqlExecutor {
    /// Build the executor. Must not be called from inside an async context;
    /// the blocking client owns its own runtime.
    pub fn new(config: EndpointConfig) -> Result<Self> {
        if config.url.trim().is_empty() {
            return Err(Error::Config("SPARQL endpoint URL is empty".to_string()));
        }
        let client = Client::builder().timeout(Duration::from_secs(config.timeout_secs)).build()?;
        Ok(Self { client, config })
    }

    pub fn config(&self) -> &EndpointConfig {
        &self.config
    }
}

impl QueryExecutor for HttpSparqlExecutor {
    fn execute(&self, sparql: &str) -> Result<Vec<RawRow>> {
        let mut request = self
            .client
            .post(&self.config.url)
            .header(ACCEPT, SPARQL_RESULTS_JSON)
            .form(&[("query", sparql)]);
        if let Some(username) = &self.config.username {
            request = request.basic_auth(username, self.config.password.as_deref());
        }

        let response = request.send()?;
        let status = response.status();
        let body = response.text()?;
        if !status.is_success() {
            return Err(Error::Query(format!(
                "endpoint {} answered {}: {}",
                self.config.url,
                status,
                body.chars().take(500).collect::<String>()
            )));
        }

        parse_results(&body)
    }

    fn name(&self) -> &'static str {
        "http"
    }
}
