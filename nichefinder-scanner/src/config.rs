use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub const DEFAULT_ENDPOINT: &str = "https://completion.amazon.com/api/2017/suggestions";

/// Fallback User-Agent used when the configured pool is empty.
pub const CRATE_USER_AGENT: &str = "Nichefinder/0.1";

pub const DEFAULT_USER_AGENTS: &[&str] = &[
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:125.0) Gecko/20100101 Firefox/125.0",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.4 Safari/605.1.15",
    "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/123.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/123.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:124.0) Gecko/20100101 Firefox/124.0",
    "Mozilla/5.0 (X11; Ubuntu; Linux x86_64; rv:125.0) Gecko/20100101 Firefox/125.0",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10.15; rv:125.0) Gecko/20100101 Firefox/125.0",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36 Edg/124.0.0.0",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36 OPR/110.0.0.0",
];

/// Settings for the suggestion endpoint and request pacing
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Completion endpoint, without the query string
    pub endpoint: String,

    /// Name of the query parameter carrying the search prefix
    pub query_param: String,

    /// Fixed query parameters sent with every request
    pub params: BTreeMap<String, String>,

    /// Extra request headers
    pub headers: BTreeMap<String, String>,

    /// Pool of User-Agent strings, one picked at random per request
    pub user_agents: Vec<String>,

    /// Per-request timeout in seconds
    pub timeout_secs: f64,

    /// Lower bound of the random pause before each request, in seconds
    pub min_delay_secs: f64,

    /// Upper bound of the random pause before each request, in seconds
    pub max_delay_secs: f64,
}

impl Default for ClientConfig {
    fn default() -> Self {
        let params = BTreeMap::from([
            ("mid".to_string(), "ATVPDKIKX0DER".to_string()),
            ("alias".to_string(), "aps".to_string()),
        ]);

        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            query_param: "prefix".to_string(),
            params,
            headers: BTreeMap::new(),
            user_agents: DEFAULT_USER_AGENTS.iter().map(|ua| ua.to_string()).collect(),
            timeout_secs: 10.0,
            min_delay_secs: 1.0,
            max_delay_secs: 3.0,
        }
    }
}
