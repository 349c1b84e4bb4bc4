use crate::config::ClientConfig;
use crate::error::{ClientError, FetchError};
use crate::pacing::{Pacing, pick_user_agent};
use crate::result::parse_suggestions;
use reqwest::Client;
use reqwest::header::{ACCEPT, ACCEPT_LANGUAGE, HeaderMap, HeaderName, HeaderValue, USER_AGENT};
use std::future::Future;
use std::time::{Duration, Instant};
use tracing::debug;
use url::Url;

/// One external lookup: query in, ordered suggestions out.
///
/// Implementations issue exactly one request per call and never retry;
/// retry policy belongs to the caller.
pub trait SuggestionSource {
    fn fetch(&self, query: &str) -> impl Future<Output = Result<Vec<String>, FetchError>> + Send;
}

/// HTTP client for an autocomplete completion endpoint.
pub struct SuggestionClient {
    client: Client,
    endpoint: Url,
    query_param: String,
    params: Vec<(String, String)>,
    user_agents: Vec<String>,
    pacing: Pacing,
}

impl SuggestionClient {
    pub fn new(config: &ClientConfig) -> Result<Self, ClientError> {
        let endpoint = Url::parse(&config.endpoint)
            .map_err(|e| ClientError::InvalidEndpoint(format!("{}: {}", config.endpoint, e)))?;

        let timeout = Duration::try_from_secs_f64(config.timeout_secs)
            .ok()
            .filter(|t| !t.is_zero())
            .ok_or_else(|| {
                ClientError::InvalidPacing(format!("timeout {}s must be positive", config.timeout_secs))
            })?;

        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        headers.insert(ACCEPT_LANGUAGE, HeaderValue::from_static("en-US,en;q=0.9"));
        for (name, value) in &config.headers {
            let header_name = HeaderName::from_bytes(name.as_bytes())
                .map_err(|e| ClientError::InvalidHeader(format!("{}: {}", name, e)))?;
            let header_value = HeaderValue::from_str(value)
                .map_err(|e| ClientError::InvalidHeader(format!("{}: {}", name, e)))?;
            headers.insert(header_name, header_value);
        }

        let client = Client::builder()
            .default_headers(headers)
            .timeout(timeout)
            .connect_timeout(timeout)
            .pool_max_idle_per_host(1)
            .pool_idle_timeout(Duration::from_secs(90))
            .tcp_keepalive(Duration::from_secs(60))
            .redirect(reqwest::redirect::Policy::limited(5))
            .build()?;

        Ok(Self {
            client,
            endpoint,
            query_param: config.query_param.clone(),
            params: config
                .params
                .iter()
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect(),
            user_agents: config.user_agents.clone(),
            pacing: Pacing::new(config.min_delay_secs, config.max_delay_secs)?,
        })
    }

    pub fn with_pacing(mut self, pacing: Pacing) -> Self {
        self.pacing = pacing;
        self
    }

    /// Full request URL for a query: fixed params first, then the prefix.
    pub fn request_url(&self, query: &str) -> Url {
        let mut url = self.endpoint.clone();
        {
            let mut pairs = url.query_pairs_mut();
            for (key, value) in &self.params {
                pairs.append_pair(key, value);
            }
            pairs.append_pair(&self.query_param, query);
        }
        url
    }
}

impl SuggestionSource for SuggestionClient {
    async fn fetch(&self, query: &str) -> Result<Vec<String>, FetchError> {
        self.pacing.pause().await;

        let url = self.request_url(query);
        let user_agent = pick_user_agent(&self.user_agents);
        debug!("Fetching suggestions for '{}'", query);

        let start = Instant::now();
        let response = self
            .client
            .get(url)
            .header(USER_AGENT, user_agent)
            .send()
            .await
            .map_err(|e| FetchError::from_reqwest(query, e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::transient(query, format!("HTTP {}", status)));
        }

        let body = response
            .text()
            .await
            .map_err(|e| FetchError::from_reqwest(query, e))?;

        let suggestions = parse_suggestions(&body).map_err(|e| FetchError::permanent(query, e))?;
        debug!(
            "'{}' returned {} suggestions in {:?}",
            query,
            suggestions.len(),
            start.elapsed()
        );

        Ok(suggestions)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::{
        Mock, MockServer, ResponseTemplate,
        matchers::{header, method, path, query_param},
    };

    const API_PATH: &str = "/api/2017/suggestions";

    fn test_config(server: &MockServer) -> ClientConfig {
        ClientConfig {
            endpoint: format!("{}{}", server.uri(), API_PATH),
            timeout_secs: 2.0,
            min_delay_secs: 0.0,
            max_delay_secs: 0.0,
            ..ClientConfig::default()
        }
    }

    #[tokio::test]
    async fn test_fetch_returns_suggestions_in_order() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path(API_PATH))
            .and(query_param("prefix", "crossword for kids"))
            .and(query_param("mid", "ATVPDKIKX0DER"))
            .and(query_param("alias", "aps"))
            .and(header("accept", "application/json"))
            .respond_with(ResponseTemplate::new(200).set_body_string(
                r#"{"suggestions":[{"value":"crossword for kids ages 8-12"},{"value":"crossword for kids easy"}]}"#,
            ))
            .expect(1)
            .mount(&mock_server)
            .await;

        let client = SuggestionClient::new(&test_config(&mock_server)).unwrap();
        let suggestions = client.fetch("crossword for kids").await.unwrap();

        assert_eq!(
            suggestions,
            vec!["crossword for kids ages 8-12", "crossword for kids easy"]
        );
    }

    #[tokio::test]
    async fn test_fetch_empty_response_is_not_an_error() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path(API_PATH))
            .respond_with(ResponseTemplate::new(200).set_body_string(r#"{"suggestions":[]}"#))
            .mount(&mock_server)
            .await;

        let client = SuggestionClient::new(&test_config(&mock_server)).unwrap();
        assert!(client.fetch("zzzz").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_server_error_is_transient() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path(API_PATH))
            .respond_with(ResponseTemplate::new(503))
            .expect(1)
            .mount(&mock_server)
            .await;

        let client = SuggestionClient::new(&test_config(&mock_server)).unwrap();
        let err = client.fetch("sudoku").await.unwrap_err();

        assert!(err.is_transient(), "expected transient, got {:?}", err);
        assert!(err.reason().contains("503"));
    }

    #[tokio::test]
    async fn test_malformed_body_is_permanent() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path(API_PATH))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>captcha</html>"))
            .mount(&mock_server)
            .await;

        let client = SuggestionClient::new(&test_config(&mock_server)).unwrap();
        let err = client.fetch("maze").await.unwrap_err();

        assert!(!err.is_transient());
    }

    #[tokio::test]
    async fn test_timeout_is_transient() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path(API_PATH))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_string(r#"{"suggestions":[]}"#)
                    .set_delay(Duration::from_millis(1500)),
            )
            .mount(&mock_server)
            .await;

        let config = ClientConfig {
            timeout_secs: 0.2,
            ..test_config(&mock_server)
        };
        let client = SuggestionClient::new(&config).unwrap();
        let err = client.fetch("kakuro").await.unwrap_err();

        assert!(err.is_transient(), "timeout should be retryable: {:?}", err);
    }

    #[tokio::test]
    async fn test_configured_headers_are_sent() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path(API_PATH))
            .and(header("x-marketplace", "us"))
            .and(header("user-agent", "test-agent"))
            .respond_with(ResponseTemplate::new(200).set_body_string(r#"{"suggestions":[{"value":"maze"}]}"#))
            .expect(1)
            .mount(&mock_server)
            .await;

        let mut config = test_config(&mock_server);
        config
            .headers
            .insert("x-marketplace".to_string(), "us".to_string());
        config.user_agents = vec!["test-agent".to_string()];

        let client = SuggestionClient::new(&config).unwrap();
        assert_eq!(client.fetch("maze").await.unwrap(), vec!["maze"]);
    }

    #[test]
    fn test_invalid_endpoint_rejected() {
        let config = ClientConfig {
            endpoint: "not a url".to_string(),
            ..ClientConfig::default()
        };
        assert!(matches!(
            SuggestionClient::new(&config),
            Err(ClientError::InvalidEndpoint(_))
        ));
    }

    #[test]
    fn test_request_url_encodes_prefix() {
        let client = SuggestionClient::new(&ClientConfig::default()).unwrap();
        let url = client.request_url("word search book for kids");
        let pairs: Vec<(String, String)> = url
            .query_pairs()
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
            .collect();

        assert_eq!(
            pairs,
            vec![
                ("alias".to_string(), "aps".to_string()),
                ("mid".to_string(), "ATVPDKIKX0DER".to_string()),
                ("prefix".to_string(), "word search book for kids".to_string()),
            ]
        );
    }
}
