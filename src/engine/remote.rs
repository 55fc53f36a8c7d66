//! Mock engine adapter backed by an external contract-mock service.
//!
//! # Responsibilities
//! - Forward method, path, headers and body to the engine's base URL
//! - Honour a ProxyDirective: send the request through the validating proxy
//!   when one is configured, otherwise straight to the directive's upstream
//! - Split the engine's violation report into input and output violations
//! - Enforce the adapter timeout
//!
//! # Design Decisions
//! - Hop-by-hop headers stripped in both directions
//! - Violation report travels in a response header as a JSON array; entries
//!   located under `request` are input violations, all others output
//! - A malformed report is logged and treated as no violations

use std::time::Duration;

use axum::body::{Body, Bytes};
use axum::http::header::{self, HeaderMap, HeaderName};
use axum::http::{Request, Uri};
use async_trait::async_trait;
use hyper_util::{
    client::legacy::{connect::HttpConnector, Client},
    rt::TokioExecutor,
};
use url::Url;

use crate::config::EngineConfig;
use crate::engine::{
    EngineError, EngineRequest, EngineResponse, MockEngine, ProxyDirective, Violations,
};

const HOP_BY_HOP: [HeaderName; 6] = [
    header::CONNECTION,
    header::PROXY_AUTHENTICATE,
    header::PROXY_AUTHORIZATION,
    header::TE,
    header::TRAILER,
    header::TRANSFER_ENCODING,
];

/// Adapter forwarding to an external contract-mock service over HTTP.
#[derive(Clone)]
pub struct HttpMockEngine {
    base: Url,
    proxy: Option<Url>,
    client: Client<HttpConnector, Body>,
    timeout_secs: u64,
    violations_header: HeaderName,
}

impl HttpMockEngine {
    /// Create the adapter from configuration.
    pub fn new(config: &EngineConfig) -> Result<Self, EngineError> {
        let base = Url::parse(&config.url)
            .map_err(|e| EngineError::InvalidUrl(format!("'{}': {}", config.url, e)))?;
        let proxy = config
            .proxy_url
            .as_deref()
            .map(|url| {
                Url::parse(url).map_err(|e| EngineError::InvalidUrl(format!("'{}': {}", url, e)))
            })
            .transpose()?;
        let violations_header = HeaderName::from_bytes(config.violations_header.as_bytes())
            .map_err(|e| {
                EngineError::InvalidUrl(format!(
                    "bad violations header '{}': {}",
                    config.violations_header, e
                ))
            })?;

        let client = Client::builder(TokioExecutor::new()).build(HttpConnector::new());

        Ok(Self {
            base,
            proxy,
            client,
            timeout_secs: config.timeout_secs,
            violations_header,
        })
    }

    /// Resolve the URL a request is sent to.
    ///
    /// A directed request goes to the validating proxy, which forwards it to
    /// the directive's upstream itself. Without one it goes to the upstream
    /// directly.
    pub fn target_url(&self, path: &str, proxy: Option<&ProxyDirective>) -> Url {
        let base = match proxy {
            Some(directive) if directive.is_proxy => {
                self.proxy.as_ref().unwrap_or(&directive.upstream)
            }
            _ => &self.base,
        };

        let (path, query) = match path.split_once('?') {
            Some((p, q)) => (p, Some(q)),
            None => (path, None),
        };

        let mut url = base.clone();
        url.set_path(&format!(
            "{}/{}",
            base.path().trim_end_matches('/'),
            path.trim_start_matches('/')
        ));
        url.set_query(query);
        url
    }

    fn split_violations(&self, headers: &HeaderMap) -> Violations {
        let mut violations = Violations::default();

        let Some(raw) = headers.get(&self.violations_header) else {
            return violations;
        };

        let parsed: Vec<serde_json::Value> = match raw
            .to_str()
            .ok()
            .and_then(|s| serde_json::from_str(s).ok())
        {
            Some(list) => list,
            None => {
                tracing::warn!(
                    header = %self.violations_header,
                    "Ignoring malformed violation report from mock engine"
                );
                return violations;
            }
        };

        for violation in parsed {
            let is_input = violation
                .get("location")
                .and_then(|l| l.get(0))
                .and_then(|l| l.as_str())
                == Some("request");
            if is_input {
                violations.input.push(violation);
            } else {
                violations.output.push(violation);
            }
        }

        violations
    }
}

fn strip_hop_by_hop(headers: &mut HeaderMap) {
    for name in HOP_BY_HOP.iter() {
        headers.remove(name);
    }
}

#[async_trait]
impl MockEngine for HttpMockEngine {
    async fn request(
        &self,
        request: EngineRequest,
        proxy: Option<ProxyDirective>,
    ) -> Result<EngineResponse, EngineError> {
        let target = self.target_url(&request.path, proxy.as_ref());
        let uri: Uri = target
            .as_str()
            .parse()
            .map_err(|e| EngineError::InvalidUrl(format!("'{}': {}", target, e)))?;

        tracing::debug!(
            method = %request.verb(),
            target = %target,
            proxied = proxy.is_some(),
            "Forwarding to mock engine"
        );

        let mut headers = request.headers;
        strip_hop_by_hop(&mut headers);
        headers.remove(header::HOST);

        let mut outbound = Request::builder()
            .method(request.method)
            .uri(uri)
            .body(Body::from(request.body))
            .map_err(|e| EngineError::InvalidUrl(e.to_string()))?;
        *outbound.headers_mut() = headers;

        let response = tokio::time::timeout(
            Duration::from_secs(self.timeout_secs),
            self.client.request(outbound),
        )
        .await
        .map_err(|_| EngineError::Timeout(self.timeout_secs))?
        .map_err(|e| EngineError::Transport(e.to_string()))?;

        let (parts, body) = response.into_parts();
        let body: Bytes = axum::body::to_bytes(Body::new(body), usize::MAX)
            .await
            .map_err(|e| EngineError::Body(e.to_string()))?;

        let violations = self.split_violations(&parts.headers);
        let mut headers = parts.headers;
        strip_hop_by_hop(&mut headers);
        headers.remove(&self.violations_header);

        Ok(EngineResponse {
            status: parts.status,
            headers,
            body,
            violations,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn engine(url: &str) -> HttpMockEngine {
        HttpMockEngine::new(&EngineConfig {
            url: url.to_string(),
            ..EngineConfig::default()
        })
        .unwrap()
    }

    #[test]
    fn test_target_url_engine_base() {
        let e = engine("http://127.0.0.1:4010");

        assert_eq!(
            e.target_url("/api/users?page=2", None).as_str(),
            "http://127.0.0.1:4010/api/users?page=2"
        );
    }

    #[test]
    fn test_target_url_keeps_base_path() {
        let e = engine("http://127.0.0.1:4010/mock");

        assert_eq!(
            e.target_url("/api/users", None).as_str(),
            "http://127.0.0.1:4010/mock/api/users"
        );
    }

    #[test]
    fn test_target_url_proxy_upstream() {
        let e = engine("http://127.0.0.1:4010");
        let directive = ProxyDirective::local(6677).unwrap();

        assert_eq!(
            e.target_url("/api/custom", Some(&directive)).as_str(),
            "http://localhost:6677/_/api/custom"
        );
    }

    #[test]
    fn test_target_url_validating_proxy() {
        let e = HttpMockEngine::new(&EngineConfig {
            proxy_url: Some("http://127.0.0.1:4011".to_string()),
            ..EngineConfig::default()
        })
        .unwrap();
        let directive = ProxyDirective::local(6677).unwrap();

        assert_eq!(
            e.target_url("/api/custom?x=1", Some(&directive)).as_str(),
            "http://127.0.0.1:4011/api/custom?x=1"
        );
        assert_eq!(
            e.target_url("/api/users", None).as_str(),
            "http://127.0.0.1:4010/api/users"
        );
    }

    #[test]
    fn test_target_url_colon_segment_is_not_a_scheme() {
        let e = engine("http://127.0.0.1:4010");

        assert_eq!(
            e.target_url("/a:b", None).as_str(),
            "http://127.0.0.1:4010/a:b"
        );
    }

    #[test]
    fn test_split_violations() {
        let e = engine("http://127.0.0.1:4010");
        let mut headers = HeaderMap::new();
        headers.insert(
            "sl-violations",
            HeaderValue::from_static(
                r#"[{"location":["request","query"],"message":"bad"},{"location":["response","body"],"message":"worse"}]"#,
            ),
        );

        let violations = e.split_violations(&headers);
        assert_eq!(violations.input.len(), 1);
        assert_eq!(violations.output.len(), 1);
        assert_eq!(violations.input[0]["message"], "bad");
    }

    #[test]
    fn test_malformed_violations_ignored() {
        let e = engine("http://127.0.0.1:4010");
        let mut headers = HeaderMap::new();
        headers.insert("sl-violations", HeaderValue::from_static("not json"));

        assert!(e.split_violations(&headers).is_empty());
    }

    #[test]
    fn test_rejects_invalid_url() {
        let result = HttpMockEngine::new(&EngineConfig {
            url: "not a url".to_string(),
            ..EngineConfig::default()
        });
        assert!(matches!(result, Err(EngineError::InvalidUrl(_))));

        let result = HttpMockEngine::new(&EngineConfig {
            proxy_url: Some("::".to_string()),
            ..EngineConfig::default()
        });
        assert!(matches!(result, Err(EngineError::InvalidUrl(_))));
    }
}
