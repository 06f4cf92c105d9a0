//! Connection token acquisition.
//!
//! One `POST /api/channels/client` per attempt. Tokens are never cached:
//! every connection starts from a fresh registration.

use tracing::{debug, info};

use wbskt_protocol::constants::CLIENT_REGISTRATION_PATH;
use wbskt_protocol::{ClientConnectionRequest, decode_claims};

use crate::error::AuthError;
use crate::settings::ClientSettings;
use crate::types::ConnectionToken;

/// Exchanges the channel credential for a [`ConnectionToken`].
#[derive(Debug, Clone)]
pub struct TokenProvider {
    http: reqwest::Client,
}

impl TokenProvider {
    pub fn new() -> Result<Self, AuthError> {
        let http = reqwest::Client::builder()
            .user_agent(concat!("wbskt-client/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self { http })
    }

    /// Uses an existing HTTP client (shared connection pool, custom roots).
    pub fn with_client(http: reqwest::Client) -> Self {
        Self { http }
    }

    /// Registers the client and returns the token for one connection.
    ///
    /// Not retried here; the supervisor decides when to try again.
    pub async fn acquire(&self, settings: &ClientSettings) -> Result<ConnectionToken, AuthError> {
        let url = format!(
            "{}://{}{}",
            settings.security.http_scheme(),
            settings.core_server_address,
            CLIENT_REGISTRATION_PATH
        );

        let request = ClientConnectionRequest {
            channel_secret: settings.credential.secret.clone(),
            client_name: settings.identity.name.clone(),
            client_unique_id: settings.identity.unique_id,
            channel_subscriber_id: settings.credential.subscriber_id,
        };

        debug!(%url, client = %settings.identity.name, "requesting connection token");
        let resp = self
            .http
            .post(&url)
            .json(&request)
            .send()
            .await
            .map_err(|source| AuthError::Unreachable {
                url: url.clone(),
                source,
            })?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(AuthError::Rejected {
                status: status.as_u16(),
                body,
            });
        }

        let body = resp.text().await.map_err(|source| AuthError::Unreachable {
            url: url.clone(),
            source,
        })?;
        let bearer = extract_bearer(&body)?;
        let claims = decode_claims(&bearer)?;

        info!(
            token_id = %claims.token_id,
            socket_server = %claims.socket_server_address,
            "connection token received"
        );
        Ok(ConnectionToken::new(bearer, claims))
    }
}

/// Pulls the bearer string out of the response body.
///
/// Accepts a bare token or a JSON string literal, with surrounding whitespace.
fn extract_bearer(body: &str) -> Result<String, AuthError> {
    let trimmed = body.trim();
    let token = if trimmed.len() >= 2 && trimmed.starts_with('"') && trimmed.ends_with('"') {
        serde_json::from_str::<String>(trimmed)
            .map_err(|e| AuthError::MalformedToken(e.to_string()))?
    } else {
        trimmed.to_string()
    };

    if token.is_empty() {
        return Err(AuthError::EmptyToken);
    }
    // Must survive as an `Authorization` header value.
    if token.chars().any(|c| c.is_whitespace() || c.is_control()) {
        return Err(AuthError::MalformedToken(
            "token contains whitespace or control characters".into(),
        ));
    }
    Ok(token)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::settings::test_settings;
    use base64::Engine;
    use base64::engine::general_purpose::URL_SAFE_NO_PAD;
    use wiremock::matchers::{body_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn make_token(addr: &str, id: &str) -> String {
        let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"HS256"}"#);
        let claims = URL_SAFE_NO_PAD.encode(
            serde_json::json!({ "socketServerAddress": addr, "tokenId": id }).to_string(),
        );
        format!("{header}.{claims}.sig")
    }

    fn server_addr(server: &MockServer) -> String {
        server.address().to_string()
    }

    #[test]
    fn extract_bearer_variants() {
        assert_eq!(extract_bearer("a.b.c").unwrap(), "a.b.c");
        assert_eq!(extract_bearer("  a.b.c\n").unwrap(), "a.b.c");
        assert_eq!(extract_bearer("\"a.b.c\"").unwrap(), "a.b.c");
        assert!(matches!(extract_bearer(""), Err(AuthError::EmptyToken)));
        assert!(matches!(extract_bearer("   "), Err(AuthError::EmptyToken)));
        assert!(matches!(extract_bearer("\"\""), Err(AuthError::EmptyToken)));
        assert!(matches!(
            extract_bearer("a.b c"),
            Err(AuthError::MalformedToken(_))
        ));
    }

    #[tokio::test]
    async fn acquire_posts_registration_and_decodes_claims() {
        let server = MockServer::start().await;
        let settings = test_settings(&server_addr(&server));
        let token = make_token("sock.example.com:443", "t1");

        Mock::given(method("POST"))
            .and(path("/api/channels/client"))
            .and(header("content-type", "application/json"))
            .and(body_json(serde_json::json!({
                "channelSecret": "channel-secret",
                "clientName": "test-client",
                "clientUniqueId": "00000000-0000-0000-0000-000000000011",
                "channelSubscriberId": "00000000-0000-0000-0000-000000000022",
            })))
            .respond_with(ResponseTemplate::new(200).set_body_string(token.clone()))
            .expect(1)
            .mount(&server)
            .await;

        let provider = TokenProvider::new().unwrap();
        let acquired = provider.acquire(&settings).await.unwrap();
        assert_eq!(acquired.bearer(), token);
        assert_eq!(acquired.socket_server_address(), "sock.example.com:443");
        assert_eq!(acquired.token_id(), "t1");
    }

    #[tokio::test]
    async fn acquire_rejects_server_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
            .mount(&server)
            .await;

        let provider = TokenProvider::new().unwrap();
        let err = provider
            .acquire(&test_settings(&server_addr(&server)))
            .await
            .unwrap_err();
        match err {
            AuthError::Rejected { status, body } => {
                assert_eq!(status, 500);
                assert_eq!(body, "boom");
            }
            other => panic!("expected Rejected, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn acquire_rejects_empty_body() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;

        let provider = TokenProvider::new().unwrap();
        let err = provider
            .acquire(&test_settings(&server_addr(&server)))
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::EmptyToken));
    }

    #[tokio::test]
    async fn acquire_rejects_unparseable_claims() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_string("opaque-token"))
            .mount(&server)
            .await;

        let provider = TokenProvider::new().unwrap();
        let err = provider
            .acquire(&test_settings(&server_addr(&server)))
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::Claims(_)));
    }

    #[tokio::test]
    async fn acquire_reports_unreachable_server() {
        // Bind and drop a listener to get a port nothing listens on.
        let addr = {
            let l = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
            l.local_addr().unwrap()
        };
        let provider = TokenProvider::new().unwrap();
        let err = provider
            .acquire(&test_settings(&addr.to_string()))
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::Unreachable { .. }));
    }
}
