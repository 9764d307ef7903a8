//! Short-lived access tokens for the avatar service

use async_trait::async_trait;
use secrecy::SecretString;

use crate::{Error, Result};

/// Issues short-lived credentials for opening avatar sessions
#[async_trait]
pub trait TokenIssuer: Send + Sync {
    /// Fetch a fresh access token
    ///
    /// # Errors
    ///
    /// Returns error if no token could be obtained
    async fn issue(&self) -> Result<SecretString>;
}

/// Fetches tokens from a `POST /api/get-access-token` style endpoint
///
/// The endpoint answers with the bare token as a plain-text body.
pub struct HttpTokenIssuer {
    client: reqwest::Client,
    url: String,
}

impl HttpTokenIssuer {
    /// Create an issuer for the given endpoint URL
    #[must_use]
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            url: url.into(),
        }
    }

    /// Endpoint this issuer calls
    #[must_use]
    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl TokenIssuer for HttpTokenIssuer {
    async fn issue(&self) -> Result<SecretString> {
        let response = self.client.post(&self.url).send().await.map_err(|e| {
            tracing::error!(url = %self.url, error = %e, "token request failed");
            e
        })?;

        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            return Err(Error::Token(format!("token endpoint returned {status}: {body}")));
        }

        parse_token_body(&body)
    }
}

/// Validate a plain-text token body
fn parse_token_body(body: &str) -> Result<SecretString> {
    let token = body.trim();
    if token.is_empty() {
        return Err(Error::Token("token endpoint returned an empty body".to_string()));
    }
    Ok(SecretString::from(token.to_string()))
}

#[cfg(test)]
mod tests {
    use secrecy::ExposeSecret;

    use super::*;

    #[test]
    fn token_body_is_trimmed() {
        let token = parse_token_body("  abc123\n").unwrap();
        assert_eq!(token.expose_secret(), "abc123");
    }

    #[test]
    fn empty_token_body_is_rejected() {
        assert!(matches!(parse_token_body(" \n"), Err(Error::Token(_))));
    }
}
