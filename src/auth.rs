use chrono::{DateTime, TimeDelta, Utc};
use serde::Deserialize;
use serde_json::Value;
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::client::execute_graphql;
use crate::protocol::{login_variables, refresh_form, LOGIN_MUTATION, LOGIN_OPERATION};
use crate::{Error, Result};

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct Token {
    pub token_type: String,
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(skip, default = "Utc::now")]
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    #[serde(flatten)]
    token: Token,
    expires_in: i64,
}

impl TokenResponse {
    fn into_token(self, now: DateTime<Utc>) -> Result<Token> {
        let expires_at = TimeDelta::try_seconds(self.expires_in)
            .and_then(|ttl| now.checked_add_signed(ttl))
            .ok_or_else(|| Error::Authentication(format!("malformed token expires_in: {}", self.expires_in)))?;
        Ok(Token {
            expires_at,
            ..self.token
        })
    }
}

impl Token {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }

    pub fn authorization(&self) -> String {
        format!("{} {}", self.token_type, self.access_token)
    }
}

/// Account credentials and the current OAuth token. The lock is held across
/// login and refresh so concurrent callers share one round trip.
pub(crate) struct Authenticator {
    http: reqwest::Client,
    login_url: String,
    token_url: String,
    client_id: String,
    username: String,
    password: String,
    token: Mutex<Option<Token>>,
}

impl Authenticator {
    pub fn new(
        http: reqwest::Client,
        login_url: String,
        token_url: String,
        client_id: String,
        username: String,
        password: String,
    ) -> Self {
        Self {
            http,
            login_url,
            token_url,
            client_id,
            username,
            password,
            token: Mutex::new(None),
        }
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    pub async fn login(&self) -> Result<()> {
        let mut token = self.token.lock().await;
        *token = Some(self.fetch_login().await?);
        Ok(())
    }

    /// A token that has not expired, logging in or refreshing as needed.
    pub async fn valid_token(&self) -> Result<Token> {
        let mut guard = self.token.lock().await;
        let fresh = match guard.take() {
            None => self.fetch_login().await?,
            Some(token) if token.is_expired(Utc::now()) => self.fetch_refresh(&token).await?,
            Some(token) => token,
        };
        *guard = Some(fresh.clone());
        Ok(fresh)
    }

    async fn fetch_login(&self) -> Result<Token> {
        debug!(username = %self.username, "logging in");
        let data = execute_graphql(
            &self.http,
            &self.login_url,
            None,
            LOGIN_OPERATION,
            LOGIN_MUTATION,
            login_variables(&self.username, &self.password),
        )
        .await?;

        let result = data.get(LOGIN_OPERATION).unwrap_or(&Value::Null);
        if !result.get("success").and_then(Value::as_bool).unwrap_or(false) {
            let reason = result
                .get("errorMessage")
                .and_then(Value::as_str)
                .or_else(|| result.get("status").and_then(Value::as_str))
                .unwrap_or("login rejected");
            return Err(Error::Authentication(reason.to_string()));
        }

        let response: TokenResponse = serde_json::from_value(result.get("data").cloned().unwrap_or_default())
            .map_err(|e| Error::Authentication(format!("malformed login response: {e}")))?;
        info!(username = %self.username, "logged in");
        response.into_token(Utc::now())
    }

    async fn fetch_refresh(&self, current: &Token) -> Result<Token> {
        let Some(refresh_token) = current.refresh_token.as_deref() else {
            return self.fetch_login().await;
        };
        debug!("refreshing access token");
        let resp = self
            .http
            .post(&self.token_url)
            .form(&refresh_form(&self.client_id, refresh_token))
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(Error::Authentication(format!("token refresh rejected ({status}): {body}")));
        }

        let response: TokenResponse = resp
            .json()
            .await
            .map_err(|e| Error::Authentication(format!("malformed refresh response: {e}")))?;
        let mut token = response.into_token(Utc::now())?;
        if token.refresh_token.is_none() {
            token.refresh_token = Some(refresh_token.to_string());
        }
        Ok(token)
    }
}
