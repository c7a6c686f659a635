use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use chrono::NaiveTime;
use reqwest::header::AUTHORIZATION;
use reqwest::StatusCode;
use serde_json::Value;
use tracing::{debug, warn};
use url::Url;

use crate::auth::Authenticator;
use crate::journal::MessageJournal;
use crate::protocol::*;
use crate::realtime::RealtimeSender;
use crate::types::*;
use crate::{Error, Result, System};

pub const DEFAULT_GRAPHQL_URL: &str = "https://dataservice.infinity.iot.carrier.com/graphql";
pub const DEFAULT_LOGIN_URL: &str = "https://dataservice.infinity.iot.carrier.com/graphql-no-auth";
pub const DEFAULT_TOKEN_URL: &str = "https://sso.carrier.com/oauth2/default/v1/token";
pub const DEFAULT_REALTIME_URL: &str = "wss://realtime.infinity.iot.carrier.com/";
pub const DEFAULT_CLIENT_ID: &str = "0oa1ce7hwjuZbfOMB4x7";

const HOLD_UNTIL_FORMAT: &str = "%H:%M";

/// Posts one GraphQL operation and returns its `data` member.
pub(crate) async fn execute_graphql(
    http: &reqwest::Client,
    url: &str,
    authorization: Option<&str>,
    operation: &str,
    query: &str,
    variables: Value,
) -> Result<Value> {
    let mut req = http.post(url).json(&graphql_request(operation, query, variables));
    if let Some(authorization) = authorization {
        req = req.header(AUTHORIZATION, authorization);
    }
    debug!(operation, "graphql request");
    let resp = req.send().await?;

    let status = resp.status();
    if status == StatusCode::UNAUTHORIZED {
        return Err(Error::Authentication(format!("{operation} rejected the access token")));
    }
    if !status.is_success() {
        let body = resp.text().await.unwrap_or_default();
        return Err(Error::Status {
            status: status.as_u16(),
            endpoint: operation.to_string(),
            body,
        });
    }

    let mut body: Value = resp.json().await?;
    if let Some(errors) = body.get("errors").and_then(Value::as_array).filter(|e| !e.is_empty()) {
        let message = errors
            .iter()
            .filter_map(|e| e.get("message").and_then(Value::as_str))
            .collect::<Vec<_>>()
            .join("; ");
        return Err(Error::Graphql {
            operation: operation.to_string(),
            message,
        });
    }
    body.get_mut("data")
        .map(Value::take)
        .filter(|d| !d.is_null())
        .ok_or_else(|| Error::Graphql {
            operation: operation.to_string(),
            message: "response carried no data".into(),
        })
}

pub struct InfinityClientBuilder {
    username: String,
    password: String,
    graphql_url: String,
    login_url: String,
    token_url: String,
    realtime_url: String,
    client_id: String,
    timeout: Option<Duration>,
    journal: Option<Arc<MessageJournal>>,
}

impl InfinityClientBuilder {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
            graphql_url: DEFAULT_GRAPHQL_URL.to_string(),
            login_url: DEFAULT_LOGIN_URL.to_string(),
            token_url: DEFAULT_TOKEN_URL.to_string(),
            realtime_url: DEFAULT_REALTIME_URL.to_string(),
            client_id: DEFAULT_CLIENT_ID.to_string(),
            timeout: None,
            journal: None,
        }
    }

    pub fn graphql_url(mut self, url: impl Into<String>) -> Self {
        self.graphql_url = url.into();
        self
    }

    pub fn login_url(mut self, url: impl Into<String>) -> Self {
        self.login_url = url.into();
        self
    }

    pub fn token_url(mut self, url: impl Into<String>) -> Self {
        self.token_url = url.into();
        self
    }

    pub fn realtime_url(mut self, url: impl Into<String>) -> Self {
        self.realtime_url = url.into();
        self
    }

    pub fn client_id(mut self, id: impl Into<String>) -> Self {
        self.client_id = id.into();
        self
    }

    /// Per-request timeout. Unset means reqwest's default (none).
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn journal(mut self, journal: Arc<MessageJournal>) -> Self {
        self.journal = Some(journal);
        self
    }

    pub fn build(self) -> Result<InfinityClient> {
        Url::parse(&self.realtime_url)
            .map_err(|e| Error::InvalidArgument(format!("realtime url {:?}: {e}", self.realtime_url)))?;

        let mut http = reqwest::Client::builder();
        if let Some(timeout) = self.timeout {
            http = http.timeout(timeout);
        }
        let http = http.build()?;

        let auth = Authenticator::new(
            http.clone(),
            self.login_url,
            self.token_url,
            self.client_id,
            self.username,
            self.password,
        );

        Ok(InfinityClient {
            inner: Arc::new(ClientInner {
                http,
                auth,
                graphql_url: self.graphql_url,
                realtime_url: self.realtime_url,
                journal: self.journal,
                realtime: Mutex::new(None),
            }),
        })
    }
}

struct ClientInner {
    http: reqwest::Client,
    auth: Authenticator,
    graphql_url: String,
    realtime_url: String,
    journal: Option<Arc<MessageJournal>>,
    realtime: Mutex<Option<RealtimeSender>>,
}

/// Cloud API client: login, snapshot fetch and commands.
///
/// Cheap to clone; clones share the token and the attached realtime
/// channel.
#[derive(Clone)]
pub struct InfinityClient {
    inner: Arc<ClientInner>,
}

impl InfinityClient {
    pub fn builder(username: impl Into<String>, password: impl Into<String>) -> InfinityClientBuilder {
        InfinityClientBuilder::new(username, password)
    }

    pub async fn login(&self) -> Result<()> {
        self.inner.auth.login().await
    }

    /// Current access token, refreshed first when it has expired.
    pub async fn access_token(&self) -> Result<String> {
        Ok(self.inner.auth.valid_token().await?.access_token)
    }

    pub async fn realtime_endpoint(&self) -> Result<Url> {
        let token = self.access_token().await?;
        let mut url = Url::parse(&self.inner.realtime_url)
            .map_err(|e| Error::InvalidArgument(format!("realtime url: {e}")))?;
        url.query_pairs_mut().append_pair("Token", &token);
        Ok(url)
    }

    async fn query(&self, operation: &str, document: &str, variables: Value) -> Result<Value> {
        let token = self.inner.auth.valid_token().await?;
        execute_graphql(
            &self.inner.http,
            &self.inner.graphql_url,
            Some(&token.authorization()),
            operation,
            document,
            variables,
        )
        .await
    }

    pub async fn user_info(&self) -> Result<Value> {
        let mut data = self
            .query(USER_OPERATION, USER_QUERY, user_variables(self.inner.auth.username()))
            .await?;
        data.get_mut("user").map(Value::take).ok_or(Error::MissingField("user"))
    }

    pub async fn get_systems(&self) -> Result<Vec<Value>> {
        let mut data = self
            .query(SYSTEMS_OPERATION, SYSTEMS_QUERY, user_variables(self.inner.auth.username()))
            .await?;
        match data.get_mut("infinitySystems").map(Value::take) {
            Some(Value::Array(systems)) => Ok(systems),
            _ => Err(Error::MissingField("infinitySystems")),
        }
    }

    pub async fn get_energy(&self, serial: &str) -> Result<Value> {
        let mut data = self
            .query(ENERGY_OPERATION, ENERGY_QUERY, energy_variables(serial))
            .await?;
        data.get_mut("infinityEnergy")
            .map(Value::take)
            .ok_or(Error::MissingField("infinityEnergy"))
    }

    /// Fetches every system with its energy report and builds the
    /// snapshot model.
    pub async fn load_systems(&self) -> Result<Vec<System>> {
        let mut systems = Vec::new();
        for raw in self.get_systems().await? {
            let serial = raw
                .pointer("/profile/serial")
                .and_then(Value::as_str)
                .ok_or(Error::MissingField("serial"))?
                .to_string();
            let energy = self.get_energy(&serial).await?;
            systems.push(System::from_snapshot(raw, Some(energy))?);
            debug!(serial = %serial, "system loaded");
        }
        Ok(systems)
    }

    /// Commands go through here: journal, send, extract the etag, then ask
    /// the realtime channel for a reconcile.
    async fn mutate(&self, operation: &str, document: &str, serial: &str, variables: Value) -> Result<String> {
        if let Some(journal) = &self.inner.journal {
            journal.log_command(operation, serial, &variables);
        }
        let data = self.query(operation, document, variables).await?;
        let etag = data
            .get(operation)
            .and_then(|r| r.get("etag"))
            .and_then(Value::as_str)
            .ok_or(Error::MissingField("etag"))?
            .to_string();
        debug!(operation, serial, etag = %etag, "command accepted");
        self.request_reconcile().await;
        Ok(etag)
    }

    pub async fn set_mode(&self, serial: &str, mode: SystemMode) -> Result<String> {
        self.mutate(UPDATE_CONFIG_OPERATION, UPDATE_CONFIG_MUTATION, serial, mode_variables(serial, mode))
            .await
    }

    pub async fn set_heat_source(&self, serial: &str, heat_source: HeatSource) -> Result<String> {
        self.mutate(
            UPDATE_CONFIG_OPERATION,
            UPDATE_CONFIG_MUTATION,
            serial,
            heat_source_variables(serial, heat_source),
        )
        .await
    }

    pub async fn set_humidifier(&self, serial: &str, settings: &HumidifierSettings) -> Result<String> {
        let variables = humidifier_variables(serial, settings)?;
        self.mutate(UPDATE_CONFIG_OPERATION, UPDATE_CONFIG_MUTATION, serial, variables)
            .await
    }

    /// Pins `zone_id` to `activity`, until `hold_until` when given.
    pub async fn set_hold(
        &self,
        serial: &str,
        zone_id: &str,
        activity: ActivityType,
        hold_until: Option<NaiveTime>,
    ) -> Result<String> {
        let until = hold_until.map(|t| t.format(HOLD_UNTIL_FORMAT).to_string());
        self.mutate(
            UPDATE_ZONE_CONFIG_OPERATION,
            UPDATE_ZONE_CONFIG_MUTATION,
            serial,
            hold_variables(serial, zone_id, activity, until.as_deref()),
        )
        .await
    }

    pub async fn resume_schedule(&self, serial: &str, zone_id: &str) -> Result<String> {
        self.mutate(
            UPDATE_ZONE_CONFIG_OPERATION,
            UPDATE_ZONE_CONFIG_MUTATION,
            serial,
            resume_schedule_variables(serial, zone_id),
        )
        .await
    }

    pub async fn set_manual_activity(
        &self,
        serial: &str,
        zone_id: &str,
        heat_set_point: f64,
        cool_set_point: f64,
        fan: FanMode,
    ) -> Result<String> {
        if heat_set_point > cool_set_point {
            return Err(Error::InvalidArgument(format!(
                "heat set point {heat_set_point} is above cool set point {cool_set_point}"
            )));
        }
        self.mutate(
            UPDATE_ZONE_ACTIVITY_OPERATION,
            UPDATE_ZONE_ACTIVITY_MUTATION,
            serial,
            manual_activity_variables(serial, zone_id, heat_set_point, cool_set_point, fan),
        )
        .await
    }

    pub async fn set_activity_fan(
        &self,
        serial: &str,
        zone_id: &str,
        activity: ActivityType,
        fan: FanMode,
    ) -> Result<String> {
        self.mutate(
            UPDATE_ZONE_ACTIVITY_OPERATION,
            UPDATE_ZONE_ACTIVITY_MUTATION,
            serial,
            activity_fan_variables(serial, zone_id, activity, fan),
        )
        .await
    }

    /// Routes post-command reconcile requests to `sender`.
    pub fn attach_realtime(&self, sender: RealtimeSender) {
        *self.inner.realtime.lock().unwrap_or_else(PoisonError::into_inner) = Some(sender);
    }

    pub fn detach_realtime(&self) {
        self.inner.realtime.lock().unwrap_or_else(PoisonError::into_inner).take();
    }

    /// Asks the server for a fresh delta. Best effort: never fails.
    pub async fn request_reconcile(&self) {
        let sender = self
            .inner
            .realtime
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        let Some(sender) = sender else {
            warn!("no realtime channel attached, reconcile skipped");
            return;
        };
        match sender.reconcile().await {
            Ok(true) => debug!("reconcile requested"),
            Ok(false) => debug!("realtime socket not open, reconcile skipped"),
            Err(e) => warn!(error = %e, "reconcile request failed"),
        }
    }
}
