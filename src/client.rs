use std::path::PathBuf;

use reqwest::Method;
use reqwest::header::AUTHORIZATION;
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, trace, warn};

use crate::api::OverkizApi;
use crate::logger::{MessageLogMode, MessageLogger};
use crate::model::{ActionGroup, Event, Scenario, Setup};
use crate::protocol::{
    atlantic_token_form, classify_error, fetch_events_path, parse_atlantic_token, parse_body,
    parse_jwt, parse_listener_id, parse_login, password_login_form, unregister_listener_path,
    ACTION_GROUPS_PATH, ATLANTIC_JWT_PATH, ATLANTIC_TOKEN_PATH, LOGIN_PATH, LOGOUT_PATH,
    REGISTER_LISTENER_PATH, SETUP_PATH,
};
use crate::servers::{AuthFlow, Server, COZYTOUCH_ATLANTIC_API, COZYTOUCH_CLIENT_ID};
use crate::{Error, Result};

pub struct OverkizClientBuilder {
    server: Server,
    username: String,
    password: String,
    endpoint: Option<String>,
    atlantic_api: Option<String>,
    log_mode: Option<MessageLogMode>,
    log_path: Option<PathBuf>,
}

impl OverkizClientBuilder {
    pub fn new(server: Server, username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            server,
            username: username.into(),
            password: password.into(),
            endpoint: None,
            atlantic_api: None,
            log_mode: None,
            log_path: None,
        }
    }

    /// Overrides the server's REST endpoint.
    pub fn endpoint(mut self, url: impl Into<String>) -> Self {
        let mut url = url.into();
        if !url.ends_with('/') {
            url.push('/');
        }
        self.endpoint = Some(url);
        self
    }

    /// Overrides the Atlantic identity service used by Cozytouch logins.
    pub fn atlantic_api(mut self, url: impl Into<String>) -> Self {
        let url: String = url.into();
        self.atlantic_api = Some(url.trim_end_matches('/').to_string());
        self
    }

    pub fn message_log(mut self, mode: MessageLogMode, path: impl Into<PathBuf>) -> Self {
        self.log_mode = Some(mode);
        self.log_path = Some(path.into());
        self
    }

    pub fn build(self) -> Result<OverkizClient> {
        let http = reqwest::Client::builder().cookie_store(true).build()?;

        let logger = match (self.log_mode, self.log_path) {
            (Some(mode), Some(path)) => Some(MessageLogger::new(mode, &path)?),
            _ => None,
        };

        Ok(OverkizClient {
            http,
            server: self.server,
            endpoint: self
                .endpoint
                .unwrap_or_else(|| self.server.endpoint().to_string()),
            atlantic_api: self
                .atlantic_api
                .unwrap_or_else(|| COZYTOUCH_ATLANTIC_API.to_string()),
            username: self.username,
            password: self.password,
            logged_in: false,
            listener_id: None,
            logger,
        })
    }
}

/// Session with the Overkiz end-user API.
pub struct OverkizClient {
    http: reqwest::Client,
    server: Server,
    endpoint: String,
    atlantic_api: String,
    username: String,
    password: String,
    logged_in: bool,
    listener_id: Option<String>,
    logger: Option<MessageLogger>,
}

impl OverkizClient {
    pub fn builder(
        server: Server,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> OverkizClientBuilder {
        OverkizClientBuilder::new(server, username, password)
    }

    pub fn server(&self) -> Server {
        self.server
    }

    pub fn is_logged_in(&self) -> bool {
        self.logged_in
    }

    pub fn listener_id(&self) -> Option<&str> {
        self.listener_id.as_deref()
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.endpoint, path)
    }

    fn ensure_logged_in(&self) -> Result<()> {
        if self.logged_in {
            Ok(())
        } else {
            Err(Error::NotAuthenticated)
        }
    }

    async fn send(&mut self, method: Method, path: &str) -> Result<String> {
        if let Some(ref mut logger) = self.logger {
            logger.log_request(method.as_str(), path, None);
        }
        let resp = self.http.request(method, self.url(path)).send().await?;
        self.read(path, resp).await
    }

    /// Sends within the session, logging in again once if the server has
    /// dropped it.
    async fn send_in_session(&mut self, method: Method, path: &str) -> Result<String> {
        match self.send(method.clone(), path).await {
            Err(Error::NotAuthenticated) => {
                debug!(path, "session expired, logging in again");
                self.logged_in = false;
                self.login().await?;
                self.send(method, path).await
            }
            other => other,
        }
    }

    async fn post_form<F: Serialize + ?Sized>(&mut self, path: &str, form: &F) -> Result<String> {
        if let Some(ref mut logger) = self.logger {
            logger.log_request("POST", path, None);
        }
        let resp = self.http.post(self.url(path)).form(form).send().await?;
        self.read(path, resp).await
    }

    async fn read(&mut self, path: &str, resp: reqwest::Response) -> Result<String> {
        let status = resp.status().as_u16();
        let body = resp.text().await?;
        trace!(path, status, len = body.len(), "response");

        if let Some(ref mut logger) = self.logger {
            let body_json = serde_json::from_str(&body).unwrap_or(Value::Null);
            logger.log_response(path, status, &body_json);
        }

        if !(200..300).contains(&status) {
            return Err(classify_error(status, &body));
        }
        Ok(body)
    }

    /// Atlantic access token, traded for the JWT the Overkiz login accepts.
    async fn cozytouch_jwt(&self) -> Result<String> {
        let token_url = format!("{}{}", self.atlantic_api, ATLANTIC_TOKEN_PATH);
        debug!(url = %token_url, "requesting Atlantic token");
        let resp = self
            .http
            .post(&token_url)
            .header(AUTHORIZATION, format!("Basic {COZYTOUCH_CLIENT_ID}"))
            .form(&atlantic_token_form(&self.username, &self.password))
            .send()
            .await?;
        let status = resp.status().as_u16();
        let body = resp.text().await?;
        let token = match parse_atlantic_token(&body) {
            Ok(token) => token,
            Err(Error::BadCredentials) => return Err(Error::BadCredentials),
            Err(_) if !(200..300).contains(&status) => return Err(classify_error(status, &body)),
            Err(e) => return Err(e),
        };

        let jwt_url = format!("{}{}", self.atlantic_api, ATLANTIC_JWT_PATH);
        let resp = self.http.get(&jwt_url).bearer_auth(&token).send().await?;
        let status = resp.status().as_u16();
        let body = resp.text().await?;
        if !(200..300).contains(&status) {
            return Err(classify_error(status, &body));
        }
        parse_jwt(&body)
    }

    async fn register_listener(&mut self) -> Result<String> {
        let body = self.send_in_session(Method::POST, REGISTER_LISTENER_PATH).await?;
        let id = parse_listener_id(&body)?;
        debug!(listener = %id, "registered event listener");
        self.listener_id = Some(id.clone());
        Ok(id)
    }

    async fn fetch_with(&mut self, listener_id: &str) -> Result<Vec<Event>> {
        let body = self
            .send_in_session(Method::POST, &fetch_events_path(listener_id))
            .await?;
        parse_body(&body)
    }
}

impl OverkizApi for OverkizClient {
    async fn login(&mut self) -> Result<()> {
        debug!(server = %self.server, endpoint = %self.endpoint, "logging in");
        let body = match self.server.auth_flow() {
            AuthFlow::Cozytouch => {
                let jwt = self.cozytouch_jwt().await?;
                self.post_form(LOGIN_PATH, &[("jwt", jwt.as_str())]).await?
            }
            AuthFlow::Password => {
                let form = password_login_form(&self.username, &self.password)
                    .map(|(k, v)| (k, v.to_string()));
                self.post_form(LOGIN_PATH, &form).await?
            }
        };
        parse_login(&body)?;
        self.logged_in = true;
        Ok(())
    }

    async fn get_setup(&mut self) -> Result<Setup> {
        self.ensure_logged_in()?;
        let body = self.send_in_session(Method::GET, SETUP_PATH).await?;
        Ok(serde_json::from_str(&body)?)
    }

    async fn fetch_events(&mut self) -> Result<Vec<Event>> {
        self.ensure_logged_in()?;
        let listener = match self.listener_id.clone() {
            Some(id) => id,
            None => self.register_listener().await?,
        };
        match self.fetch_with(&listener).await {
            Err(Error::NoRegisteredEventListener) => {
                debug!(listener = %listener, "event listener expired, registering again");
                let listener = self.register_listener().await?;
                self.fetch_with(&listener).await
            }
            other => other,
        }
    }

    async fn get_scenarios(&mut self) -> Result<Vec<Scenario>> {
        self.ensure_logged_in()?;
        let body = self.send_in_session(Method::GET, ACTION_GROUPS_PATH).await?;
        parse_body(&body)
    }

    async fn get_action_groups(&mut self) -> Result<Vec<ActionGroup>> {
        self.ensure_logged_in()?;
        let body = self.send_in_session(Method::GET, ACTION_GROUPS_PATH).await?;
        parse_body(&body)
    }

    async fn close(&mut self) -> Result<()> {
        if let Some(listener) = self.listener_id.take()
            && let Err(e) = self
                .send(Method::POST, &unregister_listener_path(&listener))
                .await
        {
            warn!(listener = %listener, "failed to unregister event listener: {e}");
        }
        if !self.logged_in {
            return Ok(());
        }
        self.logged_in = false;
        self.send(Method::POST, LOGOUT_PATH).await?;
        Ok(())
    }
}
