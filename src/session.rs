//! Background authentication. Grounded in the teacher's token-refresh
//! background task (`spawn_automatic_token_refresh` /
//! `start_automatic_token_refresh_loop`) and its `backon`-driven retry of
//! transport failures around a `reqwest` call.

use std::sync::{Arc, RwLock};
use std::time::Duration;

use backon::{ExponentialBuilder, Retryable};
use braintrust_backend::{BackendClient, HttpBackendClient, OrgInfo};
use tokio::sync::{watch, Notify};
use tracing::{info, warn};

use crate::error::SessionError;

const TEST_MODE_API_KEY: &str = "__TEST_API_KEY__";
const MIN_RETRY_DELAY: Duration = Duration::from_millis(10);
const MAX_RETRY_DELAY: Duration = Duration::from_secs(10);
const DEFAULT_API_URL: &str = "https://api.braintrust.dev";

/// Full login result, populated once by the background worker.
#[derive(Debug, Clone, Default)]
pub struct AuthInfo {
    pub org_id: String,
    pub org_name: String,
    pub api_key: String,
    pub api_url: String,
    pub proxy_url: Option<String>,
    pub app_url: String,
    pub app_public_url: String,
    pub logged_in: bool,
}

/// The subset of [`AuthInfo`] always available immediately, falling back to
/// constructor options when login hasn't completed.
#[derive(Debug, Clone)]
pub struct Endpoints {
    pub api_key: String,
    pub api_url: String,
    pub app_url: String,
}

/// Options accepted by [`Session::new`].
#[derive(Debug, Clone, Default)]
pub struct SessionOptions {
    pub app_url: String,
    pub api_url: Option<String>,
    pub api_key: String,
    pub org_name: Option<String>,
}

#[derive(Default)]
struct LoginState {
    info: Option<AuthInfo>,
    err: Option<SessionError>,
}

enum LoginAttempt {
    Retryable(String),
    Terminal(SessionError),
}

/// Owns the background login worker and the last-known login state.
///
/// Reads (`endpoints`, `org_name`, `info`) never block on the network; they
/// read the lock-guarded state set by the worker. `login` is the one method
/// that waits for the worker to finish.
pub struct Session {
    options: SessionOptions,
    state: RwLock<LoginState>,
    login_done: Notify,
    shutdown_tx: watch::Sender<bool>,
}

impl Session {
    /// Spawns the background login worker. Fails synchronously if `api_key`
    /// or `app_url` is empty — everything else happens off-thread.
    pub fn new(options: SessionOptions) -> Result<Arc<Self>, SessionError> {
        Self::with_backend(options, Arc::new(HttpBackendClient::new()))
    }

    pub fn with_backend(
        options: SessionOptions,
        backend: Arc<dyn BackendClient>,
    ) -> Result<Arc<Self>, SessionError> {
        if options.api_key.is_empty() {
            return Err(SessionError::MissingApiKey);
        }
        if options.app_url.is_empty() {
            return Err(SessionError::MissingAppUrl);
        }

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let session = Arc::new(Self {
            options,
            state: RwLock::new(LoginState::default()),
            login_done: Notify::new(),
            shutdown_tx,
        });

        let worker_session = Arc::clone(&session);
        tokio::spawn(async move {
            worker_session.run_login_worker(backend, shutdown_rx).await;
        });

        Ok(session)
    }

    /// Non-blocking. Endpoints from the login result if available, else
    /// constructor options with `api_url` defaulted.
    #[must_use]
    pub fn endpoints(&self) -> Endpoints {
        let state = self.state.read().unwrap_or_else(std::sync::PoisonError::into_inner);
        if let Some(info) = &state.info {
            return Endpoints {
                api_key: info.api_key.clone(),
                api_url: info.api_url.clone(),
                app_url: info.app_url.clone(),
            };
        }
        Endpoints {
            api_key: self.options.api_key.clone(),
            api_url: self
                .options
                .api_url
                .clone()
                .unwrap_or_else(|| DEFAULT_API_URL.to_string()),
            app_url: self.options.app_url.clone(),
        }
    }

    /// Non-blocking. Empty until login completes successfully.
    #[must_use]
    pub fn org_name(&self) -> String {
        let state = self.state.read().unwrap_or_else(std::sync::PoisonError::into_inner);
        state
            .info
            .as_ref()
            .map(|info| info.org_name.clone())
            .unwrap_or_default()
    }

    /// Non-blocking. `(false, None)` until login succeeded once.
    #[must_use]
    pub fn info(&self) -> (bool, Option<AuthInfo>) {
        let state = self.state.read().unwrap_or_else(std::sync::PoisonError::into_inner);
        match &state.info {
            Some(info) if info.logged_in => (true, Some(info.clone())),
            _ => (false, None),
        }
    }

    /// Blocks until login completes (success or terminal failure).
    pub async fn login(&self) -> Result<(), SessionError> {
        loop {
            {
                let state = self.state.read().unwrap_or_else(std::sync::PoisonError::into_inner);
                if let Some(err) = &state.err {
                    return Err(err.clone());
                }
                if state.info.is_some() {
                    return Ok(());
                }
            }
            self.login_done.notified().await;
        }
    }

    /// Cancels the background login worker.
    pub fn close(&self) {
        let _ = self.shutdown_tx.send(true);
    }

    async fn run_login_worker(
        &self,
        backend: Arc<dyn BackendClient>,
        mut shutdown_rx: watch::Receiver<bool>,
    ) {
        let attempt = {
            let worker = self.login_attempt(backend);
            tokio::select! {
                result = worker => result,
                _ = shutdown_rx.changed() => {
                    info!("session login cancelled before completion");
                    return;
                }
            }
        };

        let mut state = self.state.write().unwrap_or_else(std::sync::PoisonError::into_inner);
        match attempt {
            Ok(info) => state.info = Some(info),
            Err(err) => {
                warn!(error = %err, "braintrust session login failed");
                state.err = Some(err);
            }
        }
        drop(state);
        self.login_done.notify_waiters();
    }

    async fn login_attempt(&self, backend: Arc<dyn BackendClient>) -> Result<AuthInfo, SessionError> {
        let api_url = self
            .options
            .api_url
            .clone()
            .unwrap_or_else(|| DEFAULT_API_URL.to_string());

        if self.options.api_key == TEST_MODE_API_KEY {
            return Ok(self.select_org(vec![OrgInfo {
                id: "test-org-id".to_string(),
                name: "test-org".to_string(),
                api_url: Some(api_url),
                proxy_url: None,
            }])?);
        }

        let app_url = self.options.app_url.clone();
        let api_key = self.options.api_key.clone();

        let orgs = (|| {
            let backend = Arc::clone(&backend);
            let app_url = app_url.clone();
            let api_key = api_key.clone();
            async move {
                backend
                    .login(&app_url, &api_key)
                    .await
                    .map_err(classify_login_error)
            }
        })
        .retry(
            ExponentialBuilder::default()
                .with_min_delay(MIN_RETRY_DELAY)
                .with_max_delay(MAX_RETRY_DELAY)
                .with_factor(2.0)
                .without_max_times(),
        )
        .when(|attempt| matches!(attempt, LoginAttempt::Retryable(_)))
        .await
        .map_err(|attempt| match attempt {
            LoginAttempt::Terminal(err) => err,
            LoginAttempt::Retryable(msg) => SessionError::Transport(msg),
        })?;

        self.select_org(orgs)
    }

    fn select_org(&self, orgs: Vec<OrgInfo>) -> Result<AuthInfo, SessionError> {
        if orgs.is_empty() {
            return Err(SessionError::NoOrganisations);
        }

        let chosen = match &self.options.org_name {
            None => orgs.first().cloned(),
            Some(requested) if requested.is_empty() => orgs.first().cloned(),
            Some(requested) => orgs.iter().find(|org| &org.name == requested).cloned(),
        };

        let Some(chosen) = chosen else {
            let requested = self.options.org_name.clone().unwrap_or_default();
            return Err(SessionError::OrgNotFound {
                requested,
                available: orgs.into_iter().map(|o| o.name).collect(),
            });
        };

        let api_url = chosen
            .api_url
            .unwrap_or_else(|| DEFAULT_API_URL.to_string());

        Ok(AuthInfo {
            org_id: chosen.id,
            org_name: chosen.name,
            api_key: self.options.api_key.clone(),
            api_url,
            proxy_url: chosen.proxy_url,
            app_url: self.options.app_url.clone(),
            app_public_url: self.options.app_url.clone(),
            logged_in: true,
        })
    }
}

fn classify_login_error(err: braintrust_backend::BackendError) -> LoginAttempt {
    match err {
        braintrust_backend::BackendError::Request(_) => LoginAttempt::Retryable(err.to_string()),
        braintrust_backend::BackendError::Status { status, ref body } => {
            if status.is_server_error() {
                LoginAttempt::Retryable(err.to_string())
            } else {
                LoginAttempt::Terminal(SessionError::Transport(format!("{status}: {body}")))
            }
        }
        braintrust_backend::BackendError::Decode(_) => {
            LoginAttempt::Terminal(SessionError::Transport(err.to_string()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_empty_api_key() {
        let result = Session::new(SessionOptions {
            app_url: "https://www.braintrust.dev".to_string(),
            api_key: String::new(),
            ..Default::default()
        });
        assert!(matches!(result, Err(SessionError::MissingApiKey)));
    }

    #[test]
    fn rejects_empty_app_url() {
        let result = Session::new(SessionOptions {
            app_url: String::new(),
            api_key: "key".to_string(),
            ..Default::default()
        });
        assert!(matches!(result, Err(SessionError::MissingAppUrl)));
    }

    #[tokio::test]
    async fn test_mode_key_synthesises_org_without_http() {
        let session = Session::new(SessionOptions {
            app_url: "https://www.braintrust.dev".to_string(),
            api_key: TEST_MODE_API_KEY.to_string(),
            ..Default::default()
        })
        .unwrap();

        session.login().await.unwrap();
        let (logged_in, info) = session.info();
        assert!(logged_in);
        assert_eq!(info.unwrap().org_name, "test-org");
    }

    #[tokio::test]
    async fn endpoints_fall_back_to_options_before_login_completes() {
        let session = Session::with_backend(
            SessionOptions {
                app_url: "https://www.braintrust.dev".to_string(),
                api_key: "key".to_string(),
                ..Default::default()
            },
            Arc::new(NeverRespondingBackend),
        )
        .unwrap();

        let endpoints = session.endpoints();
        assert_eq!(endpoints.api_url, DEFAULT_API_URL);
        assert_eq!(endpoints.app_url, "https://www.braintrust.dev");
    }

    struct NeverRespondingBackend;

    #[async_trait::async_trait]
    impl BackendClient for NeverRespondingBackend {
        async fn login(
            &self,
            _app_url: &str,
            _api_key: &str,
        ) -> Result<Vec<OrgInfo>, braintrust_backend::BackendError> {
            std::future::pending().await
        }

        async fn register_project(
            &self,
            _api_url: &str,
            _api_key: &str,
            _name: &str,
        ) -> Result<braintrust_backend::ProjectRecord, braintrust_backend::BackendError> {
            unimplemented!()
        }

        async fn register_experiment(
            &self,
            _api_url: &str,
            _api_key: &str,
            _spec: &braintrust_backend::ExperimentSpec,
        ) -> Result<braintrust_backend::ExperimentRecord, braintrust_backend::BackendError> {
            unimplemented!()
        }
    }
}
