/*
    moodmix-rs | Mood-driven Spotify recommendations from the terminal.
    Copyright (C) 2025  The moodmix-rs contributors

    This program is free software: you can redistribute it and/or modify
    it under the terms of the GNU Affero General Public License as published
    by the Free Software Foundation, either version 3 of the License, or
    (at your option) any later version.

    This program is distributed in the hope that it will be useful,
    but WITHOUT ANY WARRANTY; without even the implied warranty of
    MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
    GNU Affero General Public License for more details.

    You should have received a copy of the GNU Affero General Public License
    along with this program.  If not, see <https://www.gnu.org/licenses/>.
*/

use log::{debug, info, warn};
use std::sync::Arc;
use tokio::sync::watch;
use url::Url;

use crate::client::ApiClient;
use crate::config::ClientConfig;
use crate::error::ApiError;
use crate::models::{AuthStatusResponse, AuthUser};
use crate::session::{Navigator, Route, SessionState, SessionStatus};
use crate::store::Credentials;
use crate::transport::{ApiRequest, ReqwestTransport, TransportError};

/// Owns the authentication lifecycle of one user.
///
/// This is the only component that writes to the credential store (the API
/// client's refresh path aside). Everyone else reads the [`SessionState`].
pub struct SessionManager {
    client: ApiClient,
}

impl SessionManager {
    pub fn new(client: ApiClient) -> Self {
        Self { client }
    }

    /// Wires a manager against the real backend described by `config`.
    pub fn from_config(
        config: &ClientConfig,
        navigator: Arc<dyn Navigator>,
    ) -> Result<Self, TransportError> {
        let transport = Arc::new(ReqwestTransport::new(&config.api_base_url)?);
        let client = ApiClient::new(
            transport,
            config.credential_store(),
            SessionStatus::new(),
            navigator,
        );
        Ok(Self::new(client))
    }

    pub fn client(&self) -> &ApiClient {
        &self.client
    }

    pub fn state(&self) -> SessionState {
        self.client.status().current()
    }

    pub fn user(&self) -> Option<AuthUser> {
        self.state().user().cloned()
    }

    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.client.status().subscribe()
    }

    /// Asks the backend who we are. Never fails: any error means unauthenticated.
    pub async fn check_status(&self) -> SessionState {
        let next = match self
            .client
            .fetch::<AuthStatusResponse>(ApiRequest::get("/auth/status"))
            .await
        {
            Ok(AuthStatusResponse {
                authenticated: true,
                user: Some(user),
            }) => SessionState::Authenticated(user),
            Ok(_) => SessionState::Unauthenticated,
            Err(e) => {
                warn!("Auth check failed: {}", e);
                SessionState::Unauthenticated
            }
        };

        self.client.status().set(next.clone());
        next
    }

    pub fn login_url(&self) -> String {
        format!("{}/auth/login", self.client.base_url())
    }

    /// Sends the user to the identity provider. State is untouched until the callback.
    pub fn login(&self) -> String {
        let url = self.login_url();
        self.client.navigator().navigate(Route::External(url.clone()));
        url
    }

    /// Finishes the OAuth round trip.
    ///
    /// Tokens in the URL fragment are persisted first (token-storage mode).
    /// In cookie mode, an authorization `code` in the query is handed to the
    /// backend's `/auth/callback` so the session cookies land in this
    /// client's jar. Otherwise only the status check runs.
    pub async fn complete_callback(&self, callback_url: &str) -> Result<SessionState, ApiError> {
        let url = Url::parse(callback_url)
            .map_err(|e| ApiError::Validation(format!("Invalid callback URL: {}", e)))?;

        let cookie_backed = self.client.store().is_cookie_backed();
        if let Some(credentials) = fragment_credentials(&url) {
            if cookie_backed {
                debug!("Callback carried tokens but the session is cookie-backed; ignoring them");
            } else {
                self.client.store().save(&credentials)?;
                debug!("Stored tokens from callback fragment");
            }
        } else if let Some(exchange) = cookie_backed.then(|| code_exchange(&url)).flatten() {
            // The backend sets its cookie pair on this response, so it must
            // go through our own transport for the jar to keep them.
            match self.client.send_once(exchange).await {
                Ok(response) if response.is_success() || response.is_redirect() => {
                    debug!("Backend accepted the auth code")
                }
                Ok(response) => warn!(
                    "Code exchange failed: {}",
                    ApiError::rejected(response.status, &response.body)
                ),
                Err(e) => warn!("Code exchange failed: {}", e),
            }
        }

        let state = self.check_status().await;
        match &state {
            SessionState::Authenticated(user) => {
                info!("Logged in as {}", user.label());
                self.client.navigator().navigate(Route::Home);
            }
            _ => self.client.navigator().navigate(Route::Login),
        }
        Ok(state)
    }

    /// Best-effort backend logout, then an unconditional local teardown.
    pub async fn logout(&self) {
        match self.client.send_once(ApiRequest::post("/auth/logout")).await {
            Ok(response) if response.is_success() => debug!("Backend session invalidated"),
            Ok(response) if response.is_unauthorized() => {
                warn!("Logout failed: {}", ApiError::AuthExpired)
            }
            Ok(response) => warn!(
                "Logout failed: {}",
                ApiError::rejected(response.status, &response.body)
            ),
            Err(e) => warn!("Logout failed: {}", e),
        }

        self.client.store().clear();
        self.client.status().set(SessionState::Unauthenticated);
    }
}

/// Builds the backend callback request for a URL still carrying its auth code.
fn code_exchange(url: &Url) -> Option<ApiRequest> {
    let mut code = None;
    let mut state = None;
    for (key, value) in url.query_pairs() {
        match key.as_ref() {
            "code" => code = Some(value.into_owned()),
            "state" => state = Some(value.into_owned()),
            _ => {}
        }
    }

    let code = code.filter(|c| !c.is_empty())?;
    let mut request = ApiRequest::get("/auth/callback").query("code", code);
    if let Some(state) = state {
        request = request.query("state", state);
    }
    Some(request)
}

fn fragment_credentials(url: &Url) -> Option<Credentials> {
    let fragment = url.fragment()?;
    let mut access_token = None;
    let mut refresh_token = None;

    for (key, value) in url::form_urlencoded::parse(fragment.as_bytes()) {
        match key.as_ref() {
            "access_token" => access_token = Some(value.into_owned()),
            "refresh_token" => refresh_token = Some(value.into_owned()),
            _ => {}
        }
    }

    Some(Credentials {
        access_token: access_token.filter(|t| !t.is_empty())?,
        refresh_token: refresh_token.filter(|t| !t.is_empty()),
    })
}
