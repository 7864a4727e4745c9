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

use futures::future::{BoxFuture, FutureExt, Shared};
use log::{debug, info, warn};
use serde::de::DeserializeOwned;
use serde_json::json;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::error::{rejection_message, ApiError};
use crate::models::RefreshResponse;
use crate::session::{Navigator, Route, SessionState, SessionStatus};
use crate::store::{CredentialStore, Credentials};
use crate::transport::{ApiRequest, ApiResponse, Transport};

type RefreshOutcome = Result<(), String>;
type SharedRefresh = Shared<BoxFuture<'static, RefreshOutcome>>;

struct RefreshSlot {
    inflight: Option<SharedRefresh>,
    /// Number of refreshes that have finished, successful or not.
    epoch: u64,
    last_outcome: RefreshOutcome,
}

struct Inner {
    transport: Arc<dyn Transport>,
    store: Arc<dyn CredentialStore>,
    status: SessionStatus,
    navigator: Arc<dyn Navigator>,
    refresh: Mutex<RefreshSlot>,
}

/// Backend client that recovers from expired credentials on its own.
///
/// Every request may trigger at most one refresh followed by one retry.
/// Requests that hit a 401 at the same time share a single refresh call.
/// When the refresh fails, local credentials are wiped, the session becomes
/// unauthenticated and the navigator is sent to the login route.
#[derive(Clone)]
pub struct ApiClient {
    inner: Arc<Inner>,
}

impl ApiClient {
    pub fn new(
        transport: Arc<dyn Transport>,
        store: Arc<dyn CredentialStore>,
        status: SessionStatus,
        navigator: Arc<dyn Navigator>,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                transport,
                store,
                status,
                navigator,
                refresh: Mutex::new(RefreshSlot {
                    inflight: None,
                    epoch: 0,
                    last_outcome: Ok(()),
                }),
            }),
        }
    }

    pub fn status(&self) -> &SessionStatus {
        &self.inner.status
    }

    pub fn base_url(&self) -> &str {
        self.inner.transport.base_url()
    }

    pub(crate) fn store(&self) -> &dyn CredentialStore {
        self.inner.store.as_ref()
    }

    pub(crate) fn navigator(&self) -> &dyn Navigator {
        self.inner.navigator.as_ref()
    }

    /// Sends a request with no 401 recovery.
    pub async fn send_once(&self, request: ApiRequest) -> Result<ApiResponse, ApiError> {
        let request = self.inner.authorize(request);
        Ok(self.inner.transport.send(&request).await?)
    }

    /// Sends a request, refreshing and retrying once on a 401.
    pub async fn execute(&self, request: ApiRequest) -> Result<ApiResponse, ApiError> {
        let mut retried = false;

        loop {
            let epoch = self.inner.refresh_epoch();
            let response = self.send_once(request.clone()).await?;

            if !response.is_unauthorized() {
                return Ok(response);
            }

            if retried {
                warn!(
                    "{} {} still unauthorized after refresh",
                    request.method, request.path
                );
                self.inner.force_logout();
                return Err(ApiError::AuthRefreshFailed(
                    "Request rejected after refresh".to_string(),
                ));
            }
            retried = true;

            debug!("{} {} returned 401, refreshing", request.method, request.path);
            self.refresh_after(epoch)
                .await
                .map_err(ApiError::AuthRefreshFailed)?;
        }
    }

    /// Executes a request and decodes a successful body.
    pub async fn fetch<T: DeserializeOwned>(&self, request: ApiRequest) -> Result<T, ApiError> {
        let response = self.execute(request).await?;
        decode(response)
    }

    /// Joins the in-flight refresh, or starts one if none has completed since `observed_epoch`.
    async fn refresh_after(&self, observed_epoch: u64) -> RefreshOutcome {
        let shared = {
            let mut slot = self.inner.slot();
            if let Some(inflight) = &slot.inflight {
                inflight.clone()
            } else if slot.epoch != observed_epoch {
                return slot.last_outcome.clone();
            } else {
                let inner = Arc::clone(&self.inner);
                let refresh = async move { inner.run_refresh().await }.boxed().shared();
                slot.inflight = Some(refresh.clone());
                refresh
            }
        };
        shared.await
    }
}

impl Inner {
    fn slot(&self) -> MutexGuard<'_, RefreshSlot> {
        self.refresh.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn refresh_epoch(&self) -> u64 {
        self.slot().epoch
    }

    fn authorize(&self, mut request: ApiRequest) -> ApiRequest {
        request.bearer = self.store.load().map(|c| c.access_token);
        request
    }

    async fn run_refresh(self: Arc<Self>) -> RefreshOutcome {
        let outcome = self.perform_refresh().await;

        {
            let mut slot = self.slot();
            slot.inflight = None;
            slot.epoch += 1;
            slot.last_outcome = outcome.clone();
        }

        match &outcome {
            Ok(()) => info!("Session refreshed"),
            Err(reason) => {
                warn!("Session refresh failed: {}", reason);
                self.force_logout();
            }
        }
        outcome
    }

    async fn perform_refresh(&self) -> RefreshOutcome {
        let cookie_backed = self.store.is_cookie_backed();
        let previous = self.store.load();

        let mut request = ApiRequest::post("/auth/refresh");
        if !cookie_backed {
            let refresh_token = previous
                .as_ref()
                .and_then(|c| c.refresh_token.clone())
                .ok_or_else(|| "No refresh token".to_string())?;
            request = request.json(json!({ "refresh_token": refresh_token }));
        }

        let response = self
            .transport
            .send(&request)
            .await
            .map_err(|e| e.to_string())?;

        if !response.is_success() {
            return Err(format!("Refresh endpoint returned {}", response.status));
        }
        if cookie_backed {
            return Ok(());
        }

        let parsed: RefreshResponse = serde_json::from_value(response.body).unwrap_or_default();
        let access_token = parsed
            .access_token
            .ok_or_else(|| "No access token returned".to_string())?;
        let refresh_token = parsed
            .refresh_token
            .or_else(|| previous.and_then(|c| c.refresh_token));

        self.store
            .save(&Credentials {
                access_token,
                refresh_token,
            })
            .map_err(|e| e.to_string())
    }

    fn force_logout(&self) {
        self.store.clear();
        let was_signed_out = self.status.current() == SessionState::Unauthenticated;
        self.status.set(SessionState::Unauthenticated);
        if !was_signed_out {
            self.navigator.navigate(Route::Login);
        }
    }
}

/// Turns a response into `T`, or into `BackendRejected`.
pub(crate) fn decode<T: DeserializeOwned>(response: ApiResponse) -> Result<T, ApiError> {
    if !response.is_success() {
        return Err(ApiError::rejected(response.status, &response.body));
    }
    if response.body.get("error").is_some() {
        let message = rejection_message(&response.body).unwrap_or_default();
        return Err(ApiError::BackendRejected {
            status: response.status,
            message,
        });
    }
    Ok(serde_json::from_value(response.body)?)
}
