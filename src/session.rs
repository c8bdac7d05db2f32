//! Session service for the sitedesk console

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{info, warn};
use validator::Validate;

use sitedesk_protocol::{ChangePasswordRequest, LoginData, LoginRequest, Role};

use crate::client::{ApiRequest, HttpClient};
use crate::error::{DeskError, Result};
use crate::events::SessionEvent;
use crate::interceptor::{CHANGE_PASSWORD_PATH, LOGIN_PATH, LOGOUT_PATH};
use crate::refresh::AuthState;
use crate::scheduler::ScheduleOutcome;
use crate::token::{decode_claims, expires_at};

/// Snapshot of the current session for display
#[derive(Debug, Clone, Serialize)]
pub struct SessionStatus {
    pub logged_in: bool,
    pub role: Option<String>,
    pub first_time_login: bool,
    pub expires_at: Option<DateTime<Utc>>,
    pub auth_state: AuthState,
}

impl SessionStatus {
    pub fn is_expired(&self) -> bool {
        matches!(self.expires_at, Some(exp) if exp <= Utc::now())
    }
}

#[derive(Debug, Clone)]
pub struct SessionService {
    client: HttpClient,
}

impl SessionService {
    pub fn new(client: HttpClient) -> Self {
        Self { client }
    }

    pub fn client(&self) -> &HttpClient {
        &self.client
    }

    /// Resume a stored session: arm the proactive refresh if a token exists.
    pub fn restore(&self) -> ScheduleOutcome {
        if self.client.store().get().is_none() {
            return ScheduleOutcome::NoToken;
        }
        self.client.schedule_proactive_refresh()
    }

    /// Authenticate and establish a session.
    ///
    /// The token arrives in the `Authorization` response header; the body
    /// only carries the role and first-login flag.
    pub async fn login(&self, email: &str, password: &str) -> Result<LoginData> {
        let request = LoginRequest {
            email: email.trim().to_string(),
            password: password.to_string(),
        };
        request
            .validate()
            .map_err(|e| DeskError::validation(format!("Invalid login details: {}", e)))?;

        let response = self
            .client
            .execute(ApiRequest::post(LOGIN_PATH).json(serde_json::to_value(&request)?))
            .await
            .map_err(|e| {
                if e.is_unauthorized() {
                    DeskError::authentication(e.to_string())
                } else {
                    e
                }
            })?;

        let token = response.bearer_token().ok_or_else(|| {
            DeskError::authentication("Login response did not include an access token")
        })?;

        let envelope = response.envelope()?;
        let data: LoginData = match envelope.into_payload("user") {
            Some(payload) => serde_json::from_value(payload)?,
            None => return Err(DeskError::invalid_response("Login response has no user data")),
        };

        let store = self.client.store();
        store.set(token);
        store.set_profile(&data.role, data.first_time_login);

        let outcome = self.client.schedule_proactive_refresh();
        info!(role = %data.role, ?outcome, "Logged in");

        self.client.emit(SessionEvent::LoggedIn {
            role: data.role.to_string(),
            first_time_login: data.first_time_login,
        });
        Ok(data)
    }

    /// End the session. The backend call is best effort; local state is
    /// always cleared.
    pub async fn logout(&self) -> Result<()> {
        if self.client.store().get().is_some() {
            if let Err(e) = self.client.execute(ApiRequest::post(LOGOUT_PATH)).await {
                warn!(error = %e, "Logout request failed");
            }
        }

        self.client.teardown();
        self.client.emit(SessionEvent::LoggedOut);
        Ok(())
    }

    pub async fn change_password(&self, current: &str, new: &str) -> Result<()> {
        if self.client.store().get().is_none() {
            return Err(DeskError::not_logged_in());
        }
        if current == new {
            return Err(DeskError::validation_field(
                "New password must differ from the current one",
                "newPassword",
            ));
        }

        let request = ChangePasswordRequest {
            current_password: current.to_string(),
            new_password: new.to_string(),
        };
        request
            .validate()
            .map_err(|e| DeskError::validation(format!("Invalid password: {}", e)))?;

        let body = serde_json::to_value(&request)?;
        self.client
            .send_envelope(ApiRequest::patch(CHANGE_PASSWORD_PATH).json(body))
            .await?;

        self.client.store().set_first_time_login(false);
        info!("Password changed");
        Ok(())
    }

    pub fn status(&self) -> SessionStatus {
        let store = self.client.store();
        let token = store.get();
        let expires_at = token
            .as_deref()
            .and_then(|t| decode_claims(t).ok())
            .and_then(|claims| expires_at(&claims));

        SessionStatus {
            logged_in: token.is_some(),
            role: store.role().map(|r| r.to_string()),
            first_time_login: store.first_time_login(),
            expires_at,
            auth_state: self.client.auth_state(),
        }
    }

    /// Fail unless the stored role is admin
    pub fn require_admin(&self) -> Result<Role> {
        let store = self.client.store();
        if store.get().is_none() {
            return Err(DeskError::not_logged_in());
        }
        match store.role() {
            Some(role) if role.is_admin() => Ok(role),
            Some(role) => Err(DeskError::authorization(format!(
                "Role '{}' cannot manage site content",
                role
            ))),
            None => Err(DeskError::authorization("No role recorded for this session")),
        }
    }
}
