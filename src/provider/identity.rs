//! REST client for the hosted identity provider (Identity Toolkit API).

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tracing::{debug, info};

use super::traits::{IdentityError, IdentityProvider};
use crate::types::AuthUser;

/// Identity Toolkit REST client.
///
/// Holds the current session; account creation and sign-in publish the new
/// handle on the auth-state channel, sign-out publishes `None`.
pub struct RestIdentity {
    client: Client,
    base_url: String,
    api_key: String,
    session: watch::Sender<Option<AuthUser>>,
}

impl RestIdentity {
    /// Create a client against the given endpoint, e.g.
    /// `https://identitytoolkit.googleapis.com/v1`.
    pub fn new(client: Client, base_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        let (session, _) = watch::channel(None);
        Self {
            client,
            base_url: base_url.into(),
            api_key: api_key.into(),
            session,
        }
    }

    fn endpoint(&self, action: &str) -> String {
        format!("{}/accounts:{}?key={}", self.base_url, action, self.api_key)
    }

    async fn post<B: Serialize, R: for<'de> Deserialize<'de>>(
        &self,
        action: &str,
        body: &B,
    ) -> Result<R, IdentityError> {
        let response = self
            .client
            .post(self.endpoint(action))
            .json(body)
            .send()
            .await
            .map_err(|e| IdentityError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(provider_error(status, &body));
        }

        response
            .json()
            .await
            .map_err(|e| IdentityError::Parse(e.to_string()))
    }
}

fn provider_error(status: StatusCode, body: &str) -> IdentityError {
    super::traits::map_provider_error(status, body, IdentityError::Provider, |status, body| {
        IdentityError::RequestFailed {
            status: status.as_u16(),
            body,
        }
    })
}

#[derive(Serialize)]
struct CredentialsRequest<'a> {
    email: &'a str,
    password: &'a str,
    #[serde(rename = "returnSecureToken")]
    return_secure_token: bool,
}

#[derive(Deserialize)]
struct TokenResponse {
    #[serde(rename = "localId")]
    local_id: String,
    #[serde(rename = "idToken")]
    id_token: String,
    #[serde(default)]
    email: String,
}

#[derive(Serialize)]
struct LookupRequest<'a> {
    #[serde(rename = "idToken")]
    id_token: &'a str,
}

#[derive(Deserialize)]
struct LookupResponse {
    #[serde(default)]
    users: Vec<LookupUser>,
}

#[derive(Deserialize)]
struct LookupUser {
    #[serde(rename = "emailVerified", default)]
    email_verified: bool,
}

#[derive(Serialize)]
struct OobCodeRequest<'a> {
    #[serde(rename = "requestType")]
    request_type: &'a str,
    #[serde(rename = "idToken", skip_serializing_if = "Option::is_none")]
    id_token: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    email: Option<&'a str>,
}

#[async_trait]
impl IdentityProvider for RestIdentity {
    fn auth_state(&self) -> watch::Receiver<Option<AuthUser>> {
        self.session.subscribe()
    }

    async fn create_account(&self, email: &str, password: &str) -> Result<AuthUser, IdentityError> {
        let response: TokenResponse = self
            .post(
                "signUp",
                &CredentialsRequest {
                    email,
                    password,
                    return_secure_token: true,
                },
            )
            .await?;

        let user = AuthUser::unverified(response.local_id, email, response.id_token);
        info!(uid = %user.uid, "account created");
        self.session.send_replace(Some(user.clone()));
        Ok(user)
    }

    async fn sign_in(&self, email: &str, password: &str) -> Result<AuthUser, IdentityError> {
        let response: TokenResponse = self
            .post(
                "signInWithPassword",
                &CredentialsRequest {
                    email,
                    password,
                    return_secure_token: true,
                },
            )
            .await?;

        // The sign-in response does not carry the verification flag; a
        // lookup with the fresh token does.
        let lookup: LookupResponse = self
            .post(
                "lookup",
                &LookupRequest {
                    id_token: &response.id_token,
                },
            )
            .await?;
        let email_verified = lookup.users.first().map(|u| u.email_verified).unwrap_or(false);

        let resolved_email = if response.email.is_empty() {
            email.to_string()
        } else {
            response.email
        };
        let user = AuthUser {
            uid: response.local_id,
            email: resolved_email,
            email_verified,
            id_token: response.id_token,
        };
        debug!(uid = %user.uid, email_verified, "signed in");
        self.session.send_replace(Some(user.clone()));
        Ok(user)
    }

    async fn send_verification_email(&self, user: &AuthUser) -> Result<(), IdentityError> {
        let _: serde_json::Value = self
            .post(
                "sendOobCode",
                &OobCodeRequest {
                    request_type: "VERIFY_EMAIL",
                    id_token: Some(&user.id_token),
                    email: None,
                },
            )
            .await?;
        debug!(uid = %user.uid, "verification email requested");
        Ok(())
    }

    async fn send_password_reset(&self, email: &str) -> Result<(), IdentityError> {
        let _: serde_json::Value = self
            .post(
                "sendOobCode",
                &OobCodeRequest {
                    request_type: "PASSWORD_RESET",
                    id_token: None,
                    email: Some(email),
                },
            )
            .await?;
        debug!("password reset requested");
        Ok(())
    }

    async fn sign_out(&self) -> Result<(), IdentityError> {
        self.session.send_replace(None);
        info!("signed out");
        Ok(())
    }
}
