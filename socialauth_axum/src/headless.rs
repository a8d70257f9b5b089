//! JSON API for single page and mobile apps
//!
//! Every response uses the `{status, data, meta}` envelope. Requests that
//! need a login, or a more recent one, get 401 with the flows the client can
//! run next in `data.flows`.

use axum::{
    Extension, Json, Router,
    extract::Form,
    response::{IntoResponse, Redirect, Response},
    routing::{get, post},
};
use http::{HeaderMap, HeaderValue, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use socialauth::{
    AuthProcess, AuthenticatorType, CoordinationError, LoginOutcome, PendingFlow,
    ProviderRedirectRequest, SessionUser, SignupRequest,
    add_email_core, auth_config_core, change_password_core, confirm_login_code_core,
    disconnect_social_account_core, end_user_sessions_core, get_user_from_session,
    list_authenticators_core, list_emails_core, list_providers, list_social_accounts_core,
    list_user_sessions_core, login_core, logout_core, mfa_authenticate_core,
    password_reset_user_core, pending_flows, pending_signup_core, prepare_logout_response,
    provider_redirect_core, reauthenticate_core, reauthenticate_mfa_core, recovery_codes_core,
    regenerate_recovery_codes_core, remove_email_core, request_login_code_core,
    request_password_reset_core,
    resend_email_verification_core, reset_password_core, set_primary_email_core, signup_core,
    social_signup_core, totp_activate_core, totp_deactivate_core, totp_setup_core,
    verify_email_core,
};

use super::config::HeadlessClient;
use super::error::ApiError;
use super::session::{CSRF_TOKEN_HEADER, SessionContext};

pub(super) fn router(client: HeadlessClient) -> Router {
    Router::new()
        .route("/config", get(config))
        .route("/auth/session", get(session_status).delete(logout))
        .route("/auth/login", post(login))
        .route("/auth/code/request", post(request_login_code))
        .route("/auth/code/confirm", post(confirm_login_code))
        .route("/auth/signup", post(signup))
        .route("/auth/reauthenticate", post(reauthenticate))
        .route("/auth/2fa/authenticate", post(mfa_authenticate))
        .route("/auth/2fa/reauthenticate", post(mfa_reauthenticate))
        .route("/auth/email/verify", post(verify_email))
        .route("/auth/password/request", post(request_password_reset))
        .route(
            "/auth/password/reset",
            get(password_reset_info).post(reset_password),
        )
        .route("/auth/provider/redirect", post(provider_redirect))
        .route(
            "/auth/provider/signup",
            get(provider_signup_info).post(provider_signup),
        )
        .route(
            "/account/providers",
            get(list_providers_connected).delete(disconnect_provider),
        )
        .route(
            "/account/email",
            get(list_emails)
                .post(add_email)
                .put(resend_email_verification)
                .patch(set_primary_email)
                .delete(remove_email),
        )
        .route("/auth/sessions", get(list_sessions).delete(end_sessions))
        .route("/account/password/change", post(change_password))
        .route("/account/authenticators", get(list_authenticators))
        .route(
            "/account/authenticators/totp",
            get(totp_status).post(totp_activate).delete(totp_deactivate),
        )
        .route(
            "/account/authenticators/recovery-codes",
            get(recovery_codes).post(regenerate_recovery_codes),
        )
        .layer(Extension(client))
}

/// Header carrying the password reset key on `GET /auth/password/reset`
const PASSWORD_RESET_KEY_HEADER: &str = "X-Password-Reset-Key";

type ApiResult = Result<Response, Response>;

/// Response envelope
#[derive(Debug, Serialize)]
struct Envelope {
    status: u16,
    #[serde(skip_serializing_if = "Value::is_null")]
    data: Value,
    #[serde(skip_serializing_if = "Value::is_null")]
    meta: Value,
}

/// Builds responses for one request, carrying the session back to the client.
struct Responder<'a> {
    ctx: &'a SessionContext,
    client: HeadlessClient,
}

impl<'a> Responder<'a> {
    fn new(ctx: &'a SessionContext, client: HeadlessClient) -> Self {
        Self { ctx, client }
    }

    /// Browser clients get the session cookie when it changed, and the CSRF
    /// token to send back in `X-CSRF-Token`.
    fn session_headers(&self) -> HeaderMap {
        match self.client {
            HeadlessClient::Browser => {
                let mut headers = self.ctx.cookie_headers();
                match HeaderValue::from_str(self.ctx.session.csrf_token()) {
                    Ok(value) => {
                        headers.insert(CSRF_TOKEN_HEADER, value);
                    }
                    Err(_) => tracing::error!("Failed to create CSRF header value from token"),
                }
                headers
            }
            HeadlessClient::App => HeaderMap::new(),
        }
    }

    /// App clients get their session token whenever the session holds state.
    fn meta(&self, mut meta: Value) -> Value {
        let session = &self.ctx.session;
        let persisted = session.is_authenticated() || !pending_flows(session).is_empty();
        if self.client == HeadlessClient::App && persisted {
            if meta.is_null() {
                meta = json!({});
            }
            meta["session_token"] = json!(session.id());
        }
        meta
    }

    fn envelope(&self, status: StatusCode, data: Value, meta: Value) -> Response {
        let body = Envelope {
            status: status.as_u16(),
            data,
            meta: self.meta(meta),
        };
        (status, self.session_headers(), Json(body)).into_response()
    }

    fn ok(&self, data: impl Serialize) -> Response {
        self.envelope(StatusCode::OK, to_value(data), Value::Null)
    }

    fn done(&self) -> Response {
        self.envelope(StatusCode::OK, Value::Null, Value::Null)
    }

    /// 200 with the user and how the session authenticated.
    fn authenticated(&self, user: &SessionUser) -> Response {
        self.envelope(
            StatusCode::OK,
            json!({
                "user": user,
                "methods": self.ctx.session.authentication_records(),
            }),
            json!({ "is_authenticated": true }),
        )
    }

    /// 401 listing what the client can do next.
    fn unauthenticated(&self) -> Response {
        self.envelope(
            StatusCode::UNAUTHORIZED,
            json!({ "flows": anonymous_flows(&pending_flows(&self.ctx.session)) }),
            json!({ "is_authenticated": false }),
        )
    }

    /// 401 for a logged in session that must reauthenticate first.
    async fn reauthentication_required(&self) -> Response {
        let mut flows = vec![json!({ "id": "reauthenticate" })];
        let has_totp = list_authenticators_core(&self.ctx.session)
            .await
            .map(|list| list.iter().any(|a| a.kind == AuthenticatorType::Totp))
            .unwrap_or(false);
        if has_totp {
            flows.push(json!({ "id": "mfa_reauthenticate" }));
        }
        let user = match self.ctx.session.user_id() {
            Some(_) => get_user_from_session(self.ctx.session.id()).await.ok(),
            None => None,
        };
        self.envelope(
            StatusCode::UNAUTHORIZED,
            json!({
                "flows": flows,
                "user": user,
                "methods": self.ctx.session.authentication_records(),
            }),
            json!({ "is_authenticated": true }),
        )
    }

    /// Current session state: 200 when logged in, 401 with flows otherwise.
    async fn session_state(&self) -> Response {
        if !self.ctx.session.is_authenticated() {
            return self.unauthenticated();
        }
        match get_user_from_session(self.ctx.session.id()).await {
            Ok(user) => self.authenticated(&user),
            Err(e) => {
                tracing::debug!("Session user unavailable: {}", e);
                self.unauthenticated()
            }
        }
    }

    fn login_outcome(&self, outcome: &LoginOutcome) -> Response {
        match outcome {
            LoginOutcome::LoggedIn(user) => self.authenticated(user),
            LoginOutcome::MfaRequired | LoginOutcome::VerificationRequired { .. } => {
                self.unauthenticated()
            }
        }
    }

    async fn error(&self, err: CoordinationError) -> Response {
        if err.is_reauthentication_required() {
            return self.reauthentication_required().await;
        }
        if matches!(err, CoordinationError::Unauthorized) {
            return self.unauthenticated();
        }
        let mut response = ApiError::from(&err).into_response();
        response.headers_mut().extend(self.session_headers());
        response
    }
}

fn to_value(data: impl Serialize) -> Value {
    serde_json::to_value(data).unwrap_or_else(|e| {
        tracing::error!("Failed to serialize response data: {}", e);
        Value::Null
    })
}

/// Flows offered to a client that is not logged in. Flows waiting in the
/// session are marked pending.
pub(super) fn anonymous_flows(pending: &[PendingFlow]) -> Vec<Value> {
    let mut flows = vec![json!({ "id": "login" })];
    if auth_config_core().account.is_open {
        flows.push(json!({ "id": "signup" }));
    }
    let providers = list_providers();
    if !providers.is_empty() {
        flows.push(json!({
            "id": "provider_redirect",
            "providers": providers.iter().map(|p| p.id.as_str()).collect::<Vec<_>>(),
        }));
    }
    if auth_config_core().account.login_by_code_enabled {
        flows.push(json!({ "id": "login_by_code" }));
    }
    for flow in pending {
        let id = json!(flow);
        match flows.iter_mut().find(|f| f["id"] == id) {
            Some(offered) => offered["is_pending"] = json!(true),
            None => flows.push(json!({ "id": id, "is_pending": true })),
        }
    }
    flows
}

/// Unwrap a coordination result or render its error for this client.
macro_rules! attempt {
    ($responder:expr, $result:expr) => {
        match $result {
            Ok(value) => value,
            Err(e) => return Err($responder.error(e).await),
        }
    };
}

async fn config(ctx: SessionContext, Extension(client): Extension<HeadlessClient>) -> Response {
    Responder::new(&ctx, client).ok(auth_config_core())
}

async fn session_status(ctx: SessionContext, Extension(client): Extension<HeadlessClient>) -> Response {
    Responder::new(&ctx, client).session_state().await
}

async fn logout(mut ctx: SessionContext, Extension(client): Extension<HeadlessClient>) -> ApiResult {
    let session_id = ctx.session.id().to_string();
    let result = logout_core(&mut ctx.session).await;
    attempt!(Responder::new(&ctx, client), result);

    let mut response = Responder::new(&ctx, client).unauthenticated();
    if client == HeadlessClient::Browser {
        let headers = prepare_logout_response(Some(&session_id))
            .await
            .map_err(|e| ApiError::from(CoordinationError::from(e)).into_response())?;
        response.headers_mut().extend(headers);
    }
    Ok(response)
}

#[derive(Debug, Deserialize)]
struct LoginRequest {
    username: Option<String>,
    email: Option<String>,
    password: String,
}

async fn login(
    mut ctx: SessionContext,
    Extension(client): Extension<HeadlessClient>,
    Json(body): Json<LoginRequest>,
) -> ApiResult {
    let Some(login) = body.email.as_deref().or(body.username.as_deref()) else {
        return Err(
            ApiError::new(StatusCode::BAD_REQUEST, "required", "Enter an email or username.")
                .with_param("email")
                .into_response(),
        );
    };
    let outcome = login_core(&mut ctx.session, login, &body.password).await;
    let outcome = attempt!(Responder::new(&ctx, client), outcome);
    Ok(Responder::new(&ctx, client).login_outcome(&outcome))
}

/// Mail a login code. The 401 marks `login_by_code` pending whether or not
/// the address belongs to anyone.
async fn request_login_code(
    mut ctx: SessionContext,
    Extension(client): Extension<HeadlessClient>,
    Json(body): Json<EmailBody>,
) -> ApiResult {
    let result = request_login_code_core(&mut ctx.session, &body.email).await;
    attempt!(Responder::new(&ctx, client), result);
    Ok(Responder::new(&ctx, client).unauthenticated())
}

async fn confirm_login_code(
    mut ctx: SessionContext,
    Extension(client): Extension<HeadlessClient>,
    Json(body): Json<CodeBody>,
) -> ApiResult {
    let outcome = confirm_login_code_core(&mut ctx.session, &body.code).await;
    let outcome = attempt!(Responder::new(&ctx, client), outcome);
    Ok(Responder::new(&ctx, client).login_outcome(&outcome))
}

async fn signup(
    mut ctx: SessionContext,
    Extension(client): Extension<HeadlessClient>,
    Json(body): Json<SignupRequest>,
) -> ApiResult {
    let outcome = signup_core(&mut ctx.session, body).await;
    let outcome = attempt!(Responder::new(&ctx, client), outcome);
    Ok(Responder::new(&ctx, client).login_outcome(&outcome))
}

#[derive(Debug, Deserialize)]
struct PasswordBody {
    password: String,
}

#[derive(Debug, Deserialize)]
struct CodeBody {
    code: String,
}

async fn reauthenticate(
    mut ctx: SessionContext,
    Extension(client): Extension<HeadlessClient>,
    Json(body): Json<PasswordBody>,
) -> ApiResult {
    let result = reauthenticate_core(&mut ctx.session, &body.password, None).await;
    attempt!(Responder::new(&ctx, client), result);
    Ok(Responder::new(&ctx, client).session_state().await)
}

async fn mfa_reauthenticate(
    mut ctx: SessionContext,
    Extension(client): Extension<HeadlessClient>,
    Json(body): Json<CodeBody>,
) -> ApiResult {
    let result = reauthenticate_mfa_core(&mut ctx.session, &body.code, None).await;
    attempt!(Responder::new(&ctx, client), result);
    Ok(Responder::new(&ctx, client).session_state().await)
}

async fn mfa_authenticate(
    mut ctx: SessionContext,
    Extension(client): Extension<HeadlessClient>,
    Json(body): Json<CodeBody>,
) -> ApiResult {
    let user = mfa_authenticate_core(&mut ctx.session, &body.code).await;
    let user = attempt!(Responder::new(&ctx, client), user);
    Ok(Responder::new(&ctx, client).authenticated(&user))
}

#[derive(Debug, Deserialize)]
struct KeyBody {
    key: String,
}

async fn verify_email(
    mut ctx: SessionContext,
    Extension(client): Extension<HeadlessClient>,
    Json(body): Json<KeyBody>,
) -> ApiResult {
    let result = verify_email_core(&mut ctx.session, &body.key).await;
    let result = attempt!(Responder::new(&ctx, client), result);
    let responder = Responder::new(&ctx, client);
    Ok(match &result.login {
        Some(outcome) => responder.login_outcome(outcome),
        None => responder.session_state().await,
    })
}

#[derive(Debug, Deserialize)]
struct EmailBody {
    email: String,
}

async fn request_password_reset(
    ctx: SessionContext,
    Extension(client): Extension<HeadlessClient>,
    Json(body): Json<EmailBody>,
) -> ApiResult {
    let responder = Responder::new(&ctx, client);
    attempt!(responder, request_password_reset_core(&body.email).await);
    Ok(responder.done())
}

async fn password_reset_info(
    ctx: SessionContext,
    Extension(client): Extension<HeadlessClient>,
    headers: HeaderMap,
) -> ApiResult {
    let responder = Responder::new(&ctx, client);
    let key = headers
        .get(PASSWORD_RESET_KEY_HEADER)
        .and_then(|h| h.to_str().ok())
        .unwrap_or_default();
    let user = attempt!(responder, password_reset_user_core(key).await);
    Ok(responder.ok(json!({ "user": user })))
}

#[derive(Debug, Deserialize)]
struct ResetPasswordBody {
    key: String,
    password: String,
}

async fn reset_password(
    ctx: SessionContext,
    Extension(client): Extension<HeadlessClient>,
    Json(body): Json<ResetPasswordBody>,
) -> ApiResult {
    let responder = Responder::new(&ctx, client);
    attempt!(responder, reset_password_core(&body.key, &body.password).await);
    Ok(responder.session_state().await)
}

#[derive(Debug, Deserialize)]
struct ProviderRedirectForm {
    provider: String,
    callback_url: String,
    #[serde(default)]
    process: AuthProcess,
    csrf_token: Option<String>,
}

/// Browser clients post a form here and follow the redirect to the provider.
/// App clients get the provider URL in `data.location`.
async fn provider_redirect(
    mut ctx: SessionContext,
    Extension(client): Extension<HeadlessClient>,
    Form(form): Form<ProviderRedirectForm>,
) -> ApiResult {
    if let Err(e) = ctx.verify_form_csrf(form.csrf_token.as_deref()) {
        return Err(ApiError::new(StatusCode::FORBIDDEN, "csrf", e.to_string()).into_response());
    }
    let request = ProviderRedirectRequest {
        provider: form.provider,
        process: form.process,
        next: Some(form.callback_url),
        ..Default::default()
    };
    let url = provider_redirect_core(&mut ctx.session, request).await;
    let url = attempt!(Responder::new(&ctx, client), url);
    let responder = Responder::new(&ctx, client);
    Ok(match client {
        HeadlessClient::Browser => (responder.session_headers(), Redirect::to(&url)).into_response(),
        HeadlessClient::App => responder.ok(json!({ "location": url })),
    })
}

async fn provider_signup_info(
    ctx: SessionContext,
    Extension(client): Extension<HeadlessClient>,
) -> ApiResult {
    let responder = Responder::new(&ctx, client);
    let login = attempt!(responder, pending_signup_core(&ctx.session).await);
    Ok(responder.ok(json!({
        "email": login.email_addresses,
        "account": {
            "provider": login.account.provider,
            "uid": login.account.uid,
        },
        "user": {
            "username": login.user.username,
            "email": login.email(),
        },
    })))
}

#[derive(Debug, Deserialize)]
struct ProviderSignupBody {
    email: Option<String>,
    username: Option<String>,
}

async fn provider_signup(
    mut ctx: SessionContext,
    Extension(client): Extension<HeadlessClient>,
    Json(body): Json<ProviderSignupBody>,
) -> ApiResult {
    let outcome =
        social_signup_core(&mut ctx.session, body.email.as_deref(), body.username.as_deref())
            .await;
    let outcome = attempt!(Responder::new(&ctx, client), outcome);
    Ok(Responder::new(&ctx, client).login_outcome(&outcome))
}

async fn list_providers_connected(
    ctx: SessionContext,
    Extension(client): Extension<HeadlessClient>,
) -> ApiResult {
    let responder = Responder::new(&ctx, client);
    let accounts = attempt!(responder, list_social_accounts_core(&ctx.session).await);
    Ok(responder.ok(accounts))
}

#[derive(Debug, Deserialize)]
struct DisconnectBody {
    provider: String,
    account: String,
}

async fn disconnect_provider(
    ctx: SessionContext,
    Extension(client): Extension<HeadlessClient>,
    Json(body): Json<DisconnectBody>,
) -> ApiResult {
    let responder = Responder::new(&ctx, client);
    attempt!(
        responder,
        disconnect_social_account_core(&ctx.session, &body.provider, &body.account).await
    );
    let accounts = attempt!(responder, list_social_accounts_core(&ctx.session).await);
    Ok(responder.ok(accounts))
}

async fn list_sessions(ctx: SessionContext, Extension(client): Extension<HeadlessClient>) -> ApiResult {
    let responder = Responder::new(&ctx, client);
    let sessions = attempt!(responder, list_user_sessions_core(&ctx.session).await);
    Ok(responder.ok(sessions))
}

#[derive(Debug, Deserialize)]
struct EndSessionsBody {
    sessions: Vec<String>,
}

/// End the listed sessions. Ending the requesting one logs it out.
async fn end_sessions(
    mut ctx: SessionContext,
    Extension(client): Extension<HeadlessClient>,
    Json(body): Json<EndSessionsBody>,
) -> ApiResult {
    let session_id = ctx.session.id().to_string();
    let result = end_user_sessions_core(&mut ctx.session, &body.sessions).await;
    let remaining = attempt!(Responder::new(&ctx, client), result);

    if ctx.session.is_authenticated() {
        return Ok(Responder::new(&ctx, client).ok(remaining));
    }
    let mut response = Responder::new(&ctx, client).unauthenticated();
    if client == HeadlessClient::Browser {
        let headers = prepare_logout_response(Some(&session_id))
            .await
            .map_err(|e| ApiError::from(CoordinationError::from(e)).into_response())?;
        response.headers_mut().extend(headers);
    }
    Ok(response)
}

async fn list_emails(ctx: SessionContext, Extension(client): Extension<HeadlessClient>) -> ApiResult {
    let responder = Responder::new(&ctx, client);
    let emails = attempt!(responder, list_emails_core(&ctx.session).await);
    Ok(responder.ok(emails))
}

async fn add_email(
    ctx: SessionContext,
    Extension(client): Extension<HeadlessClient>,
    Json(body): Json<EmailBody>,
) -> ApiResult {
    let responder = Responder::new(&ctx, client);
    attempt!(responder, add_email_core(&ctx.session, &body.email).await);
    let emails = attempt!(responder, list_emails_core(&ctx.session).await);
    Ok(responder.ok(emails))
}

async fn resend_email_verification(
    ctx: SessionContext,
    Extension(client): Extension<HeadlessClient>,
    Json(body): Json<EmailBody>,
) -> ApiResult {
    let responder = Responder::new(&ctx, client);
    attempt!(
        responder,
        resend_email_verification_core(&ctx.session, &body.email).await
    );
    Ok(responder.done())
}

#[derive(Debug, Deserialize)]
struct PrimaryEmailBody {
    email: String,
    primary: bool,
}

async fn set_primary_email(
    ctx: SessionContext,
    Extension(client): Extension<HeadlessClient>,
    Json(body): Json<PrimaryEmailBody>,
) -> ApiResult {
    let responder = Responder::new(&ctx, client);
    if !body.primary {
        return Err(
            ApiError::new(StatusCode::BAD_REQUEST, "invalid", "Only primary: true is supported.")
                .with_param("primary")
                .into_response(),
        );
    }
    attempt!(responder, set_primary_email_core(&ctx.session, &body.email).await);
    let emails = attempt!(responder, list_emails_core(&ctx.session).await);
    Ok(responder.ok(emails))
}

async fn remove_email(
    ctx: SessionContext,
    Extension(client): Extension<HeadlessClient>,
    Json(body): Json<EmailBody>,
) -> ApiResult {
    let responder = Responder::new(&ctx, client);
    attempt!(responder, remove_email_core(&ctx.session, &body.email).await);
    let emails = attempt!(responder, list_emails_core(&ctx.session).await);
    Ok(responder.ok(emails))
}

#[derive(Debug, Deserialize)]
struct ChangePasswordBody {
    current_password: Option<String>,
    new_password: String,
}

async fn change_password(
    mut ctx: SessionContext,
    Extension(client): Extension<HeadlessClient>,
    Json(body): Json<ChangePasswordBody>,
) -> ApiResult {
    let result = change_password_core(
        &mut ctx.session,
        body.current_password.as_deref(),
        &body.new_password,
    )
    .await;
    attempt!(Responder::new(&ctx, client), result);
    Ok(Responder::new(&ctx, client).session_state().await)
}

async fn list_authenticators(
    ctx: SessionContext,
    Extension(client): Extension<HeadlessClient>,
) -> ApiResult {
    let responder = Responder::new(&ctx, client);
    let authenticators = attempt!(responder, list_authenticators_core(&ctx.session).await);
    Ok(responder.ok(authenticators))
}

/// The active TOTP authenticator, or 404 with a fresh secret to set one up.
async fn totp_status(
    mut ctx: SessionContext,
    Extension(client): Extension<HeadlessClient>,
) -> ApiResult {
    let authenticators = list_authenticators_core(&ctx.session).await;
    let authenticators = attempt!(Responder::new(&ctx, client), authenticators);
    if let Some(totp) = authenticators
        .into_iter()
        .find(|a| a.kind == AuthenticatorType::Totp)
    {
        return Ok(Responder::new(&ctx, client).ok(totp));
    }

    let setup = totp_setup_core(&mut ctx.session).await;
    let setup = attempt!(Responder::new(&ctx, client), setup);
    let responder = Responder::new(&ctx, client);
    Ok(responder.envelope(
        StatusCode::NOT_FOUND,
        Value::Null,
        json!({ "secret": setup.secret, "totp_url": setup.totp_url }),
    ))
}

async fn totp_activate(
    mut ctx: SessionContext,
    Extension(client): Extension<HeadlessClient>,
    Json(body): Json<CodeBody>,
) -> ApiResult {
    let activation = totp_activate_core(&mut ctx.session, &body.code).await;
    let activation = attempt!(Responder::new(&ctx, client), activation);
    let responder = Responder::new(&ctx, client);
    Ok(responder.envelope(
        StatusCode::OK,
        to_value(&activation.authenticator),
        json!({ "recovery_codes": activation.recovery_codes }),
    ))
}

async fn totp_deactivate(
    ctx: SessionContext,
    Extension(client): Extension<HeadlessClient>,
) -> ApiResult {
    let responder = Responder::new(&ctx, client);
    attempt!(responder, totp_deactivate_core(&ctx.session).await);
    Ok(responder.done())
}

async fn recovery_codes(
    ctx: SessionContext,
    Extension(client): Extension<HeadlessClient>,
) -> ApiResult {
    let responder = Responder::new(&ctx, client);
    let codes = attempt!(responder, recovery_codes_core(&ctx.session).await);
    Ok(responder.ok(codes))
}

async fn regenerate_recovery_codes(
    ctx: SessionContext,
    Extension(client): Extension<HeadlessClient>,
) -> ApiResult {
    let responder = Responder::new(&ctx, client);
    let codes = attempt!(responder, regenerate_recovery_codes_core(&ctx.session).await);
    Ok(responder.ok(codes))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_anonymous_flows_mark_pending() {
        crate::test_utils::init_test_environment().await;
        let flows = anonymous_flows(&[PendingFlow::MfaAuthenticate]);
        assert_eq!(flows[0], json!({ "id": "login" }));
        let pending: Vec<_> = flows
            .iter()
            .filter(|f| f.get("is_pending").is_some())
            .collect();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0]["id"], "mfa_authenticate");
    }
}
