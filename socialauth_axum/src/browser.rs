//! Redirect based routes for browsers

use axum::{
    Json, Router,
    body::{Body, Bytes, to_bytes},
    extract::{Form, FromRequest, OriginalUri, Path, Query, Request},
    response::Redirect,
    routing::{get, post},
};
use http::{HeaderMap, StatusCode, header::CONTENT_TYPE};
use serde::Deserialize;
use serde_json::{Value, json};

use socialauth::{
    AuthProcess, CallbackParams, CoordinationError, LoginOutcome, PendingFlow,
    ProviderCallbackOutcome, ProviderCallbackResult, ProviderRedirectRequest,
    ReauthenticationResult, SA_ROUTE_PREFIX, SocialAccount, StashedRequest,
    disconnect_social_account_core, list_authenticators_core, list_social_accounts_core,
    login_core, logout_core, mfa_authenticate_core, pending_flows, pending_signup_core,
    prepare_logout_response, provider_callback_core, provider_redirect_core,
    reauthenticate_core, reauthenticate_mfa_core, social_signup_core, suspend_request,
    verify_email_core,
};

use super::config::{
    HEADLESS_ONLY, MAX_STASHED_BODY, SA_LOGIN_REDIRECT_URL, SA_LOGOUT_REDIRECT_URL,
};
use super::error::IntoResponseError;
use super::headless::anonymous_flows;
use super::session::SessionContext;

type RedirectResult = Result<(HeaderMap, Redirect), (StatusCode, String)>;

pub(super) fn router() -> Router {
    callback_router()
        .route(
            "/{provider}/login/",
            get(provider_login_get).post(provider_login_post),
        )
        .route("/login/", get(login_page).post(login))
        .route("/confirm-email/", get(confirm_email_page).post(confirm_email))
        .route("/signup/closed/", get(signup_closed))
        .route("/3rdparty/", get(list_connections))
        .route(
            "/3rdparty/signup/",
            get(provider_signup_page).post(provider_signup),
        )
        .route("/3rdparty/disconnect/", post(disconnect))
        .route("/reauthenticate/", get(reauthenticate_info).post(reauthenticate))
        .route("/2fa/authenticate/", get(mfa_page).post(mfa_authenticate))
        .route("/logout/", post(logout))
}

/// Provider callbacks only. Headless flows need these even when no other
/// browser route is served.
pub(super) fn callback_router() -> Router {
    Router::new().route(
        "/{provider}/login/callback/",
        get(provider_callback_get).post(provider_callback_post),
    )
}

fn prefixed(path: &str) -> String {
    format!("{}{}", SA_ROUTE_PREFIX.as_str(), path)
}

/// `next` when it stays on this site.
fn local_next(next: Option<&str>) -> Option<&str> {
    next.filter(|n| n.starts_with('/') && !n.starts_with("//") && !n.starts_with("/\\"))
}

/// Page continuing a flow that waits in the session. Without browser pages
/// the client reads the pending flow from its session at `next`.
fn pending_page(path: &str, next: Option<&str>) -> String {
    if *HEADLESS_ONLY {
        return next.unwrap_or(SA_LOGIN_REDIRECT_URL.as_str()).to_string();
    }
    match next {
        Some(next) => format!("{}?next={}", prefixed(path), urlencoding::encode(next)),
        None => prefixed(path),
    }
}

/// Page reporting a failed flow that had no `next` to return to.
fn error_page(path: &str, code: &str) -> String {
    if *HEADLESS_ONLY {
        with_error(SA_LOGIN_REDIRECT_URL.as_str(), code)
    } else {
        with_error(&prefixed(path), code)
    }
}

#[derive(Debug, Default, Deserialize)]
struct ProviderLoginParams {
    #[serde(default)]
    process: AuthProcess,
    next: Option<String>,
    scope: Option<String>,
    auth_params: Option<String>,
    csrf_token: Option<String>,
}

impl ProviderLoginParams {
    fn into_request(self, provider: String) -> ProviderRedirectRequest {
        ProviderRedirectRequest {
            provider,
            process: self.process,
            next: self.next,
            scope: self.scope,
            auth_params: self.auth_params,
        }
    }
}

async fn begin_provider_login(
    mut ctx: SessionContext,
    request: ProviderRedirectRequest,
) -> RedirectResult {
    let url = provider_redirect_core(&mut ctx.session, request)
        .await
        .into_response_error()?;
    Ok((ctx.cookie_headers(), Redirect::to(&url)))
}

/// Only plain logins may start from a link; connecting an account needs a POST.
async fn provider_login_get(
    ctx: SessionContext,
    Path(provider): Path<String>,
    Query(params): Query<ProviderLoginParams>,
) -> RedirectResult {
    if params.process != AuthProcess::Login {
        tracing::warn!(provider = %provider, "Rejected provider {:?} over GET", params.process);
        return Err((
            StatusCode::METHOD_NOT_ALLOWED,
            "Use POST to connect an account".to_string(),
        ));
    }
    begin_provider_login(ctx, params.into_request(provider)).await
}

async fn provider_login_post(
    ctx: SessionContext,
    Path(provider): Path<String>,
    Form(params): Form<ProviderLoginParams>,
) -> RedirectResult {
    ctx.verify_form_csrf(params.csrf_token.as_deref())
        .map_err(|e| (StatusCode::FORBIDDEN, e.to_string()))?;
    begin_provider_login(ctx, params.into_request(provider)).await
}

async fn finish_provider_login(
    mut ctx: SessionContext,
    provider: &str,
    params: &CallbackParams,
) -> RedirectResult {
    let result = provider_callback_core(&mut ctx.session, provider, params)
        .await
        .into_response_error()?;
    Ok((ctx.cookie_headers(), Redirect::to(&callback_redirect(&result))))
}

async fn provider_callback_get(
    ctx: SessionContext,
    Path(provider): Path<String>,
    Query(params): Query<CallbackParams>,
) -> RedirectResult {
    finish_provider_login(ctx, &provider, &params).await
}

/// Providers using `response_mode=form_post` come back with a POST
async fn provider_callback_post(
    ctx: SessionContext,
    Path(provider): Path<String>,
    Form(params): Form<CallbackParams>,
) -> RedirectResult {
    finish_provider_login(ctx, &provider, &params).await
}

fn login_redirect(outcome: &LoginOutcome, next: Option<&str>) -> String {
    match outcome {
        LoginOutcome::LoggedIn(_) => next.unwrap_or(SA_LOGIN_REDIRECT_URL.as_str()).to_string(),
        LoginOutcome::MfaRequired => pending_page("/2fa/authenticate/", next),
        LoginOutcome::VerificationRequired { .. } => pending_page("/confirm-email/", next),
    }
}

/// Outcomes of a provider callback that end the flow with an error.
fn callback_error_code(outcome: &ProviderCallbackOutcome) -> Option<&'static str> {
    match outcome {
        ProviderCallbackOutcome::ConnectedToOther => Some("connected_to_other"),
        ProviderCallbackOutcome::SignupClosed => Some("signup_closed"),
        ProviderCallbackOutcome::DuplicateEmail { .. } => Some("email_taken"),
        _ => None,
    }
}

fn with_error(url: &str, code: &str) -> String {
    let separator = if url.contains('?') { '&' } else { '?' };
    format!("{url}{separator}error={code}")
}

/// Where the browser goes once a provider callback was handled.
///
/// Errors go back to `next` when the flow started with one, so headless
/// clients see them on their callback URL.
fn callback_redirect(result: &ProviderCallbackResult) -> String {
    let next = result.next.as_deref();
    if let (Some(code), Some(next)) = (callback_error_code(&result.outcome), next) {
        return with_error(next, code);
    }
    match &result.outcome {
        ProviderCallbackOutcome::Login(outcome) => login_redirect(outcome, next),
        ProviderCallbackOutcome::Connected(_) | ProviderCallbackOutcome::AlreadyConnected(_) => {
            match next {
                Some(next) => next.to_string(),
                None if *HEADLESS_ONLY => SA_LOGIN_REDIRECT_URL.to_string(),
                None => prefixed("/3rdparty/"),
            }
        }
        ProviderCallbackOutcome::SignupRequired => pending_page("/3rdparty/signup/", next),
        ProviderCallbackOutcome::Redirect { url }
        | ProviderCallbackOutcome::ReauthenticationRequired { url } => url.clone(),
        ProviderCallbackOutcome::ConnectedToOther => error_page("/3rdparty/", "connected_to_other"),
        // The login waits in the session; the signup page asks for another address
        ProviderCallbackOutcome::DuplicateEmail { .. } => {
            error_page("/3rdparty/signup/", "email_taken")
        }
        ProviderCallbackOutcome::SignupClosed => error_page("/signup/closed/", "signup_closed"),
    }
}

#[derive(Debug, Default, Deserialize)]
struct PageQuery {
    next: Option<String>,
    error: Option<String>,
}

fn has_pending(ctx: &SessionContext, flow: PendingFlow) -> bool {
    pending_flows(&ctx.session).contains(&flow)
}

/// What a login page offers, and why the user was sent there.
async fn login_page(ctx: SessionContext, Query(query): Query<PageQuery>) -> Json<Value> {
    Json(json!({
        "is_authenticated": ctx.session.is_authenticated(),
        "flows": anonymous_flows(&pending_flows(&ctx.session)),
        "error": query.error,
        "next": query.next,
    }))
}

#[derive(Debug, Deserialize)]
struct LoginForm {
    login: String,
    password: String,
    next: Option<String>,
    csrf_token: Option<String>,
}

async fn login(mut ctx: SessionContext, Form(form): Form<LoginForm>) -> RedirectResult {
    ctx.verify_form_csrf(form.csrf_token.as_deref())
        .map_err(|e| (StatusCode::FORBIDDEN, e.to_string()))?;
    let outcome = login_core(&mut ctx.session, &form.login, &form.password)
        .await
        .into_response_error()?;
    let target = login_redirect(&outcome, local_next(form.next.as_deref()));
    Ok((ctx.cookie_headers(), Redirect::to(&target)))
}

async fn confirm_email_page(ctx: SessionContext, Query(query): Query<PageQuery>) -> Json<Value> {
    Json(json!({
        "pending": has_pending(&ctx, PendingFlow::VerifyEmail),
        "next": query.next,
    }))
}

#[derive(Debug, Deserialize)]
struct ConfirmEmailForm {
    key: String,
    next: Option<String>,
    csrf_token: Option<String>,
}

/// Confirm an address with the key from the verification mail. Completes a
/// login that waited for the verification.
async fn confirm_email(mut ctx: SessionContext, Form(form): Form<ConfirmEmailForm>) -> RedirectResult {
    ctx.verify_form_csrf(form.csrf_token.as_deref())
        .map_err(|e| (StatusCode::FORBIDDEN, e.to_string()))?;
    let result = verify_email_core(&mut ctx.session, &form.key)
        .await
        .into_response_error()?;
    let next = local_next(form.next.as_deref());
    let target = match &result.login {
        Some(outcome) => login_redirect(outcome, next),
        None => next.unwrap_or(SA_LOGIN_REDIRECT_URL.as_str()).to_string(),
    };
    Ok((ctx.cookie_headers(), Redirect::to(&target)))
}

async fn signup_closed() -> Json<Value> {
    Json(json!({
        "error": "signup_closed",
        "message": "Sign up is currently closed.",
    }))
}

/// The provider login waiting for signup input. Tokens stay server side.
async fn provider_signup_page(ctx: SessionContext, Query(query): Query<PageQuery>) -> Json<Value> {
    let pending = pending_signup_core(&ctx.session).await.ok();
    Json(json!({
        "pending": pending.is_some(),
        "provider": pending.as_ref().map(|login| login.account.provider.clone()),
        "email": pending.as_ref().and_then(|login| login.email().map(str::to_string)),
        "error": query.error,
        "next": query.next,
    }))
}

#[derive(Debug, Deserialize)]
struct ProviderSignupForm {
    email: Option<String>,
    username: Option<String>,
    next: Option<String>,
    csrf_token: Option<String>,
}

async fn provider_signup(
    mut ctx: SessionContext,
    Form(form): Form<ProviderSignupForm>,
) -> RedirectResult {
    ctx.verify_form_csrf(form.csrf_token.as_deref())
        .map_err(|e| (StatusCode::FORBIDDEN, e.to_string()))?;
    let outcome = social_signup_core(
        &mut ctx.session,
        form.email.as_deref(),
        form.username.as_deref(),
    )
    .await
    .into_response_error()?;
    let target = login_redirect(&outcome, local_next(form.next.as_deref()));
    Ok((ctx.cookie_headers(), Redirect::to(&target)))
}

async fn mfa_page(ctx: SessionContext, Query(query): Query<PageQuery>) -> Json<Value> {
    Json(json!({
        "pending": has_pending(&ctx, PendingFlow::MfaAuthenticate),
        "next": query.next,
    }))
}

async fn list_connections(
    ctx: SessionContext,
) -> Result<Json<Vec<SocialAccount>>, (StatusCode, String)> {
    let accounts = list_social_accounts_core(&ctx.session)
        .await
        .into_response_error()?;
    Ok(Json(accounts))
}

#[derive(Debug, Deserialize)]
struct DisconnectForm {
    provider: String,
    account: String,
    csrf_token: Option<String>,
}

/// Disconnect a social account. Suspended for reauthentication when the
/// session is too old, and replayed once the user has reauthenticated.
///
/// The stash keeps the path as the client sent it, mount prefix included, so
/// the follow-up request reaches this handler again.
async fn disconnect(
    mut ctx: SessionContext,
    OriginalUri(original_uri): OriginalUri,
    request: Request,
) -> RedirectResult {
    let (parts, body) = request.into_parts();
    let bytes: Bytes = to_bytes(body, MAX_STASHED_BODY)
        .await
        .map_err(|e| (StatusCode::PAYLOAD_TOO_LARGE, e.to_string()))?;
    let content_type = parts
        .headers
        .get(CONTENT_TYPE)
        .and_then(|h| h.to_str().ok())
        .map(str::to_string);

    let mut form_request = Request::builder()
        .method(parts.method.clone())
        .uri(parts.uri.clone());
    if let Some(content_type) = &content_type {
        form_request = form_request.header(CONTENT_TYPE, content_type);
    }
    let form_request = form_request
        .body(Body::from(bytes.clone()))
        .into_response_error()?;
    let Form(form) = Form::<DisconnectForm>::from_request(form_request, &())
        .await
        .map_err(|e| (StatusCode::BAD_REQUEST, e.body_text()))?;

    ctx.verify_form_csrf(form.csrf_token.as_deref())
        .map_err(|e| (StatusCode::FORBIDDEN, e.to_string()))?;

    match disconnect_social_account_core(&ctx.session, &form.provider, &form.account).await {
        Ok(_) => Ok((ctx.cookie_headers(), Redirect::to(&prefixed("/3rdparty/")))),
        Err(e) if e.is_reauthentication_required() => {
            let stashed = StashedRequest::new(
                parts.method.as_str(),
                original_uri.path(),
                original_uri.query(),
                content_type.as_deref(),
                &bytes,
            );
            let url = suspend_request(&mut ctx.session, stashed)
                .await
                .map_err(CoordinationError::from)
                .into_response_error()?;
            Ok((ctx.cookie_headers(), Redirect::to(&url)))
        }
        Err(e) => Err(e).into_response_error(),
    }
}

#[derive(Debug, Deserialize)]
struct NextQuery {
    next: Option<String>,
}

/// Which reauthentication methods the user has.
async fn reauthenticate_info(
    ctx: SessionContext,
    Query(query): Query<NextQuery>,
) -> Result<Json<Value>, (StatusCode, String)> {
    let authenticators = list_authenticators_core(&ctx.session)
        .await
        .into_response_error()?;
    let mut methods = vec!["password"];
    if !authenticators.is_empty() {
        methods.push("mfa");
    }
    Ok(Json(json!({ "methods": methods, "next": query.next })))
}

#[derive(Debug, Deserialize)]
struct ReauthenticateForm {
    password: Option<String>,
    code: Option<String>,
    next: Option<String>,
    csrf_token: Option<String>,
}

async fn reauthenticate(
    mut ctx: SessionContext,
    Form(form): Form<ReauthenticateForm>,
) -> RedirectResult {
    ctx.verify_form_csrf(form.csrf_token.as_deref())
        .map_err(|e| (StatusCode::FORBIDDEN, e.to_string()))?;

    let next = form.next.as_deref();
    let result = match (&form.code, &form.password) {
        (Some(code), _) => reauthenticate_mfa_core(&mut ctx.session, code, next).await,
        (None, Some(password)) => reauthenticate_core(&mut ctx.session, password, next).await,
        (None, None) => {
            return Err((
                StatusCode::BAD_REQUEST,
                "Missing password or code".to_string(),
            ));
        }
    }
    .into_response_error()?;

    let target = match &result {
        // The resume middleware turns the follow-up GET back into the original request
        ReauthenticationResult::Replay(request) => request.uri(),
        ReauthenticationResult::Connected(result) => callback_redirect(result),
        ReauthenticationResult::Redirect(url) => url.clone(),
        ReauthenticationResult::Done => SA_LOGIN_REDIRECT_URL.to_string(),
    };
    Ok((ctx.cookie_headers(), Redirect::to(&target)))
}

#[derive(Debug, Deserialize)]
struct CodeForm {
    code: String,
    next: Option<String>,
    csrf_token: Option<String>,
}

async fn mfa_authenticate(mut ctx: SessionContext, Form(form): Form<CodeForm>) -> RedirectResult {
    ctx.verify_form_csrf(form.csrf_token.as_deref())
        .map_err(|e| (StatusCode::FORBIDDEN, e.to_string()))?;
    mfa_authenticate_core(&mut ctx.session, &form.code)
        .await
        .into_response_error()?;
    let target = local_next(form.next.as_deref())
        .unwrap_or(SA_LOGIN_REDIRECT_URL.as_str())
        .to_string();
    tracing::debug!("Second factor accepted, redirecting to {}", target);
    Ok((ctx.cookie_headers(), Redirect::to(&target)))
}

async fn logout(mut ctx: SessionContext) -> RedirectResult {
    let session_id = ctx.session.id().to_string();
    logout_core(&mut ctx.session).await.into_response_error()?;
    let headers = prepare_logout_response(Some(&session_id))
        .await
        .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))?;
    Ok((headers, Redirect::to(SA_LOGOUT_REDIRECT_URL.as_str())))
}
