use axum::{
    Json,
    response::{Html, IntoResponse, Response},
};
use serde_json::json;

use socialauth_axum::{AuthUser, SA_ROUTE_PREFIX};

pub(crate) async fn index(user: Option<AuthUser>) -> Html<String> {
    let prefix = SA_ROUTE_PREFIX.as_str();
    match user {
        Some(u) => Html(format!(
            r#"<p>Hey {}!</p>
<p><a href="/protected">Protected page</a> | <a href="{prefix}/3rdparty/">Connected accounts</a></p>
<form method="post" action="{prefix}/logout/"><input type="hidden" name="csrf_token" value="{}"><button>Logout</button></form>
<form method="post" action="{prefix}/github/login/"><input type="hidden" name="process" value="connect"><input type="hidden" name="csrf_token" value="{}"><button>Connect GitHub</button></form>"#,
            escape(&u.display),
            u.csrf_token,
            u.csrf_token
        )),
        None => Html(format!(
            r#"<p>Not logged in.</p>
<p><a href="{prefix}/github/login/">Log in with GitHub</a> | <a href="{prefix}/google/login/">Log in with Google</a></p>"#
        )),
    }
}

pub(crate) async fn protected(user: AuthUser) -> Response {
    Json(json!({
        "id": user.id,
        "display": user.display,
        "email": user.email,
        "username": user.username,
    }))
    .into_response()
}

fn escape(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}
