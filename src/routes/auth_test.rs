use super::*;
use crate::state::test_helpers;
use axum::http::header::SET_COOKIE;

#[test]
fn oauth_state_requires_exact_match() {
    assert!(oauth_state_matches("abc", Some("abc")));
    assert!(!oauth_state_matches("abc", Some("abd")));
    assert!(!oauth_state_matches("abc", None));
}

#[test]
fn oauth_state_rejects_empty_cookie() {
    assert!(!oauth_state_matches("", Some("")));
    assert!(!oauth_state_matches("", None));
}

#[test]
fn session_cookie_is_http_only_and_lax() {
    let cookie = session_cookie("tok".into(), true);
    assert_eq!(cookie.name(), COOKIE_NAME);
    assert_eq!(cookie.value(), "tok");
    assert_eq!(cookie.http_only(), Some(true));
    assert_eq!(cookie.secure(), Some(true));
    assert_eq!(cookie.same_site(), Some(SameSite::Lax));
    assert_eq!(cookie.path(), Some("/"));
}

#[test]
fn expired_cookie_has_zero_max_age() {
    let cookie = expired_cookie(OAUTH_STATE_COOKIE_NAME, false);
    assert_eq!(cookie.value(), "");
    assert_eq!(cookie.max_age(), Some(Duration::ZERO));
    assert_eq!(cookie.secure(), Some(false));
}

#[tokio::test]
async fn github_redirect_without_config_is_unavailable() {
    let (state, _store) = test_helpers::test_app_state();
    let resp = github_redirect(State(state)).await;
    assert_eq!(resp.status(), StatusCode::SERVICE_UNAVAILABLE);
}

#[tokio::test]
async fn github_redirect_sets_state_cookie_and_redirects() {
    let (mut state, _store) = test_helpers::test_app_state();
    state.github = Some(auth_svc::GitHubConfig {
        client_id: "cid".into(),
        client_secret: "secret".into(),
        redirect_uri: "http://localhost/cb".into(),
    });

    let resp = github_redirect(State(state)).await;
    assert_eq!(resp.status(), StatusCode::TEMPORARY_REDIRECT);

    let cookie = resp
        .headers()
        .get(SET_COOKIE)
        .and_then(|v| v.to_str().ok())
        .expect("state cookie should be set");
    assert!(cookie.starts_with("oauth_state="));

    let issued = cookie
        .trim_start_matches("oauth_state=")
        .split(';')
        .next()
        .unwrap_or_default();
    let location = resp
        .headers()
        .get("location")
        .and_then(|v| v.to_str().ok())
        .expect("redirect location");
    assert!(location.ends_with(&format!("state={issued}")));
}

// =============================================================================
// gates
// =============================================================================

async fn extract_with_cookie(cookie: Option<&str>) -> Result<AuthUser, StatusCode> {
    use axum::extract::FromRequestParts;

    let (state, _store) = test_helpers::test_app_state();
    let mut builder = axum::http::Request::builder().uri("/api/drawings");
    if let Some(cookie) = cookie {
        builder = builder.header(axum::http::header::COOKIE, cookie);
    }
    let (mut parts, ()) = builder.body(()).expect("request should build").into_parts();
    AuthUser::from_request_parts(&mut parts, &state).await
}

#[tokio::test]
async fn extractor_rejects_request_without_session_cookie() {
    assert_eq!(extract_with_cookie(None).await.err(), Some(StatusCode::UNAUTHORIZED));
    assert_eq!(extract_with_cookie(Some("theme=dark")).await.err(), Some(StatusCode::UNAUTHORIZED));
}

#[tokio::test]
async fn extractor_rejects_empty_session_cookie() {
    assert_eq!(extract_with_cookie(Some("session_token=")).await.err(), Some(StatusCode::UNAUTHORIZED));
}

#[tokio::test]
async fn dev_login_is_hidden_without_bypass() {
    unsafe { std::env::remove_var("DEV_AUTH_BYPASS") };
    let (state, _store) = test_helpers::test_app_state();
    let resp = dev_login(State(state), CookieJar::new()).await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    assert!(resp.headers().get(SET_COOKIE).is_none());
}
