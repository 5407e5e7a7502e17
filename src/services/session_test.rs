use super::*;

// =============================================================================
// bytes_to_hex
// =============================================================================

#[test]
fn bytes_to_hex_empty() {
    assert_eq!(bytes_to_hex(&[]), "");
}

#[test]
fn bytes_to_hex_leading_zero() {
    assert_eq!(bytes_to_hex(&[0x0a]), "0a");
}

#[test]
fn bytes_to_hex_multi_byte() {
    assert_eq!(bytes_to_hex(&[0xde, 0xad, 0xbe, 0xef]), "deadbeef");
}

// =============================================================================
// tokens
// =============================================================================

#[test]
fn generate_token_is_64_hex_chars() {
    let token = generate_token();
    assert_eq!(token.len(), 64);
    assert!(token.chars().all(|c| c.is_ascii_hexdigit()));
}

#[test]
fn generate_token_two_calls_differ() {
    assert_ne!(generate_token(), generate_token());
}

#[test]
fn generate_ws_ticket_is_32_hex_chars() {
    let ticket = generate_ws_ticket();
    assert_eq!(ticket.len(), 32);
    assert!(ticket.chars().all(|c| c.is_ascii_hexdigit()));
}

#[test]
fn session_user_serializes_profile() {
    let user = SessionUser { id: DEV_USER_ID, name: DEV_USER_NAME.into(), avatar_url: None };
    let json = serde_json::to_value(&user).expect("serialize");
    assert_eq!(json["id"], "00000000-0000-0000-0000-00000000de00");
    assert_eq!(json["name"], "Local Artist");
    assert!(json["avatar_url"].is_null());
}

// =============================================================================
// live Postgres
// =============================================================================

#[cfg(feature = "live-db-tests")]
async fn live_pool() -> PgPool {
    let url = std::env::var("TEST_DATABASE_URL").expect("TEST_DATABASE_URL required for live-db-tests");
    let pool = sqlx::postgres::PgPoolOptions::new()
        .max_connections(2)
        .connect(&url)
        .await
        .unwrap();
    sqlx::migrate!("src/db/migrations").run(&pool).await.unwrap();
    pool
}

#[cfg(feature = "live-db-tests")]
async fn count(pool: &PgPool, sql: &'static str, key: &str) -> i64 {
    sqlx::query_scalar(sql).bind(key).fetch_one(pool).await.unwrap()
}

#[cfg(feature = "live-db-tests")]
#[tokio::test]
async fn issuing_credentials_prunes_expired_rows() {
    let pool = live_pool().await;
    let user_id = upsert_dev_user(&pool).await.unwrap();
    let stale_ticket = generate_ws_ticket();
    let stale_token = generate_token();

    sqlx::query("INSERT INTO ws_tickets (ticket, user_id, expires_at) VALUES ($1, $2, now() - interval '1 minute')")
        .bind(&stale_ticket)
        .bind(user_id)
        .execute(&pool)
        .await
        .unwrap();
    sqlx::query("INSERT INTO sessions (token, user_id, expires_at) VALUES ($1, $2, now() - interval '1 day')")
        .bind(&stale_token)
        .bind(user_id)
        .execute(&pool)
        .await
        .unwrap();

    let ticket = create_ws_ticket(&pool, user_id).await.unwrap();
    let token = create_session(&pool, user_id).await.unwrap();

    assert_eq!(count(&pool, "SELECT count(*) FROM ws_tickets WHERE ticket = $1", &stale_ticket).await, 0);
    assert_eq!(count(&pool, "SELECT count(*) FROM sessions WHERE token = $1", &stale_token).await, 0);

    assert_eq!(consume_ws_ticket(&pool, &ticket).await.unwrap(), Some(user_id));
    assert!(validate_session(&pool, &token).await.unwrap().is_some());
    delete_session(&pool, &token).await.unwrap();
}
