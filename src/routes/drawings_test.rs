use super::*;
use crate::services::session::SessionUser;
use crate::state::test_helpers::{self, FailingDrawingStore};
use std::sync::Arc;

fn auth_for(id: Uuid) -> AuthUser {
    AuthUser { user: SessionUser { id, name: "tester".into(), avatar_url: None }, token: String::new() }
}

#[test]
fn drawing_error_to_status_maps_variants() {
    assert_eq!(drawing_error_to_status(DrawingError::NotFound(Uuid::nil())), StatusCode::NOT_FOUND);
    assert_eq!(
        drawing_error_to_status(DrawingError::Database(sqlx::Error::PoolTimedOut)),
        StatusCode::INTERNAL_SERVER_ERROR
    );
}

#[test]
fn parse_saved_id_rejects_new_and_garbage() {
    assert_eq!(parse_saved_id("new"), Err(StatusCode::BAD_REQUEST));
    assert_eq!(parse_saved_id("nope"), Err(StatusCode::BAD_REQUEST));
    let id = Uuid::new_v4();
    assert_eq!(parse_saved_id(&id.to_string()), Ok(id));
}

#[test]
fn opened_drawing_serializes_with_state_tag() {
    let json = serde_json::to_value(OpenedDrawing::Unsaved { title: "Untitled Drawing".into() }).unwrap();
    assert_eq!(json["state"], "unsaved");
    assert_eq!(json["title"], "Untitled Drawing");
}

#[tokio::test]
async fn create_then_get_round_trips_fields() {
    let (state, _store) = test_helpers::test_app_state();
    let owner = Uuid::new_v4();

    let (status, Json(created)) = create_drawing(
        State(state.clone()),
        auth_for(owner),
        Json(CreateDrawingBody { title: Some("Garden".into()), content: "snapshot-bytes".into() }),
    )
    .await
    .unwrap();
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(created.owner_id, owner);

    let Json(opened) = get_drawing(State(state), auth_for(owner), Path(created.id.to_string()))
        .await
        .unwrap();
    match opened {
        OpenedDrawing::Saved { drawing } => {
            assert_eq!(drawing.title, "Garden");
            assert_eq!(drawing.content, "snapshot-bytes");
            assert_eq!(drawing.owner_id, owner);
        }
        OpenedDrawing::Unsaved { .. } => panic!("expected saved drawing"),
    }
}

#[tokio::test]
async fn create_defaults_blank_title() {
    let (state, _store) = test_helpers::test_app_state();
    let (_, Json(created)) = create_drawing(
        State(state),
        auth_for(Uuid::new_v4()),
        Json(CreateDrawingBody { title: Some("  ".into()), content: String::new() }),
    )
    .await
    .unwrap();
    assert_eq!(created.title, drawing::DEFAULT_TITLE);
}

#[tokio::test]
async fn get_new_returns_unsaved_template_without_touching_store() {
    let (state, store) = test_helpers::test_app_state();
    let Json(opened) = get_drawing(State(state), auth_for(Uuid::new_v4()), Path("new".into()))
        .await
        .unwrap();
    assert!(matches!(opened, OpenedDrawing::Unsaved { ref title } if title == drawing::DEFAULT_TITLE));
    assert_eq!(store.create_count(), 0);
}

#[tokio::test]
async fn get_invalid_segment_is_bad_request() {
    let (state, _store) = test_helpers::test_app_state();
    let err = get_drawing(State(state), auth_for(Uuid::new_v4()), Path("latest".into()))
        .await
        .unwrap_err();
    assert_eq!(err, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn other_users_drawing_is_not_found() {
    let (state, store) = test_helpers::test_app_state();
    let owner = Uuid::new_v4();
    let d = test_helpers::seed_drawing(&store, owner, "mine", "x").await;
    let stranger = auth_for(Uuid::new_v4());

    let err = get_drawing(State(state.clone()), stranger, Path(d.id.to_string()))
        .await
        .unwrap_err();
    assert_eq!(err, StatusCode::NOT_FOUND);

    let err = delete_drawing(State(state), auth_for(Uuid::new_v4()), Path(d.id.to_string()))
        .await
        .unwrap_err();
    assert_eq!(err, StatusCode::NOT_FOUND);
    assert!(store.get(d.id).is_some());
}

#[tokio::test]
async fn list_returns_summaries_most_recent_first() {
    let (state, store) = test_helpers::test_app_state();
    let owner = Uuid::new_v4();
    let a = test_helpers::seed_drawing(&store, owner, "a", "").await;
    let b = test_helpers::seed_drawing(&store, owner, "b", "").await;
    test_helpers::seed_drawing(&store, Uuid::new_v4(), "not mine", "").await;

    let Json(list) = list_drawings(State(state), auth_for(owner)).await.unwrap();
    let ids: Vec<Uuid> = list.iter().map(|s| s.id).collect();
    assert_eq!(ids, vec![b.id, a.id]);

    let json = serde_json::to_value(&list[0]).unwrap();
    assert!(json.get("content").is_none(), "list view carries no snapshot");
}

#[tokio::test]
async fn update_overwrites_and_rejects_empty_patch() {
    let (state, store) = test_helpers::test_app_state();
    let owner = Uuid::new_v4();
    let d = test_helpers::seed_drawing(&store, owner, "t", "old").await;

    let Json(updated) = update_drawing(
        State(state.clone()),
        auth_for(owner),
        Path(d.id.to_string()),
        Json(UpdateDrawingBody { title: None, content: Some("new".into()) }),
    )
    .await
    .unwrap();
    assert_eq!(updated.content, "new");
    assert_eq!(updated.title, "t");

    let err = update_drawing(
        State(state),
        auth_for(owner),
        Path(d.id.to_string()),
        Json(UpdateDrawingBody { title: None, content: None }),
    )
    .await
    .unwrap_err();
    assert_eq!(err, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn update_with_blank_title_resets_to_default() {
    let (state, store) = test_helpers::test_app_state();
    let owner = Uuid::new_v4();
    let d = test_helpers::seed_drawing(&store, owner, "Named", "c").await;

    let Json(updated) = update_drawing(
        State(state),
        auth_for(owner),
        Path(d.id.to_string()),
        Json(UpdateDrawingBody { title: Some("  ".into()), content: None }),
    )
    .await
    .unwrap();
    assert_eq!(updated.title, drawing::DEFAULT_TITLE);
    assert_eq!(updated.content, "c");
}

#[tokio::test]
async fn delete_removes_from_listing() {
    let (state, store) = test_helpers::test_app_state();
    let owner = Uuid::new_v4();
    let d = test_helpers::seed_drawing(&store, owner, "bye", "").await;

    let status = delete_drawing(State(state.clone()), auth_for(owner), Path(d.id.to_string()))
        .await
        .unwrap();
    assert_eq!(status, StatusCode::NO_CONTENT);

    let Json(list) = list_drawings(State(state), auth_for(owner)).await.unwrap();
    assert!(list.is_empty());
}

#[tokio::test]
async fn delete_new_is_bad_request() {
    let (state, _store) = test_helpers::test_app_state();
    let err = delete_drawing(State(state), auth_for(Uuid::new_v4()), Path("new".into()))
        .await
        .unwrap_err();
    assert_eq!(err, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn store_failure_maps_to_internal_error() {
    let state = test_helpers::test_app_state_with_store(Arc::new(FailingDrawingStore));
    let err = list_drawings(State(state), auth_for(Uuid::new_v4()))
        .await
        .unwrap_err();
    assert_eq!(err, StatusCode::INTERNAL_SERVER_ERROR);
}
