use std::time::Duration;

use purple_service::coordination::FetchError;
use purple_service::types::{PlaylistId, UserId, ViewOutcome};
use serde_json::json;

use crate::setup_services;

#[tokio::test]
async fn test_records_view_once() {
    let (services, backend) = setup_services(|_| ());

    let user = UserId::from("u1");
    let playlist = PlaylistId::from("p1");

    let outcome = services.views.track_view(&user, &playlist).await;
    assert_eq!(outcome, Ok(ViewOutcome::Recorded));

    let outcome = services.views.track_view(&user, &playlist).await;
    assert_eq!(outcome, Ok(ViewOutcome::Skipped));

    assert_eq!(
        backend.recorded_views(),
        [json!({"user_id": "u1", "playlist_id": "p1"})]
    );
}

#[tokio::test]
async fn test_concurrent_views_send_one_request() {
    let (services, backend) = setup_services(|_| ());

    let user = UserId::from("u1");
    let playlist = PlaylistId::from("slow-playlist");

    let (first, second, third) = futures::join!(
        services.views.track_view(&user, &playlist),
        services.views.track_view(&user, &playlist),
        services.views.track_view(&user, &playlist),
    );

    // all three callers observe the same request
    assert_eq!(first, Ok(ViewOutcome::Recorded));
    assert_eq!(second, Ok(ViewOutcome::Recorded));
    assert_eq!(third, Ok(ViewOutcome::Recorded));
    assert_eq!(backend.hits("/api/playlist-views/track"), 1);
}

#[tokio::test]
async fn test_views_are_keyed_by_user_and_playlist() {
    let (services, backend) = setup_services(|_| ());

    let views = [("u1", "p1"), ("u2", "p1"), ("u1", "p2"), ("u1", "p1")];
    for (user, playlist) in views {
        services
            .views
            .track_view(&UserId::from(user), &PlaylistId::from(playlist))
            .await
            .unwrap();
    }

    assert_eq!(backend.recorded_views().len(), 3);
}

#[tokio::test]
async fn test_failed_view_consumes_window() {
    let (services, backend) = setup_services(|_| ());

    let user = UserId::from("u1");
    let playlist = PlaylistId::from("broken");

    let outcome = services.views.track_view(&user, &playlist).await;
    assert!(matches!(outcome, Err(FetchError::Status(_))));

    let outcome = services.views.track_view(&user, &playlist).await;
    assert_eq!(outcome, Ok(ViewOutcome::Skipped));
    assert_eq!(backend.accesses(), 1);
}

#[tokio::test]
async fn test_window_expires() {
    let (services, backend) = setup_services(|config| {
        config.coordination.view_window = Duration::from_millis(50);
    });

    let user = UserId::from("u1");
    let playlist = PlaylistId::from("p1");

    services.views.track_view(&user, &playlist).await.unwrap();
    tokio::time::sleep(Duration::from_millis(150)).await;
    let outcome = services.views.track_view(&user, &playlist).await;

    assert_eq!(outcome, Ok(ViewOutcome::Recorded));
    assert_eq!(backend.recorded_views().len(), 2);
}

#[tokio::test]
async fn test_ids_containing_separators_are_distinct_views() {
    let (services, backend) = setup_services(|_| ());

    let first = services
        .views
        .track_view(&UserId::from("u:1"), &PlaylistId::from("p2"))
        .await;
    let second = services
        .views
        .track_view(&UserId::from("u"), &PlaylistId::from("1:p2"))
        .await;

    assert_eq!(first, Ok(ViewOutcome::Recorded));
    assert_eq!(second, Ok(ViewOutcome::Recorded));
    assert_eq!(
        backend.recorded_views(),
        [
            json!({"user_id": "u:1", "playlist_id": "p2"}),
            json!({"user_id": "u", "playlist_id": "1:p2"}),
        ]
    );
}
