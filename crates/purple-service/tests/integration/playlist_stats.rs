use std::time::Duration;

use purple_service::coordination::FetchError;
use purple_service::types::{PlaylistId, PlaylistStats};

use crate::setup_services;

fn ids(ids: &[&str]) -> Vec<PlaylistId> {
    ids.iter().copied().map(PlaylistId::from).collect()
}

#[tokio::test]
async fn test_merges_stats_by_id() {
    let (services, _backend) = setup_services(|_| ());

    let playlists = ids(&["p1", "playlist-2", "missing", "broken"]);
    let stats = services.playlist_stats.fetch_stats(&playlists).await;

    assert_eq!(stats.len(), 2);
    assert_eq!(
        stats[&PlaylistId::from("p1")],
        PlaylistStats { likes: 2, views: 20 }
    );
    assert_eq!(
        stats[&PlaylistId::from("playlist-2")],
        PlaylistStats {
            likes: 10,
            views: 100
        }
    );
}

#[tokio::test]
async fn test_unauthorized_counts_as_zero() {
    let (services, backend) = setup_services(|_| ());

    let playlists = ids(&["unauthorized"]);
    let stats = services.playlist_stats.fetch_stats(&playlists).await;
    assert_eq!(
        stats[&PlaylistId::from("unauthorized")],
        PlaylistStats::default()
    );

    // the zero stats are cached like any other result
    services.playlist_stats.fetch_stats(&playlists).await;
    assert_eq!(backend.accesses(), 1);
}

#[tokio::test]
async fn test_forbidden_is_omitted() {
    let (services, _backend) = setup_services(|_| ());

    let id = PlaylistId::from("forbidden");
    let result = services.playlist_stats.fetch_one(&id).await;
    assert!(matches!(result, Err(FetchError::Forbidden(_))));

    let stats = services.playlist_stats.fetch_stats([&id]).await;
    assert!(stats.is_empty());
}

#[tokio::test]
async fn test_one_request_within_ttl() {
    let (services, backend) = setup_services(|_| ());

    let playlists = ids(&["p1", "p2", "p1"]);
    for _ in 0..3 {
        let stats = services.playlist_stats.fetch_stats(&playlists).await;
        assert_eq!(stats.len(), 2);
    }

    assert_eq!(
        backend.all_hits(),
        [
            ("/api/playlists/p1/public-stats".to_owned(), 1),
            ("/api/playlists/p2/public-stats".to_owned(), 1),
        ]
    );
}

#[tokio::test]
async fn test_concurrent_polls_share_requests() {
    let (services, backend) = setup_services(|_| ());

    let playlists = ids(&["slow-1", "slow-2"]);
    let (first, second) = futures::join!(
        services.playlist_stats.fetch_stats(&playlists),
        services.playlist_stats.fetch_stats(&playlists),
    );

    assert_eq!(first, second);
    assert_eq!(first.len(), 2);
    assert_eq!(backend.accesses(), 2);
}

#[tokio::test]
async fn test_refetch_after_ttl() {
    let (services, backend) = setup_services(|config| {
        config.coordination.stats_ttl = Duration::from_millis(50);
    });

    let playlists = ids(&["p1"]);
    services.playlist_stats.fetch_stats(&playlists).await;
    tokio::time::sleep(Duration::from_millis(150)).await;
    services.playlist_stats.fetch_stats(&playlists).await;

    assert_eq!(backend.hits("/api/playlists/p1/public-stats"), 2);
}

#[tokio::test]
async fn test_failures_are_not_cached() {
    let (services, backend) = setup_services(|_| ());

    let playlists = ids(&["broken"]);
    services.playlist_stats.fetch_stats(&playlists).await;
    services.playlist_stats.fetch_stats(&playlists).await;

    assert_eq!(backend.accesses(), 2);
}
