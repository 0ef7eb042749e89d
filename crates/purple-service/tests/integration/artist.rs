use std::time::Duration;

use purple_service::coordination::FetchError;

use crate::{SLOW_RESPONSE, setup_services};

#[tokio::test]
async fn test_lookup() {
    let (services, _backend) = setup_services(|_| ());

    let artist = services.artists.lookup("Bajaga").await.unwrap();
    assert_eq!(artist.id, "artist-bajaga");
    assert_eq!(artist.name, "Bajaga");
    assert_eq!(artist.channel_id.as_deref(), Some("UC-bajaga"));
}

#[tokio::test]
async fn test_prefetch_then_lookup() {
    let (services, backend) = setup_services(|_| ());

    services.artists.prefetch("slow-artist");
    let artist = services.artists.lookup("slow-artist").await.unwrap();
    assert_eq!(artist.name, "slow-artist");

    assert_eq!(backend.all_hits(), [("/api/artist?name=slow-artist".to_owned(), 1)]);
}

#[tokio::test]
async fn test_prefetch_completes_in_background() {
    let (services, backend) = setup_services(|_| ());

    services.artists.prefetch("slow-artist");
    tokio::time::sleep(SLOW_RESPONSE * 3).await;
    assert_eq!(backend.hits("/api/artist?name=slow-artist"), 1);

    // served from the cache
    services.artists.lookup("slow-artist").await.unwrap();
    assert_eq!(backend.accesses(), 1);
}

#[tokio::test]
async fn test_missing_artist() {
    let (services, backend) = setup_services(|_| ());

    let result = services.artists.lookup("missing").await;
    assert_eq!(result, Err(FetchError::NotFound));

    let result = services.artists.lookup("   ").await;
    assert_eq!(result, Err(FetchError::NotFound));

    assert_eq!(backend.accesses(), 1);
}

#[tokio::test]
async fn test_lookup_after_ttl() {
    let (services, backend) = setup_services(|config| {
        config.coordination.artist_ttl = Duration::from_millis(50);
    });

    services.artists.lookup("Bajaga").await.unwrap();
    tokio::time::sleep(Duration::from_millis(150)).await;
    services.artists.lookup("Bajaga").await.unwrap();

    assert_eq!(backend.hits("/api/artist?name=Bajaga"), 2);
}
