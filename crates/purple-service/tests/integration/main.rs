// See <https://matklad.github.io/2021/02/27/delete-cargo-integration-tests.html>

pub mod artist;
pub mod playlist_stats;
pub mod utils;
pub mod view_tracking;

pub use utils::*;
