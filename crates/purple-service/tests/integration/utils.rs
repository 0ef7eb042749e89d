use purple_service::config::Config;
use purple_service::services::SharedServices;
use purple_test as test;

pub use test::{MockBackend, SLOW_RESPONSE};

/// Setup tests and create the services against a fresh [`MockBackend`].
///
/// The backend stops serving when dropped, so keep it around until the test has finished.
///
/// The `update_config` closure can modify any default configuration if needed before the
/// services are created.
pub fn setup_services(update_config: impl FnOnce(&mut Config)) -> (SharedServices, MockBackend) {
    test::setup();

    let backend = MockBackend::new();

    let mut config = Config {
        backend_url: backend.base_url(),
        ..Default::default()
    };
    update_config(&mut config);

    let services = SharedServices::new(config).unwrap();
    (services, backend)
}
