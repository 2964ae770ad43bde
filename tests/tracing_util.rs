use tracing_subscriber::EnvFilter;

/// Scoped tracing subscriber for tests.
///
/// Captures log output through the test writer so `--nocapture` shows the
/// engine's structured events; the guard unsubscribes on drop.
pub struct TestTracing {
    _guard: tracing::subscriber::DefaultGuard,
}

impl TestTracing {
    pub fn init() -> Self {
        let subscriber = tracing_subscriber::fmt()
            .with_env_filter(
                EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug")),
            )
            .with_test_writer()
            .finish();
        let guard = tracing::subscriber::set_default(subscriber);
        Self { _guard: guard }
    }
}
