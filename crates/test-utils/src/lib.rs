//! Shared helpers for the stackbuild integration tests.

pub mod builders;
pub mod fake_executor;

use std::future::Future;
use std::sync::Once;
use std::time::Duration;

use tracing_subscriber::{fmt, EnvFilter};

/// Upper bound for a whole scheduled run inside a test.
pub const RUN_TIMEOUT: Duration = Duration::from_secs(10);

static TRACING: Once = Once::new();

/// Route `tracing` output through the test harness writer.
///
/// Output only shows for failing tests or with `--nocapture`. The filter
/// comes from `RUST_LOG` and defaults to `stackbuild=debug,info`.
pub fn init_tracing() {
    TRACING.call_once(|| {
        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new("stackbuild=debug,info"));

        fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .with_target(false)
            .init();
    });
}

/// Await `run`, panicking if it is still going after [`RUN_TIMEOUT`].
pub async fn with_timeout<F, T>(run: F) -> T
where
    F: Future<Output = T>,
{
    match tokio::time::timeout(RUN_TIMEOUT, run).await {
        Ok(out) => out,
        Err(_) => panic!("run did not finish within {RUN_TIMEOUT:?}; a build is likely stuck"),
    }
}
