//! Subscriber setup for binaries and tests embedding the crate.
//!
//! The library itself only emits `tracing` events; nothing is printed
//! until a subscriber is installed, either here or by the host application.

use std::sync::Once;

use tracing_subscriber::{util::SubscriberInitExt, EnvFilter};

/// Logging profile.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Profile {
    /// Human-readable output, `itemdrive=debug`.
    Development,
    /// JSON lines, `itemdrive=info`.
    Production,
    /// A bare registry; events are dropped unless a test installs its own
    /// layer.
    Test,
}

static INIT_ONCE: Once = Once::new();

fn filter(default: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default))
}

/// Installs the global subscriber for `profile`.
///
/// `RUST_LOG` overrides the profile's default filter. Only the first call
/// has any effect, and an already-installed global subscriber is left
/// alone.
///
/// # Example
///
/// ```
/// use itemdrive::logging::{init, Profile};
///
/// init(Profile::Development);
/// ```
pub fn init(profile: Profile) {
    INIT_ONCE.call_once(|| {
        let _ = match profile {
            Profile::Development => tracing_subscriber::fmt()
                .with_env_filter(filter("itemdrive=debug"))
                .finish()
                .try_init(),
            Profile::Production => tracing_subscriber::fmt()
                .json()
                .with_env_filter(filter("itemdrive=info"))
                .finish()
                .try_init(),
            Profile::Test => tracing_subscriber::registry().try_init(),
        };
    });
}
