//! Tracing subscriber and panic hook installation.
//!
//! The engine only emits `tracing` events; nothing is printed until an
//! application installs a subscriber. [`install`] sets up a `fmt` subscriber
//! filtered by `RUST_LOG` and routes panics through `tracing`.

use std::sync::Once;

use tracing_subscriber::{EnvFilter, fmt};

const DEFAULT_FILTER: &str = "info";

static TRACING_INSTALLED: Once = Once::new();
static PANIC_HOOK_INSTALLED: Once = Once::new();

/// Installs the tracing subscriber and the panic hook (idempotent).
pub fn install() {
    install_with_filter(DEFAULT_FILTER);
}

/// Like [`install`], with `fallback` used when `RUST_LOG` is unset or invalid.
///
/// Only the first call in a process has an effect.
pub fn install_with_filter(fallback: &str) {
    TRACING_INSTALLED.call_once(|| {
        let filter =
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback));
        let result = fmt::Subscriber::builder()
            .with_env_filter(filter)
            .without_time()
            .with_target(true)
            .try_init();
        if result.is_err() {
            eprintln!("waterdom: a global tracing subscriber is already installed");
        }
    });
    install_panic_hook();
}

/// Routes panics through `tracing` (idempotent).
pub fn install_panic_hook() {
    PANIC_HOOK_INSTALLED.call_once(|| {
        std::panic::set_hook(Box::new(tracing_panic::panic_hook));
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn installing_twice_is_harmless() {
        install_with_filter("waterdom=debug");
        install();
        tracing::debug!("logging installed");
    }
}
