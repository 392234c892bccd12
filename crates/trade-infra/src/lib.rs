/*!
# trade-infra

Ambient infrastructure shared by the trade-session binaries: structured
logging setup, a common error type with context, and the environment-backed
configuration loader: the environment variables and startup validation
rules for this service's external interfaces — `PORT`, `BACKEND_PUBLIC_KEY`, `PRIVATE_KEY`,
`PERFORM_TRADE_ENDPOINT`, `NODE_ENV`, and the settlement-without-auth
startup check.
*/

pub mod config;
pub mod errors;
pub mod logging;

pub use config::AppConfig;
pub use errors::{Error, ErrorContext, ErrorExt, Result};
pub use logging::setup::setup_logging;

/// Version information.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn version_is_set() {
        assert!(!VERSION.is_empty());
    }
}
