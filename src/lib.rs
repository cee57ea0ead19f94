pub mod engine;
pub mod errors;
pub mod models;
pub mod utils;

use tracing_subscriber::EnvFilter;

pub use engine::executor::{AccountSource, EventReport, ExecutionGateway, GridEngine};
pub use engine::risk::{BasketRiskController, Decision};
pub use errors::EngineError;
pub use models::config::{EngineConfig, InstrumentSpec};

/// Install the fmt subscriber, filtered by `RUST_LOG` or `info`.
///
/// Returns `false` when the host already installed a global subscriber.
pub fn init_tracing() -> bool {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .try_init()
        .is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_tracing_twice() {
        init_tracing();
        assert!(!init_tracing());
    }
}
