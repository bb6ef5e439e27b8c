mod bank;
mod market;
mod risk;

pub mod prelude {
    pub use crate::bank::{InMemoryBank, TransactionRecord};
    pub use crate::market::StaticMarketData;
    pub use crate::risk::HeuristicRiskService;

    /// Re-export of the `sandbank_runner` prelude.
    ///
    /// This is for convenience so that scenario binaries can depend on a single crate for both
    /// the orchestrator and the ledger bindings.
    pub use sandbank_runner::prelude::*;
}
