pub mod executor;
pub mod ladder;
pub mod ledger;
pub mod pips;
pub mod risk;
pub mod state;
pub mod streak;
pub mod volume;
