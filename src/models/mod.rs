pub mod config;
pub mod market;
pub mod order;
pub mod result;
pub mod trade;
