//! Extract market listings and outcome prices from Kalshi, either through the
//! public REST API or by rendering kalshi.com in a headless browser.

pub mod config;
pub mod extract;
pub mod fetch;
pub mod market;
pub mod monitoring;
pub mod pipeline;
