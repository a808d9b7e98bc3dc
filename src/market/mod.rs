pub mod envelope;
pub mod kalshi;
pub mod models;
pub mod price;
pub mod target;
