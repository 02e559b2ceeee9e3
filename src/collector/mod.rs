//! Collection of risk stats from the configured trading servers

mod fetcher;

pub use fetcher::*;
