//! Domain constants shared by the parsers and the records
//!
//! Sentinels mark a value the page did not provide in a readable form.
//! Consumers must treat them as "unavailable", never as a real reading.

/// Placeholder for unreadable change / change-percent cells
pub const CHANGE_UNAVAILABLE: f64 = f64::MIN;

/// Placeholder for unreadable price and amount cells
pub const AMOUNT_UNAVAILABLE: f64 = 0.0;

/// Upstream site locations used by the default configuration
pub mod sites {
    /// World-index digest, one page per region (`{}` = region slug)
    pub const WORLD_INDEX_PAGE_PATTERN: &str = "https://markets.example-digest.com/world-indices/{}";

    /// Regions published by the digest
    pub const WORLD_INDEX_REGIONS: &[&str] = &["americas", "europe", "asia-pacific"];

    /// Exchange live index board
    pub const INDEX_BOARD_URL: &str = "https://www.example-exchange.eu/market-data/indices/live";

    /// Brokerage snapshot page (`{}` = ticker symbol)
    pub const SNAPSHOT_PAGE_PATTERN: &str = "https://research.example-broker.com/quote/{}/snapshot";
}

/// Time zones the sources publish in
pub mod zones {
    pub const WORLD_INDEX: &str = "America/New_York";
    pub const INDEX_BOARD: &str = "Europe/Berlin";
    pub const SECURITY_SNAPSHOT: &str = "America/New_York";
}
