/// Default per-person-per-day rate for domestic trips, in cents
pub const DEFAULT_DOMESTIC_RATE_CENTS: i64 = 125;

/// Default per-person-per-day rate for international trips, in cents
pub const DEFAULT_INTERNATIONAL_RATE_CENTS: i64 = 300;

/// Prefix of every generated claim number
pub const CLAIM_NUMBER_PREFIX: &str = "CLM";

/// Number of trip-id hex characters embedded in a claim number
pub const CLAIM_TRIP_SHORT_LEN: usize = 6;

/// Zero-padded width of the per-trip claim sequence
pub const CLAIM_SEQ_WIDTH: usize = 5;

/// Default HTTP API port (server)
pub const DEFAULT_HTTP_PORT: u16 = 8080;
