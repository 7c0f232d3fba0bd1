pub mod network {
    pub const TIMEOUT_API_REQUEST_MS: u64 = 30_000;
    pub const TIMEOUT_CONNECTION_MS: u64 = 5_000;
    pub const API_PREFIX: &str = "/api/v4";
    pub const KOMMO_DOMAIN: &str = "kommo.com";
    pub const USER_AGENT: &str = concat!("kommo-mcp/", env!("CARGO_PKG_VERSION"));
}

pub mod retry {
    pub const MAX_ATTEMPTS: usize = 3;
    pub const BASE_DELAY_MS: u64 = 250;
    pub const MAX_DELAY_MS: u64 = 5_000;
    pub const JITTER: f64 = 0.2;
    pub const STATUS_CODES: &[u16] = &[408, 429, 500, 502, 503, 504];
}

pub mod pagination {
    pub const CATALOG_PAGE_SIZE: usize = 250;
    pub const CATALOG_MAX_PAGES: usize = 20;
}

pub mod matching {
    pub const MAX_SUGGESTIONS: usize = 5;
    /// Input tokens at or below this length are ignored by the word-subset rule.
    pub const NOISE_TOKEN_MAX_LEN: usize = 2;
}

pub mod limits {
    pub const ERROR_BODY_PREVIEW_BYTES: usize = 512;
    pub const MAX_FIELDS_PER_BATCH: usize = 100;
}

pub mod protocols {
    pub const ALLOWED_HTTP: &[&str] = &["http", "https"];
}
