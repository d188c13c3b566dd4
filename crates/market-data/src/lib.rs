pub mod cache;
pub mod config;
pub mod providers;
pub mod rate_limiter;
pub mod service;

pub use cache::MarketDataCache;
pub use config::MarketDataConfig;
pub use providers::{SimulatedProvider, YahooProvider};
pub use rate_limiter::RateLimiter;
pub use service::MarketDataService;
