use std::collections::HashMap;

/// Process-wide market data configuration, read once at service
/// construction.
///
/// `SYMBOL_ALIASES` is a comma-separated list of `alias=symbol` pairs
/// (e.g. `DOW=DJI,ES=SPX`); provider API keys are looked up as
/// `<PROVIDER>_API_KEY`.
#[derive(Debug, Clone, Default)]
pub struct MarketDataConfig {
    pub symbol_aliases: HashMap<String, String>,
    pub api_keys: HashMap<String, String>,
}

impl MarketDataConfig {
    /// Load from the environment (and `.env` if present).
    pub fn from_env() -> Self {
        let _ = dotenvy::dotenv();

        let symbol_aliases = std::env::var("SYMBOL_ALIASES")
            .map(|raw| parse_aliases(&raw))
            .unwrap_or_default();

        let mut api_keys = HashMap::new();
        for provider in ["YAHOO", "FINNHUB", "POLYGON"] {
            if let Ok(key) = std::env::var(format!("{provider}_API_KEY")) {
                if !key.is_empty() {
                    api_keys.insert(provider.to_lowercase(), key);
                }
            }
        }

        Self {
            symbol_aliases,
            api_keys,
        }
    }

    /// Canonical symbol for an incoming request symbol.
    pub fn resolve_symbol<'a>(&'a self, symbol: &'a str) -> &'a str {
        self.symbol_aliases
            .get(symbol)
            .map(String::as_str)
            .unwrap_or(symbol)
    }

    pub fn api_key(&self, provider: &str) -> Option<&str> {
        self.api_keys.get(provider).map(String::as_str)
    }
}

fn parse_aliases(raw: &str) -> HashMap<String, String> {
    raw.split(',')
        .filter_map(|pair| {
            let (alias, symbol) = pair.split_once('=')?;
            let alias = alias.trim();
            let symbol = symbol.trim();
            if alias.is_empty() || symbol.is_empty() {
                return None;
            }
            Some((alias.to_string(), symbol.to_string()))
        })
        .collect()
}
