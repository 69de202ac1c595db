//! Environment-driven configuration.
//!
//! Values come from the process environment, with a `.env` file in the
//! working directory loaded first when present.

use std::collections::BTreeMap;
use std::env;
use std::path::PathBuf;
use std::time::Duration;

use ratefeed_warehouse::WarehouseConfig;

use crate::domain::{FeedId, RateLabel, TargetNotional};
use crate::extract::PlausibilityBounds;
use crate::http_client::HttpAuth;
use crate::polling::{Cadence, PollerSettings};
use crate::retry::{Backoff, RetryPolicy};
use crate::sources::{ConverterSettings, OrderBookSettings, PortalPair};
use crate::ValidationError;

pub const DEFAULT_ORDER_BOOK_URL: &str = "https://grinex.io/trading/usdtrub";
pub const DEFAULT_ORDER_BOOK_MARKET: &str = "usdtrub";
pub const DEFAULT_CONVERTER_URL: &str = "https://www.xe.com/api/protected/midmarket-converter/";
pub const DEFAULT_PORTAL_REFERER: &str = "https://www.investing.com/";

/// Fully validated runtime configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct RatefeedConfig {
    pub home: PathBuf,
    pub db_path: PathBuf,
    pub backup_dir: PathBuf,
    pub cadence: Cadence,
    pub error_cooldown: Duration,
    pub backup_period: Duration,
    pub retry: RetryPolicy,
    pub http_timeout_ms: u64,
    pub converter: ConverterSettings,
    pub order_book: OrderBookSettings,
    pub order_book_persist_partial: bool,
    pub portal_pairs: Vec<PortalPair>,
    pub portal_referer: String,
}

impl RatefeedConfig {
    /// Load `.env` (if any) and read the process environment.
    ///
    /// A missing `.env` is fine; one that exists but does not parse is an error.
    pub fn from_env() -> Result<Self, ValidationError> {
        Self::from_env_with(&BTreeMap::new())
    }

    /// Like [`RatefeedConfig::from_env`], with `overrides` taking precedence.
    pub fn from_env_with(overrides: &BTreeMap<&'static str, String>) -> Result<Self, ValidationError> {
        load_env_file(dotenvy::dotenv())?;
        Self::from_lookup(|key| {
            overrides
                .get(key)
                .cloned()
                .or_else(|| env::var(key).ok())
        })
    }

    /// Build the configuration from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ValidationError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| {
            lookup(key)
                .map(|value| value.trim().to_owned())
                .filter(|value| !value.is_empty())
        };

        let home = get("RATEFEED_HOME")
            .map(PathBuf::from)
            .or_else(|| get("HOME").map(|home| PathBuf::from(home).join(".ratefeed")))
            .unwrap_or_else(|| PathBuf::from(".ratefeed"));
        let db_path = get("RATEFEED_DB_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|| home.join("rates.duckdb"));
        let backup_dir = get("DB_BACKUP_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|| home.join("backups"));

        let min_delay = seconds(&get, "MIN_DELAY", 45.0)?;
        let max_delay = seconds(&get, "MAX_DELAY", 60.0)?;
        let cadence = Cadence::new(min_delay, max_delay)?;
        let error_cooldown = seconds(&get, "ERROR_COOLDOWN", 60.0)?;
        let backup_period = seconds(&get, "BACKUP_PERIOD", 86_400.0)?;
        if backup_period.is_zero() {
            return Err(ValidationError::InvalidSetting {
                key: "BACKUP_PERIOD",
                value: String::from("0"),
            });
        }

        let attempts = parse::<u32>(&get, "RETRY_ATTEMPTS", 3)?;
        if attempts == 0 {
            return Err(ValidationError::InvalidSetting {
                key: "RETRY_ATTEMPTS",
                value: String::from("0"),
            });
        }
        let retry = RetryPolicy::new(
            attempts,
            Backoff::Uniform {
                min: Duration::from_millis(parse(&get, "RETRY_MIN_MS", 3_000)?),
                max: Duration::from_millis(parse(&get, "RETRY_MAX_MS", 5_000)?),
            },
        );
        let http_timeout_ms = parse(&get, "HTTP_TIMEOUT_MS", 15_000)?;

        let target = TargetNotional::new(parse(&get, "TARGET_AMOUNT", 30_000.0)?)?;
        let order_book = OrderBookSettings {
            url: get("GRINEX_URL").unwrap_or_else(|| DEFAULT_ORDER_BOOK_URL.to_owned()),
            market: get("GRINEX_MARKET").unwrap_or_else(|| DEFAULT_ORDER_BOOK_MARKET.to_owned()),
            target,
            timeout_ms: http_timeout_ms,
        };
        let order_book_persist_partial = flag(&get, "ORDER_BOOK_PERSIST_PARTIAL", false)?;

        let converter = ConverterSettings {
            url: get("XE_URL").unwrap_or_else(|| DEFAULT_CONVERTER_URL.to_owned()),
            auth: get("XE_AUTH").map_or(HttpAuth::None, HttpAuth::Authorization),
            timeout_ms: http_timeout_ms,
        };

        let portal_referer =
            get("PORTAL_REFERER").unwrap_or_else(|| DEFAULT_PORTAL_REFERER.to_owned());

        Ok(Self {
            home,
            db_path,
            backup_dir,
            cadence,
            error_cooldown,
            backup_period,
            retry,
            http_timeout_ms,
            converter,
            order_book,
            order_book_persist_partial,
            portal_pairs: default_portal_pairs()?,
            portal_referer,
        })
    }

    pub fn warehouse_config(&self) -> WarehouseConfig {
        WarehouseConfig {
            home: self.home.clone(),
            db_path: self.db_path.clone(),
            max_pool_size: 4,
        }
    }

    /// Loop settings of `feed`. Only the order book withholds PARTIAL batches
    /// by default.
    pub fn poller_settings(&self, feed: FeedId) -> PollerSettings {
        PollerSettings {
            cadence: self.cadence,
            cooldown: self.error_cooldown,
            persist_partial: match feed {
                FeedId::OrderBook => self.order_book_persist_partial,
                FeedId::Converter | FeedId::Portal => true,
            },
        }
    }
}

/// USD/RUB and EUR/RUB pages with their plausibility windows.
pub fn default_portal_pairs() -> Result<Vec<PortalPair>, ValidationError> {
    Ok(vec![
        PortalPair {
            label: RateLabel::UsdRub,
            url: String::from("https://www.investing.com/currencies/usd-rub"),
            bounds: PlausibilityBounds::new(50.0, 200.0)?,
            invert: false,
        },
        PortalPair {
            label: RateLabel::EurRub,
            url: String::from("https://www.investing.com/currencies/eur-rub"),
            bounds: PlausibilityBounds::new(50.0, 220.0)?,
            invert: false,
        },
    ])
}

fn parse<T>(
    get: &impl Fn(&str) -> Option<String>,
    key: &'static str,
    default: T,
) -> Result<T, ValidationError>
where
    T: std::str::FromStr,
{
    match get(key) {
        None => Ok(default),
        Some(value) => value
            .parse()
            .map_err(|_| ValidationError::InvalidSetting { key, value }),
    }
}

fn seconds(
    get: &impl Fn(&str) -> Option<String>,
    key: &'static str,
    default: f64,
) -> Result<Duration, ValidationError> {
    let value: f64 = parse(get, key, default)?;
    Duration::try_from_secs_f64(value).map_err(|_| ValidationError::InvalidSetting {
        key,
        value: value.to_string(),
    })
}

fn flag(
    get: &impl Fn(&str) -> Option<String>,
    key: &'static str,
    default: bool,
) -> Result<bool, ValidationError> {
    match get(key) {
        None => Ok(default),
        Some(value) => match value.to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => Ok(true),
            "0" | "false" | "no" | "off" => Ok(false),
            _ => Err(ValidationError::InvalidSetting { key, value }),
        },
    }
}

fn load_env_file<T>(loaded: Result<T, dotenvy::Error>) -> Result<(), ValidationError> {
    match loaded {
        Ok(_) => Ok(()),
        Err(err) if err.not_found() => Ok(()),
        Err(err) => Err(ValidationError::InvalidEnvFile {
            reason: err.to_string(),
        }),
    }
}
