use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use rust_decimal::Decimal;
use sandbank_runner::prelude::{EconomicIndicator, MarketDataCache, NewsItem, RateSnapshot};

/// In-memory stand-in for the external market-data caches.
///
/// Readers always get the latest stored value or nothing; whoever owns the cache decides when
/// to refresh it. There is no network fetch behind these accessors.
#[derive(Default)]
pub struct StaticMarketData {
    rate: Mutex<Option<RateSnapshot>>,
    news: Mutex<Option<NewsItem>>,
    indicator: Mutex<Option<EconomicIndicator>>,
}

impl StaticMarketData {
    pub fn empty() -> Self {
        Self::default()
    }

    /// A cache pre-filled with plausible values, for scenario binaries and tests.
    pub fn seeded(as_of: DateTime<Utc>) -> Self {
        let cache = Self::default();
        cache.set_rate(RateSnapshot {
            pair: "EUR/USD".to_string(),
            rate: Decimal::new(1_0842, 4),
            as_of,
        });
        cache.set_news(NewsItem {
            headline: "Markets steady as central bank signals patience".to_string(),
            sentiment: 0.2,
            as_of,
        });
        cache.set_indicator(EconomicIndicator {
            name: "CPI YoY %".to_string(),
            value: Decimal::new(28, 1),
            as_of,
        });
        cache
    }

    pub fn set_rate(&self, rate: RateSnapshot) {
        *self.rate.lock() = Some(rate);
    }

    pub fn set_news(&self, news: NewsItem) {
        *self.news.lock() = Some(news);
    }

    pub fn set_indicator(&self, indicator: EconomicIndicator) {
        *self.indicator.lock() = Some(indicator);
    }
}

impl MarketDataCache for StaticMarketData {
    fn latest_rate(&self) -> Option<RateSnapshot> {
        self.rate.lock().clone()
    }

    fn latest_news(&self) -> Option<NewsItem> {
        self.news.lock().clone()
    }

    fn latest_indicator(&self) -> Option<EconomicIndicator> {
        self.indicator.lock().clone()
    }
}
