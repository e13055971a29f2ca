use chrono::{DateTime, Duration, Utc};
use std::sync::Arc;
use tracing::{debug, warn};

use crate::error::Result;
use crate::models::ApiUsageRecord;
use crate::settings::{SettingsService, RATE_LIMIT_PER_DAY, RATE_LIMIT_PER_MINUTE};
use crate::store::UsageRepository;

/// Request counts for one model against the configured ceilings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UsageSummary {
    pub model: String,
    pub today: usize,
    pub per_day_limit: usize,
    pub last_minute: usize,
    pub per_minute_limit: usize,
}

impl UsageSummary {
    pub fn allows_request(&self) -> bool {
        self.today < self.per_day_limit && self.last_minute < self.per_minute_limit
    }
}

/// Start of the UTC calendar day containing `now`
fn start_of_day(now: DateTime<Utc>) -> DateTime<Utc> {
    now.date_naive()
        .and_hms_opt(0, 0, 0)
        .map(|midnight| midnight.and_utc())
        .unwrap_or(now)
}

/// Gates outbound translation calls on per-minute and per-day quotas.
///
/// Ceilings come from the settings store on every check.
#[derive(Clone)]
pub struct UsageTracker {
    usage: Arc<dyn UsageRepository>,
    settings: SettingsService,
}

impl UsageTracker {
    pub fn new(usage: Arc<dyn UsageRepository>, settings: SettingsService) -> Self {
        Self { usage, settings }
    }

    pub async fn can_make_request(&self, model: &str) -> Result<bool> {
        self.can_make_request_at(model, Utc::now()).await
    }

    pub async fn can_make_request_at(&self, model: &str, now: DateTime<Utc>) -> Result<bool> {
        let summary = self.summary_at(model, now).await?;
        let allowed = summary.allows_request();

        if !allowed {
            warn!(
                "Rate limit reached for {}: {}/{} today, {}/{} in the last minute",
                model, summary.today, summary.per_day_limit, summary.last_minute, summary.per_minute_limit
            );
        }
        Ok(allowed)
    }

    pub async fn summary(&self, model: &str) -> Result<UsageSummary> {
        self.summary_at(model, Utc::now()).await
    }

    pub async fn summary_at(&self, model: &str, now: DateTime<Utc>) -> Result<UsageSummary> {
        let per_minute_limit: usize = self.settings.get_parsed(RATE_LIMIT_PER_MINUTE).await?;
        let per_day_limit: usize = self.settings.get_parsed(RATE_LIMIT_PER_DAY).await?;

        // Upper bound is exclusive, so include a record stamped exactly `now`
        let until = now + Duration::milliseconds(1);
        let today = self.usage.count_usage(model, start_of_day(now), until).await?;
        let last_minute = self.usage.count_usage(model, now - Duration::seconds(60), until).await?;

        Ok(UsageSummary {
            model: model.to_string(),
            today,
            per_day_limit,
            last_minute,
            per_minute_limit,
        })
    }

    pub async fn record_usage(&self, model: &str) -> Result<()> {
        self.record_usage_at(model, Utc::now()).await
    }

    pub async fn record_usage_at(&self, model: &str, at: DateTime<Utc>) -> Result<()> {
        debug!("Recording API usage for {}", model);
        self.usage.record_usage(model, at).await
    }

    /// Usage records with `from <= at <= to`, optionally for one model
    pub async fn usage_stats(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
        model: Option<&str>,
    ) -> Result<Vec<ApiUsageRecord>> {
        self.usage.usage_between(from, to, model).await
    }
}
