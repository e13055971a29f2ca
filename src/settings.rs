use std::str::FromStr;
use std::sync::Arc;
use tracing::{debug, info};

use crate::error::{Result, TranslarrError};
use crate::models::{SizeLimits, TranslationSettings};
use crate::store::SettingsStore;

pub const GEMINI_API_KEY: &str = "GeminiApiKey";
pub const GEMINI_MODEL: &str = "GeminiModel";
pub const TEMPERATURE: &str = "Temperature";
pub const SYSTEM_PROMPT: &str = "SystemPrompt";
pub const PREFERRED_SUBS_LANG: &str = "PreferredSubsLang";
pub const RATE_LIMIT_PER_MINUTE: &str = "RateLimitPerMinute";
pub const RATE_LIMIT_PER_DAY: &str = "RateLimitPerDay";
pub const AUTO_LIBRARY_SCAN: &str = "AutoLibraryScan";
pub const AUTO_TRANSLATE: &str = "AutoTranslate";
pub const MAX_SUBTITLE_BYTES: &str = "MaxSubtitleBytes";
pub const MAX_ADVANCED_SUBTITLE_BYTES: &str = "MaxAdvancedSubtitleBytes";

/// Key, default value and description of every seeded setting
pub const DEFAULT_SETTINGS: &[(&str, &str, &str)] = &[
    (GEMINI_API_KEY, "", "Google Gemini API key, required for subtitle translation"),
    (GEMINI_MODEL, "gemini-2.5-pro", "Name of the Google Gemini model to use"),
    (
        TEMPERATURE,
        "0.55",
        "AI model temperature (0.0 - 1.0). Lower value = more deterministic translation",
    ),
    (
        SYSTEM_PROMPT,
        "You are an advanced subtitle translator to polish. Translate the provided subtitles. \
         Preserve the original formatting, tags, and most importantly, do not change timestamps.",
        "System prompt for the AI specifying how it should translate subtitles",
    ),
    (PREFERRED_SUBS_LANG, "pl", "Target subtitle language code (e.g. 'pl', 'pt', 'uk')"),
    (RATE_LIMIT_PER_MINUTE, "5", "Maximum number of API requests per minute"),
    (RATE_LIMIT_PER_DAY, "100", "Maximum number of API requests per day"),
    (AUTO_LIBRARY_SCAN, "false", "Whether the daemon scans the library on its timer"),
    (AUTO_TRANSLATE, "false", "Whether the daemon translates wanted entries on its timer"),
    (
        MAX_SUBTITLE_BYTES,
        "204800",
        "Largest plain-text subtitle (bytes) sent for translation",
    ),
    (
        MAX_ADVANCED_SUBTITLE_BYTES,
        "409600",
        "Largest cleaned ASS/SSA subtitle (bytes) sent for translation",
    ),
];

/// Typed access to the key-value settings store.
///
/// Values are read on every call so edits apply without a restart.
#[derive(Clone)]
pub struct SettingsService {
    store: Arc<dyn SettingsStore>,
}

impl SettingsService {
    pub fn new(store: Arc<dyn SettingsStore>) -> Self {
        Self { store }
    }

    /// Insert every default setting that is not stored yet
    pub async fn seed_defaults(&self) -> Result<usize> {
        let mut added = 0;

        for (key, value, description) in DEFAULT_SETTINGS {
            if self.store.seed_setting(key, value, description).await? {
                info!("Added new setting: {}", key);
                added += 1;
            } else {
                debug!("Setting {} already exists, skipping", key);
            }
        }

        if added > 0 {
            info!("Seeded {} new default settings", added);
        }
        Ok(added)
    }

    pub async fn get(&self, key: &str) -> Result<Option<String>> {
        self.store.get_setting(key).await
    }

    pub async fn set(&self, key: &str, value: &str) -> Result<()> {
        self.store.set_setting(key, value).await
    }

    pub fn store(&self) -> &Arc<dyn SettingsStore> {
        &self.store
    }

    pub async fn get_required(&self, key: &str) -> Result<String> {
        self.store
            .get_setting(key)
            .await?
            .ok_or_else(|| TranslarrError::MissingSetting(key.to_string()))
    }

    /// Read and parse a setting, failing on absent or malformed values
    pub async fn get_parsed<T: FromStr>(&self, key: &str) -> Result<T> {
        let value = self.get_required(key).await?;
        value.trim().parse().map_err(|_| TranslarrError::InvalidSetting {
            key: key.to_string(),
            value,
        })
    }

    /// Boolean flag; absent or unparsable values count as off
    pub async fn get_flag(&self, key: &str) -> Result<bool> {
        Ok(self
            .store
            .get_setting(key)
            .await?
            .map(|v| v.trim().eq_ignore_ascii_case("true"))
            .unwrap_or(false))
    }

    pub async fn preferred_language(&self) -> Result<String> {
        self.get_required(PREFERRED_SUBS_LANG).await
    }

    pub async fn size_limits(&self) -> Result<SizeLimits> {
        Ok(SizeLimits {
            plain_bytes: self.get_parsed(MAX_SUBTITLE_BYTES).await?,
            advanced_bytes: self.get_parsed(MAX_ADVANCED_SUBTITLE_BYTES).await?,
        })
    }

    /// Snapshot of everything a translation batch needs
    pub async fn translation_settings(&self) -> Result<TranslationSettings> {
        Ok(TranslationSettings {
            api_key: self.get(GEMINI_API_KEY).await?.unwrap_or_default(),
            model: self.get_required(GEMINI_MODEL).await?,
            system_prompt: self.get_required(SYSTEM_PROMPT).await?,
            temperature: self.get_parsed(TEMPERATURE).await?,
            preferred_lang: self.preferred_language().await?,
            size_limits: self.size_limits().await?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::SqliteStore;

    async fn seeded() -> SettingsService {
        let store = Arc::new(SqliteStore::open_in_memory().unwrap());
        let settings = SettingsService::new(store);
        settings.seed_defaults().await.unwrap();
        settings
    }

    #[tokio::test]
    async fn test_seed_defaults_only_once() {
        let settings = seeded().await;
        assert_eq!(settings.seed_defaults().await.unwrap(), 0);
        assert_eq!(settings.store().all_settings().await.unwrap().len(), DEFAULT_SETTINGS.len());
    }

    #[tokio::test]
    async fn test_translation_settings_from_defaults() {
        let settings = seeded().await;
        let snapshot = settings.translation_settings().await.unwrap();

        assert_eq!(snapshot.model, "gemini-2.5-pro");
        assert_eq!(snapshot.preferred_lang, "pl");
        assert!((snapshot.temperature - 0.55).abs() < f32::EPSILON);
        assert_eq!(snapshot.size_limits.plain_bytes, 204_800);
        assert!(snapshot.size_limits.advanced_bytes > snapshot.size_limits.plain_bytes);
    }

    #[tokio::test]
    async fn test_malformed_number_is_invalid_setting() {
        let settings = seeded().await;
        settings.set(RATE_LIMIT_PER_MINUTE, "five").await.unwrap();

        let err = settings.get_parsed::<usize>(RATE_LIMIT_PER_MINUTE).await.unwrap_err();
        assert!(matches!(err, TranslarrError::InvalidSetting { .. }));
        assert_eq!(err.to_string(), "Invalid value for setting RateLimitPerMinute, value: five");
    }

    #[tokio::test]
    async fn test_flags_default_to_off() {
        let settings = seeded().await;
        assert!(!settings.get_flag(AUTO_TRANSLATE).await.unwrap());

        settings.set(AUTO_TRANSLATE, "True").await.unwrap();
        assert!(settings.get_flag(AUTO_TRANSLATE).await.unwrap());
        assert!(!settings.get_flag("NoSuchFlag").await.unwrap());
    }
}
