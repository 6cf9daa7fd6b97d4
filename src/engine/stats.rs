//! 运行统计

use chrono::{SecondsFormat, Utc};
use serde::Serialize;

use super::site::SiteKind;
use crate::config::Settings;

/// 计数器
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EngineStats {
    /// 被标记（含缓存恢复）的文本元素
    pub processed_elements: u64,
    pub input_elements: u64,
    pub errors: u64,
    pub heartbeat_count: u64,
    pub immediate_processing: u64,
    pub reprocessing_count: u64,
    pub full_scans: u64,
    pub restored_from_cache: u64,
}

/// `getStats` / 心跳报告
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatsSnapshot {
    #[serde(flatten)]
    pub counters: EngineStats,
    pub is_active: bool,
    pub site_type: SiteKind,
    pub is_ai_studio: bool,
    pub is_perplexity: bool,
    #[serde(rename = "isChatGPT")]
    pub is_chatgpt: bool,
    pub current_domain: String,
    pub is_site_enabled: bool,
    pub config: Settings,
    pub signature_cache_size: usize,
    pub language_cache_size: usize,
    pub timestamp: String,
}

impl StatsSnapshot {
    pub fn new(
        counters: &EngineStats,
        site: SiteKind,
        host: &str,
        settings: &Settings,
        cache_sizes: (usize, usize),
    ) -> Self {
        Self {
            counters: counters.clone(),
            is_active: settings.is_active_for(host),
            site_type: site,
            is_ai_studio: site == SiteKind::AiStudio,
            is_perplexity: site == SiteKind::Perplexity,
            is_chatgpt: site == SiteKind::ChatGpt,
            current_domain: host.to_string(),
            is_site_enabled: settings.is_host_enabled(host),
            config: settings.clone(),
            signature_cache_size: cache_sizes.0,
            language_cache_size: cache_sizes.1,
            timestamp: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
        }
    }
}
