//! 外部设置快照
//!
//! 设置由外部存储（弹窗 UI）持有，引擎只读取快照，并在收到显式更新消息时合并补丁。
//! JSON 字段同时接受新旧两套名字（`enabled`/`isEnabled` 等）。

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::constants;
use crate::error::EngineError;

/// 字体选择
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FontChoice {
    #[default]
    Vazir,
    Shabnam,
    Default,
}

impl FontChoice {
    /// 对应的 CSS font-family，`Default` 不覆盖页面字体
    pub fn family(&self) -> Option<&'static str> {
        match self {
            FontChoice::Vazir => Some("'VazirAIStudio', 'Vazir', Tahoma, Arial, sans-serif"),
            FontChoice::Shabnam => Some("'ShabnamAIStudio', 'Shabnam', Tahoma, Arial, sans-serif"),
            FontChoice::Default => None,
        }
    }
}

impl FromStr for FontChoice {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "vazir" => Ok(FontChoice::Vazir),
            "shabnam" => Ok(FontChoice::Shabnam),
            "default" | "none" => Ok(FontChoice::Default),
            other => Err(EngineError::Config(format!(
                "unknown font '{}', use: vazir, shabnam, default",
                other
            ))),
        }
    }
}

/// 字号选择
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FontSize {
    #[default]
    Default,
    Small,
    Medium,
    Large,
}

impl FontSize {
    pub fn css(&self) -> Option<&'static str> {
        match self {
            FontSize::Default => None,
            FontSize::Small => Some("12px"),
            FontSize::Medium => Some("16px"),
            FontSize::Large => Some("18px"),
        }
    }
}

impl FromStr for FontSize {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "default" => Ok(FontSize::Default),
            "small" => Ok(FontSize::Small),
            "medium" => Ok(FontSize::Medium),
            "large" => Ok(FontSize::Large),
            other => Err(EngineError::Config(format!(
                "unknown font size '{}', use: default, small, medium, large",
                other
            ))),
        }
    }
}

/// 检测灵敏度，对应波斯字符占比阈值
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sensitivity {
    High,
    #[default]
    Medium,
    Low,
}

impl Sensitivity {
    pub fn threshold(&self) -> f64 {
        match self {
            Sensitivity::High => constants::THRESHOLD_HIGH,
            Sensitivity::Medium => constants::THRESHOLD_MEDIUM,
            Sensitivity::Low => constants::THRESHOLD_LOW,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Sensitivity::High => "high",
            Sensitivity::Medium => "medium",
            Sensitivity::Low => "low",
        }
    }
}

impl fmt::Display for Sensitivity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Sensitivity {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "high" => Ok(Sensitivity::High),
            "medium" => Ok(Sensitivity::Medium),
            "low" => Ok(Sensitivity::Low),
            other => Err(EngineError::Config(format!(
                "unknown sensitivity '{}', use: high, medium, low",
                other
            ))),
        }
    }
}

/// 设置快照
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Settings {
    #[serde(alias = "isEnabled")]
    pub enabled: bool,
    #[serde(alias = "selectedFont")]
    pub font: FontChoice,
    pub font_size: FontSize,
    #[serde(alias = "detectionMode")]
    pub detection_sensitivity: Sensitivity,
    #[serde(alias = "enabledSites")]
    pub enabled_domains: Vec<String>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            enabled: true,
            font: FontChoice::default(),
            font_size: FontSize::default(),
            detection_sensitivity: Sensitivity::default(),
            enabled_domains: Vec::new(),
        }
    }
}

impl Settings {
    /// 当前主机是否在启用列表内；空列表表示全部启用
    pub fn is_host_enabled(&self, host: &str) -> bool {
        if self.enabled_domains.is_empty() {
            return true;
        }
        let host = host.trim().to_lowercase();
        let host = host.strip_prefix("www.").unwrap_or(&host);
        self.enabled_domains.iter().any(|domain| {
            let domain = domain.trim().to_lowercase();
            let domain = domain.strip_prefix("www.").unwrap_or(&domain);
            host == domain || host.ends_with(&format!(".{}", domain))
        })
    }

    /// 引擎在该主机上是否应当工作
    pub fn is_active_for(&self, host: &str) -> bool {
        self.enabled && self.is_host_enabled(host)
    }

    /// 合并补丁并报告哪些方面发生了变化
    pub fn apply(&mut self, patch: &SettingsPatch) -> SettingsChange {
        let mut change = SettingsChange::default();

        if let Some(enabled) = patch.enabled {
            change.enabled = enabled != self.enabled;
            self.enabled = enabled;
        }
        if let Some(font) = patch.font {
            change.font |= font != self.font;
            self.font = font;
        }
        if let Some(font_size) = patch.font_size {
            change.font |= font_size != self.font_size;
            self.font_size = font_size;
        }
        if let Some(sensitivity) = patch.detection_sensitivity {
            change.sensitivity = sensitivity != self.detection_sensitivity;
            self.detection_sensitivity = sensitivity;
        }
        if let Some(domains) = &patch.enabled_domains {
            change.domains = *domains != self.enabled_domains;
            self.enabled_domains = domains.clone();
        }

        change
    }
}

/// 部分设置，来自 `updateSettings` / `toggleRTL` 消息
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SettingsPatch {
    #[serde(alias = "isEnabled", skip_serializing_if = "Option::is_none")]
    pub enabled: Option<bool>,
    #[serde(alias = "selectedFont", skip_serializing_if = "Option::is_none")]
    pub font: Option<FontChoice>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub font_size: Option<FontSize>,
    #[serde(alias = "detectionMode", skip_serializing_if = "Option::is_none")]
    pub detection_sensitivity: Option<Sensitivity>,
    #[serde(alias = "enabledSites", skip_serializing_if = "Option::is_none")]
    pub enabled_domains: Option<Vec<String>>,
}

impl SettingsPatch {
    pub fn is_empty(&self) -> bool {
        self.enabled.is_none()
            && self.font.is_none()
            && self.font_size.is_none()
            && self.detection_sensitivity.is_none()
            && self.enabled_domains.is_none()
    }

    /// 以另一个补丁中已设置的字段覆盖本补丁
    pub fn merge(mut self, other: SettingsPatch) -> SettingsPatch {
        self.enabled = other.enabled.or(self.enabled);
        self.font = other.font.or(self.font);
        self.font_size = other.font_size.or(self.font_size);
        self.detection_sensitivity = other.detection_sensitivity.or(self.detection_sensitivity);
        self.enabled_domains = other.enabled_domains.or(self.enabled_domains);
        self
    }
}

/// 补丁合并后的变化摘要
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SettingsChange {
    pub enabled: bool,
    pub font: bool,
    pub sensitivity: bool,
    pub domains: bool,
}

impl SettingsChange {
    pub fn any(&self) -> bool {
        self.enabled || self.font || self.sensitivity || self.domains
    }
}
