//! 消息协议
//!
//! 入站命令是带 `action` 字段的 JSON；出站只有心跳，经由 `Outbound` 发给宿主。
//!
//! ```json
//! {"action": "updateSettings", "settings": {"detectionMode": "high"}}
//! {"action": "toggleRTL", "isEnabled": false}
//! {"action": "ping"}
//! ```

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::SettingsPatch;
use crate::engine::stats::StatsSnapshot;
use crate::error::{EngineError, EngineResult};

// ============================================================================
// 入站命令
// ============================================================================

/// 设置字段可以在顶层，也可以嵌在 `settings` 里；嵌套的优先
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct SettingsEnvelope {
    #[serde(default)]
    pub settings: Option<SettingsPatch>,
    #[serde(flatten)]
    pub inline: SettingsPatch,
}

impl SettingsEnvelope {
    pub fn patch(&self) -> SettingsPatch {
        match &self.settings {
            Some(nested) => self.inline.clone().merge(nested.clone()),
            None => self.inline.clone(),
        }
    }
}

/// 入站命令
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "action")]
pub enum Command {
    #[serde(rename = "ping")]
    Ping,
    #[serde(rename = "toggleRTL")]
    ToggleRtl {
        #[serde(rename = "isEnabled", alias = "enabled")]
        enabled: bool,
    },
    #[serde(rename = "updateSettings")]
    UpdateSettings(SettingsEnvelope),
    #[serde(rename = "smoothReprocess")]
    SmoothReprocess(SettingsEnvelope),
    #[serde(rename = "fullReload")]
    FullReload(SettingsEnvelope),
    #[serde(rename = "getStats")]
    GetStats,
    #[serde(rename = "exportPdf")]
    ExportPdf,
}

impl Command {
    /// 解析 JSON 命令
    pub fn parse(json: &str) -> EngineResult<Self> {
        let command = serde_json::from_str(json)?;
        debug!("收到命令: {:?}", command);
        Ok(command)
    }

    pub fn action(&self) -> &'static str {
        match self {
            Command::Ping => "ping",
            Command::ToggleRtl { .. } => "toggleRTL",
            Command::UpdateSettings(_) => "updateSettings",
            Command::SmoothReprocess(_) => "smoothReprocess",
            Command::FullReload(_) => "fullReload",
            Command::GetStats => "getStats",
            Command::ExportPdf => "exportPdf",
        }
    }
}

// ============================================================================
// 响应
// ============================================================================

/// 命令响应
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum Response {
    Alive {
        success: bool,
        status: &'static str,
        stats: Box<StatsSnapshot>,
    },
    Stats(Box<StatsSnapshot>),
    Export {
        success: bool,
        messages: usize,
        html: String,
    },
    Ack {
        success: bool,
    },
    Failure {
        success: bool,
        error: String,
    },
}

impl Response {
    pub fn ok() -> Self {
        Response::Ack { success: true }
    }

    pub fn alive(stats: StatsSnapshot) -> Self {
        Response::Alive {
            success: true,
            status: "alive",
            stats: Box::new(stats),
        }
    }

    pub fn failure(error: impl Into<String>) -> Self {
        Response::Failure {
            success: false,
            error: error.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        match self {
            Response::Alive { success, .. }
            | Response::Export { success, .. }
            | Response::Ack { success }
            | Response::Failure { success, .. } => *success,
            Response::Stats(_) => true,
        }
    }

    pub fn to_json(&self) -> EngineResult<String> {
        serde_json::to_string(self).map_err(|e| EngineError::Serialization(e.to_string()))
    }
}

impl From<EngineError> for Response {
    fn from(error: EngineError) -> Self {
        match error {
            EngineError::Parse(message) if message.contains("unknown variant") => {
                Response::failure("Unknown action")
            }
            other => Response::failure(other.to_string()),
        }
    }
}

// ============================================================================
// 出站消息
// ============================================================================

/// 发往宿主的消息
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "action", rename_all = "camelCase")]
pub enum OutboundMessage {
    Heartbeat {
        timestamp: String,
        domain: String,
        stats: Box<StatsSnapshot>,
    },
}

/// 宿主消息通道
pub trait Outbound {
    /// 发送一条消息；失败时返回 `EngineError::Messaging`
    fn send(&mut self, message: &OutboundMessage) -> EngineResult<()>;
}

/// 丢弃所有消息
#[derive(Debug, Default)]
pub struct NullOutbound;

impl Outbound for NullOutbound {
    fn send(&mut self, _message: &OutboundMessage) -> EngineResult<()> {
        Ok(())
    }
}

/// 把消息序列化后写入 tokio 通道
pub struct ChannelOutbound {
    sender: tokio::sync::mpsc::UnboundedSender<String>,
}

impl ChannelOutbound {
    pub fn new(sender: tokio::sync::mpsc::UnboundedSender<String>) -> Self {
        Self { sender }
    }
}

impl Outbound for ChannelOutbound {
    fn send(&mut self, message: &OutboundMessage) -> EngineResult<()> {
        let json = serde_json::to_string(message)
            .map_err(|e| EngineError::Serialization(e.to_string()))?;
        self.sender
            .send(json)
            .map_err(|_| EngineError::Messaging("outbound channel closed".to_string()))
    }
}
