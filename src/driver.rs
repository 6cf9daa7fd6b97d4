//! 实时驱动
//!
//! 在 tokio 单线程运行时里按真实时间推进引擎：睡到下一个任务的到期时间（至多 `poll_interval`，
//! 以便及时取出宿主事件），同时接收 JSON 命令并回送响应。命令通道关闭时返回引擎。

use std::time::Duration;

use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender};
use tokio::time::{self, Instant};
use tracing::{debug, info, warn};

use crate::engine::Engine;
use crate::error::{helpers, EngineResult};

/// 驱动参数
#[derive(Debug, Clone, Copy)]
pub struct DriverConfig {
    /// 没有任务到期时检查事件的最长间隔
    pub poll_interval: Duration,
}

impl Default for DriverConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(50),
        }
    }
}

/// 启动引擎并运行到命令通道关闭
pub async fn run(
    mut engine: Engine,
    mut commands: UnboundedReceiver<String>,
    responses: UnboundedSender<String>,
    config: DriverConfig,
) -> EngineResult<Engine> {
    let origin = Instant::now();
    engine.start()?;
    info!("驱动已启动");

    loop {
        let now = origin.elapsed();
        engine.tick(now);
        let wake = match engine.next_due() {
            Some(due) => due.min(now + config.poll_interval).max(now),
            None => now + config.poll_interval,
        };

        tokio::select! {
            _ = time::sleep_until(origin + wake) => {}
            command = commands.recv() => match command {
                Some(json) => {
                    engine.tick(origin.elapsed());
                    let response = engine.handle_message(&json);
                    match response.to_json() {
                        Ok(json) => {
                            if responses.send(json).is_err() {
                                warn!("响应通道已关闭");
                            }
                        }
                        Err(e) => helpers::log_error(&e),
                    }
                }
                None => break,
            },
        }
    }

    debug!("命令通道关闭，驱动退出");
    Ok(engine)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{EngineOptions, Settings};
    use crate::dom::{parse_html, StaticLayout};
    use crate::messaging::NullOutbound;
    use std::rc::Rc;
    use tokio::sync::mpsc::unbounded_channel;

    #[tokio::test(start_paused = true)]
    async fn test_ping_and_shutdown() {
        let dom = parse_html("<p>سلام دنیا</p>").unwrap();
        let engine = Engine::attach(
            dom.document.clone(),
            "https://example.com/",
            Settings::default(),
            EngineOptions::default(),
            Rc::new(StaticLayout::new()),
            Box::new(NullOutbound),
        )
        .unwrap();
        let (command_tx, command_rx) = unbounded_channel();
        let (response_tx, mut response_rx) = unbounded_channel();

        let client = async move {
            command_tx.send(r#"{"action":"ping"}"#.to_string()).unwrap();
            let response = response_rx.recv().await;
            time::sleep(Duration::from_secs(1)).await;
            drop(command_tx);
            response
        };
        let (engine, response) = tokio::join!(
            run(engine, command_rx, response_tx, DriverConfig::default()),
            client
        );

        let response = response.unwrap();
        assert!(response.contains("\"status\":\"alive\""));
        let engine = engine.unwrap();
        assert!(engine.now() >= Duration::from_millis(500));
        assert_eq!(engine.stats().counters.immediate_processing, 1);
    }
}
