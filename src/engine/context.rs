//! 页面级共享状态
//!
//! 变更管道、视口扫描和输入处理都通过 `PageContext` 访问文档、设置、缓存和统计。
//! 所有状态都只属于当前页面，重新加载页面即全部丢弃。

use std::rc::Rc;
use std::time::Duration;

use markup5ever_rcdom::Handle;

use super::site::{host_from_url, SiteProfile};
use super::stats::EngineStats;
use super::tagger::{self, StyleProfile};
use crate::config::{EngineOptions, Settings};
use crate::detection::{Language, LanguageCache, SignatureCache};
use crate::dom::{body_element, LayoutProbe, WeakNodeMap};
use crate::error::{helpers, EngineError, ErrorStats};

/// 已处理元素的记录
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProcessedEntry {
    pub language: Language,
    /// 处理时文本的指纹
    pub fingerprint: blake3::Hash,
}

/// 元素 -> 上次处理结果（弱引用）
#[derive(Default)]
pub struct ProcessedSet {
    entries: WeakNodeMap<ProcessedEntry>,
}

impl ProcessedSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, element: &Handle, language: Language, text: &str) {
        self.entries.insert(
            element,
            ProcessedEntry {
                language,
                fingerprint: blake3::hash(text.as_bytes()),
            },
        );
    }

    pub fn get(&self, element: &Handle) -> Option<&ProcessedEntry> {
        self.entries.get(element)
    }

    /// 记录存在、文本未变且标记仍在
    pub fn is_fully_processed(&self, element: &Handle, text: &str) -> bool {
        let Some(entry) = self.entries.get(element) else {
            return false;
        };
        if entry.fingerprint != blake3::hash(text.as_bytes()) {
            return false;
        }
        match entry.language {
            Language::Unknown => !tagger::has_marker(element),
            language => tagger::marker_of(element) == Some(language),
        }
    }

    pub fn remove(&mut self, element: &Handle) {
        self.entries.remove(element);
    }

    /// 清理已释放元素的条目
    pub fn purge(&mut self) -> usize {
        self.entries.purge()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

/// 页面上下文
pub struct PageContext {
    pub document: Handle,
    pub page_url: String,
    pub host: String,
    pub site: SiteProfile,
    pub settings: Settings,
    pub options: EngineOptions,
    pub layout: Rc<dyn LayoutProbe>,
    pub languages: LanguageCache,
    pub signatures: SignatureCache,
    pub processed: ProcessedSet,
    pub stats: EngineStats,
    pub errors: ErrorStats,
    /// 引擎时钟
    pub now: Duration,
}

impl PageContext {
    pub fn new(
        document: Handle,
        page_url: &str,
        settings: Settings,
        options: EngineOptions,
        layout: Rc<dyn LayoutProbe>,
    ) -> Self {
        let host = host_from_url(page_url).unwrap_or_default();
        Self {
            document,
            page_url: page_url.to_string(),
            site: SiteProfile::for_host(&host),
            host,
            settings,
            languages: LanguageCache::new(options.language_cache_capacity),
            signatures: SignatureCache::new(options.signature_cache_capacity),
            options,
            layout,
            processed: ProcessedSet::new(),
            stats: EngineStats::default(),
            errors: ErrorStats::new(),
            now: Duration::ZERO,
        }
    }

    /// 引擎是否应在当前主机上工作
    pub fn is_active(&self) -> bool {
        self.settings.is_active_for(&self.host)
    }

    pub fn style_profile(&self) -> StyleProfile {
        StyleProfile::from_settings(&self.settings)
    }

    /// 扫描的根，没有 `<body>` 时退回整个文档
    pub fn root(&self) -> Handle {
        body_element(&self.document).unwrap_or_else(|| self.document.clone())
    }

    /// 页面地址变化后刷新主机和站点配置
    pub fn set_page_url(&mut self, page_url: &str) {
        self.page_url = page_url.to_string();
        self.host = host_from_url(page_url).unwrap_or_default();
        self.site = SiteProfile::for_host(&self.host);
    }

    /// 记录可恢复的错误并继续
    pub fn record_error(&mut self, error: &EngineError) {
        helpers::log_error(error);
        self.errors.record(error);
        self.stats.errors += 1;
    }
}
