//! 语言结果缓存
//!
//! 对重复出现的相同字符串（界面元素反复重绘）跳过字符占比分析。
//! 键为 BLAKE3(灵敏度 + 全文)，因此缓存不会改变任何分类结果。读取不刷新新旧顺序，
//! 容量满时淘汰最早插入的条目。

use std::num::NonZeroUsize;

use lru::LruCache;

use super::classifier::{classify, Language};
use crate::config::{constants, Sensitivity};

/// 缓存统计信息
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct CacheStats {
    pub total_requests: u64,
    pub cache_hits: u64,
    pub cache_misses: u64,
    pub total_entries: usize,
    pub evictions: u64,
}

impl CacheStats {
    pub fn hit_rate(&self) -> f64 {
        if self.total_requests == 0 {
            0.0
        } else {
            self.cache_hits as f64 / self.total_requests as f64
        }
    }
}

/// 文本 -> 分类结果
pub struct LanguageCache {
    entries: LruCache<blake3::Hash, Language>,
    stats: CacheStats,
}

impl LanguageCache {
    pub fn new(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            entries: LruCache::new(capacity),
            stats: CacheStats::default(),
        }
    }

    fn key(text: &str, sensitivity: Sensitivity) -> blake3::Hash {
        let mut hasher = blake3::Hasher::new();
        hasher.update(sensitivity.as_str().as_bytes());
        hasher.update(&[0]);
        hasher.update(text.as_bytes());
        hasher.finalize()
    }

    /// 分类，命中缓存时直接返回
    pub fn classify(&mut self, text: &str, sensitivity: Sensitivity) -> Language {
        self.stats.total_requests += 1;
        let key = Self::key(text, sensitivity);

        if let Some(language) = self.entries.peek(&key) {
            self.stats.cache_hits += 1;
            return *language;
        }

        self.stats.cache_misses += 1;
        let language = classify(text, sensitivity);
        if let Some((evicted, _)) = self.entries.push(key, language) {
            if evicted != key {
                self.stats.evictions += 1;
            }
        }
        self.stats.total_entries = self.entries.len();
        language
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.stats.total_entries = 0;
    }

    pub fn stats(&self) -> &CacheStats {
        &self.stats
    }
}

impl Default for LanguageCache {
    fn default() -> Self {
        Self::new(constants::LANGUAGE_CACHE_CAPACITY)
    }
}
