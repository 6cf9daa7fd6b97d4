//! 元素签名缓存
//!
//! 签名 = 标签 + class + 父标签 + 文本长度 + 前 50 个字符的哈希。页面框架重绘元素时会剥掉引擎的标记，
//! 签名仍然相同，于是可以直接恢复上次的分类而不必重新计算。

use std::num::NonZeroUsize;
use std::time::Duration;

use lru::LruCache;
use markup5ever_rcdom::Handle;

use super::classifier::Language;
use crate::config::constants;
use crate::dom::{get_node_attr, get_node_name, parent_element};

/// 计算元素签名；非元素或空文本返回 `None`
pub fn element_signature(element: &Handle, text: &str) -> Option<String> {
    let tag = get_node_name(element)?;
    if text.is_empty() {
        return None;
    }

    let class_name = get_node_attr(element, "class").unwrap_or_default();
    let parent_tag = parent_element(element)
        .and_then(|parent| get_node_name(&parent).map(str::to_ascii_uppercase))
        .unwrap_or_default();
    let length = text.chars().count();
    let prefix: String = text.chars().take(constants::SIGNATURE_PREFIX_CHARS).collect();
    let hash = blake3::hash(prefix.as_bytes()).to_hex();

    Some(format!(
        "{}_{}_{}_{}_{}",
        tag.to_ascii_uppercase(),
        class_name,
        parent_tag,
        length,
        &hash.as_str()[..16]
    ))
}

/// 缓存的分类
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CachedClassification {
    pub language: Language,
    /// 写入时的引擎时钟
    pub timestamp: Duration,
}

/// 签名 -> 分类，容量满时淘汰最早插入的条目
pub struct SignatureCache {
    entries: LruCache<String, CachedClassification>,
    evictions: u64,
}

impl SignatureCache {
    pub fn new(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            entries: LruCache::new(capacity),
            evictions: 0,
        }
    }

    /// 查询，不影响淘汰顺序
    pub fn get(&self, signature: &str) -> Option<&CachedClassification> {
        self.entries.peek(signature)
    }

    pub fn contains(&self, signature: &str) -> bool {
        self.entries.contains(signature)
    }

    /// 写入；已有的键原地更新，保持插入顺序
    pub fn insert(&mut self, signature: String, language: Language, now: Duration) {
        let entry = CachedClassification {
            language,
            timestamp: now,
        };
        if let Some(existing) = self.entries.peek_mut(&signature) {
            *existing = entry;
            return;
        }
        if self.entries.push(signature, entry).is_some() {
            self.evictions += 1;
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn evictions(&self) -> u64 {
        self.evictions
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

impl Default for SignatureCache {
    fn default() -> Self {
        Self::new(constants::SIGNATURE_CACHE_CAPACITY)
    }
}
