//! 语言检测模块
//!
//! - `classifier` - 纯函数分类器
//! - `cache` - 文本结果缓存
//! - `signature` - 元素签名缓存，用于恢复被外部剥掉的标记

pub mod cache;
pub mod classifier;
pub mod signature;

// 重新导出主要类型
pub use cache::{CacheStats, LanguageCache};
pub use classifier::{
    classify, classify_with_threshold, clean_text, has_english, has_persian, is_persian_char,
    CharCounts, Language,
};
pub use signature::{element_signature, CachedClassification, SignatureCache};
