//! 波斯语/英语分类器
//!
//! 纯函数：同样的文本和阈值永远得到同样的结果。规则按固定优先级依次尝试：
//!
//! 1. 没有可计数字母时，原文含波斯字符即判为波斯语
//! 2. 波斯字符占比 >= 阈值
//! 3. 有英文字母且占比 <= 1 - 阈值 判为英语
//! 4. 短文本（<= 10 字符）波斯字符不少于英文
//! 5. 短文本（<= 20 字符）含常见波斯虚词
//! 6. 只有波斯字符
//!
//! 其余为未知。

use std::fmt;
use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use unicode_normalization::UnicodeNormalization;

use crate::config::constants;
use crate::config::Sensitivity;

/// 分类结果
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    Persian,
    English,
    Unknown,
}

impl Language {
    pub fn as_str(&self) -> &'static str {
        match self {
            Language::Persian => "persian",
            Language::English => "english",
            Language::Unknown => "unknown",
        }
    }

    /// 导出文档使用的方向
    pub fn direction(&self) -> &'static str {
        match self {
            Language::Persian => "rtl",
            _ => "ltr",
        }
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 常见波斯虚词
pub const PERSIAN_KEYWORDS: &[&str] = &[
    "است", "می‌شود", "می‌کند", "می‌توان", "باید", "نباید", "بود", "بودن", "کردن", "شدن",
    "این", "آن", "که", "را", "به", "از", "در", "با", "برای", "تا", "و", "یا",
    "من", "تو", "او", "ما", "شما", "آنها", "خود", "خودش", "خودم", "خودت",
];

/// 波斯/阿拉伯字符区间
pub fn is_persian_char(c: char) -> bool {
    matches!(c,
        '\u{0600}'..='\u{06FF}'
        | '\u{0750}'..='\u{077F}'
        | '\u{08A0}'..='\u{08FF}'
        | '\u{FB50}'..='\u{FDFF}'
        | '\u{FE70}'..='\u{FEFF}')
}

pub fn has_persian(text: &str) -> bool {
    text.chars().any(is_persian_char)
}

pub fn has_english(text: &str) -> bool {
    text.chars().any(|c| c.is_ascii_alphabetic())
}

pub fn has_persian_keyword(text: &str) -> bool {
    PERSIAN_KEYWORDS.iter().any(|keyword| text.contains(keyword))
}

fn strip_regex() -> Option<&'static Regex> {
    static STRIP: OnceLock<Option<Regex>> = OnceLock::new();
    STRIP
        .get_or_init(|| {
            Regex::new(r"[\p{N}\p{White_Space}\p{P}\p{S}\x{200C}\x{200F}\x{202A}-\x{202E}]+").ok()
        })
        .as_ref()
}

/// NFKC 规范化后去掉数字、空白、标点、符号和方向控制字符
pub fn clean_text(text: &str) -> String {
    let normalized: String = text.nfkc().collect();
    match strip_regex() {
        Some(re) => re.replace_all(&normalized, "").into_owned(),
        None => normalized
            .chars()
            .filter(|c| {
                c.is_alphabetic() && !matches!(*c, '\u{200C}' | '\u{200F}' | '\u{202A}'..='\u{202E}')
            })
            .collect(),
    }
}

/// 字符计数
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CharCounts {
    pub persian: usize,
    pub english: usize,
}

impl CharCounts {
    pub fn of(clean: &str) -> Self {
        clean.chars().fold(Self::default(), |mut counts, c| {
            if is_persian_char(c) {
                counts.persian += 1;
            } else if c.is_ascii_alphabetic() {
                counts.english += 1;
            }
            counts
        })
    }

    pub fn persian_ratio(&self) -> Option<f64> {
        let total = self.persian + self.english;
        (total > 0).then(|| self.persian as f64 / total as f64)
    }
}

/// 按灵敏度分类
pub fn classify(text: &str, sensitivity: Sensitivity) -> Language {
    classify_with_threshold(text, sensitivity.threshold())
}

/// 按波斯字符占比阈值分类
pub fn classify_with_threshold(text: &str, threshold: f64) -> Language {
    let clean = clean_text(text);
    let counts = CharCounts::of(&clean);

    let ratio = match counts.persian_ratio() {
        Some(ratio) if !clean.is_empty() => ratio,
        _ => {
            return if has_persian(text) {
                Language::Persian
            } else {
                Language::Unknown
            };
        }
    };

    if ratio >= threshold {
        return Language::Persian;
    }
    if counts.english > 0 && ratio <= 1.0 - threshold {
        return Language::English;
    }

    let length = text.chars().count();
    if length <= constants::SHORT_TEXT_CHARS
        && counts.persian > 0
        && counts.english <= counts.persian
    {
        return Language::Persian;
    }
    if length <= constants::KEYWORD_TEXT_CHARS && has_persian_keyword(text) {
        return Language::Persian;
    }
    if counts.persian > 0 && counts.english == 0 {
        return Language::Persian;
    }

    Language::Unknown
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pure_persian_and_english() {
        assert_eq!(classify("سلام دنیا", Sensitivity::Medium), Language::Persian);
        assert_eq!(classify("Hello World", Sensitivity::Medium), Language::English);
    }

    #[test]
    fn test_mixed_short_text() {
        assert_eq!(classify("OK سلام", Sensitivity::Medium), Language::Persian);
    }

    #[test]
    fn test_short_text_bias_reached_at_low_sensitivity() {
        // 占比 0.5：低于 0.6，也高于 1 - 0.6，只有短文本规则能判定
        assert_eq!(classify("ab سل", Sensitivity::Low), Language::Persian);
        // 同样占比但文本超过 10 个字符且无虚词
        assert_eq!(classify("abcdef سلامت خ", Sensitivity::Low), Language::Unknown);
    }

    #[test]
    fn test_keyword_rule() {
        // 占比 5/9，长度 11：短文本规则不适用，虚词 "از" 命中
        assert_eq!(classify("abcd از سلا", Sensitivity::Low), Language::Persian);
        assert_eq!(classify("abcd  سلامت", Sensitivity::Low), Language::Unknown);
    }

    #[test]
    fn test_exact_threshold_boundaries() {
        // 1/4 = 0.25
        assert_eq!(classify("س abc", Sensitivity::High), Language::Persian);
        assert_eq!(classify("س abc", Sensitivity::Medium), Language::English);
        // 2/5 = 0.4
        assert_eq!(classify("سل abc", Sensitivity::Medium), Language::Persian);
        assert_eq!(classify("سل abc", Sensitivity::Low), Language::English);
        // 3/5 = 0.6
        assert_eq!(classify("سلا ab", Sensitivity::Low), Language::Persian);
    }

    #[test]
    fn test_threshold_monotonicity() {
        let samples = ["س abc", "سل abc", "سلا ab", "ab سل", "Hello سلام دنیا", "a b c d e f g h س"];
        for text in samples {
            let low = classify(text, Sensitivity::Low) == Language::Persian;
            let medium = classify(text, Sensitivity::Medium) == Language::Persian;
            let high = classify(text, Sensitivity::High) == Language::Persian;
            assert!(!low || medium, "'{}' 在低灵敏度为波斯语时中灵敏度也应是", text);
            assert!(!medium || high, "'{}' 在中灵敏度为波斯语时高灵敏度也应是", text);
        }
    }

    #[test]
    fn test_fallback_on_empty_clean_text() {
        assert_eq!(classify("123 !!", Sensitivity::Medium), Language::Unknown);
        assert_eq!(classify("", Sensitivity::Medium), Language::Unknown);
        // 阿拉伯-印度数字属于波斯区间但会被清除，回退检查原文
        assert_eq!(classify("۱۲۳", Sensitivity::Medium), Language::Persian);
    }

    #[test]
    fn test_bidi_controls_are_ignored() {
        assert_eq!(
            classify("\u{202B}Hello\u{202C}", Sensitivity::Medium),
            Language::English
        );
        assert_eq!(clean_text("می\u{200C}شود"), "میشود");
    }

    #[test]
    fn test_determinism() {
        for text in ["سلام", "Hello", "ab سل", "", "۱۲۳"] {
            for sensitivity in [Sensitivity::High, Sensitivity::Medium, Sensitivity::Low] {
                assert_eq!(classify(text, sensitivity), classify(text, sensitivity));
            }
        }
    }
}
