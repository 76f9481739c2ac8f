//! 多语言名称选择

use super::records::LocaleNames;

pub const FALLBACK_LANG: &str = "en";

/// 按 `lang` → `"en"` → 任一非空名称 的顺序选择标签
///
/// 最后一步在 `BTreeMap` 上按 locale 代码的字典序取第一个非空值。
/// 该结果只在前两步都落空时出现，调用方不应依赖具体取到哪种语言。
pub fn pick_name(names: &LocaleNames, lang: &str) -> Option<String> {
    let non_empty = |key: &str| {
        names
            .get(key)
            .filter(|label| !label.is_empty())
            .cloned()
    };

    non_empty(lang)
        .or_else(|| non_empty(FALLBACK_LANG))
        .or_else(|| names.values().find(|label| !label.is_empty()).cloned())
}
