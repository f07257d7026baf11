//! 通用工具函数

use uuid::Uuid;

/// 生成带前缀的人类可读编号，如 `PAT-1a2b3c4d`
pub fn generate_unique_number(prefix: &str, len: usize) -> String {
    let simple = Uuid::new_v4().simple().to_string();
    let len = len.min(simple.len());
    format!("{}-{}", prefix, &simple[..len])
}

/// CIN 归一化：去空白并转大写
pub fn normalize_cin(cin: &str) -> String {
    cin.trim().to_uppercase()
}

/// 去掉空白后为空的字符串视为缺失
pub fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}
