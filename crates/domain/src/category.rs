//! 商品品类归一化
//!
//! 统计计数之前必须先归一化品类，保证同义词落到同一个计数键上。

/// 无法识别的品类统一归入该值
pub const FALLBACK_CATEGORY: &str = "기타";

const SUPPORTED_CATEGORIES: [&str; 6] = [
    "전자제품",
    "패션잡화",
    "유아용품",
    "스포츠용품",
    "식품",
    "신발",
];

pub fn supported_categories() -> &'static [&'static str] {
    &SUPPORTED_CATEGORIES
}

/// 先去除首尾空白，支持的品类原样返回，同义词映射到规范名，
/// 空白或未知的品类返回 [`FALLBACK_CATEGORY`]。
pub fn normalize_category(raw: Option<&str>) -> &'static str {
    let trimmed = match raw {
        Some(value) => value.trim(),
        None => return FALLBACK_CATEGORY,
    };
    if trimmed.is_empty() {
        return FALLBACK_CATEGORY;
    }
    if let Some(supported) = SUPPORTED_CATEGORIES.iter().find(|c| **c == trimmed) {
        return supported;
    }
    match trimmed {
        "의류" => "패션잡화",
        "전자기기" => "전자제품",
        "아기용품" => "유아용품",
        "운동용품" => "스포츠용품",
        "음식" => "식품",
        _ => FALLBACK_CATEGORY,
    }
}
