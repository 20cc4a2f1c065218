//! 进程内统计计数器
//!
//! 计数只存在于进程生命周期内，重启清零；跨实例聚合不在职责范围。
//! 热路径读锁取计数器，首次出现的键走写锁慢路径，`entry().or_insert`
//! 保证并发首插对同一个键只产生一个计数器。

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{PoisonError, RwLock};
use std::sync::Arc;

use serde::Serialize;

/// 品类计数的命名空间，浏览与搜索分开统计
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CategoryNamespace {
    View,
    Search,
}

impl CategoryNamespace {
    fn prefix(&self) -> &'static str {
        match self {
            Self::View => "view",
            Self::Search => "search",
        }
    }

    fn key(&self, category: &str) -> String {
        format!("{}:{}", self.prefix(), category)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct KeywordCount {
    pub keyword: String,
    pub count: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct StoreTotals {
    pub total_views: u64,
    pub total_searches: u64,
}

#[derive(Default)]
pub struct AggregateStore {
    view_counts: RwLock<HashMap<i64, Arc<AtomicU64>>>,
    search_counts: RwLock<HashMap<String, Arc<AtomicU64>>>,
    category_counts: RwLock<HashMap<String, Arc<AtomicU64>>>,
}

impl AggregateStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn increment_view(&self, product_id: i64) -> u64 {
        increment(&self.view_counts, product_id)
    }

    pub fn increment_search(&self, keyword: &str) -> u64 {
        increment(&self.search_counts, keyword.to_string())
    }

    /// 调用方必须传入归一化后的品类
    pub fn increment_category(&self, namespace: CategoryNamespace, category: &str) -> u64 {
        increment(&self.category_counts, namespace.key(category))
    }

    /// 未知键返回 0，零计数是合法状态而非错误
    pub fn view_count(&self, product_id: i64) -> u64 {
        load(&self.view_counts, &product_id)
    }

    pub fn search_count(&self, keyword: &str) -> u64 {
        load(&self.search_counts, &keyword.to_string())
    }

    pub fn category_count(&self, namespace: CategoryNamespace, category: &str) -> u64 {
        load(&self.category_counts, &namespace.key(category))
    }

    /// 读取时全量扫描 + 排序，计数规模为进程内热点数据，代价可接受
    pub fn top_keywords(&self, limit: usize) -> Vec<KeywordCount> {
        let guard = self
            .search_counts
            .read()
            .unwrap_or_else(PoisonError::into_inner);
        let mut entries: Vec<KeywordCount> = guard
            .iter()
            .map(|(keyword, counter)| KeywordCount {
                keyword: keyword.clone(),
                count: counter.load(Ordering::Relaxed),
            })
            .collect();
        drop(guard);
        entries.sort_by(|a, b| b.count.cmp(&a.count).then(a.keyword.cmp(&b.keyword)));
        entries.truncate(limit);
        entries
    }

    pub fn totals(&self) -> StoreTotals {
        StoreTotals {
            total_views: sum(&self.view_counts),
            total_searches: sum(&self.search_counts),
        }
    }
}

fn increment<K>(map: &RwLock<HashMap<K, Arc<AtomicU64>>>, key: K) -> u64
where
    K: std::hash::Hash + Eq,
{
    // 快路径：键已存在时只拿读锁
    {
        let guard = map.read().unwrap_or_else(PoisonError::into_inner);
        if let Some(counter) = guard.get(&key) {
            return counter.fetch_add(1, Ordering::Relaxed) + 1;
        }
    }
    let counter = {
        let mut guard = map.write().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(
            guard
                .entry(key)
                .or_insert_with(|| Arc::new(AtomicU64::new(0))),
        )
    };
    counter.fetch_add(1, Ordering::Relaxed) + 1
}

fn load<K>(map: &RwLock<HashMap<K, Arc<AtomicU64>>>, key: &K) -> u64
where
    K: std::hash::Hash + Eq,
{
    map.read()
        .unwrap_or_else(PoisonError::into_inner)
        .get(key)
        .map(|counter| counter.load(Ordering::Relaxed))
        .unwrap_or(0)
}

fn sum<K>(map: &RwLock<HashMap<K, Arc<AtomicU64>>>) -> u64
where
    K: std::hash::Hash + Eq,
{
    map.read()
        .unwrap_or_else(PoisonError::into_inner)
        .values()
        .map(|counter| counter.load(Ordering::Relaxed))
        .sum()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_keys_read_as_zero() {
        let store = AggregateStore::new();
        assert_eq!(store.view_count(404), 0);
        assert_eq!(store.search_count("없는검색어"), 0);
        assert_eq!(store.category_count(CategoryNamespace::View, "기타"), 0);
    }

    #[test]
    fn increments_accumulate_per_key() {
        let store = AggregateStore::new();
        store.increment_view(1);
        store.increment_view(1);
        store.increment_view(2);
        assert_eq!(store.view_count(1), 2);
        assert_eq!(store.view_count(2), 1);
    }

    #[test]
    fn category_namespaces_do_not_collide() {
        let store = AggregateStore::new();
        store.increment_category(CategoryNamespace::View, "전자제품");
        store.increment_category(CategoryNamespace::Search, "전자제품");
        store.increment_category(CategoryNamespace::Search, "전자제품");
        assert_eq!(store.category_count(CategoryNamespace::View, "전자제품"), 1);
        assert_eq!(
            store.category_count(CategoryNamespace::Search, "전자제품"),
            2
        );
    }

    #[test]
    fn top_keywords_sorted_and_truncated() {
        let store = AggregateStore::new();
        for _ in 0..3 {
            store.increment_search("노트북");
        }
        for _ in 0..5 {
            store.increment_search("책상");
        }
        store.increment_search("의자");

        let top = store.top_keywords(2);
        assert_eq!(top.len(), 2);
        assert_eq!(top[0].keyword, "책상");
        assert_eq!(top[0].count, 5);
        assert_eq!(top[1].keyword, "노트북");
    }

    #[test]
    fn totals_sum_all_counters() {
        let store = AggregateStore::new();
        store.increment_view(1);
        store.increment_view(2);
        store.increment_search("책상");
        let totals = store.totals();
        assert_eq!(totals.total_views, 2);
        assert_eq!(totals.total_searches, 1);
    }
}
