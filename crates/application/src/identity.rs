//! 调用方身份解析
//!
//! 三级解析：令牌指纹缓存 → 本地 JWT 解码 → 远程身份服务。
//! 缓存键是令牌的 SHA-256 十六进制指纹，原始令牌不落缓存。
//! 过期条目读取时视为未命中，实际清除由超过阈值时的清扫完成。

use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use data_encoding::HEXLOWER;
use ring::digest::{digest, SHA256};
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, warn};

use crate::error::ApplicationError;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Identity {
    pub user_id: i64,
    pub nickname: String,
}

#[derive(Debug, Error)]
pub enum IdentityError {
    #[error("令牌无效: {0}")]
    InvalidToken(String),

    #[error("身份服务不可用: {0}")]
    ServiceUnavailable(String),
}

/// 本地解码端口（JWT 声明直接读取，不出网）
pub trait TokenDecoder: Send + Sync {
    fn decode(&self, token: &str) -> Result<Identity, IdentityError>;
}

/// 远程身份服务端口
#[async_trait]
pub trait IdentityClient: Send + Sync {
    async fn resolve(&self, token: &str) -> Result<Identity, IdentityError>;
}

#[derive(Debug, Clone)]
pub struct IdentityCacheConfig {
    pub ttl: Duration,
    pub sweep_threshold: usize,
}

impl Default for IdentityCacheConfig {
    fn default() -> Self {
        Self {
            ttl: Duration::from_secs(300),
            sweep_threshold: 1024,
        }
    }
}

struct CacheEntry {
    identity: Identity,
    cached_at: Instant,
}

pub struct IdentityResolver {
    cache: RwLock<HashMap<String, CacheEntry>>,
    decoder: Arc<dyn TokenDecoder>,
    client: Arc<dyn IdentityClient>,
    config: IdentityCacheConfig,
}

impl IdentityResolver {
    pub fn new(
        decoder: Arc<dyn TokenDecoder>,
        client: Arc<dyn IdentityClient>,
        config: IdentityCacheConfig,
    ) -> Self {
        Self {
            cache: RwLock::new(HashMap::new()),
            decoder,
            client,
            config,
        }
    }

    pub async fn resolve(&self, token: &str) -> Result<Identity, ApplicationError> {
        let token = strip_bearer(token);
        if token.is_empty() {
            return Err(ApplicationError::Authentication);
        }
        let fingerprint = fingerprint(token);

        if let Some(identity) = self.lookup(&fingerprint) {
            return Ok(identity);
        }

        let identity = match self.decoder.decode(token) {
            Ok(identity) => identity,
            Err(err) => {
                debug!(error = %err, "本地解码失败，回退远程身份服务");
                self.client.resolve(token).await.map_err(|err| {
                    warn!(error = %err, "远程身份解析失败");
                    ApplicationError::Authentication
                })?
            }
        };

        self.store(fingerprint, identity.clone());
        Ok(identity)
    }

    fn lookup(&self, fingerprint: &str) -> Option<Identity> {
        let guard = self.cache.read().unwrap_or_else(PoisonError::into_inner);
        let entry = guard.get(fingerprint)?;
        if entry.cached_at.elapsed() >= self.config.ttl {
            return None;
        }
        Some(entry.identity.clone())
    }

    fn store(&self, fingerprint: String, identity: Identity) {
        let mut guard = self.cache.write().unwrap_or_else(PoisonError::into_inner);
        guard.insert(
            fingerprint,
            CacheEntry {
                identity,
                cached_at: Instant::now(),
            },
        );
        if guard.len() > self.config.sweep_threshold {
            let before = guard.len();
            let ttl = self.config.ttl;
            guard.retain(|_, entry| entry.cached_at.elapsed() < ttl);
            debug!(before, after = guard.len(), "身份缓存已清扫过期条目");
        }
    }

    pub fn cached_entries(&self) -> usize {
        self.cache
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

fn strip_bearer(token: &str) -> &str {
    token
        .strip_prefix("Bearer ")
        .unwrap_or(token)
        .trim()
}

fn fingerprint(token: &str) -> String {
    HEXLOWER.encode(digest(&SHA256, token.as_bytes()).as_ref())
}
