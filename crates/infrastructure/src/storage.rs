//! 本地文件存储
//!
//! 商品图片落到本地目录，文件名使用 UUID，保留原始扩展名。

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use uuid::Uuid;

use application::{FileStorage, GatewayError};

pub struct LocalFileStorage {
    root: PathBuf,
    public_base: String,
}

impl LocalFileStorage {
    pub fn new(root: impl Into<PathBuf>, public_base: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            public_base: public_base.into(),
        }
    }
}

#[async_trait]
impl FileStorage for LocalFileStorage {
    async fn store(&self, bytes: Vec<u8>, original_name: &str) -> Result<String, GatewayError> {
        let extension = Path::new(original_name)
            .extension()
            .and_then(|ext| ext.to_str())
            .unwrap_or("bin");
        let file_name = format!("{}.{}", Uuid::new_v4(), extension);

        tokio::fs::create_dir_all(&self.root)
            .await
            .map_err(|err| GatewayError(err.to_string()))?;
        tokio::fs::write(self.root.join(&file_name), bytes)
            .await
            .map_err(|err| GatewayError(err.to_string()))?;

        Ok(format!("{}/{}", self.public_base, file_name))
    }
}
