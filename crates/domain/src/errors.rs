//! 领域错误定义

use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum DomainError {
    #[error("商品不存在: {product_id}")]
    ProductNotFound { product_id: i64 },

    #[error("商品已售出: {product_id}")]
    ProductAlreadySold { product_id: i64 },

    #[error("不能购买自己发布的商品")]
    CannotPurchaseOwnProduct,

    #[error("没有权限执行操作: {action}")]
    PermissionDenied { action: String },

    #[error("字段 {field} 校验失败: {message}")]
    Validation { field: String, message: String },
}

impl DomainError {
    pub fn product_not_found(product_id: i64) -> Self {
        Self::ProductNotFound { product_id }
    }

    pub fn already_sold(product_id: i64) -> Self {
        Self::ProductAlreadySold { product_id }
    }

    pub fn permission_denied(action: impl Into<String>) -> Self {
        Self::PermissionDenied {
            action: action.into(),
        }
    }

    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Validation {
            field: field.into(),
            message: message.into(),
        }
    }
}

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("记录不存在")]
    NotFound,

    #[error("记录冲突: {0}")]
    Conflict(String),

    #[error("存储错误: {0}")]
    Storage(String),
}

impl RepositoryError {
    pub fn storage(message: impl Into<String>) -> Self {
        Self::Storage(message.into())
    }
}

pub type DomainResult<T> = Result<T, DomainError>;
pub type RepositoryResult<T> = Result<T, RepositoryError>;
