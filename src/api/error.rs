// ==========================================
// 工程成本修订台账系统 - API层错误与类型化拒绝
// ==========================================
// 职责: 把 Repository/Engine 错误转换为用户可读的错误消息;
//       业务拒绝 (校验/冲突/权限/超限) 不作为错误抛出,
//       而是以 ApiOutcome { status:false, refusal } 返回给调用方
// ==========================================

use serde::Serialize;
use thiserror::Error;

use crate::engine::error::LedgerError;
use crate::repository::error::RepositoryError;

/// API层错误类型 (基础设施与数据故障)
#[derive(Error, Debug)]
pub enum ApiError {
    #[error("无效输入: {0}")]
    InvalidInput(String),

    #[error("资源未找到: {0}")]
    NotFound(String),

    #[error("数据库错误: {0}")]
    DatabaseError(String),

    #[error("数据库连接失败: {0}")]
    DatabaseConnectionError(String),

    #[error("数据库事务失败: {0}")]
    DatabaseTransactionError(String),

    #[error("内部错误: {0}")]
    InternalError(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

// ==========================================
// 从 RepositoryError 转换
// ==========================================
impl From<RepositoryError> for ApiError {
    fn from(err: RepositoryError) -> Self {
        match err {
            RepositoryError::NotFound { entity, id } => {
                ApiError::NotFound(format!("{}(id={})不存在", entity, id))
            }
            RepositoryError::DatabaseConnectionError(msg) => ApiError::DatabaseConnectionError(msg),
            RepositoryError::LockError(msg) => {
                ApiError::DatabaseConnectionError(format!("数据库锁获取失败: {}", msg))
            }
            RepositoryError::DatabaseTransactionError(msg) => {
                ApiError::DatabaseTransactionError(msg)
            }
            RepositoryError::DatabaseQueryError(msg) => ApiError::DatabaseError(msg),
            RepositoryError::UniqueConstraintViolation(msg) => {
                ApiError::InvalidInput(format!("唯一约束违反: {}", msg))
            }
            RepositoryError::ForeignKeyViolation(msg) => {
                ApiError::InvalidInput(format!("外键约束违反: {}", msg))
            }
            RepositoryError::BusinessRuleViolation(msg) => ApiError::InvalidInput(msg),
            RepositoryError::ValidationError(msg) => ApiError::InvalidInput(msg),
            RepositoryError::InternalError(msg) => ApiError::InternalError(msg),
            RepositoryError::Other(err) => ApiError::Other(err),
        }
    }
}

/// API Result 类型别名
pub type ApiResult<T> = Result<T, ApiError>;

// ==========================================
// 类型化拒绝 (Refusal)
// ==========================================
// 红线: 业务拒绝必须带显式原因返回前端, 不允许裸错误字符串

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RefusalKind {
    Validation, // 输入校验失败
    Conflict,   // 状态冲突
    Permission, // 权限不足
    Capacity,   // 超额费用上限
}

#[derive(Debug, Clone, Serialize)]
pub struct Refusal {
    pub kind: RefusalKind,
    pub reason: String,
}

/// API 调用结果: 接受 (带数据) 或拒绝 (带类型化原因)
#[derive(Debug, Clone, Serialize)]
pub struct ApiOutcome<T> {
    pub status: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub refusal: Option<Refusal>,
}

impl<T> ApiOutcome<T> {
    pub fn accepted(data: T) -> Self {
        Self {
            status: true,
            data: Some(data),
            refusal: None,
        }
    }

    pub fn refused(kind: RefusalKind, reason: impl Into<String>) -> Self {
        Self {
            status: false,
            data: None,
            refusal: Some(Refusal {
                kind,
                reason: reason.into(),
            }),
        }
    }

    pub fn is_accepted(&self) -> bool {
        self.status
    }
}

/// 把引擎结果折叠为 API 结果: 业务拒绝转 Refusal, 故障上抛
pub fn fold_ledger<T>(result: Result<T, LedgerError>) -> ApiResult<ApiOutcome<T>> {
    match result {
        Ok(data) => Ok(ApiOutcome::accepted(data)),
        Err(err) if err.is_refusal() => {
            let kind = match err {
                LedgerError::Validation(_) => RefusalKind::Validation,
                LedgerError::Conflict(_) => RefusalKind::Conflict,
                LedgerError::Permission(_) => RefusalKind::Permission,
                LedgerError::Capacity(_) => RefusalKind::Capacity,
                _ => RefusalKind::Validation,
            };
            Ok(ApiOutcome::refused(kind, err.to_string()))
        }
        Err(LedgerError::NotFound { entity, id }) => {
            Err(ApiError::NotFound(format!("{}(id={})不存在", entity, id)))
        }
        Err(LedgerError::Transaction(repo_err)) => Err(repo_err.into()),
        Err(other) => Err(ApiError::InternalError(other.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fold_refusal_is_not_an_error() {
        let result: Result<(), LedgerError> =
            Err(LedgerError::Permission("无决策权".to_string()));
        let outcome = fold_ledger(result).unwrap();
        assert!(!outcome.is_accepted());
        assert_eq!(outcome.refusal.unwrap().kind, RefusalKind::Permission);
    }

    #[test]
    fn test_fold_not_found_is_an_error() {
        let result: Result<(), LedgerError> = Err(LedgerError::NotFound {
            entity: "CostItem".to_string(),
            id: "9".to_string(),
        });
        assert!(fold_ledger(result).is_err());
    }

    #[test]
    fn test_refusal_serializes_with_status_false() {
        let outcome: ApiOutcome<()> = ApiOutcome::refused(RefusalKind::Capacity, "超限");
        let json = serde_json::to_value(&outcome).unwrap();
        assert_eq!(json["status"], false);
        assert_eq!(json["refusal"]["kind"], "CAPACITY");
    }
}
