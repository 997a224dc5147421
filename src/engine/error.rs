// ==========================================
// 工程成本修订台账系统 - 台账引擎错误类型
// ==========================================
// 分类:
// - Validation / Conflict / Permission / Capacity: 业务拒绝,
//   API 层转成 {status:false, reason} 的类型化结果返回给调用方
// - NotFound / Transaction: 数据缺失或存储故障, 作为错误抛出
// 约定: 多步台账操作中任何失败都先显式回滚在途事务再向外传播
// ==========================================

use thiserror::Error;

use crate::repository::error::RepositoryError;

/// 台账引擎错误类型
#[derive(Error, Debug)]
pub enum LedgerError {
    #[error("输入校验失败: {0}")]
    Validation(String),

    #[error("状态冲突: {0}")]
    Conflict(String),

    #[error("权限不足: {0}")]
    Permission(String),

    #[error("超额费用上限: {0}")]
    Capacity(String),

    #[error("记录未找到: {entity} with id={id}")]
    NotFound { entity: String, id: String },

    #[error("存储失败: {0}")]
    Transaction(RepositoryError),
}

impl LedgerError {
    /// 是否属于业务拒绝 (应以类型化结果而非抛错返回)
    pub fn is_refusal(&self) -> bool {
        matches!(
            self,
            LedgerError::Validation(_)
                | LedgerError::Conflict(_)
                | LedgerError::Permission(_)
                | LedgerError::Capacity(_)
        )
    }
}

impl From<RepositoryError> for LedgerError {
    fn from(err: RepositoryError) -> Self {
        match err {
            RepositoryError::NotFound { entity, id } => LedgerError::NotFound { entity, id },
            RepositoryError::ValidationError(msg) => LedgerError::Validation(msg),
            RepositoryError::BusinessRuleViolation(msg) => LedgerError::Conflict(msg),
            other => LedgerError::Transaction(other),
        }
    }
}

/// Result 类型别名
pub type LedgerResult<T> = Result<T, LedgerError>;
