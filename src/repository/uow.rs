// ==========================================
// 工程成本修订台账系统 - 工作单元 (Unit of Work)
// ==========================================
// 职责: 把一次台账操作的全部读写绑定在同一个显式事务里,
//       原子性边界在每个调用点可见
// 约定: 仓储的 *_in 关联函数接收 uow.conn(), 绝不自行开事务;
//       提交是唯一对外可见的排序点, 任何一步失败整体回滚
// ==========================================

use rusqlite::{Connection, Transaction};

use crate::repository::error::{RepositoryError, RepositoryResult};

/// 台账工作单元
///
/// 包装一个 rusqlite 事务; drop 时未提交则自动回滚
/// (rusqlite 事务的默认行为), 也可显式 rollback 以表达意图。
pub struct LedgerUow<'c> {
    tx: Transaction<'c>,
}

impl<'c> LedgerUow<'c> {
    /// 在给定连接上开启工作单元
    pub fn begin(conn: &'c mut Connection) -> RepositoryResult<Self> {
        let tx = conn
            .transaction()
            .map_err(|e| RepositoryError::DatabaseTransactionError(e.to_string()))?;
        Ok(Self { tx })
    }

    /// 事务内连接 (Transaction 解引用为 Connection)
    pub fn conn(&self) -> &Connection {
        &self.tx
    }

    /// 提交
    pub fn commit(self) -> RepositoryResult<()> {
        self.tx
            .commit()
            .map_err(|e| RepositoryError::DatabaseTransactionError(e.to_string()))
    }

    /// 显式回滚
    pub fn rollback(self) -> RepositoryResult<()> {
        self.tx
            .rollback()
            .map_err(|e| RepositoryError::DatabaseTransactionError(e.to_string()))
    }
}
