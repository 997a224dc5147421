// ==========================================
// 工程成本修订台账系统 - 项目成本汇总
// ==========================================
// 职责: 提供"项目基准成本 / 当前认可成本"聚合口径,
//       供超额费用闸门与采购单升级阈值消费
// 说明: 台账视角下聚合是只读且无副作用的黑盒;
//       结果是事务提交前的快照, 允许在提交时已经过期 (不加全局锁)
// ==========================================

use rusqlite::{params, Connection};
use serde::{Deserialize, Serialize};

use crate::repository::error::RepositoryResult;

// ==========================================
// ProjectCostSummary - 聚合结果
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ProjectCostSummary {
    pub base: f64,     // 基准成本: 非追加成本项行值合计
    pub modified: f64, // 当前认可成本: 基准 + 已认可的追加/修订成本
    pub has_po: f64,   // 认可成本中已挂采购单的部分
    pub no_po: f64,    // 认可成本中未挂采购单的部分
}

impl ProjectCostSummary {
    /// 相对基准的已认可增长
    pub fn accepted_growth(&self) -> f64 {
        self.modified - self.base
    }
}

// ==========================================
// ProjectCostAggregator - 聚合协作方接口
// ==========================================
// 台账引擎通过该 trait 消费聚合, 测试可注入假实现
pub trait ProjectCostAggregator: Send + Sync {
    fn sum_project_cost(
        &self,
        conn: &Connection,
        project_id: &str,
    ) -> RepositoryResult<ProjectCostSummary>;
}

// ==========================================
// SqlCostAggregator - SQL 实现
// ==========================================
// 口径:
// - base: is_extra = 0 的行值合计;
// - modified: is_extra = 0 或已有认可快照 (bk_price 非空) 的行值合计,
//   从未被认可的追加项 (WAITING 新建) 不计入;
// - has_po/no_po: 认可口径内按是否挂采购单拆分。
pub struct SqlCostAggregator;

impl ProjectCostAggregator for SqlCostAggregator {
    fn sum_project_cost(
        &self,
        conn: &Connection,
        project_id: &str,
    ) -> RepositoryResult<ProjectCostSummary> {
        let base: f64 = conn.query_row(
            r#"SELECT COALESCE(SUM(amount * price), 0)
               FROM cost_item
               WHERE project_id = ?1 AND is_extra = 0"#,
            params![project_id],
            |row| row.get(0),
        )?;

        let (modified, has_po): (f64, f64) = conn.query_row(
            r#"SELECT
                   COALESCE(SUM(amount * price), 0),
                   COALESCE(SUM(CASE WHEN po_id IS NOT NULL THEN amount * price ELSE 0 END), 0)
               FROM cost_item
               WHERE project_id = ?1 AND (is_extra = 0 OR bk_price IS NOT NULL)"#,
            params![project_id],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )?;

        Ok(ProjectCostSummary {
            base,
            modified,
            has_po,
            no_po: modified - has_po,
        })
    }
}
