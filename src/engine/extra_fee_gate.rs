// ==========================================
// 工程成本修订台账系统 - 超额费用闸门
// ==========================================
// 职责: 把项目整体的"已认可成本增长"约束在基准成本的
//       total_extra_fee 百分比以内; 即便单个子项在父项预算内
//       能自动生效, 项目级超限也会强制其回到 WAITING
// 说明: 聚合结果是只读快照, 不加全局锁; 决策时必须重新评估,
//       因为请求创建与决策之间状态可能已漂移
// ==========================================

use std::sync::Arc;

use rusqlite::Connection;
use serde::Serialize;
use tracing::warn;

use crate::domain::project::Project;
use crate::engine::error::LedgerResult;
use crate::repository::cost_summary_repo::ProjectCostAggregator;

// ==========================================
// GateCheck - 一次闸门评估结果
// ==========================================
#[derive(Debug, Clone, Copy, Serialize)]
pub struct GateCheck {
    pub base: f64,             // 项目基准成本
    pub modified: f64,         // 当前认可成本
    pub cap: f64,              // 上限金额 = base * total_extra_fee / 100
    pub delta: f64,            // 本次变更的行值增量
    pub projected_growth: f64, // 批准后的认可增长 = modified + delta - base
    pub exceeded: bool,        // 是否突破上限
}

// ==========================================
// ExtraFeeGate
// ==========================================
pub struct ExtraFeeGate {
    aggregator: Arc<dyn ProjectCostAggregator>,
}

impl ExtraFeeGate {
    pub fn new(aggregator: Arc<dyn ProjectCostAggregator>) -> Self {
        Self { aggregator }
    }

    /// 评估一次行值变更 (old_total -> new_total) 对项目上限的影响
    ///
    /// old_total 取值规则: 该行当前计入认可成本的金额
    /// (从未被认可的追加项与全新项为 0)。
    pub fn evaluate_change(
        &self,
        conn: &Connection,
        project: &Project,
        old_total: f64,
        new_total: f64,
    ) -> LedgerResult<GateCheck> {
        let summary = self.aggregator.sum_project_cost(conn, &project.project_id)?;
        let check = check_growth(
            summary.base,
            summary.modified,
            project.total_extra_fee,
            new_total - old_total,
        );
        if check.exceeded {
            warn!(
                project_id = %project.project_id,
                cap = check.cap,
                projected_growth = check.projected_growth,
                "超额费用闸门拦截"
            );
        }
        Ok(check)
    }
}

/// 纯函数口径: 认可增长 (modified + delta - base) 超过 cap 即拦截
pub fn check_growth(base: f64, modified: f64, fee_pct: f64, delta: f64) -> GateCheck {
    let cap = base * fee_pct / 100.0;
    let projected_growth = modified + delta - base;
    GateCheck {
        base,
        modified,
        cap,
        delta,
        projected_growth,
        exceeded: projected_growth > cap + VALUE_EPSILON,
    }
}

/// 行值比较容差 (REAL 列四则运算后的等值判断)
pub const VALUE_EPSILON: f64 = 1e-6;

/// 两个行值是否视为相等
pub fn value_eq(a: f64, b: f64) -> bool {
    (a - b).abs() <= VALUE_EPSILON
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_within_cap() {
        // 基准1000, 上限5% => 50; 已认可1020, 增量20 => 增长40 <= 50
        let check = check_growth(1000.0, 1020.0, 5.0, 20.0);
        assert!(!check.exceeded);
        assert_eq!(check.cap, 50.0);
        assert_eq!(check.projected_growth, 40.0);
    }

    #[test]
    fn test_growth_over_cap_is_blocked() {
        // 基准1000, 上限5% => 50; 1030 -> 1060 必须被拦
        let check = check_growth(1000.0, 1030.0, 5.0, 30.0);
        assert!(check.exceeded);
        assert_eq!(check.projected_growth, 60.0);
    }

    #[test]
    fn test_exactly_at_cap_passes() {
        let check = check_growth(1000.0, 1030.0, 5.0, 20.0);
        assert!(!check.exceeded);
    }

    #[test]
    fn test_negative_delta_never_exceeds() {
        // 缩量修订不会突破上限
        let check = check_growth(1000.0, 1049.0, 5.0, -30.0);
        assert!(!check.exceeded);
    }

    #[test]
    fn test_value_eq_tolerance() {
        assert!(value_eq(0.1 + 0.2, 0.3));
        assert!(!value_eq(40.0, 40.1));
    }
}
