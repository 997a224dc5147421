// ==========================================
// 工程成本修订台账系统 - 角色授权
// ==========================================
// 红线: 修订决策的授权规则只在这里表达一次,
//       采购经理受超额费用闸门约束, 总经理不受
// ==========================================

use crate::domain::types::{ApprovalDecision, Role};
use crate::engine::error::{LedgerError, LedgerResult};

// ==========================================
// DecideContext - 决策上下文
// ==========================================
// 决策时重新评估闸门: 请求创建与人工决策之间状态可能已漂移
#[derive(Debug, Clone, Copy)]
pub struct DecideContext {
    pub decision: ApprovalDecision,
    pub cap_exceeded: bool, // 批准后是否突破项目超额费用上限
}

/// 角色能否对成本修订落人工决策
///
/// 规则:
/// - 总经理: 始终可决策;
/// - 采购经理: 可决策, 但批准会突破超额费用上限时被闸门拦下;
/// - 其余角色: 无决策权。
pub fn actor_can_decide(role: Role, ctx: &DecideContext) -> LedgerResult<()> {
    match role {
        Role::ChiefExecutive => Ok(()),
        Role::ProcurementManager => {
            if ctx.decision == ApprovalDecision::Approve && ctx.cap_exceeded {
                Err(LedgerError::Capacity(
                    "批准该修订将突破项目超额费用上限, 需总经理决策".to_string(),
                ))
            } else {
                Ok(())
            }
        }
        _ => Err(LedgerError::Permission(format!(
            "角色{}无成本修订决策权",
            role
        ))),
    }
}

/// 角色能否维护成本项 (创建/修改/删除追加成本)
pub fn actor_can_manage_cost_items(role: Role) -> LedgerResult<()> {
    match role {
        Role::ChiefExecutive
        | Role::ProcurementManager
        | Role::QuantitySurveyor
        | Role::ProjectManager => Ok(()),
        Role::Accountant => Err(LedgerError::Permission(
            "会计角色无成本项维护权".to_string(),
        )),
    }
}
