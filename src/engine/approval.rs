// ==========================================
// 工程成本修订台账系统 - 修订人工决策引擎
// ==========================================
// 职责: 对 WAITING 修订落人工终态 (APPROVED / REJECTED):
// - 决策时重新评估超额费用闸门, 采购经理批准受闸门约束;
// - 批准: 修订值写入行值, 首次认可建立快照基线;
// - 驳回: 若目标项从此不再占预算 (从未被认可的追加项),
//   腾出的预算级联释放给后序 WAITING 兄弟修订
// 红线: WAITING -> APPROVED/REJECTED 是唯一人工路径, 终态不可逆
// ==========================================

use std::sync::{Arc, Mutex};

use rusqlite::Connection;
use serde::Serialize;
use tracing::{info, warn};

use crate::domain::types::{Actor, ApprovalDecision, ModificationStatus};
use crate::engine::authority::{actor_can_decide, DecideContext};
use crate::engine::error::{LedgerError, LedgerResult};
use crate::engine::extra_fee_gate::{ExtraFeeGate, GateCheck};
use crate::engine::reallocator::{apply_freed_transitions, walk_children};
use crate::repository::cost_item_repo::CostItemRepository;
use crate::repository::cost_modification_repo::CostModificationRepository;
use crate::repository::error::RepositoryError;
use crate::repository::project_repo::ProjectRepository;
use crate::repository::uow::LedgerUow;

// ==========================================
// DecisionReport - 决策结果
// ==========================================
#[derive(Debug, Clone, Serialize)]
pub struct DecisionReport {
    pub modification_id: i64,
    pub cost_item_id: i64,
    pub status: ModificationStatus,
    pub freed_modification_ids: Vec<i64>, // 驳回级联释放的兄弟修订
    pub gate: Option<GateCheck>,          // 批准路径的闸门评估
}

// ==========================================
// ApprovalEngine
// ==========================================
pub struct ApprovalEngine {
    conn: Arc<Mutex<Connection>>,
    gate: ExtraFeeGate,
}

impl ApprovalEngine {
    pub fn new(conn: Arc<Mutex<Connection>>, gate: ExtraFeeGate) -> Self {
        Self { conn, gate }
    }

    /// 对一条 WAITING 修订落人工决策
    ///
    /// 事务边界: 决策写入与级联释放在同一工作单元内, 任一失败整体回滚。
    pub fn decide(
        &self,
        modification_id: i64,
        actor: &Actor,
        decision: ApprovalDecision,
    ) -> LedgerResult<DecisionReport> {
        let mut guard = self
            .conn
            .lock()
            .map_err(|e| LedgerError::Transaction(RepositoryError::LockError(e.to_string())))?;
        let uow = LedgerUow::begin(&mut guard)?;

        match self.decide_in(uow.conn(), modification_id, actor, decision) {
            Ok(report) => {
                uow.commit()?;
                Ok(report)
            }
            Err(err) => {
                if let Err(rb) = uow.rollback() {
                    warn!(error = %rb, "决策回滚失败");
                }
                Err(err)
            }
        }
    }

    fn decide_in(
        &self,
        conn: &Connection,
        modification_id: i64,
        actor: &Actor,
        decision: ApprovalDecision,
    ) -> LedgerResult<DecisionReport> {
        let modification = CostModificationRepository::get_in(conn, modification_id)?;
        if modification.status != ModificationStatus::Waiting {
            return Err(LedgerError::Conflict(format!(
                "修订{}当前状态为{}, 仅 WAITING 可人工决策",
                modification_id, modification.status
            )));
        }

        let item = CostItemRepository::get_in(conn, modification.cost_item_id)?;
        let project = ProjectRepository::get_in(conn, &item.project_id)?;
        if !project.is_quotation_locked() {
            return Err(LedgerError::Validation(
                "项目报价尚未锁定, 修订台账不应有待审记录".to_string(),
            ));
        }

        // 决策时重评闸门: 请求创建后项目认可成本可能已漂移
        let gate = if decision == ApprovalDecision::Approve {
            Some(self.gate.evaluate_change(
                conn,
                &project,
                item.recognized_total(),
                modification.new_total(),
            )?)
        } else {
            None
        };

        let ctx = DecideContext {
            decision,
            cap_exceeded: gate.map(|g| g.exceeded).unwrap_or(false),
        };
        actor_can_decide(actor.role, &ctx)?;

        let status = match decision {
            ApprovalDecision::Approve => ModificationStatus::Approved,
            ApprovalDecision::Reject => ModificationStatus::Rejected,
        };
        CostModificationRepository::decide_in(conn, modification_id, status, &actor.user_id)?;

        let mut freed = Vec::new();
        match decision {
            ApprovalDecision::Approve => {
                // 修订值落为当前行值; 首次认可以修订前行值建立快照基线
                CostItemRepository::update_values_in(
                    conn,
                    item.cost_item_id,
                    modification.new_amount,
                    modification.new_price,
                )?;
                if item.never_accepted() {
                    CostItemRepository::update_backup_in(
                        conn,
                        item.cost_item_id,
                        item.amount,
                        item.price,
                    )?;
                }
                if let Some(parent_id) = item.parent_id {
                    let parent = CostItemRepository::get_in(conn, parent_id)?;
                    if !parent.is_parent {
                        CostItemRepository::set_is_parent_in(conn, parent_id, true)?;
                    }
                }
            }
            ApprovalDecision::Reject => {
                // 被驳回且从未被认可的追加项不再占预算,
                // 重走兄弟序列, 把腾出的预算释放给后序 WAITING 修订
                if item.never_accepted() {
                    if let Some(parent_id) = item.parent_id {
                        let parent = CostItemRepository::get_in(conn, parent_id)?;
                        let budget = parent.baseline_budget();
                        let children =
                            CostItemRepository::find_children_in(conn, parent_id)?;
                        let walk = walk_children(conn, &children, budget, None, None)?;
                        freed = apply_freed_transitions(conn, &walk.freed)?;
                    }
                }
            }
        }

        info!(
            modification_id,
            cost_item_id = item.cost_item_id,
            decided_by = %actor.user_id,
            status = %status,
            freed_count = freed.len(),
            "修订人工决策完成"
        );

        Ok(DecisionReport {
            modification_id,
            cost_item_id: item.cost_item_id,
            status,
            freed_modification_ids: freed,
            gate,
        })
    }
}
