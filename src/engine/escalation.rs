// ==========================================
// 工程成本修订台账系统 - 采购单/变更单升级审批引擎
// ==========================================
// 职责: 两类单据共用一套名册审批骨架, 差异收敛在策略对象里:
// - 采购单 (PO): 配置化的经理链逐席表态, 单据合计行值达到
//   项目 max_po_price 时名册升级追加总经理席位;
// - 变更单 (VO): 固定名册, 总经理一票定论, 无总经理席位时
//   须全员一致
// 红线: 重新提交时名册整册删除重建, 上一轮表态不得进入新一轮
// ==========================================

use std::sync::{Arc, Mutex};

use rusqlite::Connection;
use serde::Serialize;
use tracing::{info, warn};

use crate::config::config_manager::ConfigManager;
use crate::domain::approval::Approver;
use crate::domain::types::{
    Actor, ApprovalDecision, ApprovalEntityKind, ApprovalStatus, ApproverStatus, Role,
};
use crate::engine::error::{LedgerError, LedgerResult};
use crate::engine::extra_fee_gate::VALUE_EPSILON;
use crate::repository::cost_item_repo::CostItemRepository;
use crate::repository::approver_repo::ApproverRepository;
use crate::repository::error::RepositoryError;
use crate::repository::order_repo::{PurchaseOrderRepository, VariationOrderRepository};
use crate::repository::project_repo::ProjectRepository;
use crate::repository::uow::LedgerUow;

// ==========================================
// QuorumOutcome - 名册整体裁定
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum QuorumOutcome {
    Pending,  // 尚未定论
    Approved, // 通过
    Rejected, // 驳回
}

// ==========================================
// EscalationPolicy - 单据审批策略
// ==========================================
pub trait EscalationPolicy {
    fn kind(&self) -> ApprovalEntityKind;

    /// 构建本轮名册的角色席位 (按表态顺序)
    fn build_roster(&self, conn: &Connection, entity_id: &str) -> LedgerResult<Vec<Role>>;

    /// 对当前名册表态求整体裁定 (纯函数)
    fn evaluate(&self, roster: &[Approver]) -> QuorumOutcome;
}

// ==========================================
// PoPolicy - 采购单: 经理链 + 金额阈值升级
// ==========================================
pub struct PoPolicy;

impl EscalationPolicy for PoPolicy {
    fn kind(&self) -> ApprovalEntityKind {
        ApprovalEntityKind::PurchaseOrder
    }

    fn build_roster(&self, conn: &Connection, entity_id: &str) -> LedgerResult<Vec<Role>> {
        let po = PurchaseOrderRepository::get_in(conn, entity_id)?;
        let project = ProjectRepository::get_in(conn, &po.project_id)?;
        let total = CostItemRepository::sum_po_cost_in(conn, entity_id)?;

        let mut roster = ConfigManager::po_manager_chain_in(conn)?;

        // 合计行值达到项目采购上限时升级追加总经理席位
        if project.max_po_price > 0.0 && total + VALUE_EPSILON >= project.max_po_price {
            if !roster.contains(&Role::ChiefExecutive) {
                roster.push(Role::ChiefExecutive);
            }
            info!(
                po_id = entity_id,
                total,
                max_po_price = project.max_po_price,
                "采购单金额超限, 审批升级至总经理"
            );
        }
        Ok(roster)
    }

    /// 任一席位驳回即整单驳回, 全部同意方为通过
    fn evaluate(&self, roster: &[Approver]) -> QuorumOutcome {
        if roster
            .iter()
            .any(|a| a.status == ApproverStatus::Rejected)
        {
            return QuorumOutcome::Rejected;
        }
        if !roster.is_empty()
            && roster.iter().all(|a| a.status == ApproverStatus::Approved)
        {
            return QuorumOutcome::Approved;
        }
        QuorumOutcome::Pending
    }
}

// ==========================================
// VoPolicy - 变更单: 总经理一票定论
// ==========================================
pub struct VoPolicy;

impl EscalationPolicy for VoPolicy {
    fn kind(&self) -> ApprovalEntityKind {
        ApprovalEntityKind::VariationOrder
    }

    fn build_roster(&self, conn: &Connection, _entity_id: &str) -> LedgerResult<Vec<Role>> {
        Ok(ConfigManager::vo_roles_in(conn)?)
    }

    /// 裁定规则:
    /// - 名册含总经理席位: 总经理同意即通过, 总经理驳回即驳回;
    ///   其余席位全部同意也可通过; 有人驳回但总经理未表态时悬置;
    /// - 名册无总经理席位: 须全员一致, 任一驳回即驳回。
    fn evaluate(&self, roster: &[Approver]) -> QuorumOutcome {
        let ceo = roster
            .iter()
            .find(|a| a.role == Role::ChiefExecutive);

        match ceo {
            Some(seat) => match seat.status {
                ApproverStatus::Approved => QuorumOutcome::Approved,
                ApproverStatus::Rejected => QuorumOutcome::Rejected,
                ApproverStatus::Waiting => {
                    let others: Vec<_> = roster
                        .iter()
                        .filter(|a| a.role != Role::ChiefExecutive)
                        .collect();
                    if !others.is_empty()
                        && others.iter().all(|a| a.status == ApproverStatus::Approved)
                    {
                        QuorumOutcome::Approved
                    } else {
                        QuorumOutcome::Pending
                    }
                }
            },
            None => {
                if roster
                    .iter()
                    .any(|a| a.status == ApproverStatus::Rejected)
                {
                    QuorumOutcome::Rejected
                } else if !roster.is_empty()
                    && roster.iter().all(|a| a.status == ApproverStatus::Approved)
                {
                    QuorumOutcome::Approved
                } else {
                    QuorumOutcome::Pending
                }
            }
        }
    }
}

// ==========================================
// EscalationReport - 一次表态后的单据状态
// ==========================================
#[derive(Debug, Clone, Serialize)]
pub struct EscalationReport {
    pub entity_kind: ApprovalEntityKind,
    pub entity_id: String,
    pub outcome: QuorumOutcome,
    pub status: ApprovalStatus,
}

// ==========================================
// EscalationEngine
// ==========================================
pub struct EscalationEngine {
    conn: Arc<Mutex<Connection>>,
}

impl EscalationEngine {
    pub fn new(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    fn policy_for(kind: ApprovalEntityKind) -> Box<dyn EscalationPolicy> {
        match kind {
            ApprovalEntityKind::PurchaseOrder => Box::new(PoPolicy),
            ApprovalEntityKind::VariationOrder => Box::new(VoPolicy),
        }
    }

    /// 提交单据进入审批: 名册整册重建, 单据转 WAITING_APPROVAL
    ///
    /// 允许从 PROCESSING 首次提交, 或从 REJECTED 修改后重新提交。
    pub fn submit(
        &self,
        kind: ApprovalEntityKind,
        entity_id: &str,
    ) -> LedgerResult<Vec<Role>> {
        let mut guard = self
            .conn
            .lock()
            .map_err(|e| LedgerError::Transaction(RepositoryError::LockError(e.to_string())))?;
        let uow = LedgerUow::begin(&mut guard)?;

        match Self::submit_in(uow.conn(), kind, entity_id) {
            Ok(roster) => {
                uow.commit()?;
                Ok(roster)
            }
            Err(err) => {
                if let Err(rb) = uow.rollback() {
                    warn!(error = %rb, "提交审批回滚失败");
                }
                Err(err)
            }
        }
    }

    fn submit_in(
        conn: &Connection,
        kind: ApprovalEntityKind,
        entity_id: &str,
    ) -> LedgerResult<Vec<Role>> {
        let status = Self::load_status_in(conn, kind, entity_id)?;
        match status {
            ApprovalStatus::Processing | ApprovalStatus::Rejected => {}
            other => {
                return Err(LedgerError::Conflict(format!(
                    "{}当前状态为{}, 不能提交审批",
                    kind, other
                )));
            }
        }

        let policy = Self::policy_for(kind);
        let roster = policy.build_roster(conn, entity_id)?;

        ApproverRepository::delete_roster_in(conn, kind, entity_id)?;
        ApproverRepository::insert_roster_in(conn, kind, entity_id, &roster)?;
        Self::update_status_in(conn, kind, entity_id, ApprovalStatus::WaitingApproval)?;

        info!(kind = %kind, entity_id, seats = roster.len(), "单据提交审批");
        Ok(roster)
    }

    /// 作废单据 (已通过的单据不可作废)
    pub fn cancel(
        &self,
        kind: ApprovalEntityKind,
        entity_id: &str,
    ) -> LedgerResult<ApprovalStatus> {
        let mut guard = self
            .conn
            .lock()
            .map_err(|e| LedgerError::Transaction(RepositoryError::LockError(e.to_string())))?;
        let uow = LedgerUow::begin(&mut guard)?;

        let result = (|| -> LedgerResult<ApprovalStatus> {
            let status = Self::load_status_in(uow.conn(), kind, entity_id)?;
            match status {
                ApprovalStatus::Approved | ApprovalStatus::Cancelled => {
                    return Err(LedgerError::Conflict(format!(
                        "{}当前状态为{}, 不能作废",
                        kind, status
                    )));
                }
                _ => {}
            }
            Self::update_status_in(uow.conn(), kind, entity_id, ApprovalStatus::Cancelled)?;
            Ok(ApprovalStatus::Cancelled)
        })();

        match result {
            Ok(status) => {
                uow.commit()?;
                info!(kind = %kind, entity_id, "单据作废");
                Ok(status)
            }
            Err(err) => {
                if let Err(rb) = uow.rollback() {
                    warn!(error = %rb, "单据作废回滚失败");
                }
                Err(err)
            }
        }
    }

    /// 以当前请求主体的角色落一次表态, 并对名册求整体裁定
    pub fn record_decision(
        &self,
        kind: ApprovalEntityKind,
        entity_id: &str,
        actor: &Actor,
        decision: ApprovalDecision,
    ) -> LedgerResult<EscalationReport> {
        let mut guard = self
            .conn
            .lock()
            .map_err(|e| LedgerError::Transaction(RepositoryError::LockError(e.to_string())))?;
        let uow = LedgerUow::begin(&mut guard)?;

        match Self::record_decision_in(uow.conn(), kind, entity_id, actor, decision) {
            Ok(report) => {
                uow.commit()?;
                Ok(report)
            }
            Err(err) => {
                if let Err(rb) = uow.rollback() {
                    warn!(error = %rb, "审批表态回滚失败");
                }
                Err(err)
            }
        }
    }

    fn record_decision_in(
        conn: &Connection,
        kind: ApprovalEntityKind,
        entity_id: &str,
        actor: &Actor,
        decision: ApprovalDecision,
    ) -> LedgerResult<EscalationReport> {
        let status = Self::load_status_in(conn, kind, entity_id)?;
        if status != ApprovalStatus::WaitingApproval {
            return Err(LedgerError::Conflict(format!(
                "{}当前状态为{}, 不在审批中",
                kind, status
            )));
        }

        let seat = ApproverRepository::find_pending_seat_in(conn, kind, entity_id, actor.role)?
            .ok_or_else(|| {
                LedgerError::Permission(format!(
                    "角色{}在{}名册中没有待表态席位",
                    actor.role, entity_id
                ))
            })?;

        let seat_status = match decision {
            ApprovalDecision::Approve => ApproverStatus::Approved,
            ApprovalDecision::Reject => ApproverStatus::Rejected,
        };
        ApproverRepository::record_decision_in(conn, seat.approver_id, &actor.user_id, seat_status)?;

        let policy = Self::policy_for(kind);
        let roster = ApproverRepository::find_roster_in(conn, kind, entity_id)?;
        let outcome = policy.evaluate(&roster);

        let new_status = match outcome {
            QuorumOutcome::Approved => {
                Self::update_status_in(conn, kind, entity_id, ApprovalStatus::Approved)?;
                ApprovalStatus::Approved
            }
            QuorumOutcome::Rejected => {
                Self::update_status_in(conn, kind, entity_id, ApprovalStatus::Rejected)?;
                ApprovalStatus::Rejected
            }
            QuorumOutcome::Pending => ApprovalStatus::WaitingApproval,
        };

        info!(
            kind = %kind,
            entity_id,
            decided_by = %actor.user_id,
            role = %actor.role,
            decision = %decision,
            outcome = ?outcome,
            "审批表态落库"
        );

        Ok(EscalationReport {
            entity_kind: kind,
            entity_id: entity_id.to_string(),
            outcome,
            status: new_status,
        })
    }

    fn load_status_in(
        conn: &Connection,
        kind: ApprovalEntityKind,
        entity_id: &str,
    ) -> LedgerResult<ApprovalStatus> {
        let status = match kind {
            ApprovalEntityKind::PurchaseOrder => {
                PurchaseOrderRepository::get_in(conn, entity_id)?.status
            }
            ApprovalEntityKind::VariationOrder => {
                VariationOrderRepository::get_in(conn, entity_id)?.status
            }
        };
        Ok(status)
    }

    fn update_status_in(
        conn: &Connection,
        kind: ApprovalEntityKind,
        entity_id: &str,
        status: ApprovalStatus,
    ) -> LedgerResult<()> {
        match kind {
            ApprovalEntityKind::PurchaseOrder => {
                PurchaseOrderRepository::update_status_in(conn, entity_id, status)?
            }
            ApprovalEntityKind::VariationOrder => {
                VariationOrderRepository::update_status_in(conn, entity_id, status)?
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seat(role: Role, status: ApproverStatus) -> Approver {
        Approver {
            approver_id: 0,
            entity_kind: ApprovalEntityKind::VariationOrder,
            entity_id: "vo-1".to_string(),
            role,
            user_id: None,
            status,
            decided_at: None,
        }
    }

    #[test]
    fn test_po_all_approved() {
        let roster = vec![
            seat(Role::ProcurementManager, ApproverStatus::Approved),
            seat(Role::ChiefExecutive, ApproverStatus::Approved),
        ];
        assert_eq!(PoPolicy.evaluate(&roster), QuorumOutcome::Approved);
    }

    #[test]
    fn test_po_single_rejection_sinks_order() {
        let roster = vec![
            seat(Role::ProcurementManager, ApproverStatus::Rejected),
            seat(Role::ChiefExecutive, ApproverStatus::Waiting),
        ];
        assert_eq!(PoPolicy.evaluate(&roster), QuorumOutcome::Rejected);
    }

    #[test]
    fn test_vo_ceo_approval_is_decisive() {
        // 其余席位未表态甚至驳回, 总经理同意即通过
        let roster = vec![
            seat(Role::ProjectManager, ApproverStatus::Rejected),
            seat(Role::ChiefExecutive, ApproverStatus::Approved),
        ];
        assert_eq!(VoPolicy.evaluate(&roster), QuorumOutcome::Approved);
    }

    #[test]
    fn test_vo_ceo_rejection_is_decisive() {
        let roster = vec![
            seat(Role::ProjectManager, ApproverStatus::Approved),
            seat(Role::QuantitySurveyor, ApproverStatus::Approved),
            seat(Role::ChiefExecutive, ApproverStatus::Rejected),
        ];
        assert_eq!(VoPolicy.evaluate(&roster), QuorumOutcome::Rejected);
    }

    #[test]
    fn test_vo_unanimous_without_ceo_vote() {
        let roster = vec![
            seat(Role::ProjectManager, ApproverStatus::Approved),
            seat(Role::QuantitySurveyor, ApproverStatus::Approved),
            seat(Role::ChiefExecutive, ApproverStatus::Waiting),
        ];
        assert_eq!(VoPolicy.evaluate(&roster), QuorumOutcome::Approved);
    }

    #[test]
    fn test_vo_rejection_held_for_ceo() {
        // 有人驳回但总经理未表态, 单据悬置等总经理定论
        let roster = vec![
            seat(Role::ProjectManager, ApproverStatus::Rejected),
            seat(Role::QuantitySurveyor, ApproverStatus::Waiting),
            seat(Role::ChiefExecutive, ApproverStatus::Waiting),
        ];
        assert_eq!(VoPolicy.evaluate(&roster), QuorumOutcome::Pending);
    }

    #[test]
    fn test_vo_no_ceo_roster_requires_unanimity() {
        let roster = vec![
            seat(Role::ProjectManager, ApproverStatus::Approved),
            seat(Role::QuantitySurveyor, ApproverStatus::Rejected),
        ];
        assert_eq!(VoPolicy.evaluate(&roster), QuorumOutcome::Rejected);
    }
}
