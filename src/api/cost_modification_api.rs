// ==========================================
// 工程成本修订台账系统 - 成本修订 API
// ==========================================
// 职责: 待审修订的人工决策入口与修订台账查询
// ==========================================

use std::sync::Arc;

use tracing::debug;

use crate::api::error::{fold_ledger, ApiOutcome, ApiResult};
use crate::domain::cost_modification::{CostModification, ModificationFilter};
use crate::domain::types::{Actor, ApprovalDecision};
use crate::engine::approval::{ApprovalEngine, DecisionReport};
use crate::repository::cost_modification_repo::CostModificationRepository;

pub struct CostModificationApi {
    approval_engine: Arc<ApprovalEngine>,
    modification_repo: Arc<CostModificationRepository>,
}

impl CostModificationApi {
    pub fn new(
        approval_engine: Arc<ApprovalEngine>,
        modification_repo: Arc<CostModificationRepository>,
    ) -> Self {
        Self {
            approval_engine,
            modification_repo,
        }
    }

    /// 对一条 WAITING 修订落人工决策
    pub fn decide(
        &self,
        actor: &Actor,
        modification_id: i64,
        decision: ApprovalDecision,
    ) -> ApiResult<ApiOutcome<DecisionReport>> {
        debug!(
            user_id = %actor.user_id,
            modification_id,
            decision = %decision,
            "修订人工决策请求"
        );
        fold_ledger(self.approval_engine.decide(modification_id, actor, decision))
    }

    // ==========================================
    // 查询接口
    // ==========================================

    pub fn get_modification(&self, modification_id: i64) -> ApiResult<Option<CostModification>> {
        Ok(self.modification_repo.find_by_id(modification_id)?)
    }

    /// 修订台账列表 (审计视图)
    pub fn list_modifications(
        &self,
        filter: &ModificationFilter,
    ) -> ApiResult<Vec<CostModification>> {
        Ok(self.modification_repo.find_by_filter(filter)?)
    }
}
