// ==========================================
// 工程成本修订台账系统 - 工程变更单 API
// ==========================================
// 职责: 变更单建单/提交审批/表态与查询
// 说明: 变更单新增/删除的成本项通过 cost_item.vo_add_id /
//       vo_delete_id 关联, 行级落地走成本项维护流程
// ==========================================

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::debug;
use uuid::Uuid;

use crate::api::error::{fold_ledger, ApiOutcome, ApiResult};
use crate::api::validator::{validate_id, validate_title};
use crate::domain::approval::{Approver, VariationOrder};
use crate::domain::types::{Actor, ApprovalDecision, ApprovalEntityKind, ApprovalStatus, Role};
use crate::engine::escalation::{EscalationEngine, EscalationReport};
use crate::repository::approver_repo::ApproverRepository;
use crate::repository::order_repo::VariationOrderRepository;

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CreateVariationOrderRequest {
    pub project_id: String,
    pub title: String,
}

pub struct VariationOrderApi {
    vo_repo: Arc<VariationOrderRepository>,
    approver_repo: Arc<ApproverRepository>,
    escalation_engine: Arc<EscalationEngine>,
}

impl VariationOrderApi {
    pub fn new(
        vo_repo: Arc<VariationOrderRepository>,
        approver_repo: Arc<ApproverRepository>,
        escalation_engine: Arc<EscalationEngine>,
    ) -> Self {
        Self {
            vo_repo,
            approver_repo,
            escalation_engine,
        }
    }

    /// 创建变更单 (初始 PROCESSING)
    pub fn create_order(&self, req: CreateVariationOrderRequest) -> ApiResult<VariationOrder> {
        validate_id(&req.project_id, "project_id")?;
        validate_title(&req.title)?;

        let now = chrono::Utc::now().naive_utc();
        let vo = VariationOrder {
            vo_id: Uuid::new_v4().to_string(),
            project_id: req.project_id,
            title: req.title.trim().to_string(),
            status: ApprovalStatus::Processing,
            created_at: now,
            updated_at: now,
        };
        self.vo_repo.create(&vo)?;
        debug!(vo_id = %vo.vo_id, project_id = %vo.project_id, "变更单创建");
        Ok(vo)
    }

    /// 提交审批: 按配置名册重建席位
    pub fn submit(&self, vo_id: &str) -> ApiResult<ApiOutcome<Vec<Role>>> {
        validate_id(vo_id, "vo_id")?;
        fold_ledger(
            self.escalation_engine
                .submit(ApprovalEntityKind::VariationOrder, vo_id),
        )
    }

    /// 以当前角色表态 (总经理一票定论)
    pub fn decide(
        &self,
        actor: &Actor,
        vo_id: &str,
        decision: ApprovalDecision,
    ) -> ApiResult<ApiOutcome<EscalationReport>> {
        validate_id(vo_id, "vo_id")?;
        fold_ledger(self.escalation_engine.record_decision(
            ApprovalEntityKind::VariationOrder,
            vo_id,
            actor,
            decision,
        ))
    }

    /// 作废变更单
    pub fn cancel(&self, vo_id: &str) -> ApiResult<ApiOutcome<ApprovalStatus>> {
        validate_id(vo_id, "vo_id")?;
        fold_ledger(
            self.escalation_engine
                .cancel(ApprovalEntityKind::VariationOrder, vo_id),
        )
    }

    // ==========================================
    // 查询接口
    // ==========================================

    pub fn get_order(&self, vo_id: &str) -> ApiResult<Option<VariationOrder>> {
        Ok(self.vo_repo.find_by_id(vo_id)?)
    }

    pub fn get_roster(&self, vo_id: &str) -> ApiResult<Vec<Approver>> {
        Ok(self
            .approver_repo
            .find_roster(ApprovalEntityKind::VariationOrder, vo_id)?)
    }
}
