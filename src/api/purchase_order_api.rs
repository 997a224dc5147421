// ==========================================
// 工程成本修订台账系统 - 采购单 API
// ==========================================
// 职责: 采购单建单/挂项/提交审批/表态与查询
// 说明: 挂项必须在单据进入审批前完成, 合计行值决定是否
//       升级总经理审批
// ==========================================

use std::sync::{Arc, Mutex};

use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::api::error::{fold_ledger, ApiError, ApiOutcome, ApiResult};
use crate::api::validator::{validate_id, validate_title};
use crate::domain::approval::{Approver, PurchaseOrder};
use crate::domain::types::{Actor, ApprovalDecision, ApprovalEntityKind, ApprovalStatus, Role};
use crate::engine::escalation::{EscalationEngine, EscalationReport};
use crate::repository::approver_repo::ApproverRepository;
use crate::repository::cost_item_repo::CostItemRepository;
use crate::repository::order_repo::PurchaseOrderRepository;
use crate::repository::uow::LedgerUow;

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CreatePurchaseOrderRequest {
    pub project_id: String,
    pub title: String,
    pub vendor_id: Option<String>,
}

pub struct PurchaseOrderApi {
    conn: Arc<Mutex<Connection>>,
    po_repo: Arc<PurchaseOrderRepository>,
    approver_repo: Arc<ApproverRepository>,
    escalation_engine: Arc<EscalationEngine>,
}

impl PurchaseOrderApi {
    pub fn new(
        conn: Arc<Mutex<Connection>>,
        po_repo: Arc<PurchaseOrderRepository>,
        approver_repo: Arc<ApproverRepository>,
        escalation_engine: Arc<EscalationEngine>,
    ) -> Self {
        Self {
            conn,
            po_repo,
            approver_repo,
            escalation_engine,
        }
    }

    /// 创建采购单 (初始 PROCESSING)
    pub fn create_order(&self, req: CreatePurchaseOrderRequest) -> ApiResult<PurchaseOrder> {
        validate_id(&req.project_id, "project_id")?;
        validate_title(&req.title)?;

        let now = chrono::Utc::now().naive_utc();
        let po = PurchaseOrder {
            po_id: Uuid::new_v4().to_string(),
            project_id: req.project_id,
            title: req.title.trim().to_string(),
            vendor_id: req.vendor_id,
            status: ApprovalStatus::Processing,
            created_at: now,
            updated_at: now,
        };
        self.po_repo.create(&po)?;
        debug!(po_id = %po.po_id, project_id = %po.project_id, "采购单创建");
        Ok(po)
    }

    /// 把一批成本项挂到采购单上
    ///
    /// 仅 PROCESSING / REJECTED 状态可挂项; 成本项必须与单据同项目。
    pub fn assign_items(&self, po_id: &str, cost_item_ids: &[i64]) -> ApiResult<usize> {
        validate_id(po_id, "po_id")?;
        if cost_item_ids.is_empty() {
            return Err(ApiError::InvalidInput("成本项列表不能为空".to_string()));
        }

        let mut guard = self
            .conn
            .lock()
            .map_err(|e| ApiError::DatabaseConnectionError(e.to_string()))?;
        let uow = LedgerUow::begin(&mut guard)?;

        let result = (|| -> ApiResult<usize> {
            let conn = uow.conn();
            let po = PurchaseOrderRepository::get_in(conn, po_id)?;
            match po.status {
                ApprovalStatus::Processing | ApprovalStatus::Rejected => {}
                other => {
                    return Err(ApiError::InvalidInput(format!(
                        "采购单状态为{}, 不能挂项",
                        other
                    )));
                }
            }
            for id in cost_item_ids {
                let item = CostItemRepository::get_in(conn, *id)?;
                if item.project_id != po.project_id {
                    return Err(ApiError::InvalidInput(format!(
                        "成本项{}不属于项目{}",
                        id, po.project_id
                    )));
                }
            }
            Ok(CostItemRepository::assign_po_in(conn, cost_item_ids, po_id)?)
        })();

        match result {
            Ok(changed) => {
                uow.commit()?;
                Ok(changed)
            }
            Err(err) => {
                if let Err(rb) = uow.rollback() {
                    warn!(error = %rb, "采购单挂项回滚失败");
                }
                Err(err)
            }
        }
    }

    /// 提交审批: 重建名册, 必要时升级总经理
    pub fn submit(&self, po_id: &str) -> ApiResult<ApiOutcome<Vec<Role>>> {
        validate_id(po_id, "po_id")?;
        fold_ledger(
            self.escalation_engine
                .submit(ApprovalEntityKind::PurchaseOrder, po_id),
        )
    }

    /// 以当前角色表态
    pub fn decide(
        &self,
        actor: &Actor,
        po_id: &str,
        decision: ApprovalDecision,
    ) -> ApiResult<ApiOutcome<EscalationReport>> {
        validate_id(po_id, "po_id")?;
        fold_ledger(self.escalation_engine.record_decision(
            ApprovalEntityKind::PurchaseOrder,
            po_id,
            actor,
            decision,
        ))
    }

    /// 作废采购单
    pub fn cancel(&self, po_id: &str) -> ApiResult<ApiOutcome<ApprovalStatus>> {
        validate_id(po_id, "po_id")?;
        fold_ledger(
            self.escalation_engine
                .cancel(ApprovalEntityKind::PurchaseOrder, po_id),
        )
    }

    // ==========================================
    // 查询接口
    // ==========================================

    pub fn get_order(&self, po_id: &str) -> ApiResult<Option<PurchaseOrder>> {
        Ok(self.po_repo.find_by_id(po_id)?)
    }

    /// 当前审批名册
    pub fn get_roster(&self, po_id: &str) -> ApiResult<Vec<Approver>> {
        Ok(self
            .approver_repo
            .find_roster(ApprovalEntityKind::PurchaseOrder, po_id)?)
    }
}
