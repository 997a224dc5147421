// ==========================================
// 工程成本修订台账系统 - 成本项 API
// ==========================================
// 职责: 追加成本项的创建/修改/删除 (走预算重算器) 与查询
// 红线: API 层只做入参校验与编排, 预算判定全部在引擎层
// ==========================================

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::api::error::{fold_ledger, ApiOutcome, ApiResult};
use crate::api::validator::{validate_title, validate_values};
use crate::domain::cost_item::{CostItem, CostItemFilter, NewCostItem};
use crate::domain::types::Actor;
use crate::engine::authority::actor_can_manage_cost_items;
use crate::engine::error::LedgerError;
use crate::engine::reallocator::{ChildChange, ReallocationReport, Reallocator};
use crate::repository::cost_item_repo::CostItemRepository;
use crate::repository::project_repo::ProjectRepository;

// ==========================================
// 请求载荷
// ==========================================
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CreateExtraItemRequest {
    pub title: String,
    pub vendor_id: Option<String>,
    pub amount: f64,
    pub price: f64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct UpdateExtraItemRequest {
    pub cost_item_id: i64,
    pub amount: f64,
    pub price: f64,
}

// ==========================================
// CostItemApi
// ==========================================
pub struct CostItemApi {
    reallocator: Arc<Reallocator>,
    cost_item_repo: Arc<CostItemRepository>,
    project_repo: Arc<ProjectRepository>,
}

impl CostItemApi {
    pub fn new(
        reallocator: Arc<Reallocator>,
        cost_item_repo: Arc<CostItemRepository>,
        project_repo: Arc<ProjectRepository>,
    ) -> Self {
        Self {
            reallocator,
            cost_item_repo,
            project_repo,
        }
    }

    // ==========================================
    // 基准行维护 (报价未锁定期)
    // ==========================================

    /// 在报价编制期录入基准成本项 (不走修订台账)
    pub fn create_baseline_item(
        &self,
        actor: &Actor,
        project_id: &str,
        req: CreateExtraItemRequest,
    ) -> ApiResult<ApiOutcome<i64>> {
        validate_title(&req.title)?;
        validate_values(req.amount, req.price)?;

        let result = actor_can_manage_cost_items(actor.role).and_then(|_| {
            let project = self
                .project_repo
                .find_by_id(project_id)
                .map_err(LedgerError::from)?
                .ok_or_else(|| LedgerError::NotFound {
                    entity: "Project".to_string(),
                    id: project_id.to_string(),
                })?;
            if project.is_quotation_locked() {
                return Err(LedgerError::Conflict(
                    "报价已锁定, 成本变更必须走修订台账".to_string(),
                ));
            }
            self.cost_item_repo
                .create(&NewCostItem {
                    project_id: project_id.to_string(),
                    parent_id: None,
                    title: req.title.trim().to_string(),
                    vendor_id: req.vendor_id.clone(),
                    amount: req.amount,
                    price: req.price,
                    is_extra: false,
                })
                .map_err(LedgerError::from)
        });
        fold_ledger(result)
    }

    // ==========================================
    // 修订操作 (走重算器)
    // ==========================================

    /// 在父项名下追加成本项
    pub fn create_extra_item(
        &self,
        actor: &Actor,
        parent_id: i64,
        req: CreateExtraItemRequest,
    ) -> ApiResult<ApiOutcome<ReallocationReport>> {
        validate_title(&req.title)?;
        validate_values(req.amount, req.price)?;
        debug!(user_id = %actor.user_id, parent_id, title = %req.title, "追加成本项请求");

        let result = actor_can_manage_cost_items(actor.role).and_then(|_| {
            self.reallocator.reallocate(
                parent_id,
                ChildChange::Create(NewCostItem {
                    project_id: String::new(), // 重算器按父项归属改写
                    parent_id: Some(parent_id),
                    title: req.title.trim().to_string(),
                    vendor_id: req.vendor_id,
                    amount: req.amount,
                    price: req.price,
                    is_extra: true,
                }),
            )
        });
        fold_ledger(result)
    }

    /// 修改追加成本项的数量/单价
    pub fn update_extra_item(
        &self,
        actor: &Actor,
        parent_id: i64,
        req: UpdateExtraItemRequest,
    ) -> ApiResult<ApiOutcome<ReallocationReport>> {
        validate_values(req.amount, req.price)?;
        debug!(user_id = %actor.user_id, parent_id, cost_item_id = req.cost_item_id, "修改成本项请求");

        let result = actor_can_manage_cost_items(actor.role).and_then(|_| {
            self.reallocator.reallocate(
                parent_id,
                ChildChange::Update {
                    cost_item_id: req.cost_item_id,
                    new_amount: req.amount,
                    new_price: req.price,
                },
            )
        });
        fold_ledger(result)
    }

    /// 删除追加成本项
    pub fn delete_extra_item(
        &self,
        actor: &Actor,
        parent_id: i64,
        cost_item_id: i64,
    ) -> ApiResult<ApiOutcome<ReallocationReport>> {
        debug!(user_id = %actor.user_id, parent_id, cost_item_id, "删除成本项请求");

        let result = actor_can_manage_cost_items(actor.role).and_then(|_| {
            self.reallocator
                .reallocate(parent_id, ChildChange::Delete { cost_item_id })
        });
        fold_ledger(result)
    }

    // ==========================================
    // 查询接口
    // ==========================================

    pub fn get_item(&self, cost_item_id: i64) -> ApiResult<Option<CostItem>> {
        Ok(self.cost_item_repo.find_by_id(cost_item_id)?)
    }

    pub fn list_items(&self, filter: &CostItemFilter) -> ApiResult<Vec<CostItem>> {
        Ok(self.cost_item_repo.find_by_filter(filter)?)
    }
}
