// ==========================================
// 工程成本修订台账系统 - 项目领域模型
// ==========================================
// 红线: 项目对台账只读, 报价状态由报价审批流程(范围外)改写
// ==========================================

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::domain::types::QuotationStatus;

// ==========================================
// Project - 工程项目 (聚合根)
// ==========================================
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Project {
    pub project_id: String,               // 项目ID
    pub project_name: String,             // 项目名称
    pub quotation_status: QuotationStatus, // 报价状态
    pub total_extra_fee: f64,             // 额外费用上限 (占基准成本的百分比)
    pub max_po_price: f64,                // 采购单升级审批阈值 (达到即追加总经理审批)
    pub created_at: NaiveDateTime,        // 创建时间
    pub updated_at: NaiveDateTime,        // 更新时间
}

impl Project {
    /// 报价是否已锁定 (锁定后成本变更必须走修订台账)
    pub fn is_quotation_locked(&self) -> bool {
        self.quotation_status == QuotationStatus::Approved
    }

    /// 额外费用上限金额: 基准成本 * total_extra_fee / 100
    pub fn extra_fee_cap(&self, base_cost: f64) -> f64 {
        base_cost * self.total_extra_fee / 100.0
    }
}
