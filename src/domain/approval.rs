// ==========================================
// 工程成本修订台账系统 - 审批领域模型
// ==========================================
// 采购单 / 工程变更单共用同一套审批人名册模式:
// 重新提交时整册删除重建, 旧表态不得泄漏进新一轮审批
// ==========================================

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::domain::types::{ApprovalEntityKind, ApprovalStatus, ApproverStatus, Role};

// ==========================================
// PurchaseOrder - 采购单
// ==========================================
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PurchaseOrder {
    pub po_id: String,              // 采购单ID
    pub project_id: String,         // 所属项目
    pub title: String,              // 名称
    pub vendor_id: Option<String>,  // 供应商
    pub status: ApprovalStatus,     // 审批状态
    pub created_at: NaiveDateTime,  // 创建时间
    pub updated_at: NaiveDateTime,  // 更新时间
}

// ==========================================
// VariationOrder - 工程变更单
// ==========================================
// 对已批准报价的批量修正, 通过 cost_item.vo_add_id / vo_delete_id
// 关联其新增/删除的成本项
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VariationOrder {
    pub vo_id: String,              // 变更单ID
    pub project_id: String,         // 所属项目
    pub title: String,              // 名称
    pub status: ApprovalStatus,     // 审批状态
    pub created_at: NaiveDateTime,  // 创建时间
    pub updated_at: NaiveDateTime,  // 更新时间
}

// ==========================================
// Approver - 审批人名册行
// ==========================================
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Approver {
    pub approver_id: i64,                  // 自增主键
    pub entity_kind: ApprovalEntityKind,   // 实体类型
    pub entity_id: String,                 // 实体ID
    pub role: Role,                        // 角色席位
    pub user_id: Option<String>,           // 表态人 (表态前为 NULL)
    pub status: ApproverStatus,            // 表态
    pub decided_at: Option<NaiveDateTime>, // 表态时间
}

impl Approver {
    /// 是否尚未表态
    pub fn is_pending(&self) -> bool {
        self.status == ApproverStatus::Waiting
    }
}
