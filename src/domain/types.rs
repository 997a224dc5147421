// ==========================================
// 工程成本修订台账系统 - 领域类型定义
// ==========================================
// 职责: 状态枚举与角色体系
// 序列化格式: SCREAMING_SNAKE_CASE (与数据库一致)
// ==========================================

use serde::{Deserialize, Serialize};
use std::fmt;

// ==========================================
// 报价状态 (Quotation Status)
// ==========================================
// 红线: APPROVED 之后报价锁定, 成本变更只能走修订台账
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum QuotationStatus {
    Processing,      // 编制中
    WaitingApproval, // 待审批
    Approved,        // 已审批(锁定)
    Cancelled,       // 已取消
}

impl fmt::Display for QuotationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_db_str())
    }
}

impl QuotationStatus {
    /// 从字符串解析状态
    pub fn from_str(s: &str) -> Self {
        match s.to_uppercase().as_str() {
            "PROCESSING" => QuotationStatus::Processing,
            "WAITING_APPROVAL" => QuotationStatus::WaitingApproval,
            "APPROVED" => QuotationStatus::Approved,
            "CANCELLED" => QuotationStatus::Cancelled,
            _ => QuotationStatus::Processing, // 默认值
        }
    }

    /// 转换为数据库存储的字符串
    pub fn to_db_str(&self) -> &'static str {
        match self {
            QuotationStatus::Processing => "PROCESSING",
            QuotationStatus::WaitingApproval => "WAITING_APPROVAL",
            QuotationStatus::Approved => "APPROVED",
            QuotationStatus::Cancelled => "CANCELLED",
        }
    }
}

// ==========================================
// 成本修订状态 (Modification Status)
// ==========================================
// WAITING -> VALID   仅由重算器自动判定
// WAITING -> APPROVED/REJECTED 仅由人工决策, 终态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ModificationStatus {
    Waiting,  // 待审批
    Valid,    // 预算内自动生效
    Approved, // 人工批准
    Rejected, // 人工驳回
}

impl fmt::Display for ModificationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_db_str())
    }
}

impl ModificationStatus {
    pub fn from_str(s: &str) -> Self {
        match s.to_uppercase().as_str() {
            "WAITING" => ModificationStatus::Waiting,
            "VALID" => ModificationStatus::Valid,
            "APPROVED" => ModificationStatus::Approved,
            "REJECTED" => ModificationStatus::Rejected,
            _ => ModificationStatus::Waiting, // 默认值
        }
    }

    pub fn to_db_str(&self) -> &'static str {
        match self {
            ModificationStatus::Waiting => "WAITING",
            ModificationStatus::Valid => "VALID",
            ModificationStatus::Approved => "APPROVED",
            ModificationStatus::Rejected => "REJECTED",
        }
    }

    /// 是否已有定论 (台账不再改写)
    pub fn is_resolved(&self) -> bool {
        !matches!(self, ModificationStatus::Waiting)
    }
}

// ==========================================
// 审批实体状态 (Approval Status)
// ==========================================
// 采购单 / 工程变更单共用
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ApprovalStatus {
    Processing,      // 编制中
    WaitingApproval, // 审批中
    Approved,        // 通过
    Rejected,        // 驳回
    Cancelled,       // 作废
}

impl fmt::Display for ApprovalStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_db_str())
    }
}

impl ApprovalStatus {
    pub fn from_str(s: &str) -> Self {
        match s.to_uppercase().as_str() {
            "PROCESSING" => ApprovalStatus::Processing,
            "WAITING_APPROVAL" => ApprovalStatus::WaitingApproval,
            "APPROVED" => ApprovalStatus::Approved,
            "REJECTED" => ApprovalStatus::Rejected,
            "CANCELLED" => ApprovalStatus::Cancelled,
            _ => ApprovalStatus::Processing, // 默认值
        }
    }

    pub fn to_db_str(&self) -> &'static str {
        match self {
            ApprovalStatus::Processing => "PROCESSING",
            ApprovalStatus::WaitingApproval => "WAITING_APPROVAL",
            ApprovalStatus::Approved => "APPROVED",
            ApprovalStatus::Rejected => "REJECTED",
            ApprovalStatus::Cancelled => "CANCELLED",
        }
    }
}

// ==========================================
// 审批人状态 (Approver Status)
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ApproverStatus {
    Waiting,  // 未表态
    Approved, // 同意
    Rejected, // 驳回
}

impl fmt::Display for ApproverStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_db_str())
    }
}

impl ApproverStatus {
    pub fn from_str(s: &str) -> Self {
        match s.to_uppercase().as_str() {
            "WAITING" => ApproverStatus::Waiting,
            "APPROVED" => ApproverStatus::Approved,
            "REJECTED" => ApproverStatus::Rejected,
            _ => ApproverStatus::Waiting, // 默认值
        }
    }

    pub fn to_db_str(&self) -> &'static str {
        match self {
            ApproverStatus::Waiting => "WAITING",
            ApproverStatus::Approved => "APPROVED",
            ApproverStatus::Rejected => "REJECTED",
        }
    }
}

// ==========================================
// 人工决策 (Approval Decision)
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ApprovalDecision {
    Approve, // 批准
    Reject,  // 驳回
}

impl fmt::Display for ApprovalDecision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ApprovalDecision::Approve => write!(f, "APPROVE"),
            ApprovalDecision::Reject => write!(f, "REJECT"),
        }
    }
}

// ==========================================
// 审批实体类型 (Approval Entity Kind)
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ApprovalEntityKind {
    PurchaseOrder,  // 采购单
    VariationOrder, // 工程变更单
}

impl fmt::Display for ApprovalEntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_db_str())
    }
}

impl ApprovalEntityKind {
    pub fn from_str(s: &str) -> Self {
        match s.to_uppercase().as_str() {
            "PURCHASE_ORDER" => ApprovalEntityKind::PurchaseOrder,
            "VARIATION_ORDER" => ApprovalEntityKind::VariationOrder,
            _ => ApprovalEntityKind::PurchaseOrder, // 默认值
        }
    }

    pub fn to_db_str(&self) -> &'static str {
        match self {
            ApprovalEntityKind::PurchaseOrder => "PURCHASE_ORDER",
            ApprovalEntityKind::VariationOrder => "VARIATION_ORDER",
        }
    }
}

// ==========================================
// 角色 (Role)
// ==========================================
// 红线: 授权判断统一走 engine::authority::actor_can_decide,
//       不允许在业务代码里散落 is_pm() 式布尔判断
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Role {
    ChiefExecutive,     // 总经理
    ProcurementManager, // 采购经理
    QuantitySurveyor,   // 预算员
    ProjectManager,     // 项目经理
    Accountant,         // 会计
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_db_str())
    }
}

impl Role {
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_uppercase().as_str() {
            "CHIEF_EXECUTIVE" => Some(Role::ChiefExecutive),
            "PROCUREMENT_MANAGER" => Some(Role::ProcurementManager),
            "QUANTITY_SURVEYOR" => Some(Role::QuantitySurveyor),
            "PROJECT_MANAGER" => Some(Role::ProjectManager),
            "ACCOUNTANT" => Some(Role::Accountant),
            _ => None,
        }
    }

    pub fn to_db_str(&self) -> &'static str {
        match self {
            Role::ChiefExecutive => "CHIEF_EXECUTIVE",
            Role::ProcurementManager => "PROCUREMENT_MANAGER",
            Role::QuantitySurveyor => "QUANTITY_SURVEYOR",
            Role::ProjectManager => "PROJECT_MANAGER",
            Role::Accountant => "ACCOUNTANT",
        }
    }
}

// ==========================================
// 请求主体 (Actor)
// ==========================================
// 由上游鉴权层(本库范围外)解析后注入
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Actor {
    pub user_id: String, // 用户ID
    pub role: Role,      // 角色
}

impl Actor {
    pub fn new(user_id: impl Into<String>, role: Role) -> Self {
        Self {
            user_id: user_id.into(),
            role,
        }
    }
}
