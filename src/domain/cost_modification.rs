// ==========================================
// 工程成本修订台账系统 - 成本修订领域模型
// ==========================================
// 红线: 修订行是审计台账, 永不删除; 每个成本项同一时刻
//       至多存在一条 WAITING 修订
// ==========================================

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::domain::types::ModificationStatus;

// ==========================================
// CostModification - 一次成本修订请求
// ==========================================
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CostModification {
    pub modification_id: i64,          // 自增主键
    pub project_id: String,            // 所属项目
    pub cost_item_id: i64,             // 目标成本项
    pub old_amount: f64,               // 修订前数量
    pub old_price: f64,                // 修订前单价
    pub new_amount: f64,               // 修订后数量
    pub new_price: f64,                // 修订后单价
    pub status: ModificationStatus,    // 状态
    pub approve_by: Option<String>,    // 决策人 (人工决策前为 NULL)
    pub created_at: NaiveDateTime,     // 创建时间
    pub decided_at: Option<NaiveDateTime>, // 人工决策时间
}

impl CostModification {
    /// 修订前行值
    pub fn old_total(&self) -> f64 {
        self.old_amount * self.old_price
    }

    /// 修订后行值
    pub fn new_total(&self) -> f64 {
        self.new_amount * self.new_price
    }

    /// 行值增量 (可为负)
    pub fn delta(&self) -> f64 {
        self.new_total() - self.old_total()
    }
}

// ==========================================
// NewCostModification - 创建载荷
// ==========================================
#[derive(Debug, Clone)]
pub struct NewCostModification {
    pub project_id: String,
    pub cost_item_id: i64,
    pub old_amount: f64,
    pub old_price: f64,
    pub new_amount: f64,
    pub new_price: f64,
    pub status: ModificationStatus,
}

// ==========================================
// ModificationFilter - 查询过滤条件
// ==========================================
#[derive(Debug, Clone, Default)]
pub struct ModificationFilter {
    pub project_id: Option<String>,
    pub cost_item_id: Option<i64>,
    pub status: Option<ModificationStatus>,
}
