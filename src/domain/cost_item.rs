// ==========================================
// 工程成本修订台账系统 - 成本项领域模型
// ==========================================
// 结构: 自引用两层树 (parent_id), 父项为基准行, 子项为追加成本
// 红线: 父项基准预算 amount*price 一经认可不再变化,
//       子项修订消耗预算而不是替换预算
// ==========================================

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

// ==========================================
// CostItem - 成本项 (一条采购明细)
// ==========================================
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CostItem {
    pub cost_item_id: i64,          // 自增主键 (创建顺序 = 预算分配优先级)
    pub project_id: String,         // 所属项目
    pub parent_id: Option<i64>,     // 父成本项 (仅两层)
    pub title: String,              // 名称
    pub vendor_id: Option<String>,  // 供应商
    pub amount: f64,                // 当前认可数量
    pub price: f64,                 // 当前认可单价
    pub bk_amount: Option<f64>,     // 最近一次被认可的数量快照
    pub bk_price: Option<f64>,      // 最近一次被认可的单价快照 (NULL = 从未被认可修订)
    pub is_extra: bool,             // 报价锁定后追加的成本项
    pub is_parent: bool,            // 当前挂有至少一个子修订项
    pub po_id: Option<String>,      // 关联采购单
    pub vo_add_id: Option<String>,  // 由哪个变更单新增
    pub vo_delete_id: Option<String>, // 由哪个变更单删除
    pub created_at: NaiveDateTime,  // 创建时间
    pub updated_at: NaiveDateTime,  // 更新时间
}

impl CostItem {
    /// 当前行值 amount * price
    pub fn total(&self) -> f64 {
        self.amount * self.price
    }

    /// 是否从未有过被认可的修订
    pub fn never_accepted(&self) -> bool {
        self.bk_price.is_none()
    }

    /// 该行当前计入项目认可成本的金额
    ///
    /// 从未被认可的追加项不计入认可成本, 记 0;
    /// 超额费用闸门以此作为增量计算的"旧值"基准。
    pub fn recognized_total(&self) -> f64 {
        if self.never_accepted() {
            0.0
        } else {
            self.total()
        }
    }

    /// 子项预算上限 (仅父项有意义)
    pub fn baseline_budget(&self) -> f64 {
        self.total()
    }
}

// ==========================================
// NewCostItem - 创建载荷
// ==========================================
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewCostItem {
    pub project_id: String,
    pub parent_id: Option<i64>,
    pub title: String,
    pub vendor_id: Option<String>,
    pub amount: f64,
    pub price: f64,
    pub is_extra: bool,
}

// ==========================================
// CostItemFilter - 查询过滤条件
// ==========================================
// 每个仓储查询都走显式过滤结构, 不使用松散的参数包
#[derive(Debug, Clone, Default)]
pub struct CostItemFilter {
    pub project_id: Option<String>,
    pub parent_id: Option<i64>,
    pub is_extra: Option<bool>,
    pub po_id: Option<String>,
}
