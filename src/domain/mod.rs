// ==========================================
// 工程成本修订台账系统 - 领域层
// ==========================================
// 职责: 实体与类型定义, 不含数据访问与业务规则
// ==========================================

pub mod approval;
pub mod cost_item;
pub mod cost_modification;
pub mod project;
pub mod types;

// 重导出核心实体
pub use approval::{Approver, PurchaseOrder, VariationOrder};
pub use cost_item::{CostItem, CostItemFilter, NewCostItem};
pub use cost_modification::{CostModification, ModificationFilter, NewCostModification};
pub use project::Project;
