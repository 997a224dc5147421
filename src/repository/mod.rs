// ==========================================
// 工程成本修订台账系统 - 数据仓储层
// ==========================================
// 红线: Repository 不含业务逻辑
// 约束: 所有查询使用参数化, 防止 SQL 注入
// 约定: 实例方法自行加锁; *_in 关联函数接收事务内连接,
//       由 LedgerUow 统一事务边界
// ==========================================

pub mod approver_repo;
pub mod cost_item_repo;
pub mod cost_modification_repo;
pub mod cost_summary_repo;
pub mod error;
pub mod order_repo;
pub mod project_repo;
pub mod uow;

// 重导出核心仓储
pub use approver_repo::ApproverRepository;
pub use cost_item_repo::CostItemRepository;
pub use cost_modification_repo::CostModificationRepository;
pub use cost_summary_repo::{ProjectCostAggregator, ProjectCostSummary, SqlCostAggregator};
pub use error::{RepositoryError, RepositoryResult};
pub use order_repo::{PurchaseOrderRepository, VariationOrderRepository};
pub use project_repo::ProjectRepository;
pub use uow::LedgerUow;
