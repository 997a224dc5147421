// ==========================================
// 工程成本修订台账系统 - 核心库
// ==========================================
// 系统定位: 工程承包项目财务后台的成本修订子系统
// 核心约束: 报价锁定后的成本变更只能走修订台账,
//           追加成本按创建顺序在父项预算内滚动分配
// ==========================================

// 初始化国际化系统
rust_i18n::i18n!("locales", fallback = "zh-CN");

// ==========================================
// 模块声明
// ==========================================

// 领域层 - 实体与类型
pub mod domain;

// 数据仓储层 - 数据访问
pub mod repository;

// 引擎层 - 业务规则
pub mod engine;

// 配置层 - 系统配置
pub mod config;

// 数据库基础设施（连接初始化/PRAGMA 统一）
pub mod db;

// 日志系统
pub mod logging;

// 国际化
pub mod i18n;

// API 层 - 业务接口
pub mod api;

// ==========================================
// 重导出核心类型
// ==========================================

// 领域类型
pub use domain::types::{
    Actor, ApprovalDecision, ApprovalEntityKind, ApprovalStatus, ApproverStatus,
    ModificationStatus, QuotationStatus, Role,
};

// 领域实体
pub use domain::{
    Approver, CostItem, CostModification, NewCostItem, Project, PurchaseOrder, VariationOrder,
};

// 引擎
pub use engine::{
    ApprovalEngine, ChildChange, EscalationEngine, ExtraFeeGate, LedgerError, LedgerResult,
    QuorumOutcome, ReallocationReport, Reallocator, RevisionVerdict,
};

// API
pub use api::{CostItemApi, CostModificationApi, PurchaseOrderApi, VariationOrderApi};

/// 库版本
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// 系统名称
pub const APP_NAME: &str = "construction-cost-ledger";
