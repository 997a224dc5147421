// ==========================================
// 工程成本修订台账系统 - API 层
// ==========================================
// 职责: 提供业务 API 接口, 供上层服务/前端命令调用
// ==========================================

pub mod error;
pub mod cost_item_api;
pub mod cost_modification_api;
pub mod purchase_order_api;
pub mod validator;
pub mod variation_order_api;

// 重导出核心类型
pub use error::{ApiError, ApiOutcome, ApiResult, Refusal, RefusalKind};
pub use cost_item_api::CostItemApi;
pub use cost_modification_api::CostModificationApi;
pub use purchase_order_api::PurchaseOrderApi;
pub use variation_order_api::VariationOrderApi;
