// ==========================================
// 工程成本修订台账系统 - 配置层
// ==========================================

pub mod config_manager;

pub use config_manager::{ConfigManager, DEFAULT_TOTAL_EXTRA_FEE};
