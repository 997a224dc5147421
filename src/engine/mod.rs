// ==========================================
// 工程成本修订台账系统 - 台账引擎层
// ==========================================
// 红线: 业务规则只在引擎层表达; 仓储不做判断, API 层不做计算
// 约定: 引擎方法自开工作单元, 成功提交, 失败显式回滚后传播
// ==========================================

pub mod approval;
pub mod authority;
pub mod error;
pub mod escalation;
pub mod extra_fee_gate;
pub mod reallocator;

pub use approval::{ApprovalEngine, DecisionReport};
pub use authority::{actor_can_decide, actor_can_manage_cost_items, DecideContext};
pub use error::{LedgerError, LedgerResult};
pub use escalation::{EscalationEngine, EscalationReport, QuorumOutcome};
pub use extra_fee_gate::{ExtraFeeGate, GateCheck, VALUE_EPSILON};
pub use reallocator::{ChildChange, ReallocationReport, Reallocator, RevisionVerdict};
