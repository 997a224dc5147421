// ==========================================
// 工程成本修订台账系统 - 预算滚动重算器
// ==========================================
// 职责: 报价锁定后, 对父项名下的追加子项做预算再分配:
// - 按创建顺序 (cost_item_id 升序) 累计行值, 先建先占预算;
// - 落在父项基准预算内的变更自动生效 (VALID),
//   超出的留在 WAITING 等人工决策;
// - 兄弟项释放预算 (删除/缩量/驳回) 时, 原本 WAITING 的
//   兄弟修订按累计位置升为 VALID;
// - 无论局部是否放得下, 项目级超额费用闸门都可以把
//   本次变更压回 WAITING。
// 红线: 步骤2-9全部在同一个工作单元内执行, 任一失败整体回滚,
//       不留部分快照
// ==========================================

use std::sync::{Arc, Mutex};

use rusqlite::Connection;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::domain::cost_item::{CostItem, NewCostItem};
use crate::domain::cost_modification::NewCostModification;
use crate::domain::project::Project;
use crate::domain::types::ModificationStatus;
use crate::engine::error::{LedgerError, LedgerResult};
use crate::engine::extra_fee_gate::{value_eq, ExtraFeeGate, GateCheck, VALUE_EPSILON};
use crate::repository::cost_item_repo::CostItemRepository;
use crate::repository::cost_modification_repo::CostModificationRepository;
use crate::repository::error::RepositoryResult;
use crate::repository::project_repo::ProjectRepository;
use crate::repository::uow::LedgerUow;

// ==========================================
// ChildChange - 子项变更请求
// ==========================================
#[derive(Debug, Clone)]
pub enum ChildChange {
    /// 新建追加子项 (parent_id/project_id 以重算入参为准)
    Create(NewCostItem),
    /// 修改已有子项的数量/单价
    Update {
        cost_item_id: i64,
        new_amount: f64,
        new_price: f64,
    },
    /// 删除子项
    Delete { cost_item_id: i64 },
}

// ==========================================
// RevisionVerdict - 本次变更的裁定
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RevisionVerdict {
    AutoValid, // 预算内自动生效
    Waiting,   // 等待人工决策
    NoOp,      // 行值未变, 不产生修订
    Deleted,   // 删除完成
}

// ==========================================
// ReallocationReport - 重算结果
// ==========================================
#[derive(Debug, Clone, Serialize)]
pub struct ReallocationReport {
    pub verdict: RevisionVerdict,
    pub cost_item_id: Option<i64>,
    pub modification_id: Option<i64>,
    pub freed_modification_ids: Vec<i64>, // 本次升为 VALID 的兄弟修订
    pub running_total: f64,
    pub budget: f64,
    pub gate: Option<GateCheck>,
}

// ==========================================
// Reallocator
// ==========================================
pub struct Reallocator {
    conn: Arc<Mutex<Connection>>,
    gate: ExtraFeeGate,
}

impl Reallocator {
    pub fn new(conn: Arc<Mutex<Connection>>, gate: ExtraFeeGate) -> Self {
        Self { conn, gate }
    }

    /// 对父项名下子项执行一次预算重算
    ///
    /// 事务边界: 本方法开启工作单元, 成功提交, 任一失败显式回滚后传播。
    pub fn reallocate(
        &self,
        parent_id: i64,
        change: ChildChange,
    ) -> LedgerResult<ReallocationReport> {
        let mut guard = self
            .conn
            .lock()
            .map_err(|e| LedgerError::Transaction(
                crate::repository::error::RepositoryError::LockError(e.to_string()),
            ))?;
        let uow = LedgerUow::begin(&mut guard)?;

        match self.reallocate_in(uow.conn(), parent_id, change) {
            Ok(report) => {
                uow.commit()?;
                Ok(report)
            }
            Err(err) => {
                if let Err(rb) = uow.rollback() {
                    warn!(error = %rb, "重算回滚失败");
                }
                Err(err)
            }
        }
    }

    /// 工作单元内的重算主体
    fn reallocate_in(
        &self,
        conn: &Connection,
        parent_id: i64,
        change: ChildChange,
    ) -> LedgerResult<ReallocationReport> {
        // ===== 步骤1: 父项与项目前置校验 =====
        let parent = CostItemRepository::get_in(conn, parent_id)?;
        check_parent_preconditions(conn, &parent)?;

        let project = ProjectRepository::get_in(conn, &parent.project_id)?;
        if !project.is_quotation_locked() {
            return Err(LedgerError::Validation(
                "项目报价尚未锁定, 不走修订台账".to_string(),
            ));
        }

        match change {
            ChildChange::Create(new_item) => self.create_child(conn, &project, &parent, new_item),
            ChildChange::Update {
                cost_item_id,
                new_amount,
                new_price,
            } => self.update_child(conn, &project, &parent, cost_item_id, new_amount, new_price),
            ChildChange::Delete { cost_item_id } => {
                self.delete_child(conn, &parent, cost_item_id)
            }
        }
    }

    // ==========================================
    // 创建路径
    // ==========================================
    fn create_child(
        &self,
        conn: &Connection,
        project: &Project,
        parent: &CostItem,
        mut new_item: NewCostItem,
    ) -> LedgerResult<ReallocationReport> {
        // 归属以重算入参为准
        new_item.project_id = parent.project_id.clone();
        new_item.parent_id = Some(parent.cost_item_id);
        new_item.is_extra = true;

        let new_total = new_item.amount * new_item.price;
        if new_total <= VALUE_EPSILON {
            return Err(LedgerError::Validation(
                "追加成本项的行值必须大于零".to_string(),
            ));
        }

        // 新行先落库, 自增ID使其在子项序列末位 (最后占用预算)
        let cost_item_id = CostItemRepository::insert_in(conn, &new_item)?;

        // 子项行存在即挂父标志 (is_parent ⇔ 存在子项)
        if !parent.is_parent {
            CostItemRepository::set_is_parent_in(conn, parent.cost_item_id, true)?;
        }

        // ===== 步骤2-5: 重走子项序列 =====
        let budget = parent.baseline_budget();
        let children = CostItemRepository::find_children_in(conn, parent.cost_item_id)?;
        let walk = walk_children(conn, &children, budget, Some(cost_item_id), None)?;

        // ===== 步骤6: 局部预算裁定 =====
        let mut fits = walk.running_total <= budget + VALUE_EPSILON;

        // ===== 步骤7: 超额费用闸门 (全新项旧值为0) =====
        let gate = self.gate.evaluate_change(conn, project, 0.0, new_total)?;
        if gate.exceeded {
            fits = false;
        }

        // ===== 步骤8: 落修订行 (全新项 old=0, 恒有行值变化) =====
        let status = if fits {
            ModificationStatus::Valid
        } else {
            ModificationStatus::Waiting
        };
        let modification_id = CostModificationRepository::insert_in(
            conn,
            &NewCostModification {
                project_id: parent.project_id.clone(),
                cost_item_id,
                old_amount: 0.0,
                old_price: 0.0,
                new_amount: new_item.amount,
                new_price: new_item.price,
                status,
            },
        )?;

        if fits {
            // 首次自动认可: bk_amount=0, bk_price=新单价
            CostItemRepository::update_backup_in(conn, cost_item_id, 0.0, new_item.price)?;
        }

        // ===== 步骤9: 兄弟修订批量生效 =====
        let freed = apply_freed_transitions(conn, &walk.freed)?;

        info!(
            parent_id = parent.cost_item_id,
            cost_item_id,
            running_total = walk.running_total,
            budget,
            verdict = ?status,
            "追加子项重算完成"
        );

        Ok(ReallocationReport {
            verdict: if fits {
                RevisionVerdict::AutoValid
            } else {
                RevisionVerdict::Waiting
            },
            cost_item_id: Some(cost_item_id),
            modification_id: Some(modification_id),
            freed_modification_ids: freed,
            running_total: walk.running_total,
            budget,
            gate: Some(gate),
        })
    }

    // ==========================================
    // 修改路径
    // ==========================================
    fn update_child(
        &self,
        conn: &Connection,
        project: &Project,
        parent: &CostItem,
        cost_item_id: i64,
        new_amount: f64,
        new_price: f64,
    ) -> LedgerResult<ReallocationReport> {
        let child = CostItemRepository::get_in(conn, cost_item_id)?;
        if child.parent_id != Some(parent.cost_item_id) {
            return Err(LedgerError::Validation(format!(
                "成本项{}不隶属于父项{}",
                cost_item_id, parent.cost_item_id
            )));
        }

        // 单 WAITING 不变量: 已有待审修订时拒绝新修订
        if CostModificationRepository::find_waiting_for_item_in(conn, cost_item_id)?.is_some() {
            return Err(LedgerError::Conflict(format!(
                "成本项{}已存在待审修订",
                cost_item_id
            )));
        }

        // 幂等: 行值未变不产生修订, 状态原样
        let new_total = new_amount * new_price;
        if value_eq(child.total(), new_total) {
            debug!(cost_item_id, "行值未变, 跳过重算");
            return Ok(ReallocationReport {
                verdict: RevisionVerdict::NoOp,
                cost_item_id: Some(cost_item_id),
                modification_id: None,
                freed_modification_ids: Vec::new(),
                running_total: 0.0,
                budget: parent.baseline_budget(),
                gate: None,
            });
        }

        // ===== 步骤2-5: 重走子项序列 (本项按新值参与累计) =====
        let budget = parent.baseline_budget();
        let children = CostItemRepository::find_children_in(conn, parent.cost_item_id)?;
        let walk = walk_children(
            conn,
            &children,
            budget,
            Some(cost_item_id),
            Some((new_amount, new_price)),
        )?;

        // ===== 步骤6: 局部预算裁定 =====
        let mut fits = walk.running_total <= budget + VALUE_EPSILON;

        // ===== 步骤7: 超额费用闸门 (旧值 = 该行当前计入认可成本的金额) =====
        let gate = self
            .gate
            .evaluate_change(conn, project, child.recognized_total(), new_total)?;
        if gate.exceeded {
            fits = false;
        }

        // ===== 步骤4/8: 落修订行, old 取认可快照 =====
        let (old_amount, old_price) = match (child.bk_amount, child.bk_price) {
            (Some(a), Some(p)) => (a, p),
            _ => (child.amount, child.price),
        };
        let status = if fits {
            ModificationStatus::Valid
        } else {
            ModificationStatus::Waiting
        };
        let modification_id = CostModificationRepository::insert_in(
            conn,
            &NewCostModification {
                project_id: parent.project_id.clone(),
                cost_item_id,
                old_amount,
                old_price,
                new_amount,
                new_price,
                status,
            },
        )?;

        if fits {
            // 预算内直接改写行值; 首次认可时以变更前行值建立快照基线
            CostItemRepository::update_values_in(conn, cost_item_id, new_amount, new_price)?;
            if child.never_accepted() {
                CostItemRepository::update_backup_in(
                    conn,
                    cost_item_id,
                    child.amount,
                    child.price,
                )?;
            }
            if !parent.is_parent {
                CostItemRepository::set_is_parent_in(conn, parent.cost_item_id, true)?;
            }
        }

        // ===== 步骤9: 兄弟修订批量生效 =====
        let freed = apply_freed_transitions(conn, &walk.freed)?;

        info!(
            parent_id = parent.cost_item_id,
            cost_item_id,
            running_total = walk.running_total,
            budget,
            verdict = ?status,
            "子项修改重算完成"
        );

        Ok(ReallocationReport {
            verdict: if fits {
                RevisionVerdict::AutoValid
            } else {
                RevisionVerdict::Waiting
            },
            cost_item_id: Some(cost_item_id),
            modification_id: Some(modification_id),
            freed_modification_ids: freed,
            running_total: walk.running_total,
            budget,
            gate: Some(gate),
        })
    }

    // ==========================================
    // 删除路径
    // ==========================================
    // 被删项不再参与累计 (跳过步骤4/6), 兄弟项照常释放;
    // 最后一个子项删除后清父标志
    fn delete_child(
        &self,
        conn: &Connection,
        parent: &CostItem,
        cost_item_id: i64,
    ) -> LedgerResult<ReallocationReport> {
        let child = CostItemRepository::get_in(conn, cost_item_id)?;
        if child.parent_id != Some(parent.cost_item_id) {
            return Err(LedgerError::Validation(format!(
                "成本项{}不隶属于父项{}",
                cost_item_id, parent.cost_item_id
            )));
        }

        CostItemRepository::delete_in(conn, cost_item_id)?;

        let budget = parent.baseline_budget();
        let children = CostItemRepository::find_children_in(conn, parent.cost_item_id)?;
        let walk = walk_children(conn, &children, budget, None, None)?;
        let freed = apply_freed_transitions(conn, &walk.freed)?;

        if children.is_empty() && parent.is_parent {
            CostItemRepository::set_is_parent_in(conn, parent.cost_item_id, false)?;
        }

        info!(
            parent_id = parent.cost_item_id,
            cost_item_id,
            running_total = walk.running_total,
            freed_count = freed.len(),
            "子项删除重算完成"
        );

        Ok(ReallocationReport {
            verdict: RevisionVerdict::Deleted,
            cost_item_id: Some(cost_item_id),
            modification_id: None,
            freed_modification_ids: freed,
            running_total: walk.running_total,
            budget,
            gate: None,
        })
    }
}

// ==========================================
// 共享前置: 父项自身不得处于待审/未认可状态
// ==========================================
// 基准行本身悬而未决时, 其预算没有可靠口径
pub(crate) fn check_parent_preconditions(
    conn: &Connection,
    parent: &CostItem,
) -> LedgerResult<()> {
    if CostModificationRepository::find_waiting_for_item_in(conn, parent.cost_item_id)?.is_some() {
        return Err(LedgerError::Conflict(format!(
            "父项{}自身存在待审修订",
            parent.cost_item_id
        )));
    }
    if parent.is_extra && parent.never_accepted() {
        return Err(LedgerError::Conflict(format!(
            "父项{}为从未被认可的追加项, 不能作为预算基线",
            parent.cost_item_id
        )));
    }
    Ok(())
}

// ==========================================
// 子项序列遍历
// ==========================================

/// 可升为 VALID 的兄弟修订
#[derive(Debug, Clone)]
pub(crate) struct FreedSibling {
    pub modification_id: i64,
    pub cost_item_id: i64,
    pub amount: f64, // 当前行值快照 (写入 bk_amount/bk_price)
    pub price: f64,
}

#[derive(Debug)]
pub(crate) struct WalkOutcome {
    pub running_total: f64,
    pub freed: Vec<FreedSibling>,
}

/// 按创建顺序遍历子项, 累计行值并标记可释放的 WAITING 兄弟修订
///
/// 规则:
/// - 最新修订为 REJECTED 且从未被认可的子项不占预算, 跳过;
/// - changed 指定本次变更项及其替代行值 (None 表示按库中行值);
/// - 非变更项中, 最新修订为 WAITING 且累计位置落在预算内的,
///   标记为待释放 (状态升 VALID + 快照当前行值)。
pub(crate) fn walk_children(
    conn: &Connection,
    children: &[CostItem],
    budget: f64,
    changed_id: Option<i64>,
    changed_values: Option<(f64, f64)>,
) -> RepositoryResult<WalkOutcome> {
    let mut running_total = 0.0;
    let mut freed = Vec::new();

    for child in children {
        let is_changed = Some(child.cost_item_id) == changed_id;
        let latest = CostModificationRepository::latest_for_item_in(conn, child.cost_item_id)?;

        if !is_changed {
            if let Some(ref m) = latest {
                // 被驳回且从未认可的子项不占预算
                if m.status == ModificationStatus::Rejected && child.never_accepted() {
                    continue;
                }
            }
        }

        let (amount, price) = if is_changed {
            changed_values.unwrap_or((child.amount, child.price))
        } else {
            (child.amount, child.price)
        };
        running_total += amount * price;

        if is_changed {
            continue;
        }

        if let Some(m) = latest {
            if m.status == ModificationStatus::Waiting && running_total <= budget + VALUE_EPSILON {
                freed.push(FreedSibling {
                    modification_id: m.modification_id,
                    cost_item_id: child.cost_item_id,
                    amount: child.amount,
                    price: child.price,
                });
            }
        }
    }

    Ok(WalkOutcome {
        running_total,
        freed,
    })
}

/// 批量落地释放: 修订状态升 VALID, 行快照改写为当前行值
pub(crate) fn apply_freed_transitions(
    conn: &Connection,
    freed: &[FreedSibling],
) -> RepositoryResult<Vec<i64>> {
    if freed.is_empty() {
        return Ok(Vec::new());
    }
    let ids: Vec<i64> = freed.iter().map(|f| f.modification_id).collect();
    CostModificationRepository::bulk_mark_valid_in(conn, &ids)?;
    for f in freed {
        CostItemRepository::update_backup_in(conn, f.cost_item_id, f.amount, f.price)?;
        debug!(
            cost_item_id = f.cost_item_id,
            modification_id = f.modification_id,
            "预算腾出, 待审修订升为 VALID"
        );
    }
    Ok(ids)
}
