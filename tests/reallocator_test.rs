// ==========================================
// 预算重算器集成测试
// ==========================================
// 测试范围:
// 1. 预算内追加自动生效 / 超出预算转待审
// 2. 删除与缩量释放预算, 待审兄弟修订级联生效
// 3. 超额费用闸门压制局部放得下的变更
// 4. 单 WAITING 不变量与幂等
// 5. 父标志维护与报价锁定前置
// ==========================================


use cost_ledger::domain::types::ModificationStatus;
use cost_ledger::engine::{ChildChange, LedgerError, RevisionVerdict};
use cost_ledger::repository::{CostItemRepository, CostModificationRepository};
use test_helpers::*;

// ==========================================
// 创建路径
// ==========================================

#[test]
fn test_create_within_budget_auto_valid() {
    let (_tmp, conn) = setup_test_db();
    insert_locked_project(&conn, "p1", 100.0, 0.0);
    let parent_id = insert_base_item(&conn, "p1", "土建分包", 10.0, 10.0); // 预算100

    let reallocator = make_reallocator(conn.clone());
    let report = reallocator
        .reallocate(
            parent_id,
            ChildChange::Create(extra_child("p1", parent_id, "脚手架租赁", 4.0, 10.0)),
        )
        .expect("重算失败");

    assert_eq!(report.verdict, RevisionVerdict::AutoValid);
    assert_eq!(report.budget, 100.0);

    let child_id = report.cost_item_id.expect("缺少子项ID");
    let child = CostItemRepository::new(conn.clone())
        .find_by_id(child_id)
        .unwrap()
        .unwrap();
    // 首次自动认可: bk_amount=0, bk_price=新单价
    assert_eq!(child.bk_amount, Some(0.0));
    assert_eq!(child.bk_price, Some(10.0));

    let m = CostModificationRepository::new(conn)
        .find_by_id(report.modification_id.unwrap())
        .unwrap()
        .unwrap();
    assert_eq!(m.status, ModificationStatus::Valid);
    assert_eq!(m.old_total(), 0.0);
    assert_eq!(m.new_total(), 40.0);
}

#[test]
fn test_create_overflowing_budget_goes_waiting() {
    let (_tmp, conn) = setup_test_db();
    insert_locked_project(&conn, "p1", 100.0, 0.0);
    let parent_id = insert_base_item(&conn, "p1", "土建分包", 10.0, 10.0);

    let reallocator = make_reallocator(conn.clone());
    for (title, amount) in [("甲", 4.0), ("乙", 5.0)] {
        let report = reallocator
            .reallocate(
                parent_id,
                ChildChange::Create(extra_child("p1", parent_id, title, amount, 10.0)),
            )
            .unwrap();
        assert_eq!(report.verdict, RevisionVerdict::AutoValid);
    }

    // 40 + 50 + 20 = 110 > 100, 第三项转待审
    let report = reallocator
        .reallocate(
            parent_id,
            ChildChange::Create(extra_child("p1", parent_id, "丙", 2.0, 10.0)),
        )
        .unwrap();
    assert_eq!(report.verdict, RevisionVerdict::Waiting);
    assert_eq!(report.running_total, 110.0);

    let child = CostItemRepository::new(conn.clone())
        .find_by_id(report.cost_item_id.unwrap())
        .unwrap()
        .unwrap();
    // 待审子项行值照存, 但没有认可快照
    assert_eq!(child.total(), 20.0);
    assert!(child.never_accepted());

    let m = CostModificationRepository::new(conn)
        .find_by_id(report.modification_id.unwrap())
        .unwrap()
        .unwrap();
    assert_eq!(m.status, ModificationStatus::Waiting);
}

// ==========================================
// 预算释放
// ==========================================

#[test]
fn test_delete_frees_budget_for_waiting_sibling() {
    let (_tmp, conn) = setup_test_db();
    insert_locked_project(&conn, "p1", 100.0, 0.0);
    let parent_id = insert_base_item(&conn, "p1", "土建分包", 10.0, 10.0);

    let reallocator = make_reallocator(conn.clone());
    let a = reallocator
        .reallocate(
            parent_id,
            ChildChange::Create(extra_child("p1", parent_id, "甲", 4.0, 10.0)),
        )
        .unwrap();
    let b = reallocator
        .reallocate(
            parent_id,
            ChildChange::Create(extra_child("p1", parent_id, "乙", 5.0, 10.0)),
        )
        .unwrap();
    let c = reallocator
        .reallocate(
            parent_id,
            ChildChange::Create(extra_child("p1", parent_id, "丙", 2.0, 10.0)),
        )
        .unwrap();
    assert_eq!(c.verdict, RevisionVerdict::Waiting);

    // 删除乙(50), 甲40 + 丙20 = 60 <= 100, 丙的待审修订应级联生效
    let report = reallocator
        .reallocate(
            parent_id,
            ChildChange::Delete {
                cost_item_id: b.cost_item_id.unwrap(),
            },
        )
        .unwrap();
    assert_eq!(report.verdict, RevisionVerdict::Deleted);
    assert_eq!(
        report.freed_modification_ids,
        vec![c.modification_id.unwrap()]
    );

    let m = CostModificationRepository::new(conn.clone())
        .find_by_id(c.modification_id.unwrap())
        .unwrap()
        .unwrap();
    assert_eq!(m.status, ModificationStatus::Valid);

    // 释放时以当前行值建立认可快照
    let child_c = CostItemRepository::new(conn.clone())
        .find_by_id(c.cost_item_id.unwrap())
        .unwrap()
        .unwrap();
    assert_eq!(child_c.bk_amount, Some(2.0));
    assert_eq!(child_c.bk_price, Some(10.0));

    let _ = a;
}

#[test]
fn test_shrinking_update_frees_waiting_sibling() {
    let (_tmp, conn) = setup_test_db();
    insert_locked_project(&conn, "p1", 100.0, 0.0);
    let parent_id = insert_base_item(&conn, "p1", "土建分包", 10.0, 10.0);

    let reallocator = make_reallocator(conn.clone());
    let a = reallocator
        .reallocate(
            parent_id,
            ChildChange::Create(extra_child("p1", parent_id, "甲", 6.0, 10.0)),
        )
        .unwrap();
    let b = reallocator
        .reallocate(
            parent_id,
            ChildChange::Create(extra_child("p1", parent_id, "乙", 5.0, 10.0)),
        )
        .unwrap();
    assert_eq!(b.verdict, RevisionVerdict::Waiting);

    // 甲 60 -> 40, 乙 50 随之放得下
    let report = reallocator
        .reallocate(
            parent_id,
            ChildChange::Update {
                cost_item_id: a.cost_item_id.unwrap(),
                new_amount: 4.0,
                new_price: 10.0,
            },
        )
        .unwrap();
    assert_eq!(report.verdict, RevisionVerdict::AutoValid);
    assert_eq!(
        report.freed_modification_ids,
        vec![b.modification_id.unwrap()]
    );
    assert_eq!(report.running_total, 90.0);
}

// ==========================================
// 超额费用闸门
// ==========================================

#[test]
fn test_gate_overrides_local_budget_fit() {
    let (_tmp, conn) = setup_test_db();
    // 基准1000, 上限5% => 认可增长不得超过50
    insert_locked_project(&conn, "p1", 5.0, 0.0);
    let parent_id = insert_base_item(&conn, "p1", "主体工程", 1000.0, 1.0);

    let reallocator = make_reallocator(conn.clone());
    let first = reallocator
        .reallocate(
            parent_id,
            ChildChange::Create(extra_child("p1", parent_id, "增项一", 30.0, 1.0)),
        )
        .unwrap();
    assert_eq!(first.verdict, RevisionVerdict::AutoValid);

    // 第二笔30在父项预算内 (60 <= 1000), 但认可增长 1030+30-1000=60 > 50
    let second = reallocator
        .reallocate(
            parent_id,
            ChildChange::Create(extra_child("p1", parent_id, "增项二", 30.0, 1.0)),
        )
        .unwrap();
    assert_eq!(second.verdict, RevisionVerdict::Waiting);
    let gate = second.gate.expect("缺少闸门评估");
    assert!(gate.exceeded);
    assert_eq!(gate.cap, 50.0);
    assert_eq!(gate.projected_growth, 60.0);
}

// ==========================================
// 不变量与前置
// ==========================================

#[test]
fn test_second_revision_blocked_while_waiting() {
    let (_tmp, conn) = setup_test_db();
    insert_locked_project(&conn, "p1", 100.0, 0.0);
    let parent_id = insert_base_item(&conn, "p1", "土建分包", 10.0, 10.0);

    let reallocator = make_reallocator(conn.clone());
    let overflow = reallocator
        .reallocate(
            parent_id,
            ChildChange::Create(extra_child("p1", parent_id, "甲", 15.0, 10.0)),
        )
        .unwrap();
    assert_eq!(overflow.verdict, RevisionVerdict::Waiting);

    // 同一子项已有待审修订, 再次修订被拒
    let result = reallocator.reallocate(
        parent_id,
        ChildChange::Update {
            cost_item_id: overflow.cost_item_id.unwrap(),
            new_amount: 5.0,
            new_price: 10.0,
        },
    );
    match result {
        Err(LedgerError::Conflict(_)) => {}
        other => panic!("expected Conflict, got {:?}", other.map(|r| r.verdict)),
    }
}

#[test]
fn test_same_values_update_is_noop() {
    let (_tmp, conn) = setup_test_db();
    insert_locked_project(&conn, "p1", 100.0, 0.0);
    let parent_id = insert_base_item(&conn, "p1", "土建分包", 10.0, 10.0);

    let reallocator = make_reallocator(conn.clone());
    let a = reallocator
        .reallocate(
            parent_id,
            ChildChange::Create(extra_child("p1", parent_id, "甲", 4.0, 10.0)),
        )
        .unwrap();

    let report = reallocator
        .reallocate(
            parent_id,
            ChildChange::Update {
                cost_item_id: a.cost_item_id.unwrap(),
                new_amount: 4.0,
                new_price: 10.0,
            },
        )
        .unwrap();
    assert_eq!(report.verdict, RevisionVerdict::NoOp);
    assert!(report.modification_id.is_none());

    // 未追加新的修订行
    let mods = CostModificationRepository::new(conn)
        .find_by_filter(&Default::default())
        .unwrap();
    assert_eq!(mods.len(), 1);
}

#[test]
fn test_parent_flag_follows_children() {
    let (_tmp, conn) = setup_test_db();
    insert_locked_project(&conn, "p1", 100.0, 0.0);
    let parent_id = insert_base_item(&conn, "p1", "土建分包", 10.0, 10.0);

    let reallocator = make_reallocator(conn.clone());
    let item_repo = CostItemRepository::new(conn.clone());
    assert!(!item_repo.find_by_id(parent_id).unwrap().unwrap().is_parent);

    let a = reallocator
        .reallocate(
            parent_id,
            ChildChange::Create(extra_child("p1", parent_id, "甲", 4.0, 10.0)),
        )
        .unwrap();
    assert!(item_repo.find_by_id(parent_id).unwrap().unwrap().is_parent);

    reallocator
        .reallocate(
            parent_id,
            ChildChange::Delete {
                cost_item_id: a.cost_item_id.unwrap(),
            },
        )
        .unwrap();
    assert!(!item_repo.find_by_id(parent_id).unwrap().unwrap().is_parent);
}

#[test]
fn test_unlocked_quotation_refuses_revision() {
    let (_tmp, conn) = setup_test_db();
    insert_unlocked_project(&conn, "p1");
    let parent_id = insert_base_item(&conn, "p1", "土建分包", 10.0, 10.0);

    let reallocator = make_reallocator(conn);
    let result = reallocator.reallocate(
        parent_id,
        ChildChange::Create(extra_child("p1", parent_id, "甲", 1.0, 10.0)),
    );
    match result {
        Err(LedgerError::Validation(_)) => {}
        other => panic!("expected Validation, got {:?}", other.map(|r| r.verdict)),
    }
}

#[test]
fn test_update_keeps_existing_snapshot() {
    let (_tmp, conn) = setup_test_db();
    insert_locked_project(&conn, "p1", 100.0, 0.0);
    let parent_id = insert_base_item(&conn, "p1", "土建分包", 10.0, 10.0);

    let reallocator = make_reallocator(conn.clone());
    let a = reallocator
        .reallocate(
            parent_id,
            ChildChange::Create(extra_child("p1", parent_id, "甲", 4.0, 10.0)),
        )
        .unwrap();
    let child_id = a.cost_item_id.unwrap();

    let report = reallocator
        .reallocate(
            parent_id,
            ChildChange::Update {
                cost_item_id: child_id,
                new_amount: 5.0,
                new_price: 10.0,
            },
        )
        .unwrap();
    assert_eq!(report.verdict, RevisionVerdict::AutoValid);

    let child = CostItemRepository::new(conn)
        .find_by_id(child_id)
        .unwrap()
        .unwrap();
    // 行值更新, 已有认可快照不被覆盖
    assert_eq!(child.total(), 50.0);
    assert_eq!(child.bk_amount, Some(0.0));
    assert_eq!(child.bk_price, Some(10.0));
}
