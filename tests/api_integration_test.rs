// ==========================================
// API 层端到端测试
// ==========================================
// 测试范围: 成本项 API -> 重算器 -> 修订 API -> 决策引擎
// 的完整修订闭环, 以及类型化拒绝的返回形态
// ==========================================


use std::sync::Arc;

use cost_ledger::api::cost_item_api::{CreateExtraItemRequest, UpdateExtraItemRequest};
use cost_ledger::api::{CostItemApi, CostModificationApi, RefusalKind};
use cost_ledger::domain::cost_modification::ModificationFilter;
use cost_ledger::domain::types::{Actor, ApprovalDecision, ModificationStatus, Role};
use cost_ledger::engine::RevisionVerdict;
use cost_ledger::repository::{CostItemRepository, CostModificationRepository, ProjectRepository};
use test_helpers::*;

fn surveyor() -> Actor {
    Actor::new("u-qs", Role::QuantitySurveyor)
}

#[test]
fn test_full_revision_cycle_through_api() {
    let (_tmp, conn) = setup_test_db();
    insert_locked_project(&conn, "p1", 1000.0, 0.0);
    let parent_id = insert_base_item(&conn, "p1", "土建分包", 10.0, 10.0);

    let item_api = CostItemApi::new(
        Arc::new(make_reallocator(conn.clone())),
        Arc::new(CostItemRepository::new(conn.clone())),
        Arc::new(ProjectRepository::new(conn.clone())),
    );
    let mod_api = CostModificationApi::new(
        Arc::new(make_approval_engine(conn.clone())),
        Arc::new(CostModificationRepository::new(conn.clone())),
    );

    // 预算内追加自动生效
    let outcome = item_api
        .create_extra_item(
            &surveyor(),
            parent_id,
            CreateExtraItemRequest {
                title: "模板加固".to_string(),
                vendor_id: None,
                amount: 4.0,
                price: 10.0,
            },
        )
        .unwrap();
    assert!(outcome.is_accepted());
    let report = outcome.data.unwrap();
    assert_eq!(report.verdict, RevisionVerdict::AutoValid);

    // 超预算修改转待审
    let outcome = item_api
        .update_extra_item(
            &surveyor(),
            parent_id,
            UpdateExtraItemRequest {
                cost_item_id: report.cost_item_id.unwrap(),
                amount: 15.0,
                price: 10.0,
            },
        )
        .unwrap();
    let update = outcome.data.unwrap();
    assert_eq!(update.verdict, RevisionVerdict::Waiting);

    // 总经理批准后落值
    let decision = mod_api
        .decide(
            &Actor::new("u-ceo", Role::ChiefExecutive),
            update.modification_id.unwrap(),
            ApprovalDecision::Approve,
        )
        .unwrap()
        .data
        .unwrap();
    assert_eq!(decision.status, ModificationStatus::Approved);

    // 台账保留全部修订历史
    let ledger = mod_api
        .list_modifications(&ModificationFilter {
            project_id: Some("p1".to_string()),
            ..Default::default()
        })
        .unwrap();
    assert_eq!(ledger.len(), 2);
    assert!(ledger
        .iter()
        .all(|m| m.status != ModificationStatus::Waiting));
}

#[test]
fn test_accountant_refused_with_typed_reason() {
    let (_tmp, conn) = setup_test_db();
    insert_locked_project(&conn, "p1", 1000.0, 0.0);
    let parent_id = insert_base_item(&conn, "p1", "土建分包", 10.0, 10.0);

    let item_api = CostItemApi::new(
        Arc::new(make_reallocator(conn.clone())),
        Arc::new(CostItemRepository::new(conn.clone())),
        Arc::new(ProjectRepository::new(conn)),
    );

    let outcome = item_api
        .create_extra_item(
            &Actor::new("u-acc", Role::Accountant),
            parent_id,
            CreateExtraItemRequest {
                title: "杂项".to_string(),
                vendor_id: None,
                amount: 1.0,
                price: 10.0,
            },
        )
        .unwrap();
    assert!(!outcome.is_accepted());
    assert_eq!(outcome.refusal.unwrap().kind, RefusalKind::Permission);
}

#[test]
fn test_baseline_item_only_before_quotation_lock() {
    let (_tmp, conn) = setup_test_db();
    insert_unlocked_project(&conn, "p-open");
    insert_locked_project(&conn, "p-locked", 1000.0, 0.0);

    let item_api = CostItemApi::new(
        Arc::new(make_reallocator(conn.clone())),
        Arc::new(CostItemRepository::new(conn.clone())),
        Arc::new(ProjectRepository::new(conn.clone())),
    );

    // 报价编制期可直接录入基准行
    let outcome = item_api
        .create_baseline_item(
            &surveyor(),
            "p-open",
            CreateExtraItemRequest {
                title: "基础开挖".to_string(),
                vendor_id: None,
                amount: 100.0,
                price: 5.0,
            },
        )
        .unwrap();
    assert!(outcome.is_accepted());
    let item = CostItemRepository::new(conn)
        .find_by_id(outcome.data.unwrap())
        .unwrap()
        .unwrap();
    assert!(!item.is_extra);

    // 报价锁定后基准行入口关闭
    let outcome = item_api
        .create_baseline_item(
            &surveyor(),
            "p-locked",
            CreateExtraItemRequest {
                title: "基础开挖".to_string(),
                vendor_id: None,
                amount: 100.0,
                price: 5.0,
            },
        )
        .unwrap();
    assert!(!outcome.is_accepted());
    assert_eq!(outcome.refusal.unwrap().kind, RefusalKind::Conflict);
}

#[test]
fn test_invalid_input_rejected_before_engine() {
    let (_tmp, conn) = setup_test_db();
    insert_locked_project(&conn, "p1", 1000.0, 0.0);
    let parent_id = insert_base_item(&conn, "p1", "土建分包", 10.0, 10.0);

    let item_api = CostItemApi::new(
        Arc::new(make_reallocator(conn.clone())),
        Arc::new(CostItemRepository::new(conn.clone())),
        Arc::new(ProjectRepository::new(conn)),
    );

    // 空名称与负单价在 API 层直接拒绝
    assert!(item_api
        .create_extra_item(
            &surveyor(),
            parent_id,
            CreateExtraItemRequest {
                title: "  ".to_string(),
                vendor_id: None,
                amount: 1.0,
                price: 10.0,
            },
        )
        .is_err());
    assert!(item_api
        .create_extra_item(
            &surveyor(),
            parent_id,
            CreateExtraItemRequest {
                title: "杂项".to_string(),
                vendor_id: None,
                amount: 1.0,
                price: -10.0,
            },
        )
        .is_err());
}
