// ==========================================
// 采购单/变更单升级审批集成测试
// ==========================================
// 测试范围:
// 1. 采购单金额阈值升级 (追加总经理席位)
// 2. 变更单总经理一票定论
// 3. 驳回后重新提交, 名册整册重建
// 4. 无席位角色拒绝表态
// ==========================================


use std::sync::{Arc, Mutex};

use rusqlite::Connection;
use tempfile::NamedTempFile;

use cost_ledger::api::purchase_order_api::CreatePurchaseOrderRequest;
use cost_ledger::api::variation_order_api::CreateVariationOrderRequest;
use cost_ledger::api::{PurchaseOrderApi, RefusalKind, VariationOrderApi};
use cost_ledger::domain::types::{
    Actor, ApprovalDecision, ApprovalStatus, ApproverStatus, Role,
};
use cost_ledger::engine::{EscalationEngine, QuorumOutcome};
use cost_ledger::repository::{
    ApproverRepository, PurchaseOrderRepository, VariationOrderRepository,
};
use test_helpers::*;

fn ceo() -> Actor {
    Actor::new("u-ceo", Role::ChiefExecutive)
}

fn pm() -> Actor {
    Actor::new("u-pm", Role::ProcurementManager)
}

fn setup_po_api() -> (NamedTempFile, Arc<Mutex<Connection>>, PurchaseOrderApi) {
    let (tmp, conn) = setup_test_db();
    let api = PurchaseOrderApi::new(
        conn.clone(),
        Arc::new(PurchaseOrderRepository::new(conn.clone())),
        Arc::new(ApproverRepository::new(conn.clone())),
        Arc::new(EscalationEngine::new(conn.clone())),
    );
    (tmp, conn, api)
}

fn setup_vo_api() -> (NamedTempFile, Arc<Mutex<Connection>>, VariationOrderApi) {
    let (tmp, conn) = setup_test_db();
    let api = VariationOrderApi::new(
        Arc::new(VariationOrderRepository::new(conn.clone())),
        Arc::new(ApproverRepository::new(conn.clone())),
        Arc::new(EscalationEngine::new(conn.clone())),
    );
    (tmp, conn, api)
}

// ==========================================
// 采购单
// ==========================================

#[test]
fn test_po_below_threshold_stays_with_manager_chain() {
    let (_tmp, conn, api) = setup_po_api();
    insert_locked_project(&conn, "p1", 100.0, 1000.0);
    let item_id = insert_base_item(&conn, "p1", "钢筋采购", 100.0, 1.0);

    let po = api
        .create_order(CreatePurchaseOrderRequest {
            project_id: "p1".to_string(),
            title: "一号采购单".to_string(),
            vendor_id: None,
        })
        .unwrap();
    api.assign_items(&po.po_id, &[item_id]).unwrap();

    let roster = api.submit(&po.po_id).unwrap().data.unwrap();
    assert_eq!(roster, vec![Role::ProcurementManager]);

    let report = api
        .decide(&pm(), &po.po_id, ApprovalDecision::Approve)
        .unwrap()
        .data
        .unwrap();
    assert_eq!(report.outcome, QuorumOutcome::Approved);
    assert_eq!(report.status, ApprovalStatus::Approved);
}

#[test]
fn test_po_over_threshold_escalates_to_ceo() {
    let (_tmp, conn, api) = setup_po_api();
    insert_locked_project(&conn, "p1", 100.0, 1000.0);
    let item_id = insert_base_item(&conn, "p1", "主材采购", 1500.0, 1.0);

    let po = api
        .create_order(CreatePurchaseOrderRequest {
            project_id: "p1".to_string(),
            title: "大额采购单".to_string(),
            vendor_id: Some("v-01".to_string()),
        })
        .unwrap();
    api.assign_items(&po.po_id, &[item_id]).unwrap();

    let roster = api.submit(&po.po_id).unwrap().data.unwrap();
    assert!(roster.contains(&Role::ChiefExecutive));

    // 经理链表态后仍需总经理定论
    let report = api
        .decide(&pm(), &po.po_id, ApprovalDecision::Approve)
        .unwrap()
        .data
        .unwrap();
    assert_eq!(report.outcome, QuorumOutcome::Pending);
    assert_eq!(report.status, ApprovalStatus::WaitingApproval);

    let report = api
        .decide(&ceo(), &po.po_id, ApprovalDecision::Approve)
        .unwrap()
        .data
        .unwrap();
    assert_eq!(report.outcome, QuorumOutcome::Approved);

    let po = api.get_order(&po.po_id).unwrap().unwrap();
    assert_eq!(po.status, ApprovalStatus::Approved);
}

#[test]
fn test_po_rejection_and_fresh_resubmission() {
    let (_tmp, conn, api) = setup_po_api();
    insert_locked_project(&conn, "p1", 100.0, 1000.0);
    let item_id = insert_base_item(&conn, "p1", "零星采购", 100.0, 1.0);

    let po = api
        .create_order(CreatePurchaseOrderRequest {
            project_id: "p1".to_string(),
            title: "待返工采购单".to_string(),
            vendor_id: None,
        })
        .unwrap();
    api.assign_items(&po.po_id, &[item_id]).unwrap();
    api.submit(&po.po_id).unwrap();

    let report = api
        .decide(&pm(), &po.po_id, ApprovalDecision::Reject)
        .unwrap()
        .data
        .unwrap();
    assert_eq!(report.status, ApprovalStatus::Rejected);

    // 重新提交: 名册整册重建, 上一轮表态不得泄漏
    api.submit(&po.po_id).unwrap();
    let roster = api.get_roster(&po.po_id).unwrap();
    assert!(roster.iter().all(|a| a.status == ApproverStatus::Waiting));
    assert!(roster.iter().all(|a| a.user_id.is_none()));
}

#[test]
fn test_po_cross_project_item_refused() {
    let (_tmp, conn, api) = setup_po_api();
    insert_locked_project(&conn, "p1", 100.0, 1000.0);
    insert_locked_project(&conn, "p2", 100.0, 1000.0);
    let foreign_item = insert_base_item(&conn, "p2", "他项目成本", 100.0, 1.0);

    let po = api
        .create_order(CreatePurchaseOrderRequest {
            project_id: "p1".to_string(),
            title: "采购单".to_string(),
            vendor_id: None,
        })
        .unwrap();
    assert!(api.assign_items(&po.po_id, &[foreign_item]).is_err());
}

// ==========================================
// 变更单
// ==========================================

#[test]
fn test_vo_ceo_vote_is_decisive() {
    let (_tmp, conn, api) = setup_vo_api();
    insert_locked_project(&conn, "p1", 100.0, 0.0);

    let vo = api
        .create_order(CreateVariationOrderRequest {
            project_id: "p1".to_string(),
            title: "设计变更一".to_string(),
        })
        .unwrap();
    let roster = api.submit(&vo.vo_id).unwrap().data.unwrap();
    assert!(roster.contains(&Role::ChiefExecutive));

    // 其余席位未表态, 总经理同意即通过
    let report = api
        .decide(&ceo(), &vo.vo_id, ApprovalDecision::Approve)
        .unwrap()
        .data
        .unwrap();
    assert_eq!(report.outcome, QuorumOutcome::Approved);

    let vo = api.get_order(&vo.vo_id).unwrap().unwrap();
    assert_eq!(vo.status, ApprovalStatus::Approved);
}

#[test]
fn test_vo_rejection_held_until_ceo_decides() {
    let (_tmp, conn, api) = setup_vo_api();
    insert_locked_project(&conn, "p1", 100.0, 0.0);

    let vo = api
        .create_order(CreateVariationOrderRequest {
            project_id: "p1".to_string(),
            title: "设计变更二".to_string(),
        })
        .unwrap();
    api.submit(&vo.vo_id).unwrap();

    // 项目经理驳回不定论, 单据悬置等总经理
    let project_manager = Actor::new("u-proj", Role::ProjectManager);
    let report = api
        .decide(&project_manager, &vo.vo_id, ApprovalDecision::Reject)
        .unwrap()
        .data
        .unwrap();
    assert_eq!(report.outcome, QuorumOutcome::Pending);

    let report = api
        .decide(&ceo(), &vo.vo_id, ApprovalDecision::Reject)
        .unwrap()
        .data
        .unwrap();
    assert_eq!(report.outcome, QuorumOutcome::Rejected);
    assert_eq!(report.status, ApprovalStatus::Rejected);
}

#[test]
fn test_vo_decision_without_seat_refused() {
    let (_tmp, conn, api) = setup_vo_api();
    insert_locked_project(&conn, "p1", 100.0, 0.0);

    let vo = api
        .create_order(CreateVariationOrderRequest {
            project_id: "p1".to_string(),
            title: "设计变更三".to_string(),
        })
        .unwrap();
    api.submit(&vo.vo_id).unwrap();

    // 会计不在名册里, 表态被类型化拒绝
    let accountant = Actor::new("u-acc", Role::Accountant);
    let outcome = api
        .decide(&accountant, &vo.vo_id, ApprovalDecision::Approve)
        .unwrap();
    assert!(!outcome.is_accepted());
    assert_eq!(outcome.refusal.unwrap().kind, RefusalKind::Permission);
}

#[test]
fn test_approved_po_cannot_be_cancelled() {
    let (_tmp, conn, api) = setup_po_api();
    insert_locked_project(&conn, "p1", 100.0, 1000.0);
    let item_id = insert_base_item(&conn, "p1", "零星采购", 100.0, 1.0);

    let po = api
        .create_order(CreatePurchaseOrderRequest {
            project_id: "p1".to_string(),
            title: "采购单".to_string(),
            vendor_id: None,
        })
        .unwrap();
    api.assign_items(&po.po_id, &[item_id]).unwrap();

    // 审批中可作废
    api.submit(&po.po_id).unwrap();
    let outcome = api.cancel(&po.po_id).unwrap();
    assert!(outcome.is_accepted());
    assert_eq!(
        api.get_order(&po.po_id).unwrap().unwrap().status,
        ApprovalStatus::Cancelled
    );

    // 已通过的单据不可作废
    let po2 = api
        .create_order(CreatePurchaseOrderRequest {
            project_id: "p1".to_string(),
            title: "二号采购单".to_string(),
            vendor_id: None,
        })
        .unwrap();
    api.assign_items(&po2.po_id, &[item_id]).unwrap();
    api.submit(&po2.po_id).unwrap();
    api.decide(&pm(), &po2.po_id, ApprovalDecision::Approve)
        .unwrap();
    let outcome = api.cancel(&po2.po_id).unwrap();
    assert!(!outcome.is_accepted());
    assert_eq!(outcome.refusal.unwrap().kind, RefusalKind::Conflict);
}

#[test]
fn test_vo_cannot_be_decided_before_submission() {
    let (_tmp, conn, api) = setup_vo_api();
    insert_locked_project(&conn, "p1", 100.0, 0.0);

    let vo = api
        .create_order(CreateVariationOrderRequest {
            project_id: "p1".to_string(),
            title: "设计变更四".to_string(),
        })
        .unwrap();

    let outcome = api
        .decide(&ceo(), &vo.vo_id, ApprovalDecision::Approve)
        .unwrap();
    assert!(!outcome.is_accepted());
    assert_eq!(outcome.refusal.unwrap().kind, RefusalKind::Conflict);
}
