// ==========================================
// 工程成本修订台账系统 - 采购单/变更单仓储
// ==========================================
// 两张表结构一致, 共用行映射模板; 审批语义差异在引擎层
// (escalation policy) 表达, 仓储只管读写
// ==========================================

use std::sync::{Arc, Mutex};

use chrono::NaiveDateTime;
use rusqlite::{params, Connection, Row};

use crate::domain::approval::{PurchaseOrder, VariationOrder};
use crate::domain::types::ApprovalStatus;
use crate::repository::error::{RepositoryError, RepositoryResult};

// ==========================================
// PurchaseOrderRepository
// ==========================================
pub struct PurchaseOrderRepository {
    conn: Arc<Mutex<Connection>>,
}

impl PurchaseOrderRepository {
    pub fn new(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    fn get_conn(&self) -> RepositoryResult<std::sync::MutexGuard<Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    pub fn create(&self, po: &PurchaseOrder) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        conn.execute(
            r#"INSERT INTO purchase_order (po_id, project_id, title, vendor_id, status)
               VALUES (?1, ?2, ?3, ?4, ?5)"#,
            params![
                &po.po_id,
                &po.project_id,
                &po.title,
                &po.vendor_id,
                po.status.to_db_str(),
            ],
        )?;
        Ok(())
    }

    pub fn find_by_id(&self, po_id: &str) -> RepositoryResult<Option<PurchaseOrder>> {
        let conn = self.get_conn()?;
        Self::find_by_id_in(&conn, po_id)
    }

    pub fn find_by_id_in(conn: &Connection, po_id: &str) -> RepositoryResult<Option<PurchaseOrder>> {
        let mut stmt = conn.prepare(
            r#"SELECT po_id, project_id, title, vendor_id, status, created_at, updated_at
               FROM purchase_order WHERE po_id = ?1"#,
        )?;
        let mut rows = stmt.query_map(params![po_id], map_po_row)?;
        match rows.next() {
            Some(row) => Ok(Some(row?)),
            None => Ok(None),
        }
    }

    pub fn get_in(conn: &Connection, po_id: &str) -> RepositoryResult<PurchaseOrder> {
        Self::find_by_id_in(conn, po_id)?.ok_or_else(|| RepositoryError::NotFound {
            entity: "PurchaseOrder".to_string(),
            id: po_id.to_string(),
        })
    }

    pub fn update_status_in(
        conn: &Connection,
        po_id: &str,
        status: ApprovalStatus,
    ) -> RepositoryResult<()> {
        let changed = conn.execute(
            r#"UPDATE purchase_order
               SET status = ?2, updated_at = datetime('now')
               WHERE po_id = ?1"#,
            params![po_id, status.to_db_str()],
        )?;
        if changed == 0 {
            return Err(RepositoryError::NotFound {
                entity: "PurchaseOrder".to_string(),
                id: po_id.to_string(),
            });
        }
        Ok(())
    }
}

// ==========================================
// VariationOrderRepository
// ==========================================
pub struct VariationOrderRepository {
    conn: Arc<Mutex<Connection>>,
}

impl VariationOrderRepository {
    pub fn new(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    fn get_conn(&self) -> RepositoryResult<std::sync::MutexGuard<Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    pub fn create(&self, vo: &VariationOrder) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        conn.execute(
            r#"INSERT INTO variation_order (vo_id, project_id, title, status)
               VALUES (?1, ?2, ?3, ?4)"#,
            params![&vo.vo_id, &vo.project_id, &vo.title, vo.status.to_db_str()],
        )?;
        Ok(())
    }

    pub fn find_by_id(&self, vo_id: &str) -> RepositoryResult<Option<VariationOrder>> {
        let conn = self.get_conn()?;
        Self::find_by_id_in(&conn, vo_id)
    }

    pub fn find_by_id_in(conn: &Connection, vo_id: &str) -> RepositoryResult<Option<VariationOrder>> {
        let mut stmt = conn.prepare(
            r#"SELECT vo_id, project_id, title, status, created_at, updated_at
               FROM variation_order WHERE vo_id = ?1"#,
        )?;
        let mut rows = stmt.query_map(params![vo_id], map_vo_row)?;
        match rows.next() {
            Some(row) => Ok(Some(row?)),
            None => Ok(None),
        }
    }

    pub fn get_in(conn: &Connection, vo_id: &str) -> RepositoryResult<VariationOrder> {
        Self::find_by_id_in(conn, vo_id)?.ok_or_else(|| RepositoryError::NotFound {
            entity: "VariationOrder".to_string(),
            id: vo_id.to_string(),
        })
    }

    pub fn update_status_in(
        conn: &Connection,
        vo_id: &str,
        status: ApprovalStatus,
    ) -> RepositoryResult<()> {
        let changed = conn.execute(
            r#"UPDATE variation_order
               SET status = ?2, updated_at = datetime('now')
               WHERE vo_id = ?1"#,
            params![vo_id, status.to_db_str()],
        )?;
        if changed == 0 {
            return Err(RepositoryError::NotFound {
                entity: "VariationOrder".to_string(),
                id: vo_id.to_string(),
            });
        }
        Ok(())
    }
}

fn map_po_row(row: &Row<'_>) -> rusqlite::Result<PurchaseOrder> {
    let status: String = row.get(4)?;
    Ok(PurchaseOrder {
        po_id: row.get(0)?,
        project_id: row.get(1)?,
        title: row.get(2)?,
        vendor_id: row.get(3)?,
        status: ApprovalStatus::from_str(&status),
        created_at: parse_ts(row, 5)?,
        updated_at: parse_ts(row, 6)?,
    })
}

fn map_vo_row(row: &Row<'_>) -> rusqlite::Result<VariationOrder> {
    let status: String = row.get(3)?;
    Ok(VariationOrder {
        vo_id: row.get(0)?,
        project_id: row.get(1)?,
        title: row.get(2)?,
        status: ApprovalStatus::from_str(&status),
        created_at: parse_ts(row, 4)?,
        updated_at: parse_ts(row, 5)?,
    })
}

fn parse_ts(row: &Row<'_>, idx: usize) -> rusqlite::Result<NaiveDateTime> {
    let s: String = row.get(idx)?;
    NaiveDateTime::parse_from_str(&s, "%Y-%m-%d %H:%M:%S").map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(e))
    })
}
