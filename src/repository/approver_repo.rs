// ==========================================
// 工程成本修订台账系统 - 审批人名册仓储
// ==========================================
// 红线: 重新提交审批时名册整体删除重建, 不做原地改写,
//       保证上一轮的表态不会泄漏进新一轮
// ==========================================

use std::sync::{Arc, Mutex};

use chrono::NaiveDateTime;
use rusqlite::{params, Connection, Row};

use crate::domain::approval::Approver;
use crate::domain::types::{ApprovalEntityKind, ApproverStatus, Role};
use crate::repository::error::{RepositoryError, RepositoryResult};

pub struct ApproverRepository {
    conn: Arc<Mutex<Connection>>,
}

impl ApproverRepository {
    pub fn new(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    fn get_conn(&self) -> RepositoryResult<std::sync::MutexGuard<Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    // ==========================================
    // 写入口 (事务内)
    // ==========================================

    /// 删除实体的整个名册
    pub fn delete_roster_in(
        conn: &Connection,
        kind: ApprovalEntityKind,
        entity_id: &str,
    ) -> RepositoryResult<usize> {
        let changed = conn.execute(
            "DELETE FROM approver WHERE entity_kind = ?1 AND entity_id = ?2",
            params![kind.to_db_str(), entity_id],
        )?;
        Ok(changed)
    }

    /// 按角色席位重建名册, 所有行初始 WAITING
    pub fn insert_roster_in(
        conn: &Connection,
        kind: ApprovalEntityKind,
        entity_id: &str,
        roles: &[Role],
    ) -> RepositoryResult<usize> {
        let mut stmt = conn.prepare(
            r#"INSERT INTO approver (entity_kind, entity_id, role, status)
               VALUES (?1, ?2, ?3, 'WAITING')"#,
        )?;
        for role in roles {
            stmt.execute(params![kind.to_db_str(), entity_id, role.to_db_str()])?;
        }
        Ok(roles.len())
    }

    /// 落一条表态
    pub fn record_decision_in(
        conn: &Connection,
        approver_id: i64,
        user_id: &str,
        status: ApproverStatus,
    ) -> RepositoryResult<()> {
        let changed = conn.execute(
            r#"UPDATE approver
               SET user_id = ?2, status = ?3, decided_at = datetime('now')
               WHERE approver_id = ?1 AND status = 'WAITING'"#,
            params![approver_id, user_id, status.to_db_str()],
        )?;
        if changed == 0 {
            return Err(RepositoryError::BusinessRuleViolation(format!(
                "审批席位{}已表态或不存在",
                approver_id
            )));
        }
        Ok(())
    }

    // ==========================================
    // 查询接口
    // ==========================================

    /// 实体的当前名册
    pub fn find_roster_in(
        conn: &Connection,
        kind: ApprovalEntityKind,
        entity_id: &str,
    ) -> RepositoryResult<Vec<Approver>> {
        let mut stmt = conn.prepare(&format!(
            "{} WHERE entity_kind = ?1 AND entity_id = ?2 ORDER BY approver_id ASC",
            SELECT_APPROVER
        ))?;
        let rows = stmt
            .query_map(params![kind.to_db_str(), entity_id], map_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    pub fn find_roster(
        &self,
        kind: ApprovalEntityKind,
        entity_id: &str,
    ) -> RepositoryResult<Vec<Approver>> {
        let conn = self.get_conn()?;
        Self::find_roster_in(&conn, kind, entity_id)
    }

    /// 名册中某个角色的未表态席位
    pub fn find_pending_seat_in(
        conn: &Connection,
        kind: ApprovalEntityKind,
        entity_id: &str,
        role: Role,
    ) -> RepositoryResult<Option<Approver>> {
        let mut stmt = conn.prepare(&format!(
            "{} WHERE entity_kind = ?1 AND entity_id = ?2 AND role = ?3 AND status = 'WAITING' \
             ORDER BY approver_id ASC LIMIT 1",
            SELECT_APPROVER
        ))?;
        let mut rows = stmt.query_map(
            params![kind.to_db_str(), entity_id, role.to_db_str()],
            map_row,
        )?;
        match rows.next() {
            Some(row) => Ok(Some(row?)),
            None => Ok(None),
        }
    }
}

const SELECT_APPROVER: &str = r#"SELECT approver_id, entity_kind, entity_id, role,
       user_id, status, decided_at
FROM approver"#;

fn map_row(row: &Row<'_>) -> rusqlite::Result<Approver> {
    let kind: String = row.get(1)?;
    let role: String = row.get(3)?;
    let status: String = row.get(5)?;
    Ok(Approver {
        approver_id: row.get(0)?,
        entity_kind: ApprovalEntityKind::from_str(&kind),
        entity_id: row.get(2)?,
        role: Role::from_str(&role).ok_or_else(|| {
            rusqlite::Error::FromSqlConversionFailure(
                3,
                rusqlite::types::Type::Text,
                format!("未知角色: {}", role).into(),
            )
        })?,
        user_id: row.get(4)?,
        status: ApproverStatus::from_str(&status),
        decided_at: parse_opt_ts(row, 6)?,
    })
}

fn parse_opt_ts(row: &Row<'_>, idx: usize) -> rusqlite::Result<Option<NaiveDateTime>> {
    let s: Option<String> = row.get(idx)?;
    match s {
        Some(s) => NaiveDateTime::parse_from_str(&s, "%Y-%m-%d %H:%M:%S")
            .map(Some)
            .map_err(|e| {
                rusqlite::Error::FromSqlConversionFailure(
                    idx,
                    rusqlite::types::Type::Text,
                    Box::new(e),
                )
            }),
        None => Ok(None),
    }
}
