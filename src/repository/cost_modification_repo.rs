// ==========================================
// 工程成本修订台账系统 - 成本修订仓储
// ==========================================
// 红线: 修订行是审计台账, 只追加与改状态, 永不删除
// 约定: "最新修订" 按 modification_id 降序取第一条,
//       重算器只看最新一条 (历史行仅作审计)
// ==========================================

use std::sync::{Arc, Mutex};

use chrono::NaiveDateTime;
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, Row};

use crate::domain::cost_modification::{CostModification, ModificationFilter, NewCostModification};
use crate::domain::types::ModificationStatus;
use crate::repository::error::{RepositoryError, RepositoryResult};

pub struct CostModificationRepository {
    conn: Arc<Mutex<Connection>>,
}

impl CostModificationRepository {
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

    /// 插入修订行, 返回自增ID
    pub fn insert_in(conn: &Connection, m: &NewCostModification) -> RepositoryResult<i64> {
        conn.execute(
            r#"INSERT INTO cost_modification (
                    project_id, cost_item_id,
                    old_amount, old_price, new_amount, new_price, status
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)"#,
            params![
                &m.project_id,
                &m.cost_item_id,
                &m.old_amount,
                &m.old_price,
                &m.new_amount,
                &m.new_price,
                m.status.to_db_str(),
            ],
        )?;
        Ok(conn.last_insert_rowid())
    }

    /// 批量把 WAITING 修订转为 VALID (预算腾出后的级联生效)
    pub fn bulk_mark_valid_in(conn: &Connection, modification_ids: &[i64]) -> RepositoryResult<usize> {
        if modification_ids.is_empty() {
            return Ok(0);
        }
        let placeholders = std::iter::repeat("?")
            .take(modification_ids.len())
            .collect::<Vec<_>>()
            .join(", ");
        let sql = format!(
            "UPDATE cost_modification SET status = 'VALID' \
             WHERE modification_id IN ({}) AND status = 'WAITING'",
            placeholders
        );
        let values: Vec<Value> = modification_ids.iter().map(|id| Value::from(*id)).collect();
        let changed = conn.execute(&sql, params_from_iter(values.iter()))?;
        Ok(changed)
    }

    /// 记录人工决策 (终态)
    pub fn decide_in(
        conn: &Connection,
        modification_id: i64,
        status: ModificationStatus,
        approve_by: &str,
    ) -> RepositoryResult<()> {
        let changed = conn.execute(
            r#"UPDATE cost_modification
               SET status = ?2, approve_by = ?3, decided_at = datetime('now')
               WHERE modification_id = ?1 AND status = 'WAITING'"#,
            params![modification_id, status.to_db_str(), approve_by],
        )?;
        if changed == 0 {
            return Err(RepositoryError::BusinessRuleViolation(format!(
                "修订{}不处于 WAITING, 无法落人工决策",
                modification_id
            )));
        }
        Ok(())
    }

    // ==========================================
    // 查询接口
    // ==========================================

    pub fn find_by_id(&self, modification_id: i64) -> RepositoryResult<Option<CostModification>> {
        let conn = self.get_conn()?;
        Self::find_by_id_in(&conn, modification_id)
    }

    pub fn find_by_id_in(
        conn: &Connection,
        modification_id: i64,
    ) -> RepositoryResult<Option<CostModification>> {
        let mut stmt = conn.prepare(&format!(
            "{} WHERE modification_id = ?1",
            SELECT_MODIFICATION
        ))?;
        let mut rows = stmt.query_map(params![modification_id], map_row)?;
        match rows.next() {
            Some(row) => Ok(Some(row?)),
            None => Ok(None),
        }
    }

    /// 查询修订, 不存在则报 NotFound (事务内)
    pub fn get_in(conn: &Connection, modification_id: i64) -> RepositoryResult<CostModification> {
        Self::find_by_id_in(conn, modification_id)?.ok_or_else(|| RepositoryError::NotFound {
            entity: "CostModification".to_string(),
            id: modification_id.to_string(),
        })
    }

    /// 成本项的最新修订 (按 modification_id 降序第一条)
    pub fn latest_for_item_in(
        conn: &Connection,
        cost_item_id: i64,
    ) -> RepositoryResult<Option<CostModification>> {
        let mut stmt = conn.prepare(&format!(
            "{} WHERE cost_item_id = ?1 ORDER BY modification_id DESC LIMIT 1",
            SELECT_MODIFICATION
        ))?;
        let mut rows = stmt.query_map(params![cost_item_id], map_row)?;
        match rows.next() {
            Some(row) => Ok(Some(row?)),
            None => Ok(None),
        }
    }

    /// 成本项当前的 WAITING 修订 (不变量: 至多一条)
    pub fn find_waiting_for_item_in(
        conn: &Connection,
        cost_item_id: i64,
    ) -> RepositoryResult<Option<CostModification>> {
        let mut stmt = conn.prepare(&format!(
            "{} WHERE cost_item_id = ?1 AND status = 'WAITING' ORDER BY modification_id DESC LIMIT 1",
            SELECT_MODIFICATION
        ))?;
        let mut rows = stmt.query_map(params![cost_item_id], map_row)?;
        match rows.next() {
            Some(row) => Ok(Some(row?)),
            None => Ok(None),
        }
    }

    /// 按显式过滤条件查询 (审计/前端列表)
    pub fn find_by_filter(&self, filter: &ModificationFilter) -> RepositoryResult<Vec<CostModification>> {
        let conn = self.get_conn()?;

        let mut sql = format!("{} WHERE 1=1", SELECT_MODIFICATION);
        let mut values: Vec<Value> = Vec::new();

        if let Some(ref project_id) = filter.project_id {
            sql.push_str(" AND project_id = ?");
            values.push(Value::from(project_id.clone()));
        }
        if let Some(cost_item_id) = filter.cost_item_id {
            sql.push_str(" AND cost_item_id = ?");
            values.push(Value::from(cost_item_id));
        }
        if let Some(status) = filter.status {
            sql.push_str(" AND status = ?");
            values.push(Value::from(status.to_db_str().to_string()));
        }

        sql.push_str(" ORDER BY modification_id ASC");

        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
            .query_map(params_from_iter(values.iter()), map_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }
}

const SELECT_MODIFICATION: &str = r#"SELECT modification_id, project_id, cost_item_id,
       old_amount, old_price, new_amount, new_price,
       status, approve_by, created_at, decided_at
FROM cost_modification"#;

fn map_row(row: &Row<'_>) -> rusqlite::Result<CostModification> {
    let status: String = row.get(7)?;
    Ok(CostModification {
        modification_id: row.get(0)?,
        project_id: row.get(1)?,
        cost_item_id: row.get(2)?,
        old_amount: row.get(3)?,
        old_price: row.get(4)?,
        new_amount: row.get(5)?,
        new_price: row.get(6)?,
        status: ModificationStatus::from_str(&status),
        approve_by: row.get(8)?,
        created_at: parse_ts(row, 9)?,
        decided_at: parse_opt_ts(row, 10)?,
    })
}

fn parse_ts(row: &Row<'_>, idx: usize) -> rusqlite::Result<NaiveDateTime> {
    let s: String = row.get(idx)?;
    NaiveDateTime::parse_from_str(&s, "%Y-%m-%d %H:%M:%S").map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(e))
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
