// ==========================================
// 工程成本修订台账系统 - 成本项仓储
// ==========================================
// 红线: Repository 不含业务逻辑
// 约束: 所有查询使用参数化, 防止 SQL 注入
// 说明: 子项排序一律按 cost_item_id 升序 (创建顺序 = 预算分配优先级),
//       父子关系只存 parent_id 平表, 每次按查询重新加载避免脏内存
// ==========================================

use std::sync::{Arc, Mutex};

use chrono::NaiveDateTime;
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, Row};

use crate::domain::cost_item::{CostItem, CostItemFilter, NewCostItem};
use crate::repository::error::{RepositoryError, RepositoryResult};

pub struct CostItemRepository {
    conn: Arc<Mutex<Connection>>,
}

impl CostItemRepository {
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

    /// 插入成本项 (独立写入口, 报价编制期的基准行使用)
    pub fn create(&self, item: &NewCostItem) -> RepositoryResult<i64> {
        let conn = self.get_conn()?;
        Self::insert_in(&conn, item)
    }

    /// 插入成本项, 返回自增ID
    pub fn insert_in(conn: &Connection, item: &NewCostItem) -> RepositoryResult<i64> {
        conn.execute(
            r#"INSERT INTO cost_item (
                    project_id, parent_id, title, vendor_id,
                    amount, price, is_extra
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)"#,
            params![
                &item.project_id,
                &item.parent_id,
                &item.title,
                &item.vendor_id,
                &item.amount,
                &item.price,
                item.is_extra as i64,
            ],
        )?;
        Ok(conn.last_insert_rowid())
    }

    /// 改写当前认可的数量/单价
    pub fn update_values_in(
        conn: &Connection,
        cost_item_id: i64,
        amount: f64,
        price: f64,
    ) -> RepositoryResult<()> {
        let changed = conn.execute(
            r#"UPDATE cost_item
               SET amount = ?2, price = ?3, updated_at = datetime('now')
               WHERE cost_item_id = ?1"#,
            params![cost_item_id, amount, price],
        )?;
        if changed == 0 {
            return Err(not_found(cost_item_id));
        }
        Ok(())
    }

    /// 改写认可快照 bk_amount / bk_price
    pub fn update_backup_in(
        conn: &Connection,
        cost_item_id: i64,
        bk_amount: f64,
        bk_price: f64,
    ) -> RepositoryResult<()> {
        let changed = conn.execute(
            r#"UPDATE cost_item
               SET bk_amount = ?2, bk_price = ?3, updated_at = datetime('now')
               WHERE cost_item_id = ?1"#,
            params![cost_item_id, bk_amount, bk_price],
        )?;
        if changed == 0 {
            return Err(not_found(cost_item_id));
        }
        Ok(())
    }

    /// 设置 is_parent 标志
    pub fn set_is_parent_in(
        conn: &Connection,
        cost_item_id: i64,
        is_parent: bool,
    ) -> RepositoryResult<()> {
        let changed = conn.execute(
            r#"UPDATE cost_item
               SET is_parent = ?2, updated_at = datetime('now')
               WHERE cost_item_id = ?1"#,
            params![cost_item_id, is_parent as i64],
        )?;
        if changed == 0 {
            return Err(not_found(cost_item_id));
        }
        Ok(())
    }

    /// 删除成本项 (修订历史保留为孤儿审计行)
    pub fn delete_in(conn: &Connection, cost_item_id: i64) -> RepositoryResult<()> {
        let changed = conn.execute(
            "DELETE FROM cost_item WHERE cost_item_id = ?1",
            params![cost_item_id],
        )?;
        if changed == 0 {
            return Err(not_found(cost_item_id));
        }
        Ok(())
    }

    /// 把一批成本项挂到采购单上
    pub fn assign_po_in(conn: &Connection, cost_item_ids: &[i64], po_id: &str) -> RepositoryResult<usize> {
        if cost_item_ids.is_empty() {
            return Ok(0);
        }
        let placeholders = std::iter::repeat("?")
            .take(cost_item_ids.len())
            .collect::<Vec<_>>()
            .join(", ");
        let sql = format!(
            "UPDATE cost_item SET po_id = ?, updated_at = datetime('now') WHERE cost_item_id IN ({})",
            placeholders
        );
        let mut values: Vec<Value> = vec![Value::from(po_id.to_string())];
        for id in cost_item_ids {
            values.push(Value::from(*id));
        }
        let changed = conn.execute(&sql, params_from_iter(values.iter()))?;
        Ok(changed)
    }

    // ==========================================
    // 查询接口
    // ==========================================

    pub fn find_by_id(&self, cost_item_id: i64) -> RepositoryResult<Option<CostItem>> {
        let conn = self.get_conn()?;
        Self::find_by_id_in(&conn, cost_item_id)
    }

    pub fn find_by_id_in(conn: &Connection, cost_item_id: i64) -> RepositoryResult<Option<CostItem>> {
        let mut stmt = conn.prepare(&format!(
            "{} WHERE cost_item_id = ?1",
            SELECT_COST_ITEM
        ))?;
        let mut rows = stmt.query_map(params![cost_item_id], map_row)?;
        match rows.next() {
            Some(row) => Ok(Some(row?)),
            None => Ok(None),
        }
    }

    /// 查询成本项, 不存在则报 NotFound (事务内)
    pub fn get_in(conn: &Connection, cost_item_id: i64) -> RepositoryResult<CostItem> {
        Self::find_by_id_in(conn, cost_item_id)?.ok_or_else(|| not_found(cost_item_id))
    }

    /// 查询父项的全部子项, 按创建顺序升序
    pub fn find_children_in(conn: &Connection, parent_id: i64) -> RepositoryResult<Vec<CostItem>> {
        let mut stmt = stmt_children(conn)?;
        let items = stmt
            .query_map(params![parent_id], map_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(items)
    }

    /// 子项计数 (删除后判断是否清 is_parent)
    pub fn count_children_in(conn: &Connection, parent_id: i64) -> RepositoryResult<i64> {
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM cost_item WHERE parent_id = ?1",
            params![parent_id],
            |row| row.get(0),
        )?;
        Ok(count)
    }

    /// 按显式过滤条件查询
    pub fn find_by_filter(&self, filter: &CostItemFilter) -> RepositoryResult<Vec<CostItem>> {
        let conn = self.get_conn()?;

        let mut sql = format!("{} WHERE 1=1", SELECT_COST_ITEM);
        let mut values: Vec<Value> = Vec::new();

        if let Some(ref project_id) = filter.project_id {
            sql.push_str(" AND project_id = ?");
            values.push(Value::from(project_id.clone()));
        }
        if let Some(parent_id) = filter.parent_id {
            sql.push_str(" AND parent_id = ?");
            values.push(Value::from(parent_id));
        }
        if let Some(is_extra) = filter.is_extra {
            sql.push_str(" AND is_extra = ?");
            values.push(Value::from(is_extra as i64));
        }
        if let Some(ref po_id) = filter.po_id {
            sql.push_str(" AND po_id = ?");
            values.push(Value::from(po_id.clone()));
        }

        sql.push_str(" ORDER BY cost_item_id ASC");

        let mut stmt = conn.prepare(&sql)?;
        let items = stmt
            .query_map(params_from_iter(values.iter()), map_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(items)
    }

    /// 采购单所挂成本项的合计行值 (升级审批阈值判断用)
    pub fn sum_po_cost_in(conn: &Connection, po_id: &str) -> RepositoryResult<f64> {
        let total: f64 = conn.query_row(
            "SELECT COALESCE(SUM(amount * price), 0) FROM cost_item WHERE po_id = ?1",
            params![po_id],
            |row| row.get(0),
        )?;
        Ok(total)
    }
}

const SELECT_COST_ITEM: &str = r#"SELECT cost_item_id, project_id, parent_id, title, vendor_id,
       amount, price, bk_amount, bk_price, is_extra, is_parent,
       po_id, vo_add_id, vo_delete_id, created_at, updated_at
FROM cost_item"#;

fn stmt_children(conn: &Connection) -> rusqlite::Result<rusqlite::Statement<'_>> {
    conn.prepare(&format!(
        "{} WHERE parent_id = ?1 ORDER BY cost_item_id ASC",
        SELECT_COST_ITEM
    ))
}

fn map_row(row: &Row<'_>) -> rusqlite::Result<CostItem> {
    Ok(CostItem {
        cost_item_id: row.get(0)?,
        project_id: row.get(1)?,
        parent_id: row.get(2)?,
        title: row.get(3)?,
        vendor_id: row.get(4)?,
        amount: row.get(5)?,
        price: row.get(6)?,
        bk_amount: row.get(7)?,
        bk_price: row.get(8)?,
        is_extra: row.get::<_, i64>(9)? != 0,
        is_parent: row.get::<_, i64>(10)? != 0,
        po_id: row.get(11)?,
        vo_add_id: row.get(12)?,
        vo_delete_id: row.get(13)?,
        created_at: parse_ts(row, 14)?,
        updated_at: parse_ts(row, 15)?,
    })
}

fn not_found(cost_item_id: i64) -> RepositoryError {
    RepositoryError::NotFound {
        entity: "CostItem".to_string(),
        id: cost_item_id.to_string(),
    }
}

fn parse_ts(row: &Row<'_>, idx: usize) -> rusqlite::Result<NaiveDateTime> {
    let s: String = row.get(idx)?;
    NaiveDateTime::parse_from_str(&s, "%Y-%m-%d %H:%M:%S").map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(e))
    })
}
