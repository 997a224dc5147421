// ==========================================
// 工程成本修订台账系统 - 项目仓储
// ==========================================
// 红线: 项目对台账只读; 本仓储的写入口仅服务于
//       报价审批流程与测试数据准备
// ==========================================

use std::sync::{Arc, Mutex};

use chrono::NaiveDateTime;
use rusqlite::{params, Connection, Row};

use crate::domain::project::Project;
use crate::domain::types::QuotationStatus;
use crate::repository::error::{RepositoryError, RepositoryResult};

pub struct ProjectRepository {
    conn: Arc<Mutex<Connection>>,
}

impl ProjectRepository {
    pub fn new(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    fn get_conn(&self) -> RepositoryResult<std::sync::MutexGuard<Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    /// 创建项目
    pub fn create(&self, project: &Project) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        conn.execute(
            r#"INSERT INTO project (
                    project_id, project_name, quotation_status,
                    total_extra_fee, max_po_price, created_at, updated_at
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)"#,
            params![
                &project.project_id,
                &project.project_name,
                project.quotation_status.to_db_str(),
                &project.total_extra_fee,
                &project.max_po_price,
                format_ts(&project.created_at),
                format_ts(&project.updated_at),
            ],
        )?;
        Ok(())
    }

    /// 查询项目
    pub fn find_by_id(&self, project_id: &str) -> RepositoryResult<Option<Project>> {
        let conn = self.get_conn()?;
        Self::find_by_id_in(&conn, project_id)
    }

    /// 查询项目 (事务内)
    pub fn find_by_id_in(conn: &Connection, project_id: &str) -> RepositoryResult<Option<Project>> {
        let mut stmt = conn.prepare(
            r#"SELECT project_id, project_name, quotation_status,
                      total_extra_fee, max_po_price, created_at, updated_at
               FROM project
               WHERE project_id = ?1"#,
        )?;

        let mut rows = stmt.query_map(params![project_id], map_row)?;
        match rows.next() {
            Some(row) => Ok(Some(row?)),
            None => Ok(None),
        }
    }

    /// 查询项目, 不存在则报 NotFound (事务内)
    pub fn get_in(conn: &Connection, project_id: &str) -> RepositoryResult<Project> {
        Self::find_by_id_in(conn, project_id)?.ok_or_else(|| RepositoryError::NotFound {
            entity: "Project".to_string(),
            id: project_id.to_string(),
        })
    }

    /// 改写报价状态 (报价审批流程使用)
    pub fn update_quotation_status(
        &self,
        project_id: &str,
        status: QuotationStatus,
    ) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        let changed = conn.execute(
            r#"UPDATE project
               SET quotation_status = ?2, updated_at = datetime('now')
               WHERE project_id = ?1"#,
            params![project_id, status.to_db_str()],
        )?;
        if changed == 0 {
            return Err(RepositoryError::NotFound {
                entity: "Project".to_string(),
                id: project_id.to_string(),
            });
        }
        Ok(())
    }
}

fn map_row(row: &Row<'_>) -> rusqlite::Result<Project> {
    let status: String = row.get(2)?;
    Ok(Project {
        project_id: row.get(0)?,
        project_name: row.get(1)?,
        quotation_status: QuotationStatus::from_str(&status),
        total_extra_fee: row.get(3)?,
        max_po_price: row.get(4)?,
        created_at: parse_ts(row, 5)?,
        updated_at: parse_ts(row, 6)?,
    })
}

fn format_ts(ts: &NaiveDateTime) -> String {
    ts.format("%Y-%m-%d %H:%M:%S").to_string()
}

fn parse_ts(row: &Row<'_>, idx: usize) -> rusqlite::Result<NaiveDateTime> {
    let s: String = row.get(idx)?;
    NaiveDateTime::parse_from_str(&s, "%Y-%m-%d %H:%M:%S").map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(e))
    })
}
