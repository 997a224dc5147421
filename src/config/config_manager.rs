// ==========================================
// 工程成本修订台账系统 - 配置管理器
// ==========================================
// 职责: config_kv 表 (global 作用域) 的读写与类型化访问
// 约定: 值统一存 JSON 文本; 缺失或解析失败时回退内置默认值
//       并记 warn, 配置损坏不应让审批流程瘫痪
// ==========================================

use std::sync::{Arc, Mutex};

use rusqlite::{params, Connection, OptionalExtension};
use tracing::warn;

use crate::domain::types::Role;
use crate::repository::error::{RepositoryError, RepositoryResult};

/// 采购单审批链角色序列
pub const KEY_PO_MANAGER_CHAIN: &str = "approval/po_manager_chain";
/// 变更单审批名册角色
pub const KEY_VO_ROLES: &str = "approval/vo_roles";
/// 新项目默认超额费用百分比
pub const KEY_DEFAULT_TOTAL_EXTRA_FEE: &str = "ledger/default_total_extra_fee";

const GLOBAL_SCOPE: &str = "global";

pub struct ConfigManager {
    conn: Arc<Mutex<Connection>>,
}

impl ConfigManager {
    pub fn new(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    fn get_conn(&self) -> RepositoryResult<std::sync::MutexGuard<Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    // ==========================================
    // 原始读写
    // ==========================================

    pub fn get_raw(&self, key: &str) -> RepositoryResult<Option<String>> {
        let conn = self.get_conn()?;
        Self::get_raw_in(&conn, key)
    }

    pub fn get_raw_in(conn: &Connection, key: &str) -> RepositoryResult<Option<String>> {
        let value: Option<String> = conn
            .query_row(
                "SELECT value FROM config_kv WHERE scope_id = ?1 AND key = ?2",
                params![GLOBAL_SCOPE, key],
                |row| row.get(0),
            )
            .optional()?;
        Ok(value)
    }

    /// 写入配置 (JSON 文本, upsert)
    pub fn set_raw(&self, key: &str, value: &str) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        conn.execute(
            r#"INSERT INTO config_kv (scope_id, key, value)
               VALUES (?1, ?2, ?3)
               ON CONFLICT(scope_id, key)
               DO UPDATE SET value = excluded.value, updated_at = datetime('now')"#,
            params![GLOBAL_SCOPE, key, value],
        )?;
        Ok(())
    }

    // ==========================================
    // 类型化访问
    // ==========================================

    /// 采购单审批链 (角色序列, 逐级表态)
    pub fn po_manager_chain(&self) -> RepositoryResult<Vec<Role>> {
        let conn = self.get_conn()?;
        Self::po_manager_chain_in(&conn)
    }

    pub fn po_manager_chain_in(conn: &Connection) -> RepositoryResult<Vec<Role>> {
        Ok(read_roles(
            conn,
            KEY_PO_MANAGER_CHAIN,
            &[Role::ProcurementManager],
        )?)
    }

    /// 变更单审批名册角色
    pub fn vo_roles(&self) -> RepositoryResult<Vec<Role>> {
        let conn = self.get_conn()?;
        Self::vo_roles_in(&conn)
    }

    pub fn vo_roles_in(conn: &Connection) -> RepositoryResult<Vec<Role>> {
        Ok(read_roles(
            conn,
            KEY_VO_ROLES,
            &[
                Role::ProjectManager,
                Role::QuantitySurveyor,
                Role::ChiefExecutive,
            ],
        )?)
    }

    /// 新项目的默认超额费用百分比
    pub fn default_total_extra_fee(&self) -> RepositoryResult<f64> {
        let conn = self.get_conn()?;
        match Self::get_raw_in(&conn, KEY_DEFAULT_TOTAL_EXTRA_FEE)? {
            Some(raw) => match serde_json::from_str::<f64>(&raw) {
                Ok(v) if v >= 0.0 => Ok(v),
                _ => {
                    warn!(key = KEY_DEFAULT_TOTAL_EXTRA_FEE, raw = %raw, "配置值非法, 回退默认");
                    Ok(DEFAULT_TOTAL_EXTRA_FEE)
                }
            },
            None => Ok(DEFAULT_TOTAL_EXTRA_FEE),
        }
    }
}

/// 默认超额费用百分比
pub const DEFAULT_TOTAL_EXTRA_FEE: f64 = 5.0;

fn read_roles(conn: &Connection, key: &str, defaults: &[Role]) -> RepositoryResult<Vec<Role>> {
    match ConfigManager::get_raw_in(conn, key)? {
        Some(raw) => match serde_json::from_str::<Vec<Role>>(&raw) {
            Ok(roles) if !roles.is_empty() => Ok(roles),
            _ => {
                warn!(key, raw = %raw, "角色配置非法, 回退默认");
                Ok(defaults.to_vec())
            }
        },
        None => Ok(defaults.to_vec()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::init_schema;

    fn setup() -> ConfigManager {
        let conn = Connection::open_in_memory().unwrap();
        init_schema(&conn).unwrap();
        ConfigManager::new(Arc::new(Mutex::new(conn)))
    }

    #[test]
    fn test_defaults_when_unset() {
        let cfg = setup();
        assert_eq!(cfg.po_manager_chain().unwrap(), vec![Role::ProcurementManager]);
        assert_eq!(cfg.default_total_extra_fee().unwrap(), DEFAULT_TOTAL_EXTRA_FEE);
    }

    #[test]
    fn test_roundtrip_roles() {
        let cfg = setup();
        cfg.set_raw(
            KEY_PO_MANAGER_CHAIN,
            r#"["PROCUREMENT_MANAGER","PROJECT_MANAGER"]"#,
        )
        .unwrap();
        assert_eq!(
            cfg.po_manager_chain().unwrap(),
            vec![Role::ProcurementManager, Role::ProjectManager]
        );
    }

    #[test]
    fn test_invalid_json_falls_back() {
        let cfg = setup();
        cfg.set_raw(KEY_VO_ROLES, "not-json").unwrap();
        assert_eq!(
            cfg.vo_roles().unwrap(),
            vec![
                Role::ProjectManager,
                Role::QuantitySurveyor,
                Role::ChiefExecutive
            ]
        );
    }
}
