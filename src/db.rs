// ==========================================
// 工程成本修订台账系统 - SQLite 连接初始化
// ==========================================
// 目标:
// - 统一所有 Connection::open 的 PRAGMA 行为，避免“部分模块外键开启/部分不开启”
// - 统一 busy_timeout，减少并发写入时的偶发 busy 错误
// - 提供建表入口, 测试与嵌入部署共用同一份 schema
// ==========================================

use rusqlite::Connection;
use rusqlite::OptionalExtension;
use std::time::Duration;

/// 默认 busy_timeout（毫秒）
pub const DEFAULT_BUSY_TIMEOUT_MS: u64 = 5_000;

/// 当前代码所期望的 schema_version
pub const CURRENT_SCHEMA_VERSION: i64 = 1;

/// 配置 SQLite 连接的统一 PRAGMA
///
/// 说明：
/// - foreign_keys 需要“每个连接”单独开启
/// - busy_timeout 需要“每个连接”单独配置
pub fn configure_sqlite_connection(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch("PRAGMA foreign_keys = ON;")?;
    conn.busy_timeout(Duration::from_millis(DEFAULT_BUSY_TIMEOUT_MS))?;
    Ok(())
}

/// 打开 SQLite 连接并应用统一配置
pub fn open_sqlite_connection(db_path: &str) -> rusqlite::Result<Connection> {
    let conn = Connection::open(db_path)?;
    configure_sqlite_connection(&conn)?;
    Ok(conn)
}

/// 读取 schema_version（若表不存在则返回 None）
pub fn read_schema_version(conn: &Connection) -> rusqlite::Result<Option<i64>> {
    let has_table: bool = conn
        .query_row(
            "SELECT 1 FROM sqlite_master WHERE type='table' AND name='schema_version' LIMIT 1",
            [],
            |_row| Ok(true),
        )
        .optional()?
        .unwrap_or(false);

    if !has_table {
        return Ok(None);
    }

    let v: Option<i64> = conn.query_row("SELECT MAX(version) FROM schema_version", [], |row| row.get(0))?;
    Ok(v)
}

/// 初始化数据库 schema（幂等）
///
/// 表设计说明:
/// - cost_item / cost_modification 使用自增整型主键:
///   子项按 cost_item_id 升序参与预算分配, 创建顺序即优先级;
/// - cost_modification.cost_item_id 不加外键约束:
///   修订行是审计台账永不删除, 成本项删除后允许留下孤儿修订历史;
/// - project / purchase_order / variation_order 使用 uuid 文本主键。
pub fn init_schema(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS schema_version (
            version INTEGER PRIMARY KEY,
            applied_at TEXT NOT NULL DEFAULT (datetime('now'))
        );

        CREATE TABLE IF NOT EXISTS config_scope (
            scope_id TEXT PRIMARY KEY,
            scope_type TEXT NOT NULL,
            scope_key TEXT NOT NULL,
            created_at TEXT NOT NULL DEFAULT (datetime('now')),
            UNIQUE(scope_type, scope_key)
        );

        INSERT OR IGNORE INTO config_scope (scope_id, scope_type, scope_key)
        VALUES ('global', 'GLOBAL', 'global');

        CREATE TABLE IF NOT EXISTS config_kv (
            scope_id TEXT NOT NULL REFERENCES config_scope(scope_id) ON DELETE CASCADE,
            key TEXT NOT NULL,
            value TEXT NOT NULL,
            updated_at TEXT NOT NULL DEFAULT (datetime('now')),
            PRIMARY KEY (scope_id, key)
        );

        CREATE TABLE IF NOT EXISTS project (
            project_id TEXT PRIMARY KEY,
            project_name TEXT NOT NULL,
            quotation_status TEXT NOT NULL DEFAULT 'PROCESSING',
            total_extra_fee REAL NOT NULL DEFAULT 0,
            max_po_price REAL NOT NULL DEFAULT 0,
            created_at TEXT NOT NULL DEFAULT (datetime('now')),
            updated_at TEXT NOT NULL DEFAULT (datetime('now'))
        );

        CREATE TABLE IF NOT EXISTS purchase_order (
            po_id TEXT PRIMARY KEY,
            project_id TEXT NOT NULL REFERENCES project(project_id),
            title TEXT NOT NULL,
            vendor_id TEXT,
            status TEXT NOT NULL DEFAULT 'PROCESSING',
            created_at TEXT NOT NULL DEFAULT (datetime('now')),
            updated_at TEXT NOT NULL DEFAULT (datetime('now'))
        );

        CREATE TABLE IF NOT EXISTS variation_order (
            vo_id TEXT PRIMARY KEY,
            project_id TEXT NOT NULL REFERENCES project(project_id),
            title TEXT NOT NULL,
            status TEXT NOT NULL DEFAULT 'PROCESSING',
            created_at TEXT NOT NULL DEFAULT (datetime('now')),
            updated_at TEXT NOT NULL DEFAULT (datetime('now'))
        );

        CREATE TABLE IF NOT EXISTS cost_item (
            cost_item_id INTEGER PRIMARY KEY AUTOINCREMENT,
            project_id TEXT NOT NULL REFERENCES project(project_id),
            parent_id INTEGER REFERENCES cost_item(cost_item_id),
            title TEXT NOT NULL,
            vendor_id TEXT,
            amount REAL NOT NULL,
            price REAL NOT NULL,
            bk_amount REAL,
            bk_price REAL,
            is_extra INTEGER NOT NULL DEFAULT 0,
            is_parent INTEGER NOT NULL DEFAULT 0,
            po_id TEXT REFERENCES purchase_order(po_id),
            vo_add_id TEXT REFERENCES variation_order(vo_id),
            vo_delete_id TEXT REFERENCES variation_order(vo_id),
            created_at TEXT NOT NULL DEFAULT (datetime('now')),
            updated_at TEXT NOT NULL DEFAULT (datetime('now'))
        );

        CREATE INDEX IF NOT EXISTS idx_cost_item_project
          ON cost_item(project_id);
        CREATE INDEX IF NOT EXISTS idx_cost_item_parent
          ON cost_item(parent_id);
        CREATE INDEX IF NOT EXISTS idx_cost_item_po
          ON cost_item(po_id);

        CREATE TABLE IF NOT EXISTS cost_modification (
            modification_id INTEGER PRIMARY KEY AUTOINCREMENT,
            project_id TEXT NOT NULL REFERENCES project(project_id),
            cost_item_id INTEGER NOT NULL,
            old_amount REAL NOT NULL,
            old_price REAL NOT NULL,
            new_amount REAL NOT NULL,
            new_price REAL NOT NULL,
            status TEXT NOT NULL DEFAULT 'WAITING',
            approve_by TEXT,
            created_at TEXT NOT NULL DEFAULT (datetime('now')),
            decided_at TEXT
        );

        CREATE INDEX IF NOT EXISTS idx_cost_modification_item
          ON cost_modification(cost_item_id, modification_id);
        CREATE INDEX IF NOT EXISTS idx_cost_modification_project_status
          ON cost_modification(project_id, status);

        CREATE TABLE IF NOT EXISTS approver (
            approver_id INTEGER PRIMARY KEY AUTOINCREMENT,
            entity_kind TEXT NOT NULL,
            entity_id TEXT NOT NULL,
            role TEXT NOT NULL,
            user_id TEXT,
            status TEXT NOT NULL DEFAULT 'WAITING',
            decided_at TEXT
        );

        CREATE INDEX IF NOT EXISTS idx_approver_entity
          ON approver(entity_kind, entity_id);
        "#,
    )?;

    conn.execute(
        "INSERT OR IGNORE INTO schema_version (version) VALUES (?1)",
        [CURRENT_SCHEMA_VERSION],
    )?;

    Ok(())
}
