// ==========================================
// 纺纱生产执行系统 - 命令行入口
// ==========================================
// 用途: 打开本地库, 输出今日机队健康排名 (运维自检)
// ==========================================

use spinning_mes::api::AnalyticsApi;
use spinning_mes::config::get_default_db_path;
use spinning_mes::db::open_sqlite_connection;
use spinning_mes::logging;
use std::sync::{Arc, Mutex};

fn main() -> anyhow::Result<()> {
    // 初始化日志系统
    logging::init();

    tracing::info!("==================================================");
    tracing::info!("{}", spinning_mes::APP_NAME);
    tracing::info!("系统版本: {}", spinning_mes::VERSION);
    tracing::info!("==================================================");

    // 获取数据库路径 (可用第一个命令行参数覆盖)
    let db_path = std::env::args().nth(1).unwrap_or_else(get_default_db_path);
    tracing::info!("使用数据库: {}", db_path);

    let conn = Arc::new(Mutex::new(open_sqlite_connection(&db_path)?));
    let analytics = AnalyticsApi::from_connection(conn)?;

    let fleet = analytics.fleet_health(None)?;
    tracing::info!("在册运行机台: {} 台", fleet.len());
    println!("{}", serde_json::to_string_pretty(&fleet)?);

    Ok(())
}
