//! fenxiao 主入口
//! 分销佣金系统后端

use std::sync::Arc;

use anyhow::Result;
use fenxiao::{api, app_state::AppState, config::Config};
use sqlx::postgres::PgPoolOptions;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<()> {
    // 1. 加载环境变量
    dotenvy::dotenv().ok();

    // 2. 加载配置文件（如果存在CONFIG_PATH）
    let config = match std::env::var("CONFIG_PATH") {
        Ok(path) => Config::from_env_and_file(Some(path.as_str()))?,
        Err(_) => {
            let config = Config::from_env()?;
            config.validate()?;
            config
        }
    };
    let config = Arc::new(config);

    // 3. 初始化日志
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "fenxiao=debug,tower_http=debug,sqlx=warn".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting fenxiao distribution backend");

    // 4. 连接数据库
    let pool = PgPoolOptions::new()
        .max_connections(config.database.max_connections)
        .min_connections(config.database.min_connections)
        .acquire_timeout(std::time::Duration::from_secs(
            config.database.acquire_timeout_secs,
        ))
        .connect(&config.database.url)
        .await?;
    tracing::info!("Database connected");

    // 5. 运行数据库迁移（生产环境可用 SKIP_MIGRATIONS=1 单独跑迁移）
    if std::env::var("SKIP_MIGRATIONS").is_err() {
        sqlx::migrate!("./migrations").run(&pool).await?;
        tracing::info!("Database migrations completed");
    } else {
        tracing::info!("Database migrations skipped (SKIP_MIGRATIONS=1)");
    }

    // 6. 初始化应用状态
    let state = Arc::new(AppState::new(pool.clone(), config.clone()));

    // 7. 启动后台任务：结算 / 提现过期清扫 / 报表 / 升级评估 / 统计重算
    let settlement = Arc::new(fenxiao::service::SettlementJob::new(
        pool.clone(),
        config.distribution.clone(),
        state.ledger.clone(),
        state.stats.clone(),
        state.notifier.clone(),
    ));
    tokio::spawn(settlement.start());
    tokio::spawn(state.withdrawal.clone().start_expiry_sweep());
    tokio::spawn(state.reports.clone().start());
    tokio::spawn(state.upgrades.clone().start());
    tokio::spawn(state.stats.clone().start_resync());

    // 8. 启动HTTP服务
    let app = api::router(state);
    let listener = tokio::net::TcpListener::bind(&config.server.bind_addr).await?;
    tracing::info!(addr = %config.server.bind_addr, "HTTP server listening");
    axum::serve(listener, app).await?;

    Ok(())
}
