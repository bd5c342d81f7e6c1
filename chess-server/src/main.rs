use anyhow::Result;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use chess_server::ServerConfig;

#[tokio::main]
async fn main() -> Result<()> {
    let config_path = ServerConfig::config_path();
    let config = ServerConfig::load_or_default(&config_path)?;

    // 初始化日志
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(config.log_directive.parse()?),
        )
        .init();

    info!("国际象棋服务端启动中，配置文件: {}", config_path.display());

    chess_server::run(&config).await
}
