use finance_service::config::FinanceConfig;
use finance_service::startup::Application;
use service_core::observability::init_tracing;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = FinanceConfig::from_env()?;

    init_tracing(&config.log_level, config.json_logs);

    let application = Application::build(config).await?;
    application.run_until_stopped().await?;

    Ok(())
}
