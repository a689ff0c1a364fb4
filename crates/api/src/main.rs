use stockwatch_api::config::ServiceConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    stockwatch_observability::init();

    let config = ServiceConfig::from_env()?;
    let addr = config.addr;
    let app = stockwatch_api::app::build_app(config).await?;

    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!("listening on {}", listener.local_addr()?);

    axum::serve(listener, app).await?;
    Ok(())
}
