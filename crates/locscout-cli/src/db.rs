use locscout_core::AppConfig;

pub(crate) async fn run_ping(config: &AppConfig) -> anyhow::Result<()> {
    let pool = locscout_db::connect_pool_from_config(config).await?;
    locscout_db::ping(&pool).await?;
    println!("database ok");
    Ok(())
}

pub(crate) async fn run_migrate(config: &AppConfig) -> anyhow::Result<()> {
    let pool = locscout_db::connect_pool_from_config(config).await?;
    let applied = locscout_db::run_migrations(&pool).await?;
    println!("applied {applied} migrations");
    Ok(())
}
