use catalog_sync::{CatalogService, Config, init_logger_with_file};

fn main() -> anyhow::Result<()> {
    // 1. 环境 (dotenv, 日志)
    dotenv::dotenv().ok();
    let config = Config::from_env();
    init_logger_with_file(Some(&config.log_level), config.log_dir.as_deref());

    tracing::info!(environment = %config.environment, "Catalog sync starting...");

    // 2. 打开存储
    let service = CatalogService::open(&config)?;

    // 3. 一次性迁移
    let report = service.run_migrations(config.seed_demo_content);

    // 4. 汇总
    let view = service.all();
    tracing::info!(
        imported = report.imported,
        seeded = report.seeded,
        entries = view.len(),
        overlay = service.overlay_entries().len(),
        featured = view.featured().len(),
        "Catalog ready"
    );
    Ok(())
}
