use anyhow::Result;
use autofill_ocr::cli::Cli;
use autofill_ocr::orchestrator::App;
use autofill_ocr::utils::logging;
use autofill_ocr::Config;
use clap::Parser;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // 加载配置
    let config = Config::from_env();

    // 初始化日志
    logging::init(cli.verbose || config.verbose_logging);

    // 初始化并运行应用
    App::initialize(config).await?.run(cli.command).await?;

    Ok(())
}
