mod app;
mod cli;
mod logging;
mod lsp;
mod session;

use cli::Cli;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Cli::from_args().into_config();
    logging::init_logging(&config.log)?;

    app::run(config).await
}
