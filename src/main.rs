use anyhow::Result;
use tracing::warn;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use ccnotify::config::{Config, Settings};
use ccnotify::App;

#[tokio::main]
async fn main() -> Result<()> {
    // Parse CLI arguments
    let cli = Config::parse_args();
    let command = cli.command();

    // Load .env before anything reads the environment
    dotenvy::dotenv().ok();

    // Setup logging
    setup_logging(cli.debug);

    // Load settings; a broken config file must not fail a hook
    let mut settings = match Settings::load(cli.config.as_ref()) {
        Ok(settings) => settings,
        Err(e) if command.is_hook() => {
            warn!("{:#}; using default settings", e);
            Settings::default()
        }
        Err(e) => return Err(e),
    };
    settings.merge_env();
    settings.validate();

    // Run the command, cleaning up the usage session on Ctrl-C
    let app = App::new(settings);
    tokio::select! {
        result = app.run(command) => result,
        _ = tokio::signal::ctrl_c() => {
            warn!("Interrupted, shutting down");
            app.shutdown().await;
            Ok(())
        }
    }
}

fn setup_logging(debug: bool) {
    let filter = if debug {
        EnvFilter::new("ccnotify=debug,ccnotify_core=debug")
    } else {
        EnvFilter::new("ccnotify=info,ccnotify_core=info")
    };

    // stdout belongs to the hook protocol and the `usage` report
    tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr),
        )
        .init();
}
