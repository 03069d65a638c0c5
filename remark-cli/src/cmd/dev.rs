use anyhow::Result;
use remark_dev_server::DevServer;
use tracing::{error, info};

use crate::config::RemarkConfig;

/// Run the dev server until Ctrl-C or until one of its tasks fails.
pub async fn execute(config: &RemarkConfig) -> Result<()> {
    let mut server = DevServer::new(config.dev_server_config());
    server.start().await?;

    let result = tokio::select! {
        signal = tokio::signal::ctrl_c() => {
            info!("Shutting down");
            signal.map_err(anyhow::Error::from)
        }
        finished = server.wait() => {
            if let Err(e) = &finished {
                error!("dev server failed: {e:#}");
            }
            finished
        }
    };

    server.stop().await;
    result
}
