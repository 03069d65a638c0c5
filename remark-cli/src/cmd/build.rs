use anyhow::{Context, Result};
use remark_core::{Builder, NativeFs, Vfs, builder::SHELL_TEMPLATE};
use tracing::info;

use crate::config::RemarkConfig;

/// One-shot build straight to disk.
pub async fn execute(config: &RemarkConfig) -> Result<()> {
    let site = &config.build;

    let mut builder = Builder::new(site.clone(), NativeFs);
    builder.load().await?;
    let html = builder.build(&NativeFs).await?;

    let index = site.out_dir.join(SHELL_TEMPLATE);
    NativeFs
        .write(&index, html.as_bytes())
        .await
        .with_context(|| format!("failed to write {}", index.display()))?;

    info!(
        slides = builder.slides().map_or(0, |slides| slides.len()),
        "Deck built in {}",
        site.out_dir.display()
    );
    Ok(())
}
