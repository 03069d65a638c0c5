use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use remark_core::{Builder, MemFs, NativeFs, Update, Vfs, builder::SHELL_TEMPLATE};
use tokio::sync::mpsc;
use tracing::{debug, info};

use crate::clients::ClientRegistry;
use crate::watcher::WatchRoots;

/// Turns one changed file into a mirror sync, a re-render and a broadcast.
pub struct Rebuilder {
    builder: Builder<MemFs>,
    mirror: MemFs,
    clients: ClientRegistry,
    roots: WatchRoots,
}

impl Rebuilder {
    pub fn new(builder: Builder<MemFs>, mirror: MemFs, clients: ClientRegistry, roots: WatchRoots) -> Self {
        Self {
            builder,
            mirror,
            clients,
            roots,
        }
    }

    /// Handle changes one at a time until the watcher goes away. The first
    /// failure ends the loop.
    pub async fn run(mut self, mut changes: mpsc::Receiver<PathBuf>) -> Result<()> {
        while let Some(path) = changes.recv().await {
            info!(path = %path.display(), "change");
            self.on_change(&path).await?;
        }
        debug!("file watcher closed, rebuild loop finished");
        Ok(())
    }

    /// `None` when the mirror already matches the disk and nothing was sent.
    pub async fn on_change(&mut self, disk_path: &Path) -> Result<Option<Update>> {
        let mirror_path = self
            .roots
            .to_mirror(disk_path)
            .unwrap_or_else(|| disk_path.to_path_buf());

        if NativeFs.exists(disk_path).await {
            let contents = NativeFs
                .read(disk_path)
                .await
                .with_context(|| format!("failed to read changed file {}", disk_path.display()))?;
            if self.mirror.get(&mirror_path).as_deref() == Some(contents.as_slice()) {
                debug!(path = %mirror_path.display(), "unchanged, skipping");
                return Ok(None);
            }
            self.mirror.write_file(&mirror_path, &contents)?;
        } else if !self.mirror.contains(&mirror_path) {
            debug!(path = %mirror_path.display(), "never mirrored, skipping");
            return Ok(None);
        } else {
            debug!(path = %mirror_path.display(), "gone from disk, dropping from mirror");
            self.mirror.remove(&mirror_path);
        }

        let update = self.builder.update(&mirror_path).await?;

        let html = self.builder.build(&self.mirror).await?;
        let index = self.builder.config().out_dir.join(SHELL_TEMPLATE);
        self.mirror.write_file(&index, html.as_bytes())?;

        let delivered = self.clients.broadcast(&update.to_json()?);
        info!(kind = ?update.kind, clients = delivered, "update sent");

        Ok(Some(update))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use remark_core::{Config, UpdateKind, copy_dir};
    use tempfile::TempDir;

    struct Fixture {
        _tmp: TempDir,
        config: Config,
        mirror: MemFs,
        clients: ClientRegistry,
        rebuilder: Rebuilder,
    }

    async fn fixture() -> Fixture {
        let tmp = TempDir::new().unwrap();
        let public = tmp.path().join("public");
        let src = tmp.path().join("src");
        std::fs::create_dir_all(&public).unwrap();
        std::fs::create_dir_all(&src).unwrap();
        std::fs::write(public.join("index.html"), "<textarea>{{ slides }}</textarea>{{ remarkJs }}").unwrap();
        std::fs::write(public.join("remark-init-script.js"), "init()").unwrap();
        std::fs::write(public.join("styles.css"), "body {}").unwrap();
        std::fs::write(src.join("a.md"), "A").unwrap();

        let config = Config {
            out_dir: tmp.path().join("docs"),
            slide_source: src.clone(),
            public_dir: public.clone(),
        };

        let mirror = MemFs::new();
        copy_dir(&NativeFs, &public, &mirror, &public).await.unwrap();
        copy_dir(&NativeFs, &src, &mirror, &src).await.unwrap();

        let mut builder = Builder::new(config.clone(), mirror.clone());
        builder.load().await.unwrap();
        let html = builder.build(&mirror).await.unwrap();
        mirror.write_file(config.out_dir.join("index.html"), html.as_bytes()).unwrap();

        let clients = ClientRegistry::new();
        let roots = WatchRoots::new(&[&public, &src]).unwrap();
        let rebuilder = Rebuilder::new(builder, mirror.clone(), clients.clone(), roots);

        Fixture {
            _tmp: tmp,
            config,
            mirror,
            clients,
            rebuilder,
        }
    }

    fn page(f: &Fixture) -> String {
        String::from_utf8(f.mirror.get(f.config.out_dir.join("index.html")).unwrap()).unwrap()
    }

    #[tokio::test]
    async fn test_new_slide_is_synced_rendered_and_broadcast() {
        let mut f = fixture().await;
        let (_, mut rx) = f.clients.register();

        let new_slide = f.config.slide_source.join("new-slide.md");
        std::fs::write(&new_slide, "N").unwrap();

        let update = f.rebuilder.on_change(&new_slide.canonicalize().unwrap()).await.unwrap().unwrap();

        assert_eq!(update.kind, UpdateKind::Slides);
        assert_eq!(update.content, "A\n\n---\n\nN");
        assert_eq!(f.mirror.get(&new_slide).unwrap(), b"N");
        assert!(page(&f).contains("<textarea>A\n\n---\n\nN</textarea>"));
        assert_eq!(
            rx.recv().await.unwrap(),
            r#"{"type":"SLIDES","content":"A\n\n---\n\nN"}"#
        );
    }

    #[tokio::test]
    async fn test_stylesheet_change_only_syncs_and_signals() {
        let mut f = fixture().await;
        let (_, mut rx) = f.clients.register();

        let css = f.config.public_dir.join("styles.css");
        std::fs::write(&css, "body { color: blue; }").unwrap();

        let update = f.rebuilder.on_change(&css).await.unwrap().unwrap();

        assert_eq!(update.kind, UpdateKind::Css);
        assert!(update.content.is_empty());
        assert_eq!(
            f.mirror.get(f.config.out_dir.join("styles.css")).unwrap(),
            b"body { color: blue; }"
        );
        assert_eq!(rx.recv().await.unwrap(), r#"{"type":"CSS","content":""}"#);
    }

    #[tokio::test]
    async fn test_deleted_slide_leaves_the_deck() {
        let mut f = fixture().await;
        let extra = f.config.slide_source.join("b.md");
        std::fs::write(&extra, "B").unwrap();
        f.rebuilder.on_change(&extra).await.unwrap();
        assert!(page(&f).contains("A\n\n---\n\nB"));

        std::fs::remove_file(&extra).unwrap();
        let update = f.rebuilder.on_change(&extra).await.unwrap().unwrap();

        assert_eq!(update.content, "A");
        assert!(!f.mirror.contains(&extra));
        assert!(page(&f).contains("<textarea>A</textarea>"));
    }

    #[tokio::test]
    async fn test_unchanged_file_is_not_rebuilt() {
        let mut f = fixture().await;
        let (_, mut rx) = f.clients.register();

        let slide = f.config.slide_source.join("a.md");
        assert!(f.rebuilder.on_change(&slide).await.unwrap().is_none());

        let never_seen = f.config.slide_source.join("gone.md");
        assert!(f.rebuilder.on_change(&never_seen).await.unwrap().is_none());

        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_run_stops_on_first_failure() {
        let f = fixture().await;
        let (tx, rx) = mpsc::channel(4);

        std::fs::remove_file(f.config.public_dir.join("index.html")).unwrap();
        tx.send(f.config.public_dir.join("index.html")).await.unwrap();
        drop(tx);

        assert!(f.rebuilder.run(rx).await.is_err());
    }

    #[tokio::test]
    async fn test_run_finishes_when_watcher_closes() {
        let f = fixture().await;
        let (tx, rx) = mpsc::channel(4);
        tx.send(f.config.public_dir.join("styles.css")).await.unwrap();
        drop(tx);

        f.rebuilder.run(rx).await.unwrap();
    }
}
