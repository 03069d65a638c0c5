use std::path::{Path, PathBuf};

use futures::future::try_join_all;
use serde::Serialize;
use thiserror::Error;
use tracing::debug;

use crate::config::Config;
use crate::fs::{Vfs, copy_dir};
use crate::template::TemplateRenderer;

pub const SHELL_TEMPLATE: &str = "index.html";
pub const INIT_SCRIPT: &str = "remark-init-script.js";
pub const STYLESHEET: &str = "styles.css";
pub const SLIDE_SEPARATOR: &str = "\n\n---\n\n";

#[derive(Debug, Error)]
pub enum BuildError {
    #[error("failed to read {}: {source}", path.display())]
    MissingInput {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to prepare output directory {}: {source}", path.display())]
    Output {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("build inputs have not been loaded")]
    NotLoaded,
}

pub type Result<T> = std::result::Result<T, BuildError>;

/// What kind of input a changed file is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileRole {
    ShellTemplate,
    InitScript,
    Stylesheet,
    /// Anything that is not one of the known public files is slide content.
    Slide,
}

impl FileRole {
    pub fn classify(path: &Path) -> Self {
        let path = path.to_string_lossy();
        if path.ends_with(SHELL_TEMPLATE) {
            FileRole::ShellTemplate
        } else if path.ends_with(INIT_SCRIPT) {
            FileRole::InitScript
        } else if path.ends_with(STYLESHEET) {
            FileRole::Stylesheet
        } else {
            FileRole::Slide
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum UpdateKind {
    Html,
    Js,
    Css,
    Slides,
}

/// Sent to connected browsers after a file changed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Update {
    #[serde(rename = "type")]
    pub kind: UpdateKind,
    pub content: String,
}

impl Update {
    pub fn new(kind: UpdateKind, content: impl Into<String>) -> Self {
        Self {
            kind,
            content: content.into(),
        }
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}

/// Slide fragments in listing order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Slides(Vec<(String, String)>);

impl Slides {
    pub fn new(slides: Vec<(String, String)>) -> Self {
        Self(slides)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(|(name, _)| name.as_str())
    }

    /// The deck as it goes into the page's source textarea.
    pub fn textarea_content(&self) -> String {
        self.0
            .iter()
            .map(|(_, content)| content.as_str())
            .collect::<Vec<_>>()
            .join(SLIDE_SEPARATOR)
    }
}

#[derive(Debug, Clone)]
struct BuildInputs {
    html_template: String,
    init_script: String,
    slides: Slides,
}

/// Holds the shell template, init script and slides, and renders the page.
pub struct Builder<F> {
    config: Config,
    fs: F,
    inputs: Option<BuildInputs>,
}

impl<F: Vfs> Builder<F> {
    pub fn new(config: Config, fs: F) -> Self {
        Self {
            config,
            fs,
            inputs: None,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn is_loaded(&self) -> bool {
        self.inputs.is_some()
    }

    pub fn slides(&self) -> Option<&Slides> {
        self.inputs.as_ref().map(|inputs| &inputs.slides)
    }

    /// (Re)read all three inputs.
    pub async fn load(&mut self) -> Result<&mut Self> {
        let (html_template, init_script, slides) = tokio::try_join!(
            self.public_file(SHELL_TEMPLATE),
            self.public_file(INIT_SCRIPT),
            self.read_slides(),
        )?;

        debug!(slides = slides.len(), "build inputs loaded");
        self.inputs = Some(BuildInputs {
            html_template,
            init_script,
            slides,
        });
        Ok(self)
    }

    /// Reload only the input `changed` belongs to.
    pub async fn update(&mut self, changed: &Path) -> Result<Update> {
        if self.inputs.is_none() {
            return Err(BuildError::NotLoaded);
        }

        let role = FileRole::classify(changed);
        debug!(path = %changed.display(), ?role, "classified change");

        let update = match role {
            FileRole::ShellTemplate => {
                let html = self.public_file(SHELL_TEMPLATE).await?;
                self.inputs_mut()?.html_template = html.clone();
                Update::new(UpdateKind::Html, html)
            }
            FileRole::InitScript => {
                let js = self.public_file(INIT_SCRIPT).await?;
                self.inputs_mut()?.init_script = js.clone();
                Update::new(UpdateKind::Js, js)
            }
            FileRole::Stylesheet => Update::new(UpdateKind::Css, ""),
            FileRole::Slide => {
                let slides = self.read_slides().await?;
                let content = slides.textarea_content();
                self.inputs_mut()?.slides = slides;
                Update::new(UpdateKind::Slides, content)
            }
        };

        Ok(update)
    }

    /// Fill the shell template. Touches no files.
    pub fn render(&self) -> Result<String> {
        let inputs = self.inputs.as_ref().ok_or(BuildError::NotLoaded)?;

        let mut renderer = TemplateRenderer::new();
        renderer
            .add_to_context("slides", inputs.slides.textarea_content())
            .add_to_context("remarkJs", format!("<script>\n{}\n</script>", inputs.init_script));

        Ok(renderer.render(&inputs.html_template))
    }

    /// Replace the output directory in `target` with a fresh copy of the
    /// public directory, then render the page. The caller writes the HTML.
    pub async fn build<T: Vfs>(&self, target: &T) -> Result<String> {
        if self.inputs.is_none() {
            return Err(BuildError::NotLoaded);
        }

        let out_dir = &self.config.out_dir;
        let output_error = |source| BuildError::Output {
            path: out_dir.clone(),
            source,
        };

        target.remove_dir_all(out_dir).await.map_err(output_error)?;
        copy_dir(target, &self.config.public_dir, target, out_dir)
            .await
            .map_err(output_error)?;

        self.render()
    }

    fn inputs_mut(&mut self) -> Result<&mut BuildInputs> {
        self.inputs.as_mut().ok_or(BuildError::NotLoaded)
    }

    async fn public_file(&self, name: &str) -> Result<String> {
        let dir = &self.config.public_dir;
        self.fs
            .get_content(dir, name)
            .await
            .map_err(|source| BuildError::MissingInput {
                path: dir.join(name),
                source,
            })
    }

    async fn read_slides(&self) -> Result<Slides> {
        let dir = &self.config.slide_source;
        let files = self
            .fs
            .list(dir)
            .await
            .map_err(|source| BuildError::MissingInput {
                path: dir.clone(),
                source,
            })?;

        let loading = files
            .into_iter()
            .filter(|file| !file.ends_with('~'))
            .map(|file| async move {
                let content = self.fs.get_content(dir, &file).await.map_err(|source| {
                    BuildError::MissingInput {
                        path: dir.join(&file),
                        source,
                    }
                })?;
                Ok::<_, BuildError>((file, content))
            });

        Ok(Slides::new(try_join_all(loading).await?))
    }
}
