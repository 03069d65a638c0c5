pub mod builder;
pub mod config;
pub mod fs;
pub mod memfs;
pub mod template;

// Re-export main types
pub use builder::{BuildError, Builder, FileRole, Slides, Update, UpdateKind};
pub use config::{Command, Config};
pub use fs::{NativeFs, Vfs, copy_dir};
pub use memfs::MemFs;
pub use template::TemplateRenderer;
