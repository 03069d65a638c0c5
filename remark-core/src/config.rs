use std::{fmt, path::PathBuf};

use serde::{Deserialize, Serialize};

/// Directories a deck is assembled from and written to.
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct Config {
    /// Where the finished deck is written (`index.html` plus public assets)
    pub out_dir: PathBuf,
    /// Directory holding the slide fragments
    pub slide_source: PathBuf,
    /// Directory holding `index.html`, `remark-init-script.js` and assets
    pub public_dir: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            out_dir: PathBuf::from("./docs"),
            slide_source: PathBuf::from("./src"),
            public_dir: PathBuf::from("./public"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Command {
    Dev,
    Build,
    #[default]
    Help,
}

impl Command {
    /// Anything that is not `dev` or `build` means help.
    pub fn from_arg(arg: Option<&str>) -> Self {
        match arg {
            Some("dev") => Command::Dev,
            Some("build") => Command::Build,
            _ => Command::Help,
        }
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Command::Dev => write!(f, "dev"),
            Command::Build => write!(f, "build"),
            Command::Help => write!(f, "help"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_directories() {
        let config = Config::default();
        assert_eq!(config.out_dir, PathBuf::from("./docs"));
        assert_eq!(config.slide_source, PathBuf::from("./src"));
        assert_eq!(config.public_dir, PathBuf::from("./public"));
    }

    #[test]
    fn test_command_from_arg() {
        assert_eq!(Command::from_arg(Some("dev")), Command::Dev);
        assert_eq!(Command::from_arg(Some("build")), Command::Build);
        assert_eq!(Command::from_arg(Some("serve")), Command::Help);
        assert_eq!(Command::from_arg(None), Command::Help);
    }
}
