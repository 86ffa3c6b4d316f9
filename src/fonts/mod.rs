//! Main font selection for generated reports.
//!
//! Reports are typeset with `fontspec`, so the main font is either a system font looked up
//! by family name or a set of font files loaded from an explicit directory.

use std::env;
use std::path::{Path, PathBuf};

use log::warn;

/// Family used when nothing else is configured.
pub const DEFAULT_FONT_FAMILY_NAME: &str = "Helvetica";

/// Environment variable naming a directory that holds the font files.
pub const FONTS_DIR_ENV: &str = "LATEX_REPORT_FONTS_DIR";

/// Environment variable overriding the font family name.
pub const FONT_FAMILY_ENV: &str = "LATEX_REPORT_FONT_FAMILY";

/// Font family and optional directory emitted as the `\setmainfont` line of the preamble.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FontConfig {
    family: String,
    directory: Option<PathBuf>,
}

impl Default for FontConfig {
    fn default() -> Self {
        Self {
            family: DEFAULT_FONT_FAMILY_NAME.to_owned(),
            directory: None,
        }
    }
}

impl FontConfig {
    /// Uses the system font registered under `family`.
    pub fn system(family: impl Into<String>) -> Self {
        Self {
            family: family.into(),
            directory: None,
        }
    }

    /// Loads `family` from font files stored in `directory`.
    pub fn from_directory(family: impl Into<String>, directory: impl Into<PathBuf>) -> Self {
        Self {
            family: family.into(),
            directory: Some(directory.into()),
        }
    }

    /// Reads the font settings from the environment.
    ///
    /// A configured directory that does not exist is reported and ignored, leaving the family
    /// to be resolved among the system fonts.
    pub fn from_env() -> Self {
        let family = env::var(FONT_FAMILY_ENV)
            .ok()
            .filter(|value| !value.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_FONT_FAMILY_NAME.to_owned());

        let directory = env_path(FONTS_DIR_ENV).and_then(|path| {
            if path.is_dir() {
                Some(path)
            } else {
                warn!(
                    "{} points at {} which is not a directory; using the system '{}' font.",
                    FONTS_DIR_ENV,
                    path.display(),
                    family
                );
                None
            }
        });

        Self { family, directory }
    }

    pub fn family(&self) -> &str {
        &self.family
    }

    pub fn directory(&self) -> Option<&Path> {
        self.directory.as_deref()
    }

    /// Renders the `\setmainfont` preamble command.
    pub fn preamble_line(&self) -> String {
        match &self.directory {
            Some(directory) => {
                let mut path = directory.display().to_string();
                if !path.ends_with('/') {
                    path.push('/');
                }
                format!(
                    "\\setmainfont[Path={},UprightFont=*]{{{}}}",
                    path, self.family
                )
            }
            None => format!("\\setmainfont{{{}}}", self.family),
        }
    }
}

fn env_path(var: &str) -> Option<PathBuf> {
    env::var_os(var).and_then(|value| {
        let path = PathBuf::from(value);
        if path.as_os_str().is_empty() {
            None
        } else {
            Some(path)
        }
    })
}
