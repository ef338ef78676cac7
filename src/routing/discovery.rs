//! Module discovery and route derivation.
//!
//! # Responsibilities
//! - List module files in a directory (non-recursive)
//! - Derive each module's route from its file name
//! - Apply the filename → route override table
//! - Produce bindings in registration order
//!
//! # Design Decisions
//! - Entries are registered in reverse lexical order, so later names take
//!   precedence over earlier ones that would map to the same route
//! - An unreadable directory or a module that fails to load aborts startup

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use thiserror::Error;

use crate::module::Capability;

/// Default suffix of module files.
pub const DEFAULT_MODULE_SUFFIX: &str = ".toml";

#[derive(Debug, Error)]
pub enum DiscoveryError {
    #[error("cannot read module directory {}: {source}", path.display())]
    ReadDir {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to load module {file}: {reason}")]
    Load { file: String, reason: String },
}

/// Builds a handler from a module file.
pub trait HandlerFactory {
    fn load(&self, path: &Path) -> Result<Arc<dyn Capability>, DiscoveryError>;
}

/// One route bound to one handler.
#[derive(Clone)]
pub struct RouteBinding {
    /// File name up to its first `.`.
    pub identifier: String,
    /// URL path the handler is mounted on.
    pub route: String,
    pub handler: Arc<dyn Capability>,
}

impl std::fmt::Debug for RouteBinding {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RouteBinding")
            .field("identifier", &self.identifier)
            .field("route", &self.route)
            .finish_non_exhaustive()
    }
}

/// How module files are recognised and routed.
#[derive(Debug, Clone)]
pub struct DiscoveryOptions {
    pub suffix: String,
    /// Exact file name → route used verbatim.
    pub overrides: BTreeMap<String, String>,
}

impl Default for DiscoveryOptions {
    fn default() -> Self {
        Self {
            suffix: DEFAULT_MODULE_SUFFIX.to_string(),
            overrides: default_overrides(DEFAULT_MODULE_SUFFIX),
        }
    }
}

/// Modules served on a flat route instead of their nested default.
pub fn default_overrides(suffix: &str) -> BTreeMap<String, String> {
    ["daily_signin", "fm_trash", "personal_fm"]
        .into_iter()
        .map(|name| (format!("{}{}", name, suffix), format!("/{}", name)))
        .collect()
}

/// `user_detail.toml` → `/user/detail`.
pub fn derive_route(file_name: &str, suffix: &str) -> String {
    let stem = file_name.strip_suffix(suffix).unwrap_or(file_name);
    format!("/{}", stem.replace('_', "/"))
}

/// `user_detail.toml` → `user_detail`.
pub fn identifier(file_name: &str) -> String {
    file_name.split('.').next().unwrap_or_default().to_string()
}

/// Route for a module file, honouring the override table.
pub fn route_for(file_name: &str, options: &DiscoveryOptions) -> String {
    options
        .overrides
        .get(file_name)
        .cloned()
        .unwrap_or_else(|| derive_route(file_name, &options.suffix))
}

/// Order file names for registration: module files only, reverse lexical.
pub fn registration_order<I>(names: I, suffix: &str) -> Vec<String>
where
    I: IntoIterator<Item = String>,
{
    let mut names: Vec<String> = names
        .into_iter()
        .filter(|name| name.ends_with(suffix))
        .collect();
    names.sort();
    names.reverse();
    names
}

/// Scan `directory` and bind every module file to its route.
pub fn discover(
    directory: &Path,
    options: &DiscoveryOptions,
    factory: &dyn HandlerFactory,
) -> Result<Vec<RouteBinding>, DiscoveryError> {
    let read_err = |source| DiscoveryError::ReadDir {
        path: directory.to_path_buf(),
        source,
    };

    let mut names = Vec::new();
    for entry in fs::read_dir(directory).map_err(read_err)? {
        let entry = entry.map_err(read_err)?;
        if !entry.file_type().map_err(read_err)?.is_file() {
            continue;
        }
        match entry.file_name().into_string() {
            Ok(name) => names.push(name),
            Err(name) => tracing::warn!(file = ?name, "Skipping module with non UTF-8 name"),
        }
    }

    let mut bindings = Vec::new();
    for name in registration_order(names, &options.suffix) {
        let handler = factory.load(&directory.join(&name))?;
        let route = route_for(&name, options);
        tracing::debug!(file = %name, route = %route, "Module discovered");
        bindings.push(RouteBinding {
            identifier: identifier(&name),
            route,
            handler,
        });
    }

    Ok(bindings)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_derive_route() {
        assert_eq!(derive_route("user_detail.toml", ".toml"), "/user/detail");
        assert_eq!(derive_route("search.toml", ".toml"), "/search");
        assert_eq!(derive_route("a_b_c.toml", ".toml"), "/a/b/c");
    }

    #[test]
    fn test_overrides_take_precedence() {
        let options = DiscoveryOptions::default();
        assert_eq!(route_for("daily_signin.toml", &options), "/daily_signin");
        assert_eq!(route_for("fm_trash.toml", &options), "/fm_trash");
        assert_eq!(route_for("personal_fm.toml", &options), "/personal_fm");
        assert_eq!(route_for("daily_other.toml", &options), "/daily/other");
    }

    #[test]
    fn test_identifier() {
        assert_eq!(identifier("user_detail.toml"), "user_detail");
        assert_eq!(identifier("archive.tar.toml"), "archive");
    }

    #[test]
    fn test_registration_order() {
        let names = ["user.toml", "album.toml", "README.md", "user_detail.toml"]
            .map(String::from);
        assert_eq!(
            registration_order(names, ".toml"),
            vec!["user_detail.toml", "user.toml", "album.toml"]
        );
    }
}
