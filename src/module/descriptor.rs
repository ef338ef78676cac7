//! Declarative module files.
//!
//! A module file describes one upstream endpoint:
//!
//! ```toml
//! method = "POST"
//! url = "/api/v1/user/detail"
//! forward_cookie = true
//!
//! [params]
//! uid = "uid"                          # take bag key `uid`
//! limit = { from = "limit", default = 30 }
//!
//! [options]
//! crypto = "weapi"
//! ```

use std::fs;
use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use axum::http::Method;
use indexmap::IndexMap;
use serde::Deserialize;
use serde_json::{Map, Value};
use thiserror::Error;

use crate::http::params::ParameterBag;
use crate::module::{CallOptions, Capability, HandlerOutcome, OutboundCall};
use crate::routing::discovery::{DiscoveryError, HandlerFactory};

#[derive(Debug, Error)]
pub enum DescriptorError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("invalid method `{0}`")]
    Method(String),
}

/// Where an upstream field takes its value from.
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum ParamSource {
    /// Bag key to read.
    Key(String),
    /// Bag key (defaults to the field name) plus a fallback value.
    Spec {
        from: Option<String>,
        #[serde(default)]
        default: Option<Value>,
    },
}

impl ParamSource {
    fn key(&self) -> Option<&str> {
        match self {
            ParamSource::Key(key) => Some(key),
            ParamSource::Spec { from, .. } => from.as_deref(),
        }
    }

    fn default_value(&self) -> Option<&Value> {
        match self {
            ParamSource::Key(_) => None,
            ParamSource::Spec { default, .. } => default.as_ref(),
        }
    }
}

/// Parsed module file.
#[derive(Debug, Clone, Deserialize)]
pub struct ModuleDescriptor {
    #[serde(default = "default_method")]
    pub method: String,
    pub url: String,
    #[serde(default)]
    pub params: IndexMap<String, ParamSource>,
    #[serde(default)]
    pub options: Map<String, Value>,
    #[serde(default = "default_forward_cookie")]
    pub forward_cookie: bool,
}

fn default_method() -> String {
    "POST".to_string()
}

fn default_forward_cookie() -> bool {
    true
}

impl ModuleDescriptor {
    pub fn from_toml(content: &str) -> Result<Self, DescriptorError> {
        Ok(toml::from_str(content)?)
    }

    pub fn into_module(self) -> Result<DescriptorModule, DescriptorError> {
        let method = Method::from_bytes(self.method.to_ascii_uppercase().as_bytes())
            .map_err(|_| DescriptorError::Method(self.method.clone()))?;
        Ok(DescriptorModule {
            method,
            url: self.url,
            params: self.params,
            options: self.options,
            forward_cookie: self.forward_cookie,
        })
    }
}

/// Handler that forwards selected bag entries to one upstream endpoint.
#[derive(Debug, Clone)]
pub struct DescriptorModule {
    method: Method,
    url: String,
    params: IndexMap<String, ParamSource>,
    options: Map<String, Value>,
    forward_cookie: bool,
}

impl DescriptorModule {
    fn build_data(&self, params: &ParameterBag) -> Map<String, Value> {
        let mut data = Map::new();
        for (field, source) in &self.params {
            let key = source.key().unwrap_or(field);
            if let Some(value) = params.get(key) {
                data.insert(field.clone(), value.to_json());
            } else if let Some(default) = source.default_value() {
                data.insert(field.clone(), default.clone());
            }
        }
        data
    }
}

#[async_trait]
impl Capability for DescriptorModule {
    async fn handle(
        &self,
        params: ParameterBag,
        outbound: Arc<dyn OutboundCall>,
    ) -> HandlerOutcome {
        let data = self.build_data(&params);
        let mut options = CallOptions {
            extra: self.options.clone(),
            ..CallOptions::default()
        };
        if self.forward_cookie {
            options.cookie = params.cookies().cloned().unwrap_or_default();
        }
        outbound.call(self.method.clone(), &self.url, data, options).await
    }
}

/// Loads module files from disk as [`DescriptorModule`]s.
#[derive(Debug, Clone, Copy, Default)]
pub struct DescriptorLoader;

impl DescriptorLoader {
    fn read(path: &Path) -> Result<DescriptorModule, DescriptorError> {
        let content = fs::read_to_string(path)?;
        ModuleDescriptor::from_toml(&content)?.into_module()
    }
}

impl HandlerFactory for DescriptorLoader {
    fn load(&self, path: &Path) -> Result<Arc<dyn Capability>, DiscoveryError> {
        let module = Self::read(path).map_err(|e| DiscoveryError::Load {
            file: path.display().to_string(),
            reason: e.to_string(),
        })?;
        Ok(Arc::new(module))
    }
}
