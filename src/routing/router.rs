//! Module registry and route lookup.
//!
//! # Responsibilities
//! - Hold the route bindings produced at startup
//! - Look up the binding serving a request path
//!
//! # Design Decisions
//! - Immutable after construction (shared via Arc, no locks)
//! - Bindings are checked in registration order; first match wins
//! - Duplicate routes keep the first registered binding

use std::collections::HashSet;
use std::path::Path;
use std::sync::Arc;

use crate::module::Capability;
use crate::routing::discovery::{
    self, identifier, registration_order, route_for, DiscoveryError, DiscoveryOptions,
    HandlerFactory, RouteBinding,
};
use crate::routing::matcher::RoutePrefix;

#[derive(Debug, Clone)]
struct CompiledRoute {
    matcher: RoutePrefix,
    binding: RouteBinding,
}

/// Ordered set of live routes.
#[derive(Debug, Clone, Default)]
pub struct ModuleRegistry {
    routes: Vec<CompiledRoute>,
}

impl ModuleRegistry {
    /// Build a registry from bindings in registration order.
    pub fn new(bindings: Vec<RouteBinding>) -> Self {
        let mut seen = HashSet::new();
        let mut routes = Vec::with_capacity(bindings.len());

        for binding in bindings {
            let matcher = RoutePrefix::new(binding.route.clone());
            if !seen.insert(matcher.key()) {
                tracing::warn!(
                    route = %binding.route,
                    module = %binding.identifier,
                    "Route already bound, module ignored"
                );
                continue;
            }
            routes.push(CompiledRoute { matcher, binding });
        }

        Self { routes }
    }

    /// Discover module files in `directory`.
    pub fn discover(
        directory: &Path,
        options: &DiscoveryOptions,
        factory: &dyn HandlerFactory,
    ) -> Result<Self, DiscoveryError> {
        let bindings = discovery::discover(directory, options, factory)?;
        tracing::info!(
            directory = %directory.display(),
            modules = bindings.len(),
            "Modules loaded"
        );
        Ok(Self::new(bindings))
    }

    /// Register handlers from an explicit list of module file names.
    /// Ordering and route rules are the same as for directory discovery.
    pub fn from_static<I, S>(modules: I, options: &DiscoveryOptions) -> Self
    where
        I: IntoIterator<Item = (S, Arc<dyn Capability>)>,
        S: Into<String>,
    {
        let mut handlers: std::collections::HashMap<String, Arc<dyn Capability>> = modules
            .into_iter()
            .map(|(name, handler)| (name.into(), handler))
            .collect();

        let names = registration_order(
            handlers.keys().cloned().collect::<Vec<_>>(),
            &options.suffix,
        );
        let bindings = names
            .into_iter()
            .filter_map(|name| {
                let handler = handlers.remove(&name)?;
                Some(RouteBinding {
                    identifier: identifier(&name),
                    route: route_for(&name, options),
                    handler,
                })
            })
            .collect();

        Self::new(bindings)
    }

    /// Find the binding serving `path`.
    pub fn match_path(&self, path: &str) -> Option<&RouteBinding> {
        self.routes
            .iter()
            .find(|route| route.matcher.matches(path))
            .map(|route| &route.binding)
    }

    pub fn bindings(&self) -> impl Iterator<Item = &RouteBinding> {
        self.routes.iter().map(|route| &route.binding)
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }
}
