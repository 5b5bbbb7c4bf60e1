use crate::error::{Error, Result};
use crate::jira::JiraClient;
use crate::registry::Registry;
use std::collections::BTreeMap;

/// A task or issue fetched from an external tracking system.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(crate) struct Ticket {
    pub(crate) key: String,
    pub(crate) summary: String,
    pub(crate) description: String,
    pub(crate) status: String,
    pub(crate) assignee: String,
    pub(crate) url: String,
    pub(crate) labels: Vec<String>,
}

/// Uniform contract every ticket provider implements. The lifecycle layer
/// only relies on `get_ticket` returning a summary usable as a description.
pub(crate) trait Connector {
    fn name(&self) -> &str;

    fn get_ticket(&self, key: &str) -> Result<Ticket>;

    fn list_assigned(&self) -> Result<Vec<Ticket>>;

    fn transition_ticket(&self, key: &str, status: &str) -> Result<()>;

    /// Checks the connector is usable with its stored configuration.
    fn validate(&self) -> Result<()>;
}

/// Provider slot that is registered but not implemented yet. Every call
/// reports the same unsupported error.
pub(crate) struct Placeholder {
    name: &'static str,
}

impl Placeholder {
    pub(crate) const fn new(name: &'static str) -> Self {
        Self { name }
    }

    fn unsupported(&self) -> Error {
        Error::ConnectorUnsupported {
            name: self.name.to_string(),
        }
    }
}

impl Connector for Placeholder {
    fn name(&self) -> &str {
        self.name
    }

    fn get_ticket(&self, _key: &str) -> Result<Ticket> {
        Err(self.unsupported())
    }

    fn list_assigned(&self) -> Result<Vec<Ticket>> {
        Err(self.unsupported())
    }

    fn transition_ticket(&self, _key: &str, _status: &str) -> Result<()> {
        Err(self.unsupported())
    }

    fn validate(&self) -> Result<()> {
        Err(self.unsupported())
    }
}

#[derive(Default)]
pub(crate) struct ConnectorRegistry {
    connectors: BTreeMap<String, Box<dyn Connector>>,
}

impl ConnectorRegistry {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn register(&mut self, connector: Box<dyn Connector>) {
        self.connectors
            .insert(connector.name().to_string(), connector);
    }

    pub(crate) fn get(&self, name: &str) -> Option<&dyn Connector> {
        self.connectors.get(name).map(Box::as_ref)
    }

    pub(crate) fn names(&self) -> Vec<String> {
        self.connectors.keys().cloned().collect()
    }
}

/// Builds the provider set from stored configuration: Jira when configured,
/// plus the placeholder providers so they appear in listings with a clear
/// error instead of "not found".
pub(crate) fn build_connectors(registry: &Registry) -> ConnectorRegistry {
    let mut connectors = ConnectorRegistry::new();
    if let Some(config) = registry.connector("jira") {
        connectors.register(Box::new(JiraClient::new(
            &config.url,
            &config.email,
            &config.api_token,
        )));
    }
    connectors.register(Box::new(Placeholder::new("monday")));
    connectors.register(Box::new(Placeholder::new("clickup")));
    connectors
}
