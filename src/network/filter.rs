//! Selecting ledger entries by method and resource type

use super::exchange::Exchange;
use std::collections::BTreeSet;
use std::sync::Arc;

/// Method and resource-type constraints. An empty set places no constraint
/// on its dimension.
///
/// When both sets are non-empty an exchange passes if it matches *either*
/// one. Callers asking for `POST` requests of type `fetch` will also get
/// every `GET` fetch and every `POST` document.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FilterCriteria {
    methods: BTreeSet<String>,
    resource_types: BTreeSet<String>,
}

impl FilterCriteria {
    pub fn new<M, R>(methods: M, resource_types: R) -> Self
    where
        M: IntoIterator,
        M::Item: AsRef<str>,
        R: IntoIterator,
        R::Item: AsRef<str>,
    {
        Self {
            methods: methods
                .into_iter()
                .map(|m| m.as_ref().trim().to_ascii_uppercase())
                .filter(|m| !m.is_empty())
                .collect(),
            resource_types: resource_types
                .into_iter()
                .map(|t| t.as_ref().trim().to_ascii_lowercase())
                .filter(|t| !t.is_empty())
                .collect(),
        }
    }

    pub fn is_unconstrained(&self) -> bool {
        self.methods.is_empty() && self.resource_types.is_empty()
    }

    pub fn matches(&self, exchange: &Exchange) -> bool {
        self.is_unconstrained()
            || self.methods.contains(&exchange.method)
            || self.resource_types.contains(&exchange.resource_type)
    }
}

/// Entries of `snapshot` that pass `criteria`, in their original order
#[must_use]
pub fn select(snapshot: &[Arc<Exchange>], criteria: &FilterCriteria) -> Vec<Arc<Exchange>> {
    snapshot
        .iter()
        .filter(|exchange| criteria.matches(exchange))
        .cloned()
        .collect()
}
