//! Host and route matching against a loaded policy.

use std::collections::HashMap;

use guardette_router::{Params, Router};
use http::Method;

use crate::policy::{Policy, Rule, Source};

/// The source and rule selected for a call.
#[derive(Debug)]
pub struct MatchResult<'p> {
    /// Matched source.
    pub source: &'p Source,
    /// First matching rule in declaration order.
    pub rule: &'p Rule,
    /// Parameters bound by the rule's route.
    pub path_params: Params,
}

/// Routing table derived from a [`Policy`].
///
/// Hosts are compared exactly; within a host the first rule whose method and
/// path both match wins.
#[derive(Debug)]
pub struct Matcher {
    policy: Policy,
    hosts: HashMap<String, (usize, Router<usize>)>,
}

impl Matcher {
    /// Builds the routing table.
    pub fn new(policy: Policy) -> Self {
        let hosts = policy
            .sources()
            .iter()
            .enumerate()
            .map(|(index, source)| {
                let mut router = Router::new();
                for (rule_index, rule) in source.rules.iter().enumerate() {
                    router.insert(rule.route.clone(), rule_index);
                }
                (source.host.clone(), (index, router))
            })
            .collect();

        Self { policy, hosts }
    }

    /// The policy this table was built from.
    pub fn policy(&self) -> &Policy {
        &self.policy
    }

    /// Finds the rule serving `method path` on `host`.
    pub fn match_request(&self, host: &str, method: &Method, path: &str) -> Option<MatchResult<'_>> {
        let (source_index, router) = self.hosts.get(host)?;
        let matched = router.match_route(method, path)?;

        let source = &self.policy.sources()[*source_index];
        Some(MatchResult {
            source,
            rule: &source.rules[*matched.value],
            path_params: matched.params,
        })
    }
}
