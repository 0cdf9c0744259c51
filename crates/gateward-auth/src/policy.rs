//! Authorization rules.

use crate::config::string_list;
use crate::identity::Identity;

use serde::Deserialize;
use std::collections::BTreeMap;
use tracing::debug;

/// Who may pass: exact emails, email domains and roles.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct Rule {
    /// Exact email addresses.
    #[serde(default, deserialize_with = "string_list")]
    pub whitelist: Vec<String>,
    /// Email domains (the part after `@`).
    #[serde(default, deserialize_with = "string_list")]
    pub domains: Vec<String>,
    /// Role names.
    #[serde(default, deserialize_with = "string_list")]
    pub allowed_roles: Vec<String>,
}

impl Rule {
    /// True when nothing is restricted.
    pub fn is_empty(&self) -> bool {
        self.whitelist.is_empty() && self.domains.is_empty() && self.allowed_roles.is_empty()
    }
}

/// The lists that apply to one request after rule overrides.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EffectiveRule<'a> {
    /// Exact emails.
    pub whitelist: &'a [String],
    /// Email domains.
    pub domains: &'a [String],
    /// Roles.
    pub allowed_roles: &'a [String],
}

/// Global rule plus named overrides.
#[derive(Debug, Clone, Default)]
pub struct AuthorizationPolicy {
    global: Rule,
    rules: BTreeMap<String, Rule>,
}

impl AuthorizationPolicy {
    /// Build from the global rule and named rules.
    pub fn new(global: Rule, rules: BTreeMap<String, Rule>) -> Self {
        Self { global, rules }
    }

    /// Resolve the lists for `rule_name`.
    ///
    /// A named rule replaces whitelist and domains together if it sets either
    /// of them, and replaces the roles if it sets any. Everything else comes
    /// from the global rule.
    pub fn effective(&self, rule_name: &str) -> EffectiveRule<'_> {
        let mut eff = EffectiveRule {
            whitelist: &self.global.whitelist,
            domains: &self.global.domains,
            allowed_roles: &self.global.allowed_roles,
        };

        if let Some(rule) = self.rules.get(rule_name) {
            if !rule.whitelist.is_empty() || !rule.domains.is_empty() {
                eff.whitelist = &rule.whitelist;
                eff.domains = &rule.domains;
            }
            if !rule.allowed_roles.is_empty() {
                eff.allowed_roles = &rule.allowed_roles;
            }
        }

        eff
    }

    /// Decide whether `identity` may pass under `rule_name`.
    ///
    /// With no whitelist, domains or roles in effect everyone is allowed.
    pub fn authorize(&self, identity: &Identity, rule_name: &str) -> bool {
        let eff = self.effective(rule_name);

        if eff.whitelist.is_empty() && eff.domains.is_empty() && eff.allowed_roles.is_empty() {
            return true;
        }

        if eff.whitelist.iter().any(|e| *e == identity.email) {
            return true;
        }

        if let Some(domain) = identity.email_domain() {
            if eff.domains.iter().any(|d| d == domain) {
                return true;
            }
        }

        debug!(user = %identity.name, roles = ?identity.roles, "checking roles");
        eff.allowed_roles.iter().any(|r| identity.roles.contains(r))
    }
}
