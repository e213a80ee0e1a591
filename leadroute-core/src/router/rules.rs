//! Ordered routing rules
//!
//! Each rule pairs a tag predicate with a destination set. Rules are checked
//! in order and the first match decides which channels a lead may use.

use crate::channels::ChannelKind;
use leadroute_common::db::Client;
use regex::Regex;

/// Name of the rule sending marked tags to the fixed CRM
pub const FIXED_CRM_RULE: &str = "fixed-crm-override";
/// Name of the catch-all rule using the client's own destinations
pub const CLIENT_RULE: &str = "client-configured";

#[derive(Debug, Clone)]
pub enum TagPredicate {
    Matches(Regex),
    Always,
}

impl TagPredicate {
    pub fn matches(&self, tag: &str) -> bool {
        match self {
            TagPredicate::Matches(re) => re.is_match(tag),
            TagPredicate::Always => true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DestinationSet {
    /// Exactly these channels, ignoring the client's own configuration
    Exclusive(Vec<ChannelKind>),
    /// Spreadsheet and/or CRM webhook, whichever the client has configured
    ClientConfigured,
}

impl DestinationSet {
    pub fn channels_for(&self, client: &Client) -> Vec<ChannelKind> {
        match self {
            DestinationSet::Exclusive(kinds) => kinds.clone(),
            DestinationSet::ClientConfigured => {
                let mut kinds = Vec::new();
                if client.sheet_destination().is_some() {
                    kinds.push(ChannelKind::Sheet);
                }
                if client.crm_webhook().is_some() {
                    kinds.push(ChannelKind::CrmWebhook);
                }
                kinds
            }
        }
    }
}

#[derive(Debug, Clone)]
pub struct RoutingRule {
    pub name: String,
    pub predicate: TagPredicate,
    pub destinations: DestinationSet,
}

impl RoutingRule {
    pub fn new(name: impl Into<String>, predicate: TagPredicate, destinations: DestinationSet) -> Self {
        Self {
            name: name.into(),
            predicate,
            destinations,
        }
    }
}

/// Channel selection for one lead
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuleMatch<'a> {
    pub rule: &'a str,
    pub channels: Vec<ChannelKind>,
}

#[derive(Debug, Clone, Default)]
pub struct RuleTable {
    rules: Vec<RoutingRule>,
}

impl RuleTable {
    pub fn new(rules: Vec<RoutingRule>) -> Self {
        Self { rules }
    }

    /// Optional fixed-CRM override followed by the client catch-all
    pub fn with_defaults(fixed_crm_pattern: Option<&str>) -> Result<Self, regex::Error> {
        let mut rules = Vec::with_capacity(2);
        if let Some(pattern) = fixed_crm_pattern {
            rules.push(RoutingRule::new(
                FIXED_CRM_RULE,
                TagPredicate::Matches(Regex::new(pattern)?),
                DestinationSet::Exclusive(vec![ChannelKind::FixedCrm]),
            ));
        }
        rules.push(RoutingRule::new(CLIENT_RULE, TagPredicate::Always, DestinationSet::ClientConfigured));
        Ok(Self { rules })
    }

    /// First matching rule and its channels; `None` if no rule matches
    pub fn select(&self, tag: &str, client: &Client) -> Option<RuleMatch<'_>> {
        self.rules
            .iter()
            .find(|rule| rule.predicate.matches(tag))
            .map(|rule| RuleMatch {
                rule: &rule.name,
                channels: rule.destinations.channels_for(client),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDateTime;

    fn client(sheet: bool, crm: bool) -> Client {
        Client {
            id: "c1".to_string(),
            name: "Acme".to_string(),
            tag: "[X1] Acme".to_string(),
            spreadsheet_id: sheet.then(|| "sheet-id".to_string()),
            sheet_name: sheet.then(|| "Leads".to_string()),
            use_crm: crm,
            webhook_url: Some("http://crm.example/hook".to_string()),
            created_at: NaiveDateTime::default(),
        }
    }

    #[test]
    fn test_client_configured_channels() {
        let table = RuleTable::with_defaults(None).unwrap();
        let both = table.select("[X1] Acme", &client(true, true)).unwrap();
        assert_eq!(both.rule, CLIENT_RULE);
        assert_eq!(both.channels, vec![ChannelKind::Sheet, ChannelKind::CrmWebhook]);

        let none = table.select("[X1] Acme", &client(false, false)).unwrap();
        assert!(none.channels.is_empty());
    }

    #[test]
    fn test_override_is_exclusive_and_first() {
        let table = RuleTable::with_defaults(Some(r"^\[D\d+\]")).unwrap();

        let marked = table.select("[D12] Builder", &client(true, true)).unwrap();
        assert_eq!(marked.rule, FIXED_CRM_RULE);
        assert_eq!(marked.channels, vec![ChannelKind::FixedCrm]);

        let unmarked = table.select("[X1] Acme", &client(true, false)).unwrap();
        assert_eq!(unmarked.rule, CLIENT_RULE);
        assert_eq!(unmarked.channels, vec![ChannelKind::Sheet]);
    }

    #[test]
    fn test_invalid_pattern_is_error() {
        assert!(RuleTable::with_defaults(Some("([")).is_err());
    }

    #[test]
    fn test_empty_table_matches_nothing() {
        assert!(RuleTable::default().select("any", &client(true, true)).is_none());
    }
}
