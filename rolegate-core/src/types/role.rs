//! Role and rule representations
//!
//! Role records arrive from a store as JSON of the shape
//! `{ id, name, tenant?, rules: [{ group, verb?, verbs? }] }`. The
//! `verb`/`verbs` pair is folded into a single [`VerbMatcher`] on the way in
//! and written back in its canonical single-key form on the way out.

use crate::error::Error;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// Wildcard token accepted in `group`, `verb` and `verbs`.
pub const WILDCARD: &str = "*";

/// A named, optionally tenant-scoped bundle of rules.
///
/// Roles are read-only snapshots for the lifetime of a decision; the store
/// that produced them owns any mutation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Role {
    /// Opaque role identifier
    pub id: String,
    /// Human readable name
    pub name: String,
    /// Owning tenant; `None` marks a role shared by every tenant
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tenant: Option<String>,
    /// Matching clauses, evaluated in list order
    #[serde(default)]
    pub rules: Vec<Rule>,
}

impl Role {
    /// Create a role with no rules
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            tenant: None,
            rules: Vec::new(),
        }
    }

    /// Scope the role to a tenant
    pub fn with_tenant(mut self, tenant: impl Into<String>) -> Self {
        self.tenant = Some(tenant.into());
        self
    }

    /// Append a rule
    pub fn with_rule(mut self, rule: Rule) -> Self {
        self.rules.push(rule);
        self
    }

    /// Append several rules, keeping their order
    pub fn with_rules<I>(mut self, rules: I) -> Self
    where
        I: IntoIterator<Item = Rule>,
    {
        self.rules.extend(rules);
        self
    }

    /// Whether the role is visible under `tenant`
    pub fn visible_to(&self, tenant: Option<&str>) -> bool {
        match (&self.tenant, tenant) {
            (None, _) => true,
            (Some(own), Some(requested)) => own == requested,
            (Some(_), None) => false,
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.id, self.name)
    }
}

/// Group side of a rule.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum GroupMatcher {
    /// `"*"`: every group
    Any,
    /// One named group
    Exact(String),
}

impl GroupMatcher {
    /// Matcher for a single group
    pub fn exact(group: impl Into<String>) -> Self {
        Self::from(group.into())
    }

    /// Whether `group` is covered
    pub fn matches(&self, group: &str) -> bool {
        match self {
            GroupMatcher::Any => true,
            GroupMatcher::Exact(own) => own == group,
        }
    }
}

impl From<String> for GroupMatcher {
    fn from(group: String) -> Self {
        if group == WILDCARD {
            GroupMatcher::Any
        } else {
            GroupMatcher::Exact(group)
        }
    }
}

impl From<&str> for GroupMatcher {
    fn from(group: &str) -> Self {
        Self::from(group.to_string())
    }
}

impl fmt::Display for GroupMatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GroupMatcher::Any => write!(f, "{}", WILDCARD),
            GroupMatcher::Exact(group) => write!(f, "{}", group),
        }
    }
}

/// Verb side of a rule.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum VerbMatcher {
    /// `verb: "*"` or `verbs: "*"`
    Wildcard,
    /// `verb: "<name>"`
    Exact(String),
    /// `verbs: [..]`
    Set(BTreeSet<String>),
    /// Neither key present; never satisfied
    Never,
}

impl VerbMatcher {
    /// Matcher for every verb
    pub fn any() -> Self {
        VerbMatcher::Wildcard
    }

    /// Matcher for one verb; `"*"` becomes [`VerbMatcher::Wildcard`]
    pub fn exact(verb: impl Into<String>) -> Self {
        let verb = verb.into();
        if verb == WILDCARD {
            VerbMatcher::Wildcard
        } else {
            VerbMatcher::Exact(verb)
        }
    }

    /// Matcher for a set of verbs
    pub fn set<I, S>(verbs: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        VerbMatcher::Set(verbs.into_iter().map(Into::into).collect())
    }

    /// Whether `verb` is covered
    pub fn matches(&self, verb: &str) -> bool {
        match self {
            VerbMatcher::Wildcard => true,
            VerbMatcher::Exact(own) => own == verb,
            VerbMatcher::Set(verbs) => verbs.contains(verb),
            VerbMatcher::Never => false,
        }
    }
}

impl fmt::Display for VerbMatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VerbMatcher::Wildcard => write!(f, "{}", WILDCARD),
            VerbMatcher::Exact(verb) => write!(f, "{}", verb),
            VerbMatcher::Set(verbs) => {
                let joined: Vec<&str> = verbs.iter().map(String::as_str).collect();
                write!(f, "[{}]", joined.join(","))
            }
            VerbMatcher::Never => write!(f, "<none>"),
        }
    }
}

/// A single (group, verb) matching clause.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "RuleRecord", into = "RuleRecord")]
pub struct Rule {
    /// Groups this rule covers
    pub group: GroupMatcher,
    /// Verbs this rule covers
    pub verb: VerbMatcher,
}

impl Rule {
    /// Create a rule
    pub fn new(group: impl Into<GroupMatcher>, verb: VerbMatcher) -> Self {
        Self {
            group: group.into(),
            verb,
        }
    }

    /// `{ group: "*", verb: "*" }`
    pub fn any() -> Self {
        Self::new(GroupMatcher::Any, VerbMatcher::Wildcard)
    }

    /// Whether the rule covers `verb` on `group`
    pub fn matches(&self, verb: &str, group: &str) -> bool {
        self.group.matches(group) && self.verb.matches(verb)
    }
}

impl fmt::Display for Rule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({})", self.verb, self.group)
    }
}

/// Stored form of a rule, with the historical dual `verb`/`verbs` keys.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct RuleRecord {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    group: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    verb: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    verbs: Option<VerbsRecord>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
enum VerbsRecord {
    Token(String),
    List(Vec<String>),
}

impl TryFrom<RuleRecord> for Rule {
    type Error = Error;

    fn try_from(record: RuleRecord) -> Result<Self, Self::Error> {
        let group = record
            .group
            .ok_or_else(|| Error::InvalidRule("rule has no group".to_string()))?;

        let verbs_wildcard = matches!(&record.verbs, Some(VerbsRecord::Token(t)) if t == WILDCARD);
        let verb = match (record.verb, record.verbs) {
            (Some(v), _) if v == WILDCARD => VerbMatcher::Wildcard,
            _ if verbs_wildcard => VerbMatcher::Wildcard,
            (Some(v), Some(VerbsRecord::List(mut list))) => {
                list.push(v);
                VerbMatcher::set(list)
            }
            (Some(v), _) => VerbMatcher::Exact(v),
            (None, Some(VerbsRecord::List(list))) => VerbMatcher::set(list),
            // A bare token other than "*" names no verbs.
            (None, Some(VerbsRecord::Token(_))) | (None, None) => VerbMatcher::Never,
        };

        Ok(Rule {
            group: GroupMatcher::from(group),
            verb,
        })
    }
}

impl From<Rule> for RuleRecord {
    fn from(rule: Rule) -> Self {
        let (verb, verbs) = match rule.verb {
            VerbMatcher::Wildcard => (Some(WILDCARD.to_string()), None),
            VerbMatcher::Exact(v) => (Some(v), None),
            VerbMatcher::Set(set) => (None, Some(VerbsRecord::List(set.into_iter().collect()))),
            VerbMatcher::Never => (None, None),
        };
        RuleRecord {
            group: Some(rule.group.to_string()),
            verb,
            verbs,
        }
    }
}
