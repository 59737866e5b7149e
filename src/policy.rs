//! Declarative policy trees.
//!
//! A policy is a tree of nodes, each tagged by `type`, that builds into one
//! shared [`Sifter`]. Any node may carry modifiers (`label`, `accept_early`,
//! `only_if`, `only_if_not`); nodes that reject on their own also take a
//! `reject` override.
//!
//! ```yaml
//! type: pipeline
//! children:
//!   - type: kind_list
//!     kinds: [0, 1, 3, 7]
//!     mode: allow
//!   - type: rate_limit
//!     user_key: pub_key
//!     quotas:
//!       - rate: 10
//!         per: minute
//!         burst: 5
//!     only_if:
//!       type: kind_list
//!       kinds: [1]
//!       mode: allow
//! ```

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

use crate::error::{Result, SieveError};
use crate::ratelimit::{KindQuota, LimiterOptions, Quota, Rate, RateLimitSifter, TimeUnit, UserKey};
use crate::sifters::{
    accept_all, author_list, content_has_all_words, content_has_any_word,
    content_matches_all_regexes, content_matches_any_regex, created_at_range_with_clock,
    kind_list, one_of, parse_ip_prefix_list, pipeline, pow_min_difficulty,
    source_ip_prefix_list, Conditional, Modded, Mode, Rejectable, RelativeTimeRange,
    SharedSifter, Sifter,
};

/// One node of a policy tree.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PolicyNode {
    #[serde(flatten)]
    pub kind: NodeKind,

    /// Name used for this node in logs
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,

    /// Inside a pipeline, accept immediately when this node accepts
    #[serde(default)]
    pub accept_early: bool,

    /// Inside a combinator, only apply this node if the condition accepts
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub only_if: Option<Box<PolicyNode>>,

    /// Inside a combinator, only apply this node if the condition doesn't accept
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub only_if_not: Option<Box<PolicyNode>>,

    /// Override how this node rejects
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reject: Option<RejectSpec>,
}

/// What a node does.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum NodeKind {
    AcceptAll,
    Pipeline {
        children: Vec<PolicyNode>,
    },
    OneOf {
        children: Vec<PolicyNode>,
    },
    IfThen {
        cond: Box<PolicyNode>,
        then: Box<PolicyNode>,
    },
    IfNotThen {
        cond: Box<PolicyNode>,
        then: Box<PolicyNode>,
    },
    AuthorList {
        authors: Vec<String>,
        mode: Mode,
    },
    KindList {
        kinds: Vec<u32>,
        mode: Mode,
    },
    ContentWords {
        words: Vec<String>,
        /// Require every word instead of any
        #[serde(default)]
        all: bool,
        mode: Mode,
    },
    ContentRegex {
        patterns: Vec<String>,
        /// Require every pattern instead of any
        #[serde(default)]
        all: bool,
        mode: Mode,
    },
    CreatedAtRange {
        /// Zero means unbounded
        #[serde(default)]
        max_past_secs: u64,
        /// Zero means unbounded
        #[serde(default)]
        max_future_secs: u64,
        mode: Mode,
    },
    Pow {
        min_difficulty: u32,
    },
    SourceIp {
        prefixes: Vec<String>,
        mode: Mode,
        mode_for_unknown: Mode,
    },
    RateLimit {
        user_key: UserKey,
        quotas: Vec<QuotaSpec>,
        /// Kinds that are never rate limited
        #[serde(default)]
        exclude_kinds: Vec<u32>,
    },
}

/// A quota as written in a policy.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuotaSpec {
    pub rate: u32,
    pub per: TimeUnit,
    #[serde(default)]
    pub burst: u32,
    /// Restrict the quota to these kinds; makes the limiter track users per kind
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kinds: Option<Vec<u32>>,
}

impl QuotaSpec {
    fn quota(&self) -> Quota {
        Quota {
            rate: Rate::per(self.rate, self.per),
            burst: self.burst,
        }
    }
}

/// Rejection override for a node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RejectSpec {
    Message(String),
    Shadow,
}

impl PolicyNode {
    /// A node of the given kind without modifiers.
    pub fn new(kind: NodeKind) -> Self {
        Self {
            kind,
            label: None,
            accept_early: false,
            only_if: None,
            only_if_not: None,
            reject: None,
        }
    }

    /// Parse a policy tree from YAML.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        serde_yaml::from_str(yaml)
            .map_err(|e| SieveError::Config(format!("Failed to parse policy: {}", e)))
    }

    /// Build the sifter this node describes.
    ///
    /// Modifiers only take effect when the node is a child of a combinator.
    pub fn build(&self, options: &LimiterOptions) -> Result<SharedSifter> {
        Ok(Arc::new(self.build_modded(options)?))
    }

    fn build_modded(&self, options: &LimiterOptions) -> Result<Modded> {
        if self.only_if.is_some() && self.only_if_not.is_some() {
            return Err(SieveError::Config(
                "only_if and only_if_not can't be combined on one node".to_string(),
            ));
        }

        let mut modded = Modded::from_shared(self.build_unit(options)?);
        if let Some(label) = &self.label {
            modded = modded.label(label.clone());
        }
        if self.accept_early {
            modded = modded.accept_early();
        }
        if let Some(cond) = &self.only_if {
            modded = modded.only_if(cond.build(options)?);
        }
        if let Some(cond) = &self.only_if_not {
            modded = modded.only_if_not(cond.build(options)?);
        }
        Ok(modded)
    }

    fn build_unit(&self, options: &LimiterOptions) -> Result<SharedSifter> {
        let sifter: SharedSifter = match &self.kind {
            NodeKind::AcceptAll => self.plain(accept_all())?,
            NodeKind::Pipeline { children } => {
                self.plain(pipeline(build_children(children, options)?))?
            }
            NodeKind::OneOf { children } => {
                self.rejecting(one_of(build_children(children, options)?))
            }
            NodeKind::IfThen { cond, then } => self.plain(Conditional::from_shared(
                cond.build(options)?,
                then.build(options)?,
                true,
            ))?,
            NodeKind::IfNotThen { cond, then } => self.plain(Conditional::from_shared(
                cond.build(options)?,
                then.build(options)?,
                false,
            ))?,
            NodeKind::AuthorList { authors, mode } => {
                self.rejecting(author_list(authors.clone(), *mode))
            }
            NodeKind::KindList { kinds, mode } => {
                self.rejecting(kind_list(kinds.iter().copied(), *mode))
            }
            NodeKind::ContentWords { words, all, mode } => {
                if *all {
                    self.rejecting(content_has_all_words(words.clone(), *mode))
                } else {
                    self.rejecting(content_has_any_word(words.clone(), *mode))
                }
            }
            NodeKind::ContentRegex { patterns, all, mode } => {
                let regexes = patterns
                    .iter()
                    .map(|p| {
                        Regex::new(p).map_err(|e| {
                            SieveError::Config(format!("invalid regex {:?}: {}", p, e))
                        })
                    })
                    .collect::<Result<Vec<_>>>()?;
                if *all {
                    self.rejecting(content_matches_all_regexes(regexes, *mode))
                } else {
                    self.rejecting(content_matches_any_regex(regexes, *mode))
                }
            }
            NodeKind::CreatedAtRange {
                max_past_secs,
                max_future_secs,
                mode,
            } => {
                let range = RelativeTimeRange::new(
                    Duration::from_secs(*max_past_secs),
                    Duration::from_secs(*max_future_secs),
                );
                self.rejecting(created_at_range_with_clock(range, *mode, options.clock.clone()))
            }
            NodeKind::Pow { min_difficulty } => self.rejecting(pow_min_difficulty(*min_difficulty)),
            NodeKind::SourceIp {
                prefixes,
                mode,
                mode_for_unknown,
            } => self.rejecting(source_ip_prefix_list(
                parse_ip_prefix_list(prefixes)?,
                *mode,
                *mode_for_unknown,
            )),
            NodeKind::RateLimit {
                user_key,
                quotas,
                exclude_kinds,
            } => self.rejecting(build_rate_limit(*user_key, quotas, exclude_kinds, options)?),
        };
        Ok(sifter)
    }

    /// Share a sifter that never rejects on its own; a `reject` override is a mistake.
    fn plain(&self, sifter: impl Sifter + 'static) -> Result<SharedSifter> {
        if self.reject.is_some() {
            return Err(SieveError::Config(format!(
                "reject can't be set on a {} node",
                self.type_name()
            )));
        }
        Ok(Arc::new(sifter))
    }

    /// Share a sifter after applying the node's `reject` override.
    fn rejecting<S: Sifter + Rejectable + 'static>(&self, sifter: S) -> SharedSifter {
        let sifter = match &self.reject {
            Some(RejectSpec::Message(msg)) => sifter.reject_with_msg(msg.clone()),
            Some(RejectSpec::Shadow) => sifter.shadow_reject(),
            None => sifter,
        };
        Arc::new(sifter)
    }

    fn type_name(&self) -> &'static str {
        match self.kind {
            NodeKind::AcceptAll => "accept_all",
            NodeKind::Pipeline { .. } => "pipeline",
            NodeKind::OneOf { .. } => "one_of",
            NodeKind::IfThen { .. } => "if_then",
            NodeKind::IfNotThen { .. } => "if_not_then",
            NodeKind::AuthorList { .. } => "author_list",
            NodeKind::KindList { .. } => "kind_list",
            NodeKind::ContentWords { .. } => "content_words",
            NodeKind::ContentRegex { .. } => "content_regex",
            NodeKind::CreatedAtRange { .. } => "created_at_range",
            NodeKind::Pow { .. } => "pow",
            NodeKind::SourceIp { .. } => "source_ip",
            NodeKind::RateLimit { .. } => "rate_limit",
        }
    }
}

impl Default for PolicyNode {
    fn default() -> Self {
        Self::new(NodeKind::AcceptAll)
    }
}

fn build_children(children: &[PolicyNode], options: &LimiterOptions) -> Result<Vec<Modded>> {
    children.iter().map(|child| child.build_modded(options)).collect()
}

fn build_rate_limit(
    user_key: UserKey,
    quotas: &[QuotaSpec],
    exclude_kinds: &[u32],
    options: &LimiterOptions,
) -> Result<RateLimitSifter> {
    let per_kind = quotas.iter().any(|q| q.kinds.is_some());
    let sifter = match quotas {
        [] => return Err(SieveError::Config("rate_limit needs at least one quota".to_string())),
        [single] if !per_kind => RateLimitSifter::by_user(single.quota(), user_key, options)?,
        _ if !per_kind => {
            return Err(SieveError::Config(
                "rate_limit with several quotas needs kinds on at least one of them".to_string(),
            ))
        }
        _ => {
            let kind_quotas: Vec<KindQuota> = quotas
                .iter()
                .map(|q| match &q.kinds {
                    Some(kinds) => q.quota().for_kinds(kinds.iter().copied()),
                    None => q.quota().for_kinds_matching(|_| true),
                })
                .collect();
            RateLimitSifter::by_user_and_kind(kind_quotas, user_key, options)?
        }
    };
    debug!(quotas = quotas.len(), per_kind, "Built rate limiter");

    if exclude_kinds.is_empty() {
        return Ok(sifter);
    }
    let excluded = exclude_kinds.to_vec();
    Ok(sifter.exclude(move |input| excluded.contains(&input.event.kind)))
}
