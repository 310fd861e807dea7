//! Proxy rules.

use std::fmt;
use std::net::Ipv6Addr;
use std::str::FromStr;

use anyhow::Context;
use ndproxy::util::{ifname, ipv6_in_prefix, parse_prefix};

/// What to do with a solicitation that matches a rule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    /// Answer immediately.
    Static,
    /// Probe the named upstream interface and answer once it advertises.
    Forward(String),
}

/// A target prefix and the action for solicitations inside it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rule {
    pub prefix: Ipv6Addr,
    pub prefix_len: u8,
    pub action: Action,
}

impl Rule {
    /// Check if `target` falls inside this rule's prefix.
    pub fn matches(&self, target: Ipv6Addr) -> bool {
        ipv6_in_prefix(target, self.prefix, self.prefix_len)
    }
}

/// First rule matching `target`, in the order given.
pub fn find(rules: &[Rule], target: Ipv6Addr) -> Option<&Rule> {
    rules.iter().find(|r| r.matches(target))
}

impl FromStr for Rule {
    type Err = anyhow::Error;

    /// Parse `PREFIX` or `PREFIX=IFACE`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (prefix, action) = match s.split_once('=') {
            Some((prefix, upstream)) => {
                ifname::validate(upstream)
                    .with_context(|| format!("invalid upstream in rule {:?}", s))?;
                (prefix, Action::Forward(upstream.to_string()))
            }
            None => (s, Action::Static),
        };

        let (prefix, prefix_len) =
            parse_prefix(prefix).with_context(|| format!("invalid prefix in rule {:?}", s))?;

        Ok(Self {
            prefix,
            prefix_len,
            action,
        })
    }
}

impl fmt::Display for Rule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.prefix, self.prefix_len)?;
        match &self.action {
            Action::Static => f.write_str(" static"),
            Action::Forward(upstream) => write!(f, " via {}", upstream),
        }
    }
}
