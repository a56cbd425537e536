//! First-party caveat conditions.
//!
//! A predicate is `<condition> <argument>`. Unrecognized conditions fail the
//! check; third-party caveats are never satisfied here.

use std::net::IpAddr;

use chrono::{DateTime, SecondsFormat, Utc};

use super::{Caveat, Macaroon};

const TIME_BEFORE: &str = "time-before";
const IP_ADDR: &str = "ipaddr";
const CUSTOM: &str = "lnd-custom";

/// A parsed first-party caveat predicate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CaveatCondition<'a> {
    /// Token expires at the given instant
    TimeBefore(DateTime<Utc>),
    /// Token is bound to a client address
    IpAddr(IpAddr),
    /// Condition interpreted by the receiving backend
    Custom(&'a str),
}

impl<'a> CaveatCondition<'a> {
    /// Parse a predicate.
    pub fn parse(predicate: &'a str) -> Result<Self, String> {
        let (condition, argument) = predicate
            .split_once(' ')
            .map(|(c, a)| (c, a.trim()))
            .unwrap_or((predicate, ""));

        match condition {
            TIME_BEFORE => DateTime::parse_from_rfc3339(argument)
                .map(|t| Self::TimeBefore(t.with_timezone(&Utc)))
                .map_err(|e| format!("invalid time-before caveat {argument:?}: {e}")),
            IP_ADDR => argument
                .parse()
                .map(Self::IpAddr)
                .map_err(|_| format!("invalid ipaddr caveat {argument:?}")),
            CUSTOM => Ok(Self::Custom(argument)),
            other => Err(format!("caveat {other:?} not satisfied: unrecognized condition")),
        }
    }
}

/// Predicate text for an expiry caveat.
pub fn time_before_caveat(deadline: DateTime<Utc>) -> String {
    format!(
        "{TIME_BEFORE} {}",
        deadline.to_rfc3339_opts(SecondsFormat::Secs, true)
    )
}

/// Checks caveats against the current request.
#[derive(Debug, Clone)]
pub struct CaveatChecker {
    now: DateTime<Utc>,
    peer: Option<IpAddr>,
}

impl CaveatChecker {
    /// Checker for a request from `peer`, evaluated now.
    pub fn new(peer: Option<IpAddr>) -> Self {
        Self {
            now: Utc::now(),
            peer,
        }
    }

    /// Evaluate time-based conditions at `now` instead.
    pub fn at(mut self, now: DateTime<Utc>) -> Self {
        self.now = now;
        self
    }

    /// Check a single caveat.
    pub fn check(&self, caveat: &Caveat) -> Result<(), String> {
        if !caveat.is_first_party() {
            return Err("third-party caveats are not supported".to_string());
        }
        let predicate = caveat
            .predicate()
            .ok_or_else(|| "caveat predicate is not valid UTF-8".to_string())?;

        match CaveatCondition::parse(predicate)? {
            CaveatCondition::TimeBefore(deadline) if self.now < deadline => Ok(()),
            CaveatCondition::TimeBefore(_) => Err("macaroon has expired".to_string()),
            CaveatCondition::IpAddr(bound) => match self.peer {
                Some(peer) if peer == bound => Ok(()),
                Some(peer) => Err(format!("macaroon locked to different IP address {peer}")),
                None => Err("macaroon is locked to an IP address".to_string()),
            },
            CaveatCondition::Custom(_) => Ok(()),
        }
    }

    /// Check every caveat of `macaroon`, returning the predicates in order.
    pub fn check_all(&self, macaroon: &Macaroon) -> Result<Vec<String>, String> {
        macaroon
            .caveats()
            .iter()
            .map(|caveat| {
                self.check(caveat)?;
                Ok(String::from_utf8_lossy(&caveat.id).into_owned())
            })
            .collect()
    }
}
