// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Scan target classification and normalization.
//!
//! The dispatcher derives the target type from the raw user input before a
//! scan row is created; unrecognized targets are rejected up front. The
//! detected kind doubles as the seed event's type.

use regex::Regex;
use std::net::{Ipv4Addr, Ipv6Addr};
use std::sync::OnceLock;

/// Kind of target a scan runs against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TargetKind {
    IpAddress,
    Ipv6Address,
    Netblock,
    InternetName,
    EmailAddress,
    PhoneNumber,
    HumanName,
    Username,
    BgpAs,
    BitcoinAddress,
}

crate::simple_display! {
    TargetKind {
        IpAddress => "IP_ADDRESS",
        Ipv6Address => "IPV6_ADDRESS",
        Netblock => "NETBLOCK_OWNER",
        InternetName => "INTERNET_NAME",
        EmailAddress => "EMAILADDR",
        PhoneNumber => "PHONE_NUMBER",
        HumanName => "HUMAN_NAME",
        Username => "USERNAME",
        BgpAs => "BGP_AS_OWNER",
        BitcoinAddress => "BITCOIN_ADDRESS",
    }
}

fn regex(cell: &'static OnceLock<Regex>, pattern: &str) -> &'static Regex {
    cell.get_or_init(|| match Regex::new(pattern) {
        Ok(re) => re,
        // Patterns are literals; a failure here is a programming error.
        Err(e) => unreachable!("invalid built-in pattern {pattern:?}: {e}"),
    })
}

fn phone_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    regex(&RE, r"^\+[0-9()\-\s]{6,}$")
}

fn human_name_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    regex(&RE, r#"^"[A-Za-z\s'.\-]+\s+[A-Za-z\s'.\-]+"$"#)
}

fn username_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    regex(&RE, r#"^"[A-Za-z0-9_.\-]+"$"#)
}

fn bgp_as_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    regex(&RE, r"^(AS|as)\d+$")
}

fn email_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    regex(&RE, r"^[A-Za-z0-9._%+\-]+@[A-Za-z0-9.\-]+\.[A-Za-z]{2,}$")
}

fn bitcoin_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    regex(&RE, r"^[13][a-km-zA-HJ-NP-Z1-9]{25,34}$")
}

fn internet_name_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    regex(&RE, r"^[a-zA-Z0-9\-]+(\.[a-zA-Z0-9\-]+)+$")
}

fn parse_netblock(s: &str) -> bool {
    let Some((addr, prefix)) = s.split_once('/') else {
        return false;
    };
    let Ok(prefix) = prefix.parse::<u8>() else {
        return false;
    };
    addr.parse::<Ipv4Addr>().is_ok() && prefix <= 32
}

impl TargetKind {
    /// Detect the kind of a raw target string, most specific first.
    pub fn detect(target: &str) -> Option<Self> {
        let target = target.trim();
        if target.is_empty() {
            return None;
        }
        if target.parse::<Ipv4Addr>().is_ok() {
            return Some(Self::IpAddress);
        }
        if target.parse::<Ipv6Addr>().is_ok() {
            return Some(Self::Ipv6Address);
        }
        if parse_netblock(target) {
            return Some(Self::Netblock);
        }
        if bgp_as_re().is_match(target) {
            return Some(Self::BgpAs);
        }
        if phone_re().is_match(target) {
            return Some(Self::PhoneNumber);
        }
        if human_name_re().is_match(target) {
            return Some(Self::HumanName);
        }
        if username_re().is_match(target) {
            return Some(Self::Username);
        }
        if email_re().is_match(target) {
            return Some(Self::EmailAddress);
        }
        if bitcoin_re().is_match(target) {
            return Some(Self::BitcoinAddress);
        }
        if internet_name_re().is_match(target) {
            return Some(Self::InternetName);
        }
        None
    }

    /// Quote-delimited kinds keep the user's casing; everything else is
    /// case-insensitive on the wire and lowercased for stable dedup.
    pub fn preserves_case(self) -> bool {
        matches!(self, Self::HumanName | Self::Username | Self::BitcoinAddress)
    }

    /// Normalize a raw target for this kind: strip quotes from quoted
    /// kinds, lowercase the rest.
    pub fn normalize(self, target: &str) -> String {
        let target = target.trim();
        if self.preserves_case() {
            target.replace('"', "")
        } else {
            target.to_lowercase()
        }
    }
}

#[cfg(test)]
#[path = "target_tests.rs"]
mod tests;
