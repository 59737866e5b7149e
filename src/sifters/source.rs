//! Matchers over the client's source address.
//!
//! Events that didn't come from an end-user client (imports, relay-to-relay
//! streams and syncs) are always accepted by these sifters.

use std::fmt;
use std::net::IpAddr;
use std::str::FromStr;
use tracing::warn;

use super::mode::{reject_per_mode, MatchResult, Mode};
use super::unit::SifterUnit;
use crate::error::{Result, SieveError};

/// An address prefix (CIDR block).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct IpPrefix {
    addr: IpAddr,
    bits: u8,
}

impl IpPrefix {
    pub fn new(addr: IpAddr, bits: u8) -> Result<Self> {
        let max = max_bits(&addr);
        if bits > max {
            return Err(SieveError::Config(format!(
                "prefix length {} exceeds {} for {}",
                bits, max, addr
            )));
        }
        Ok(Self { addr, bits })
    }

    /// A prefix covering exactly `addr`.
    pub fn host(addr: IpAddr) -> Self {
        Self {
            addr,
            bits: max_bits(&addr),
        }
    }

    pub fn bits(&self) -> u8 {
        self.bits
    }

    pub fn contains(&self, addr: &IpAddr) -> bool {
        match (self.addr, addr) {
            (IpAddr::V4(net), IpAddr::V4(a)) => {
                let mask = mask_u32(self.bits);
                u32::from(net) & mask == u32::from(*a) & mask
            }
            (IpAddr::V6(net), IpAddr::V6(a)) => {
                let mask = mask_u128(self.bits);
                u128::from(net) & mask == u128::from(*a) & mask
            }
            _ => false,
        }
    }
}

fn max_bits(addr: &IpAddr) -> u8 {
    match addr {
        IpAddr::V4(_) => 32,
        IpAddr::V6(_) => 128,
    }
}

fn mask_u32(bits: u8) -> u32 {
    u32::MAX.checked_shl(32 - bits as u32).unwrap_or(0)
}

fn mask_u128(bits: u8) -> u128 {
    u128::MAX.checked_shl(128 - bits as u32).unwrap_or(0)
}

impl FromStr for IpPrefix {
    type Err = SieveError;

    /// Parse `"addr/bits"`, or a bare address as a single-host prefix.
    fn from_str(s: &str) -> Result<Self> {
        match s.split_once('/') {
            Some((addr, bits)) => {
                let invalid = |e: &dyn std::fmt::Display| {
                    SieveError::Config(format!("failed to parse IP prefix {:?}: {}", s, e))
                };
                let addr: IpAddr = addr.parse().map_err(|e| invalid(&e))?;
                let bits: u8 = bits.parse().map_err(|e| invalid(&e))?;
                IpPrefix::new(addr, bits)
            }
            None => {
                let addr: IpAddr = s.parse().map_err(|e| {
                    SieveError::Config(format!("failed to parse IP addr {:?}: {}", s, e))
                })?;
                Ok(IpPrefix::host(addr))
            }
        }
    }
}

impl fmt::Display for IpPrefix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.addr, self.bits)
    }
}

/// Parse a list of addresses and CIDR blocks.
pub fn parse_ip_prefix_list<I, S>(list: I) -> Result<Vec<IpPrefix>>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    list.into_iter().map(|s| s.as_ref().parse()).collect()
}

/// Match the source address with `matcher`.
///
/// `mode_for_unknown` decides what happens when the source address of an
/// end-user event can't be parsed.
pub fn source_ip_matcher<F>(matcher: F, mode: Mode, mode_for_unknown: Mode) -> SifterUnit
where
    F: Fn(&IpAddr) -> Result<bool> + Send + Sync + 'static,
{
    SifterUnit::new(
        move |input| {
            if !input.source_type.is_end_user() {
                return Ok(MatchResult::AlwaysAccept);
            }
            match input.source_info.parse::<IpAddr>() {
                Ok(addr) => matcher(&addr).map(MatchResult::from),
                Err(e) => {
                    warn!(
                        source = %input.source_info,
                        error = %e,
                        "Failed to parse source IP address"
                    );
                    Ok(match mode_for_unknown {
                        Mode::Allow => MatchResult::AlwaysAccept,
                        Mode::Deny => MatchResult::AlwaysReject,
                    })
                }
            }
        },
        mode,
        reject_per_mode(
            mode,
            "blocked: source IP is not in the whitelist",
            "blocked: source IP is in the blacklist",
        ),
    )
}

/// Check whether the source address falls in any of `prefixes`.
pub fn source_ip_prefix_list(
    mut prefixes: Vec<IpPrefix>,
    mode: Mode,
    mode_for_unknown: Mode,
) -> SifterUnit {
    // broader ranges first
    prefixes.sort_by_key(|p| p.bits());
    source_ip_matcher(
        move |addr| Ok(prefixes.iter().any(|p| p.contains(addr))),
        mode,
        mode_for_unknown,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::input::{Action, Event, Input, SourceType};
    use crate::sifters::Sifter;

    #[test]
    fn test_parse_prefix_list() {
        let prefixes =
            parse_ip_prefix_list(["192.168.1.1", "10.0.0.0/8", "2001:db8::/32"]).unwrap();
        assert_eq!(prefixes[0].to_string(), "192.168.1.1/32");
        assert_eq!(prefixes[1].to_string(), "10.0.0.0/8");
        assert_eq!(prefixes[2].bits(), 32);

        assert!(parse_ip_prefix_list(["not-an-ip"]).is_err());
        assert!(parse_ip_prefix_list(["10.0.0.0/33"]).is_err());
    }

    #[test]
    fn test_prefix_contains() {
        let p: IpPrefix = "10.1.0.0/16".parse().unwrap();
        assert!(p.contains(&"10.1.255.3".parse().unwrap()));
        assert!(!p.contains(&"10.2.0.1".parse().unwrap()));
        assert!(!p.contains(&"::1".parse().unwrap()));

        let all: IpPrefix = "0.0.0.0/0".parse().unwrap();
        assert!(all.contains(&"8.8.8.8".parse().unwrap()));

        let v6: IpPrefix = "2001:db8::/32".parse().unwrap();
        assert!(v6.contains(&"2001:db8:1::1".parse().unwrap()));
        assert!(!v6.contains(&"2001:db9::1".parse().unwrap()));
    }

    #[tokio::test]
    async fn test_source_ip_prefix_list() {
        let prefixes = parse_ip_prefix_list(["192.168.0.0/16"]).unwrap();
        let s = source_ip_prefix_list(prefixes, Mode::Deny, Mode::Allow);

        let blocked = Input::from_client(Event::default(), "192.168.3.4");
        let res = s.sift(&blocked).await.unwrap();
        assert_eq!(res.action, Action::Reject);
        assert_eq!(res.msg, "blocked: source IP is in the blacklist");

        let ok = Input::from_client(Event::default(), "172.16.0.1");
        assert!(s.sift(&ok).await.unwrap().is_accept());
    }

    #[tokio::test]
    async fn test_non_end_user_always_accepted() {
        let s = source_ip_prefix_list(Vec::new(), Mode::Allow, Mode::Deny);
        let imported =
            Input::relayed(Event::default(), SourceType::Stream, "wss://relay.example.com");
        assert!(s.sift(&imported).await.unwrap().is_accept());
    }

    #[tokio::test]
    async fn test_unknown_source_follows_mode_for_unknown() {
        let mut input = Input::from_client(Event::default(), "garbage");
        input.source_type = SourceType::IP4;

        let lenient = source_ip_prefix_list(Vec::new(), Mode::Allow, Mode::Allow);
        assert!(lenient.sift(&input).await.unwrap().is_accept());

        let strict = source_ip_prefix_list(Vec::new(), Mode::Deny, Mode::Deny);
        assert!(!strict.sift(&input).await.unwrap().is_accept());
    }
}
