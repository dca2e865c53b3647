use std::{
    fmt,
    net::{IpAddr, Ipv4Addr, Ipv6Addr},
    str::FromStr,
};

use serde::Deserialize;

use crate::{errors::Error, Result};

/// A CIDR block (`1.2.3.0/24`). A bare address is treated as a single-host range.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct IpRange {
    network: IpAddr,
    prefix: u8,
}

impl IpRange {
    pub fn new(network: IpAddr, prefix: u8) -> Result<Self> {
        let max = max_prefix(&network);
        if prefix > max {
            return Err(Error::Config(format!(
                "prefix /{prefix} is out of range for {network}"
            )));
        }
        Ok(Self { network, prefix })
    }

    pub fn network(&self) -> IpAddr {
        self.network
    }

    pub fn prefix(&self) -> u8 {
        self.prefix
    }

    pub fn contains(&self, addr: IpAddr) -> bool {
        match (self.network, addr) {
            (IpAddr::V4(net), IpAddr::V4(ip)) => {
                let mask = mask_u32(self.prefix);
                u32::from(net) & mask == u32::from(ip) & mask
            }
            (IpAddr::V6(net), IpAddr::V6(ip)) => {
                let mask = mask_u128(self.prefix);
                u128::from(net) & mask == u128::from(ip) & mask
            }
            // Provider ranges are written in one family; an IPv4-mapped IPv6
            // egress still matches its IPv4 range.
            (IpAddr::V4(_), IpAddr::V6(ip)) => match ip.to_ipv4_mapped() {
                Some(v4) => self.contains(IpAddr::V4(v4)),
                None => false,
            },
            (IpAddr::V6(_), IpAddr::V4(_)) => false,
        }
    }
}

impl FromStr for IpRange {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        let (addr, prefix) = match s.split_once('/') {
            Some((a, p)) => (a, Some(p)),
            None => (s, None),
        };
        let network = addr
            .parse::<IpAddr>()
            .map_err(|_| Error::Config(format!("invalid address in range {s:?}")))?;
        let prefix = match prefix {
            Some(p) => p
                .parse::<u8>()
                .map_err(|_| Error::Config(format!("invalid prefix in range {s:?}")))?,
            None => max_prefix(&network),
        };
        Self::new(network, prefix)
    }
}

impl fmt::Display for IpRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.network, self.prefix)
    }
}

fn max_prefix(addr: &IpAddr) -> u8 {
    match addr {
        IpAddr::V4(_) => 32,
        IpAddr::V6(_) => 128,
    }
}

fn mask_u32(prefix: u8) -> u32 {
    if prefix == 0 {
        0
    } else {
        u32::MAX << (32 - u32::from(prefix))
    }
}

fn mask_u128(prefix: u8) -> u128 {
    if prefix == 0 {
        0
    } else {
        u128::MAX << (128 - u32::from(prefix))
    }
}

/// An API key registered on the developer account.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ApiKey {
    pub id: Option<String>,
    pub name: Option<String>,
    pub key_value: String,
    pub allowed_ranges: Vec<IpRange>,
}

impl ApiKey {
    pub fn allows(&self, addr: IpAddr) -> bool {
        self.allowed_ranges.iter().any(|r| r.contains(addr))
    }
}

#[derive(Debug, Deserialize)]
struct RawKey {
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    name: Option<String>,
    key: String,
    #[serde(rename = "cidrRanges", default)]
    cidr_ranges: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct RawKeyList {
    keys: Vec<RawKey>,
}

/// Decode the `keys` array of a key-listing response.
///
/// Unparseable ranges are skipped rather than failing the whole listing; a key
/// with no usable range simply never matches.
pub fn parse_key_list(body: &serde_json::Value) -> Result<Vec<ApiKey>> {
    let raw = RawKeyList::deserialize(body).map_err(|e| {
        Error::protocol(format!("malformed key listing: {e}"), Some(body.clone()))
    })?;

    Ok(raw
        .keys
        .into_iter()
        .map(|k| ApiKey {
            id: k.id,
            name: k.name,
            key_value: k.key,
            allowed_ranges: k
                .cidr_ranges
                .iter()
                .filter_map(|r| r.parse::<IpRange>().ok())
                .collect(),
        })
        .collect())
}

/// The caller's public address as reported by the IP-echo service.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct EgressAddress(pub IpAddr);

impl EgressAddress {
    /// Parse an `origin` value. Proxied requests report a comma-separated chain;
    /// the first hop is the client.
    pub fn parse_origin(origin: &str) -> Result<Self> {
        let first = origin.split(',').next().unwrap_or_default().trim();
        first
            .parse::<IpAddr>()
            .map(EgressAddress)
            .map_err(|_| Error::protocol(format!("invalid egress origin {origin:?}"), None))
    }
}

impl From<Ipv4Addr> for EgressAddress {
    fn from(ip: Ipv4Addr) -> Self {
        Self(IpAddr::V4(ip))
    }
}

impl From<Ipv6Addr> for EgressAddress {
    fn from(ip: Ipv6Addr) -> Self {
        Self(IpAddr::V6(ip))
    }
}

impl fmt::Display for EgressAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// First key (in listing order) whose ranges admit `egress`.
///
/// No key is ever created here; an unmatched address is a hard failure.
pub fn resolve_token(keys: &[ApiKey], egress: EgressAddress) -> Result<&ApiKey> {
    keys.iter()
        .find(|k| k.allows(egress.0))
        .ok_or_else(|| Error::KeyResolution {
            address: egress.to_string(),
        })
}

/// Developer-portal session produced by a successful login.
#[derive(Clone, Debug)]
pub struct Session {
    pub cookie: String,
    pub temporary_token: String,
    pub swagger_url: Option<String>,
    pub active_key: Option<ApiKey>,
    pub resolved_token: Option<String>,
}

impl Session {
    pub fn new(cookie: String, temporary_token: String, swagger_url: Option<String>) -> Self {
        Self {
            cookie,
            temporary_token,
            swagger_url,
            active_key: None,
            resolved_token: None,
        }
    }

    /// Ready once a key usable from the current egress address has been chosen.
    pub fn is_ready(&self) -> bool {
        self.resolved_token.is_some()
    }

    pub fn activate(&mut self, key: ApiKey) {
        self.resolved_token = Some(key.key_value.clone());
        self.active_key = Some(key);
    }
}
