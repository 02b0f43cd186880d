//! Well-known group names, sentinel tokens and probe targets.
//!
//! Clash matches group references by exact string equality, emoji included,
//! so every reserved name lives here and nowhere else.

use std::fmt;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Key of the node list in a Clash profile.
pub const PROXIES_KEY: &str = "proxies";

/// Key of the group list in a Clash profile.
pub const PROXY_GROUPS_KEY: &str = "proxy-groups";

/// Key of the traffic-capture (TUN) block.
pub const TUN_KEY: &str = "tun";

/// Key of the runtime log level.
pub const LOG_LEVEL_KEY: &str = "log-level";

/// Most verbose Clash log level; always forced onto the profile.
pub const FORCED_LOG_LEVEL: &str = "debug";

/// Load-balance group health-check interval, seconds.
pub const LOAD_BALANCE_INTERVAL_SECS: u64 = 300;

/// Failover group health-check interval, seconds.
pub const FAILOVER_INTERVAL_SECS: u64 = 60;

/// Health-check timeout shared by both synthetic groups, milliseconds.
pub const PROBE_TIMEOUT_MS: u64 = 8000;

/// Load-balance strategy written onto the synthetic group.
pub const LOAD_BALANCE_STRATEGY: &str = "round-robin";

/// Declared reachability-test targets. Only the first is ever selected; the
/// rest are kept so profiles written by older tooling stay recognisable.
pub const PROBE_TARGETS: [&str; 4] = [
    "http://www.gstatic.cn/generate_204",
    "http://captive.apple.com",
    "tcp://9.9.9.9:53",
    "tcp://208.67.222.222:443",
];

/// Probe target written into the synthetic groups' `url` field.
pub fn selected_probe_target() -> &'static str {
    PROBE_TARGETS[0]
}

/// Transport a probe target is reached over.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProbeScheme {
    Http,
    Tcp,
    Unknown,
}

impl ProbeScheme {
    pub fn of(target: &str) -> Self {
        if target.starts_with("http://") || target.starts_with("https://") {
            Self::Http
        } else if target.starts_with("tcp://") {
            Self::Tcp
        } else {
            Self::Unknown
        }
    }
}

impl fmt::Display for ProbeScheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(match self {
            Self::Http => "http",
            Self::Tcp => "tcp",
            Self::Unknown => "unknown",
        })
    }
}

/// Groups whose names carry meaning to the reconciler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GroupRole {
    /// Synthetic round-robin group over every node.
    LoadBalance,
    /// Synthetic fallback group: load-balance first, then each node, then DIRECT.
    Failover,
    /// User-facing top-level selector.
    PrimarySelect,
    /// Alternate user-facing top-level selector used by some rule sets.
    NodeSelect,
}

impl GroupRole {
    pub const ALL: [GroupRole; 4] = [
        Self::LoadBalance,
        Self::Failover,
        Self::PrimarySelect,
        Self::NodeSelect,
    ];

    /// Exact group name as it appears in the profile.
    pub fn name(self) -> &'static str {
        match self {
            Self::LoadBalance => "♻️ 负载均衡",
            Self::Failover => "♻️ 故障切换",
            Self::PrimarySelect => "🔰 选择节点",
            Self::NodeSelect => "🚀 节点选择",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|role| role.name() == name)
    }

    /// Created and maintained by the reconciler itself.
    pub fn is_synthetic(self) -> bool {
        matches!(self, Self::LoadBalance | Self::Failover)
    }

    pub fn is_primary_selector(self) -> bool {
        matches!(self, Self::PrimarySelect | Self::NodeSelect)
    }
}

impl fmt::Display for GroupRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Literal routing instructions that are neither nodes nor groups.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Sentinel {
    Direct,
    Reject,
}

impl Sentinel {
    pub fn token(self) -> &'static str {
        match self {
            Self::Direct => "DIRECT",
            Self::Reject => "REJECT",
        }
    }

    pub fn is_sentinel(reference: &str) -> bool {
        reference == Self::Direct.token() || reference == Self::Reject.token()
    }
}

impl fmt::Display for Sentinel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.token())
    }
}

/// Proxy group `type` as Clash spells it.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum GroupKind {
    Select,
    LoadBalance,
    Fallback,
    UrlTest,
    Relay,
    Other(String),
}

impl GroupKind {
    pub fn parse(raw: &str) -> Self {
        match raw {
            "select" => Self::Select,
            "load-balance" => Self::LoadBalance,
            "fallback" => Self::Fallback,
            "url-test" => Self::UrlTest,
            "relay" => Self::Relay,
            other => Self::Other(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::Select => "select",
            Self::LoadBalance => "load-balance",
            Self::Fallback => "fallback",
            Self::UrlTest => "url-test",
            Self::Relay => "relay",
            Self::Other(s) => s,
        }
    }
}

impl fmt::Display for GroupKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for GroupKind {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for GroupKind {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Ok(Self::parse(&raw))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn selected_probe_target_is_first() {
        assert_eq!(selected_probe_target(), "http://www.gstatic.cn/generate_204");
    }

    #[test]
    fn probe_targets_two_http_two_tcp() {
        let http = PROBE_TARGETS
            .iter()
            .filter(|t| ProbeScheme::of(t) == ProbeScheme::Http)
            .count();
        let tcp = PROBE_TARGETS
            .iter()
            .filter(|t| ProbeScheme::of(t) == ProbeScheme::Tcp)
            .count();
        assert_eq!((http, tcp), (2, 2));
    }

    #[test]
    fn group_role_names_roundtrip() {
        for role in GroupRole::ALL {
            assert_eq!(GroupRole::from_name(role.name()), Some(role));
        }
        assert_eq!(GroupRole::from_name("负载均衡"), None);
        assert_eq!(GroupRole::from_name(""), None);
    }

    #[test]
    fn group_role_classification() {
        assert!(GroupRole::LoadBalance.is_synthetic());
        assert!(GroupRole::Failover.is_synthetic());
        assert!(!GroupRole::PrimarySelect.is_synthetic());
        assert!(GroupRole::PrimarySelect.is_primary_selector());
        assert!(GroupRole::NodeSelect.is_primary_selector());
        assert!(!GroupRole::Failover.is_primary_selector());
    }

    #[test]
    fn sentinel_tokens() {
        assert!(Sentinel::is_sentinel("DIRECT"));
        assert!(Sentinel::is_sentinel("REJECT"));
        assert!(!Sentinel::is_sentinel("direct"));
        assert_eq!(Sentinel::Reject.to_string(), "REJECT");
    }

    #[test]
    fn group_kind_parse_and_display() {
        assert_eq!(GroupKind::parse("load-balance"), GroupKind::LoadBalance);
        assert_eq!(GroupKind::parse("fallback"), GroupKind::Fallback);
        assert_eq!(GroupKind::parse("select"), GroupKind::Select);
        assert_eq!(
            GroupKind::parse("smart"),
            GroupKind::Other("smart".to_string())
        );
        assert_eq!(GroupKind::UrlTest.to_string(), "url-test");
        assert_eq!(GroupKind::Other("smart".into()).to_string(), "smart");
    }

    #[test]
    fn group_kind_serde_uses_clash_spelling() {
        let json = serde_json::to_string(&GroupKind::LoadBalance).unwrap();
        assert_eq!(json, "\"load-balance\"");
        let parsed: GroupKind = serde_json::from_str("\"relay\"").unwrap();
        assert_eq!(parsed, GroupKind::Relay);
    }
}
