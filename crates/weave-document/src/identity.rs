use core::fmt;
use std::sync::LazyLock;

use regex::Regex;

static QUALIFIED_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^(?:(?P<base>.+)/)?(?P<type>[A-Z][A-Za-z0-9_]*)/(?P<id>[^/]+)(?:/_history/(?P<version>[^/]+))?$",
    )
    .expect("invalid qualified identity regex")
});

/// A parsed identity string.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Identity {
    /// `#id`, addressing a contained record. The sigil is not stored.
    Local(String),
    /// `urn:...`, kept whole.
    Urn(String),
    /// `[base/]Type/id[/_history/version]`.
    Qualified {
        base: Option<String>,
        type_name: String,
        id: String,
        version: Option<String>,
    },
    /// A bare id without type.
    Bare(String),
}

impl Identity {
    /// Parse with the default local sigil `#`.
    pub fn parse(s: &str) -> Option<Self> {
        Self::parse_with_sigil(s, '#')
    }

    pub fn parse_with_sigil(s: &str, sigil: char) -> Option<Self> {
        let s = s.trim();
        if s.is_empty() {
            return None;
        }
        if let Some(local) = s.strip_prefix(sigil) {
            return (!local.is_empty()).then(|| Identity::Local(local.to_string()));
        }
        if s.starts_with("urn:") {
            return Some(Identity::Urn(s.to_string()));
        }
        if let Some(caps) = QUALIFIED_PATTERN.captures(s) {
            return Some(Identity::Qualified {
                base: caps.name("base").map(|m| m.as_str().to_string()),
                type_name: caps["type"].to_string(),
                id: caps["id"].to_string(),
                version: caps.name("version").map(|m| m.as_str().to_string()),
            });
        }
        Some(Identity::Bare(s.to_string()))
    }

    pub fn is_local(&self) -> bool {
        matches!(self, Identity::Local(_))
    }

    pub fn is_urn(&self) -> bool {
        matches!(self, Identity::Urn(_))
    }

    /// The id without type, base, version, or sigil. URNs are their own id.
    pub fn id_part(&self) -> &str {
        match self {
            Identity::Local(id) | Identity::Urn(id) | Identity::Bare(id) => id,
            Identity::Qualified { id, .. } => id,
        }
    }

    pub fn type_name(&self) -> Option<&str> {
        match self {
            Identity::Qualified { type_name, .. } => Some(type_name),
            _ => None,
        }
    }

    pub fn version(&self) -> Option<&str> {
        match self {
            Identity::Qualified { version, .. } => version.as_deref(),
            _ => None,
        }
    }

    /// Unqualified, versionless form used as the cross-document index key.
    pub fn canonical(&self) -> String {
        match self {
            Identity::Local(id) => format!("#{id}"),
            Identity::Urn(urn) => urn.clone(),
            Identity::Qualified { type_name, id, .. } => format!("{type_name}/{id}"),
            Identity::Bare(id) => id.clone(),
        }
    }

    /// Canonical form after supplying the type for identities that lack one.
    pub fn canonical_with_type(&self, type_name: &str) -> String {
        match self {
            Identity::Bare(id) => format!("{type_name}/{id}"),
            other => other.canonical(),
        }
    }

    /// `Type/id` or `Type/id/_history/version` for an id part.
    pub fn qualify(type_name: &str, id_part: &str, version: Option<&str>) -> String {
        match version {
            Some(version) if !version.trim().is_empty() => {
                format!("{type_name}/{id_part}/_history/{version}")
            }
            _ => format!("{type_name}/{id_part}"),
        }
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Identity::Local(id) => write!(f, "#{id}"),
            Identity::Urn(urn) => f.write_str(urn),
            Identity::Qualified {
                base,
                type_name,
                id,
                version,
            } => {
                if let Some(base) = base {
                    write!(f, "{base}/")?;
                }
                write!(f, "{type_name}/{id}")?;
                if let Some(version) = version {
                    write!(f, "/_history/{version}")?;
                }
                Ok(())
            }
            Identity::Bare(id) => f.write_str(id),
        }
    }
}
