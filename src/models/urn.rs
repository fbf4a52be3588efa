//! URN (Uniform Resource Name) parsing and formatting.
//!
//! Every bookmarked item, note, and memory card is addressed by a URN:
//!
//! ```text
//! v2e::{provider}::{resource_type}::{atomic_id}    external catalog items
//! v2e::note::{id}                                  notes
//! v2e::card::{id}                                  memory cards
//! ```
//!
//! Where:
//! - `provider`: `nvd`, `mitre`, `ssg`, `note`, or `card`
//! - `resource_type`: `cve`, `cwe`, `capec`, or `attack`
//! - `atomic_id`: one or more of `[A-Za-z0-9._-]`
//!
//! # Examples
//!
//! ```
//! use v2e_study::models::{Provider, ResourceType, Urn};
//!
//! let urn = Urn::parse("v2e::nvd::cve::CVE-2024-0001").unwrap();
//! assert_eq!(urn.provider(), Provider::Nvd);
//! assert_eq!(urn.resource_type(), Some(ResourceType::Cve));
//! assert_eq!(urn.atomic_id(), "CVE-2024-0001");
//!
//! let note = Urn::for_note(42);
//! assert_eq!(note.to_string(), "v2e::note::42");
//! ```

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

const PREFIX: &str = "v2e";
const SEPARATOR: &str = "::";

/// Authority that issued the identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    /// National Vulnerability Database (CVE).
    Nvd,
    /// MITRE catalogs (CWE, CAPEC, ATT&CK).
    Mitre,
    /// SCAP Security Guide.
    Ssg,
    /// Internal note.
    Note,
    /// Internal memory card.
    Card,
}

impl Provider {
    /// Returns the provider as it appears in a URN.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Nvd => "nvd",
            Self::Mitre => "mitre",
            Self::Ssg => "ssg",
            Self::Note => "note",
            Self::Card => "card",
        }
    }

    /// Parses a provider. Matching is exact (URNs are case-sensitive).
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "nvd" => Some(Self::Nvd),
            "mitre" => Some(Self::Mitre),
            "ssg" => Some(Self::Ssg),
            "note" => Some(Self::Note),
            "card" => Some(Self::Card),
            _ => None,
        }
    }

    /// Returns `true` for providers of internal entities (no resource type).
    #[must_use]
    pub const fn is_internal(&self) -> bool {
        matches!(self, Self::Note | Self::Card)
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// External catalog category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResourceType {
    /// Common Vulnerabilities and Exposures.
    Cve,
    /// Common Weakness Enumeration.
    Cwe,
    /// Common Attack Pattern Enumeration and Classification.
    Capec,
    /// MITRE ATT&CK technique.
    Attack,
}

impl ResourceType {
    /// Returns the lowercase name used in URNs.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Cve => "cve",
            Self::Cwe => "cwe",
            Self::Capec => "capec",
            Self::Attack => "attack",
        }
    }

    /// Parses a URN resource type (exact, lowercase).
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "cve" => Some(Self::Cve),
            "cwe" => Some(Self::Cwe),
            "capec" => Some(Self::Capec),
            "attack" => Some(Self::Attack),
            _ => None,
        }
    }

    /// Parses a catalog type name as used by bookmarks (`CVE`, `cwe`, `ATT&CK`).
    ///
    /// Case-insensitive and whitespace-tolerant, unlike [`parse`](Self::parse).
    #[must_use]
    pub fn from_catalog(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "cve" => Some(Self::Cve),
            "cwe" => Some(Self::Cwe),
            "capec" => Some(Self::Capec),
            "attack" | "att&ck" | "technique" => Some(Self::Attack),
            _ => None,
        }
    }

    /// Default provider for this catalog.
    #[must_use]
    pub const fn default_provider(&self) -> Provider {
        match self {
            Self::Cve => Provider::Nvd,
            Self::Cwe | Self::Capec | Self::Attack => Provider::Mitre,
        }
    }

    /// All catalog types in fan-out order (`cve → cwe → capec → attack`).
    #[must_use]
    pub const fn all() -> [Self; 4] {
        [Self::Cve, Self::Cwe, Self::Capec, Self::Attack]
    }

    /// The catalog this one links to in the default fan-out, if any.
    #[must_use]
    pub const fn downstream(&self) -> Option<Self> {
        match self {
            Self::Cve => Some(Self::Cwe),
            Self::Cwe => Some(Self::Capec),
            Self::Capec => Some(Self::Attack),
            Self::Attack => None,
        }
    }
}

impl fmt::Display for ResourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A parsed `v2e::` URN.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Urn {
    provider: Provider,
    resource_type: Option<ResourceType>,
    atomic_id: String,
}

impl Urn {
    /// Parses a URN string.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Parse`] if the string violates the URN grammar.
    pub fn parse(s: &str) -> Result<Self> {
        let parts: Vec<&str> = s.split(SEPARATOR).collect();

        if parts.first() != Some(&PREFIX) {
            return Err(Error::Parse(format!("URN must start with 'v2e::': {s}")));
        }

        let provider = parts
            .get(1)
            .and_then(|p| Provider::parse(p))
            .ok_or_else(|| Error::Parse(format!("URN has an unknown provider: {s}")))?;

        if provider.is_internal() {
            let [_, _, id] = parts.as_slice() else {
                return Err(Error::Parse(format!(
                    "internal URN must be 'v2e::{provider}::<id>': {s}"
                )));
            };
            if id.is_empty() || !id.bytes().all(|b| b.is_ascii_digit()) {
                return Err(Error::Parse(format!(
                    "internal URN id must be decimal: {s}"
                )));
            }
            return Ok(Self {
                provider,
                resource_type: None,
                atomic_id: (*id).to_string(),
            });
        }

        let [_, _, rtype, atom] = parts.as_slice() else {
            return Err(Error::Parse(format!(
                "URN must have 4 components (v2e::provider::type::id): {s}"
            )));
        };
        let resource_type = ResourceType::parse(rtype)
            .ok_or_else(|| Error::Parse(format!("URN has an unknown resource type: {s}")))?;
        if !is_valid_atom(atom) {
            return Err(Error::Parse(format!(
                "URN id must match [A-Za-z0-9._-]+: {s}"
            )));
        }

        Ok(Self {
            provider,
            resource_type: Some(resource_type),
            atomic_id: (*atom).to_string(),
        })
    }

    /// Tries to parse a string as a URN, returning `None` if it is not one.
    #[must_use]
    pub fn try_parse(s: &str) -> Option<Self> {
        Self::parse(s).ok()
    }

    /// Builds the URN of an external catalog item.
    ///
    /// The provider is derived from the type: CVE maps to `nvd` and the MITRE
    /// catalogs to `mitre`. A `source` naming an external provider
    /// (e.g. `"ssg"`) overrides that default.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInput`] for an unknown catalog type or an
    /// id outside `[A-Za-z0-9._-]+`.
    pub fn for_item(item_type: &str, item_id: &str, source: Option<&str>) -> Result<Self> {
        let resource_type = ResourceType::from_catalog(item_type)
            .ok_or_else(|| Error::InvalidInput(format!("unknown item type: {item_type}")))?;
        if !is_valid_atom(item_id) {
            return Err(Error::InvalidInput(format!("invalid item id: {item_id:?}")));
        }

        let provider = source
            .and_then(|s| Provider::parse(&s.trim().to_lowercase()))
            .filter(|p| !p.is_internal())
            .unwrap_or_else(|| resource_type.default_provider());

        Ok(Self {
            provider,
            resource_type: Some(resource_type),
            atomic_id: item_id.to_string(),
        })
    }

    /// Builds the URN of a note (`v2e::note::<id>`).
    #[must_use]
    pub fn for_note(id: i64) -> Self {
        Self {
            provider: Provider::Note,
            resource_type: None,
            atomic_id: id.to_string(),
        }
    }

    /// Builds the URN of a memory card (`v2e::card::<id>`).
    #[must_use]
    pub fn for_card(id: i64) -> Self {
        Self {
            provider: Provider::Card,
            resource_type: None,
            atomic_id: id.to_string(),
        }
    }

    /// Returns the provider.
    #[must_use]
    pub const fn provider(&self) -> Provider {
        self.provider
    }

    /// Returns the resource type; `None` for notes and cards.
    #[must_use]
    pub const fn resource_type(&self) -> Option<ResourceType> {
        self.resource_type
    }

    /// Returns the atomic id.
    #[must_use]
    pub fn atomic_id(&self) -> &str {
        &self.atomic_id
    }

    /// Returns the numeric id of a note or card URN.
    #[must_use]
    pub fn internal_id(&self) -> Option<i64> {
        if self.provider.is_internal() {
            self.atomic_id.parse().ok()
        } else {
            None
        }
    }
}

fn is_valid_atom(s: &str) -> bool {
    !s.is_empty()
        && s
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || matches!(b, b'.' | b'_' | b'-'))
}

impl fmt::Display for Urn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.resource_type {
            Some(rtype) => write!(
                f,
                "{PREFIX}{SEPARATOR}{}{SEPARATOR}{rtype}{SEPARATOR}{}",
                self.provider, self.atomic_id
            ),
            None => write!(
                f,
                "{PREFIX}{SEPARATOR}{}{SEPARATOR}{}",
                self.provider, self.atomic_id
            ),
        }
    }
}

impl FromStr for Urn {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}
