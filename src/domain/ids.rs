//! Human-readable identifiers: `<PREFIX>-<SUFFIX>-<NNNN>`.

use serde::{Deserialize, Serialize};

/// Entities whose primary key is a generated human-readable ID.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum IdKind {
    Deal,
    Order,
    Shipment,
    Invoice,
    Payment,
}

impl IdKind {
    /// Key of the counter row in `id_sequences` (also the table name).
    pub fn entity(&self) -> &'static str {
        match self {
            Self::Deal => "client_deals",
            Self::Order => "deal_orders",
            Self::Shipment => "shipments",
            Self::Invoice => "invoices",
            Self::Payment => "payments",
        }
    }

    pub fn prefix(&self) -> &'static str {
        match self {
            Self::Deal => "DEAL",
            Self::Order => "ORD",
            Self::Shipment => "SHP",
            Self::Invoice => "INV",
            Self::Payment => "PAY",
        }
    }

    pub fn all() -> &'static [Self] {
        &[
            Self::Deal,
            Self::Order,
            Self::Shipment,
            Self::Invoice,
            Self::Payment,
        ]
    }

    pub fn from_entity(entity: &str) -> Option<Self> {
        Self::all().iter().copied().find(|k| k.entity() == entity)
    }
}

/// Minimum counter width; larger values widen instead of rolling over.
pub const COUNTER_WIDTH: usize = 4;

pub fn format_id(prefix: &str, suffix: &str, counter: i64) -> String {
    format!("{}-{}-{:0width$}", prefix, suffix, counter, width = COUNTER_WIDTH)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedId<'a> {
    pub prefix: &'a str,
    pub suffix: &'a str,
    pub counter: i64,
}

/// Split a generated ID into its parts. Returns `None` for caller-supplied
/// keys that don't follow the pattern.
pub fn parse_id(id: &str) -> Option<ParsedId<'_>> {
    let mut parts = id.splitn(3, '-');
    let prefix = parts.next()?;
    let suffix = parts.next()?;
    let digits = parts.next()?;
    if prefix.is_empty()
        || suffix.is_empty()
        || digits.len() < COUNTER_WIDTH
        || !digits.chars().all(|c| c.is_ascii_digit())
    {
        return None;
    }
    Some(ParsedId {
        prefix,
        suffix,
        counter: digits.parse().ok()?,
    })
}
