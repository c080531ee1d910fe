//! Field resolution table for overwritable device fields.
//!
//! For each field, candidate values are ranked by specificity first, then by
//! the field's source priority list, then by length, then by recency.
//! Placeholder values ("unknown", IP literals posing as hostnames) never win
//! because they are not candidates at all.

use std::cmp::Reverse;
use std::collections::HashMap;
use std::net::{IpAddr, Ipv4Addr};

use lanwatch_core::{Observation, Source};

/// An overwritable field of a fused device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Field {
    Ip,
    Hostname,
    Vendor,
    OsGuess,
}

impl Field {
    fn value<'a>(&self, obs: &'a Observation) -> Option<&'a str> {
        match self {
            Field::Ip => obs.ip.as_deref(),
            Field::Hostname => obs.hostname.as_deref(),
            Field::Vendor => obs.vendor.as_deref(),
            Field::OsGuess => obs.os_guess.as_deref(),
        }
    }
}

/// How informative a value is for its field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Specificity {
    Placeholder,
    Generic,
    Specific,
}

const PLACEHOLDERS: &[&str] = &[
    "unknown",
    "(unknown)",
    "unknown vendor",
    "n/a",
    "none",
    "private",
    "localhost",
    "-",
    "?",
];

impl Specificity {
    pub fn of(field: Field, value: &str) -> Self {
        let value = value.trim();
        if value.is_empty() || PLACEHOLDERS.contains(&value.to_ascii_lowercase().as_str()) {
            return Specificity::Placeholder;
        }

        match field {
            Field::Ip => match value.parse::<IpAddr>() {
                Ok(_) => Specificity::Specific,
                Err(_) => Specificity::Placeholder,
            },
            Field::Hostname => {
                let dotted = value.replace('-', ".");
                if value.parse::<IpAddr>().is_ok() || dotted.parse::<Ipv4Addr>().is_ok() {
                    Specificity::Placeholder
                } else {
                    Specificity::Specific
                }
            }
            Field::Vendor => Specificity::Specific,
            // "Linux" says less than "Linux 5.15".
            Field::OsGuess => {
                if value.chars().any(|c| c.is_ascii_digit()) {
                    Specificity::Specific
                } else {
                    Specificity::Generic
                }
            }
        }
    }
}

/// Per-field ordered source priorities.
#[derive(Debug, Clone)]
pub struct FieldResolution {
    priorities: HashMap<Field, Vec<Source>>,
}

impl Default for FieldResolution {
    /// Direct probes outrank passive caches, which outrank name resolvers.
    fn default() -> Self {
        let general = vec![
            Source::Nmap,
            Source::Ping,
            Source::Arp,
            Source::Dhcp,
            Source::Mdns,
            Source::Netbios,
            Source::Vpn,
        ];
        let mut priorities = HashMap::new();
        priorities.insert(
            Field::Ip,
            vec![
                Source::Nmap,
                Source::Ping,
                Source::Arp,
                Source::Dhcp,
                Source::Mdns,
                Source::Netbios,
            ],
        );
        priorities.insert(Field::Hostname, general.clone());
        priorities.insert(Field::Vendor, general.clone());
        priorities.insert(Field::OsGuess, general);
        Self { priorities }
    }
}

impl FieldResolution {
    /// Replace the priority order for one field.
    pub fn with_priority(mut self, field: Field, order: Vec<Source>) -> Self {
        self.priorities.insert(field, order);
        self
    }

    /// Position of `source` in the field's order; unlisted sources rank last.
    pub fn rank(&self, field: Field, source: Source) -> usize {
        self.priorities
            .get(&field)
            .and_then(|order| order.iter().position(|s| *s == source))
            .unwrap_or(usize::MAX)
    }

    /// Pick the winning value for `field` among `observations`.
    pub fn resolve<'a>(
        &self,
        field: Field,
        observations: impl IntoIterator<Item = &'a Observation>,
    ) -> Option<(String, Source)> {
        observations
            .into_iter()
            .filter_map(|obs| {
                let value = field.value(obs)?.trim();
                let specificity = Specificity::of(field, value);
                (specificity > Specificity::Placeholder).then_some((obs, value, specificity))
            })
            .max_by_key(|(obs, value, specificity)| {
                (
                    *specificity,
                    Reverse(self.rank(field, obs.source)),
                    value.len(),
                    obs.timestamp,
                )
            })
            .map(|(obs, value, _)| (value.to_string(), obs.source))
    }
}
