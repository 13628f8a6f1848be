//! In-band stream metadata.
//!
//! [`IcyDiffer`] polls the two ICY text fields a connection exposes and
//! reports a [`Tags`] snapshot only when a packet it has not reported yet
//! shows up.

use tracing::trace;

use crate::backend::IcyFields;

/// Tag under which the stream title is stored.
pub const ICY_TITLE: &str = "icy-title";

const TITLE_MARKER: &str = "StreamTitle='";
const HEADER_SEPARATOR: &str = ": ";

/// String tags with case-insensitive names.
#[derive(Clone, Debug, Default)]
pub struct Tags {
    entries: Vec<(String, String)>,
}

impl Tags {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets `name`, replacing any existing tag that differs only in case.
    pub fn set<K: Into<String>, V: Into<String>>(&mut self, name: K, value: V) {
        let name = name.into();
        let value = value.into();
        match self
            .entries
            .iter_mut()
            .find(|(k, _)| k.eq_ignore_ascii_case(&name))
        {
            Some(entry) => *entry = (name, value),
            None => self.entries.push((name, value)),
        }
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn remove(&mut self, name: &str) -> Option<String> {
        let idx = self
            .entries
            .iter()
            .position(|(k, _)| k.eq_ignore_ascii_case(name))?;
        Some(self.entries.remove(idx).1)
    }

    /// Copies every tag of `other` into `self`, overwriting on conflict.
    pub fn merge(&mut self, other: &Tags) {
        for (k, v) in other.iter() {
            self.set(k, v);
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl PartialEq for Tags {
    fn eq(&self, other: &Self) -> bool {
        self.len() == other.len() && self.iter().all(|(k, v)| other.get(k) == Some(v))
    }
}

impl Eq for Tags {}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for Tags {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut tags = Tags::new();
        for (k, v) in iter {
            tags.set(k, v);
        }
        tags
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
struct Reported {
    packet: String,
    sequence: Option<u64>,
}

/// Change detector for ICY metadata.
///
/// Remembers the last packet it reported. Packets are compared by sequence
/// number when both sides carry one, by value otherwise.
#[derive(Clone, Debug, Default)]
pub struct IcyDiffer {
    last_reported: Option<Reported>,
    generation: u64,
}

impl IcyDiffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a fresh snapshot, or `None` if there is nothing new.
    pub fn poll(&mut self, fields: &IcyFields) -> Option<Tags> {
        if fields.is_empty() {
            return None;
        }

        let packet = fields.packet.as_deref().unwrap_or_default();
        if let Some(last) = &self.last_reported {
            let seen = match (fields.sequence, last.sequence) {
                (Some(current), Some(previous)) => current == previous,
                _ => last.packet == packet,
            };
            if seen {
                return None;
            }
        }

        let tags = parse_icy(fields.headers.as_deref().unwrap_or_default(), packet);
        self.last_reported = Some(Reported {
            packet: packet.to_string(),
            sequence: fields.sequence,
        });
        self.generation += 1;
        trace!(generation = self.generation, tags = tags.len(), "new icy metadata");
        Some(tags)
    }

    /// Number of snapshots reported so far.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Forget the last packet, e.g. after the connection was replaced.
    pub fn reset(&mut self) {
        self.last_reported = None;
    }
}

/// Parses a header block and a metadata packet into tags.
pub fn parse_icy(headers: &str, packet: &str) -> Tags {
    let mut tags = Tags::new();

    for line in headers.lines() {
        let line = line.trim_end_matches(['\r', '\n']);
        if let Some((name, value)) = line.split_once(HEADER_SEPARATOR) {
            tags.set(name, value);
        }
    }

    if let Some(title) = stream_title(packet) {
        tags.set(ICY_TITLE, title);
    }

    tags
}

/// Text between `StreamTitle='` and the next `'`, or the rest of the packet
/// if the quote is never closed.
pub fn stream_title(packet: &str) -> Option<&str> {
    let start = packet.find(TITLE_MARKER)? + TITLE_MARKER.len();
    let rest = &packet[start..];
    Some(rest.find('\'').map_or(rest, |end| &rest[..end]))
}
