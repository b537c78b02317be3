//! Resource change notifications.

use crate::core::paths;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Kind of change applied to a resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Kind {
    /// The resource was created.
    EntryCreate,
    /// The resource content changed.
    EntryModify,
    /// The resource was removed.
    EntryDelete,
}

impl fmt::Display for Kind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Kind::EntryCreate => "ENTRY_CREATE",
            Kind::EntryModify => "ENTRY_MODIFY",
            Kind::EntryDelete => "ENTRY_DELETE",
        };
        f.write_str(name)
    }
}

/// A single affected entry inside a notification.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Event {
    /// Normalized path of the affected entry.
    pub path: String,
    /// What happened to it.
    pub kind: Kind,
}

impl Event {
    /// Create an event for `path`.
    pub fn new(path: impl AsRef<str>, kind: Kind) -> Self {
        Self {
            path: paths::normalize(path.as_ref()),
            kind,
        }
    }
}

/// Immutable record of a change to a named configuration resource.
///
/// Notifications are created by whatever mutated the resource, stamped with
/// an origin node and sequence number when they are broadcast, and serialized
/// onto the cluster topic.
///
/// # Examples
///
/// ```rust
/// use cluster_notify::core::{Kind, ResourceNotification};
///
/// let n = ResourceNotification::new("styles/foo.sld", Kind::EntryModify);
/// assert_eq!(n.path(), "styles/foo.sld");
/// assert_eq!(n.events().len(), 1);
/// assert!(n.origin().is_none());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceNotification {
    path: String,
    kind: Kind,
    timestamp: DateTime<Utc>,
    events: Vec<Event>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    origin: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    incarnation: Option<String>,
    #[serde(default)]
    sequence: u64,
}

impl ResourceNotification {
    /// Create a notification for a single resource.
    pub fn new(path: impl AsRef<str>, kind: Kind) -> Self {
        Self::with_events(path, kind, Vec::new())
    }

    /// Create a notification listing the affected entries.
    ///
    /// An empty `events` list is replaced by a single event for `path`.
    pub fn with_events(path: impl AsRef<str>, kind: Kind, events: Vec<Event>) -> Self {
        let path = paths::normalize(path.as_ref());
        let events = if events.is_empty() {
            vec![Event {
                path: path.clone(),
                kind,
            }]
        } else {
            events
        };
        Self {
            path,
            kind,
            timestamp: Utc::now(),
            events,
            origin: None,
            incarnation: None,
            sequence: 0,
        }
    }

    /// Return a copy stamped with the broadcasting node and its sequence.
    ///
    /// `incarnation` identifies the running dispatcher, so a node restarted
    /// under the same id never reuses an `(origin, incarnation, sequence)`
    /// triple. A notification that already carries an origin keeps its stamp.
    pub fn stamped(&self, origin: &str, incarnation: &str, sequence: u64) -> Self {
        let mut out = self.clone();
        if out.origin.is_none() {
            out.origin = Some(origin.to_string());
            out.incarnation = Some(incarnation.to_string());
            out.sequence = sequence;
        }
        out
    }

    /// Normalize the path of the notification and of every event.
    ///
    /// Applied to notifications received from peers, which may not follow
    /// this crate's path conventions.
    pub(crate) fn normalized(mut self) -> Self {
        self.path = paths::normalize(&self.path);
        for event in &mut self.events {
            event.path = paths::normalize(&event.path);
        }
        self
    }

    /// Build a related notification for another path.
    ///
    /// Timestamp, events, origin and sequence are carried over.
    pub fn derive(&self, path: &str, kind: Kind) -> Self {
        Self {
            path: path.to_string(),
            kind,
            timestamp: self.timestamp,
            events: self.events.clone(),
            origin: self.origin.clone(),
            incarnation: self.incarnation.clone(),
            sequence: self.sequence,
        }
    }

    /// Normalized path of the changed resource.
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Kind of change.
    pub fn kind(&self) -> Kind {
        self.kind
    }

    /// When the change was observed.
    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    /// Affected entries.
    pub fn events(&self) -> &[Event] {
        &self.events
    }

    /// Node that broadcast this notification, if it went through a dispatcher.
    pub fn origin(&self) -> Option<&str> {
        self.origin.as_deref()
    }

    /// Dispatcher run that broadcast this notification.
    pub fn incarnation(&self) -> Option<&str> {
        self.incarnation.as_deref()
    }

    /// Per-incarnation sequence number, 0 when unstamped.
    pub fn sequence(&self) -> u64 {
        self.sequence
    }
}

impl fmt::Display for ResourceNotification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.kind, self.path)?;
        if let Some(origin) = &self.origin {
            write!(f, " ({}#{})", origin, self.sequence)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_event_matches_path() {
        let n = ResourceNotification::new("/styles/foo.sld", Kind::EntryCreate);
        assert_eq!(n.path(), "styles/foo.sld");
        assert_eq!(n.events(), &[Event::new("styles/foo.sld", Kind::EntryCreate)]);
        assert_eq!(n.sequence(), 0);
    }

    #[test]
    fn test_stamp_is_applied_once() {
        let n = ResourceNotification::new("styles/foo.sld", Kind::EntryModify);
        let first = n.stamped("node-a", "run-1", 7);
        let second = first.stamped("node-b", "run-2", 9);

        assert_eq!(first.origin(), Some("node-a"));
        assert_eq!(first.incarnation(), Some("run-1"));
        assert_eq!(first.sequence(), 7);
        assert_eq!(second, first);
    }

    #[test]
    fn test_derive_keeps_identity() {
        let n = ResourceNotification::new("styles/foo.sld", Kind::EntryDelete).stamped("a", "run-1", 3);
        let parent = n.derive("styles", Kind::EntryModify);

        assert_eq!(parent.path(), "styles");
        assert_eq!(parent.kind(), Kind::EntryModify);
        assert_eq!(parent.timestamp(), n.timestamp());
        assert_eq!(parent.events(), n.events());
        assert_eq!(parent.origin(), Some("a"));
        assert_eq!(parent.incarnation(), Some("run-1"));
        assert_eq!(parent.sequence(), 3);
    }

    #[test]
    fn test_kind_wire_names() {
        let json = serde_json::to_string(&Kind::EntryModify).unwrap();
        assert_eq!(json, "\"ENTRY_MODIFY\"");
        assert_eq!(Kind::EntryDelete.to_string(), "ENTRY_DELETE");
    }

    #[test]
    fn test_normalized_cleans_every_path() {
        let n = ResourceNotification::with_events(
            "styles",
            Kind::EntryModify,
            vec![Event::new("styles/a.sld", Kind::EntryCreate)],
        );
        let mut raw = n.clone();
        raw.path = "/styles/".to_string();
        raw.events[0].path = "styles//a.sld".to_string();

        assert_eq!(raw.normalized(), n);
    }

    #[test]
    fn test_display() {
        let n = ResourceNotification::new("a/b", Kind::EntryCreate).stamped("n1", "run-1", 2);
        assert_eq!(n.to_string(), "ENTRY_CREATE a/b (n1#2)");
    }
}
