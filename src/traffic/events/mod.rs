use std::fmt::{Display, Formatter};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::traffic::network::EdgeKey;

pub mod avl;

/// Kind of traffic disruption. The persistence tokens are the lowercase
/// variant names.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum EventType {
    Accident,
    Roadwork,
    Congestion,
}

impl Display for EventType {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let token = match self {
            EventType::Accident => "accident",
            EventType::Roadwork => "roadwork",
            EventType::Congestion => "congestion",
        };
        write!(f, "{token}")
    }
}

impl FromStr for EventType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "accident" => Ok(EventType::Accident),
            "roadwork" => Ok(EventType::Roadwork),
            "congestion" => Ok(EventType::Congestion),
            other => Err(format!("unknown event type '{other}'")),
        }
    }
}

/// Ordering key of the event index. The derived `Ord` compares by timestamp
/// first and event id second, which is the canonical tie-break for events
/// sharing a timestamp.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct EventKey {
    pub timestamp: i64,
    pub id: u64,
}

/// A timestamped disruption tied to exactly one edge. The edge reference is a
/// plain key, never an owning link into the network.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub id: u64,
    pub timestamp: i64,
    pub event_type: EventType,
    pub edge: EdgeKey,
    /// Signed impact added to the edge's current weight while the event is
    /// active. Typically positive.
    pub delta: f64,
}

impl Event {
    pub fn key(&self) -> EventKey {
        EventKey {
            timestamp: self.timestamp,
            id: self.id,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn event_type_round_trips_through_tokens() {
        for event_type in [EventType::Accident, EventType::Roadwork, EventType::Congestion] {
            let token = event_type.to_string();
            assert_eq!(token.parse::<EventType>().unwrap(), event_type);
        }
        assert!("pothole".parse::<EventType>().is_err());
    }

    #[test]
    fn key_orders_by_timestamp_then_id() {
        let earlier = EventKey { timestamp: 5, id: 9 };
        let later = EventKey { timestamp: 6, id: 1 };
        assert!(earlier < later);

        let first = EventKey { timestamp: 5, id: 1 };
        let second = EventKey { timestamp: 5, id: 2 };
        assert!(first < second);
    }
}
