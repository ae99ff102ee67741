//! Resource change notifications.
//!
//! Services publish an event after a mutation has committed. The
//! transport that carries events to external watchers lives outside
//! this crate.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ResourceEvent {
    GroupDeleted { group_id: Uuid },
    TopicUpdated { topic_id: Uuid },
    TopicDeleted { topic_id: Uuid },
    /// Also published when a grant of the application changes.
    ApplicationUpdated { application_id: Uuid },
    ApplicationDeleted { application_id: Uuid },
}

pub trait EventSink: Send + Sync {
    fn publish(&self, event: ResourceEvent);
}

impl<T: EventSink + ?Sized> EventSink for Arc<T> {
    fn publish(&self, event: ResourceEvent) {
        (**self).publish(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn events_are_tagged() {
        let id = Uuid::nil();
        let json = serde_json::to_value(ResourceEvent::TopicDeleted { topic_id: id }).unwrap();
        assert_eq!(json["type"], "TOPIC_DELETED");
        assert_eq!(json["topic_id"], id.to_string());
    }
}
