use serde::{Deserialize, Serialize};

/// Delta delivered to a publication subscriber.
///
/// `Added`/`Removed` track the record entering or leaving the caller's
/// visible set; `Changed` is a mutation of a record already in it.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SyncEvent<T> {
    Added { record: T },
    Changed { record: T },
    Removed { id: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tagged_serialization() {
        let event: SyncEvent<String> = SyncEvent::Removed { id: "r1".into() };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "removed");
        assert_eq!(json["id"], "r1");

        let event = SyncEvent::Added {
            record: "payload".to_string(),
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "added");
        assert_eq!(json["record"], "payload");
    }
}
