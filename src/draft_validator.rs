use sha2::{Digest, Sha256};

/// Integrity envelope for form drafts kept in local storage.
///
/// Storage is shared with every other tab and component, so a draft may be
/// truncated or hand-edited. The envelope stores a SHA-256 checksum of the
/// serialized form; a mismatch on load means the draft is dropped and the
/// form starts clean instead of hydrating garbage.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct ValidatedDraft {
    /// Serialized form (JSON string).
    pub data: String,
    /// SHA-256 checksum of `data` (hex encoded).
    pub checksum: String,
}

impl ValidatedDraft {
    pub fn new(data: String) -> Self {
        let checksum = Self::compute_checksum(&data);
        Self { data, checksum }
    }

    fn compute_checksum(data: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(data.as_bytes());
        hex::encode(hasher.finalize())
    }

    /// Returns true if the checksum matches.
    pub fn is_valid(&self) -> bool {
        Self::compute_checksum(&self.data) == self.checksum
    }

    pub fn serialize(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Returns the inner data if the envelope parses and its checksum matches.
    pub fn deserialize_and_validate(serialized: &str) -> Option<String> {
        let entry: ValidatedDraft = match serde_json::from_str(serialized) {
            Ok(entry) => entry,
            Err(e) => {
                tracing::warn!("Discarding unreadable draft envelope: {}", e);
                return None;
            }
        };

        if entry.is_valid() {
            Some(entry.data)
        } else {
            tracing::warn!(
                "Draft validation failed: checksum mismatch. Expected: {}, Data length: {}",
                entry.checksum,
                entry.data.len()
            );
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_draft_round_trip() {
        let data = r#"{"nome":"Maria"}"#.to_string();
        let serialized = ValidatedDraft::new(data.clone()).serialize().unwrap();
        assert_eq!(
            ValidatedDraft::deserialize_and_validate(&serialized),
            Some(data)
        );
    }

    #[test]
    fn test_tampered_draft_rejected() {
        let serialized = ValidatedDraft::new(r#"{"nome":"Maria"}"#.to_string())
            .serialize()
            .unwrap();
        let tampered = serialized.replace("Maria", "Mallory");
        assert_eq!(ValidatedDraft::deserialize_and_validate(&tampered), None);
    }

    #[test]
    fn test_garbage_rejected() {
        assert_eq!(ValidatedDraft::deserialize_and_validate("{not json"), None);
    }
}
