use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Event ids are opaque but ordered; the checkpoint only ever compares
/// and max-merges them.
pub type EventId = u64;

macro_rules! id_newtype {
    ($name:ident) => {
        #[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub struct $name(pub String);

        impl $name {
            pub fn from_str(s: impl Into<String>) -> Self {
                Self(s.into())
            }
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }
    };
}

id_newtype!(ActorId);
id_newtype!(ItemId);

impl ItemId {
    /// Derive a stable id from the actor key so re-discovering the same
    /// actor maps onto the same queue record.
    pub fn derive(key: &str) -> Self {
        let digest = Sha256::digest(key.as_bytes());
        Self(hex::encode(&digest[..8]))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn derive_is_stable() {
        assert_eq!(ItemId::derive("alice"), ItemId::derive("alice"));
        assert_ne!(ItemId::derive("alice"), ItemId::derive("bob"));
    }

    #[test]
    fn derive_is_filename_safe() {
        let id = ItemId::derive("weird/actor name?");
        assert_eq!(id.as_str().len(), 16);
        assert!(id.as_str().chars().all(|c| c.is_ascii_hexdigit()));
    }
}
