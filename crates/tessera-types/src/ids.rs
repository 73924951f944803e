//! Type-safe identifier wrappers.
//!
//! The server mints its own identifiers (hex-encoded object ids), so the
//! client treats them as opaque strings. Each kind of id still gets its own
//! newtype so an entity id can never be passed where a game id is expected.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Generates a newtype wrapper around a server-issued string id.
macro_rules! define_id {
    (
        $(#[$meta:meta])*
        $name:ident
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub String);

        impl $name {
            /// Wrap a raw identifier.
            pub fn new(raw: impl Into<String>) -> Self {
                Self(raw.into())
            }

            /// Borrow the raw identifier.
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl core::fmt::Display for $name {
            fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(raw: &str) -> Self {
                Self(raw.to_owned())
            }
        }

        impl From<String> for $name {
            fn from(raw: String) -> Self {
                Self(raw)
            }
        }
    };
}

define_id! {
    /// Unique identifier for a live entity (unit, resource node, structure).
    EntityId
}

define_id! {
    /// Unique identifier for a game. The server reuses the owning channel's id.
    GameId
}

define_id! {
    /// Unique identifier for a channel that can host a game.
    ChannelId
}

/// Durable credential attached to the handshake and to every request.
///
/// Not printed by `Debug` so it never leaks into logs.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ClientToken(String);

impl ClientToken {
    /// Wrap an existing token.
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    /// Mint a fresh random token for a client that has none yet.
    pub fn generate() -> Self {
        Self(Uuid::new_v4().simple().to_string())
    }

    /// Borrow the raw token.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl core::fmt::Debug for ClientToken {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str("ClientToken(..)")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_serialize_as_plain_strings() {
        let id = EntityId::new("65f0c2a1");
        assert_eq!(serde_json::to_string(&id).ok().as_deref(), Some("\"65f0c2a1\""));
        let back: Result<EntityId, _> = serde_json::from_str("\"65f0c2a1\"");
        assert_eq!(back.ok(), Some(id));
    }

    #[test]
    fn id_display_is_raw() {
        assert_eq!(GameId::from("abc").to_string(), "abc");
    }

    #[test]
    fn generated_tokens_are_distinct() {
        let a = ClientToken::generate();
        let b = ClientToken::generate();
        assert_ne!(a, b);
        assert_eq!(a.as_str().len(), 32);
    }

    #[test]
    fn token_debug_is_redacted() {
        let token = ClientToken::new("secret");
        assert!(!format!("{token:?}").contains("secret"));
    }
}
