//! Prefixed UUIDv7 identifiers for every addressable entity in a run.
//!
//! Mirrors the `usr_`/`snd_`-style prefixed-id convention: a human-readable
//! prefix followed by a time-ordered UUIDv7, so ids sort roughly by creation
//! order and a log line's id alone tells you what kind of entity it names.

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

fn prefixed_id(prefix: &str) -> String {
    format!("{prefix}_{}", Uuid::now_v7())
}

macro_rules! prefixed_newtype {
    ($name:ident, $prefix:literal, $ctor:ident) => {
        #[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub String);

        impl $name {
            pub fn new() -> Self {
                $name(prefixed_id($prefix))
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<String> for $name {
            fn from(s: String) -> Self {
                $name(s)
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }

        pub fn $ctor() -> $name {
            $name::new()
        }
    };
}

prefixed_newtype!(SatId, "sat", sat_id);
prefixed_newtype!(FlowId, "flw", flow_id);
prefixed_newtype!(RequestId, "req", request_id);
prefixed_newtype!(UserId, "usr", user_id);
prefixed_newtype!(RunId, "run", run_id);

/// Ground stations share the satellite id space (both are graph nodes) but
/// keep a distinct prefix so log lines disambiguate endpoint kind at a glance.
prefixed_newtype!(GroundStationId, "gnd", ground_station_id);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_carry_documented_prefix() {
        assert!(sat_id().0.starts_with("sat_"));
        assert!(flow_id().0.starts_with("flw_"));
        assert!(request_id().0.starts_with("req_"));
        assert!(user_id().0.starts_with("usr_"));
        assert!(run_id().0.starts_with("run_"));
        assert!(ground_station_id().0.starts_with("gnd_"));
    }

    #[test]
    fn ids_are_unique() {
        let a = flow_id();
        let b = flow_id();
        assert_ne!(a, b);
    }

    #[test]
    fn ids_round_trip_through_json() {
        let id = flow_id();
        let json = serde_json::to_string(&id).unwrap();
        let back: FlowId = serde_json::from_str(&json).unwrap();
        assert_eq!(id, back);
    }
}
