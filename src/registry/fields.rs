//! Typed view over a server hash's fields. The wire protocol treats every
//! value as a byte string (§6); parsing happens once, here, at the edge —
//! nothing above this module touches raw Redis bulk strings.

use std::collections::HashMap;

/// Everything stored in a server's bucket hash. Optional fields are absent
/// from a freshly-seeded entry until the first heartbeat or slot claim.
#[derive(Debug, Clone, PartialEq)]
pub struct ServerFields {
    pub server_id: String,
    pub current_players: u32,
    pub max_players: u32,
    pub ready: bool,
    pub public_ip: Option<String>,
    pub port: Option<String>,
    pub reserved_player_slots: Option<u32>,
    pub last_reservation_time: Option<f64>,
}

impl ServerFields {
    /// Build the field set for a freshly-seeded (`ready=0`) entry — no
    /// address yet, the server hasn't called in.
    pub fn seed(server_id: String, max_players: u32) -> Self {
        Self {
            server_id,
            current_players: 0,
            max_players,
            ready: false,
            public_ip: None,
            port: None,
            reserved_player_slots: None,
            last_reservation_time: None,
        }
    }

    /// Render as the `HSET`-able field/value pairs this struct's fields
    /// map onto in the registry wire protocol (booleans as `0`/`1`).
    pub fn to_hash_fields(&self) -> Vec<(&'static str, String)> {
        let mut out = vec![
            ("server-id", self.server_id.clone()),
            ("current-players", self.current_players.to_string()),
            ("max-players", self.max_players.to_string()),
            ("ready", if self.ready { "1" } else { "0" }.to_string()),
        ];
        if let Some(ip) = &self.public_ip {
            out.push(("publicIP", ip.clone()));
        }
        if let Some(port) = &self.port {
            out.push(("port", port.clone()));
        }
        if let Some(reserved) = self.reserved_player_slots {
            out.push(("reserved-player-slots", reserved.to_string()));
        }
        if let Some(t) = self.last_reservation_time {
            out.push(("last-reservation-time", format!("{t}")));
        }
        out
    }

    /// Parse a full `HGETALL` response into typed fields. Returns `None` if
    /// the hash is missing required fields (the key doesn't exist, or
    /// expired between the scan and the read).
    pub fn from_hash_map(map: &HashMap<String, String>) -> Option<Self> {
        Some(Self {
            server_id: map.get("server-id")?.clone(),
            current_players: map.get("current-players")?.parse().ok()?,
            max_players: map.get("max-players")?.parse().ok()?,
            ready: map.get("ready").map(|v| v == "1").unwrap_or(false),
            public_ip: map.get("publicIP").cloned(),
            port: map.get("port").cloned(),
            reserved_player_slots: map
                .get("reserved-player-slots")
                .and_then(|v| v.parse().ok()),
            last_reservation_time: map
                .get("last-reservation-time")
                .and_then(|v| v.parse().ok()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn seed_has_no_address_and_is_not_ready() {
        let f = ServerFields::seed("arn-container0".into(), 2);
        assert!(!f.ready);
        assert_eq!(f.public_ip, None);
        assert_eq!(f.current_players, 0);
    }

    #[test]
    fn hash_field_roundtrip() {
        let mut f = ServerFields::seed("arn-container0".into(), 2);
        f.ready = true;
        f.public_ip = Some("1.2.3.4".into());
        f.port = Some("7777".into());
        f.reserved_player_slots = Some(1);
        f.last_reservation_time = Some(12345.5);

        let map: HashMap<String, String> = f
            .to_hash_fields()
            .into_iter()
            .map(|(k, v)| (k.to_string(), v))
            .collect();

        let parsed = ServerFields::from_hash_map(&map).unwrap();
        assert_eq!(parsed, f);
    }

    #[test]
    fn missing_required_field_fails_to_parse() {
        let map: HashMap<String, String> = HashMap::new();
        assert!(ServerFields::from_hash_map(&map).is_none());
    }
}
