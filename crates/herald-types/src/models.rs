use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Lifecycle state shared by servers and connections.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    Active,
    Inactive,
}

impl Status {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Inactive => "inactive",
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid status type '{0}'")]
pub struct UnknownStatus(pub String);

impl FromStr for Status {
    type Err = UnknownStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "active" => Ok(Self::Active),
            "inactive" => Ok(Self::Inactive),
            other => Err(UnknownStatus(other.to_string())),
        }
    }
}

/// The two server collections a connection pairs together.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ServerKind {
    Webview,
    UserDelivery,
}

impl ServerKind {
    /// Human-readable name used in messages and logs.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Webview => "webview server",
            Self::UserDelivery => "user delivery server",
        }
    }

    /// The other side of a connection.
    pub fn peer(&self) -> Self {
        match self {
            Self::Webview => Self::UserDelivery,
            Self::UserDelivery => Self::Webview,
        }
    }
}

impl fmt::Display for ServerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// A webview server or a user-delivery server. Both collections share
/// this shape; `ServerKind` tells them apart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Server {
    #[serde(rename = "_id")]
    pub id: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub name: String,
    pub status: Status,
}

/// Pairing of one webview server with one user-delivery server.
/// The API keys are minted once at creation and never rotated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Connection {
    #[serde(rename = "_id")]
    pub id: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub status: Status,
    pub webview_server_api_key: String,
    pub user_delivery_server_api_key: String,
    pub webview_server_id: String,
    pub user_delivery_server_id: String,
    pub user_delivery_server_web_hook_url: String,
}

impl Connection {
    /// Id of the referenced server of the given kind.
    pub fn server_id(&self, kind: ServerKind) -> &str {
        match kind {
            ServerKind::Webview => &self.webview_server_id,
            ServerKind::UserDelivery => &self.user_delivery_server_id,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_parses_only_known_values() {
        assert_eq!("active".parse::<Status>(), Ok(Status::Active));
        assert_eq!("inactive".parse::<Status>(), Ok(Status::Inactive));
        assert!("Active".parse::<Status>().is_err());
        assert!("".parse::<Status>().is_err());
    }

    #[test]
    fn connection_serializes_with_wire_names() {
        let now = Utc::now();
        let conn = Connection {
            id: "c1".into(),
            created_at: now,
            updated_at: now,
            status: Status::Inactive,
            webview_server_api_key: "wk".into(),
            user_delivery_server_api_key: "uk".into(),
            webview_server_id: "w1".into(),
            user_delivery_server_id: "u1".into(),
            user_delivery_server_web_hook_url: "https://hook".into(),
        };
        let json = serde_json::to_value(&conn).unwrap();
        assert_eq!(json["_id"], "c1");
        assert_eq!(json["status"], "inactive");
        assert_eq!(json["webviewServerApiKey"], "wk");
        assert_eq!(json["userDeliveryServerWebHookUrl"], "https://hook");
        assert_eq!(conn.server_id(ServerKind::UserDelivery), "u1");
    }

    #[test]
    fn peer_is_the_other_side() {
        assert_eq!(ServerKind::Webview.peer(), ServerKind::UserDelivery);
        assert_eq!(ServerKind::UserDelivery.peer(), ServerKind::Webview);
    }
}
