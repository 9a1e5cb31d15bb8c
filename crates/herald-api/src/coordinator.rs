//! Cross-collection consistency for servers and the connections that pair
//! them.
//!
//! Every mutation runs in a single store transaction. Status changes and
//! deletes on a server cascade to its connections inside that transaction:
//!
//! - a connection is active only while both of its servers are active;
//! - deleting a server deletes every connection that references it;
//! - at most one connection exists per (user delivery, webview) pair.
//!
//! Store failures during a cascade surface as `TransactionFailed` (or
//! `Timeout`) and leave every record as it was before the call. Nothing is
//! retried here.

use std::sync::Arc;

use herald_db::{
    ConnectionFilter, ConnectionStore, Database, ServerFilter, ServerStore, StoreError,
    Transaction, new_id, now, validate_id,
};
use herald_types::api::{Deletion, ListPage, StatusChange};
use herald_types::{Connection, Server, ServerKind, Status};
use tracing::{debug, info, warn};

use crate::error::ServiceError;

/// Owns every collection a cascade can touch. There is no way to build one
/// without all three stores.
pub struct Coordinator {
    db: Arc<Database>,
    webviews: ServerStore,
    deliveries: ServerStore,
    connections: ConnectionStore,
}

impl Coordinator {
    pub fn new(db: Arc<Database>) -> Self {
        Self {
            db,
            webviews: ServerStore::new(ServerKind::Webview),
            deliveries: ServerStore::new(ServerKind::UserDelivery),
            connections: ConnectionStore,
        }
    }

    pub fn database(&self) -> &Database {
        &self.db
    }

    fn servers(&self, kind: ServerKind) -> &ServerStore {
        match kind {
            ServerKind::Webview => &self.webviews,
            ServerKind::UserDelivery => &self.deliveries,
        }
    }

    /// Runs `f` atomically. Storage errors raised inside are reported as
    /// an aborted transaction; domain errors pass through untouched.
    fn cascade<T>(
        &self,
        f: impl FnOnce(&Transaction<'_>) -> Result<T, ServiceError>,
    ) -> Result<T, ServiceError> {
        self.db.transaction(f).map_err(|e| match e {
            ServiceError::Store(err) => {
                warn!("Transaction aborted: {}", err);
                ServiceError::TransactionFailed(err)
            }
            other => other,
        })
    }

    // -- Servers --

    pub fn get_server(&self, kind: ServerKind, id: &str) -> Result<Server, ServiceError> {
        validate_id(id)?;
        self.db
            .with_conn(|conn| self.servers(kind).get_by_id(conn, id).map_err(ServiceError::from))?
            .ok_or_else(|| ServiceError::not_found(kind.label(), id))
    }

    pub fn list_servers(
        &self,
        kind: ServerKind,
        filter: &ServerFilter,
    ) -> Result<ListPage<Server>, ServiceError> {
        self.db
            .with_conn(|conn| self.servers(kind).list(conn, filter).map_err(ServiceError::from))
    }

    /// New servers start inactive.
    pub fn create_server(&self, kind: ServerKind, name: &str) -> Result<Server, ServiceError> {
        let store = self.servers(kind);
        let ts = now();
        let server = Server {
            id: new_id(),
            created_at: ts,
            updated_at: ts,
            name: name.to_string(),
            status: Status::Inactive,
        };

        self.db.transaction::<_, _, ServiceError>(|tx| {
            if store.exists_by_name(tx, name)? {
                return Err(ServiceError::duplicate_name(kind, name));
            }
            store.create(tx, &server).map_err(|e| match e {
                StoreError::DuplicateKey(_) => ServiceError::duplicate_name(kind, name),
                other => other.into(),
            })
        })?;

        info!("Created {} {} ({})", kind, server.id, server.name);
        Ok(server)
    }

    /// Renames a server. Keeping its own current name is allowed; taking a
    /// name another record holds is not.
    pub fn update_server_name(
        &self,
        kind: ServerKind,
        id: &str,
        name: &str,
    ) -> Result<Server, ServiceError> {
        validate_id(id)?;
        let store = self.servers(kind);

        let updated = self.db.transaction::<_, _, ServiceError>(|tx| {
            let mut server = store
                .get_by_id(tx, id)?
                .ok_or_else(|| ServiceError::not_found(kind.label(), id))?;
            if let Some(holder) = store.find_id_by_name(tx, name)? {
                if holder != id {
                    return Err(ServiceError::duplicate_name(kind, name));
                }
            }
            let ts = now();
            store.update_name(tx, id, name, ts)?;
            server.name = name.to_string();
            server.updated_at = ts;
            Ok(server)
        })?;

        info!("Renamed {} {} to {}", kind, id, name);
        Ok(updated)
    }

    /// Changes a server's status and reconciles every connection that
    /// references it.
    ///
    /// Going inactive deactivates each active connection. Going active
    /// activates each inactive connection whose other server is active too;
    /// this applies to all qualifying connections, for either server kind.
    pub fn change_server_status(
        &self,
        kind: ServerKind,
        id: &str,
        status: Status,
    ) -> Result<StatusChange, ServiceError> {
        validate_id(id)?;
        let store = self.servers(kind);
        let peers = self.servers(kind.peer());

        let change = self.cascade(|tx| {
            let current = store
                .get_by_id(tx, id)?
                .ok_or_else(|| ServiceError::not_found(kind.label(), id))?;
            if current.status == status {
                return Err(ServiceError::NoOp {
                    kind: kind.label(),
                    id: id.to_string(),
                    status,
                });
            }

            let ts = now();
            store.update_status(tx, id, status, ts)?;

            let mut updated = 0;
            for conn in self.connections.list_by_server(tx, kind, id)? {
                let target = match (status, conn.status) {
                    (Status::Inactive, Status::Active) => Status::Inactive,
                    (Status::Active, Status::Inactive) => {
                        let peer_id = conn.server_id(kind.peer());
                        let peer_active = peers
                            .get_by_id(tx, peer_id)?
                            .is_some_and(|p| p.status == Status::Active);
                        if !peer_active {
                            continue;
                        }
                        Status::Active
                    }
                    _ => continue,
                };
                self.connections.change_status(tx, &conn.id, target, ts)?;
                debug!("Connection {} -> {} (cascade from {} {})", conn.id, target, kind, id);
                updated += 1;
            }

            Ok(StatusChange {
                id: id.to_string(),
                status,
                connections_updated: updated,
            })
        })?;

        info!(
            "{} {} is now {} ({} connections updated)",
            kind, id, status, change.connections_updated
        );
        Ok(change)
    }

    pub fn change_webview_status(
        &self,
        id: &str,
        status: Status,
    ) -> Result<StatusChange, ServiceError> {
        self.change_server_status(ServerKind::Webview, id, status)
    }

    pub fn change_user_delivery_status(
        &self,
        id: &str,
        status: Status,
    ) -> Result<StatusChange, ServiceError> {
        self.change_server_status(ServerKind::UserDelivery, id, status)
    }

    /// Deletes a server together with every connection referencing it.
    pub fn delete_server(&self, kind: ServerKind, id: &str) -> Result<Deletion, ServiceError> {
        validate_id(id)?;
        let store = self.servers(kind);

        let deletion = self.cascade(|tx| {
            if !store.exists_by_id(tx, id)? {
                return Err(ServiceError::not_found(kind.label(), id));
            }

            let dependents = self.connections.list_by_server(tx, kind, id)?;
            for conn in &dependents {
                self.connections.delete(tx, &conn.id)?;
            }
            store.delete(tx, id)?;

            Ok(Deletion {
                id: id.to_string(),
                connections_deleted: dependents.len(),
            })
        })?;

        info!(
            "Deleted {} {} ({} connections removed)",
            kind, id, deletion.connections_deleted
        );
        Ok(deletion)
    }

    pub fn delete_webview_server(&self, id: &str) -> Result<Deletion, ServiceError> {
        self.delete_server(ServerKind::Webview, id)
    }

    pub fn delete_user_delivery_server(&self, id: &str) -> Result<Deletion, ServiceError> {
        self.delete_server(ServerKind::UserDelivery, id)
    }

    // -- Connections --

    /// Pairs two existing servers. Both sides get a fresh API key and the
    /// connection starts inactive.
    pub fn create_connection(
        &self,
        user_delivery_id: &str,
        webview_id: &str,
        webhook_url: &str,
    ) -> Result<Connection, ServiceError> {
        validate_id(user_delivery_id)?;
        validate_id(webview_id)?;

        let ts = now();
        let connection = Connection {
            id: new_id(),
            created_at: ts,
            updated_at: ts,
            status: Status::Inactive,
            webview_server_api_key: generate_api_key(),
            user_delivery_server_api_key: generate_api_key(),
            webview_server_id: webview_id.to_string(),
            user_delivery_server_id: user_delivery_id.to_string(),
            user_delivery_server_web_hook_url: webhook_url.to_string(),
        };

        self.db.transaction::<_, _, ServiceError>(|tx| {
            if !self.webviews.exists_by_id(tx, webview_id)? {
                return Err(ServiceError::reference_not_found(ServerKind::Webview, webview_id));
            }
            if !self.deliveries.exists_by_id(tx, user_delivery_id)? {
                return Err(ServiceError::reference_not_found(
                    ServerKind::UserDelivery,
                    user_delivery_id,
                ));
            }
            if self
                .connections
                .exists_by_pair(tx, user_delivery_id, webview_id)?
            {
                return Err(ServiceError::AlreadyExists {
                    user_delivery_id: user_delivery_id.to_string(),
                    webview_id: webview_id.to_string(),
                });
            }
            self.connections.create(tx, &connection)?;
            Ok(())
        })?;

        info!(
            "Created connection {} ({} <-> {})",
            connection.id, user_delivery_id, webview_id
        );
        Ok(connection)
    }

    pub fn get_connection(&self, id: &str) -> Result<Connection, ServiceError> {
        validate_id(id)?;
        self.db
            .with_conn(|conn| self.connections.get_by_id(conn, id).map_err(ServiceError::from))?
            .ok_or_else(|| ServiceError::not_found("connection", id))
    }

    /// Lists connections. A server id used as a filter must exist.
    pub fn list_connections(
        &self,
        filter: &ConnectionFilter,
    ) -> Result<ListPage<Connection>, ServiceError> {
        self.db.with_conn(|conn| {
            let references = [
                (ServerKind::Webview, filter.webview_server_id.as_deref()),
                (ServerKind::UserDelivery, filter.user_delivery_server_id.as_deref()),
            ];
            for (kind, id) in references {
                if let Some(id) = id {
                    if !self.servers(kind).exists_by_id(conn, id)? {
                        return Err(ServiceError::reference_not_found(kind, id));
                    }
                }
            }
            Ok(self.connections.list(conn, filter)?)
        })
    }

    pub fn update_webhook_url(&self, id: &str, url: &str) -> Result<Connection, ServiceError> {
        validate_id(id)?;
        let updated = self.db.transaction::<_, _, ServiceError>(|tx| {
            let mut conn = self
                .connections
                .get_by_id(tx, id)?
                .ok_or_else(|| ServiceError::not_found("connection", id))?;
            let ts = now();
            self.connections.update_webhook_url(tx, id, url, ts)?;
            conn.user_delivery_server_web_hook_url = url.to_string();
            conn.updated_at = ts;
            Ok(conn)
        })?;

        info!("Updated webhook url of connection {}", id);
        Ok(updated)
    }

    /// Explicit status change on a connection. Activation requires both
    /// referenced servers to be active at the moment of the write.
    pub fn change_connection_status(
        &self,
        id: &str,
        status: Status,
    ) -> Result<Connection, ServiceError> {
        validate_id(id)?;
        let updated = self.cascade(|tx| {
            let mut conn = self
                .connections
                .get_by_id(tx, id)?
                .ok_or_else(|| ServiceError::not_found("connection", id))?;
            if conn.status == status {
                return Err(ServiceError::NoOp {
                    kind: "connection",
                    id: id.to_string(),
                    status,
                });
            }

            if status == Status::Active {
                for kind in [ServerKind::Webview, ServerKind::UserDelivery] {
                    let server_id = conn.server_id(kind);
                    let active = self
                        .servers(kind)
                        .get_by_id(tx, server_id)?
                        .is_some_and(|s| s.status == Status::Active);
                    if !active {
                        return Err(ServiceError::PeerInactive {
                            kind,
                            id: server_id.to_string(),
                        });
                    }
                }
            }

            let ts = now();
            self.connections.change_status(tx, id, status, ts)?;
            conn.status = status;
            conn.updated_at = ts;
            Ok(conn)
        })?;

        info!("Connection {} is now {}", id, status);
        Ok(updated)
    }

    pub fn delete_connection(&self, id: &str) -> Result<Deletion, ServiceError> {
        validate_id(id)?;
        self.db.transaction::<_, _, ServiceError>(|tx| {
            if !self.connections.delete(tx, id)? {
                return Err(ServiceError::not_found("connection", id));
            }
            Ok(())
        })?;

        info!("Deleted connection {}", id);
        Ok(Deletion {
            id: id.to_string(),
            connections_deleted: 1,
        })
    }
}

/// 128 random bits, hex encoded.
pub fn generate_api_key() -> String {
    hex::encode(rand::random::<[u8; 16]>())
}
