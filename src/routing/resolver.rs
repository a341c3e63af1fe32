//! The routing metadata resolver.

use crate::config::VariantPorts;
use crate::routing::{BackendAddr, InvalidBackendAddr, ModelType};
use crate::store::{KvConnection, KvStore, StoreError};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Hash mapping session identifiers to subgrid ids.
const SESSION_TO_SUBGRID: &str = "session_to_subgrid_id";

/// Hash mapping subgrid ids to backend IPs (composed addressing).
const SUBGRID_TO_IP: &str = "subgrid_id_to_ip";

/// Loopback host used by the local address table.
const LOCAL_HOST: &str = "127.0.0.1";

/// Where the workload (subgrid) identifier comes from.
#[derive(Debug, Clone)]
pub enum WorkloadSource {
    /// Resolve per request via `HGET session_to_subgrid_id <session>`.
    Lookup,
    /// Fixed at startup; the session-to-subgrid step is skipped.
    Fixed(String),
}

/// How a subgrid's backend address is resolved once the model type is known.
#[derive(Debug, Clone)]
pub enum AddressSource {
    /// `HGET subgrid_id_to_ip <subgrid>` plus the configured variant port.
    Composed { ports: VariantPorts },
    /// `HGET subgrid_id_to_<variant>_address <subgrid>`, a full host:port.
    Direct,
    /// Constant loopback address table; used by storeless single-server mode.
    Local { ports: VariantPorts },
}

/// A failed routing resolution. Every variant fails the request closed.
#[derive(Debug, thiserror::Error)]
pub enum RouteError {
    #[error("no session identifier on request or in cache")]
    NoSession,

    #[error("no subgrid mapped to session {session}")]
    UnknownSession { session: String },

    #[error("no backend address for subgrid {subgrid}")]
    UnknownSubgrid { subgrid: String },

    #[error("unsupported model type '{model_type}' for subgrid {subgrid}")]
    UnsupportedModelType { subgrid: String, model_type: String },

    #[error("malformed backend address for subgrid {subgrid}: {source}")]
    InvalidAddress {
        subgrid: String,
        source: InvalidBackendAddr,
    },

    #[error("routing mode requires a key-value store but none is configured")]
    NoStore,

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl RouteError {
    /// Stable label for the failure-reason metric.
    pub fn reason(&self) -> &'static str {
        match self {
            RouteError::NoSession => "no_session",
            RouteError::UnknownSession { .. } => "unknown_session",
            RouteError::UnknownSubgrid { .. } => "unknown_subgrid",
            RouteError::UnsupportedModelType { .. } => "unsupported_model_type",
            RouteError::InvalidAddress { .. } => "invalid_address",
            RouteError::NoStore => "no_store",
            RouteError::Store(_) => "store",
        }
    }
}

/// Resolves a session identifier to a backend address.
///
/// Store-backed resolutions acquire one pooled connection for the whole
/// chain; the pool guard releases it on every exit path.
pub struct RouteResolver {
    store: Option<Arc<dyn KvStore>>,
    workload: WorkloadSource,
    address: AddressSource,
}

impl RouteResolver {
    /// A resolver that reads routing metadata from a store.
    pub fn with_store(
        store: Arc<dyn KvStore>,
        workload: WorkloadSource,
        address: AddressSource,
    ) -> Self {
        Self {
            store: Some(store),
            workload,
            address,
        }
    }

    /// A storeless resolver for single-server deployments: fixed subgrid id,
    /// loopback address table, default model type.
    pub fn local(subgrid_id: impl Into<String>, ports: VariantPorts) -> Self {
        Self {
            store: None,
            workload: WorkloadSource::Fixed(subgrid_id.into()),
            address: AddressSource::Local { ports },
        }
    }

    /// Resolve the backend address for a session.
    pub async fn resolve(&self, session: &str) -> Result<BackendAddr, RouteError> {
        let Some(store) = &self.store else {
            return self.resolve_static();
        };

        let mut conn = store.acquire().await.map_err(|e| {
            error!(error = %e, "unable to acquire store connection");
            e
        })?;
        self.resolve_via_store(session, conn.as_mut()).await
    }

    /// Storeless path: everything is known at startup except the request.
    fn resolve_static(&self) -> Result<BackendAddr, RouteError> {
        let (WorkloadSource::Fixed(subgrid), AddressSource::Local { ports }) =
            (&self.workload, &self.address)
        else {
            return Err(RouteError::NoStore);
        };

        let model_type = ModelType::default();
        let addr = BackendAddr::new(LOCAL_HOST, ports.port_for(model_type));
        debug!(subgrid = %subgrid, model_type = %model_type, backend = %addr, "resolved local backend");
        Ok(addr)
    }

    async fn resolve_via_store(
        &self,
        session: &str,
        conn: &mut (dyn KvConnection + Send),
    ) -> Result<BackendAddr, RouteError> {
        // 1) session -> subgrid
        let subgrid = match &self.workload {
            WorkloadSource::Fixed(id) => id.clone(),
            WorkloadSource::Lookup => self.lookup_subgrid(session, conn).await?,
        };

        // 2) subgrid -> loaded model type, defaulting on miss or store error
        let model_type = self.lookup_model_type(&subgrid, conn).await?;

        // 3) model type -> backend address
        let addr = match &self.address {
            AddressSource::Composed { ports } => {
                let ip = conn.hget(SUBGRID_TO_IP, &subgrid).await.map_err(|e| {
                    error!(subgrid = %subgrid, key = SUBGRID_TO_IP, error = %e, "unable to get backend ip");
                    e
                })?;
                let ip = ip.ok_or_else(|| RouteError::UnknownSubgrid {
                    subgrid: subgrid.clone(),
                })?;
                BackendAddr::new(ip, ports.port_for(model_type))
            }
            AddressSource::Direct => {
                let key = format!("subgrid_id_to_{}_address", model_type);
                let raw = conn.hget(&key, &subgrid).await.map_err(|e| {
                    error!(subgrid = %subgrid, key = %key, error = %e, "unable to get backend address");
                    e
                })?;
                let raw = raw.ok_or_else(|| RouteError::UnknownSubgrid {
                    subgrid: subgrid.clone(),
                })?;
                raw.parse().map_err(|source| RouteError::InvalidAddress {
                    subgrid: subgrid.clone(),
                    source,
                })?
            }
            AddressSource::Local { ports } => BackendAddr::new(LOCAL_HOST, ports.port_for(model_type)),
        };

        info!(
            session = session,
            subgrid = %subgrid,
            model_type = %model_type,
            backend = %addr,
            "resolved backend address"
        );
        Ok(addr)
    }

    async fn lookup_subgrid(
        &self,
        session: &str,
        conn: &mut (dyn KvConnection + Send),
    ) -> Result<String, RouteError> {
        let subgrid = conn.hget(SESSION_TO_SUBGRID, session).await.map_err(|e| {
            error!(session = session, key = SESSION_TO_SUBGRID, error = %e, "unable to get subgrid id");
            e
        })?;
        subgrid.ok_or_else(|| RouteError::UnknownSession {
            session: session.to_string(),
        })
    }

    /// Read the subgrid's loaded model type.
    ///
    /// A missing key or a store error yields the baseline type: deployments
    /// that predate model types never write this key. An unrecognized value
    /// is terminal; there is no safe port to guess.
    async fn lookup_model_type(
        &self,
        subgrid: &str,
        conn: &mut (dyn KvConnection + Send),
    ) -> Result<ModelType, RouteError> {
        let key = format!("{}:loaded_model_type", subgrid);
        match conn.get(&key).await {
            Ok(Some(raw)) => raw.parse::<ModelType>().map_err(|e| {
                error!(subgrid = %subgrid, model_type = %e.0, "unsupported loaded model type");
                RouteError::UnsupportedModelType {
                    subgrid: subgrid.to_string(),
                    model_type: e.0,
                }
            }),
            Ok(None) => {
                warn!(subgrid = %subgrid, "loaded model type not set, falling back to {}", ModelType::default());
                Ok(ModelType::default())
            }
            Err(e) => {
                warn!(subgrid = %subgrid, key = %key, error = %e, "loaded model type unavailable, falling back to {}", ModelType::default());
                Ok(ModelType::default())
            }
        }
    }
}
