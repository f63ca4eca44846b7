//! Label keys stamped on resources managed by the netset controller.

/// Label carrying the owning NetSet's name on pods and IP claims.
/// Set membership queries select on this label.
pub const APP_LABEL: &str = "app.netset.io";
