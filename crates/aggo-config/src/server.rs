use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    /// Event receiver listen address, e.g. `"tcp://127.0.0.1:9900"`.
    pub listen: String,
}
