pub mod aggo;
pub mod logging;
pub mod persist;
pub mod rules;
pub mod runtime;
pub mod server;
pub mod sink;
pub mod types;
mod validate;

pub use aggo::AggoConfig;
pub use logging::{LogFormat, LoggingConfig};
pub use persist::PersistConfig;
pub use rules::{RuleDef, load_rule_defs, parse_rule_defs, resolve_glob};
pub use runtime::{MatcherKind, RuntimeConfig};
pub use server::ServerConfig;
pub use sink::{SinkConfig, SinkUri, parse_sink_uri};
pub use types::HumanDuration;
