pub mod config;
pub mod resolver;
pub mod schedule;
pub mod session;
pub mod tenant;

pub use config::{AppConfig, ConfigError, ConfigOverrides, LoadOptions, LogFormat};
pub use resolver::TenantResolver;
pub use schedule::{is_open, resolve_timezone};
pub use session::{CallSession, CallSessionStore, SessionPatch};
pub use tenant::{DayRule, TenantConfig, TenantId};
