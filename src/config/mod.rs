//! Layered configuration.
//!
//! Sources, lowest priority first, merged field by field:
//! 1. **Defaults** - compiled in
//! 2. **Project** - `$CWD/due-date-hook/config.yaml`
//! 3. **User** - `~/.due-date-hook/config.yaml`
//! 4. **Environment** - see below
//!
//! ## Environment Variables
//! - `DUE_HOOK_CONFIG_PATH` - Explicit config file (replaces the file tiers)
//! - `DUE_HOOK_PROJECT_DIR` - Project config dir (default: `./due-date-hook`)
//! - `DUE_HOOK_USER_DIR` - User config dir (default: `~/.due-date-hook`)
//! - `DUE_HOOK_PORT` - Webhook server port
//! - `ASANA_ACCESS_TOKEN` - API token
//! - `ASANA_BASE_URL` - API root, mainly for testing against a stub

mod loader;
mod merge;
mod types;

pub use loader::{ConfigLoader, ConfigPaths, ConfigTier};
pub use merge::deep_merge;
pub use types::*;
