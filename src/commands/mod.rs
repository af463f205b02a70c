mod aliases;
mod control;
mod resolve;
mod status;
mod view;

pub use aliases::{aliases_import, aliases_list};
pub use control::{action, safe_restart};
pub use resolve::{exists, manager, path, resolve};
pub use status::{is_active, is_enabled, status};
pub use view::{config, log};
