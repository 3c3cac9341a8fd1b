//! Bundled tool domains for toolgate.
//!
//! Each domain is a factory returning a [`toolgate_core::ToolRegistry`]
//! ready to hang behind the domain router: `files` (guard-confined
//! filesystem access), `git` (read-only repository inspection), `system`
//! (host info and allowlisted command execution), and `assistant` (the
//! designated final tool).

mod args;

pub mod assistant;
pub mod files;
pub mod git;
pub mod system;

pub use assistant::assistant_domain;
pub use files::files_domain;
pub use git::git_domain;
pub use system::system_domain;
