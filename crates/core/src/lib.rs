pub mod config;
pub mod error;
pub mod logging;

pub mod bootstrap;
pub mod classify;
pub mod descriptor;
pub mod dispatch;
pub mod extract;
pub mod finder;
pub mod merge;
pub mod watch;

pub use bootstrap::{AssemblyReport, AssemblyServices, Deployment};
pub use config::BootstrapConfig;
pub use error::{Result, WebscopeError};
pub use merge::{EffectiveDescriptor, FragmentMerger};
