pub mod annotation;
pub mod class;
pub mod component;
pub mod deployment;
pub mod fragment;
pub mod location;

pub use annotation::*;
pub use class::*;
pub use component::*;
pub use deployment::*;
pub use fragment::*;
pub use location::*;
