//! KubeVirt resource definitions
//!
//! Typed, read-mostly views of the KubeVirt custom resources the vm-watcher
//! controller consumes. Only the fields the controller reads are modelled;
//! everything else is left to the API server, which is why the controller
//! writes these objects through metadata merge patches and never replaces them.

pub mod virtual_machine;
pub mod virtual_machine_instance;

pub use virtual_machine::*;
pub use virtual_machine_instance::*;
