//! The NetBox object kinds managed by the `netbox-modules` executable.

pub mod cluster_group;
pub mod virtual_chassis;

pub use cluster_group::ClusterGroup;
pub use virtual_chassis::VirtualChassis;
