pub mod resource_group;
pub mod system;
pub mod vpn;
