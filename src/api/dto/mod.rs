pub mod response;
pub mod vpn;
