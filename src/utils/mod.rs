//! Range algebra: port and target specifications

pub mod port_spec;
pub mod ports;
pub mod targets;

pub use port_spec::{AsPortSpec, PortSelection};
pub use ports::{extend_port_list, parse_ports, ports_to_str, valid_port};
pub use targets::{dispatch_network, ip_range, partial_ip_range, targets_to_list, valid_ip};
