//! Core traits for the discovery system
//!
//! This module defines the abstract interfaces that all implementations must follow.
//!
//! - [`SnmpTransport`]: One SNMP PDU round trip against one agent
//! - [`HostRegistry`]: The monitoring system's group/host inventory

pub mod host_registry;
pub mod snmp_transport;

pub use host_registry::{HostMacro, HostRegistry, HostSpec, InterfaceSpec, SnmpInterfaceDetails};
pub use snmp_transport::{SnmpTransport, SnmpTransportFactory, SnmpValue, VarBinding};
