//! Symbolic MIB names used by the discovery
//!
//! Only the handful of objects the storage discovery touches are known here;
//! anything else has to be given as a numeric OID.

use crate::error::{Error, Result};
use crate::oid::OidAddress;

/// `(module, symbol, oid)` rows
const SYMBOLS: &[(&str, &str, &[u32])] = &[
    ("SNMPv2-MIB", "sysDescr", &[1, 3, 6, 1, 2, 1, 1, 1]),
    ("SNMPv2-MIB", "sysObjectID", &[1, 3, 6, 1, 2, 1, 1, 2]),
    ("SNMPv2-MIB", "sysUpTime", &[1, 3, 6, 1, 2, 1, 1, 3]),
    ("SNMPv2-MIB", "sysContact", &[1, 3, 6, 1, 2, 1, 1, 4]),
    ("SNMPv2-MIB", "sysName", &[1, 3, 6, 1, 2, 1, 1, 5]),
    ("SNMPv2-MIB", "sysLocation", &[1, 3, 6, 1, 2, 1, 1, 6]),
    ("HOST-RESOURCES-MIB", "hrStorage", &[1, 3, 6, 1, 2, 1, 25, 2]),
    ("HOST-RESOURCES-MIB", "hrStorageTable", &[1, 3, 6, 1, 2, 1, 25, 2, 3]),
    ("HOST-RESOURCES-MIB", "hrStorageIndex", &[1, 3, 6, 1, 2, 1, 25, 2, 3, 1, 1]),
    ("HOST-RESOURCES-MIB", "hrStorageType", &[1, 3, 6, 1, 2, 1, 25, 2, 3, 1, 2]),
    ("HOST-RESOURCES-MIB", "hrStorageDescr", &[1, 3, 6, 1, 2, 1, 25, 2, 3, 1, 3]),
    ("HOST-RESOURCES-MIB", "hrStorageAllocationUnits", &[1, 3, 6, 1, 2, 1, 25, 2, 3, 1, 4]),
    ("HOST-RESOURCES-MIB", "hrStorageSize", &[1, 3, 6, 1, 2, 1, 25, 2, 3, 1, 5]),
    ("HOST-RESOURCES-MIB", "hrStorageUsed", &[1, 3, 6, 1, 2, 1, 25, 2, 3, 1, 6]),
    ("HOST-RESOURCES-TYPES", "hrStorageTypes", &[1, 3, 6, 1, 2, 1, 25, 2, 1]),
    ("HOST-RESOURCES-TYPES", "hrStorageOther", &[1, 3, 6, 1, 2, 1, 25, 2, 1, 1]),
    ("HOST-RESOURCES-TYPES", "hrStorageRam", &[1, 3, 6, 1, 2, 1, 25, 2, 1, 2]),
    ("HOST-RESOURCES-TYPES", "hrStorageVirtualMemory", &[1, 3, 6, 1, 2, 1, 25, 2, 1, 3]),
    ("HOST-RESOURCES-TYPES", "hrStorageFixedDisk", &[1, 3, 6, 1, 2, 1, 25, 2, 1, 4]),
    ("HOST-RESOURCES-TYPES", "hrStorageRemovableDisk", &[1, 3, 6, 1, 2, 1, 25, 2, 1, 5]),
    ("HOST-RESOURCES-TYPES", "hrStorageFloppyDisk", &[1, 3, 6, 1, 2, 1, 25, 2, 1, 6]),
    ("HOST-RESOURCES-TYPES", "hrStorageCompactDisc", &[1, 3, 6, 1, 2, 1, 25, 2, 1, 7]),
    ("HOST-RESOURCES-TYPES", "hrStorageRamDisk", &[1, 3, 6, 1, 2, 1, 25, 2, 1, 8]),
    ("HOST-RESOURCES-TYPES", "hrStorageFlashMemory", &[1, 3, 6, 1, 2, 1, 25, 2, 1, 9]),
    ("HOST-RESOURCES-TYPES", "hrStorageNetworkDisk", &[1, 3, 6, 1, 2, 1, 25, 2, 1, 10]),
];

/// Resolve `MODULE::symbol` to its numeric OID
pub fn resolve(module: &str, symbol: &str) -> Result<OidAddress> {
    SYMBOLS
        .iter()
        .find(|(m, s, _)| *m == module && *s == symbol)
        .map(|(_, _, arcs)| OidAddress::from(*arcs))
        .ok_or_else(|| Error::UnknownSymbol(format!("{}::{}", module, symbol)))
}

/// Resolve a symbol and append instance arcs (`sysName` + `[0]` → `sysName.0`)
pub fn resolve_instance(module: &str, symbol: &str, instance: &[u32]) -> Result<OidAddress> {
    Ok(resolve(module, symbol)?.extend(instance))
}
