//! Cloud vendors and resource types
//!
//! Both enumerations have a stable lowercase string form used in the
//! store, in configuration files, in gateway URLs and in log fields.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::errors::DomainError;

/// A supported cloud provider
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Vendor {
    /// Amazon Web Services
    Aws,
    /// Tencent Cloud
    #[serde(rename = "tcloud")]
    TCloud,
    /// Huawei Cloud
    #[serde(rename = "huawei")]
    HuaWei,
    /// Google Cloud Platform
    Gcp,
    /// Microsoft Azure
    Azure,
}

impl Vendor {
    /// All vendors, in sweep order
    pub const ALL: [Vendor; 5] = [
        Vendor::TCloud,
        Vendor::Aws,
        Vendor::HuaWei,
        Vendor::Gcp,
        Vendor::Azure,
    ];

    /// Returns the canonical string form (e.g. `"tcloud"`)
    pub fn as_str(&self) -> &'static str {
        match self {
            Vendor::Aws => "aws",
            Vendor::TCloud => "tcloud",
            Vendor::HuaWei => "huawei",
            Vendor::Gcp => "gcp",
            Vendor::Azure => "azure",
        }
    }
}

impl fmt::Display for Vendor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Vendor {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "aws" => Ok(Vendor::Aws),
            "tcloud" => Ok(Vendor::TCloud),
            "huawei" => Ok(Vendor::HuaWei),
            "gcp" => Ok(Vendor::Gcp),
            "azure" => Ok(Vendor::Azure),
            other => Err(DomainError::UnknownVendor(other.to_string())),
        }
    }
}

/// A kind of cloud object mirrored in the store
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceType {
    /// Vendor region master list
    Region,
    /// Availability zone master list
    Zone,
    /// Public machine images
    Image,
    /// Virtual private cloud
    Vpc,
    /// Subnet within a VPC
    Subnet,
    /// Security group
    SecurityGroup,
    /// Route table
    RouteTable,
    /// Elastic network interface
    NetworkInterface,
    /// Block storage disk
    Disk,
    /// Elastic (public) IP
    Eip,
    /// Virtual machine instance
    Cvm,
}

impl ResourceType {
    /// Returns the canonical string form (e.g. `"security_group"`)
    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceType::Region => "region",
            ResourceType::Zone => "zone",
            ResourceType::Image => "image",
            ResourceType::Vpc => "vpc",
            ResourceType::Subnet => "subnet",
            ResourceType::SecurityGroup => "security_group",
            ResourceType::RouteTable => "route_table",
            ResourceType::NetworkInterface => "network_interface",
            ResourceType::Disk => "disk",
            ResourceType::Eip => "eip",
            ResourceType::Cvm => "cvm",
        }
    }

    /// Returns true for vendor-wide resources not owned by any single account
    ///
    /// Public resources are synced once per vendor sweep rather than once per
    /// account.
    pub fn is_public(&self) -> bool {
        matches!(
            self,
            ResourceType::Region | ResourceType::Zone | ResourceType::Image
        )
    }
}

impl fmt::Display for ResourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ResourceType {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "region" => Ok(ResourceType::Region),
            "zone" => Ok(ResourceType::Zone),
            "image" => Ok(ResourceType::Image),
            "vpc" => Ok(ResourceType::Vpc),
            "subnet" => Ok(ResourceType::Subnet),
            "security_group" => Ok(ResourceType::SecurityGroup),
            "route_table" => Ok(ResourceType::RouteTable),
            "network_interface" => Ok(ResourceType::NetworkInterface),
            "disk" => Ok(ResourceType::Disk),
            "eip" => Ok(ResourceType::Eip),
            "cvm" => Ok(ResourceType::Cvm),
            other => Err(DomainError::UnknownResourceType(other.to_string())),
        }
    }
}
