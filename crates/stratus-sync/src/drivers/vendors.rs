//! Vendor profiles

use stratus_core::domain::{CloudRegion, ResourceType, Vendor};

use super::VendorProfile;

/// Amazon Web Services
#[derive(Debug, Default, Clone, Copy)]
pub struct AwsProfile;

impl VendorProfile for AwsProfile {
    fn vendor(&self) -> Vendor {
        Vendor::Aws
    }

    fn resource_types(&self) -> &'static [ResourceType] {
        &[
            ResourceType::Region,
            ResourceType::Zone,
            ResourceType::Image,
            ResourceType::Vpc,
            ResourceType::Subnet,
            ResourceType::SecurityGroup,
            ResourceType::RouteTable,
            ResourceType::NetworkInterface,
            ResourceType::Disk,
            ResourceType::Eip,
            ResourceType::Cvm,
        ]
    }

    /// Regions the account never opted into are listed but unusable
    fn region_available(&self, region: &CloudRegion) -> bool {
        region.field_str("opt_in_status") != Some("not-opted-in")
    }

    fn field_aliases(&self) -> &'static [(&'static str, &'static str)] {
        &[
            ("Name", "name"),
            ("State", "state"),
            ("CidrBlock", "cidr"),
            ("VpcId", "vpc_id"),
            ("SubnetId", "subnet_id"),
            ("AvailabilityZone", "zone"),
            ("InstanceId", "instance_id"),
            ("InstanceType", "instance_type"),
            ("PrivateIpAddress", "private_ip"),
            ("PublicIp", "public_ip"),
            ("Size", "size"),
            ("Description", "description"),
            ("PlatformDetails", "platform"),
        ]
    }
}

/// Tencent Cloud
#[derive(Debug, Default, Clone, Copy)]
pub struct TCloudProfile;

impl VendorProfile for TCloudProfile {
    fn vendor(&self) -> Vendor {
        Vendor::TCloud
    }

    fn resource_types(&self) -> &'static [ResourceType] {
        &[
            ResourceType::Region,
            ResourceType::Zone,
            ResourceType::Image,
            ResourceType::Vpc,
            ResourceType::Subnet,
            ResourceType::SecurityGroup,
            ResourceType::RouteTable,
            ResourceType::NetworkInterface,
            ResourceType::Disk,
            ResourceType::Eip,
            ResourceType::Cvm,
        ]
    }

    fn region_available(&self, region: &CloudRegion) -> bool {
        region.field_str("state") == Some("AVAILABLE")
    }

    fn field_aliases(&self) -> &'static [(&'static str, &'static str)] {
        &[
            ("CidrBlock", "cidr"),
            ("VpcId", "vpc_id"),
            ("SubnetId", "subnet_id"),
            ("Zone", "zone"),
            ("InstanceId", "instance_id"),
            ("InstanceType", "instance_type"),
            ("DiskSize", "size"),
            ("AddressIp", "public_ip"),
            ("Platform", "platform"),
        ]
    }

    /// Payloads carry the names of parent objects too, so `name` and
    /// `state` come from the field owned by the listed type
    fn type_aliases(&self, resource_type: ResourceType) -> &'static [(&'static str, &'static str)] {
        match resource_type {
            ResourceType::Vpc => &[("VpcName", "name")],
            ResourceType::Subnet => &[("SubnetName", "name")],
            ResourceType::SecurityGroup => &[("SecurityGroupName", "name")],
            ResourceType::RouteTable => &[("RouteTableName", "name")],
            ResourceType::NetworkInterface => &[("NetworkInterfaceName", "name")],
            ResourceType::Disk => &[("DiskName", "name"), ("DiskState", "state")],
            ResourceType::Eip => &[("AddressName", "name"), ("AddressStatus", "state")],
            ResourceType::Cvm => &[("InstanceName", "name"), ("InstanceState", "state")],
            ResourceType::Image => &[("ImageName", "name"), ("ImageState", "state")],
            ResourceType::Region | ResourceType::Zone => &[],
        }
    }
}

/// Huawei Cloud
#[derive(Debug, Default, Clone, Copy)]
pub struct HuaWeiProfile;

impl VendorProfile for HuaWeiProfile {
    fn vendor(&self) -> Vendor {
        Vendor::HuaWei
    }

    fn resource_types(&self) -> &'static [ResourceType] {
        &[
            ResourceType::Region,
            ResourceType::Zone,
            ResourceType::Image,
            ResourceType::Vpc,
            ResourceType::Subnet,
            ResourceType::SecurityGroup,
            ResourceType::RouteTable,
            ResourceType::NetworkInterface,
            ResourceType::Disk,
            ResourceType::Eip,
            ResourceType::Cvm,
        ]
    }

    fn region_available(&self, region: &CloudRegion) -> bool {
        region.field_str("state") != Some("disabled")
    }

    fn field_aliases(&self) -> &'static [(&'static str, &'static str)] {
        &[
            ("status", "state"),
            ("availability_zone", "zone"),
            ("public_ip_address", "public_ip"),
            ("os_type", "platform"),
        ]
    }
}

/// Google Cloud Platform
#[derive(Debug, Default, Clone, Copy)]
pub struct GcpProfile;

impl VendorProfile for GcpProfile {
    fn vendor(&self) -> Vendor {
        Vendor::Gcp
    }

    fn resource_types(&self) -> &'static [ResourceType] {
        &[
            ResourceType::Region,
            ResourceType::Zone,
            ResourceType::Image,
            ResourceType::Vpc,
            ResourceType::Subnet,
            ResourceType::SecurityGroup,
            ResourceType::Disk,
            ResourceType::Eip,
            ResourceType::Cvm,
        ]
    }

    fn region_available(&self, region: &CloudRegion) -> bool {
        region.field_str("status") == Some("UP")
    }

    fn field_aliases(&self) -> &'static [(&'static str, &'static str)] {
        &[
            ("status", "state"),
            ("ipCidrRange", "cidr"),
            ("network", "vpc_id"),
            ("machineType", "instance_type"),
            ("sizeGb", "size"),
            ("address", "public_ip"),
            ("networkIP", "private_ip"),
            ("family", "platform"),
        ]
    }
}

/// Microsoft Azure
#[derive(Debug, Default, Clone, Copy)]
pub struct AzureProfile;

impl VendorProfile for AzureProfile {
    fn vendor(&self) -> Vendor {
        Vendor::Azure
    }

    fn resource_types(&self) -> &'static [ResourceType] {
        &[
            ResourceType::Region,
            ResourceType::Image,
            ResourceType::Vpc,
            ResourceType::Subnet,
            ResourceType::SecurityGroup,
            ResourceType::RouteTable,
            ResourceType::NetworkInterface,
            ResourceType::Disk,
            ResourceType::Eip,
            ResourceType::Cvm,
        ]
    }

    /// Azure reports no region state; every listed location is usable
    fn region_available(&self, _region: &CloudRegion) -> bool {
        true
    }

    fn field_aliases(&self) -> &'static [(&'static str, &'static str)] {
        &[
            ("provisioningState", "state"),
            ("addressPrefix", "cidr"),
            ("vmSize", "instance_type"),
            ("diskSizeGB", "size"),
            ("ipAddress", "public_ip"),
            ("privateIPAddress", "private_ip"),
            ("osType", "platform"),
        ]
    }
}
