use async_trait::async_trait;
use std::collections::BTreeMap;
use std::net::Ipv4Addr;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

use crate::application::services::retry_policy::{RetryPolicy, RetryableOperation};
use crate::common::error::Cons3rtError;
use crate::common::result::{Cons3rtResult, OptionExt};
use crate::infrastructure::cloud::types::{
    AddressFilter, ApiError, ApiResult, ElasticIp, Image, IngressRule, Instance, NetworkInterface,
    NewNetworkInterface, SecurityGroup, SecurityGroupFilter, Subnet,
};

/// Tag every CONS3RT-managed image carries.
pub const CONS3RT_UUID_TAG: &str = "cons3rtuuid";
pub const DEFAULT_TEMPLATE_DESCRIPTION: &str = "CONS3RT OS template";

/// Tags that mark a fresh image as a CONS3RT template.
pub fn default_template_tags() -> BTreeMap<String, String> {
    BTreeMap::from([
        ("cons3rtenabled".to_string(), "true".to_string()),
        ("cons3rtNet1".to_string(), "user-net".to_string()),
        ("cons3rtNet1SecurityGroup".to_string(), "default".to_string()),
    ])
}

/// Compute provider operations consumed by [`ComputeClient`].
#[async_trait]
pub trait ComputeApi: Send + Sync {
    async fn describe_instance(&self, instance_id: &str) -> ApiResult<Instance>;

    /// Subnets in `vpc_id` whose `Name` tag equals `name`.
    async fn find_subnets(&self, vpc_id: &str, name: &str) -> ApiResult<Vec<Subnet>>;

    async fn create_network_interface(
        &self,
        request: &NewNetworkInterface,
        description: &str,
    ) -> ApiResult<NetworkInterface>;

    async fn describe_network_interface(&self, eni_id: &str) -> ApiResult<NetworkInterface>;

    /// Returns the attachment id.
    async fn attach_network_interface(
        &self,
        eni_id: &str,
        instance_id: &str,
        device_index: u32,
    ) -> ApiResult<String>;

    async fn assign_private_ip(&self, eni_id: &str, ip_address: &str) -> ApiResult<()>;

    async fn allocate_address(&self) -> ApiResult<ElasticIp>;

    async fn describe_addresses(&self, filter: &AddressFilter) -> ApiResult<Vec<ElasticIp>>;

    /// Returns the association id.
    async fn associate_address(
        &self,
        allocation_id: &str,
        eni_id: &str,
        private_ip: Option<String>,
    ) -> ApiResult<String>;

    async fn disassociate_address(&self, association_id: &str) -> ApiResult<()>;

    async fn describe_security_groups(
        &self,
        filter: &SecurityGroupFilter,
        vpc_id: Option<String>,
    ) -> ApiResult<Vec<SecurityGroup>>;

    /// Returns the new group id.
    async fn create_security_group(
        &self,
        name: &str,
        description: &str,
        vpc_id: &str,
    ) -> ApiResult<String>;

    async fn revoke_ingress(&self, group_id: &str, rule: &IngressRule) -> ApiResult<()>;

    async fn authorize_ingress(&self, group_id: &str, rule: &IngressRule) -> ApiResult<()>;

    async fn describe_image(&self, image_id: &str) -> ApiResult<Image>;

    /// Returns the new image id.
    async fn create_image(
        &self,
        instance_id: &str,
        name: &str,
        description: Option<String>,
    ) -> ApiResult<String>;

    async fn deregister_image(&self, image_id: &str) -> ApiResult<()>;

    async fn create_tags(&self, resource_id: &str, tags: &BTreeMap<String, String>) -> ApiResult<()>;

    async fn delete_snapshot(&self, snapshot_id: &str) -> ApiResult<()>;
}

/// Parameters for [`ComputeClient::attach_new_eni`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttachEniRequest {
    pub subnet_name: String,
    pub security_group_ids: Vec<String>,
    pub device_index: u32,
    pub allocation_id: Option<String>,
    pub description: String,
}

impl AttachEniRequest {
    pub fn new(subnet_name: impl Into<String>, security_group_ids: Vec<String>) -> Self {
        Self {
            subnet_name: subnet_name.into(),
            security_group_ids,
            device_index: 2,
            allocation_id: None,
            description: String::new(),
        }
    }

    pub fn with_device_index(mut self, device_index: u32) -> Self {
        self.device_index = device_index;
        self
    }

    pub fn with_allocation_id(mut self, allocation_id: impl Into<String>) -> Self {
        self.allocation_id = Some(allocation_id.into());
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }
}

/// Instance-scoped compute operations.
pub struct ComputeClient {
    api: Arc<dyn ComputeApi>,
    instance_id: String,
    address_verification: RetryPolicy,
    interface_verification: RetryPolicy,
    image_verification: RetryPolicy,
    image_settle: Duration,
}

impl ComputeClient {
    pub fn new(api: Arc<dyn ComputeApi>, instance_id: impl Into<String>) -> Self {
        Self {
            api,
            instance_id: instance_id.into(),
            address_verification: RetryPolicy::new(60, Duration::from_secs(1)),
            interface_verification: RetryPolicy::new(60, Duration::from_secs(2)),
            image_verification: RetryPolicy::new(60, Duration::from_secs(5)),
            image_settle: Duration::from_secs(20),
        }
    }

    /// Overrides the polling used while waiting for new resources to appear.
    pub fn with_verification(mut self, policy: RetryPolicy) -> Self {
        self.address_verification = policy;
        self.interface_verification = policy;
        self.image_verification = policy;
        self
    }

    pub fn with_image_settle(mut self, settle: Duration) -> Self {
        self.image_settle = settle;
        self
    }

    pub fn instance_id(&self) -> &str {
        &self.instance_id
    }

    async fn instance(&self) -> Cons3rtResult<Instance> {
        self.api
            .describe_instance(&self.instance_id)
            .await
            .map_err(api_failure("DescribeInstances"))
    }

    pub async fn vpc_id(&self) -> Cons3rtResult<String> {
        let instance = self.instance().await?;
        instance.vpc_id.ok_or_not_found("VPC ID", &self.instance_id)
    }

    /// ENI attached at `device_index`, or `None` if nothing is attached there.
    pub async fn eni_id(&self, device_index: u32) -> Cons3rtResult<Option<String>> {
        let instance = self.instance().await?;
        Ok(instance
            .network_interfaces
            .into_iter()
            .find(|eni| eni.device_index == Some(device_index))
            .map(|eni| eni.eni_id))
    }

    async fn require_eni(&self, device_index: u32) -> Cons3rtResult<String> {
        self.eni_id(device_index).await?.ok_or_else(|| {
            error!("Unable to find the ENI ID for device index {}", device_index);
            Cons3rtError::not_found("ENI", format!("device index {device_index}"))
        })
    }

    pub async fn add_secondary_ip(&self, ip_address: &str, device_index: u32) -> Cons3rtResult<()> {
        validate_ipv4("ip_address", ip_address)?;
        let eni_id = self.require_eni(device_index).await?;
        self.api
            .assign_private_ip(&eni_id, ip_address)
            .await
            .map_err(api_failure("AssignPrivateIpAddresses"))?;
        info!("Added secondary IP {} to ENI {} (device index {})", ip_address, eni_id, device_index);
        Ok(())
    }

    /// Associates an elastic IP with the ENI at `device_index`. Without
    /// `private_ip` the provider picks the interface's primary address.
    pub async fn associate_elastic_ip(
        &self,
        allocation_id: &str,
        device_index: u32,
        private_ip: Option<&str>,
    ) -> Cons3rtResult<String> {
        require("allocation_id", allocation_id)?;
        if let Some(ip) = private_ip {
            validate_ipv4("private_ip", ip)?;
        }
        let eni_id = self.require_eni(device_index).await?;
        let association_id = self
            .api
            .associate_address(allocation_id, &eni_id, private_ip.map(str::to_string))
            .await
            .map_err(api_failure("AssociateAddress"))?;
        info!("Associated elastic IP {} with ENI {}", allocation_id, eni_id);
        Ok(association_id)
    }

    /// Allocates an elastic IP and waits until it is visible.
    pub async fn allocate_elastic_ip(&self) -> Cons3rtResult<ElasticIp> {
        let address = self
            .api
            .allocate_address()
            .await
            .map_err(api_failure("AllocateAddress"))?;
        info!("Allocated elastic IP {} ({})", address.public_ip, address.allocation_id);

        let api = &self.api;
        let filter = &AddressFilter::AllocationId(address.allocation_id.clone());
        let allocation_id = address.allocation_id.as_str();
        self.address_verification
            .execute(RetryableOperation::new(
                format!("verify elastic IP {allocation_id}"),
                move || async move {
                    let found = api.describe_addresses(filter).await?;
                    if found.is_empty() {
                        return Err(ApiError::without_status(
                            "InvalidAllocationID.NotFound",
                            format!("{allocation_id} is not visible yet"),
                        ));
                    }
                    Ok(())
                },
            ))
            .await?;
        Ok(address)
    }

    /// Creates an ENI in the named subnet, optionally gives it an elastic IP,
    /// and attaches it to this instance.
    pub async fn attach_new_eni(&self, request: &AttachEniRequest) -> Cons3rtResult<NetworkInterface> {
        require("subnet_name", &request.subnet_name)?;
        if let Some(allocation_id) = &request.allocation_id {
            require("allocation_id", allocation_id)?;
        }

        let vpc_id = self.vpc_id().await?;
        let subnet = self.subnet_by_name(&vpc_id, &request.subnet_name).await?;

        let new_interface = NewNetworkInterface {
            subnet_id: subnet.subnet_id.clone(),
            security_group_ids: request.security_group_ids.clone(),
            ..Default::default()
        };
        let eni = self
            .api
            .create_network_interface(&new_interface, &request.description)
            .await
            .map_err(api_failure("CreateNetworkInterface"))?;
        info!("Created ENI {} in subnet {}", eni.eni_id, subnet.subnet_id);

        let api = &self.api;
        let eni_id = eni.eni_id.as_str();
        self.interface_verification
            .execute(RetryableOperation::new(
                format!("verify ENI {eni_id}"),
                move || async move { api.describe_network_interface(eni_id).await },
            ))
            .await?;

        if let Some(allocation_id) = &request.allocation_id {
            self.api
                .associate_address(allocation_id, eni_id, None)
                .await
                .map_err(api_failure("AssociateAddress"))?;
            info!("Associated elastic IP {} with new ENI {}", allocation_id, eni_id);
        }

        self.api
            .attach_network_interface(eni_id, &self.instance_id, request.device_index)
            .await
            .map_err(api_failure("AttachNetworkInterface"))?;
        info!(
            "Attached ENI {} to instance {} at device index {}",
            eni_id, self.instance_id, request.device_index
        );
        Ok(eni)
    }

    async fn subnet_by_name(&self, vpc_id: &str, name: &str) -> Cons3rtResult<Subnet> {
        let mut subnets = self
            .api
            .find_subnets(vpc_id, name)
            .await
            .map_err(api_failure("DescribeSubnets"))?;
        match subnets.len() {
            1 => Ok(subnets.remove(0)),
            0 => Err(Cons3rtError::not_found(
                "Subnet",
                format!("{name} in VPC {vpc_id}"),
            )),
            n => Err(Cons3rtError::validation_error(
                "subnet_name",
                format!("{n} subnets named {name} found in VPC {vpc_id}"),
                Some(name.to_string()),
            )),
        }
    }

    /// Elastic IPs currently associated with this instance.
    pub async fn elastic_ips(&self) -> Cons3rtResult<Vec<ElasticIp>> {
        let instance = self.instance().await?;
        let public_ips: Vec<String> = instance
            .network_interfaces
            .into_iter()
            .filter_map(|eni| eni.public_ip)
            .collect();
        if public_ips.is_empty() {
            info!("No public IPs found on instance {}", self.instance_id);
            return Ok(Vec::new());
        }
        self.api
            .describe_addresses(&AddressFilter::PublicIps(public_ips))
            .await
            .map_err(api_failure("DescribeAddresses"))
    }

    /// Disassociates every elastic IP from this instance and returns how many
    /// were released.
    pub async fn disassociate_elastic_ips(&self) -> Cons3rtResult<usize> {
        let mut count = 0;
        for address in self.elastic_ips().await? {
            let Some(association_id) = address.association_id.as_deref() else {
                warn!("Elastic IP {} has no association", address.public_ip);
                continue;
            };
            self.api
                .disassociate_address(association_id)
                .await
                .map_err(api_failure("DisassociateAddress"))?;
            info!("Disassociated elastic IP {} ({})", address.public_ip, association_id);
            count += 1;
        }
        Ok(count)
    }

    /// Returns the id of the group named `name`, creating it if needed.
    pub async fn create_security_group(
        &self,
        name: &str,
        description: &str,
        vpc_id: Option<&str>,
    ) -> Cons3rtResult<String> {
        require("name", name)?;
        let vpc_id = match vpc_id {
            Some(vpc_id) => vpc_id.to_string(),
            None => self.vpc_id().await?,
        };

        let existing = self
            .api
            .describe_security_groups(&SecurityGroupFilter::Name(name.to_string()), Some(vpc_id.clone()))
            .await
            .map_err(api_failure("DescribeSecurityGroups"))?;
        if let [group] = existing.as_slice() {
            info!("Security group {} already exists: {}", name, group.group_id);
            return Ok(group.group_id.clone());
        }

        let group_id = self
            .api
            .create_security_group(name, description, &vpc_id)
            .await
            .map_err(api_failure("CreateSecurityGroup"))?;
        info!("Created security group {} ({}) in VPC {}", name, group_id, vpc_id);
        Ok(group_id)
    }

    /// Restricts TCP `port` on the group to exactly `cidr_blocks`.
    pub async fn configure_security_group_ingress(
        &self,
        group_id: &str,
        port: u16,
        cidr_blocks: &[String],
    ) -> Cons3rtResult<()> {
        require("security_group_id", group_id)?;
        for cidr in cidr_blocks {
            validate_cidr(cidr)?;
        }

        let groups = self
            .api
            .describe_security_groups(&SecurityGroupFilter::GroupId(group_id.to_string()), None)
            .await
            .map_err(api_failure("DescribeSecurityGroups"))?;
        let group = groups
            .into_iter()
            .next()
            .ok_or_not_found("Security group", group_id)?;

        for rule in group.ingress.iter().filter(|rule| rule.to_port == port) {
            info!("Revoking ingress rule on port {} from {}", port, group_id);
            self.api
                .revoke_ingress(group_id, rule)
                .await
                .map_err(api_failure("RevokeSecurityGroupIngress"))?;
        }

        let rule = IngressRule::tcp(port, cidr_blocks.to_vec());
        self.api
            .authorize_ingress(group_id, &rule)
            .await
            .map_err(api_failure("AuthorizeSecurityGroupIngress"))?;
        info!("Port {} on {} now allows {}", port, group_id, cidr_blocks.join(", "));
        Ok(())
    }

    /// Replaces `ami_id` with a fresh image of `instance_id` under the same
    /// name, description and tags, then deletes the old image's snapshot.
    pub async fn replace_image(&self, ami_id: &str, instance_id: &str) -> Cons3rtResult<String> {
        require("ami_id", ami_id)?;
        require("instance_id", instance_id)?;

        let image = self
            .api
            .describe_image(ami_id)
            .await
            .map_err(api_failure("DescribeImages"))?;
        let uuid = template_uuid(&image)?;
        info!("Replacing image {} ({}={})", ami_id, CONS3RT_UUID_TAG, uuid);

        self.api
            .deregister_image(ami_id)
            .await
            .map_err(api_failure("DeregisterImage"))?;
        tokio::time::sleep(self.image_settle).await;

        let new_image_id = self
            .create_verified_image(instance_id, &image.name, image.description.clone())
            .await?;

        self.api
            .create_tags(&new_image_id, &image.tags)
            .await
            .map_err(api_failure("CreateTags"))?;

        if let Some(snapshot_id) = &image.snapshot_id {
            self.api
                .delete_snapshot(snapshot_id)
                .await
                .map_err(api_failure("DeleteSnapshot"))?;
            info!("Deleted snapshot {} of the old image", snapshot_id);
        }
        Ok(new_image_id)
    }

    /// Images `instance_id` as a new CONS3RT template and tags it with
    /// [`default_template_tags`]. Returns the new image id.
    ///
    /// # Arguments
    ///
    /// * `instance_id` - Instance to image; it is rebooted by the provider
    /// * `name` - Name of the new image
    /// * `description` - Defaults to [`DEFAULT_TEMPLATE_DESCRIPTION`]
    pub async fn create_cons3rt_template(
        &self,
        instance_id: &str,
        name: &str,
        description: Option<&str>,
    ) -> Cons3rtResult<String> {
        require("instance_id", instance_id)?;
        require("name", name)?;
        let description = description.unwrap_or(DEFAULT_TEMPLATE_DESCRIPTION);

        info!("Creating a CONS3RT template named {} from instance {}", name, instance_id);
        let image_id = self
            .create_verified_image(instance_id, name, Some(description.to_string()))
            .await?;
        tokio::time::sleep(self.image_settle).await;

        let tags = default_template_tags();
        self.api
            .create_tags(&image_id, &tags)
            .await
            .map_err(api_failure("CreateTags"))?;
        info!("Tagged template image {} with {} tags", image_id, tags.len());
        Ok(image_id)
    }

    /// The `cons3rtuuid` tag value of a CONS3RT template image.
    pub async fn cons3rt_template_uuid(&self, ami_id: &str) -> Cons3rtResult<String> {
        require("ami_id", ami_id)?;
        let image = self
            .api
            .describe_image(ami_id)
            .await
            .map_err(api_failure("DescribeImages"))?;
        template_uuid(&image).map(str::to_string)
    }

    async fn create_verified_image(
        &self,
        instance_id: &str,
        name: &str,
        description: Option<String>,
    ) -> Cons3rtResult<String> {
        let new_image_id = self
            .api
            .create_image(instance_id, name, description)
            .await
            .map_err(api_failure("CreateImage"))?;
        info!("Created image {} from instance {}", new_image_id, instance_id);

        let api = &self.api;
        let new_id = new_image_id.as_str();
        self.image_verification
            .execute(RetryableOperation::new(
                format!("verify image {new_id}"),
                move || async move { api.describe_image(new_id).await },
            ))
            .await?;
        Ok(new_image_id)
    }
}

fn template_uuid(image: &Image) -> Cons3rtResult<&str> {
    image
        .tags
        .get(CONS3RT_UUID_TAG)
        .map(String::as_str)
        .ok_or_else(|| {
            Cons3rtError::validation_error(
                "ami_id",
                format!("image is missing the {CONS3RT_UUID_TAG} tag"),
                Some(image.image_id.clone()),
            )
        })
}

fn api_failure(operation: &'static str) -> impl FnOnce(ApiError) -> Cons3rtError {
    move |e| {
        error!("{} failed: {}", operation, e);
        e.into_remote_error(operation)
    }
}

fn require(field: &str, value: &str) -> Cons3rtResult<()> {
    if value.trim().is_empty() {
        return Err(Cons3rtError::validation_error(field, "must not be empty", None));
    }
    Ok(())
}

fn validate_ipv4(field: &str, value: &str) -> Cons3rtResult<()> {
    value.parse::<Ipv4Addr>().map(|_| ()).map_err(|_| {
        Cons3rtError::validation_error(field, "not a valid IPv4 address", Some(value.to_string()))
    })
}

/// Accepts `a.b.c.d/n` with `n <= 32`.
pub fn validate_cidr(cidr: &str) -> Cons3rtResult<()> {
    let valid = cidr
        .split_once('/')
        .map(|(ip, prefix)| {
            ip.parse::<Ipv4Addr>().is_ok() && prefix.parse::<u8>().map_or(false, |p| p <= 32)
        })
        .unwrap_or(false);
    if valid {
        Ok(())
    } else {
        Err(Cons3rtError::validation_error(
            "cidr_blocks",
            "expected an IPv4 CIDR block such as 192.168.1.2/32",
            Some(cidr.to_string()),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_cidr() {
        assert!(validate_cidr("192.168.1.2/32").is_ok());
        assert!(validate_cidr("0.0.0.0/0").is_ok());
        assert!(validate_cidr("192.168.1.2").is_err());
        assert!(validate_cidr("192.168.1.2/33").is_err());
        assert!(validate_cidr("example.com/24").is_err());
    }

    #[test]
    fn test_attach_request_defaults() {
        let request = AttachEniRequest::new("private-a", vec!["sg-1".into()]);
        assert_eq!(request.device_index, 2);
        assert!(request.allocation_id.is_none());
        assert_eq!(request.with_allocation_id("eipalloc-1").allocation_id.as_deref(), Some("eipalloc-1"));
    }
}
