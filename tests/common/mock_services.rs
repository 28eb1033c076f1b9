//! In-memory compute provider for integration tests
//!
//! Keeps just enough state to act like a small VPC and records every call
//! so tests can assert on ordering.

use std::collections::BTreeMap;
use std::sync::Mutex;

use async_trait::async_trait;
use cons3rt_kit::infrastructure::cloud::types::{
    AddressFilter, ElasticIp, Image, IngressRule, Instance, NetworkInterface, NewNetworkInterface,
    SecurityGroup, SecurityGroupFilter, Subnet,
};
use cons3rt_kit::infrastructure::cloud::{ApiError, ApiResult, ComputeApi};

#[derive(Default)]
struct State {
    instance: Instance,
    subnets: Vec<Subnet>,
    addresses: Vec<ElasticIp>,
    security_groups: Vec<SecurityGroup>,
    images: BTreeMap<String, Image>,
    interfaces: Vec<NetworkInterface>,
    private_ips: Vec<(String, String)>,
    /// Describe calls that report a new resource as missing before it shows up.
    pending_lookups: u32,
    next_id: u32,
}

/// Recording [`ComputeApi`] backed by in-memory state.
pub struct MockComputeApi {
    state: Mutex<State>,
    calls: Mutex<Vec<String>>,
}

impl MockComputeApi {
    pub fn new(instance: Instance) -> Self {
        Self {
            state: Mutex::new(State {
                instance,
                ..Default::default()
            }),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn with_subnet(self, subnet: Subnet) -> Self {
        self.state.lock().unwrap().subnets.push(subnet);
        self
    }

    pub fn with_address(self, address: ElasticIp) -> Self {
        self.state.lock().unwrap().addresses.push(address);
        self
    }

    pub fn with_security_group(self, group: SecurityGroup) -> Self {
        self.state.lock().unwrap().security_groups.push(group);
        self
    }

    pub fn with_image(self, image: Image) -> Self {
        self.state
            .lock()
            .unwrap()
            .images
            .insert(image.image_id.clone(), image);
        self
    }

    /// New resources stay invisible for the next `count` describe calls.
    pub fn with_pending_lookups(self, count: u32) -> Self {
        self.state.lock().unwrap().pending_lookups = count;
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    /// Names of the calls, without arguments.
    pub fn call_names(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .map(|call| call.split('(').next().unwrap_or_default().to_string())
            .collect()
    }

    pub fn security_group(&self, group_id: &str) -> Option<SecurityGroup> {
        self.state
            .lock()
            .unwrap()
            .security_groups
            .iter()
            .find(|group| group.group_id == group_id)
            .cloned()
    }

    pub fn image(&self, image_id: &str) -> Option<Image> {
        self.state.lock().unwrap().images.get(image_id).cloned()
    }

    pub fn private_ips(&self) -> Vec<(String, String)> {
        self.state.lock().unwrap().private_ips.clone()
    }

    pub fn addresses(&self) -> Vec<ElasticIp> {
        self.state.lock().unwrap().addresses.clone()
    }

    fn record(&self, call: String) {
        self.calls.lock().unwrap().push(call);
    }

    fn next_id(&self, prefix: &str) -> String {
        let mut state = self.state.lock().unwrap();
        state.next_id += 1;
        format!("{prefix}-{:08x}", state.next_id)
    }

    fn still_pending(&self) -> bool {
        let mut state = self.state.lock().unwrap();
        if state.pending_lookups > 0 {
            state.pending_lookups -= 1;
            return true;
        }
        false
    }
}

fn not_found(code: &str, id: &str) -> ApiError {
    ApiError::new(400, code, format!("The ID '{id}' does not exist"))
}

#[async_trait]
impl ComputeApi for MockComputeApi {
    async fn describe_instance(&self, instance_id: &str) -> ApiResult<Instance> {
        self.record(format!("describe_instance({instance_id})"));
        let state = self.state.lock().unwrap();
        if state.instance.instance_id != instance_id {
            return Err(not_found("InvalidInstanceID.NotFound", instance_id));
        }
        Ok(state.instance.clone())
    }

    async fn find_subnets(&self, vpc_id: &str, name: &str) -> ApiResult<Vec<Subnet>> {
        self.record(format!("find_subnets({vpc_id}, {name})"));
        let state = self.state.lock().unwrap();
        Ok(state
            .subnets
            .iter()
            .filter(|subnet| subnet.vpc_id == vpc_id && subnet.name.as_deref() == Some(name))
            .cloned()
            .collect())
    }

    async fn create_network_interface(
        &self,
        request: &NewNetworkInterface,
        description: &str,
    ) -> ApiResult<NetworkInterface> {
        self.record(format!(
            "create_network_interface({}, {})",
            request.subnet_id, description
        ));
        let eni = NetworkInterface {
            eni_id: self.next_id("eni"),
            device_index: None,
            status: "available".to_string(),
            private_ip: Some("10.0.2.15".to_string()),
            public_ip: None,
            attachment_id: None,
        };
        self.state.lock().unwrap().interfaces.push(eni.clone());
        Ok(eni)
    }

    async fn describe_network_interface(&self, eni_id: &str) -> ApiResult<NetworkInterface> {
        self.record(format!("describe_network_interface({eni_id})"));
        if self.still_pending() {
            return Err(not_found("InvalidNetworkInterfaceID.NotFound", eni_id));
        }
        let state = self.state.lock().unwrap();
        state
            .interfaces
            .iter()
            .chain(state.instance.network_interfaces.iter())
            .find(|eni| eni.eni_id == eni_id)
            .cloned()
            .ok_or_else(|| not_found("InvalidNetworkInterfaceID.NotFound", eni_id))
    }

    async fn attach_network_interface(
        &self,
        eni_id: &str,
        instance_id: &str,
        device_index: u32,
    ) -> ApiResult<String> {
        self.record(format!(
            "attach_network_interface({eni_id}, {instance_id}, {device_index})"
        ));
        let attachment_id = self.next_id("eni-attach");
        let mut state = self.state.lock().unwrap();
        let position = state
            .interfaces
            .iter()
            .position(|eni| eni.eni_id == eni_id)
            .ok_or_else(|| not_found("InvalidNetworkInterfaceID.NotFound", eni_id))?;
        let mut eni = state.interfaces.remove(position);
        eni.device_index = Some(device_index);
        eni.status = "in-use".to_string();
        eni.attachment_id = Some(attachment_id.clone());
        state.instance.network_interfaces.push(eni);
        Ok(attachment_id)
    }

    async fn assign_private_ip(&self, eni_id: &str, ip_address: &str) -> ApiResult<()> {
        self.record(format!("assign_private_ip({eni_id}, {ip_address})"));
        self.state
            .lock()
            .unwrap()
            .private_ips
            .push((eni_id.to_string(), ip_address.to_string()));
        Ok(())
    }

    async fn allocate_address(&self) -> ApiResult<ElasticIp> {
        self.record("allocate_address()".to_string());
        let address = ElasticIp {
            allocation_id: self.next_id("eipalloc"),
            public_ip: "52.1.2.3".to_string(),
            association_id: None,
            instance_id: None,
        };
        self.state.lock().unwrap().addresses.push(address.clone());
        Ok(address)
    }

    async fn describe_addresses(&self, filter: &AddressFilter) -> ApiResult<Vec<ElasticIp>> {
        self.record(format!("describe_addresses({filter:?})"));
        if self.still_pending() {
            return Ok(Vec::new());
        }
        let state = self.state.lock().unwrap();
        Ok(state
            .addresses
            .iter()
            .filter(|address| match filter {
                AddressFilter::AllocationId(id) => &address.allocation_id == id,
                AddressFilter::InstanceId(id) => address.instance_id.as_ref() == Some(id),
                AddressFilter::PublicIps(ips) => ips.contains(&address.public_ip),
            })
            .cloned()
            .collect())
    }

    async fn associate_address(
        &self,
        allocation_id: &str,
        eni_id: &str,
        private_ip: Option<String>,
    ) -> ApiResult<String> {
        self.record(format!(
            "associate_address({allocation_id}, {eni_id}, {})",
            private_ip.as_deref().unwrap_or("-")
        ));
        let association_id = self.next_id("eipassoc");
        let mut state = self.state.lock().unwrap();
        let address = state
            .addresses
            .iter_mut()
            .find(|address| address.allocation_id == allocation_id)
            .ok_or_else(|| not_found("InvalidAllocationID.NotFound", allocation_id))?;
        address.association_id = Some(association_id.clone());
        Ok(association_id)
    }

    async fn disassociate_address(&self, association_id: &str) -> ApiResult<()> {
        self.record(format!("disassociate_address({association_id})"));
        let mut state = self.state.lock().unwrap();
        let address = state
            .addresses
            .iter_mut()
            .find(|address| address.association_id.as_deref() == Some(association_id))
            .ok_or_else(|| not_found("InvalidAssociationID.NotFound", association_id))?;
        address.association_id = None;
        Ok(())
    }

    async fn describe_security_groups(
        &self,
        filter: &SecurityGroupFilter,
        vpc_id: Option<String>,
    ) -> ApiResult<Vec<SecurityGroup>> {
        self.record(format!("describe_security_groups({filter:?})"));
        let state = self.state.lock().unwrap();
        Ok(state
            .security_groups
            .iter()
            .filter(|group| match filter {
                SecurityGroupFilter::GroupId(id) => &group.group_id == id,
                SecurityGroupFilter::Name(name) => &group.name == name,
            })
            .filter(|group| vpc_id.is_none() || group.vpc_id == vpc_id)
            .cloned()
            .collect())
    }

    async fn create_security_group(
        &self,
        name: &str,
        description: &str,
        vpc_id: &str,
    ) -> ApiResult<String> {
        self.record(format!("create_security_group({name}, {vpc_id})"));
        let group_id = self.next_id("sg");
        self.state.lock().unwrap().security_groups.push(SecurityGroup {
            group_id: group_id.clone(),
            name: name.to_string(),
            description: description.to_string(),
            vpc_id: Some(vpc_id.to_string()),
            ingress: Vec::new(),
        });
        Ok(group_id)
    }

    async fn revoke_ingress(&self, group_id: &str, rule: &IngressRule) -> ApiResult<()> {
        self.record(format!("revoke_ingress({group_id}, {})", rule.to_port));
        let mut state = self.state.lock().unwrap();
        if let Some(group) = state
            .security_groups
            .iter_mut()
            .find(|group| group.group_id == group_id)
        {
            group.ingress.retain(|existing| existing != rule);
        }
        Ok(())
    }

    async fn authorize_ingress(&self, group_id: &str, rule: &IngressRule) -> ApiResult<()> {
        self.record(format!("authorize_ingress({group_id}, {})", rule.to_port));
        let mut state = self.state.lock().unwrap();
        let group = state
            .security_groups
            .iter_mut()
            .find(|group| group.group_id == group_id)
            .ok_or_else(|| not_found("InvalidGroup.NotFound", group_id))?;
        group.ingress.push(rule.clone());
        Ok(())
    }

    async fn describe_image(&self, image_id: &str) -> ApiResult<Image> {
        self.record(format!("describe_image({image_id})"));
        if self.still_pending() {
            return Err(not_found("InvalidAMIID.NotFound", image_id));
        }
        self.state
            .lock()
            .unwrap()
            .images
            .get(image_id)
            .cloned()
            .ok_or_else(|| not_found("InvalidAMIID.NotFound", image_id))
    }

    async fn create_image(
        &self,
        instance_id: &str,
        name: &str,
        description: Option<String>,
    ) -> ApiResult<String> {
        self.record(format!("create_image({instance_id}, {name})"));
        let image_id = self.next_id("ami");
        self.state.lock().unwrap().images.insert(
            image_id.clone(),
            Image {
                image_id: image_id.clone(),
                name: name.to_string(),
                description,
                tags: BTreeMap::new(),
                snapshot_id: Some(format!("snap-of-{image_id}")),
            },
        );
        Ok(image_id)
    }

    async fn deregister_image(&self, image_id: &str) -> ApiResult<()> {
        self.record(format!("deregister_image({image_id})"));
        self.state
            .lock()
            .unwrap()
            .images
            .remove(image_id)
            .map(|_| ())
            .ok_or_else(|| not_found("InvalidAMIID.NotFound", image_id))
    }

    async fn create_tags(&self, resource_id: &str, tags: &BTreeMap<String, String>) -> ApiResult<()> {
        self.record(format!("create_tags({resource_id}, {})", tags.len()));
        let mut state = self.state.lock().unwrap();
        if let Some(image) = state.images.get_mut(resource_id) {
            image.tags.extend(tags.clone());
        }
        Ok(())
    }

    async fn delete_snapshot(&self, snapshot_id: &str) -> ApiResult<()> {
        self.record(format!("delete_snapshot({snapshot_id})"));
        Ok(())
    }
}
