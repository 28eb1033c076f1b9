//! Test fixtures for deployment directories and command output

use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// Properties of a two-host deployment run, as the agent writes them.
pub const DEPLOYMENT_PROPERTIES: &str = "\
# Generated by the CONS3RT agent
cons3rt.deploymentRun.name=Nightly Build
cons3rt.deploymentRun.id=4242
deployment.id=77
cons3rt.fap.deployment.machine.web.0.internalIp=10.0.0.5
cons3rt.fap.deployment.machine.db.0.internalIp=10.0.0.6
cons3rt.user=admin
SLACK_CHANNEL=#deployments
";

pub const NET_TOOLS_IFCONFIG: &str = "\
eth0      Link encap:Ethernet  HWaddr 0A:1B:2C:3D:4E:5F
          inet addr:10.0.0.6  Bcast:10.0.0.255  Mask:255.255.255.0

eth1      Link encap:Ethernet  HWaddr 0A:1B:2C:3D:4E:60
          inet addr:192.168.5.6  Bcast:192.168.5.255  Mask:255.255.255.0

lo        Link encap:Local Loopback
          inet addr:127.0.0.1  Mask:255.0.0.0
";

/// An agent run directory holding one `Deployment<id>` home.
pub struct DeploymentFixture {
    pub temp_dir: TempDir,
    pub run_dir: PathBuf,
    pub home: PathBuf,
}

impl DeploymentFixture {
    pub fn new() -> Self {
        Self::with_properties(DEPLOYMENT_PROPERTIES)
    }

    pub fn with_properties(properties: &str) -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let run_dir = temp_dir.path().join("run");
        let home = run_dir.join("Deployment4242");
        std::fs::create_dir_all(&home).expect("Failed to create deployment home");
        std::fs::write(home.join("deployment.properties"), properties)
            .expect("Failed to write deployment properties");
        Self {
            temp_dir,
            run_dir,
            home,
        }
    }

    pub fn properties_file(&self) -> PathBuf {
        self.home.join("deployment.properties")
    }

    /// Adds a second `Deployment*` directory next to the first.
    pub fn add_second_home(&self) -> PathBuf {
        let other = self.run_dir.join("Deployment9999");
        std::fs::create_dir_all(&other).expect("Failed to create second home");
        other
    }

    pub fn path(&self) -> &Path {
        self.temp_dir.path()
    }
}

impl Default for DeploymentFixture {
    fn default() -> Self {
        Self::new()
    }
}
