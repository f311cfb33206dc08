//! Prints the CustomResourceDefinitions of every kind as a multi-document YAML stream.
//!
//! ```bash
//! cargo run --bin crdgen > config/crd/all.yaml
//! ```

use anyhow::Result;
use kube::CustomResourceExt;

use cloud_manager::crd::{IpRange, Network, Nuke, Subscription};

fn main() -> Result<()> {
    let crds = [Subscription::crd(), Network::crd(), IpRange::crd(), Nuke::crd()];
    for crd in crds {
        print!("---\n{}", serde_yaml::to_string(&crd)?);
    }
    Ok(())
}
