//! Prints the CRD manifests for the configuration resources.
//!
//! Usage: `cargo run -p crds --bin crdgen > crds.yaml`

use crds::{Upstream, VirtualService};
use kube::CustomResourceExt;

fn main() -> Result<(), serde_yaml::Error> {
    let manifests = [Upstream::crd(), VirtualService::crd()];
    for crd in &manifests {
        println!("---");
        print!("{}", serde_yaml::to_string(crd)?);
    }
    Ok(())
}
