use kube::CustomResourceExt as _;
use kogito::api::v1beta1::{KogitoInfra, KogitoRuntime, KogitoSupportingService};

fn main() {
    print!("{}", serde_yaml::to_string(&KogitoRuntime::crd()).unwrap());
    println!("---");
    print!("{}", serde_yaml::to_string(&KogitoSupportingService::crd()).unwrap());
    println!("---");
    print!("{}", serde_yaml::to_string(&KogitoInfra::crd()).unwrap());
}
