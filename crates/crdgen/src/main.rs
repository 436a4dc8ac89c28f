use authorino_operator::api::v1beta1::Authorino;
use kube::CustomResourceExt as _;

fn main() -> anyhow::Result<()> {
    print!("{}", serde_yaml::to_string(&Authorino::crd())?);
    Ok(())
}
