//! Integration: a platform operation that manages real resources and
//! reports them back through the operation response.

use std::sync::Arc;
use std::thread;

use serde::{Deserialize, Serialize};

use gantry_funcspec::{FuncDef, TypedValue, ValueKey, ValueSet};
use gantry_plugin::adapter::platform::{PlatformClient, PlatformPlugin};
use gantry_plugin::adapter::OpResult;
use gantry_plugin::component::Platform;
use gantry_plugin::{CancelToken, Connection, DeclaredCollector, PipeTransport};
use gantry_proto::{registry, Envelope, Message, ResourceCategory};
use gantry_resource::{Manager, Resource};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct Artifact {
    image: String,
}

impl Message for Artifact {
    const TYPE_URL: &'static str = "gantry.itest.resource_ops.Artifact";
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct Deployment {
    url: String,
}

impl Message for Deployment {
    const TYPE_URL: &'static str = "gantry.itest.resource_ops.Deployment";
}

#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
struct NetworkState {
    subnet: String,
}

impl Message for NetworkState {
    const TYPE_URL: &'static str = "gantry.itest.resource_ops.NetworkState";
}

#[derive(Debug, thiserror::Error)]
#[error("deploy failed: {0}")]
struct DeployError(String);

struct ResourcefulPlatform;

impl Platform for ResourcefulPlatform {
    fn deploy_func(&self) -> FuncDef {
        FuncDef::from_fn(
            "deploy",
            |artifact: Arc<Artifact>,
             declared: DeclaredCollector|
             -> Result<Deployment, DeployError> {
                let mut manager = Manager::new()
                    .with_declared_resources_resp(Arc::clone(&declared.0))
                    .with_resource(
                        Resource::new("network")
                            .with_type("bridge network")
                            .with_platform("docker")
                            .with_category(ResourceCategory::Router)
                            .with_state::<NetworkState>()
                            .with_create(|| -> Result<NetworkState, DeployError> {
                                Ok(NetworkState {
                                    subnet: "10.0.0.0/24".into(),
                                })
                            }),
                    )
                    .with_resource(
                        Resource::new("container")
                            .with_type("container")
                            .with_platform("docker")
                            .with_category(ResourceCategory::Instance)
                            .with_create(|net: Arc<NetworkState>| -> Result<(), DeployError> {
                                let _ = net.subnet.as_str();
                                Ok(())
                            }),
                    );

                manager
                    .create_all(ValueSet::new())
                    .map_err(|err| DeployError(err.to_string()))?;

                Ok(Deployment {
                    url: format!("https://{}", artifact.image),
                })
            },
        )
    }
}

fn connected_pair() -> (Arc<Connection>, Arc<Connection>) {
    let (a, b) = PipeTransport::pair();
    let host = Connection::new(Arc::new(a));
    let plugin = Connection::new(Arc::new(b));

    let far = Arc::clone(&plugin);
    let handle = thread::spawn(move || far.handshake());
    host.handshake().expect("host handshake");
    handle.join().expect("thread").expect("plugin handshake");

    host.start();
    plugin.start();
    (host, plugin)
}

#[test]
fn deploy_reports_declared_resources_in_the_response() {
    registry::register::<Artifact>().expect("register");
    registry::register::<Deployment>().expect("register");
    registry::register::<NetworkState>().expect("register");

    let (host, plugin) = connected_pair();
    PlatformPlugin::new(Arc::new(ResourcefulPlatform))
        .into_server()
        .serve_on(&plugin);

    let client = PlatformClient::new(host);
    let func = client.deploy_func().expect("deploy func");

    let mut values = ValueSet::new().with(CancelToken::new());
    values.insert(TypedValue::with_key(
        ValueKey::typed::<Envelope>().with_subtype(Artifact::TYPE_URL),
        Envelope::encode(&Artifact {
            image: "web:latest".into(),
        })
        .expect("encode"),
    ));

    let outputs = func.invoke(&values).expect("deploy");
    let result = outputs[0]
        .value()
        .downcast_ref::<OpResult>()
        .expect("op result");
    let response = &result.0;

    let deployment: Deployment = response
        .result
        .as_ref()
        .expect("result envelope")
        .decode()
        .expect("decode");
    assert_eq!(deployment.url, "https://web:latest");

    assert_eq!(response.declared_resources.len(), 2);
    let network = response
        .declared_resources
        .iter()
        .find(|r| r.name == "network")
        .expect("network resource");
    assert_eq!(network.resource_type, "bridge network");
    assert_eq!(network.platform, "docker");
    assert_eq!(network.category_display_hint, ResourceCategory::Router);
    let state: NetworkState = network
        .state
        .as_ref()
        .expect("network state")
        .decode()
        .expect("decode state");
    assert_eq!(state.subnet, "10.0.0.0/24");

    let container = response
        .declared_resources
        .iter()
        .find(|r| r.name == "container")
        .expect("container resource");
    assert!(container.state.is_none());
    assert!(response.destroyed_resources.is_empty());
}
