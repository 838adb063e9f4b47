//! End-to-end serve tests over an in-memory transport.

use std::sync::Arc;
use std::thread;

use serde::{Deserialize, Serialize};

use gantry_funcspec::{CallArgs, FuncDef, TypedValue, ValueKey, ValueSet};
use gantry_plugin::adapter::builder::{BuilderClient, BuilderPlugin};
use gantry_plugin::adapter::OpResult;
use gantry_plugin::component::Builder;
use gantry_plugin::{CancelToken, PipeTransport};
use gantry_proto::{registry, Envelope, Message};

use super::*;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct Source {
    path: String,
}

impl Message for Source {
    const TYPE_URL: &'static str = "gantry.test.serve.Source";
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct Artifact {
    id: String,
}

impl Message for Artifact {
    const TYPE_URL: &'static str = "gantry.test.serve.Artifact";
}

#[derive(Debug, thiserror::Error)]
#[error("serve test error")]
struct BuildError;

struct EchoBuilder;

impl Builder for EchoBuilder {
    fn build_func(&self) -> FuncDef {
        FuncDef::from_fn("build", |src: Arc<Source>| -> Result<Artifact, BuildError> {
            Ok(Artifact {
                id: format!("built:{}", src.path),
            })
        })
    }
}

#[test]
fn serve_answers_component_calls() {
    registry::register::<Source>().expect("register");
    registry::register::<Artifact>().expect("register");

    let (host_side, plugin_side) = PipeTransport::pair();

    // The plugin serves on one end in its own thread, like a child
    // process would.
    let plugin_thread = thread::spawn(move || {
        let config = ServeConfig::new("echo-builder")
            .with_server(BuilderPlugin::new(Arc::new(EchoBuilder)).into_server());
        serve(config, Arc::new(plugin_side)).expect("serve")
    });

    // Host end: handshake, start, build through the stub.
    let host = gantry_plugin::Connection::new(Arc::new(host_side));
    host.handshake().expect("host handshake");
    host.start();

    let handle = plugin_thread.join().expect("plugin thread");

    let client = BuilderClient::new(Arc::clone(&host));
    let func = client.build_func().expect("build func");

    let mut values = ValueSet::new().with(CancelToken::new());
    values.insert(TypedValue::with_key(
        ValueKey::typed::<Envelope>().with_subtype(Source::TYPE_URL),
        Envelope::encode(&Source { path: "api".into() }).expect("encode"),
    ));

    let outputs = func.invoke(&values).expect("invoke");
    let result = outputs[0]
        .value()
        .downcast_ref::<OpResult>()
        .expect("op result");
    let artifact: Artifact = result
        .0
        .result
        .as_ref()
        .expect("envelope")
        .decode()
        .expect("decode");
    assert_eq!(artifact.id, "built:api");

    handle.shutdown();
}

#[test]
fn serve_registers_the_mapper_service() {
    registry::register::<Source>().expect("register");
    registry::register::<Artifact>().expect("register");

    let converter = FuncDef::from_fn(
        "source_to_artifact",
        |src: Arc<Source>| -> Result<Artifact, BuildError> {
            Ok(Artifact {
                id: src.path.clone(),
            })
        },
    );

    let (host_side, plugin_side) = PipeTransport::pair();
    let plugin_thread = thread::spawn(move || {
        let config = ServeConfig::new("mapper-only").with_mappers(vec![converter]);
        serve(config, Arc::new(plugin_side)).expect("serve")
    });

    let host = gantry_plugin::Connection::new(Arc::new(host_side));
    host.handshake().expect("host handshake");
    host.start();
    let handle = plugin_thread.join().expect("plugin thread");

    let mappers = gantry_plugin::mapper::MapperClient::new(Arc::clone(&host))
        .mappers()
        .expect("list mappers");
    assert_eq!(mappers.len(), 1);
    assert_eq!(mappers[0].name(), "source_to_artifact");

    handle.shutdown();
}

#[test]
fn reattach_map_is_consulted_for_the_plugin_name() {
    // Set and clear within one test to avoid cross-test env races.
    std::env::set_var(
        gantry_proto::handshake::REATTACH_ENV_VAR,
        r#"{"docker": "127.0.0.1:4200", "k8s": "127.0.0.1:4300"}"#,
    );
    let address = reattach_address("docker").expect("parse");
    assert_eq!(address.as_deref(), Some("127.0.0.1:4200"));
    assert_eq!(reattach_address("nomad").expect("parse"), None);

    std::env::set_var(gantry_proto::handshake::REATTACH_ENV_VAR, "not json");
    assert!(reattach_address("docker").is_err());

    std::env::remove_var(gantry_proto::handshake::REATTACH_ENV_VAR);
    assert_eq!(reattach_address("docker").expect("unset"), None);
}

#[test]
fn call_args_type_is_reexported_for_receivers() {
    // Compile-surface check: the facade exposes what a host integration
    // needs to build custom receivers.
    let _ = |args: CallArgs| args.0.len();
}
