//! End-to-end adapter tests over an in-memory connection.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;

use serde::{Deserialize, Serialize};
use serde_json::json;

use gantry_funcspec::{FuncDef, TypedValue, ValueKey, ValueSet};
use gantry_proto::{registry as type_registry, AuthResult, Envelope, Message};

use super::builder::{BuilderClient, BuilderPlugin};
use super::platform::{PlatformClient, PlatformPlugin};
use super::*;
use crate::component::{Authenticator, Builder, Platform};
use crate::wire::PipeTransport;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct Source {
    path: String,
}

impl Message for Source {
    const TYPE_URL: &'static str = "gantry.test.adapter.Source";
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct Artifact {
    id: String,
    size: u64,
}

impl Message for Artifact {
    const TYPE_URL: &'static str = "gantry.test.adapter.Artifact";
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct Deployment {
    url: String,
}

impl Message for Deployment {
    const TYPE_URL: &'static str = "gantry.test.adapter.Deployment";
}

#[derive(Debug, thiserror::Error)]
#[error("adapter test error: {0}")]
struct OpError(String);

fn register_messages() {
    type_registry::register::<Source>().expect("register source");
    type_registry::register::<Artifact>().expect("register artifact");
    type_registry::register::<Deployment>().expect("register deployment");
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

struct DockerBuilder;

impl Builder for DockerBuilder {
    fn build_func(&self) -> FuncDef {
        FuncDef::from_fn(
            "build",
            |src: Arc<Source>, logger: Logger| -> Result<Artifact, OpError> {
                logger.debug("building");
                Ok(Artifact {
                    id: format!("img:{}", src.path),
                    size: 64,
                })
            },
        )
    }
}

struct StaticAuth {
    called: Arc<AtomicBool>,
}

impl Authenticator for StaticAuth {
    fn auth_func(&self) -> FuncDef {
        let called = Arc::clone(&self.called);
        FuncDef::from_fn("auth", move || -> Result<AuthResult, OpError> {
            called.store(true, Ordering::SeqCst);
            Ok(AuthResult {
                authenticated: true,
            })
        })
    }

    fn validate_auth_func(&self) -> FuncDef {
        FuncDef::from_fn("validate_auth", || {})
    }
}

fn call_values(source: &Source) -> ValueSet {
    let mut values = ValueSet::new().with(CancelToken::new());
    values.insert(TypedValue::with_key(
        ValueKey::typed::<Envelope>().with_subtype(Source::TYPE_URL),
        Envelope::encode(source).expect("encode source"),
    ));
    values
}

// ---------------------------------------------------------------------------
// Operations end to end
// ---------------------------------------------------------------------------

#[test]
fn build_round_trips_through_the_adapter() {
    register_messages();
    type_registry::register::<AuthResult>().expect("register auth result");

    let (host, plugin) = connected_pair();
    BuilderPlugin::new(Arc::new(DockerBuilder))
        .into_server()
        .serve_on(&plugin);

    let client = BuilderClient::new(host);
    let spec = client.component().op_spec("build").expect("spec");
    assert_eq!(spec.args.len(), 1);
    assert_eq!(
        spec.args[0].kind,
        gantry_proto::ArgKind::Message {
            type_url: Source::TYPE_URL.to_owned()
        }
    );

    let func = client.build_func().expect("build func");
    let outputs = func
        .invoke(&call_values(&Source {
            path: "web".into(),
        }))
        .expect("invoke");

    let result = outputs[0]
        .value()
        .downcast_ref::<OpResult>()
        .expect("op result");
    let response = &result.0;
    let artifact: Artifact = response
        .result
        .as_ref()
        .expect("result envelope")
        .decode()
        .expect("decode artifact");
    assert_eq!(artifact.id, "img:web");
    assert!(response.result_json.contains("img:web"));
    assert_eq!(
        response.template_data.get("id"),
        Some(&json!("img:web"))
    );
    assert_eq!(
        response.template_data.get("size"),
        Some(&json!(64))
    );
}

#[test]
fn specs_are_cached_until_invalidated() {
    register_messages();
    let (host, plugin) = connected_pair();
    BuilderPlugin::new(Arc::new(DockerBuilder))
        .into_server()
        .serve_on(&plugin);

    let client = BuilderClient::new(host);
    let first = client.component().op_spec("build").expect("spec");
    // Even with the plugin gone, the cached spec answers.
    plugin.close();
    let second = client.component().op_spec("build").expect("cached spec");
    assert_eq!(first, second);

    client.component().invalidate_specs();
    assert!(client.component().op_spec("build").is_err());
}

// ---------------------------------------------------------------------------
// Capability probing
// ---------------------------------------------------------------------------

#[test]
fn probes_reflect_registered_capabilities() {
    register_messages();
    type_registry::register::<AuthResult>().expect("register auth result");

    let (host, plugin) = connected_pair();
    let called = Arc::new(AtomicBool::new(false));
    BuilderPlugin::new(Arc::new(DockerBuilder))
        .with_capabilities(Capabilities::new().with_authenticator(Arc::new(StaticAuth {
            called: Arc::clone(&called),
        })))
        .into_server()
        .serve_on(&plugin);

    let client = BuilderClient::new(host);
    assert!(client.component().has_capability("authenticator").expect("probe"));
    assert!(!client.component().has_capability("destroyer").expect("probe"));

    // And the advertised capability is callable.
    let auth = client.component().op_func("auth").expect("auth func");
    let outputs = auth
        .invoke(&ValueSet::new().with(CancelToken::new()))
        .expect("auth call");
    let result = outputs[0]
        .value()
        .downcast_ref::<OpResult>()
        .expect("op result");
    let auth_result: AuthResult = result
        .0
        .result
        .as_ref()
        .expect("envelope")
        .decode()
        .expect("decode");
    assert!(auth_result.authenticated);
    assert!(called.load(Ordering::SeqCst));
}

#[test]
fn probing_an_unserved_service_reads_as_absent() {
    let (host, _plugin) = connected_pair();
    // No platform service registered at all: the unimplemented answer is
    // "false", not a failure.
    let client = PlatformClient::new(host);
    assert!(!client.component().has_capability("execer").expect("probe"));
}

#[test]
fn absent_capability_call_is_unimplemented() {
    register_messages();
    let (host, plugin) = connected_pair();
    BuilderPlugin::new(Arc::new(DockerBuilder))
        .into_server()
        .serve_on(&plugin);

    let client = BuilderClient::new(host);
    let err = client.component().op_spec("auth").expect_err("no auth");
    assert!(err.is_unimplemented());
}

// ---------------------------------------------------------------------------
// Configuration and documentation
// ---------------------------------------------------------------------------

#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
struct DockerConfig {
    image: String,
    #[serde(default)]
    memory_mb: u64,
}

struct ConfigurableDocker {
    config: Mutex<DockerConfig>,
}

impl crate::component::Configurable for ConfigurableDocker {
    fn config_struct(&self) -> crate::config::ConfigStruct {
        crate::config::ConfigStruct::new()
            .with_field(crate::config::ConfigField::required(
                "image",
                crate::config::ConfigFieldKind::String,
            ))
            .with_field(
                crate::config::ConfigField::optional(
                    "memory_mb",
                    crate::config::ConfigFieldKind::Int,
                )
                .with_env_var("GANTRY_DOCKER_MEMORY_MB"),
            )
    }

    fn configure(&self, json: &[u8]) -> Result<(), PluginError> {
        let config: DockerConfig =
            serde_json::from_slice(json).map_err(|err| PluginError::InvalidBody {
                method: String::from("configure"),
                message: err.to_string(),
            })?;
        *self.config.lock().expect("config lock") = config;
        Ok(())
    }
}

struct DocumentedDocker;

impl crate::component::Documented for DocumentedDocker {
    fn documentation(&self) -> Result<gantry_docs::Documentation, PluginError> {
        let mut docs = gantry_docs::Documentation::new();
        docs.description("Builds OCI images with Docker.");
        Ok(docs)
    }
}

#[test]
fn configure_and_config_struct_round_trip() {
    register_messages();
    let (host, plugin) = connected_pair();

    let configurable = Arc::new(ConfigurableDocker {
        config: Mutex::new(DockerConfig::default()),
    });
    BuilderPlugin::new(Arc::new(DockerBuilder))
        .with_capabilities(
            Capabilities::new()
                .with_configurable(Arc::clone(&configurable) as Arc<dyn Configurable>)
                .with_documented(Arc::new(DocumentedDocker)),
        )
        .into_server()
        .serve_on(&plugin);

    let client = BuilderClient::new(host);

    let shape = client.component().config_struct().expect("config struct");
    assert_eq!(shape.fields.len(), 2);
    assert_eq!(shape.fields[0].name, "image");

    client
        .component()
        .configure(&json!({"image": "alpine", "memory_mb": 128}))
        .expect("configure");
    assert_eq!(
        *configurable.config.lock().expect("config lock"),
        DockerConfig {
            image: "alpine".into(),
            memory_mb: 128,
        }
    );

    let docs = client.component().documentation().expect("docs");
    assert_eq!(docs.details().description, "Builds OCI images with Docker.");
}

// ---------------------------------------------------------------------------
// Terminal UI through the standard converters
// ---------------------------------------------------------------------------

struct TalkativeBuilder;

impl Builder for TalkativeBuilder {
    fn build_func(&self) -> FuncDef {
        FuncDef::from_fn(
            "build",
            |src: Arc<Source>, ui: crate::terminal::UiHandle| -> Result<Artifact, OpError> {
                ui.0.output(&format!("building {}", src.path));
                Ok(Artifact {
                    id: src.path.clone(),
                    size: 1,
                })
            },
        )
    }
}

#[test]
fn terminal_using_op_advertises_and_uses_the_stream_id() {
    register_messages();
    let (host, plugin) = connected_pair();
    BuilderPlugin::new(Arc::new(TalkativeBuilder))
        .into_server()
        .serve_on(&plugin);

    let client = BuilderClient::new(Arc::clone(&host));

    // The derived UiHandle shows up in the spec as its converter's
    // stream-id leaf.
    let spec = client.component().op_spec("build").expect("spec");
    let names: Vec<&str> = spec.args.iter().map(|a| a.name.as_str()).collect();
    assert!(names.contains(&crate::mappers::TERMINAL_STREAM_ARG));

    // Host side: allocate the stream, serve a recording terminal on it,
    // then run the operation with the id as a named scalar.
    let stream_id = host.broker().next_id();
    let events = host.open_stream(stream_id);
    let lines = Arc::new(Mutex::new(Vec::<String>::new()));

    struct Recorder(Arc<Mutex<Vec<String>>>);
    impl crate::terminal::TerminalUi for Recorder {
        fn output(&self, line: &str) {
            self.0.lock().expect("lock").push(line.to_owned());
        }
        fn step(&self, _message: &str) {}
        fn named_values(&self, _values: &[(String, String)]) {}
    }

    let sink = Arc::clone(&lines);
    let ui_thread = thread::spawn(move || {
        crate::terminal::serve_terminal(&events, &Recorder(sink)).expect("serve terminal")
    });

    let func = client.build_func().expect("build func");
    let mut values = call_values(&Source { path: "web".into() });
    values.insert(TypedValue::with_key(
        ValueKey::typed::<u64>().with_name(crate::mappers::TERMINAL_STREAM_ARG),
        stream_id,
    ));

    let outputs = func.invoke(&values).expect("invoke");
    let result = outputs[0]
        .value()
        .downcast_ref::<OpResult>()
        .expect("op result");
    assert!(result.0.result.is_some());

    ui_thread.join().expect("ui thread");
    assert_eq!(*lines.lock().expect("lock"), vec!["building web".to_owned()]);
}

// ---------------------------------------------------------------------------
// Platform default releaser
// ---------------------------------------------------------------------------

struct BarePlatform;

impl Platform for BarePlatform {
    fn deploy_func(&self) -> FuncDef {
        FuncDef::from_fn(
            "deploy",
            |artifact: Arc<Artifact>| -> Result<Deployment, OpError> {
                Ok(Deployment {
                    url: format!("https://{}", artifact.id),
                })
            },
        )
    }
}

#[test]
fn platform_without_default_releaser_reports_none() {
    register_messages();
    let (host, plugin) = connected_pair();
    PlatformPlugin::new(Arc::new(BarePlatform))
        .into_server()
        .serve_on(&plugin);

    let client = PlatformClient::new(host);
    assert!(client
        .default_releaser_func()
        .expect("probe")
        .is_none());

    let func = client.deploy_func().expect("deploy func");
    let mut values = ValueSet::new().with(CancelToken::new());
    values.insert(TypedValue::with_key(
        ValueKey::typed::<Envelope>().with_subtype(Artifact::TYPE_URL),
        Envelope::encode(&Artifact {
            id: "img:web".into(),
            size: 1,
        })
        .expect("encode"),
    ));
    let outputs = func.invoke(&values).expect("deploy");
    let result = outputs[0]
        .value()
        .downcast_ref::<OpResult>()
        .expect("op result");
    let deployment: Deployment = result
        .0
        .result
        .as_ref()
        .expect("envelope")
        .decode()
        .expect("decode");
    assert_eq!(deployment.url, "https://img:web");
}
