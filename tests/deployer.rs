//! Orchestrator tests against an in-memory fake cloud
//!
//! One shared fake implements all four capability traits and records every
//! mutation, so these tests can assert the resulting resource state:
//! idempotency of repeated installs, policy composition, code-only updates,
//! gateway wiring, and fail-fast ordering.

use async_trait::async_trait;
use serde_json::Value;
use skylift::config::{ApiGatewayConfig, StageEntry};
use skylift::provision::{
    bucket, gateway, role, BucketOutcome, ComputeService, Deployer, FunctionOutcome, FunctionSpec,
    GatewayResource, GatewayService, IdentityService, ProvisionError, Role, RoleOutcome,
    StorageService,
};
use std::collections::{BTreeMap, BTreeSet};
use std::io::Write;
use std::sync::{Arc, Mutex};

const ACCOUNT: &str = "123456789012";

#[derive(Debug, Clone)]
struct IntegrationRecord {
    api_id: String,
    resource_id: String,
    uri: String,
    credentials_arn: String,
    region: String,
}

#[derive(Debug, Default)]
struct CloudState {
    buckets: BTreeSet<(String, String)>,
    bucket_creates: Vec<(String, Option<String>)>,
    objects: BTreeMap<(String, String), Vec<u8>>,
    roles: BTreeMap<String, String>,
    trust_documents: BTreeMap<String, Value>,
    policies: BTreeMap<String, Value>,
    attachments: Vec<(String, String)>,
    functions: BTreeMap<String, FunctionSpec>,
    code_updates: Vec<(String, String, String, String)>,
    apis: BTreeMap<String, String>,
    gateway_resources: BTreeMap<String, Vec<GatewayResource>>,
    methods: Vec<(String, String)>,
    integrations: Vec<IntegrationRecord>,
    deployments: Vec<(String, String, String)>,
    remote_calls: usize,
    // Fault injection
    function_propagation_failures: u32,
    fail_function_create_for: Option<String>,
}

#[derive(Clone, Default)]
struct FakeCloud(Arc<Mutex<CloudState>>);

impl FakeCloud {
    fn state(&self) -> std::sync::MutexGuard<'_, CloudState> {
        self.0.lock().unwrap()
    }

    fn deployer(&self) -> Deployer<FakeCloud, FakeCloud, FakeCloud, FakeCloud> {
        Deployer {
            storage: self.clone(),
            identity: self.clone(),
            compute: self.clone(),
            gateway: self.clone(),
        }
    }
}

fn role_arn(name: &str) -> String {
    format!("arn:aws:iam::{ACCOUNT}:role/{name}")
}

#[async_trait]
impl StorageService for FakeCloud {
    async fn bucket_exists(&self, name: &str, region: &str) -> Result<bool, ProvisionError> {
        let mut state = self.state();
        state.remote_calls += 1;
        Ok(state.buckets.contains(&(name.to_string(), region.to_string())))
    }

    async fn create_bucket(
        &self,
        name: &str,
        location_constraint: Option<&str>,
    ) -> Result<(), ProvisionError> {
        let mut state = self.state();
        state.remote_calls += 1;
        let region = location_constraint.unwrap_or("us-east-1").to_string();
        state.buckets.insert((name.to_string(), region));
        state
            .bucket_creates
            .push((name.to_string(), location_constraint.map(String::from)));
        Ok(())
    }

    async fn put_object(
        &self,
        bucket: &str,
        key: &str,
        bytes: Vec<u8>,
        _region: &str,
    ) -> Result<(), ProvisionError> {
        let mut state = self.state();
        state.remote_calls += 1;
        state
            .objects
            .insert((bucket.to_string(), key.to_string()), bytes);
        Ok(())
    }
}

#[async_trait]
impl IdentityService for FakeCloud {
    async fn create_role(
        &self,
        name: &str,
        trust_document: &Value,
    ) -> Result<RoleOutcome, ProvisionError> {
        let mut state = self.state();
        state.remote_calls += 1;
        if state.roles.contains_key(name) {
            return Ok(RoleOutcome::AlreadyExists);
        }
        let arn = role_arn(name);
        state.roles.insert(name.to_string(), arn.clone());
        state
            .trust_documents
            .insert(name.to_string(), trust_document.clone());
        Ok(RoleOutcome::Created(Role {
            name: name.to_string(),
            arn,
        }))
    }

    async fn get_role(&self, name: &str) -> Result<Role, ProvisionError> {
        let mut state = self.state();
        state.remote_calls += 1;
        let arn = state
            .roles
            .get(name)
            .cloned()
            .ok_or_else(|| ProvisionError::Remote {
                resource: name.to_string(),
                code: Some("NoSuchEntity".to_string()),
                message: "role not found".to_string(),
            })?;
        Ok(Role {
            name: name.to_string(),
            arn,
        })
    }

    async fn create_policy(&self, name: &str, document: &Value) -> Result<String, ProvisionError> {
        let mut state = self.state();
        state.remote_calls += 1;
        state.policies.insert(name.to_string(), document.clone());
        Ok(format!("arn:aws:iam::{ACCOUNT}:policy/{name}"))
    }

    async fn attach_role_policy(
        &self,
        role_name: &str,
        policy_arn: &str,
    ) -> Result<(), ProvisionError> {
        let mut state = self.state();
        state.remote_calls += 1;
        state
            .attachments
            .push((role_name.to_string(), policy_arn.to_string()));
        Ok(())
    }

    async fn caller_identity(&self) -> Result<String, ProvisionError> {
        let mut state = self.state();
        state.remote_calls += 1;
        Ok(format!("arn:aws:iam::{ACCOUNT}:user/deployer"))
    }
}

#[async_trait]
impl ComputeService for FakeCloud {
    async fn create_function(&self, spec: &FunctionSpec) -> Result<FunctionOutcome, ProvisionError> {
        let mut state = self.state();
        state.remote_calls += 1;
        if state.function_propagation_failures > 0 {
            state.function_propagation_failures -= 1;
            return Err(ProvisionError::NotYetPropagated {
                resource: spec.role_arn.clone(),
                message: "role cannot be assumed".to_string(),
            });
        }
        if state.fail_function_create_for.as_deref() == Some(spec.function_name.as_str()) {
            return Err(ProvisionError::Remote {
                resource: spec.function_name.clone(),
                code: Some("AccessDeniedException".to_string()),
                message: "not authorized".to_string(),
            });
        }
        if state.functions.contains_key(&spec.function_name) {
            return Ok(FunctionOutcome::AlreadyExists);
        }
        state
            .functions
            .insert(spec.function_name.clone(), spec.clone());
        Ok(FunctionOutcome::Created)
    }

    async fn update_function_code(
        &self,
        function_name: &str,
        bucket: &str,
        key: &str,
        region: &str,
    ) -> Result<(), ProvisionError> {
        let mut state = self.state();
        state.remote_calls += 1;
        if !state.functions.contains_key(function_name) {
            return Err(ProvisionError::Remote {
                resource: function_name.to_string(),
                code: Some("ResourceNotFoundException".to_string()),
                message: "function not found".to_string(),
            });
        }
        state.code_updates.push((
            function_name.to_string(),
            bucket.to_string(),
            key.to_string(),
            region.to_string(),
        ));
        Ok(())
    }
}

#[async_trait]
impl GatewayService for FakeCloud {
    async fn create_rest_api(&self, name: &str, _region: &str) -> Result<String, ProvisionError> {
        let mut state = self.state();
        state.remote_calls += 1;
        let api_id = format!("api{}", state.apis.len() + 1);
        state.apis.insert(api_id.clone(), name.to_string());
        state.gateway_resources.insert(
            api_id.clone(),
            vec![GatewayResource {
                id: "root1".to_string(),
                path: "/".to_string(),
            }],
        );
        Ok(api_id)
    }

    async fn list_resources(
        &self,
        api_id: &str,
        _region: &str,
    ) -> Result<Vec<GatewayResource>, ProvisionError> {
        let mut state = self.state();
        state.remote_calls += 1;
        Ok(state
            .gateway_resources
            .get(api_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn create_resource(
        &self,
        api_id: &str,
        _parent_id: &str,
        path_part: &str,
        _region: &str,
    ) -> Result<String, ProvisionError> {
        let mut state = self.state();
        state.remote_calls += 1;
        let id = format!("res{}", state.remote_calls);
        state
            .gateway_resources
            .entry(api_id.to_string())
            .or_default()
            .push(GatewayResource {
                id: id.clone(),
                path: format!("/{path_part}"),
            });
        Ok(id)
    }

    async fn put_method(
        &self,
        api_id: &str,
        resource_id: &str,
        _region: &str,
    ) -> Result<(), ProvisionError> {
        let mut state = self.state();
        state.remote_calls += 1;
        state
            .methods
            .push((api_id.to_string(), resource_id.to_string()));
        Ok(())
    }

    async fn put_integration(
        &self,
        api_id: &str,
        resource_id: &str,
        integration_uri: &str,
        credentials_arn: &str,
        region: &str,
    ) -> Result<(), ProvisionError> {
        let mut state = self.state();
        state.remote_calls += 1;
        state.integrations.push(IntegrationRecord {
            api_id: api_id.to_string(),
            resource_id: resource_id.to_string(),
            uri: integration_uri.to_string(),
            credentials_arn: credentials_arn.to_string(),
            region: region.to_string(),
        });
        Ok(())
    }

    async fn create_deployment(
        &self,
        api_id: &str,
        stage: &str,
        region: &str,
    ) -> Result<(), ProvisionError> {
        let mut state = self.state();
        state.remote_calls += 1;
        state.deployments.push((
            api_id.to_string(),
            stage.to_string(),
            region.to_string(),
        ));
        Ok(())
    }
}

fn entry() -> StageEntry {
    serde_yaml::from_str(
        r#"
function_name: f1
handler: app.handler
region: eu-west-1
bucket: b1
object_key: k1
"#,
    )
    .unwrap()
}

fn artifact_file() -> tempfile::NamedTempFile {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(b"artifact-bytes").unwrap();
    file
}

#[tokio::test]
async fn install_provisions_role_bucket_artifact_and_function() {
    let cloud = FakeCloud::default();
    let artifact = artifact_file();

    cloud
        .deployer()
        .install("test", &[entry()], artifact.path())
        .await
        .unwrap();

    let state = cloud.state();
    assert!(state
        .buckets
        .contains(&("b1".to_string(), "eu-west-1".to_string())));
    assert_eq!(state.roles.get("f1-role"), Some(&role_arn("f1-role")));

    // Policy contains exactly the baseline statements
    let policy = state.policies.get("f1-policy").unwrap();
    let statements = policy["Statement"].as_array().unwrap();
    assert_eq!(statements.len(), 1);
    assert_eq!(statements[0]["Action"][0], "logs:CreateLogGroup");

    // Trust scoped to the compute service
    let trust = state.trust_documents.get("f1-role").unwrap();
    assert_eq!(
        trust["Statement"][0]["Principal"]["Service"],
        "lambda.amazonaws.com"
    );

    assert_eq!(
        state.objects.get(&("b1".to_string(), "k1".to_string())),
        Some(&b"artifact-bytes".to_vec())
    );

    let function = state.functions.get("f1").unwrap();
    assert_eq!(function.bucket, "b1");
    assert_eq!(function.object_key, "k1");
    assert_eq!(function.role_arn, role_arn("f1-role"));
    assert_eq!(function.memory_size, 128);
    assert_eq!(function.timeout, 60);
}

#[tokio::test]
async fn install_twice_produces_exactly_one_of_each_resource() {
    let cloud = FakeCloud::default();
    let artifact = artifact_file();
    let deployer = cloud.deployer();

    deployer.install("test", &[entry()], artifact.path()).await.unwrap();
    deployer.install("test", &[entry()], artifact.path()).await.unwrap();

    let state = cloud.state();
    assert_eq!(state.buckets.len(), 1);
    assert_eq!(state.bucket_creates.len(), 1);
    assert_eq!(state.roles.len(), 1);
    assert_eq!(state.policies.len(), 1);
    assert_eq!(state.functions.len(), 1);
    // Second run fell back to a code update on the existing function
    assert_eq!(state.code_updates.len(), 1);
}

#[tokio::test]
async fn preexisting_bucket_is_skipped_without_error() {
    let cloud = FakeCloud::default();
    cloud
        .state()
        .buckets
        .insert(("b1".to_string(), "eu-west-1".to_string()));

    let outcome = bucket::ensure_bucket(&cloud, "b1", "eu-west-1").await.unwrap();
    assert_eq!(outcome, BucketOutcome::Skipped);
    assert!(cloud.state().bucket_creates.is_empty());

    let artifact = artifact_file();
    cloud
        .deployer()
        .install("test", &[entry()], artifact.path())
        .await
        .unwrap();
    let state = cloud.state();
    assert_eq!(state.buckets.len(), 1);
    assert!(state.bucket_creates.is_empty());
}

#[tokio::test]
async fn bucket_outside_default_region_gets_location_constraint() {
    let cloud = FakeCloud::default();
    bucket::ensure_bucket(&cloud, "b1", "eu-west-1").await.unwrap();
    bucket::ensure_bucket(&cloud, "b2", "us-east-1").await.unwrap();

    let state = cloud.state();
    assert_eq!(
        state.bucket_creates,
        vec![
            ("b1".to_string(), Some("eu-west-1".to_string())),
            ("b2".to_string(), None),
        ]
    );
}

#[tokio::test]
async fn caller_statements_follow_baseline_in_order() {
    let cloud = FakeCloud::default();
    let statements: Vec<skylift::config::PolicyStatement> = serde_yaml::from_str(
        r#"
- effect: Allow
  action: ["s3:GetObject"]
  resource: ["arn:aws:s3:::b1/*"]
- effect: Deny
  action: ["s3:DeleteObject"]
  resource: ["*"]
"#,
    )
    .unwrap();

    role::ensure_role_and_policy(&cloud, "f1-role", "f1-policy", "lambda.amazonaws.com", &statements)
        .await
        .unwrap();

    let state = cloud.state();
    let policy = state.policies.get("f1-policy").unwrap();
    let doc = policy["Statement"].as_array().unwrap();
    assert_eq!(doc.len(), 3);
    assert_eq!(doc[0]["Action"][0], "logs:CreateLogGroup");
    assert_eq!(doc[1]["Action"][0], "s3:GetObject");
    assert_eq!(doc[2]["Effect"], "Deny");
}

#[tokio::test]
async fn existing_role_is_reused_and_policy_left_alone() {
    let cloud = FakeCloud::default();
    cloud
        .state()
        .roles
        .insert("f1-role".to_string(), role_arn("f1-role"));

    let artifact = artifact_file();
    cloud
        .deployer()
        .install("test", &[entry()], artifact.path())
        .await
        .unwrap();

    let state = cloud.state();
    // Policy creation and attachment are skipped on the reuse path
    assert!(state.policies.is_empty());
    assert!(state.attachments.is_empty());
    assert_eq!(state.functions.get("f1").unwrap().role_arn, role_arn("f1-role"));
}

#[tokio::test]
async fn update_replaces_code_and_leaves_configuration_untouched() {
    let cloud = FakeCloud::default();
    let artifact = artifact_file();
    let deployer = cloud.deployer();
    deployer.install("test", &[entry()], artifact.path()).await.unwrap();

    let before = cloud.state().functions.get("f1").unwrap().clone();

    // Operator edits configuration, then runs update: only the code moves
    let mut changed = entry();
    changed.memory_size = 1024;
    changed.timeout = 300;
    changed.handler = "app.other_handler".to_string();
    changed.object_key = "k2".to_string();

    deployer.update("test", &[changed], artifact.path()).await.unwrap();

    let state = cloud.state();
    let after = state.functions.get("f1").unwrap();
    assert_eq!(after.memory_size, before.memory_size);
    assert_eq!(after.timeout, before.timeout);
    assert_eq!(after.handler, before.handler);
    assert_eq!(after.role_arn, before.role_arn);

    assert_eq!(
        state.code_updates,
        vec![(
            "f1".to_string(),
            "b1".to_string(),
            "k2".to_string(),
            "eu-west-1".to_string()
        )]
    );
    assert_eq!(
        state.objects.get(&("b1".to_string(), "k2".to_string())),
        Some(&b"artifact-bytes".to_vec())
    );
}

#[tokio::test]
async fn gateway_wiring_produces_the_documented_uri_and_url() {
    let cloud = FakeCloud::default();
    let artifact = artifact_file();
    let mut gw_entry = entry();
    gw_entry.api_gateway = Some(ApiGatewayConfig {
        name: "DemoApi".to_string(),
    });

    cloud
        .deployer()
        .install("test", &[gw_entry], artifact.path())
        .await
        .unwrap();

    let state = cloud.state();
    assert_eq!(state.apis.values().next().map(String::as_str), Some("DemoApi"));

    // One proxy resource, one ANY method, one integration, one deployment
    let api_id = state.apis.keys().next().unwrap().clone();
    let resources = state.gateway_resources.get(&api_id).unwrap();
    assert!(resources.iter().any(|r| r.path == "/{proxy+}"));
    assert_eq!(state.methods.len(), 1);
    assert_eq!(state.integrations.len(), 1);

    let integration = &state.integrations[0];
    assert_eq!(
        integration.uri,
        format!(
            "arn:aws:apigateway:eu-west-1:lambda:path/2015-03-31/functions/\
             arn:aws:lambda:eu-west-1:{ACCOUNT}:function:f1/invocations"
        )
    );
    assert_eq!(integration.credentials_arn, role_arn("DemoApi-invoke"));
    assert_eq!(integration.region, "eu-west-1");

    // Invocation role is trusted by the gateway service and scoped to the function
    let trust = state.trust_documents.get("DemoApi-invoke").unwrap();
    assert_eq!(
        trust["Statement"][0]["Principal"]["Service"],
        "apigateway.amazonaws.com"
    );
    let invoke_policy = state.policies.get("DemoApi-invoke-policy").unwrap();
    let statements = invoke_policy["Statement"].as_array().unwrap();
    assert_eq!(statements[1]["Action"][0], "lambda:InvokeFunction");
    assert_eq!(
        statements[1]["Resource"][0],
        format!("arn:aws:lambda:eu-west-1:{ACCOUNT}:function:f1")
    );

    // Deployment targets the entry's region, not a hard-coded one
    assert_eq!(
        state.deployments,
        vec![(api_id.clone(), "api".to_string(), "eu-west-1".to_string())]
    );
}

#[tokio::test]
async fn wire_returns_the_invocation_url() {
    let cloud = FakeCloud::default();
    let url = gateway::wire(&cloud, &cloud, "DemoApi", "eu-west-1", "f1")
        .await
        .unwrap();
    assert_eq!(url, "https://api1.execute-api.eu-west-1.amazonaws.com/api");
}

#[tokio::test]
async fn invalid_entry_is_rejected_before_any_remote_call() {
    let cloud = FakeCloud::default();
    let artifact = artifact_file();
    let mut bad = entry();
    bad.bucket = String::new();

    let err = cloud
        .deployer()
        .install("test", &[bad], artifact.path())
        .await
        .unwrap_err();

    assert!(matches!(err, ProvisionError::Configuration(_)));
    assert_eq!(cloud.state().remote_calls, 0);
}

#[tokio::test(start_paused = true)]
async fn function_create_retries_through_propagation_lag() {
    let cloud = FakeCloud::default();
    cloud.state().function_propagation_failures = 2;
    let artifact = artifact_file();

    cloud
        .deployer()
        .install("test", &[entry()], artifact.path())
        .await
        .unwrap();

    assert!(cloud.state().functions.contains_key("f1"));
}

#[tokio::test]
async fn first_fatal_error_halts_remaining_entries() {
    let cloud = FakeCloud::default();
    cloud.state().fail_function_create_for = Some("f1".to_string());
    let artifact = artifact_file();

    let mut second = entry();
    second.function_name = "f2".to_string();
    second.bucket = "b2".to_string();

    let err = cloud
        .deployer()
        .install("test", &[entry(), second], artifact.path())
        .await
        .unwrap_err();

    assert!(matches!(err, ProvisionError::Remote { .. }));
    let state = cloud.state();
    // Entry one got as far as the function; entry two was never started
    assert!(state.buckets.contains(&("b1".to_string(), "eu-west-1".to_string())));
    assert!(!state.buckets.contains(&("b2".to_string(), "eu-west-1".to_string())));
    assert!(state.roles.contains_key("f1-role"));
    assert!(!state.roles.contains_key("f2-role"));
}
