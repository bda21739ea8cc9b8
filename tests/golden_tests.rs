//! Golden Tests for the Generator Pipeline
//!
//! Runs the fixture models in `tests/fixtures` through every stage and checks
//! the generated crate's layout, naming, and test modules.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use smithy_codegen_client::model::{load_from_path, load_from_str};
use smithy_codegen_client::symbols::Namespace;
use smithy_codegen_client::{pipeline, CodegenSettings, Drift, Generation, ShapeId};

fn fixtures_path() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures")
}

fn settings_for(fixture: &str, module: &str) -> CodegenSettings {
    let mut settings = CodegenSettings::default();
    settings.model = Some(fixtures_path().join(fixture));
    settings.module.name = module.to_string();
    settings
}

fn generate(fixture: &str, module: &str) -> Generation {
    pipeline::generate(&settings_for(fixture, module)).unwrap()
}

fn rendered(generation: &Generation, path: &str) -> String {
    generation
        .output
        .file(path)
        .unwrap_or_else(|| panic!("{} was not generated", path))
        .render()
}

fn id(s: &str) -> ShapeId {
    ShapeId::parse(s).unwrap()
}

// =============================================================================
// Model Loading
// =============================================================================

#[test]
fn test_fixture_models_load() {
    for fixture in ["weather.json", "json_rpc.json", "collisions.json"] {
        let model = load_from_path(&fixtures_path().join(fixture)).unwrap();
        assert!(model.user_shape_count() > 0, "{} has no shapes", fixture);
        assert_eq!(model.digest().len(), 64);
    }
}

#[test]
fn test_malformed_inputs_fail_in_the_loader() {
    let expected = [
        ("invalid_json.json", "parse"),
        ("missing_version.json", "parse"),
        ("unknown_shape_type.json", "parse"),
        ("unsupported_version.json", "parse"),
        ("dangling_reference.json", "validation"),
    ];
    for (file, category) in expected {
        let err = load_from_path(&fixtures_path().join("malformed").join(file)).unwrap_err();
        assert_eq!(err.category(), category, "{}: {}", file, err);
    }
}

#[test]
fn test_dangling_reference_suggests_closest_shape() {
    let err = load_from_path(&fixtures_path().join("malformed/dangling_reference.json")).unwrap_err();
    assert!(err.to_string().contains("example#Persn"));
    assert!(err.to_string().contains("did you mean example#Person?"));
}

#[test]
fn test_malformed_directory_fails_as_a_whole() {
    let err = load_from_path(&fixtures_path().join("malformed")).unwrap_err();
    assert!(matches!(err.category(), "parse" | "validation"));
}

#[test]
fn test_settings_file_resolves_paths_against_its_directory() {
    let settings = CodegenSettings::load_from(Some(&fixtures_path().join("codegen.toml"))).unwrap();
    assert_eq!(settings.model, Some(fixtures_path().join("weather.json")));
    assert_eq!(settings.output.dir, fixtures_path().join("out/weather-client"));
    assert_eq!(settings.module.name, "weather-client");
    assert_eq!(settings.crate_ident(), "weather_client");
}

// =============================================================================
// Determinism
// =============================================================================

#[test]
fn test_generation_is_deterministic() {
    let first = generate("weather.json", "weather-client");
    let second = generate("weather.json", "weather-client");

    assert_eq!(first.model.digest(), second.model.digest());
    assert_eq!(first.output.len(), second.output.len());
    for file in first.output.files() {
        let other = second
            .output
            .file(file.path())
            .unwrap_or_else(|| panic!("{} missing from second run", file.path().display()));
        assert_eq!(file.render(), other.render(), "{} differs between runs", file.path().display());
    }
}

#[test]
fn test_parallel_jobs_match_sequential_runs() {
    let jobs = vec![
        settings_for("weather.json", "weather-client"),
        settings_for("json_rpc.json", "inventory-client"),
    ];
    let results = pipeline::generate_all(&jobs);
    for (settings, result) in jobs.iter().zip(results) {
        let parallel = result.unwrap();
        let sequential = pipeline::generate(settings).unwrap();
        for file in sequential.output.files() {
            assert_eq!(parallel.output.file(file.path()).map(|f| f.render()), Some(file.render()));
        }
    }
}

// =============================================================================
// Generated Crate Layout
// =============================================================================

#[test]
fn test_rest_json_crate_layout() {
    let generation = generate("weather.json", "weather-client");
    let paths: HashSet<String> = generation
        .output
        .files()
        .map(|f| f.path().display().to_string())
        .collect();
    for expected in [
        "Cargo.toml",
        "README.md",
        "src/lib.rs",
        "src/primitives.rs",
        "src/model.rs",
        "src/input.rs",
        "src/output.rs",
        "src/error.rs",
        "src/operation.rs",
        "src/endpoint.rs",
        "src/client.rs",
        "src/paginator.rs",
        "src/waiters.rs",
        "tests/protocol_tests.rs",
        "tests/endpoint_tests.rs",
    ] {
        assert!(paths.contains(expected), "missing {}", expected);
    }

    let manifest = rendered(&generation, "Cargo.toml");
    assert!(manifest.contains("name = \"weather-client\""));
    let lib = rendered(&generation, "src/lib.rs");
    assert!(lib.contains("pub mod paginator;"));
    assert!(lib.contains("pub mod waiters;"));
}

#[test]
fn test_json_rpc_crate_skips_paginators_and_waiters() {
    let generation = generate("json_rpc.json", "inventory-client");
    assert!(generation.output.file("src/paginator.rs").is_none());
    assert!(generation.output.file("src/waiters.rs").is_none());

    let operations = rendered(&generation, "src/operation.rs");
    assert!(operations.contains("request.set_header(\"X-Amz-Target\", \"Inventory.GetItem\");"));
    assert!(operations.contains("request.set_header(\"Content-Type\", \"application/x-amz-json-1.0\");"));
}

#[test]
fn test_disabled_test_emission() {
    let mut settings = settings_for("weather.json", "weather-client");
    settings.codegen.include_protocol_tests = false;
    settings.codegen.include_endpoint_tests = false;
    let generation = pipeline::generate(&settings).unwrap();
    assert!(generation.output.file("tests/protocol_tests.rs").is_none());
    assert!(generation.output.file("tests/endpoint_tests.rs").is_none());
}

// =============================================================================
// Operations, Paginators, and Waiters
// =============================================================================

#[test]
fn test_weather_operations_are_indexed() {
    let generation = generate("weather.json", "weather-client");
    let index = &generation.index;
    assert_eq!(index.service, id("example.weather#Weather"));
    assert_eq!(index.operations.len(), 4);
    // service errors are attached to every operation
    for op in &index.operations {
        assert!(op.errors.contains(&id("example.weather#ServiceUnavailable")), "{}", op.id);
    }
    let create = index.operation(&id("example.weather#CreateCity")).unwrap();
    assert_eq!(create.success_code(), 201);
    assert_eq!(create.idempotency_token.as_deref(), Some("clientToken"));
}

#[test]
fn test_paginator_follows_service_defaults() {
    let generation = generate("weather.json", "weather-client");
    let paginator = rendered(&generation, "src/paginator.rs");
    assert!(paginator.contains("pub struct ListCitiesPaginator {"));
    assert!(paginator.contains("pub fn page_size(mut self, size: i32) -> Self {"));
    assert!(!paginator.contains("GetCityPaginator"));
}

#[test]
fn test_waiters_are_client_methods() {
    let generation = generate("weather.json", "weather-client");
    let waiters = rendered(&generation, "src/waiters.rs");
    assert!(waiters.contains("pub async fn wait_until_city_exists(&self,"));
    assert!(waiters.contains("pub async fn wait_until_city_active(&self,"));
    assert!(waiters.contains("let min_delay = Duration::from_secs(2);"));
    assert!(waiters.contains("if error.code() == Some(\"NoSuchResource\") {"));
    assert!(waiters.contains("return Some(AcceptorState::Failure);"));
}

// =============================================================================
// Protocol and Endpoint Tests
// =============================================================================

#[test]
fn test_one_test_module_per_trait_instance() {
    let generation = generate("weather.json", "weather-client");
    let tests = rendered(&generation, "tests/protocol_tests.rs");
    for module in [
        "mod get_city_request {",
        "mod get_city_response {",
        "mod list_cities_request {",
        "mod no_such_resource_response {",
    ] {
        assert_eq!(tests.matches(module).count(), 1, "{}", module);
    }
    assert_eq!(generation.index.protocol_tests.len(), 4);
}

#[test]
fn test_protocol_test_cases_become_functions() {
    let generation = generate("weather.json", "weather-client");
    let tests = rendered(&generation, "tests/protocol_tests.rs");
    assert!(tests.contains("weather_client::operation::GetCity::serialize_request(&input,"));
    assert!(tests.contains("assert_eq!(request.path(), \"/cities/seattle\");"));
    assert!(tests.contains("\"pageSize=50\""));
    assert!(tests.contains("\"X-Amz-Target\""));
    assert!(tests.contains("weather_client::error::GetCityError::NoSuchResourceError(actual) => assert_eq!(actual, expected),"));
}

#[test]
fn test_json_rpc_protocol_tests() {
    let generation = generate("json_rpc.json", "inventory-client");
    let tests = rendered(&generation, "tests/protocol_tests.rs");
    assert!(tests.contains("mod get_item_request {"));
    assert!(tests.contains("mod item_not_found_response {"));
    assert!(tests.contains("inventory_client::operation::GetItem::serialize_request(&input,"));
}

#[test]
fn test_endpoint_test_cases_become_functions() {
    let generation = generate("weather.json", "weather-client");
    let tests = rendered(&generation, "tests/endpoint_tests.rs");
    for name in [
        "fn regular_endpoint_in_us_west_2() {",
        "fn fips_endpoint_in_us_east_1() {",
        "fn custom_endpoint_wins() {",
        "fn missing_region() {",
    ] {
        assert!(tests.contains(name), "missing {}", name);
    }
    assert!(tests.contains("assert_eq!(endpoint.url(), \"https://weather.us-west-2.amazonaws.com\");"));
    assert!(tests.contains("assert_eq!(error.to_string(), \"Invalid Configuration: Missing Region\");"));
}

// =============================================================================
// Symbol Mapping
// =============================================================================

#[test]
fn test_names_are_unique_per_namespace() {
    for (fixture, module) in [
        ("weather.json", "weather-client"),
        ("json_rpc.json", "inventory-client"),
        ("collisions.json", "names-client"),
    ] {
        let generation = generate(fixture, module);
        let mut seen = HashSet::new();
        for namespace in Namespace::ALL {
            for symbol in generation.symbols.in_namespace(namespace) {
                let key = format!("{}::{}", namespace, symbol.name.to_lowercase());
                assert!(seen.insert(key), "{}: duplicate name {}", fixture, symbol.name);
            }
        }
    }
}

#[test]
fn test_case_insensitive_type_collisions() {
    let generation = generate("collisions.json", "names-client");
    let symbols = &generation.symbols;
    assert_eq!(symbols.symbol(&id("example.names#WIDGET")).unwrap().name, "Widget");
    let renamed = symbols.symbol(&id("example.other#Widget")).unwrap();
    assert_eq!(renamed.name, "Widget2");
    assert!(renamed.disambiguated);
}

#[test]
fn test_reserved_type_names_are_suffixed() {
    let generation = generate("collisions.json", "names-client");
    let symbols = &generation.symbols;
    assert_eq!(symbols.symbol(&id("example.names#Result")).unwrap().name, "ResultValue");
    assert_eq!(symbols.symbol(&id("example.names#Vec")).unwrap().name, "VecValue");
}

#[test]
fn test_keyword_members_are_escaped() {
    let generation = generate("collisions.json", "names-client");
    let op = generation.symbols.operation(&id("example.names#Match")).unwrap();
    let input_fields: Vec<&str> = generation
        .symbols
        .members(&op.input.shape)
        .iter()
        .map(|m| m.field.as_str())
        .collect();
    assert!(input_fields.contains(&"r#type"));
    assert!(input_fields.contains(&"self_"));
    assert!(input_fields.contains(&"r#fn"));

    let output_fields: Vec<&str> = generation
        .symbols
        .members(&op.output.shape)
        .iter()
        .map(|m| m.field.as_str())
        .collect();
    assert!(output_fields.contains(&"builder_value"));

    let model = rendered(&generation, "src/input.rs");
    assert!(model.contains("pub r#type: Option<String>,"));
}

#[test]
fn test_enum_variants_reserve_unknown() {
    let generation = generate("collisions.json", "names-client");
    let variants = generation.symbols.enum_variants(&id("example.names#Kind")).unwrap();
    assert_eq!(variants[0].variant, "Unknown2");
    let names: HashSet<&str> = variants.iter().map(|v| v.variant.as_str()).collect();
    assert_eq!(names.len(), variants.len());
    assert!(names.contains("SelfValue"));
    assert!(names.contains("Type"));

    let model = rendered(&generation, "src/model.rs");
    assert!(!model.contains("    Self,"));
    assert!(!model.contains("    Self(String),"));
    assert!(model.contains("    SelfValue(String),"));
}

#[test]
fn test_builder_methods_do_not_collide() {
    let generation = generate("collisions.json", "names-client");
    let op = generation.symbols.operation(&id("example.names#Match")).unwrap();
    let setters: Vec<&str> = generation
        .symbols
        .members(&op.output.shape)
        .iter()
        .map(|m| m.setter.as_str())
        .collect();
    assert!(setters.contains(&"set_name_2"));
    assert!(setters.contains(&"set_set_name"));

    let output = rendered(&generation, "src/output.rs");
    assert_eq!(output.matches("pub fn set_name(").count(), 1);
    assert_eq!(output.matches("pub fn set_name_2(").count(), 1);
}

#[test]
fn test_doc_code_fences_are_not_doctests() {
    let generation = generate("collisions.json", "names-client");
    let model = rendered(&generation, "src/model.rs");
    assert!(model.contains(
        "/// One way to match.\n/// ```text\n/// names match --self <b>x</b>\n/// ```\n/// Counts are exact.\n"
    ));
    assert!(!model.contains("/// ```\n/// names"));
    assert!(!model.contains("<p>"));
}

// =============================================================================
// Errors
// =============================================================================

#[test]
fn test_unknown_service_is_validation_error() {
    let mut settings = settings_for("weather.json", "weather-client");
    settings.service = Some("example.weather#Climate".to_string());
    let err = pipeline::generate(&settings).unwrap_err();
    assert_eq!(err.category(), "validation");
    assert!(err.to_string().contains("example.weather#Climate"));
}

#[test]
fn test_event_streams_are_unsupported() {
    let model = load_from_str(
        &serde_json::json!({
            "smithy": "2.0",
            "shapes": {
                "example#Streamer": {
                    "type": "service",
                    "operations": [ { "target": "example#Subscribe" } ],
                    "traits": { "aws.protocols#restJson1": {} }
                },
                "example#Subscribe": {
                    "type": "operation",
                    "output": { "target": "example#SubscribeOutput" },
                    "traits": { "smithy.api#http": { "method": "GET", "uri": "/events" } }
                },
                "example#SubscribeOutput": {
                    "type": "structure",
                    "members": {
                        "events": { "target": "example#Events", "traits": { "smithy.api#httpPayload": {} } }
                    }
                },
                "example#Events": {
                    "type": "union",
                    "members": { "tick": { "target": "example#Tick" } },
                    "traits": { "smithy.api#streaming": {} }
                },
                "example#Tick": { "type": "structure", "members": {} }
            }
        })
        .to_string(),
    )
    .unwrap();
    let err = pipeline::generate_model(model, &CodegenSettings::default()).unwrap_err();
    assert_eq!(err.category(), "unsupported-trait");
}

// =============================================================================
// Writing and Drift
// =============================================================================

#[test]
fn test_write_then_check_detects_edits() {
    let dir = tempfile::tempdir().unwrap();
    let mut settings = settings_for("weather.json", "weather-client");
    settings.output.dir = dir.path().join("weather-client");

    pipeline::run(&settings).unwrap();
    assert!(pipeline::check(&settings).unwrap().is_empty());

    let lib = settings.output.dir.join("src/lib.rs");
    std::fs::write(&lib, "// edited\n").unwrap();
    std::fs::remove_file(settings.output.dir.join("README.md")).unwrap();

    let drift = pipeline::check(&settings).unwrap();
    assert_eq!(drift.len(), 2);
    assert!(drift.iter().any(|d| matches!(d, Drift::Missing(path) if path.ends_with("README.md"))));
    assert!(drift
        .iter()
        .any(|d| matches!(d, Drift::Changed { path, diff } if path.ends_with("src/lib.rs") && diff.contains("-// edited"))));
}

#[test]
fn test_check_reports_outputs_the_model_no_longer_produces() {
    let dir = tempfile::tempdir().unwrap();
    let mut settings = settings_for("weather.json", "weather-client");
    settings.output.dir = dir.path().join("weather-client");
    pipeline::run(&settings).unwrap();

    settings.codegen.include_protocol_tests = false;
    let drift = pipeline::check(&settings).unwrap();
    assert_eq!(drift, vec![Drift::Unexpected(PathBuf::from("tests/protocol_tests.rs"))]);
}

// =============================================================================
// Generated Crates Build
// =============================================================================

/// Writes each fixture's crate and runs its own test suite. Needs network
/// access for the generated crates' dependencies.
#[test]
#[ignore]
fn test_generated_crates_pass_their_own_tests() {
    let dir = tempfile::tempdir().unwrap();
    let cargo = option_env!("CARGO").unwrap_or("cargo");
    for (fixture, module) in [
        ("weather.json", "weather-client"),
        ("json_rpc.json", "inventory-client"),
        ("collisions.json", "names-client"),
    ] {
        let mut settings = settings_for(fixture, module);
        settings.output.dir = dir.path().join(module);
        pipeline::run(&settings).unwrap();

        let status = std::process::Command::new(cargo)
            .args(["test", "--quiet"])
            .current_dir(&settings.output.dir)
            .env("CARGO_TARGET_DIR", dir.path().join("target"))
            .status()
            .unwrap();
        assert!(status.success(), "{} does not pass cargo test", module);
    }
}
