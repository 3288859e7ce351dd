//! Manifest validation
//!
//! Runs before any remote call. Every check contributes its own messages and
//! the caller gets them all at once in a single [`Error::Validation`].

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::LazyLock;

use regex::Regex;
use uuid::Uuid;

use stratus_common::manifest::{EventDecl, ServiceManifest};
use stratus_common::{Error, Result, REGIONS};

use crate::config::Credentials;
use crate::kind::SCALING_OPTION_TYPES;

/// Trigger types the platform accepts
pub const TRIGGER_TYPES: &[&str] = &["schedule"];

/// Runtime families and the handler file extensions they accept. An empty
/// list means the runtime is compiled and the handler file is not checked.
const RUNTIME_FAMILIES: &[(&str, &[&str])] = &[
    ("node", &["ts", "js"]),
    ("python", &["py"]),
    ("go", &[]),
    ("php", &["php"]),
    ("rust", &["rs"]),
];

static CRON_SCHEDULE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(concat!(
        r"^(\*|([0-9]|[1-5][0-9])|\*/([0-9]|[1-5][0-9])) ",
        r"(\*|([0-9]|1[0-9]|2[0-3])|\*/([0-9]|1[0-9]|2[0-3])) ",
        r"(\*|([1-9]|[12][0-9]|3[01])|\*/([1-9]|[12][0-9]|3[01])) ",
        r"(\*|([1-9]|1[0-2])|\*/([1-9]|1[0-2])) ",
        r"(\*|[0-6]|\*/[0-6])$",
    ))
    .expect("valid cron regex")
});

/// Check credentials and the whole manifest, reporting every problem found
pub fn validate(manifest: &ServiceManifest, credentials: &Credentials) -> Result<()> {
    let mut problems = Vec::new();
    problems.extend(check_credentials(credentials));
    problems.extend(check_region(&credentials.region));
    problems.extend(check_declares_something(manifest));
    problems.extend(check_env(&manifest.provider.env));
    problems.extend(check_functions(manifest));
    problems.extend(check_containers(manifest));

    if problems.is_empty() {
        Ok(())
    } else {
        Err(Error::validation_all(problems))
    }
}

fn check_credentials(credentials: &Credentials) -> Option<String> {
    let valid = Uuid::parse_str(&credentials.token).is_ok()
        && Uuid::parse_str(&credentials.project_id).is_ok();
    (!valid).then(|| {
        "Either the API token or the project id is invalid. Credentials to deploy on your \
         account are required: set SCW_SECRET_KEY and SCW_DEFAULT_PROJECT_ID"
            .to_string()
    })
}

fn check_region(region: &str) -> Option<String> {
    (!REGIONS.contains(&region)).then(|| {
        format!(
            "Unknown region \"{region}\", must be one of: {}",
            REGIONS.join(", ")
        )
    })
}

fn check_declares_something(manifest: &ServiceManifest) -> Option<String> {
    (manifest.functions.is_empty() && manifest.custom.containers.is_empty()).then(|| {
        "You must define at least one function or container to deploy under the functions or custom key."
            .to_string()
    })
}

/// Environment values must be strings; numbers and booleans have to be quoted
pub fn check_env(env: &BTreeMap<String, serde_yaml::Value>) -> Vec<String> {
    env.iter()
        .filter(|(_, value)| !value.is_string())
        .map(|(name, _)| {
            format!(
                "Variable {name}: variable is invalid, environment variables may only be strings"
            )
        })
        .collect()
}

fn check_functions(manifest: &ServiceManifest) -> Vec<String> {
    let mut problems = Vec::new();
    for function in manifest.functions.values() {
        problems.extend(check_env(&function.env));
        problems.extend(check_events(&function.events));

        let runtime = function
            .runtime
            .as_deref()
            .or(manifest.provider.runtime.as_deref());
        match runtime {
            Some(runtime) => problems.extend(check_handler(
                &manifest.base_dir,
                &function.name,
                runtime,
                function.handler.as_deref(),
            )),
            None => problems.push(format!(
                "Function {} has no runtime: set provider.runtime or a runtime on the function",
                function.name
            )),
        }
    }
    problems
}

fn check_containers(manifest: &ServiceManifest) -> Vec<String> {
    let mut problems = Vec::new();
    for container in manifest.custom.containers.values() {
        problems.extend(check_env(&container.env));
        problems.extend(check_events(&container.events));

        let option_type = container
            .scaling_option
            .as_ref()
            .and_then(|s| s.option_type.as_deref());
        if let Some(option_type) = option_type {
            if !SCALING_OPTION_TYPES.contains(&option_type) {
                problems.push(format!(
                    "Container {}: scalingOption.type {option_type} is invalid, must be one of: {}",
                    container.name,
                    SCALING_OPTION_TYPES.join(", ")
                ));
            }
        }
    }
    problems
}

/// Runtime family and handler shape. The handler is `path/to/file.export`;
/// for interpreted runtimes the file must exist under `base_dir` with one of
/// the family's extensions.
pub fn check_handler(
    base_dir: &Path,
    function: &str,
    runtime: &str,
    handler: Option<&str>,
) -> Vec<String> {
    let Some((_, extensions)) = RUNTIME_FAMILIES
        .iter()
        .find(|(family, _)| runtime.starts_with(family))
    else {
        return vec![format!(
            "Runtime {runtime} is not supported, please check documentation for available runtimes"
        )];
    };

    // Compiled runtimes point at a package, not a file
    if extensions.is_empty() {
        return vec![];
    }

    let malformed = || {
        format!(
            "Handler is malformatted for {function}: handler should be path/to/file.functionInsideFile"
        )
    };
    let Some(handler) = handler else {
        return vec![malformed()];
    };
    let parts: Vec<&str> = handler.split('.').collect();
    let [file, export] = parts.as_slice() else {
        return vec![malformed()];
    };
    if file.is_empty() || export.is_empty() {
        return vec![malformed()];
    }

    let exists = extensions
        .iter()
        .any(|ext| base_dir.join(format!("{file}.{ext}")).is_file());
    if exists {
        vec![]
    } else {
        vec![format!(
            "Handler file defined for function {function} does not exist ({handler})"
        )]
    }
}

/// Each event is a single-key map naming a supported trigger type
pub fn check_events(events: &[EventDecl]) -> Vec<String> {
    let mut problems = Vec::new();
    for event in events {
        let types: Vec<&str> = event.event_types().collect();
        let [trigger_type] = types.as_slice() else {
            problems.push(
                "Trigger is invalid, it should contain at least one event type configuration (example: schedule)."
                    .to_string(),
            );
            continue;
        };

        if !TRIGGER_TYPES.contains(trigger_type) {
            problems.push(format!(
                "Trigger Type {trigger_type} is not currently supported, supported types are the following: {}",
                TRIGGER_TYPES.join(", ")
            ));
            continue;
        }

        match event.schedule() {
            Some(schedule) if CRON_SCHEDULE.is_match(&schedule.rate) => {}
            Some(schedule) => problems.push(format!(
                "Trigger Schedule is invalid: {}, schedule should be formatted like a UNIX-Compliant Cronjob, for example: '1 * * * *'",
                schedule.rate
            )),
            None => problems.push(
                "Trigger Schedule is invalid: a schedule needs a rate, for example: '1 * * * *'"
                    .to_string(),
            ),
        }
    }
    problems
}

#[cfg(test)]
mod tests {
    use super::*;

    const TOKEN: &str = "11111111-2222-3333-4444-555555555555";
    const PROJECT: &str = "66666666-7777-8888-9999-000000000000";

    fn credentials() -> Credentials {
        Credentials {
            token: TOKEN.to_string(),
            project_id: PROJECT.to_string(),
            region: "fr-par".to_string(),
        }
    }

    fn manifest_in(dir: &Path, yaml: &str) -> ServiceManifest {
        let mut manifest = ServiceManifest::from_yaml(yaml).unwrap();
        manifest.base_dir = dir.to_path_buf();
        manifest
    }

    fn messages(err: Error) -> Vec<String> {
        match err {
            Error::Validation { messages } => messages,
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    fn events(yaml: &str) -> Vec<EventDecl> {
        serde_yaml::from_str(yaml).unwrap()
    }

    #[test]
    fn valid_manifest_passes() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("src")).unwrap();
        std::fs::write(dir.path().join("src/hello.js"), "").unwrap();

        let manifest = manifest_in(
            dir.path(),
            r#"
service: shop
provider:
  runtime: node22
  env:
    MODE: production
functions:
  hello:
    handler: src/hello.handle
    events:
      - schedule:
          rate: "*/5 * * * *"
custom:
  containers:
    api:
      directory: api
      scalingOption:
        type: cpuUsage
        threshold: 70
"#,
        );

        validate(&manifest, &credentials()).unwrap();
    }

    /// Story: a manifest with several mistakes reports all of them in one go
    #[test]
    fn story_every_problem_is_reported_together() {
        let dir = tempfile::tempdir().unwrap();
        let manifest = manifest_in(
            dir.path(),
            r#"
service: shop
provider:
  runtime: cobol85
  env:
    PORT: 8080
functions:
  hello:
    handler: src/hello.handle
"#,
        );
        let creds = Credentials {
            region: "us-east-1".to_string(),
            ..credentials()
        };

        let messages = messages(validate(&manifest, &creds).unwrap_err());

        assert_eq!(messages.len(), 3);
        assert!(messages[0].starts_with("Unknown region \"us-east-1\""));
        assert_eq!(
            messages[1],
            "Variable PORT: variable is invalid, environment variables may only be strings"
        );
        assert_eq!(
            messages[2],
            "Runtime cobol85 is not supported, please check documentation for available runtimes"
        );
    }

    #[test]
    fn credentials_must_be_uuids() {
        let manifest = manifest_in(Path::new("."), "service: s\ncustom:\n  containers:\n    api: {}\n");
        let creds = Credentials {
            token: "not-a-uuid".to_string(),
            ..credentials()
        };

        let messages = messages(validate(&manifest, &creds).unwrap_err());
        assert_eq!(messages.len(), 1);
        assert!(messages[0].contains("API token or the project id is invalid"));
    }

    #[test]
    fn empty_service_is_rejected() {
        let err = validate(&manifest_in(Path::new("."), "service: s\n"), &credentials()).unwrap_err();
        assert_eq!(
            messages(err),
            vec!["You must define at least one function or container to deploy under the functions or custom key."]
        );
    }

    #[test]
    fn handler_shape_and_file_are_checked() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("main.py"), "").unwrap();

        assert!(check_handler(dir.path(), "f", "python311", Some("main.handle")).is_empty());
        assert_eq!(
            check_handler(dir.path(), "f", "python311", Some("main")),
            vec!["Handler is malformatted for f: handler should be path/to/file.functionInsideFile"]
        );
        assert_eq!(
            check_handler(dir.path(), "f", "python311", Some("a.b.c")).len(),
            1
        );
        assert_eq!(
            check_handler(dir.path(), "f", "node22", Some("main.handle")),
            vec!["Handler file defined for function f does not exist (main.handle)"]
        );
    }

    #[test]
    fn compiled_runtime_skips_handler_file() {
        let dir = tempfile::tempdir().unwrap();
        assert!(check_handler(dir.path(), "f", "go122", Some("Handle")).is_empty());
        assert!(check_handler(dir.path(), "f", "go122", None).is_empty());
    }

    #[test]
    fn typescript_handler_is_accepted_for_node() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("index.ts"), "").unwrap();
        assert!(check_handler(dir.path(), "f", "node20", Some("index.handler")).is_empty());
    }

    #[test]
    fn schedule_must_be_five_field_cron() {
        assert!(check_events(&events("- schedule:\n    rate: '0 */2 * * 1'\n")).is_empty());

        let problems = check_events(&events("- schedule:\n    rate: '0 0 * *'\n"));
        assert_eq!(problems.len(), 1);
        assert!(problems[0].starts_with("Trigger Schedule is invalid: 0 0 * *"));

        assert_eq!(
            check_events(&events("- schedule:\n    rate: '60 * * * *'\n")).len(),
            1
        );
    }

    #[test]
    fn unsupported_or_ambiguous_triggers_are_rejected() {
        let problems = check_events(&events("- http:\n    path: /\n"));
        assert_eq!(problems.len(), 1);
        assert!(problems[0].starts_with("Trigger Type http is not currently supported"));

        let problems = check_events(&events(
            "- schedule:\n    rate: '* * * * *'\n  nats:\n    subject: x\n",
        ));
        assert_eq!(
            problems,
            vec!["Trigger is invalid, it should contain at least one event type configuration (example: schedule)."]
        );
    }

    #[test]
    fn unknown_scaling_option_is_rejected() {
        let manifest = manifest_in(
            Path::new("."),
            "service: s\ncustom:\n  containers:\n    api:\n      scalingOption:\n        type: gpu\n",
        );
        let messages = messages(validate(&manifest, &credentials()).unwrap_err());
        assert_eq!(messages.len(), 1);
        assert!(messages[0].contains("scalingOption.type gpu is invalid"));
    }

    #[test]
    fn function_without_runtime_is_rejected() {
        let manifest = manifest_in(
            Path::new("."),
            "service: s\nfunctions:\n  hello:\n    handler: a.b\n",
        );
        let messages = messages(validate(&manifest, &credentials()).unwrap_err());
        assert_eq!(messages.len(), 1);
        assert!(messages[0].starts_with("Function hello has no runtime"));
    }
}
