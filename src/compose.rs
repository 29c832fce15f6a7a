//! The assembled compose document
//!
//! The output schema is deliberately minimal: a `services` mapping whose
//! entries each carry an image identifier, optional string ports and a
//! string-to-string environment. Everything else — top-level or
//! per-service — is user data this tool does not understand and must
//! pass through untouched.

use std::collections::BTreeMap;

use serde::Serialize;
use serde_yaml_ng::{Mapping, Value};

use crate::error::{ComposeError, ComposeResult};

/// One service entry. Unrecognized keys are preserved verbatim in
/// `extra`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ServiceSpec {
    pub image: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub ports: Option<Vec<String>>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub environment: Option<BTreeMap<String, String>>,

    #[serde(flatten)]
    pub extra: Mapping,
}

/// The validated, merged document.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ComposeDocument {
    pub services: BTreeMap<String, ServiceSpec>,

    #[serde(flatten)]
    pub extra: Mapping,
}

impl ComposeDocument {
    /// Validate a merged mapping against the output schema.
    ///
    /// Failures name the offending service and field; unknown keys are
    /// never rejected.
    pub fn from_value(value: Value) -> ComposeResult<Self> {
        let root = match value {
            Value::Mapping(root) => root,
            _ => {
                return Err(ComposeError::MissingServices {
                    message: "merged document is not a mapping".to_string(),
                })
            }
        };

        let mut services_value = None;
        let mut extra = Mapping::new();
        for (key, item) in root {
            if key.as_str() == Some("services") {
                services_value = Some(item);
            } else {
                extra.insert(key, item);
            }
        }

        let services_map = match services_value {
            Some(Value::Mapping(map)) => map,
            Some(_) => {
                return Err(ComposeError::MissingServices {
                    message: "'services' is not a mapping".to_string(),
                })
            }
            None => {
                return Err(ComposeError::MissingServices {
                    message: "missing top-level 'services' mapping".to_string(),
                })
            }
        };

        let mut services = BTreeMap::new();
        for (name_value, entry) in services_map {
            let name = match name_value.as_str() {
                Some(name) => name.to_string(),
                None => {
                    return Err(ComposeError::MissingServices {
                        message: "service names must be strings".to_string(),
                    })
                }
            };
            let service = parse_service(&name, entry)?;
            services.insert(name, service);
        }

        Ok(Self { services, extra })
    }

    pub fn to_yaml(&self) -> ComposeResult<String> {
        Ok(serde_yaml_ng::to_string(self)?)
    }

    pub fn to_json(&self) -> ComposeResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

fn parse_service(name: &str, entry: Value) -> ComposeResult<ServiceSpec> {
    let entry_map = match entry {
        Value::Mapping(map) => map,
        _ => {
            return Err(ComposeError::Validation {
                service: name.to_string(),
                field: "service".to_string(),
                message: "entry is not a mapping".to_string(),
            })
        }
    };

    let mut image = None;
    let mut ports = None;
    let mut environment = None;
    let mut extra = Mapping::new();

    for (key, item) in entry_map {
        match key.as_str() {
            Some("image") => {
                image = Some(parse_image(name, item)?);
            }
            Some("ports") if !item.is_null() => {
                ports = Some(parse_ports(name, item)?);
            }
            Some("environment") if !item.is_null() => {
                environment = Some(parse_environment(name, item)?);
            }
            // Explicit nulls count as unset and are dropped on output.
            Some("ports") | Some("environment") => {}
            _ => {
                extra.insert(key, item);
            }
        }
    }

    let image = image.ok_or_else(|| ComposeError::Validation {
        service: name.to_string(),
        field: "image".to_string(),
        message: "is required".to_string(),
    })?;

    Ok(ServiceSpec {
        image,
        ports,
        environment,
        extra,
    })
}

fn parse_image(service: &str, value: Value) -> ComposeResult<String> {
    match value {
        Value::String(image) if !image.trim().is_empty() => Ok(image),
        Value::String(_) => Err(ComposeError::Validation {
            service: service.to_string(),
            field: "image".to_string(),
            message: "must not be empty".to_string(),
        }),
        _ => Err(ComposeError::Validation {
            service: service.to_string(),
            field: "image".to_string(),
            message: "must be a string".to_string(),
        }),
    }
}

fn parse_ports(service: &str, value: Value) -> ComposeResult<Vec<String>> {
    let items = match value {
        Value::Sequence(items) => items,
        _ => {
            return Err(ComposeError::Validation {
                service: service.to_string(),
                field: "ports".to_string(),
                message: "must be a sequence of strings".to_string(),
            })
        }
    };

    items
        .into_iter()
        .map(|item| match item {
            Value::String(port) => Ok(port),
            _ => Err(ComposeError::Validation {
                service: service.to_string(),
                field: "ports".to_string(),
                message: "must be a sequence of strings".to_string(),
            }),
        })
        .collect()
}

fn parse_environment(service: &str, value: Value) -> ComposeResult<BTreeMap<String, String>> {
    let map = match value {
        Value::Mapping(map) => map,
        _ => {
            return Err(ComposeError::Validation {
                service: service.to_string(),
                field: "environment".to_string(),
                message: "must be a mapping of strings".to_string(),
            })
        }
    };

    let mut environment = BTreeMap::new();
    for (key, item) in map {
        match (key.as_str(), item) {
            (Some(key), Value::String(entry)) => {
                environment.insert(key.to_string(), entry);
            }
            _ => {
                return Err(ComposeError::Validation {
                    service: service.to_string(),
                    field: "environment".to_string(),
                    message: "must be a mapping of strings".to_string(),
                })
            }
        }
    }
    Ok(environment)
}
