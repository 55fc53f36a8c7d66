//! Declarative custom handlers loaded from disk.
//!
//! ```toml
//! [[handler]]
//! path = "/api/users/:id"
//! method = "get"
//! json = { echo = "{{id}}", url = "{{url}}" }
//! headers = { "X-Mock" = "custom" }
//!
//! [[handler]]
//! path = "/api/broken"
//! fault = "backend exploded"
//! ```
//!
//! String values are Handlebars templates. `{{name}}` renders the captured
//! `:name` segment, `{{url}}` the absolute request URL. Output is not
//! HTML-escaped and unknown names render empty. Templates are compiled when
//! the file is loaded, so a syntax error is a startup failure.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use axum::http::Method;
use handlebars::{Handlebars, TemplateError};
use serde::Deserialize;
use thiserror::Error;

use crate::handlers::{HandlerEntry, HandlerFault};
use crate::http::gateway::reserved_suffix;
use crate::http::request::RequestContext;
use crate::http::response::ResponseValue;
use crate::routing::{HandlerRegistry, RoutePattern};

/// Error type for handler file loading.
#[derive(Debug, Error)]
pub enum HandlerLoadError {
    #[error("failed to read handler file {path:?}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse handler file {path:?}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("handler #{index} ({path}): {reason}")]
    Invalid {
        index: usize,
        path: String,
        reason: String,
    },
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct HandlerFile {
    #[serde(default, rename = "handler")]
    handlers: Vec<HandlerSpec>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct HandlerSpec {
    path: String,

    #[serde(default = "default_method")]
    method: String,

    json: Option<toml::Value>,

    body: Option<String>,

    #[serde(default)]
    headers: BTreeMap<String, String>,

    fault: Option<String>,
}

fn default_method() -> String {
    "get".to_string()
}

/// What a declarative handler produces.
#[derive(Debug, Clone)]
enum Template {
    Json(serde_json::Value),
    Body(String),
    Fault(String),
}

/// Template engine shared by every entry of one handler file.
fn template_engine() -> Handlebars<'static> {
    let mut handlebars = Handlebars::new();
    // Responses are not HTML
    handlebars.register_escape_fn(handlebars::no_escape);
    handlebars
}

/// Load the handler file at `path`. Entries keep file order.
pub fn load_handlers(path: &Path) -> Result<HandlerRegistry, HandlerLoadError> {
    let content = fs::read_to_string(path).map_err(|source| HandlerLoadError::Read {
        path: path.to_path_buf(),
        source,
    })?;

    parse_handlers(&content).map_err(|e| match e {
        ParseFailure::Toml(source) => HandlerLoadError::Parse {
            path: path.to_path_buf(),
            source,
        },
        ParseFailure::Invalid(e) => e,
    })
}

enum ParseFailure {
    Toml(toml::de::Error),
    Invalid(HandlerLoadError),
}

fn parse_handlers(content: &str) -> Result<HandlerRegistry, ParseFailure> {
    let file: HandlerFile = toml::from_str(content).map_err(ParseFailure::Toml)?;
    let engine = Arc::new(template_engine());

    file.handlers
        .into_iter()
        .enumerate()
        .map(|(index, spec)| {
            build_entry(index, spec, engine.clone()).map_err(ParseFailure::Invalid)
        })
        .collect()
}

fn build_entry(
    index: usize,
    spec: HandlerSpec,
    engine: Arc<Handlebars<'static>>,
) -> Result<HandlerEntry, HandlerLoadError> {
    let invalid = |reason: &str| HandlerLoadError::Invalid {
        index,
        path: spec.path.clone(),
        reason: reason.to_string(),
    };

    if !spec.path.starts_with('/') {
        return Err(invalid("path must start with '/'"));
    }

    let method = parse_method(&spec.method).ok_or_else(|| invalid("unknown HTTP method"))?;

    let template = match (spec.json.clone(), spec.body.clone(), spec.fault.clone()) {
        (Some(json), None, None) => Template::Json(
            serde_json::to_value(json).map_err(|e| invalid(&e.to_string()))?,
        ),
        (None, Some(body), None) => Template::Body(body),
        (None, None, Some(fault)) => Template::Fault(fault),
        (None, None, None) => return Err(invalid("one of 'json', 'body' or 'fault' is required")),
        _ => return Err(invalid("'json', 'body' and 'fault' are mutually exclusive")),
    };

    check_templates(&template, &spec.headers)
        .map_err(|e| invalid(&format!("bad template: {}", e)))?;

    let pattern = RoutePattern::compile(spec.path.as_str());
    let headers = spec.headers;

    Ok(HandlerEntry::new(&spec.path, method, move |ctx| {
        render(&engine, &template, &headers, &pattern, &ctx)
    }))
}

fn parse_method(method: &str) -> Option<Method> {
    match method.to_ascii_lowercase().as_str() {
        "get" => Some(Method::GET),
        "post" => Some(Method::POST),
        "put" => Some(Method::PUT),
        "patch" => Some(Method::PATCH),
        "delete" => Some(Method::DELETE),
        "head" => Some(Method::HEAD),
        "options" => Some(Method::OPTIONS),
        _ => None,
    }
}

/// Compile every template string once so syntax errors fail at startup.
fn check_templates(
    template: &Template,
    headers: &BTreeMap<String, String>,
) -> Result<(), TemplateError> {
    fn check_json(value: &serde_json::Value) -> Result<(), TemplateError> {
        match value {
            serde_json::Value::String(s) => check(s),
            serde_json::Value::Array(items) => items.iter().try_for_each(check_json),
            serde_json::Value::Object(map) => map.values().try_for_each(check_json),
            _ => Ok(()),
        }
    }

    fn check(text: &str) -> Result<(), TemplateError> {
        handlebars::Template::compile(text).map(|_| ())
    }

    match template {
        Template::Json(value) => check_json(value)?,
        Template::Body(text) | Template::Fault(text) => check(text)?,
    }
    headers.values().try_for_each(|v| check(v))
}

fn render(
    engine: &Handlebars<'static>,
    template: &Template,
    headers: &BTreeMap<String, String>,
    pattern: &RoutePattern,
    ctx: &RequestContext,
) -> Result<ResponseValue, HandlerFault> {
    let data = template_data(pattern, ctx);
    let text = |t: &str| render_text(engine, t, &data);

    let response = match template {
        Template::Fault(message) => return Err(HandlerFault::message(text(message.as_str())?)),
        Template::Json(value) => ResponseValue::json(&render_json(engine, value, &data)?)?,
        Template::Body(body) => ResponseValue::of(text(body.as_str())?),
    };

    headers
        .iter()
        .try_fold(response, |r, (k, v)| Ok(r.header(k.as_str(), text(v.as_str())?)))
}

/// Template data: `url` plus one entry per captured `:name` segment.
///
/// Captures come from the raw request path, the same one the registry matched.
fn template_data(pattern: &RoutePattern, ctx: &RequestContext) -> BTreeMap<String, String> {
    let mut data = BTreeMap::new();
    data.insert("url".to_string(), ctx.absolute_url().to_string());

    let path = ctx.path();
    let path = reserved_suffix(path).unwrap_or(path);
    if let Some(captured) = pattern.captures(path) {
        data.extend(
            captured
                .into_iter()
                .map(|(name, value)| (name.to_string(), value.to_string())),
        );
    }

    data
}

fn render_text(
    engine: &Handlebars<'static>,
    text: &str,
    data: &BTreeMap<String, String>,
) -> Result<String, HandlerFault> {
    if !text.contains("{{") {
        return Ok(text.to_string());
    }
    engine
        .render_template(text, data)
        .map_err(|e| HandlerFault::message(format!("template error: {}", e)))
}

fn render_json(
    engine: &Handlebars<'static>,
    value: &serde_json::Value,
    data: &BTreeMap<String, String>,
) -> Result<serde_json::Value, HandlerFault> {
    use serde_json::Value;

    match value {
        Value::String(s) => Ok(Value::String(render_text(engine, s, data)?)),
        Value::Array(items) => items
            .iter()
            .map(|v| render_json(engine, v, data))
            .collect::<Result<_, _>>()
            .map(Value::Array),
        Value::Object(map) => {
            let mut rendered = serde_json::Map::new();
            for (k, v) in map {
                rendered.insert(k.clone(), render_json(engine, v, data)?);
            }
            Ok(Value::Object(rendered))
        }
        other => Ok(other.clone()),
    }
}
