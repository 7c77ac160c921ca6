//! Issue title and body rendering using Tera
//!
//! Templates are evaluated against the notification serialized with its wire
//! field names (`status`, `groupLabels`, `alerts`, ...). Go style references such
//! as `{{ .groupLabels.alertname }}` are converted to Tera syntax first, so
//! templates written for Alertmanager keep working for simple lookups.

use lazy_static::lazy_static;
use regex::Regex;
use std::path::{Path, PathBuf};
use tera::{Context, Tera};
use tracing::debug;

use crate::{error_chain, notification::Notification, Error, Result};

const TITLE: &str = "title";
const BODY: &str = "body";

/// Renders the group's alert name.
pub const DEFAULT_TITLE_TEMPLATE: &str = "{{ groupLabels.alertname }}";

/// Reports all alert labels and annotations as Markdown that renders
/// correctly in GitHub issues.
///
/// Example:
///
/// ```text
/// Alertmanager URL: http://localhost:9093
///
///   * firing http://generator.url/
///
///     Labels:
///     - alertname = DiskRunningFull
///     - dev = sda1
///
///     Annotations:
///     - summary = Disk is full
/// ```
pub const DEFAULT_BODY_TEMPLATE: &str = r#"
Alertmanager URL: {{ externalURL }}
{% for alert in alerts %}
  * {{ alert.status }} {{ alert.generatorURL }}
  {% if alert.labels %}
    Labels:
  {%- endif %}
  {% for key, value in alert.labels %}
    - {{ key }} = {{ value -}}
  {% endfor %}
  {% if alert.annotations %}
    Annotations:
  {%- endif %}
  {% for key, value in alert.annotations %}
    - {{ key }} = {{ value -}}
  {% endfor %}
{% endfor %}
"#;

lazy_static! {
    static ref DEFAULT_DOUBLE_QUOTED: Regex =
        Regex::new(r#"\{\{([^}]+)\|\s*default\s+"([^"]+)"\s*\}\}"#).expect("valid regex");
    static ref DEFAULT_SINGLE_QUOTED: Regex =
        Regex::new(r#"\{\{([^}]+)\|\s*default\s+'([^']+)'\s*\}\}"#).expect("valid regex");
    static ref DEFAULT_BARE: Regex =
        Regex::new(r#"\{\{([^}]+)\|\s*default\s+([^}\s]+)\s*\}\}"#).expect("valid regex");
}

/// Convert Go template syntax to Tera syntax
///
/// Handles common patterns:
/// - {{ .path.to.value }} -> {{ path.to.value }}
/// - {{ .value | default "default" }} -> {{ value | default(value="default") }}
pub fn convert_go_to_tera(template: &str) -> String {
    let converted = template
        .replace("{{- .", "{{- ")
        .replace("{{ .", "{{ ")
        .replace("{{.", "{{");

    let converted = DEFAULT_DOUBLE_QUOTED.replace_all(&converted, "{{$1| default(value=\"$2\") }}");
    let converted = DEFAULT_SINGLE_QUOTED.replace_all(&converted, "{{$1| default(value=\"$2\") }}");
    let converted = DEFAULT_BARE.replace_all(&converted, "{{$1| default(value=\"$2\") }}");

    converted.into_owned()
}

/// Title and body templates, parsed once at startup and never mutated.
#[derive(Debug, Clone)]
pub struct TemplateSet {
    tera: Tera,
}

impl TemplateSet {
    /// Parses a title and a body template. Invalid syntax is a configuration
    /// error.
    pub fn new(title: &str, body: &str) -> Result<Self> {
        Self::build(title, body, Vec::new())
    }

    pub fn defaults() -> Result<Self> {
        Self::new(DEFAULT_TITLE_TEMPLATE, DEFAULT_BODY_TEMPLATE)
    }

    /// Loads templates from files. The first title file is the title template;
    /// any further title files are registered under their file names so the
    /// first one can `include` them. Without files the defaults are used.
    pub fn from_files(title_files: &[PathBuf], body_file: Option<&Path>) -> Result<Self> {
        let title = match title_files.first() {
            Some(path) => read_template(path)?,
            None => DEFAULT_TITLE_TEMPLATE.to_string(),
        };
        let body = match body_file {
            Some(path) => read_template(path)?,
            None => DEFAULT_BODY_TEMPLATE.to_string(),
        };

        let mut partials = Vec::new();
        for path in title_files.iter().skip(1) {
            let name = path
                .file_name()
                .and_then(|name| name.to_str())
                .ok_or_else(|| {
                    Error::Config(format!("invalid template file name: {}", path.display()))
                })?;
            partials.push((name.to_string(), read_template(path)?));
        }

        Self::build(&title, &body, partials)
    }

    fn build(title: &str, body: &str, partials: Vec<(String, String)>) -> Result<Self> {
        let mut templates = vec![
            (TITLE.to_string(), convert_go_to_tera(title)),
            (BODY.to_string(), convert_go_to_tera(body)),
        ];
        templates.extend(
            partials
                .into_iter()
                .map(|(name, source)| (name, convert_go_to_tera(&source))),
        );

        let mut tera = Tera::default();
        tera.add_raw_templates(templates)
            .map_err(|e| Error::Config(format!("Failed to parse template: {}", error_chain(&e))))?;

        Ok(Self { tera })
    }

    /// Renders the issue title. The title is also the key used to find an
    /// existing issue for the notification.
    pub fn render_title(&self, msg: &Notification) -> Result<String> {
        self.render(TITLE, msg)
    }

    /// Renders the issue body, prefixed with a hidden identifier derived from
    /// the group key.
    pub fn render_body(&self, msg: &Notification) -> Result<String> {
        let body = self.render(BODY, msg)?;
        Ok(format!("<!-- ID: {} -->\n{}", msg.id(), body))
    }

    fn render(&self, name: &str, msg: &Notification) -> Result<String> {
        let context = Context::from_serialize(msg).map_err(|e| {
            Error::Template(format!("Failed to build {} context: {}", name, error_chain(&e)))
        })?;

        self.tera.render(name, &context).map_err(|e| {
            Error::Template(format!(
                "Failed to render {} for {:?}: {}",
                name,
                msg.group_key,
                error_chain(&e)
            ))
        })
    }
}

fn read_template(path: &Path) -> Result<String> {
    debug!(path = %path.display(), "Loading template");
    std::fs::read_to_string(path).map_err(|e| {
        Error::Config(format!("Failed to read template {}: {}", path.display(), e))
    })
}
