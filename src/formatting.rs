//! Message composition.
//!
//! Templates are grouped in families keyed by notification kind (`graphite`,
//! `url`), each offering some of the variants in [`Variant`]. Plain-text
//! variants are rendered without escaping, the `html` variant escapes values.

use crate::core::{Alert, AlertEvent, Level, ReactorInfo};
use crate::notification::NotifyError;
use chrono::Utc;
use handlebars::{handlebars_helper, Handlebars};
use serde::Serialize;
use serde_json::Value;
use std::fmt;

/// The message variant to render from a template family.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Variant {
    /// One line summary, used for mail subjects and non-graphite chat messages.
    Short,
    /// Chat message with mentions.
    Slack,
    /// Plain-text mail body.
    Text,
    /// HTML mail body.
    Html,
}

impl Variant {
    pub fn as_str(&self) -> &'static str {
        match self {
            Variant::Short => "short",
            Variant::Slack => "slack",
            Variant::Text => "text",
            Variant::Html => "html",
        }
    }
}

impl fmt::Display for Variant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// (family, variant, source)
const BUILTIN_TEMPLATES: [(&str, Variant, &str); 7] = [
    ("graphite", Variant::Short, include_str!("templates/graphite/short.hbs")),
    ("graphite", Variant::Slack, include_str!("templates/graphite/slack.hbs")),
    ("graphite", Variant::Text, include_str!("templates/graphite/text.hbs")),
    ("graphite", Variant::Html, include_str!("templates/graphite/html.hbs")),
    ("url", Variant::Short, include_str!("templates/url/short.hbs")),
    ("url", Variant::Text, include_str!("templates/url/text.hbs")),
    ("url", Variant::Html, include_str!("templates/url/html.hbs")),
];

handlebars_helper!(upper: |s: str| s.to_uppercase());

/// The data a template is rendered with.
#[derive(Debug, Serialize)]
pub struct RenderContext<'a> {
    pub level: Level,
    pub reactor: &'a ReactorInfo,
    pub alert: &'a Alert,
    /// Resolved mentions, already formatted and joined.
    pub mentions: String,
    pub value: String,
    pub target: Option<&'a str>,
    pub rule: Option<&'a str>,
    /// Channel options exposed to mail templates.
    pub options: Option<Value>,
    /// Render time.
    pub dt: String,
}

impl<'a> RenderContext<'a> {
    pub fn new(event: &'a AlertEvent, reactor: &'a ReactorInfo) -> Self {
        Self {
            level: event.level,
            reactor,
            alert: &event.alert,
            mentions: String::new(),
            value: format_value(event.value),
            target: event.target.as_deref(),
            rule: None,
            options: None,
            dt: Utc::now().format("%Y-%m-%d %H:%M:%S UTC").to_string(),
        }
    }

    pub fn with_mentions(mut self, mentions: String) -> Self {
        self.mentions = mentions;
        self
    }

    pub fn with_rule(mut self, rule: Option<&'a str>) -> Self {
        self.rule = rule;
        self
    }

    pub fn with_options(mut self, options: Value) -> Self {
        self.options = Some(options);
        self
    }
}

/// Selects and renders message templates.
pub struct MessageComposer {
    plain: Handlebars<'static>,
    html: Handlebars<'static>,
    reactor: ReactorInfo,
}

impl MessageComposer {
    /// Creates a composer with the built-in template families registered.
    pub fn new(reactor: ReactorInfo) -> Result<Self, NotifyError> {
        let mut plain = Handlebars::new();
        plain.register_escape_fn(handlebars::no_escape);
        plain.register_helper("upper", Box::new(upper));

        let mut html = Handlebars::new();
        html.register_helper("upper", Box::new(upper));

        let mut composer = Self {
            plain,
            html,
            reactor,
        };
        for (family, variant, source) in BUILTIN_TEMPLATES {
            composer.register(family, variant, source)?;
        }
        Ok(composer)
    }

    /// Registers (or replaces) the template for a family and variant.
    pub fn register(
        &mut self,
        family: &str,
        variant: Variant,
        source: &str,
    ) -> Result<(), NotifyError> {
        let name = template_name(family, variant);
        self.registry_mut(variant)
            .register_template_string(&name, source)
            .map_err(|e| NotifyError::Config(format!("invalid template '{}': {}", name, e)))
    }

    pub fn has_template(&self, family: &str, variant: Variant) -> bool {
        self.registry(variant)
            .has_template(&template_name(family, variant))
    }

    pub fn reactor(&self) -> &ReactorInfo {
        &self.reactor
    }

    /// A context holding the event fields and reactor metadata.
    pub fn context<'a>(&'a self, event: &'a AlertEvent) -> RenderContext<'a> {
        RenderContext::new(event, &self.reactor)
    }

    /// Renders `variant` of the `family` templates, with surrounding
    /// whitespace stripped.
    pub fn render(
        &self,
        family: &str,
        variant: Variant,
        context: &RenderContext<'_>,
    ) -> Result<String, NotifyError> {
        if !self.has_template(family, variant) {
            return Err(NotifyError::MissingTemplate {
                family: family.to_string(),
                variant: variant.as_str(),
            });
        }
        let rendered = self
            .registry(variant)
            .render(&template_name(family, variant), context)?;
        Ok(rendered.trim().to_string())
    }

    /// Renders the event's template family with a standard context.
    pub fn compose(
        &self,
        event: &AlertEvent,
        variant: Variant,
        mentions: String,
    ) -> Result<String, NotifyError> {
        let context = self.context(event).with_mentions(mentions);
        self.render(&event.ntype, variant, &context)
    }

    fn registry(&self, variant: Variant) -> &Handlebars<'static> {
        match variant {
            Variant::Html => &self.html,
            _ => &self.plain,
        }
    }

    fn registry_mut(&mut self, variant: Variant) -> &mut Handlebars<'static> {
        match variant {
            Variant::Html => &mut self.html,
            _ => &mut self.plain,
        }
    }
}

fn template_name(family: &str, variant: Variant) -> String {
    format!("{}/{}", family, variant)
}

/// Formats a measured value, keeping one decimal for integral values.
pub fn format_value(value: f64) -> String {
    if value.is_finite() && value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{:.1}", value)
    } else {
        value.to_string()
    }
}
