//! Layouts for rendered pages.

use minijinja::{context, Environment};

/// A navigation entry.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct NavItem {
    pub title: String,
    /// URL path
    pub path: String,
    /// Whether this is the page being rendered
    pub active: bool,
}

/// Values every page is rendered with.
#[derive(Debug, Clone, serde::Serialize)]
pub struct Context {
    /// Page title
    pub title: String,
    pub site_title: String,
    /// Rendered body HTML, empty for template pages
    pub content: String,
    pub nav: Vec<NavItem>,
    pub base_url: String,
}

/// Template engine using minijinja.
pub struct TemplateEngine {
    env: Environment<'static>,
}

impl TemplateEngine {
    /// Create an engine with the built-in layouts.
    pub fn new() -> Self {
        let mut env = Environment::new();

        env.add_template_owned("base.html".to_string(), BASE_TEMPLATE.to_string())
            .expect("Failed to add base template");
        env.add_template_owned("page.html".to_string(), PAGE_TEMPLATE.to_string())
            .expect("Failed to add page template");
        env.add_template_owned("nav.html".to_string(), NAV_TEMPLATE.to_string())
            .expect("Failed to add nav template");

        Self { env }
    }

    /// Render a markdown page body into the default layout.
    pub fn render_page(&self, context: &Context) -> Result<String, minijinja::Error> {
        self.env.get_template("page.html")?.render(to_value(context))
    }

    /// Render a user-authored template page.
    ///
    /// The source may extend `base.html` or include `nav.html`.
    pub fn render_source(&self, source: &str, context: &Context) -> Result<String, minijinja::Error> {
        self.env.render_str(source, to_value(context))
    }
}

impl Default for TemplateEngine {
    fn default() -> Self {
        Self::new()
    }
}

fn to_value(context: &Context) -> minijinja::Value {
    context! {
        title => &context.title,
        site_title => &context.site_title,
        content => &context.content,
        nav => &context.nav,
        base_url => &context.base_url,
    }
}

const BASE_TEMPLATE: &str = r##"<!DOCTYPE html>
<html lang="en">
<head>
<meta charset="utf-8">
<meta name="viewport" content="width=device-width, initial-scale=1">
<title>{{ title }} - {{ site_title }}</title>
</head>
<body>
<header class="site-header">{% include "nav.html" %}</header>
<main class="site-main">
{% block content %}{% endblock %}
</main>
</body>
</html>
"##;

const PAGE_TEMPLATE: &str = r##"{% extends "base.html" %}
{% block content %}<article>
{{ content | safe }}
</article>{% endblock %}"##;

const NAV_TEMPLATE: &str = r##"<a class="site-title" href="{{ base_url }}">{{ site_title }}</a>
{% if nav %}<nav>
<ul>
{%- for item in nav %}
<li{% if item.active %} class="nav-item active"{% else %} class="nav-item"{% endif %}><a href="{{ item.path }}">{{ item.title }}</a></li>
{%- endfor %}
</ul>
</nav>{% endif %}"##;
