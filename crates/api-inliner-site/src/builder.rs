//! Static site builder.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use pulldown_cmark::{html, Event, HeadingLevel, Options, Parser, Tag, TagEnd};
use walkdir::WalkDir;

use api_inliner_core::{BuildContext, BuildPlugin, HtmlPage, PluginError};

use crate::templates::{Context, NavItem, TemplateEngine};

/// Configuration for building a static site.
#[derive(Debug, Clone)]
pub struct SiteConfig {
    /// Source pages directory
    pub pages_dir: PathBuf,

    /// Output directory
    pub output_dir: PathBuf,

    /// Site title
    pub title: String,

    /// Base URL for the site
    pub base_url: String,
}

impl Default for SiteConfig {
    fn default() -> Self {
        Self {
            pages_dir: PathBuf::from("pages"),
            output_dir: PathBuf::from("dist"),
            title: "Site".to_string(),
            base_url: "/".to_string(),
        }
    }
}

/// Result of a build operation.
#[derive(Debug)]
pub struct BuildResult {
    /// Number of pages generated
    pub pages: usize,

    /// Total build time in milliseconds
    pub duration_ms: u64,

    /// Output directory
    pub output_dir: PathBuf,
}

/// Errors that can occur during build.
#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    #[error("Failed to read pages directory: {0}")]
    ReadError(String),

    #[error("Failed to render template: {path}: {message}")]
    TemplateError { path: String, message: String },

    #[error("Failed to write output: {0}")]
    WriteError(String),

    #[error("Plugin failed: {0}")]
    Plugin(#[from] PluginError),
}

#[derive(Debug)]
enum PageKind {
    /// Markdown rendered into the default layout
    Markdown { title: String, body: String },
    /// minijinja template rendered as-is
    Template { source: String },
}

/// A page to be built.
#[derive(Debug)]
struct PageInfo {
    /// Relative path from pages dir
    relative_path: PathBuf,

    /// Output path relative to the output dir
    output_path: PathBuf,

    kind: PageKind,
}

/// Static site builder.
pub struct StaticBuilder {
    config: SiteConfig,
    templates: TemplateEngine,
    plugins: Vec<Arc<dyn BuildPlugin>>,
}

impl StaticBuilder {
    /// Create a new static builder.
    pub fn new(config: SiteConfig) -> Self {
        Self {
            config,
            templates: TemplateEngine::new(),
            plugins: Vec::new(),
        }
    }

    /// Attach a plugin. Hooks run in attachment order.
    pub fn plugin(mut self, plugin: Arc<dyn BuildPlugin>) -> Self {
        self.plugins.push(plugin);
        self
    }

    /// Build the static site.
    pub async fn build(&self) -> Result<BuildResult, BuildError> {
        let start = Instant::now();

        fs::create_dir_all(&self.config.output_dir)
            .map_err(|e| BuildError::WriteError(e.to_string()))?;

        let ctx = BuildContext {
            output_dir: self.config.output_dir.clone(),
        };

        let mut started = Vec::new();
        let mut outcome: Result<usize, BuildError> = Ok(0);
        for plugin in &self.plugins {
            tracing::debug!("before_run: {}", plugin.name());
            if let Err(e) = plugin.before_run(&ctx).await {
                outcome = Err(e.into());
                break;
            }
            started.push(plugin);
        }

        if outcome.is_ok() {
            outcome = self.emit_pages().await;
        }

        // Started plugins always finish, even when a page failed
        for plugin in started {
            tracing::debug!("after_emit: {}", plugin.name());
            if let Err(e) = plugin.after_emit(&ctx).await {
                if outcome.is_ok() {
                    outcome = Err(e.into());
                } else {
                    tracing::warn!("{} failed to finish: {}", plugin.name(), e);
                }
            }
        }

        Ok(BuildResult {
            pages: outcome?,
            duration_ms: start.elapsed().as_millis() as u64,
            output_dir: self.config.output_dir.clone(),
        })
    }

    /// Render, hook and write every page. Returns the page count.
    async fn emit_pages(&self) -> Result<usize, BuildError> {
        let pages = self.discover_pages()?;
        let nav = self.build_navigation(&pages);

        for page in &pages {
            let mut html_page = HtmlPage {
                path: page.output_path.clone(),
                html: self.render(page, &nav)?,
            };

            for plugin in &self.plugins {
                plugin.before_emit(&mut html_page).await?;
            }

            self.write_page(&html_page)?;
        }

        Ok(pages.len())
    }

    /// Discover markdown and template pages, sorted by path.
    fn discover_pages(&self) -> Result<Vec<PageInfo>, BuildError> {
        let mut pages = Vec::new();

        if !self.config.pages_dir.exists() {
            return Err(BuildError::ReadError(format!(
                "Pages directory not found: {}",
                self.config.pages_dir.display()
            )));
        }

        for entry in WalkDir::new(&self.config.pages_dir)
            .follow_links(true)
            .sort_by_file_name()
            .into_iter()
            .filter_map(|e| e.ok())
        {
            let path = entry.path();

            if !path.is_file() {
                continue;
            }

            let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("");
            if ext != "md" && ext != "html" {
                continue;
            }

            let content = fs::read_to_string(path)
                .map_err(|e| BuildError::ReadError(format!("{}: {}", path.display(), e)))?;

            let relative_path = path
                .strip_prefix(&self.config.pages_dir)
                .unwrap_or(path)
                .to_path_buf();

            let kind = if ext == "md" {
                let title = first_heading(&content).unwrap_or_else(|| {
                    capitalize(
                        relative_path
                            .file_stem()
                            .and_then(|s| s.to_str())
                            .unwrap_or("Untitled"),
                    )
                });
                PageKind::Markdown {
                    title,
                    body: render_markdown(&content),
                }
            } else {
                PageKind::Template { source: content }
            };

            let output_path = calculate_output_path(&relative_path, &kind);

            pages.push(PageInfo {
                relative_path,
                output_path,
                kind,
            });
        }

        Ok(pages)
    }

    /// Flat navigation over markdown pages, ordered by output path.
    fn build_navigation(&self, pages: &[PageInfo]) -> Vec<NavItem> {
        let mut entries: Vec<(&Path, &str)> = pages
            .iter()
            .filter_map(|page| match &page.kind {
                PageKind::Markdown { title, .. } => Some((page.output_path.as_path(), title.as_str())),
                PageKind::Template { .. } => None,
            })
            .collect();
        entries.sort_by(|a, b| a.0.cmp(b.0));

        entries
            .into_iter()
            .map(|(path, title)| NavItem {
                title: title.to_string(),
                path: self.path_to_url(path),
                active: false,
            })
            .collect()
    }

    /// Convert an output path to a URL.
    fn path_to_url(&self, path: &Path) -> String {
        if path.file_name().and_then(|f| f.to_str()) == Some("index.html") {
            let dir = path
                .parent()
                .map(|p| p.to_string_lossy().replace('\\', "/"))
                .unwrap_or_default();

            if dir.is_empty() {
                self.config.base_url.clone()
            } else {
                format!("{}{}/", self.config.base_url, dir)
            }
        } else {
            format!(
                "{}{}",
                self.config.base_url,
                path.to_string_lossy().replace('\\', "/")
            )
        }
    }

    /// Render a single page to HTML.
    fn render(&self, page: &PageInfo, nav: &[NavItem]) -> Result<String, BuildError> {
        let url = self.path_to_url(&page.output_path);
        let nav = nav
            .iter()
            .cloned()
            .map(|mut item| {
                item.active = item.path == url;
                item
            })
            .collect();

        let template_error = |e: minijinja::Error| BuildError::TemplateError {
            path: page.relative_path.display().to_string(),
            message: e.to_string(),
        };

        match &page.kind {
            PageKind::Markdown { title, body } => {
                let context = Context {
                    title: title.clone(),
                    site_title: self.config.title.clone(),
                    content: body.clone(),
                    nav,
                    base_url: self.config.base_url.clone(),
                };
                self.templates.render_page(&context).map_err(template_error)
            }
            PageKind::Template { source } => {
                let title = page
                    .relative_path
                    .file_stem()
                    .and_then(|s| s.to_str())
                    .map(capitalize)
                    .unwrap_or_default();
                let context = Context {
                    title,
                    site_title: self.config.title.clone(),
                    content: String::new(),
                    nav,
                    base_url: self.config.base_url.clone(),
                };
                self.templates
                    .render_source(source, &context)
                    .map_err(template_error)
            }
        }
    }

    fn write_page(&self, page: &HtmlPage) -> Result<(), BuildError> {
        let path = self.config.output_dir.join(&page.path);

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| BuildError::WriteError(e.to_string()))?;
        }

        fs::write(&path, &page.html)
            .map_err(|e| BuildError::WriteError(format!("{}: {}", path.display(), e)))
    }
}

/// Calculate the output path for a page, relative to the output dir.
fn calculate_output_path(relative: &Path, kind: &PageKind) -> PathBuf {
    let parent = relative.parent().unwrap_or(Path::new(""));
    let stem = relative
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("index");

    match kind {
        // pages/index.md -> dist/index.html
        _ if stem == "index" => parent.join("index.html"),
        // pages/about.md -> dist/about/index.html
        PageKind::Markdown { .. } => parent.join(stem).join("index.html"),
        // pages/about.html -> dist/about.html
        PageKind::Template { .. } => relative.to_path_buf(),
    }
}

fn render_markdown(content: &str) -> String {
    let options = Options::ENABLE_TABLES
        | Options::ENABLE_FOOTNOTES
        | Options::ENABLE_STRIKETHROUGH
        | Options::ENABLE_TASKLISTS;

    let parser = Parser::new_ext(content, options);

    let mut html_output = String::new();
    html::push_html(&mut html_output, parser);

    html_output
}

/// Text of the first level-1 heading.
fn first_heading(content: &str) -> Option<String> {
    let mut title: Option<String> = None;

    for event in Parser::new(content) {
        match event {
            Event::Start(Tag::Heading {
                level: HeadingLevel::H1,
                ..
            }) => title = Some(String::new()),
            Event::End(TagEnd::Heading(HeadingLevel::H1)) => break,
            Event::Text(text) | Event::Code(text) => {
                if let Some(title) = title.as_mut() {
                    title.push_str(&text);
                }
            }
            _ => {}
        }
    }

    title.map(|t| t.trim().to_string()).filter(|t| !t.is_empty())
}

/// Capitalize first letter of a string.
fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(c) => c.to_uppercase().collect::<String>() + chars.as_str(),
        None => String::new(),
    }
}
