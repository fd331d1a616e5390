//! Demo host site rendering posts and menus through the caches.
//!
//! Rendering is kept trivial; what matters is how each piece of a page goes
//! through its cache and how admin writes turn into domain events.

use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};

use serde::Deserialize;
use tracing::info;

use crate::application::content::{
    self, ContentCache, RenderArgs, TemplatePart, TemplatePartCache,
};
use crate::application::error::AppError;
use crate::application::navigation::{self, NavMenuArgs, NavMenuCache};
use crate::application::translation::Catalogs;
use crate::cache::lock::{rw_read, rw_write};
use crate::cache::{
    CacheConfig, EventBus, EventKind, InvalidationTrigger, ObjectStore, PageKind, RequestContext,
};
use crate::domain::entities::{MenuItemRecord, NavMenuRecord, PostId, PostRecord};
use crate::domain::error::DomainError;
use crate::domain::types::PostStatus;
use crate::infra::fixture::SiteFixture;

const SOURCE: &str = "application::site";

/// Text domain of the demo site's own strings.
pub const TEXT_DOMAIN: &str = "tinycache-demo";

const PRIMARY_MENU: &str = "primary";
const FOOTER_MENU: &str = "footer";
const ROBOTS_TXT: &str = "User-agent: *\nDisallow: /admin/\n";

/// Post fields accepted by admin writes.
#[derive(Debug, Clone, Deserialize)]
pub struct PostInput {
    pub title: String,
    pub body_html: String,
    pub status: PostStatus,
    #[serde(default)]
    pub password: Option<String>,
}

/// Menu fields accepted by admin writes.
#[derive(Debug, Clone, Deserialize)]
pub struct MenuInput {
    #[serde(default)]
    pub items: Vec<MenuItemRecord>,
}

pub struct SiteService {
    posts: RwLock<BTreeMap<PostId, PostRecord>>,
    menus: RwLock<BTreeMap<String, NavMenuRecord>>,
    next_menu_id: AtomicU64,
    content: ContentCache,
    parts: TemplatePartCache,
    navigation: NavMenuCache,
    catalogs: Catalogs,
    bus: Arc<EventBus>,
}

impl SiteService {
    pub fn new(
        store: Arc<dyn ObjectStore>,
        config: &CacheConfig,
        fixture: SiteFixture,
        catalogs: Catalogs,
    ) -> Self {
        let content = ContentCache::new(store.clone(), config);
        let parts = TemplatePartCache::new(store.clone(), config);
        let navigation = NavMenuCache::new(store.clone(), config);

        let bus = Arc::new(EventBus::new());
        let trigger = Arc::new(InvalidationTrigger::new(
            store,
            navigation.registry().clone(),
            content::INVALIDATION_RULES
                .iter()
                .chain(navigation::INVALIDATION_RULES)
                .copied(),
        ));
        trigger.register(&bus);

        let next_menu_id = fixture.menus.iter().map(|menu| menu.id).max().unwrap_or(0) + 1;
        let posts = fixture.posts.into_iter().map(|post| (post.id, post)).collect();
        let menus = fixture
            .menus
            .into_iter()
            .map(|menu| (menu.location.clone(), menu))
            .collect();

        Self {
            posts: RwLock::new(posts),
            menus: RwLock::new(menus),
            next_menu_id: AtomicU64::new(next_menu_id),
            content,
            parts,
            navigation,
            catalogs,
            bus,
        }
    }

    pub fn bus(&self) -> &Arc<EventBus> {
        &self.bus
    }

    pub fn catalogs(&self) -> &Catalogs {
        &self.catalogs
    }

    pub fn post(&self, id: PostId) -> Option<PostRecord> {
        rw_read(&self.posts, SOURCE, "post").get(&id).cloned()
    }

    /// Full HTML page for post `id`.
    pub fn render_post(&self, context: &RequestContext, id: PostId) -> Result<String, AppError> {
        let post = self
            .post(id)
            .filter(|post| post.status.is_published() || context.is_authenticated())
            .ok_or_else(|| DomainError::not_found("post"))?;

        let protected = post.requires_password();
        let context = if protected {
            context.clone().with_page(PageKind::PasswordRequired)
        } else {
            context.clone()
        };

        let header = self.parts.render(
            &context,
            &TemplatePart::new("header").version(post.id),
            || Ok::<_, AppError>(self.render_header()),
        )?;
        let primary = self.render_menu(&context, PRIMARY_MENU)?;
        let body = if protected {
            self.password_form()
        } else {
            self.content
                .render(&context, &post, &RenderArgs::default(), || {
                    Ok::<_, AppError>(post.body_html.clone())
                })?
        };
        let footer = self.render_menu(&context, FOOTER_MENU)?;

        Ok(format!(
            "<!doctype html>\n<html><head><title>{title}</title></head><body>\n{header}\n<nav>{primary}</nav>\n<article><h1>{title}</h1>\n{body}\n</article>\n<footer>{footer}</footer>\n</body></html>\n",
            title = escape_html(&post.title),
        ))
    }

    /// `robots.txt`, rendered as a template part so robots requests exercise the bypass.
    pub fn robots(&self, context: &RequestContext) -> Result<String, AppError> {
        self.parts
            .render(context, &TemplatePart::new("robots").version(1), || {
                Ok::<_, AppError>(ROBOTS_TXT.to_string())
            })
    }

    /// Create or replace post `id`, then announce the change.
    pub fn save_post(&self, id: PostId, input: PostInput) -> Result<PostRecord, AppError> {
        if input.title.trim().is_empty() {
            return Err(DomainError::validation("post title must not be empty").into());
        }

        let record = PostRecord {
            id,
            title: input.title,
            body_html: input.body_html,
            status: input.status,
            password: input.password.filter(|password| !password.is_empty()),
        };
        let previous = rw_write(&self.posts, SOURCE, "save_post").insert(id, record.clone());

        if let Some(previous) = previous {
            if previous.status != record.status {
                self.bus.dispatch(EventKind::PostStatusChanged {
                    post_id: id,
                    old: previous.status,
                    new: record.status,
                });
            }
            self.bus.dispatch(EventKind::PostEdited { post_id: id });
        }
        self.bus.dispatch(EventKind::PostSaved { post_id: id });

        info!(post_id = id, status = record.status.as_str(), "post saved");
        Ok(record)
    }

    /// Remove post `id`, trashing it first if it was live.
    pub fn delete_post(&self, id: PostId) -> Result<PostRecord, AppError> {
        let removed = rw_write(&self.posts, SOURCE, "delete_post")
            .remove(&id)
            .ok_or_else(|| DomainError::not_found("post"))?;

        if removed.status != PostStatus::Trash {
            self.bus.dispatch(EventKind::PostStatusChanged {
                post_id: id,
                old: removed.status,
                new: PostStatus::Trash,
            });
            self.bus.dispatch(EventKind::PostTrashed { post_id: id });
        }
        self.bus.dispatch(EventKind::PostDeleted { post_id: id });

        info!(post_id = id, "post deleted");
        Ok(removed)
    }

    /// Create or replace the menu at `location`.
    pub fn save_menu(&self, location: &str, input: MenuInput) -> Result<NavMenuRecord, AppError> {
        let location = location.trim();
        if location.is_empty() {
            return Err(DomainError::validation("menu location must not be empty").into());
        }

        let (record, created) = {
            let mut menus = rw_write(&self.menus, SOURCE, "save_menu");
            let existing_id = menus.get(location).map(|menu| menu.id);
            let id = existing_id
                .unwrap_or_else(|| self.next_menu_id.fetch_add(1, Ordering::SeqCst));
            let record = NavMenuRecord {
                id,
                location: location.to_string(),
                items: input.items,
            };
            menus.insert(location.to_string(), record.clone());
            (record, existing_id.is_none())
        };

        let event = if created {
            EventKind::NavMenuCreated { menu_id: record.id }
        } else {
            EventKind::NavMenuUpdated { menu_id: record.id }
        };
        self.bus.dispatch(event);

        info!(menu_id = record.id, location = %record.location, created, "menu saved");
        Ok(record)
    }

    pub fn delete_menu(&self, location: &str) -> Result<NavMenuRecord, AppError> {
        let removed = rw_write(&self.menus, SOURCE, "delete_menu")
            .remove(location)
            .ok_or_else(|| DomainError::not_found("menu"))?;

        self.bus.dispatch(EventKind::NavMenuDeleted {
            menu_id: removed.id,
        });
        info!(menu_id = removed.id, location, "menu deleted");
        Ok(removed)
    }

    fn render_menu(&self, context: &RequestContext, location: &str) -> Result<String, AppError> {
        let args = NavMenuArgs::location(location);
        self.navigation.render(context, &args, || {
            let menus = rw_read(&self.menus, SOURCE, "render_menu");
            Ok(menus
                .get(location)
                .map(|menu| menu_html(menu, &args, context.path()))
                .unwrap_or_default())
        })
    }

    fn render_header(&self) -> String {
        format!(
            "<header><a href=\"/\">{}</a></header>",
            escape_html(self.catalogs.translate(TEXT_DOMAIN, "Tiny cache demo"))
        )
    }

    fn password_form(&self) -> String {
        format!(
            "<form class=\"post-password\" method=\"post\"><label>{}</label><input type=\"password\" name=\"post_password\"></form>",
            escape_html(
                self.catalogs
                    .translate(TEXT_DOMAIN, "This content is password protected.")
            )
        )
    }
}

fn menu_html(menu: &NavMenuRecord, args: &NavMenuArgs, current_path: &str) -> String {
    let mut html = format!("<ul class=\"{}\">", escape_html(&args.menu_class));
    for item in &menu.items {
        let class = if item.href == current_path {
            " class=\"current-menu-item\""
        } else {
            ""
        };
        let _ = write!(
            html,
            "<li{class}><a href=\"{}\">{}</a></li>",
            escape_html(&item.href),
            escape_html(&item.label)
        );
    }
    html.push_str("</ul>");
    html
}

fn escape_html(raw: &str) -> String {
    let mut escaped = String::with_capacity(raw.len());
    for ch in raw.chars() {
        match ch {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            other => escaped.push(other),
        }
    }
    escaped
}
