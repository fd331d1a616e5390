mod common;

use std::sync::{Arc, Mutex};

use common::{RecordingStore, StoreCall};
use tinycache::application::content::CONTENT_GROUP;
use tinycache::application::navigation::GROUP as NAVMENU_GROUP;
use tinycache::application::site::{MenuInput, PostInput, SiteService};
use tinycache::application::translation::Catalogs;
use tinycache::cache::{CacheConfig, EventKind, EventName, REGISTRY_KEY, RequestContext};
use tinycache::domain::entities::MenuItemRecord;
use tinycache::domain::types::PostStatus;
use tinycache::infra::fixture::SiteFixture;

const FIXTURE: &str = r#"
[[posts]]
id = 42
title = "Hello"
body_html = "<p>Hello</p>"
status = "published"

[[posts]]
id = 43
title = "Later"
body_html = "<p>Later</p>"
status = "draft"

[[menus]]
id = 1
location = "primary"
items = [{ label = "Hello", href = "/posts/42" }]
"#;

fn site() -> (Arc<RecordingStore>, SiteService) {
    let store = RecordingStore::new();
    let fixture =
        SiteFixture::parse(FIXTURE, std::path::Path::new("fixture.toml")).expect("fixture");
    let site = SiteService::new(
        store.clone(),
        &CacheConfig::default(),
        fixture,
        Catalogs::new(),
    );
    (store, site)
}

fn record_events(site: &SiteService, names: &[EventName]) -> Arc<Mutex<Vec<&'static str>>> {
    let seen = Arc::new(Mutex::new(Vec::new()));
    for name in names {
        let seen = seen.clone();
        site.bus().subscribe(*name, 100, move |event| {
            seen.lock().expect("seen lock").push(event.kind.name().as_str());
        });
    }
    seen
}

fn edit(title: &str, status: PostStatus) -> PostInput {
    PostInput {
        title: title.to_string(),
        body_html: format!("<p>{title}</p>"),
        status,
        password: None,
    }
}

#[test]
fn editing_a_published_post_drops_its_content_and_all_menus() {
    let (store, site) = site();
    site.render_post(&RequestContext::get("/posts/42"), 42)
        .expect("render");
    assert!(store.peek(CONTENT_GROUP, "42").is_some());
    assert!(store.peek(NAVMENU_GROUP, REGISTRY_KEY).is_some());

    site.save_post(42, edit("Hello again", PostStatus::Published))
        .expect("save");

    assert!(store.peek(CONTENT_GROUP, "42").is_none());
    assert!(store.peek(NAVMENU_GROUP, REGISTRY_KEY).is_none());

    let page = site
        .render_post(&RequestContext::get("/posts/42"), 42)
        .expect("render");
    assert!(page.contains("Hello again"));
}

#[test]
fn save_dispatches_status_edit_and_save_in_order() {
    let (_store, site) = site();
    let seen = record_events(
        &site,
        &[
            EventName::PostStatusChanged,
            EventName::PostEdited,
            EventName::PostSaved,
        ],
    );

    site.save_post(43, edit("Later", PostStatus::Published))
        .expect("publish");
    site.save_post(99, edit("Fresh", PostStatus::Draft))
        .expect("create");

    assert_eq!(
        *seen.lock().expect("seen lock"),
        vec![
            "post_status_changed",
            "post_edited",
            "post_saved",
            "post_saved"
        ]
    );
}

#[test]
fn deleting_a_live_post_trashes_it_first() {
    let (_store, site) = site();
    let seen = record_events(
        &site,
        &[
            EventName::PostStatusChanged,
            EventName::PostTrashed,
            EventName::PostDeleted,
        ],
    );

    let removed = site.delete_post(42).expect("delete");

    assert_eq!(removed.id, 42);
    assert_eq!(
        *seen.lock().expect("seen lock"),
        vec!["post_status_changed", "post_trashed", "post_deleted"]
    );
    assert!(site.delete_post(42).is_err());
}

#[test]
fn status_change_between_unpublished_states_touches_nothing() {
    let (store, site) = site();
    store.clear_calls();

    let handled = site.bus().dispatch(EventKind::PostStatusChanged {
        post_id: 43,
        old: PostStatus::Draft,
        new: PostStatus::Pending,
    });

    assert!(handled > 0);
    assert!(store.writes().is_empty(), "unexpected writes: {:?}", store.writes());
}

#[test]
fn unpublishing_deletes_the_cached_content() {
    let (store, site) = site();
    site.render_post(&RequestContext::get("/posts/42"), 42)
        .expect("render");
    store.clear_calls();

    site.bus().dispatch(EventKind::PostStatusChanged {
        post_id: 42,
        old: PostStatus::Published,
        new: PostStatus::Draft,
    });

    assert!(store.writes().contains(&StoreCall::Delete {
        group: CONTENT_GROUP.to_string(),
        key: "42".to_string(),
    }));
    assert!(store.peek(CONTENT_GROUP, "42").is_none());
}

#[test]
fn menu_update_leaves_post_content_cached() {
    let (store, site) = site();
    site.render_post(&RequestContext::get("/posts/42"), 42)
        .expect("render");

    site.save_menu(
        "primary",
        MenuInput {
            items: vec![MenuItemRecord {
                label: "Renamed".to_string(),
                href: "/posts/42".to_string(),
            }],
        },
    )
    .expect("menu");

    assert!(store.peek(CONTENT_GROUP, "42").is_some());
    assert!(store.peek(NAVMENU_GROUP, REGISTRY_KEY).is_none());

    let page = site
        .render_post(&RequestContext::get("/posts/42"), 42)
        .expect("render");
    assert!(page.contains("Renamed"));
}

#[test]
fn cache_cleaned_event_drops_a_single_post() {
    let (store, site) = site();
    site.render_post(&RequestContext::get("/posts/42"), 42)
        .expect("render");

    site.bus().dispatch(EventKind::PostCacheCleaned { post_id: 42 });

    assert!(store.peek(CONTENT_GROUP, "42").is_none());
    assert!(store.peek(NAVMENU_GROUP, REGISTRY_KEY).is_some());
}

#[test]
fn drafts_are_hidden_from_anonymous_visitors() {
    let (store, site) = site();

    assert!(site.render_post(&RequestContext::get("/posts/43"), 43).is_err());

    let page = site
        .render_post(&RequestContext::get("/posts/43").authenticated(), 43)
        .expect("render");
    assert!(page.contains("Later"));
    assert!(store.peek(CONTENT_GROUP, "43").is_none());
}
