//! KV backend tests
//!
//! Exercises the sled adapter through the repository ports, using a
//! temporary data directory per test.

use std::collections::BTreeMap;
use std::sync::{Arc, Once};

use chrono::{DateTime, Utc};
use driplnk::config::init_config;
use driplnk::domain::{AnalyticsEvent, EventType, Link, LinkType, User};
use driplnk::repository::Repositories;
use driplnk::storage::KvStorage;
use tempfile::TempDir;

static INIT: Once = Once::new();

fn init_test_config() {
    INIT.call_once(|| {
        init_config(None).expect("Failed to load test configuration");
    });
}

fn at(secs: i64) -> DateTime<Utc> {
    DateTime::from_timestamp(1_767_225_600 + secs, 0).unwrap()
}

fn create_test_user(id: &str, email: &str, handle: &str) -> User {
    let mut user = User::new(id, email, handle);
    user.title = format!("{}'s page", handle);
    user.created_at = at(0);
    user.updated_at = at(0);
    user
}

fn create_test_link(id: &str, user_id: &str, order: i32) -> Link {
    Link::new(id, user_id, format!("Link {}", id), format!("https://example.com/{}", id), order)
}

fn meta_event(event_type: EventType, user_id: &str, link_id: Option<&str>) -> AnalyticsEvent {
    let mut event = AnalyticsEvent::new(event_type, "visitor-1");
    event.user_id = Some(user_id.to_string());
    event.link_id = link_id.map(str::to_string);
    event.meta.insert(AnalyticsEvent::META_COUNTRY.into(), "US".into());
    event.meta.insert(AnalyticsEvent::META_DEVICE_TYPE.into(), "mobile".into());
    event
}

fn create_temp_storage() -> (Arc<KvStorage>, Repositories, TempDir) {
    init_test_config();
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let storage = Arc::new(
        KvStorage::open(temp_dir.path().join("driplnk.db"), false).expect("Failed to open KV store"),
    );
    let repos = Repositories::from_backend(storage.clone());
    (storage, repos, temp_dir)
}

async fn seed_users(repos: &Repositories, ids: &[&str]) {
    for id in ids {
        repos
            .users
            .save(&create_test_user(id, &format!("{}@example.com", id), id))
            .await
            .unwrap();
    }
}

#[cfg(test)]
mod user_tests {
    use super::*;

    #[tokio::test]
    async fn test_user_round_trip_by_every_key() {
        let (_storage, repos, _dir) = create_temp_storage();
        let mut user = create_test_user("u1", "a@x.com", "alice");
        user.seo_meta.title = "Alice".into();
        user.theme.primary_color = "#ff0066".into();
        repos.users.save(&user).await.unwrap();

        assert_eq!(repos.users.get_by_id("u1").await.unwrap(), user);
        assert_eq!(repos.users.get_by_email("a@x.com").await.unwrap(), user);
        assert_eq!(repos.users.get_by_handle("alice").await.unwrap(), user);
    }

    #[tokio::test]
    async fn test_missing_user_is_not_found() {
        let (_storage, repos, _dir) = create_temp_storage();
        assert!(repos.users.get_by_id("nobody").await.unwrap_err().is_not_found());
        assert!(repos.users.get_by_email("no@x.com").await.unwrap_err().is_not_found());
        assert!(repos.users.get_by_handle("nobody").await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn test_duplicate_handle_is_conflict() {
        let (_storage, repos, _dir) = create_temp_storage();
        repos
            .users
            .save(&create_test_user("u1", "a@x.com", "alice"))
            .await
            .unwrap();

        let err = repos
            .users
            .save(&create_test_user("u2", "b@y.com", "alice"))
            .await
            .unwrap_err();
        assert!(err.is_conflict(), "unexpected error: {}", err);

        // 冲突的写入不能留下任何索引
        assert!(repos.users.get_by_email("b@y.com").await.unwrap_err().is_not_found());
        assert!(repos.users.get_by_id("u2").await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn test_duplicate_email_is_conflict() {
        let (_storage, repos, _dir) = create_temp_storage();
        repos
            .users
            .save(&create_test_user("u1", "a@x.com", "alice"))
            .await
            .unwrap();
        let err = repos
            .users
            .save(&create_test_user("u2", "a@x.com", "bob"))
            .await
            .unwrap_err();
        assert!(err.is_conflict());
    }

    #[tokio::test]
    async fn test_save_is_idempotent_upsert() {
        let (_storage, repos, _dir) = create_temp_storage();
        let mut user = create_test_user("u1", "a@x.com", "alice");
        repos.users.save(&user).await.unwrap();
        repos.users.save(&user).await.unwrap();

        user.email = "alice@new.com".into();
        repos.users.save(&user).await.unwrap();

        assert!(repos.users.get_by_email("a@x.com").await.unwrap_err().is_not_found());
        assert_eq!(repos.users.get_by_email("alice@new.com").await.unwrap().id, "u1");
        assert_eq!(repos.users.list_all().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_list_all_ordered_by_created_at() {
        let (_storage, repos, _dir) = create_temp_storage();
        let mut late = create_test_user("a-late", "late@x.com", "late");
        late.created_at = at(100);
        let mut early = create_test_user("z-early", "early@x.com", "early");
        early.created_at = at(10);
        repos.users.save(&late).await.unwrap();
        repos.users.save(&early).await.unwrap();

        let ids: Vec<String> = repos.users.list_all().await.unwrap().into_iter().map(|u| u.id).collect();
        assert_eq!(ids, vec!["z-early", "a-late"]);
    }

    #[tokio::test]
    async fn test_key_delimiters_in_values_are_safe() {
        let (_storage, repos, _dir) = create_temp_storage();
        let user = create_test_user("u:1", "a:b%c@x.com", "al:ice");
        repos.users.save(&user).await.unwrap();

        assert_eq!(repos.users.get_by_email("a:b%c@x.com").await.unwrap().id, "u:1");
        assert_eq!(repos.users.get_by_handle("al:ice").await.unwrap().id, "u:1");
        assert!(repos.users.get_by_handle("al").await.unwrap_err().is_not_found());
    }
}

#[cfg(test)]
mod link_tests {
    use super::*;

    #[tokio::test]
    async fn test_link_round_trip() {
        let (_storage, repos, _dir) = create_temp_storage();
        seed_users(&repos, &["u1"]).await;
        let mut link = create_test_link("l1", "u1", 0);
        link.link_type = LinkType::Social;
        link.metadata = BTreeMap::from([("platform".to_string(), "github".to_string())]);
        repos.links.save(&link).await.unwrap();

        assert_eq!(repos.links.get_by_id("l1").await.unwrap(), link);
    }

    #[tokio::test]
    async fn test_delete_keeps_gaps_in_order() {
        let (_storage, repos, _dir) = create_temp_storage();
        seed_users(&repos, &["u1"]).await;
        for (i, id) in ["l1", "l2", "l3"].iter().enumerate() {
            repos.links.save(&create_test_link(id, "u1", i as i32)).await.unwrap();
        }

        repos.links.delete("l2").await.unwrap();

        assert!(repos.links.get_by_id("l2").await.unwrap_err().is_not_found());
        let links = repos.links.list_by_user("u1").await.unwrap();
        let listed: Vec<(&str, i32)> = links.iter().map(|l| (l.id.as_str(), l.order)).collect();
        assert_eq!(listed, vec![("l1", 0), ("l3", 2)]);
    }

    #[tokio::test]
    async fn test_delete_missing_link_is_not_found() {
        let (_storage, repos, _dir) = create_temp_storage();
        assert!(repos.links.delete("ghost").await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn test_list_by_user_is_isolated() {
        let (_storage, repos, _dir) = create_temp_storage();
        seed_users(&repos, &["alice", "bob", "alice2"]).await;
        repos.links.save(&create_test_link("a1", "alice", 0)).await.unwrap();
        repos.links.save(&create_test_link("b1", "bob", 0)).await.unwrap();
        // "alice" 是 "alice2" 的前缀，扫描不能串号
        repos.links.save(&create_test_link("a2-1", "alice2", 0)).await.unwrap();

        let ids: Vec<String> = repos
            .links
            .list_by_user("alice")
            .await
            .unwrap()
            .into_iter()
            .map(|l| l.id)
            .collect();
        assert_eq!(ids, vec!["a1"]);
    }

    #[tokio::test]
    async fn test_owner_change_moves_index() {
        let (_storage, repos, _dir) = create_temp_storage();
        seed_users(&repos, &["alice", "bob"]).await;
        let mut link = create_test_link("l1", "alice", 0);
        repos.links.save(&link).await.unwrap();

        link.user_id = "bob".into();
        repos.links.save(&link).await.unwrap();

        assert!(repos.links.list_by_user("alice").await.unwrap().is_empty());
        assert_eq!(repos.links.list_by_user("bob").await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_reorder_assigns_positions_and_skips_foreign_ids() {
        let (_storage, repos, _dir) = create_temp_storage();
        seed_users(&repos, &["u1", "u2"]).await;
        for (i, id) in ["l1", "l2", "l3"].iter().enumerate() {
            repos.links.save(&create_test_link(id, "u1", i as i32)).await.unwrap();
        }
        repos.links.save(&create_test_link("other", "u2", 7)).await.unwrap();

        let order: Vec<String> = ["l3", "other", "missing", "l1", "l2"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        repos.links.reorder("u1", &order).await.unwrap();

        let listed: Vec<(String, i32)> = repos
            .links
            .list_by_user("u1")
            .await
            .unwrap()
            .into_iter()
            .map(|l| (l.id, l.order))
            .collect();
        assert_eq!(
            listed,
            vec![("l3".to_string(), 0), ("l1".to_string(), 3), ("l2".to_string(), 4)]
        );
        assert_eq!(repos.links.get_by_id("other").await.unwrap().order, 7);
    }

    #[tokio::test]
    async fn test_link_for_missing_owner_is_not_found() {
        let (_storage, repos, _dir) = create_temp_storage();
        let err = repos
            .links
            .save(&create_test_link("l1", "ghost", 0))
            .await
            .unwrap_err();
        assert!(err.is_not_found(), "{:?}", err);
        assert!(!err.is_internal());
        assert!(repos.links.get_by_id("l1").await.unwrap_err().is_not_found());
        assert!(repos.links.list_by_user("ghost").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_equal_order_ties_sorted_by_id() {
        let (_storage, repos, _dir) = create_temp_storage();
        seed_users(&repos, &["u1"]).await;
        // "a:" 转义为 "a%3A"，索引中排在 "a0" 之前；原始 id 中 '0' < ':'
        for id in ["b", "a:", "a0", "a"] {
            repos.links.save(&create_test_link(id, "u1", 1)).await.unwrap();
        }
        repos.links.save(&create_test_link("z", "u1", 0)).await.unwrap();

        let ids: Vec<String> = repos
            .links
            .list_by_user("u1")
            .await
            .unwrap()
            .into_iter()
            .map(|l| l.id)
            .collect();
        assert_eq!(ids, vec!["z", "a", "a0", "a:", "b"]);
    }
}

#[cfg(test)]
mod concurrency_tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_saves_claim_handle_once() {
        let (_storage, repos, _dir) = create_temp_storage();

        let mut handles = Vec::new();
        for i in 0..16 {
            let users = repos.users.clone();
            handles.push(tokio::spawn(async move {
                let user = create_test_user(&format!("u{}", i), &format!("u{}@x.com", i), "taken");
                users.save(&user).await
            }));
        }

        let mut saved = Vec::new();
        for (i, handle) in handles.into_iter().enumerate() {
            match handle.await.unwrap() {
                Ok(()) => saved.push(format!("u{}", i)),
                Err(e) => assert!(e.is_conflict(), "unexpected error: {:?}", e),
            }
        }
        assert_eq!(saved.len(), 1, "winners: {:?}", saved);

        let owner = repos.users.get_by_handle("taken").await.unwrap();
        assert_eq!(owner.id, saved[0]);
        assert_eq!(repos.users.list_all().await.unwrap().len(), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_reorders_never_mix_lists() {
        let (_storage, repos, _dir) = create_temp_storage();
        seed_users(&repos, &["u1"]).await;
        let ids = ["l1", "l2", "l3", "l4"];
        for (i, id) in ids.iter().enumerate() {
            repos.links.save(&create_test_link(id, "u1", i as i32)).await.unwrap();
        }

        let forward: Vec<String> = ids.iter().map(|s| s.to_string()).collect();
        let backward: Vec<String> = ids.iter().rev().map(|s| s.to_string()).collect();
        let mut handles = Vec::new();
        for i in 0..8 {
            let links = repos.links.clone();
            let order = if i % 2 == 0 { forward.clone() } else { backward.clone() };
            handles.push(tokio::spawn(async move { links.reorder("u1", &order).await }));
        }
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        let listed: Vec<String> = repos
            .links
            .list_by_user("u1")
            .await
            .unwrap()
            .into_iter()
            .map(|l| l.id)
            .collect();
        assert!(listed == forward || listed == backward, "mixed order: {:?}", listed);
    }

    #[tokio::test]
    async fn test_cancelled_reorder_is_all_or_nothing() {
        let (_storage, repos, _dir) = create_temp_storage();
        seed_users(&repos, &["u1"]).await;
        let ids = ["l1", "l2", "l3"];
        for (i, id) in ids.iter().enumerate() {
            repos.links.save(&create_test_link(id, "u1", i as i32)).await.unwrap();
        }

        let reversed: Vec<String> = ids.iter().rev().map(|s| s.to_string()).collect();
        let _ = tokio::time::timeout(Duration::ZERO, repos.links.reorder("u1", &reversed)).await;

        let listed: Vec<(String, i32)> = repos
            .links
            .list_by_user("u1")
            .await
            .unwrap()
            .into_iter()
            .map(|l| (l.id, l.order))
            .collect();
        let untouched = vec![("l1".to_string(), 0), ("l2".to_string(), 1), ("l3".to_string(), 2)];
        let applied = vec![("l3".to_string(), 0), ("l2".to_string(), 1), ("l1".to_string(), 2)];
        assert!(listed == untouched || listed == applied, "partial reorder: {:?}", listed);
    }

    #[tokio::test]
    async fn test_cancelled_user_save_is_all_or_nothing() {
        let (_storage, repos, _dir) = create_temp_storage();
        let user = create_test_user("u1", "a@x.com", "alice");
        let _ = tokio::time::timeout(Duration::ZERO, repos.users.save(&user)).await;

        let by_id = repos.users.get_by_id("u1").await;
        let by_email = repos.users.get_by_email("a@x.com").await;
        let by_handle = repos.users.get_by_handle("alice").await;
        match by_id {
            Ok(stored) => {
                assert_eq!(stored, user);
                assert_eq!(by_email.unwrap(), user);
                assert_eq!(by_handle.unwrap(), user);
            }
            Err(e) => {
                assert!(e.is_not_found());
                assert!(by_email.unwrap_err().is_not_found());
                assert!(by_handle.unwrap_err().is_not_found());
            }
        }
    }
}

#[cfg(test)]
mod analytics_tests {
    use super::*;

    #[tokio::test]
    async fn test_summary_counts_views_clicks_country_device() {
        let (_storage, repos, _dir) = create_temp_storage();
        repos.analytics.save_event(&meta_event(EventType::View, "U", None)).await.unwrap();
        repos.analytics.save_event(&meta_event(EventType::View, "U", None)).await.unwrap();
        repos
            .analytics
            .save_event(&meta_event(EventType::Click, "U", Some("L1")))
            .await
            .unwrap();
        repos.analytics.save_event(&meta_event(EventType::View, "other", None)).await.unwrap();

        let summary = repos.analytics.get_summary("U", None).await.unwrap();
        assert_eq!(summary.total_views, 2);
        assert_eq!(summary.total_clicks, 1);
        assert_eq!(summary.by_country.get("US"), Some(&3));
        assert_eq!(summary.by_device.get("mobile"), Some(&3));
    }

    #[tokio::test]
    async fn test_summary_scoped_to_link() {
        let (_storage, repos, _dir) = create_temp_storage();
        repos
            .analytics
            .save_event(&meta_event(EventType::Click, "U", Some("L1")))
            .await
            .unwrap();
        repos
            .analytics
            .save_event(&meta_event(EventType::Click, "U", Some("L2")))
            .await
            .unwrap();
        repos
            .analytics
            .save_event(&meta_event(EventType::Click, "V", Some("L1")))
            .await
            .unwrap();

        let summary = repos.analytics.get_summary("U", Some("L1")).await.unwrap();
        assert_eq!(summary.total_clicks, 1);
        assert_eq!(summary.by_country.get("US"), Some(&1));
    }

    #[tokio::test]
    async fn test_country_column_wins_over_meta() {
        let (_storage, repos, _dir) = create_temp_storage();
        let mut event = meta_event(EventType::View, "U", None);
        event.country = "DE".into();
        repos.analytics.save_event(&event).await.unwrap();

        let mut no_device = AnalyticsEvent::new(EventType::View, "visitor-2");
        no_device.user_id = Some("U".into());
        repos.analytics.save_event(&no_device).await.unwrap();

        let summary = repos.analytics.get_summary("U", None).await.unwrap();
        assert_eq!(summary.total_views, 2);
        assert_eq!(summary.by_country.len(), 1);
        assert_eq!(summary.by_country.get("DE"), Some(&1));
        assert_eq!(summary.by_device.get("mobile"), Some(&1));
    }

    #[tokio::test]
    async fn test_empty_summary_for_unknown_user() {
        let (_storage, repos, _dir) = create_temp_storage();
        let summary = repos.analytics.get_summary("nobody", None).await.unwrap();
        assert_eq!(summary, Default::default());
    }
}

#[cfg(test)]
mod consistency_tests {
    use super::*;

    #[tokio::test]
    async fn test_clean_store_reports_no_orphans() {
        let (storage, repos, _dir) = create_temp_storage();
        repos
            .users
            .save(&create_test_user("u1", "a@x.com", "alice"))
            .await
            .unwrap();
        repos.links.save(&create_test_link("l1", "u1", 0)).await.unwrap();
        repos.analytics.save_event(&meta_event(EventType::View, "u1", Some("l1"))).await.unwrap();
        repos.links.delete("l1").await.unwrap();

        let report = storage.check_consistency(false).await.unwrap();
        assert!(report.is_clean(), "orphans: {:?}", report.orphans);
        assert!(report.scanned >= 3);
    }

    #[tokio::test]
    async fn test_reopen_keeps_data() {
        init_test_config();
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("driplnk.db");

        {
            let storage = Arc::new(KvStorage::open(&path, true).unwrap());
            let repos = Repositories::from_backend(storage.clone());
            repos
                .users
                .save(&create_test_user("u1", "a@x.com", "alice"))
                .await
                .unwrap();
            storage.flush().await.unwrap();
        }

        let storage = Arc::new(KvStorage::open(&path, true).unwrap());
        let repos = Repositories::from_backend(storage);
        assert_eq!(repos.users.get_by_handle("alice").await.unwrap().id, "u1");
    }
}
