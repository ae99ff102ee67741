//! Integration tests for transactional cascade deletes.

use dpm_core::error::{DpmError, Entity};
use dpm_core::models::application::CreateApplication;
use dpm_core::models::application_permission::{
    AccessType, CreateApplicationPermission, Partition,
};
use dpm_core::models::group::{CreateGroup, UpdateGroup};
use dpm_core::models::membership::{CapabilitySet, CreateMembership};
use dpm_core::models::topic::{CreateTopic, TopicKind};
use dpm_core::models::user::CreateUser;
use dpm_core::repository::{
    ApplicationPermissionRepository, ApplicationRepository, GroupRepository,
    MembershipRepository, Pagination, ResourceFilter, Store, TopicRepository, UserRepository,
};
use dpm_db::SurrealStore;
use surrealdb::Surreal;
use surrealdb::engine::local::{Db, Mem};
use surrealdb_types::SurrealValue;
use uuid::Uuid;

#[derive(Debug, SurrealValue)]
struct CountRow {
    total: u64,
}

async fn count(db: &Surreal<Db>, table: &str) -> u64 {
    let mut result = db
        .query(format!("SELECT count() AS total FROM {table} GROUP ALL"))
        .await
        .unwrap();
    let rows: Vec<CountRow> = result.take(0).unwrap();
    rows.first().map(|r| r.total).unwrap_or(0)
}

async fn setup() -> (Surreal<Db>, SurrealStore<Db>) {
    let db = Surreal::new::<Mem>(()).await.unwrap();
    db.use_ns("test").use_db("test").await.unwrap();
    dpm_db::run_migrations(&db).await.unwrap();
    let store = SurrealStore::new(db.clone());
    (db, store)
}

async fn group(store: &SurrealStore<Db>, name: &str, is_public: bool) -> Uuid {
    store
        .groups()
        .create(CreateGroup {
            name: name.into(),
            description: String::new(),
            is_public,
        })
        .await
        .unwrap()
        .id
}

async fn topic(store: &SurrealStore<Db>, group_id: Uuid, name: &str, is_public: bool) -> Uuid {
    store
        .topics()
        .create(CreateTopic {
            group_id,
            name: name.into(),
            kind: TopicKind::C,
            description: String::new(),
            is_public,
        })
        .await
        .unwrap()
        .id
}

async fn application(
    store: &SurrealStore<Db>,
    group_id: Uuid,
    name: &str,
    is_public: bool,
) -> Uuid {
    store
        .applications()
        .create(CreateApplication {
            group_id,
            name: name.into(),
            description: String::new(),
            is_public,
        })
        .await
        .unwrap()
        .id
}

async fn grant(store: &SurrealStore<Db>, application_id: Uuid, topic_id: Uuid) -> Uuid {
    store
        .permissions()
        .create(CreateApplicationPermission {
            application_id,
            topic_id,
            access: AccessType::ReadWrite,
            partitions: [Partition::read("r"), Partition::write("w")].into(),
        })
        .await
        .unwrap()
        .id
}

#[tokio::test]
async fn topic_delete_removes_every_grant_on_it() {
    let (db, store) = setup().await;
    let g = group(&store, "Fleet", false).await;
    let doomed = topic(&store, g, "heartbeat", false).await;
    let kept = topic(&store, g, "status", false).await;

    let mut doomed_grants = Vec::new();
    for name in ["one", "two", "three"] {
        let app = application(&store, g, name, false).await;
        doomed_grants.push(grant(&store, app, doomed).await);
        grant(&store, app, kept).await;
    }
    assert_eq!(count(&db, "permissions_partition").await, 12);

    store.topics().delete(doomed).await.unwrap();

    for id in doomed_grants {
        let err = store.permissions().get_by_id(id).await.unwrap_err();
        assert!(matches!(
            err,
            DpmError::NotFound {
                entity: Entity::ApplicationPermission,
                ..
            }
        ));
    }
    assert_eq!(count(&db, "permissions_application_permission").await, 3);
    assert_eq!(count(&db, "permissions_partition").await, 6);
    assert!(matches!(
        store.topics().get_by_id(doomed).await.unwrap_err(),
        DpmError::NotFound { .. }
    ));
}

#[tokio::test]
async fn application_delete_removes_its_grants() {
    let (db, store) = setup().await;
    let g = group(&store, "Fleet", false).await;
    let t = topic(&store, g, "heartbeat", false).await;
    let doomed = application(&store, g, "logger", false).await;
    let kept = application(&store, g, "viewer", false).await;
    grant(&store, doomed, t).await;
    let kept_grant = grant(&store, kept, t).await;

    store.applications().delete(doomed).await.unwrap();

    assert_eq!(count(&db, "permissions_application_permission").await, 1);
    assert_eq!(count(&db, "permissions_partition").await, 2);
    store.permissions().get_by_id(kept_grant).await.unwrap();
}

#[tokio::test]
async fn group_delete_removes_everything_it_owns() {
    let (db, store) = setup().await;
    let doomed = group(&store, "Doomed", false).await;
    let other = group(&store, "Other", false).await;

    let doomed_topic = topic(&store, doomed, "alpha_topic", false).await;
    let doomed_app = application(&store, doomed, "alpha_app", false).await;
    let other_topic = topic(&store, other, "beta_topic", false).await;
    let other_app = application(&store, other, "beta_app", false).await;

    // Cross-group grants touching the doomed group go too.
    grant(&store, doomed_app, doomed_topic).await;
    grant(&store, other_app, doomed_topic).await;
    grant(&store, doomed_app, other_topic).await;
    let survivor = grant(&store, other_app, other_topic).await;

    let user = store
        .users()
        .create(CreateUser {
            email: "crew@example.com".into(),
            is_admin: false,
        })
        .await
        .unwrap();
    for group_id in [doomed, other] {
        store
            .memberships()
            .create(CreateMembership {
                group_id,
                user_id: user.id,
                capabilities: CapabilitySet::EMPTY,
            })
            .await
            .unwrap();
    }

    store.groups().delete(doomed).await.unwrap();

    assert!(matches!(
        store.groups().get_by_id(doomed).await.unwrap_err(),
        DpmError::NotFound {
            entity: Entity::Group,
            ..
        }
    ));
    assert!(store.topics().get_by_id(doomed_topic).await.is_err());
    assert!(store.applications().get_by_id(doomed_app).await.is_err());
    assert_eq!(count(&db, "permissions_application_permission").await, 1);
    assert_eq!(count(&db, "permissions_partition").await, 2);
    store.permissions().get_by_id(survivor).await.unwrap();

    let remaining = store.memberships().list_for_user(user.id).await.unwrap();
    assert_eq!(remaining.len(), 1);
    assert_eq!(remaining[0].group_id, other);
}

#[tokio::test]
async fn making_a_group_private_hides_its_resources() {
    let (_db, store) = setup().await;
    let g = group(&store, "Open", true).await;
    let t = topic(&store, g, "weather", true).await;
    let a = application(&store, g, "station", true).await;

    let updated = store
        .groups()
        .update(
            g,
            UpdateGroup {
                is_public: Some(false),
                ..Default::default()
            },
        )
        .await
        .unwrap();

    assert!(!updated.is_public);
    assert!(!store.topics().get_by_id(t).await.unwrap().is_public);
    assert!(!store.applications().get_by_id(a).await.unwrap().is_public);
}

#[tokio::test]
async fn group_names_are_unique() {
    let (_db, store) = setup().await;
    group(&store, "Unique", false).await;

    let err = store
        .groups()
        .create(CreateGroup {
            name: "Unique".into(),
            description: String::new(),
            is_public: false,
        })
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        DpmError::AlreadyExists {
            entity: Entity::Group
        }
    ));

    let page = store
        .groups()
        .list(ResourceFilter::default(), Pagination::default())
        .await
        .unwrap();
    assert_eq!(page.total, 1);
}

#[tokio::test]
async fn racing_renames_to_one_name_leave_one_winner() {
    let (_db, store) = setup().await;
    let a = group(&store, "Alpha", false).await;
    let b = group(&store, "Beta", false).await;

    let rename = |id| {
        store.groups().update(
            id,
            UpdateGroup {
                name: Some("Gamma".into()),
                ..Default::default()
            },
        )
    };
    let (ra, rb) = tokio::join!(rename(a), rename(b));

    let outcomes = [ra, rb];
    assert_eq!(outcomes.iter().filter(|r| r.is_ok()).count(), 1);
    assert!(outcomes.iter().any(|r| matches!(
        r,
        Err(DpmError::AlreadyExists {
            entity: Entity::Group
        })
    )));

    let page = store
        .groups()
        .list(
            ResourceFilter {
                name_contains: Some("gamma".into()),
                ..Default::default()
            },
            Pagination::default(),
        )
        .await
        .unwrap();
    assert_eq!(page.total, 1);
}

#[tokio::test]
async fn topic_names_are_unique_per_group() {
    let (_db, store) = setup().await;
    let a = group(&store, "GroupA", false).await;
    let b = group(&store, "GroupB", false).await;
    topic(&store, a, "shared", false).await;
    topic(&store, b, "shared", false).await;

    let err = store
        .topics()
        .create(CreateTopic {
            group_id: a,
            name: "shared".into(),
            kind: TopicKind::B,
            description: String::new(),
            is_public: false,
        })
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        DpmError::AlreadyExists {
            entity: Entity::Topic
        }
    ));

    let ids = store.topics().ids_in_groups(&[a]).await.unwrap();
    assert_eq!(ids.len(), 1);
}
