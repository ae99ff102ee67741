//! Integration tests for permission grants and their partitions.

use std::collections::BTreeSet;

use dpm_core::error::{DpmError, Entity};
use dpm_core::models::application::CreateApplication;
use dpm_core::models::application_permission::{
    AccessType, CreateApplicationPermission, Partition, PartitionDirection, UpdateAccess,
};
use dpm_core::models::group::CreateGroup;
use dpm_core::models::topic::{CreateTopic, TopicKind};
use dpm_core::repository::{
    ApplicationPermissionRepository, ApplicationRepository, GrantScope, GroupRepository,
    Pagination, PermissionFilter, Store, TopicRepository,
};
use dpm_db::SurrealStore;
use surrealdb::Surreal;
use surrealdb::engine::local::{Db, Mem};
use uuid::Uuid;

struct Fixture {
    db: Surreal<Db>,
    store: SurrealStore<Db>,
    application_id: Uuid,
    topic_ids: Vec<Uuid>,
}

/// Helper: one group holding one application and three topics.
async fn setup() -> Fixture {
    let db = Surreal::new::<Mem>(()).await.unwrap();
    db.use_ns("test").use_db("test").await.unwrap();
    dpm_db::run_migrations(&db).await.unwrap();
    let store = SurrealStore::new(db.clone());

    let group = store
        .groups()
        .create(CreateGroup {
            name: "Robotics".into(),
            description: String::new(),
            is_public: false,
        })
        .await
        .unwrap();

    let application = store
        .applications()
        .create(CreateApplication {
            group_id: group.id,
            name: "planner".into(),
            description: String::new(),
            is_public: false,
        })
        .await
        .unwrap();

    let mut topic_ids = Vec::new();
    for name in ["pose", "lidar", "commands"] {
        let topic = store
            .topics()
            .create(CreateTopic {
                group_id: group.id,
                name: name.into(),
                kind: TopicKind::B,
                description: String::new(),
                is_public: false,
            })
            .await
            .unwrap();
        topic_ids.push(topic.id);
    }

    Fixture {
        db,
        store,
        application_id: application.id,
        topic_ids,
    }
}

fn grant(
    fx: &Fixture,
    topic_id: Uuid,
    access: AccessType,
    partitions: impl IntoIterator<Item = Partition>,
) -> CreateApplicationPermission {
    CreateApplicationPermission {
        application_id: fx.application_id,
        topic_id,
        access,
        partitions: partitions.into_iter().collect(),
    }
}

#[tokio::test]
async fn create_persists_flags_and_partitions() {
    let fx = setup().await;
    let permissions = fx.store.permissions();

    let created = permissions
        .create(grant(
            &fx,
            fx.topic_ids[0],
            AccessType::ReadWrite,
            [Partition::read("p1"), Partition::write("p2")],
        ))
        .await
        .unwrap();

    let fetched = permissions.get_by_id(created.id).await.unwrap();
    assert_eq!(fetched.access, AccessType::ReadWrite);
    assert_eq!(fetched.partition_names(PartitionDirection::Read), vec!["p1"]);
    assert_eq!(fetched.partition_names(PartitionDirection::Write), vec!["p2"]);
}

#[tokio::test]
async fn second_grant_for_same_pair_is_rejected() {
    let fx = setup().await;
    let permissions = fx.store.permissions();

    let first = permissions
        .create(grant(&fx, fx.topic_ids[0], AccessType::Read, []))
        .await
        .unwrap();

    let err = permissions
        .create(grant(&fx, fx.topic_ids[0], AccessType::Write, []))
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        DpmError::AlreadyExists {
            entity: Entity::ApplicationPermission
        }
    ));

    let unchanged = permissions.get_by_id(first.id).await.unwrap();
    assert_eq!(unchanged.access, AccessType::Read);
}

#[tokio::test]
async fn racing_creates_for_same_pair_leave_one_grant() {
    let fx = setup().await;
    let permissions = fx.store.permissions();

    for (round, topic_id) in fx.topic_ids.iter().copied().enumerate() {
        let (a, b) = tokio::join!(
            permissions.create(grant(&fx, topic_id, AccessType::Read, [Partition::read("p1")])),
            permissions.create(grant(&fx, topic_id, AccessType::Write, [Partition::write("p2")])),
        );

        let outcomes = [a, b];
        let created = outcomes.iter().filter(|r| r.is_ok()).count();
        assert_eq!(created, 1, "round {round}: exactly one create wins");
        for outcome in &outcomes {
            if let Err(err) = outcome {
                assert!(
                    matches!(
                        err,
                        DpmError::AlreadyExists {
                            entity: Entity::ApplicationPermission
                        }
                    ),
                    "round {round}: loser got {err:?}"
                );
            }
        }

        let page = permissions
            .list(
                PermissionFilter {
                    topic_id: Some(topic_id),
                    ..Default::default()
                },
                Pagination::default(),
            )
            .await
            .unwrap();
        assert_eq!(page.total, 1);
    }
}

#[tokio::test]
async fn pages_are_stable_when_timestamps_tie() {
    let fx = setup().await;
    let permissions = fx.store.permissions();
    for topic_id in &fx.topic_ids {
        permissions
            .create(grant(&fx, *topic_id, AccessType::Read, []))
            .await
            .unwrap();
    }
    fx.db
        .query(
            "UPDATE permissions_application_permission \
             SET created_at = d'2024-01-01T00:00:00Z'",
        )
        .await
        .unwrap()
        .check()
        .unwrap();

    let mut walked = Vec::new();
    for offset in 0..3 {
        let page = permissions
            .list(PermissionFilter::default(), Pagination { offset, limit: 1 })
            .await
            .unwrap();
        assert_eq!(page.total, 3);
        walked.push(page.items[0].id);
    }
    let mut distinct = walked.clone();
    distinct.sort();
    distinct.dedup();
    assert_eq!(distinct.len(), 3, "every grant appears on exactly one page");

    let all = permissions
        .list(PermissionFilter::default(), Pagination::default())
        .await
        .unwrap();
    let in_one_page: Vec<Uuid> = all.items.iter().map(|p| p.id).collect();
    assert_eq!(walked, in_one_page);
}

#[tokio::test]
async fn update_access_replaces_partitions() {
    let fx = setup().await;
    let permissions = fx.store.permissions();

    let created = permissions
        .create(grant(
            &fx,
            fx.topic_ids[0],
            AccessType::ReadWrite,
            [Partition::write("p1"), Partition::write("p2")],
        ))
        .await
        .unwrap();

    let updated = permissions
        .update_access(
            created.id,
            UpdateAccess {
                access: AccessType::Write,
                partitions: BTreeSet::from([Partition::write("p3")]),
            },
        )
        .await
        .unwrap();

    assert_eq!(updated.access.to_flags(), (false, true));
    assert_eq!(updated.partitions, BTreeSet::from([Partition::write("p3")]));
}

#[tokio::test]
async fn update_of_missing_grant_is_not_found() {
    let fx = setup().await;
    let err = fx
        .store
        .permissions()
        .update_access(
            Uuid::new_v4(),
            UpdateAccess {
                access: AccessType::Read,
                partitions: BTreeSet::new(),
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        DpmError::NotFound {
            entity: Entity::ApplicationPermission,
            ..
        }
    ));
}

#[tokio::test]
async fn delete_removes_owned_partitions() {
    let fx = setup().await;
    let permissions = fx.store.permissions();

    let created = permissions
        .create(grant(
            &fx,
            fx.topic_ids[1],
            AccessType::Read,
            [Partition::read("east"), Partition::read("west")],
        ))
        .await
        .unwrap();

    permissions.delete(created.id).await.unwrap();

    assert!(matches!(
        permissions.get_by_id(created.id).await.unwrap_err(),
        DpmError::NotFound { .. }
    ));
    assert!(matches!(
        permissions.delete(created.id).await.unwrap_err(),
        DpmError::NotFound { .. }
    ));

    // The pair is free again and starts without the old partitions.
    let again = permissions
        .create(grant(&fx, fx.topic_ids[1], AccessType::Read, []))
        .await
        .unwrap();
    assert!(again.partitions.is_empty());
}

#[tokio::test]
async fn list_filters_by_topic_and_scope() {
    let fx = setup().await;
    let permissions = fx.store.permissions();

    for topic_id in &fx.topic_ids {
        permissions
            .create(grant(&fx, *topic_id, AccessType::Read, []))
            .await
            .unwrap();
    }

    let by_app = permissions
        .list(
            PermissionFilter {
                application_id: Some(fx.application_id),
                ..Default::default()
            },
            Pagination::default(),
        )
        .await
        .unwrap();
    assert_eq!(by_app.total, 3);

    let by_topic = permissions
        .list(
            PermissionFilter {
                topic_id: Some(fx.topic_ids[2]),
                ..Default::default()
            },
            Pagination::default(),
        )
        .await
        .unwrap();
    assert_eq!(by_topic.total, 1);
    assert_eq!(by_topic.items[0].topic_id, fx.topic_ids[2]);

    let outside_scope = permissions
        .list(
            PermissionFilter {
                visible_to: Some(GrantScope::default()),
                ..Default::default()
            },
            Pagination::default(),
        )
        .await
        .unwrap();
    assert_eq!(outside_scope.total, 0);

    let topic_scope = permissions
        .list(
            PermissionFilter {
                visible_to: Some(GrantScope {
                    application_ids: Vec::new(),
                    topic_ids: vec![fx.topic_ids[0], fx.topic_ids[1]],
                }),
                ..Default::default()
            },
            Pagination::default(),
        )
        .await
        .unwrap();
    assert_eq!(topic_scope.total, 2);

    let paged = permissions
        .list(
            PermissionFilter::default(),
            Pagination {
                offset: 2,
                limit: 2,
            },
        )
        .await
        .unwrap();
    assert_eq!(paged.total, 3);
    assert_eq!(paged.items.len(), 1);
}
