//! Integration tests for capability-gated service operations.

use dpm_core::authz::{Decision, DenyReason, Operation, Principal};
use dpm_core::error::{DpmError, Entity, ErrorCode};
use dpm_core::models::application::UpdateApplication;
use dpm_core::models::group::UpdateGroup;
use dpm_core::models::membership::{Capability, CapabilitySet};
use dpm_core::models::topic::TopicKind;
use dpm_core::models::user::CreateUser;
use dpm_core::repository::{Pagination, ResourceFilter, Store, UserRepository};
use dpm_db::SurrealStore;
use dpm_service::application::NewApplication;
use dpm_service::group::NewGroup;
use dpm_service::membership::NewMember;
use dpm_service::topic::NewTopic;
use dpm_service::{
    AccessService, ApplicationService, GroupService, LogEventSink, MembershipService,
    TopicService,
};
use surrealdb::Surreal;
use surrealdb::engine::local::{Db, Mem};
use uuid::Uuid;

struct Fixture {
    store: SurrealStore<Db>,
    admin: Principal,
    alpha: Uuid,
    beta: Uuid,
}

fn principal_of(user: &dpm_core::models::user::User) -> Principal {
    Principal {
        user_id: user.id,
        email: user.email.clone(),
        is_admin: user.is_admin,
    }
}

async fn setup() -> Fixture {
    let db = Surreal::new::<Mem>(()).await.unwrap();
    db.use_ns("test").use_db("test").await.unwrap();
    dpm_db::run_migrations(&db).await.unwrap();
    let store = SurrealStore::new(db);

    let admin = store
        .users()
        .create(CreateUser {
            email: "admin@example.com".into(),
            is_admin: true,
        })
        .await
        .unwrap();
    let admin = principal_of(&admin);

    let groups = GroupService::new(store.clone(), LogEventSink);
    let mut ids = Vec::new();
    for name in ["Alpha", "Beta"] {
        let group = groups
            .create(
                &admin,
                NewGroup {
                    name: name.into(),
                    description: String::new(),
                    is_public: true,
                },
            )
            .await
            .unwrap();
        ids.push(group.id);
    }

    Fixture {
        store,
        admin,
        alpha: ids[0],
        beta: ids[1],
    }
}

async fn member(fx: &Fixture, group_id: Uuid, email: &str, caps: CapabilitySet) -> Principal {
    let membership = MembershipService::new(fx.store.clone())
        .add_member(
            &fx.admin,
            NewMember {
                group_id,
                email: email.into(),
                capabilities: caps,
            },
        )
        .await
        .unwrap();
    let user = fx.store.users().get_by_id(membership.user_id).await.unwrap();
    principal_of(&user)
}

fn new_topic(group_id: Uuid, name: &str) -> NewTopic {
    NewTopic {
        group_id: Some(group_id),
        name: name.into(),
        kind: TopicKind::B,
        description: String::new(),
        is_public: false,
    }
}

#[tokio::test]
async fn only_site_admin_creates_groups() {
    let fx = setup().await;
    let alice = member(&fx, fx.alpha, "alice@example.com", CapabilitySet::all()).await;

    let err = GroupService::new(fx.store.clone(), LogEventSink)
        .create(
            &alice,
            NewGroup {
                name: "Gamma".into(),
                description: String::new(),
                is_public: false,
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(err, DpmError::Forbidden));
}

#[tokio::test]
async fn group_admin_renames_own_group_only() {
    let fx = setup().await;
    let gina = member(
        &fx,
        fx.alpha,
        "gina@example.com",
        CapabilitySet::EMPTY.with(Capability::GroupAdmin),
    )
    .await;
    let groups = GroupService::new(fx.store.clone(), LogEventSink);

    let renamed = groups
        .update(
            &gina,
            fx.alpha,
            UpdateGroup {
                name: Some("  Alpha Prime ".into()),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(renamed.name, "Alpha Prime");

    let err = groups
        .update(
            &gina,
            fx.beta,
            UpdateGroup {
                description: Some("nope".into()),
                ..Default::default()
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(err, DpmError::Forbidden));

    let err = groups
        .update(
            &gina,
            fx.alpha,
            UpdateGroup {
                name: Some("Beta".into()),
                ..Default::default()
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(err, DpmError::AlreadyExists { .. }));
}

#[tokio::test]
async fn topic_admin_is_scoped_to_its_group() {
    let fx = setup().await;
    let tara = member(
        &fx,
        fx.alpha,
        "tara@example.com",
        CapabilitySet::EMPTY.with(Capability::TopicAdmin),
    )
    .await;
    let topics = TopicService::new(fx.store.clone(), LogEventSink);

    let topic = topics.create(&tara, new_topic(fx.alpha, "pose")).await.unwrap();
    assert_eq!(topic.group_id, fx.alpha);

    let err = topics
        .create(&tara, new_topic(fx.beta, "pose"))
        .await
        .unwrap_err();
    assert!(matches!(err, DpmError::Forbidden));
}

#[tokio::test]
async fn plain_member_cannot_manage_topics() {
    let fx = setup().await;
    let mo = member(&fx, fx.alpha, "mo@example.com", CapabilitySet::EMPTY).await;

    let err = TopicService::new(fx.store.clone(), LogEventSink)
        .create(&mo, new_topic(fx.alpha, "pose"))
        .await
        .unwrap_err();
    assert!(matches!(err, DpmError::Forbidden));
}

#[tokio::test]
async fn missing_group_is_invalid_before_authorization() {
    let fx = setup().await;
    let mo = member(&fx, fx.alpha, "mo@example.com", CapabilitySet::EMPTY).await;

    let err = TopicService::new(fx.store.clone(), LogEventSink)
        .create(
            &mo,
            NewTopic {
                group_id: None,
                ..new_topic(fx.alpha, "pose")
            },
        )
        .await
        .unwrap_err();
    assert_eq!(err.code(), ErrorCode::TopicRequiresGroup);
}

#[tokio::test]
async fn application_move_needs_admin_in_both_groups() {
    let fx = setup().await;
    let admin_caps = CapabilitySet::EMPTY.with(Capability::ApplicationAdmin);
    let bob = member(&fx, fx.alpha, "bob@example.com", admin_caps).await;
    let carol = member(&fx, fx.alpha, "carol@example.com", admin_caps).await;
    member(&fx, fx.beta, "carol@example.com", admin_caps).await;

    let apps = ApplicationService::new(fx.store.clone(), LogEventSink, Default::default());
    let app = apps
        .create(
            &bob,
            NewApplication {
                group_id: Some(fx.alpha),
                name: "planner".into(),
                description: String::new(),
                is_public: false,
            },
        )
        .await
        .unwrap();

    let move_to_beta = || UpdateApplication {
        group_id: Some(fx.beta),
        ..Default::default()
    };

    let err = apps.update(&bob, app.id, move_to_beta()).await.unwrap_err();
    assert!(matches!(err, DpmError::Forbidden));

    let gina = member(
        &fx,
        fx.alpha,
        "gina@example.com",
        CapabilitySet::EMPTY.with(Capability::GroupAdmin),
    )
    .await;
    let err = apps.update(&gina, app.id, move_to_beta()).await.unwrap_err();
    assert!(matches!(err, DpmError::Forbidden));

    let moved = apps.update(&carol, app.id, move_to_beta()).await.unwrap();
    assert_eq!(moved.group_id, fx.beta);

    let decision = AccessService::new(fx.store.clone())
        .authorize(
            bob.user_id,
            &Operation::MoveApplication {
                from: fx.alpha,
                to: fx.beta,
            },
        )
        .await
        .unwrap();
    assert_eq!(
        decision,
        Decision::Deny(DenyReason::MissingCapabilityInTarget(
            Capability::ApplicationAdmin
        ))
    );
}

#[tokio::test]
async fn private_topics_are_visible_to_members_only() {
    let fx = setup().await;
    let topics = TopicService::new(fx.store.clone(), LogEventSink);
    let private = topics
        .create(&fx.admin, new_topic(fx.alpha, "secret"))
        .await
        .unwrap();
    let public = topics
        .create(
            &fx.admin,
            NewTopic {
                is_public: true,
                ..new_topic(fx.alpha, "weather")
            },
        )
        .await
        .unwrap();

    let insider = member(&fx, fx.alpha, "in@example.com", CapabilitySet::EMPTY).await;
    let outsider = member(&fx, fx.beta, "out@example.com", CapabilitySet::EMPTY).await;

    assert!(topics.get(&insider, private.id).await.is_ok());
    assert!(topics.get(&outsider, public.id).await.is_ok());

    // A hidden topic answers exactly like an unknown one.
    let hidden = topics.get(&outsider, private.id).await.unwrap_err();
    let unknown = topics.get(&outsider, Uuid::new_v4()).await.unwrap_err();
    assert!(matches!(
        hidden,
        DpmError::NotFound {
            entity: Entity::Topic,
            ..
        }
    ));
    assert_eq!(hidden.code(), unknown.code());
}

#[tokio::test]
async fn hidden_groups_and_applications_read_as_missing() {
    let fx = setup().await;
    let outsider = member(&fx, fx.beta, "out@example.com", CapabilitySet::EMPTY).await;

    let groups = GroupService::new(fx.store.clone(), LogEventSink);
    let hidden = groups.get(&outsider, fx.alpha).await.unwrap_err();
    let unknown = groups.get(&outsider, Uuid::new_v4()).await.unwrap_err();
    assert!(matches!(
        hidden,
        DpmError::NotFound {
            entity: Entity::Group,
            ..
        }
    ));
    assert_eq!(hidden.code(), unknown.code());

    let applications = ApplicationService::new(fx.store.clone(), LogEventSink, Default::default());
    let app = applications
        .create(
            &fx.admin,
            NewApplication {
                group_id: Some(fx.alpha),
                name: "tracker".into(),
                description: String::new(),
                is_public: false,
            },
        )
        .await
        .unwrap();
    let hidden = applications.get(&outsider, app.id).await.unwrap_err();
    let unknown = applications.get(&outsider, Uuid::new_v4()).await.unwrap_err();
    assert!(matches!(
        hidden,
        DpmError::NotFound {
            entity: Entity::Application,
            ..
        }
    ));
    assert_eq!(hidden.code(), unknown.code());
}

#[tokio::test]
async fn lists_are_scoped_to_membership() {
    let fx = setup().await;
    let topics = TopicService::new(fx.store.clone(), LogEventSink);
    topics
        .create(&fx.admin, new_topic(fx.alpha, "alpha-topic"))
        .await
        .unwrap();
    topics
        .create(&fx.admin, new_topic(fx.beta, "beta-topic"))
        .await
        .unwrap();

    let mo = member(&fx, fx.alpha, "mo@example.com", CapabilitySet::EMPTY).await;

    let groups = GroupService::new(fx.store.clone(), LogEventSink)
        .list(&mo, ResourceFilter::default(), Pagination::default())
        .await
        .unwrap();
    assert_eq!(groups.total, 1);
    assert_eq!(groups.items[0].id, fx.alpha);

    let visible = topics
        .list(&mo, ResourceFilter::default(), Pagination::default())
        .await
        .unwrap();
    assert_eq!(visible.total, 1);
    assert_eq!(visible.items[0].name, "alpha-topic");

    let asked_for_beta = topics
        .list(
            &mo,
            ResourceFilter::in_groups(vec![fx.beta]),
            Pagination::default(),
        )
        .await
        .unwrap();
    assert_eq!(asked_for_beta.total, 0);

    let everything = topics
        .list(&fx.admin, ResourceFilter::default(), Pagination::default())
        .await
        .unwrap();
    assert_eq!(everything.total, 2);
}

#[tokio::test]
async fn capabilities_resolve_per_group() {
    let fx = setup().await;
    let tara = member(
        &fx,
        fx.alpha,
        "tara@example.com",
        CapabilitySet::EMPTY.with(Capability::TopicAdmin),
    )
    .await;
    let memberships = MembershipService::new(fx.store.clone());

    let in_alpha = memberships.capabilities_of(tara.user_id, fx.alpha).await.unwrap();
    assert!(in_alpha.is_member);
    assert!(in_alpha.is_topic_admin);
    assert!(!in_alpha.is_group_admin);

    let in_beta = memberships.capabilities_of(tara.user_id, fx.beta).await.unwrap();
    assert!(!in_beta.is_member);

    let admin = memberships
        .capabilities_of(fx.admin.user_id, fx.beta)
        .await
        .unwrap();
    assert!(admin.is_site_admin && admin.is_application_admin);
}

#[tokio::test]
async fn user_without_memberships_is_not_valid() {
    let fx = setup().await;
    let loner = fx
        .store
        .users()
        .create(CreateUser {
            email: "loner@example.com".into(),
            is_admin: false,
        })
        .await
        .unwrap();

    let err = MembershipService::new(fx.store.clone())
        .permissions_summary(&principal_of(&loner))
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        DpmError::Unauthenticated {
            code: ErrorCode::UserIsNotValid
        }
    ));

    let summary = MembershipService::new(fx.store.clone())
        .permissions_summary(&fx.admin)
        .await
        .unwrap();
    assert!(summary.is_empty());
}
