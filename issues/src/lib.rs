pub mod handlers;
pub mod service;

use std::sync::Arc;

use actix_cors::Cors;
use actix_web::body::MessageBody;
use actix_web::dev::ServiceFactory;
use actix_web::dev::ServiceRequest;
use actix_web::dev::ServiceResponse;
use actix_web::middleware;
use actix_web::web;
use actix_web::App;

use common::context::ServiceState;

pub use crate::handlers::dashboard::*;
pub use crate::handlers::issue::*;
pub use crate::handlers::lifecycle::*;
pub use crate::handlers::performance::*;

pub fn create_app(
    state: Arc<ServiceState>,
) -> App<
    impl ServiceFactory<
        ServiceRequest,
        Response = ServiceResponse<impl MessageBody>,
        Config = (),
        InitError = (),
        Error = actix_web::Error,
    >,
> {
    let cors = Cors::permissive();
    App::new()
        .wrap(cors)
        .wrap(middleware::Logger::default())
        .app_data(web::Data::new(state))
        // Literal paths go before `/api/issues/{id}`.
        .service(get_public_dashboard)
        .service(get_duplicates)
        .service(post_issue)
        .service(get_issues)
        .service(get_issue)
        .service(patch_issue)
        .service(delete_issue)
        .service(get_history)
        .service(post_comment)
        .service(post_upvote)
        .service(post_feedback)
        .service(post_status)
        .service(post_escalate)
        .service(post_sweep)
        .service(get_department_performance)
        .service(get_staff_performance)
}

#[cfg(test)]
pub(crate) fn test_state() -> Arc<ServiceState> {
    Arc::new(test_service_state())
}

#[cfg(test)]
pub(crate) fn test_service_state() -> ServiceState {
    use common::{
        auth::Service,
        entities::{
            department::Department,
            history::StateHistory,
            issue::Issue,
            performance::{DepartmentPerformance, StaffPerformance},
            user::User,
        },
        rate_limit::RateBucket,
        repository::test_repository::TestRepository,
    };

    use crate::service::dashboard::DashboardCache;

    std::env::set_var("JWT_SECRET", "test-secret");

    let mut state = ServiceState::new(Service::Issues);
    state.insert::<Issue>(Arc::new(TestRepository::new()));
    state.insert::<StateHistory>(Arc::new(TestRepository::new()));
    state.insert::<User>(Arc::new(TestRepository::new()));
    state.insert::<Department>(Arc::new(TestRepository::new()));
    state.insert::<RateBucket>(Arc::new(TestRepository::new()));
    state.insert::<StaffPerformance>(Arc::new(TestRepository::new()));
    state.insert::<DepartmentPerformance>(Arc::new(TestRepository::new()));
    state.insert_manual(DashboardCache::default());
    state
}

#[cfg(test)]
pub(crate) fn test_token(auth: common::auth::Auth) -> String {
    std::env::set_var("JWT_SECRET", "test-secret");
    auth.to_token().unwrap()
}

#[cfg(test)]
pub(crate) async fn seed<T: 'static>(state: &Arc<ServiceState>, item: &T) {
    use common::repository::RepositoryObject;

    let repository = state.repositories.get::<RepositoryObject<T>>().unwrap();
    assert!(repository.insert(item).await.unwrap());
}

#[cfg(test)]
pub(crate) async fn seed_department(
    state: &Arc<ServiceState>,
    name: &str,
) -> mongodb::bson::oid::ObjectId {
    use common::entities::department::Department;

    let department = Department {
        id: mongodb::bson::oid::ObjectId::new(),
        name: name.to_string(),
        email: format!("{}@city.gov", name.to_lowercase()),
        categories: vec![],
        is_active: true,
        last_modified: common::default_timestamp(),
    };
    seed(state, &department).await;
    department.id
}

#[cfg(test)]
pub(crate) async fn seed_staff(
    state: &Arc<ServiceState>,
    department: mongodb::bson::oid::ObjectId,
) -> mongodb::bson::oid::ObjectId {
    use common::entities::{role::Role, user::User};

    let now = common::default_timestamp();
    let mut user = User {
        id: mongodb::bson::oid::ObjectId::new(),
        name: "Field Officer".to_string(),
        email: format!("officer.{}@city.gov", department),
        password: String::new(),
        salt: String::new(),
        phone: None,
        role: Role::Department,
        department: Some(department),
        is_active: true,
        created_at: now,
        last_modified: now,
    };
    user.set_password("street lamps");
    seed(state, &user).await;
    user.id
}
