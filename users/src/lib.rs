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

pub use crate::handlers::auth::*;
pub use crate::handlers::department::*;
pub use crate::handlers::user::*;

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
        .service(register)
        .service(login)
        .service(logout)
        .service(get_me)
        .service(patch_me)
        .service(get_user)
        .service(get_users)
        .service(post_user)
        .service(patch_user)
        .service(delete_user)
        .service(get_departments)
        .service(post_department)
        .service(patch_department)
        .service(delete_department)
}

#[cfg(test)]
pub(crate) fn test_state() -> Arc<ServiceState> {
    use common::{
        auth::Service,
        entities::{department::Department, user::User},
        rate_limit::RateBucket,
        repository::test_repository::TestRepository,
    };

    std::env::set_var("JWT_SECRET", "test-secret");

    let mut state = ServiceState::new(Service::Users);
    state.insert::<User>(Arc::new(TestRepository::new()));
    state.insert::<Department>(Arc::new(TestRepository::new()));
    state.insert::<RateBucket>(Arc::new(TestRepository::new()));
    Arc::new(state)
}

#[cfg(test)]
pub(crate) fn test_token(auth: common::auth::Auth) -> String {
    std::env::set_var("JWT_SECRET", "test-secret");
    auth.to_token().unwrap()
}
