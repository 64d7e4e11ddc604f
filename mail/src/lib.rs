use std::sync::Arc;

use actix_cors::Cors;
use actix_web::{
    body::MessageBody,
    dev::{ServiceFactory, ServiceRequest, ServiceResponse},
    middleware, web, App,
};
use common::context::ServiceState;
use handlers::mail::send_mail;

pub mod handlers;
pub mod service;

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
        .service(send_mail)
}

#[cfg(test)]
pub(crate) fn test_state() -> Arc<ServiceState> {
    use common::{
        auth::Service, entities::letter::Letter, repository::test_repository::TestRepository,
    };

    std::env::set_var("JWT_SECRET", "test-secret");

    let mut state = ServiceState::new(Service::Mail);
    state.insert::<Letter>(Arc::new(TestRepository::new()));
    Arc::new(state)
}

#[cfg(test)]
pub(crate) fn test_token(auth: common::auth::Auth) -> String {
    std::env::set_var("JWT_SECRET", "test-secret");
    auth.to_token().unwrap()
}
