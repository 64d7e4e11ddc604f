use std::{env, sync::Arc};

use actix_web::HttpServer;
use mongodb::bson::doc;

use common::{
    auth::Service,
    context::ServiceState,
    entities::{department::Department, user::User},
    rate_limit::RateBucket,
    repository::{mongo_repository::MongoRepository, RepositoryObject},
    services::DATABASE,
    verification::verify,
};
use users::{create_app, service::user::bootstrap_admin};

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    dotenv::dotenv().ok();
    env_logger::init();

    let mongo_uri = env::var("MONGOURI").expect("MONGOURI must be set");
    let port = env::var("PORT")
        .ok()
        .and_then(|port| port.parse().ok())
        .unwrap_or(3001);

    let client = mongodb::Client::with_uri_str(&mongo_uri)
        .await
        .expect("Failed to connect to MongoDB");

    verify::<User>(&client, &DATABASE, "users", true)
        .await
        .expect("Users collection verification fail");

    let user_repo: MongoRepository<User> = MongoRepository::new(&client, &DATABASE, "users");
    let department_repo: MongoRepository<Department> =
        MongoRepository::new(&client, &DATABASE, "departments");
    let bucket_repo: MongoRepository<RateBucket> =
        MongoRepository::new(&client, &DATABASE, "rate_limits");

    user_repo
        .ensure_index(doc! {"email": 1}, true)
        .await
        .expect("Failed to create email index");
    department_repo
        .ensure_index(doc! {"name": 1}, true)
        .await
        .expect("Failed to create department name index");
    bucket_repo
        .ensure_index(doc! {"key": 1}, true)
        .await
        .expect("Failed to create rate limit index");

    let user_repo: RepositoryObject<User> = Arc::new(user_repo);

    if let (Ok(email), Ok(password)) = (env::var("ADMIN_EMAIL"), env::var("ADMIN_PASSWORD")) {
        match bootstrap_admin(&user_repo, &email, &password).await {
            Ok(true) => log::info!("Administrator {} created", email),
            Ok(false) => {}
            Err(err) => log::error!("Failed to create administrator: {}", err),
        }
    }

    let mut state = ServiceState::new(Service::Users);
    state.insert(user_repo);
    state.insert::<Department>(Arc::new(department_repo));
    state.insert::<RateBucket>(Arc::new(bucket_repo));
    let state = Arc::new(state);

    HttpServer::new(move || create_app(state.clone()))
        .bind(("0.0.0.0", port))?
        .run()
        .await
}
