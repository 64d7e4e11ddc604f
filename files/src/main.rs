use std::{env, sync::Arc};

use actix_web::HttpServer;

use common::{
    auth::Service, context::ServiceState, entities::file::Metadata,
    repository::mongo_repository::MongoRepository, services::DATABASE,
};
use files::create_app;

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    dotenv::dotenv().ok();
    env_logger::init();

    let mongo_uri = env::var("MONGOURI").expect("MONGOURI must be set");
    let port = env::var("PORT")
        .ok()
        .and_then(|port| port.parse().ok())
        .unwrap_or(3004);

    let client = mongodb::Client::with_uri_str(&mongo_uri)
        .await
        .expect("Failed to connect to MongoDB");

    let meta_repo: MongoRepository<Metadata> = MongoRepository::new(&client, &DATABASE, "files");

    let mut state = ServiceState::new(Service::Files);
    state.insert::<Metadata>(Arc::new(meta_repo));
    let state = Arc::new(state);

    HttpServer::new(move || create_app(state.clone()))
        .bind(("0.0.0.0", port))?
        .run()
        .await
}
