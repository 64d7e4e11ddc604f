use std::{env, sync::Arc};

use actix_web::HttpServer;

use common::{
    auth::Service, context::ServiceState, entities::letter::Letter,
    repository::mongo_repository::MongoRepository, services::DATABASE,
};
use mail::create_app;

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    dotenv::dotenv().ok();
    env_logger::init();

    let mongo_uri = env::var("MONGOURI").expect("MONGOURI must be set");
    let port = env::var("PORT")
        .ok()
        .and_then(|port| port.parse().ok())
        .unwrap_or(3003);

    let client = mongodb::Client::with_uri_str(&mongo_uri)
        .await
        .expect("Failed to connect to MongoDB");

    let letters_repo: MongoRepository<Letter> = MongoRepository::new(&client, &DATABASE, "letters");

    let mut state = ServiceState::new(Service::Mail);
    state.insert::<Letter>(Arc::new(letters_repo));
    let state = Arc::new(state);

    HttpServer::new(move || create_app(state.clone()))
        .bind(("0.0.0.0", port))?
        .run()
        .await
}
