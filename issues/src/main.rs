use std::{env, sync::Arc};

use actix_web::HttpServer;
use mongodb::bson::doc;

use common::{
    auth::Service,
    context::ServiceState,
    entities::{
        department::Department,
        history::StateHistory,
        issue::Issue,
        performance::{DepartmentPerformance, StaffPerformance},
        user::User,
    },
    rate_limit::RateBucket,
    repository::mongo_repository::MongoRepository,
    services::DATABASE,
    verification::verify,
};
use issues::{create_app, service::dashboard::DashboardCache};

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    dotenv::dotenv().ok();
    env_logger::init();

    let mongo_uri = env::var("MONGOURI").expect("MONGOURI must be set");
    let port = env::var("PORT")
        .ok()
        .and_then(|port| port.parse().ok())
        .unwrap_or(3002);

    let client = mongodb::Client::with_uri_str(&mongo_uri)
        .await
        .expect("Failed to connect to MongoDB");

    verify::<Issue>(&client, &DATABASE, "issues", true)
        .await
        .expect("Issues collection verification fail");

    let issue_repo: MongoRepository<Issue> = MongoRepository::new(&client, &DATABASE, "issues");
    let history_repo: MongoRepository<StateHistory> =
        MongoRepository::new(&client, &DATABASE, "state_history");
    let user_repo: MongoRepository<User> = MongoRepository::new(&client, &DATABASE, "users");
    let department_repo: MongoRepository<Department> =
        MongoRepository::new(&client, &DATABASE, "departments");
    let bucket_repo: MongoRepository<RateBucket> =
        MongoRepository::new(&client, &DATABASE, "rate_limits");
    let staff_repo: MongoRepository<StaffPerformance> =
        MongoRepository::new(&client, &DATABASE, "staff_performance");
    let department_performance_repo: MongoRepository<DepartmentPerformance> =
        MongoRepository::new(&client, &DATABASE, "department_performance");

    issue_repo
        .ensure_index(doc! {"location.point": "2dsphere"}, false)
        .await
        .expect("Failed to create location index");
    issue_repo
        .ensure_index(doc! {"status": 1, "sla.deadline": 1}, false)
        .await
        .expect("Failed to create deadline index");
    issue_repo
        .ensure_index(doc! {"reporter": 1, "created_at": -1}, false)
        .await
        .expect("Failed to create reporter index");
    history_repo
        .ensure_index(doc! {"issue_id": 1, "timestamp": 1}, false)
        .await
        .expect("Failed to create history index");
    bucket_repo
        .ensure_index(doc! {"key": 1}, true)
        .await
        .expect("Failed to create rate limit index");

    let mut state = ServiceState::new(Service::Issues);
    state.insert::<Issue>(Arc::new(issue_repo));
    state.insert::<StateHistory>(Arc::new(history_repo));
    state.insert::<User>(Arc::new(user_repo));
    state.insert::<Department>(Arc::new(department_repo));
    state.insert::<RateBucket>(Arc::new(bucket_repo));
    state.insert::<StaffPerformance>(Arc::new(staff_repo));
    state.insert::<DepartmentPerformance>(Arc::new(department_performance_repo));
    state.insert_manual(DashboardCache::default());
    let state = Arc::new(state);

    HttpServer::new(move || create_app(state.clone()))
        .bind(("0.0.0.0", port))?
        .run()
        .await
}
