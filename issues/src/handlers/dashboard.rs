use actix_web::{get, http::header, HttpResponse};

use common::{constants::PUBLIC_CACHE_SECONDS, context::Context, error};

use crate::service::dashboard::DashboardService;

#[get("/api/issues/public")]
pub async fn get_public_dashboard(context: Context) -> error::Result<HttpResponse> {
    let dashboard = DashboardService::new(context).public().await?;
    Ok(HttpResponse::Ok()
        .insert_header((
            header::CACHE_CONTROL,
            format!("public, max-age={}", PUBLIC_CACHE_SECONDS),
        ))
        .json(dashboard))
}

#[cfg(test)]
mod test {
    use actix_web::test::{self, init_service};
    use mongodb::bson::oid::ObjectId;
    use serde_json::{json, Value};

    use common::auth::Auth;

    use crate::{create_app, test_state, test_token};

    #[actix_web::test]
    async fn test_public_dashboard() {
        let app = init_service(create_app(test_state())).await;
        let token = test_token(Auth::Citizen(ObjectId::new()));

        let req = test::TestRequest::post()
            .uri("/api/issues")
            .insert_header(("Authorization", format!("Bearer {}", token)))
            .set_json(json!({
                "title": "Water pipe burst on Lake Road",
                "description": "Clean water has been gushing out since morning.",
                "category": "water-drainage",
                "subcategory": "pipe-burst",
                "lat": 12.91,
                "lng": 77.64,
                "address": "Lake Road, HSR Layout, Bengaluru",
            }))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status().as_u16(), 201);

        let req = test::TestRequest::get().uri("/api/issues/public").to_request();
        let resp = test::call_service(&app, req).await;
        assert!(resp.status().is_success());
        assert_eq!(
            resp.headers().get("cache-control").unwrap(),
            "public, max-age=300"
        );
        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body["total"], 1);
        assert_eq!(body["open"], 1);
        assert_eq!(body["by_status"]["pending"], 1);
        assert_eq!(body["by_category"]["water-drainage"], 1);
        assert_eq!(body["by_category"]["parks"], 0);
        assert_eq!(body["by_priority"]["urgent"], 1);

        let recent = &body["recent"][0];
        assert_eq!(recent["reporter"]["name"], "Anonymous Citizen");
        assert!(recent["reporter"]["id"].is_null());
        assert_eq!(recent["location"]["address"], "Lake Road, HSR Layout");

        // Served from the cache until it expires.
        let req = test::TestRequest::post()
            .uri("/api/issues")
            .insert_header(("Authorization", format!("Bearer {}", token)))
            .set_json(json!({
                "title": "Broken swing in the park",
                "description": "One of the swings in the children's park is broken.",
                "category": "parks",
                "lat": 12.92,
                "lng": 77.65,
                "address": "Sector 2 Park, HSR Layout",
            }))
            .to_request();
        test::call_service(&app, req).await;

        let req = test::TestRequest::get().uri("/api/issues/public").to_request();
        let resp = test::call_service(&app, req).await;
        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body["total"], 1);
    }
}
