use actix_web::{
    cookie::{time::Duration, Cookie, SameSite},
    post,
    web::{self, Json},
    HttpRequest, HttpResponse,
};

use common::{constants::DURATION, context::Context, error, services::PROTOCOL};

use crate::service::auth::{AuthService, Login, Register};

fn session_cookie(token: String) -> Cookie<'static> {
    Cookie::build("token", token)
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .secure(PROTOCOL.as_str() == "https")
        .max_age(Duration::seconds(DURATION.num_seconds()))
        .finish()
}

#[post("/api/auth/register")]
pub async fn register(
    context: Context,
    req: HttpRequest,
    Json(data): web::Json<Register>,
) -> error::Result<HttpResponse> {
    // Forwarded headers are client controlled, so the bucket is keyed on the socket peer.
    let client_ip = req
        .peer_addr()
        .map(|addr| addr.ip().to_string())
        .unwrap_or_else(|| "unknown".to_string());

    let token = AuthService::new(context).register(data, &client_ip).await?;
    Ok(HttpResponse::Created()
        .cookie(session_cookie(token.token.clone()))
        .json(token))
}

#[post("/api/auth/login")]
pub async fn login(context: Context, Json(login): Json<Login>) -> error::Result<HttpResponse> {
    let token = AuthService::new(context).login(login).await?;
    Ok(HttpResponse::Ok()
        .cookie(session_cookie(token.token.clone()))
        .json(token))
}

#[post("/api/auth/logout")]
pub async fn logout() -> HttpResponse {
    let mut cookie = Cookie::build("token", "").path("/").finish();
    cookie.make_removal();
    HttpResponse::Ok().cookie(cookie).finish()
}

#[cfg(test)]
mod test {
    use actix_web::test::{self, init_service};
    use serde_json::{json, Value};

    use crate::{create_app, test_state};

    #[actix_web::test]
    async fn test_register_and_login() {
        let app = init_service(create_app(test_state())).await;

        let req = test::TestRequest::post()
            .uri("/api/auth/register")
            .set_json(json!({
                "name": "Asha Rao",
                "email": "Asha@Example.com",
                "password": "correct horse",
            }))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status().as_u16(), 201);
        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body["user"]["role"], "citizen");
        assert_eq!(body["user"]["email"], "asha@example.com");

        let req = test::TestRequest::post()
            .uri("/api/auth/login")
            .set_json(json!({"email": "asha@example.com", "password": "correct horse"}))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert!(resp.status().is_success());
        let cookie = resp
            .response()
            .cookies()
            .find(|cookie| cookie.name() == "token")
            .unwrap();
        assert_eq!(cookie.http_only(), Some(true));

        let req = test::TestRequest::get()
            .uri("/api/user/me")
            .cookie(cookie.into_owned())
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert!(resp.status().is_success());
        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body["name"], "Asha Rao");
    }

    #[actix_web::test]
    async fn test_register_with_existing_email() {
        let app = init_service(create_app(test_state())).await;

        for expected in [201, 409] {
            let req = test::TestRequest::post()
                .uri("/api/auth/register")
                .set_json(json!({
                    "name": "Asha Rao",
                    "email": "asha@example.com",
                    "password": "correct horse",
                }))
                .to_request();
            let resp = test::call_service(&app, req).await;
            assert_eq!(resp.status().as_u16(), expected);
        }
    }

    #[actix_web::test]
    async fn test_wrong_password_is_unauthorized() {
        let app = init_service(create_app(test_state())).await;

        let req = test::TestRequest::post()
            .uri("/api/auth/register")
            .set_json(json!({
                "name": "Asha Rao",
                "email": "asha@example.com",
                "password": "correct horse",
            }))
            .to_request();
        test::call_service(&app, req).await;

        let req = test::TestRequest::post()
            .uri("/api/auth/login")
            .set_json(json!({"email": "asha@example.com", "password": "battery staple"}))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status().as_u16(), 401);
    }

    #[actix_web::test]
    async fn test_register_limit_ignores_forwarded_for() {
        let app = init_service(create_app(test_state())).await;

        let mut statuses = vec![];
        for i in 0..4 {
            let req = test::TestRequest::post()
                .uri("/api/auth/register")
                .peer_addr("10.0.0.9:40000".parse().unwrap())
                .insert_header(("X-Forwarded-For", format!("1.2.3.{}", i)))
                .set_json(json!({
                    "name": "Asha Rao",
                    "email": format!("asha{}@example.com", i),
                    "password": "correct horse",
                }))
                .to_request();
            statuses.push(test::call_service(&app, req).await.status().as_u16());
        }
        assert_eq!(statuses, vec![201, 201, 201, 429]);
    }

    #[actix_web::test]
    async fn test_login_is_rate_limited() {
        let app = init_service(create_app(test_state())).await;

        let mut statuses = vec![];
        for _ in 0..6 {
            let req = test::TestRequest::post()
                .uri("/api/auth/login")
                .set_json(json!({"email": "nobody@example.com", "password": "whatever1"}))
                .to_request();
            statuses.push(test::call_service(&app, req).await.status().as_u16());
        }
        assert_eq!(statuses, vec![401, 401, 401, 401, 401, 429]);
    }
}
