use actix_web::{
    post,
    web::{self, Json},
};

use common::{context::Context, entities::letter::CreateLetter, error};

use crate::service::mail::{LetterReceipt, MailService};

#[post("/api/mail")]
pub async fn send_mail(
    context: Context,
    letter: web::Json<CreateLetter>,
) -> error::Result<Json<LetterReceipt>> {
    Ok(Json(
        MailService::new(context)
            .send_letter(letter.into_inner())
            .await?,
    ))
}

#[cfg(test)]
mod test {
    use actix_web::test::{self, init_service};
    use mongodb::bson::oid::ObjectId;
    use serde_json::{json, Value};

    use common::auth::{Auth, Service};

    use crate::{create_app, test_state, test_token};

    fn letter(email: &str) -> Value {
        json!({
            "email": email,
            "subject": "Issue received",
            "message": "Thank you for your report.",
        })
    }

    #[actix_web::test]
    async fn test_services_can_send_mail() {
        let app = init_service(create_app(test_state())).await;
        let service = test_token(Auth::Service(Service::Issues, false));

        let req = test::TestRequest::post()
            .uri("/api/mail")
            .insert_header(("Authorization", format!("Bearer {}", service)))
            .set_json(letter("asha@example.com"))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert!(resp.status().is_success());
        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body["sent"], false);
        assert!(body["id"].is_string());
    }

    #[actix_web::test]
    async fn test_users_cannot_send_mail() {
        let app = init_service(create_app(test_state())).await;

        let citizen = test_token(Auth::Citizen(ObjectId::new()));
        let req = test::TestRequest::post()
            .uri("/api/mail")
            .insert_header(("Authorization", format!("Bearer {}", citizen)))
            .set_json(letter("asha@example.com"))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status().as_u16(), 403);

        let req = test::TestRequest::post()
            .uri("/api/mail")
            .set_json(letter("asha@example.com"))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status().as_u16(), 401);
    }

    #[actix_web::test]
    async fn test_invalid_address() {
        let app = init_service(create_app(test_state())).await;
        let admin = test_token(Auth::Admin(ObjectId::new()));

        let req = test::TestRequest::post()
            .uri("/api/mail")
            .insert_header(("Authorization", format!("Bearer {}", admin)))
            .set_json(letter("not an address"))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status().as_u16(), 400);
    }
}
