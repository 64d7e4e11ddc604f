use actix_web::{http::StatusCode, HttpResponse, ResponseError};
use lazy_static::lazy_static;
use mongodb::error::{ErrorKind, WriteFailure};
use serde_json::json;

lazy_static! {
    static ref PRODUCTION: bool = std::env::var("APP_ENV")
        .map(|env| env == "production")
        .unwrap_or(false);
}

const DUPLICATE_KEY: i32 = 11000;

#[derive(Debug)]
pub struct ServiceError {
    pub err: anyhow::Error,
    pub code: u16,
}

impl std::fmt::Display for ServiceError {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "ServiceError({}): {}", self.code, self.err)
    }
}

impl ResponseError for ServiceError {
    fn status_code(&self) -> StatusCode {
        StatusCode::from_u16(self.code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
    }

    fn error_response(&self) -> HttpResponse {
        let status = self.status_code();

        let message = if status == StatusCode::INTERNAL_SERVER_ERROR {
            log::error!("Unhandled error: {:?}", self.err);
            if *PRODUCTION {
                "Internal server error".to_string()
            } else {
                self.err.to_string()
            }
        } else {
            if status.is_server_error() {
                log::error!("{}: {:?}", status, self.err);
            }
            self.err.to_string()
        };

        HttpResponse::build(status).json(json!({ "message": message }))
    }
}

impl<E: Into<anyhow::Error>> From<E> for ServiceError {
    fn from(err: E) -> ServiceError {
        classify(err.into())
    }
}

fn classify(err: anyhow::Error) -> ServiceError {
    if let Some(mongo) = err.downcast_ref::<mongodb::error::Error>() {
        match &*mongo.kind {
            ErrorKind::Write(WriteFailure::WriteError(write)) if write.code == DUPLICATE_KEY => {
                log::warn!("Duplicate key: {}", write.message);
                return anyhow::anyhow!("Record already exists").code(409);
            }
            ErrorKind::Io(_)
            | ErrorKind::ServerSelection { .. }
            | ErrorKind::ConnectionPoolCleared { .. } => {
                log::error!("Database unavailable: {}", mongo);
                return anyhow::anyhow!("Service temporarily unavailable, please retry").code(503);
            }
            _ => {}
        }
    }

    if err.downcast_ref::<mongodb::bson::oid::Error>().is_some() {
        return anyhow::anyhow!("Invalid id: {}", err).code(400);
    }

    ServiceError { err, code: 500 }
}

pub trait AddCode {
    fn code(self, code: u16) -> ServiceError;
}

impl AddCode for anyhow::Error {
    fn code(self, code: u16) -> ServiceError {
        ServiceError { err: self, code }
    }
}

pub type Result<T> = std::result::Result<T, ServiceError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn object_id_parse_errors_are_bad_requests() {
        let parsed = "not-an-id".parse::<mongodb::bson::oid::ObjectId>();
        let err: ServiceError = parsed.unwrap_err().into();
        assert_eq!(err.code, 400);
    }

    #[test]
    fn explicit_codes_survive() {
        let err = anyhow::anyhow!("No issue found").code(404);
        assert_eq!(err.status_code(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn unknown_errors_are_internal() {
        let err: ServiceError = std::io::Error::new(std::io::ErrorKind::Other, "boom").into();
        assert_eq!(err.code, 500);
    }
}
