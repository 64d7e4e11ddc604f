use std::sync::Arc;

use actix_web::{dev::Payload, web::Data, FromRequest, HttpRequest};
use serde::Serialize;
use type_map::concurrent::TypeMap;

use crate::{
    auth::{Auth, Service},
    error::{self, AddCode, ServiceError},
    repository::RepositoryObject,
};

pub struct ServiceState {
    pub repositories: TypeMap,
    pub client: reqwest::Client,
    pub service_auth: Auth,
}

impl ServiceState {
    pub fn new(service_name: Service) -> Self {
        Self {
            repositories: TypeMap::new(),
            client: reqwest::Client::new(),
            service_auth: Auth::Service(service_name, false),
        }
    }

    pub fn insert<T: 'static>(&mut self, repository: RepositoryObject<T>) {
        self.repositories.insert(repository);
    }

    pub fn insert_manual<T: Send + Sync + 'static>(&mut self, value: T) {
        self.repositories.insert(value);
    }
}

#[derive(Clone)]
pub struct HandlerContext {
    pub user_auth: Auth,
}

#[derive(Clone)]
pub struct Context(pub Arc<ServiceState>, pub HandlerContext);

fn token_from_request(req: &HttpRequest) -> Option<String> {
    if let Some(cookie) = req.cookie("token") {
        return Some(cookie.value().to_string());
    }
    req.headers()
        .get("Authorization")
        .and_then(|x| x.to_str().ok())
        .and_then(|x| x.strip_prefix("Bearer "))
        .map(str::to_string)
}

impl FromRequest for Context {
    type Error = ServiceError;

    type Future = futures_util::future::LocalBoxFuture<'static, Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, payload: &mut Payload) -> Self::Future {
        fn from_request_inner(req: &HttpRequest, _payload: &mut Payload) -> error::Result<Context> {
            let user_auth = match token_from_request(req).map(|token| Auth::from_token(&token)) {
                Some(Ok(Some(auth))) => auth,
                Some(Ok(None)) => {
                    log::debug!("Token expired");
                    Auth::None
                }
                Some(Err(err)) => {
                    log::warn!("Error parsing token: {}", err);
                    Auth::None
                }
                None => Auth::None,
            };

            let Some(state) = req.app_data::<Data<Arc<ServiceState>>>() else {
                return Err(anyhow::anyhow!("No state provided").code(500));
            };

            Ok(Context(
                Arc::clone(state.get_ref()),
                HandlerContext { user_auth },
            ))
        }
        let result = from_request_inner(req, payload);

        Box::pin(async move { result })
    }
}

impl Context {
    pub fn server_auth(&self) -> Auth {
        self.0.service_auth
    }

    pub fn auth(&self) -> Auth {
        self.1.user_auth
    }

    pub fn get_repository<T: 'static>(&self) -> Option<RepositoryObject<T>> {
        self.0.repositories.get::<RepositoryObject<T>>().cloned()
    }

    pub fn get_manual<T: 'static + Clone>(&self) -> Option<T> {
        self.0.repositories.get::<T>().cloned()
    }

    pub fn try_get_repository<T: 'static>(&self) -> error::Result<RepositoryObject<T>> {
        self.get_repository::<T>().ok_or_else(|| {
            anyhow::anyhow!(
                "Repository for type {} not found",
                std::any::type_name::<T>()
            )
            .code(500)
        })
    }

    pub fn make_request<T: Serialize>(&self) -> ServiceRequest<T> {
        ServiceRequest::<T>::new(&self.0.client, self.0.service_auth)
    }
}

pub struct ServiceRequest<'a, 'b, T = ()> {
    client: &'a reqwest::Client,
    method: reqwest::Method,
    url: Option<String>,
    body: Option<&'b T>,
    auth: Auth,
}

impl<'a, 'b, T: Serialize> ServiceRequest<'a, 'b, T> {
    pub fn new(client: &'a reqwest::Client, auth: Auth) -> Self {
        Self {
            client,
            auth,
            method: reqwest::Method::GET,
            url: None,
            body: None,
        }
    }

    pub fn get(mut self, url: String) -> Self {
        self.url = Some(url);
        self
    }

    pub fn post(mut self, url: String) -> Self {
        self.url = Some(url);
        self.method = reqwest::Method::POST;
        self
    }

    pub fn json(mut self, body: &'b T) -> Self {
        self.body = Some(body);
        self
    }

    pub fn auth(mut self, auth: Auth) -> Self {
        self.auth = auth;
        self
    }

    pub async fn send(self) -> error::Result<reqwest::Response> {
        let Some(url) = self.url else {
            return Err(anyhow::anyhow!("Service request without url").code(500));
        };
        let mut request = self
            .client
            .request(self.method, url)
            .header("Authorization", format!("Bearer {}", self.auth.to_token()?));
        if let Some(body) = self.body {
            request = request.json(body);
        }
        let response = request.send().await?;
        if !response.status().is_success() {
            return Err(
                anyhow::anyhow!("{} answered {}", response.url(), response.status()).code(502),
            );
        }
        Ok(response)
    }
}
