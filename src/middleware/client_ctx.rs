use crate::content::Actor;
use crate::error::AppError;
use crate::session::authenticate_client_by_session;
use crate::user::ClientUser;
use actix_session::SessionExt;
use actix_utils::future::{ok, Ready};
use actix_web::dev::{
    forward_ready, Extensions, Payload, Service, ServiceRequest, ServiceResponse, Transform,
};
use actix_web::{web::Data, Error, FromRequest, HttpMessage, HttpRequest};
use futures_util::future::{FutureExt as _, LocalBoxFuture};
use sea_orm::DatabaseConnection;
use std::time::{Duration, Instant};
use std::{cell::RefCell, rc::Rc};

/// Client data stored for a single request cycle.
/// Distinct from ClientCtx because it is defined through request data.
#[derive(Clone, Debug)]
pub struct ClientCtxInner {
    pub client: Option<ClientUser>,
    pub request_start: Instant,
}

impl Default for ClientCtxInner {
    fn default() -> Self {
        Self {
            client: None,
            request_start: Instant::now(),
        }
    }
}

/// Client context passed to routes.
/// Wraps ClientCtxInner, which is set at the beginning of the request.
#[derive(Clone, Debug, Default)]
pub struct ClientCtx(Rc<RefCell<ClientCtxInner>>);

impl ClientCtx {
    fn get_client_ctx(extensions: &mut Extensions) -> Self {
        match extensions.get::<Rc<RefCell<ClientCtxInner>>>() {
            // Existing record in extensions; pull it.
            Some(s_impl) => Self(Rc::clone(s_impl)),
            // No existing record; create and insert it.
            None => {
                let inner = Rc::new(RefCell::new(ClientCtxInner::default()));
                extensions.insert(inner.clone());
                Self(inner)
            }
        }
    }

    /// Reads the client out of request extensions without creating a record.
    pub fn client_from_extensions(extensions: &Extensions) -> Option<ClientUser> {
        extensions
            .get::<Rc<RefCell<ClientCtxInner>>>()
            .and_then(|inner| inner.borrow().client.clone())
    }

    /// Returns either the user's id or None.
    pub fn get_id(&self) -> Option<i32> {
        self.0.borrow().client.as_ref().map(|u| u.id)
    }

    pub fn is_admin(&self) -> bool {
        self.0
            .borrow()
            .client
            .as_ref()
            .map(|u| u.is_admin)
            .unwrap_or(false)
    }

    /// The caller's id, or `Unauthorized` for guests.
    pub fn require_user(&self) -> Result<i32, AppError> {
        self.get_id().ok_or(AppError::Unauthorized)
    }

    pub fn require_admin(&self) -> Result<i32, AppError> {
        let id = self.require_user()?;
        if self.is_admin() {
            Ok(id)
        } else {
            Err(AppError::Forbidden("Only administrators may do that."))
        }
    }

    /// The caller as a content actor, or `Unauthorized` for guests.
    pub fn actor(&self) -> Result<Actor, AppError> {
        Ok(Actor {
            user_id: self.require_user()?,
            is_admin: self.is_admin(),
        })
    }

    /// Whether the caller could update or delete a record owned by `owner_id`.
    pub fn can_modify(&self, owner_id: Option<i32>) -> bool {
        self.actor()
            .map(|actor| actor.authorize(owner_id).is_ok())
            .unwrap_or(false)
    }

    /// Returns Duration representing request time.
    pub fn request_time(&self) -> Duration {
        Instant::now() - self.0.borrow().request_start
    }

    /// Returns human readable representing request time.
    pub fn request_time_as_string(&self) -> String {
        let us = self.request_time().as_micros();
        if us > 5000 {
            format!("{}ms", us / 1000)
        } else {
            format!("{}μs", us)
        }
    }
}

/// This implementation is what actually provides the `client: ClientCtx` in the parameters of route functions.
impl FromRequest for ClientCtx {
    type Error = Error;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _: &mut Payload) -> Self::Future {
        ok(ClientCtx::get_client_ctx(&mut req.extensions_mut()))
    }
}

impl<S, B> Transform<S, ServiceRequest> for ClientCtx
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type Transform = ClientCtxMiddleware<S>;
    type InitError = ();
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ok(ClientCtxMiddleware {
            service: Rc::new(service),
        })
    }
}

/// Client context middleware
pub struct ClientCtxMiddleware<S> {
    service: Rc<S>,
}

impl<S, B> Service<ServiceRequest> for ClientCtxMiddleware<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let service = Rc::clone(&self.service);

        async move {
            let ctx = ClientCtx::get_client_ctx(&mut req.extensions_mut());
            let cookies = req.get_session();

            match req.app_data::<Data<DatabaseConnection>>() {
                Some(db) => match authenticate_client_by_session(db.get_ref(), &cookies).await {
                    // Assign the user to our ClientCtx struct.
                    Ok(client) => ctx.0.borrow_mut().client = client,
                    Err(e) => log::error!("ClientCtxMiddleware: authenticate_client_by_session(): {}", e),
                },
                None => log::error!("ClientCtxMiddleware: no database connection in app data"),
            }

            let path = req.path().to_owned();
            let res = service.call(req).await;
            log::debug!("{} served in {}", path, ctx.request_time_as_string());
            res
        }
        .boxed_local()
    }
}
