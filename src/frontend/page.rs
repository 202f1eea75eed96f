use crate::error::AppError;
use crate::middleware::ClientCtx;
use actix_web::body::BoxBody;
use actix_web::http::header::{self, HeaderValue};
use actix_web::{HttpMessage, HttpRequest, HttpResponse, Responder};
use serde::Serialize;
use serde_json::{json, Value};

/// Handlers answer page requests with this.
pub type PageResult = Result<Page, AppError>;

/// A page object: the named frontend component and the props it renders.
/// The request URL and the signed-in user are added when it is sent.
#[derive(Debug)]
pub struct Page {
    component: &'static str,
    props: Value,
}

impl Page {
    pub fn new(component: &'static str, props: impl Serialize) -> PageResult {
        let props = serde_json::to_value(props)
            .map_err(|e| AppError::Internal(format!("serializing {} props: {}", component, e)))?;
        Ok(Self { component, props })
    }
}

/// Page wraps handler output with request data.
/// It implements the actix_web::Responder trait so it can be returned from handlers directly.
impl Responder for Page {
    type Body = BoxBody;

    fn respond_to(self, req: &HttpRequest) -> HttpResponse<Self::Body> {
        let user = ClientCtx::client_from_extensions(&req.extensions());
        let url = match req.uri().path_and_query() {
            Some(pq) => pq.as_str().to_owned(),
            None => req.path().to_owned(),
        };

        HttpResponse::Ok()
            .insert_header((header::VARY, HeaderValue::from_static("Accept")))
            .json(json!({
                "component": self.component,
                "props": self.props,
                "url": url,
                "shared": { "auth": { "user": user } },
            }))
    }
}
