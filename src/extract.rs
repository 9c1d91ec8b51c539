//! Request extractors whose rejections render as `{"detail": ..}` like every other error.

use axum::extract::{
    rejection::{FormRejection, JsonRejection, PathRejection, QueryRejection},
    FromRequest, FromRequestParts,
};

use crate::errors::AppError;

#[derive(FromRequest)]
#[from_request(via(axum::Json), rejection(AppError))]
pub struct JsonBody<T>(pub T);

#[derive(FromRequest)]
#[from_request(via(axum::Form), rejection(AppError))]
pub struct FormBody<T>(pub T);

#[derive(FromRequestParts)]
#[from_request(via(axum::extract::Query), rejection(AppError))]
pub struct QueryParams<T>(pub T);

#[derive(FromRequestParts)]
#[from_request(via(axum::extract::Path), rejection(AppError))]
pub struct PathParam<T>(pub T);

macro_rules! rejection_into_app_error {
    ($($rejection:ty),+) => {$(
        impl From<$rejection> for AppError {
            fn from(rejection: $rejection) -> Self {
                AppError::Rejected(rejection.status(), rejection.body_text())
            }
        }
    )+};
}

rejection_into_app_error!(JsonRejection, FormRejection, QueryRejection, PathRejection);

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        body::{to_bytes, Body},
        http::{header, Request, StatusCode},
        response::IntoResponse,
    };
    use serde::Deserialize;

    #[derive(Debug, Deserialize)]
    struct Payload {
        #[allow(dead_code)]
        name: String,
    }

    #[tokio::test]
    async fn malformed_json_becomes_detail_body() {
        let req = Request::builder()
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from("{not json"))
            .unwrap();
        let err = match JsonBody::<Payload>::from_request(req, &()).await {
            Err(e) => e,
            Ok(_) => panic!("malformed body accepted"),
        };
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);

        let res = err.into_response();
        assert_eq!(
            res.headers().get(header::CONTENT_TYPE).unwrap(),
            "application/json"
        );
        let bytes = to_bytes(res.into_body(), usize::MAX).await.unwrap();
        let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert!(body["detail"].as_str().unwrap().contains("JSON"));
    }

    #[tokio::test]
    async fn missing_content_type_keeps_its_status() {
        let req = Request::builder().body(Body::from("{}")).unwrap();
        let err = match JsonBody::<Payload>::from_request(req, &()).await {
            Err(e) => e,
            Ok(_) => panic!("body without content type accepted"),
        };
        assert_eq!(err.status(), StatusCode::UNSUPPORTED_MEDIA_TYPE);
    }
}
