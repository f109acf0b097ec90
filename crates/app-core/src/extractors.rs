//! Axum extractors whose rejections surface as [`AppError`] JSON.

use axum::body::Body;
use axum::extract::{FromRequest, FromRequestParts, Json, Path, Query};
use axum::http::Request;
use axum::http::request::Parts;
use serde::de::DeserializeOwned;

use super::error::AppError;

pub struct AppQuery<T>(pub T);

impl<T, S> FromRequestParts<S> for AppQuery<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        match Query::<T>::from_request_parts(parts, state).await {
            Ok(Query(value)) => Ok(Self(value)),
            Err(rejection) => Err(AppError::from(rejection)),
        }
    }
}

pub struct AppPath<T>(pub T);

impl<T, S> FromRequestParts<S> for AppPath<T>
where
    T: DeserializeOwned + Send,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        match Path::<T>::from_request_parts(parts, state).await {
            Ok(Path(value)) => Ok(Self(value)),
            Err(rejection) => Err(AppError::from(rejection)),
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct AppJson<T>(pub T);

impl<T, S> FromRequest<S> for AppJson<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request(req: Request<Body>, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state).await?;
        Ok(Self(value))
    }
}

#[cfg(test)]
mod tests {
    use axum::Router;
    use axum::http::{Method, StatusCode, Uri};
    use serde::Deserialize;
    use tower::ServiceExt;

    use super::*;

    #[derive(Debug, Deserialize)]
    struct Pagination {
        page: u64,
        per_page: u64,
    }

    #[derive(Debug, Deserialize)]
    struct ProviderPath {
        provider: String,
    }

    #[derive(Debug, Deserialize)]
    struct ProfileBody {
        display_name: String,
    }

    #[tokio::test]
    async fn test_query_extraction() {
        let uri = "/users?page=2&per_page=25".parse::<Uri>().unwrap();
        let request = Request::builder().uri(uri).method(Method::GET).body(Body::empty()).unwrap();
        let (mut parts, _) = request.into_parts();

        let AppQuery(query) = AppQuery::<Pagination>::from_request_parts(&mut parts, &()).await.unwrap();
        assert_eq!(query.page, 2);
        assert_eq!(query.per_page, 25);
    }

    #[tokio::test]
    async fn test_query_rejection_becomes_app_error() {
        let uri = "/users?page=two".parse::<Uri>().unwrap();
        let request = Request::builder().uri(uri).method(Method::GET).body(Body::empty()).unwrap();
        let (mut parts, _) = request.into_parts();

        let result = AppQuery::<Pagination>::from_request_parts(&mut parts, &()).await;
        assert!(matches!(result, Err(AppError::RequestFormat(_))));
    }

    #[tokio::test]
    async fn test_path_extraction_through_router() {
        let app = Router::new().route(
            "/auth/{provider}",
            axum::routing::get(|AppPath(path): AppPath<ProviderPath>| async move { path.provider }),
        );

        let request = Request::builder().uri("/auth/github").body(Body::empty()).unwrap();
        let response = app.oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_json_rejection_is_bad_request() {
        let request = Request::builder()
            .method(Method::POST)
            .header("content-type", "application/json")
            .body(Body::from("{not json"))
            .unwrap();

        let result = AppJson::<ProfileBody>::from_request(request, &()).await;
        assert!(matches!(result, Err(AppError::RequestFormat(_))));
    }

    #[tokio::test]
    async fn test_json_extraction() {
        let request = Request::builder()
            .method(Method::POST)
            .header("content-type", "application/json")
            .body(Body::from(r#"{"display_name":"Ann"}"#))
            .unwrap();

        let AppJson(body) = AppJson::<ProfileBody>::from_request(request, &()).await.unwrap();
        assert_eq!(body.display_name, "Ann");
    }
}
