// GET handlers for the file server

use std::convert::Infallible;
use std::sync::Arc;
use tracing::{debug, warn};
use warp::http::StatusCode;
use warp::path::FullPath;

use crate::static_files::{Page, StaticFileResolver, HTML_CONTENT_TYPE};

/// Serve `GET <path>`: named pages, then assets, then the 404 page.
pub async fn serve_path_handler(
    path: FullPath,
    resolver: Arc<StaticFileResolver>,
) -> Result<Box<dyn warp::Reply>, Infallible> {
    let request_path = path.as_str();

    if let Some(page) = Page::for_path(request_path) {
        debug!(path = %request_path, page = page.file_name(), "GET page");
        return Ok(html(resolver.page(page).await, StatusCode::OK));
    }

    let resolved = match resolver.resolve(request_path) {
        Ok(resolved) => resolved,
        Err(e) => {
            debug!(error = %e, "GET 404");
            return Ok(not_found(&resolver).await);
        }
    };

    match tokio::fs::read(&resolved.path).await {
        Ok(bytes) => {
            debug!(path = %request_path, content_type = %resolved.content_type, "GET 200");
            let reply = warp::reply::with_status(
                warp::reply::with_header(bytes, "content-type", resolved.content_type),
                StatusCode::OK,
            );
            Ok(Box::new(reply) as Box<dyn warp::Reply>)
        }
        Err(e) => {
            warn!(path = %resolved.path.display(), error = %e, "Resolved file could not be read");
            Ok(not_found(&resolver).await)
        }
    }
}

async fn not_found(resolver: &StaticFileResolver) -> Box<dyn warp::Reply> {
    html(resolver.page(Page::Error).await, StatusCode::NOT_FOUND)
}

fn html(body: Vec<u8>, status: StatusCode) -> Box<dyn warp::Reply> {
    Box::new(warp::reply::with_status(
        warp::reply::with_header(body, "content-type", HTML_CONTENT_TYPE),
        status,
    ))
}
