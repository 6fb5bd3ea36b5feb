// Route definitions for the two listeners

use futures_util::FutureExt;
use std::sync::Arc;
use tokio_util::task::TaskTracker;
use warp::Filter;

use crate::handlers::{self, RelayContext};
use crate::static_files::StaticFileResolver;

/// File server: every GET goes through the static resolver.
pub fn file_routes(
    resolver: Arc<StaticFileResolver>,
) -> impl Filter<Extract = impl warp::Reply, Error = warp::Rejection> + Clone {
    // GET /, GET /message.html, GET /{asset}
    warp::get()
        .and(warp::path::full())
        .and(warp::any().map(move || resolver.clone()))
        .and_then(handlers::serve_path_handler)
}

/// Relay: a WebSocket upgrade on any path. Sessions are registered with
/// `sessions` so shutdown can wait for them before the sink is closed.
pub fn relay_routes(
    ctx: RelayContext,
    sessions: TaskTracker,
) -> impl Filter<Extract = impl warp::Reply, Error = warp::Rejection> + Clone {
    warp::ws().map(move |ws: warp::ws::Ws| {
        let ctx = ctx.clone();
        let sessions = sessions.clone();
        ws.on_upgrade(move |socket| {
            sessions
                .track_future(handlers::relay_session(socket, ctx))
                .map(|_| ())
        })
    })
}
