//! Application router configuration.

use axum::{
    Router,
    http::Uri,
    response::Redirect,
    routing::{any, get},
};
use tower_http::cors::CorsLayer;

use crate::{
    AppState, endpoints,
    not_found::get_404_not_found,
    transaction::{create_transaction_endpoint, list_transactions_endpoint},
};

/// Return a router with all the app's routes.
///
/// `cors` decides which browser origins may call the API, see [crate::cors_layer].
pub fn build_router(state: AppState, cors: CorsLayer) -> Router {
    Router::new()
        .route(
            endpoints::TRANSACTIONS,
            get(list_transactions_endpoint).post(create_transaction_endpoint),
        )
        .route(
            endpoints::TRANSACTIONS_NO_SLASH,
            any(redirect_to_trailing_slash),
        )
        .fallback(get_404_not_found)
        .layer(cors)
        .with_state(state)
}

/// Redirect to the canonical route with a trailing slash, keeping the query string.
///
/// A temporary (307) redirect is used so clients repeat the same method and body.
async fn redirect_to_trailing_slash(uri: Uri) -> Redirect {
    let target = match uri.query() {
        Some(query) => format!("{}?{query}", endpoints::TRANSACTIONS),
        None => endpoints::TRANSACTIONS.to_owned(),
    };

    Redirect::temporary(&target)
}

#[cfg(test)]
mod tests {
    use std::{net::SocketAddr, time::Duration};

    use axum::http::{HeaderValue, Method, StatusCode, header};
    use axum_test::TestServer;
    use serde_json::{Value, json};
    use tokio::{
        io::{AsyncReadExt, AsyncWriteExt},
        net::{TcpListener, TcpStream},
    };

    use crate::{
        AppState, build_router, cors_layer, endpoints,
        session::SessionFactory,
        transaction::{NO_TRANSACTIONS_FOUND, Transaction, count_transactions, insert_transaction},
    };

    const ALLOWED_ORIGIN: &str = "http://localhost:3000";

    fn get_test_state_and_server() -> (AppState, TestServer) {
        let state = AppState::new(SessionFactory::in_memory().expect("Could not open database"));
        let cors = cors_layer(&[ALLOWED_ORIGIN]).expect("Could not build CORS layer");
        let app = build_router(state.clone(), cors);
        let server = TestServer::new(app).expect("Could not create test server.");

        (state, server)
    }

    async fn spawn_http_server(state: AppState) -> SocketAddr {
        let cors = cors_layer(&[ALLOWED_ORIGIN]).expect("Could not build CORS layer");
        let app = build_router(state, cors);
        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Could not bind listener");
        let address = listener.local_addr().expect("Could not get local address");

        tokio::spawn(async move { axum::serve(listener, app).await });

        address
    }

    async fn read_status_line(stream: &mut TcpStream) -> String {
        let mut response = Vec::new();
        stream.read_to_end(&mut response).await.unwrap();

        String::from_utf8_lossy(&response)
            .lines()
            .next()
            .unwrap_or_default()
            .to_owned()
    }

    fn row_count(state: &AppState) -> u32 {
        let session = state.session_factory.session().unwrap();
        let count = count_transactions(session.connection().unwrap()).unwrap();

        count
    }

    #[tokio::test]
    async fn create_returns_stored_transaction() {
        let (_, server) = get_test_state_and_server();

        let response = server
            .post(endpoints::TRANSACTIONS)
            .json(&json!({ "amount": 42.5, "category": "food", "is_income": false }))
            .await;

        response.assert_status_ok();
        assert_eq!(
            response.json::<Value>(),
            json!({
                "id": 1,
                "amount": 42.5,
                "category": "food",
                "description": null,
                "is_income": false,
                "date": null
            })
        );
    }

    #[tokio::test]
    async fn created_transaction_is_listed() {
        let (_, server) = get_test_state_and_server();
        let payload = json!({
            "amount": "-19.99",
            "category": "books",
            "description": "paperback",
            "is_income": false,
            "date": "2024-05-01"
        });

        let created = server
            .post(endpoints::TRANSACTIONS)
            .json(&payload)
            .await
            .json::<Transaction>();
        let listed = server
            .get(endpoints::TRANSACTIONS)
            .await
            .json::<Vec<Transaction>>();

        assert_eq!(listed, vec![created.clone()]);
        assert_eq!(created.amount, -19.99);
        assert_eq!(created.category.as_deref(), Some("books"));
        assert_eq!(created.description.as_deref(), Some("paperback"));
        assert!(!created.is_income);
        assert_eq!(created.date.as_deref(), Some("2024-05-01"));
    }

    #[tokio::test]
    async fn created_ids_are_distinct() {
        let (_, server) = get_test_state_and_server();
        let mut ids = Vec::new();

        for i in 0..10 {
            let transaction = server
                .post(endpoints::TRANSACTIONS)
                .json(&json!({ "amount": i }))
                .await
                .json::<Transaction>();
            ids.push(transaction.id);
        }

        let mut unique_ids = ids.clone();
        unique_ids.sort_unstable();
        unique_ids.dedup();
        assert_eq!(unique_ids.len(), ids.len(), "got duplicate IDs {ids:?}");
    }

    #[tokio::test]
    async fn omitted_income_flag_defaults_to_false() {
        let (_, server) = get_test_state_and_server();

        let transaction = server
            .post(endpoints::TRANSACTIONS)
            .json(&json!({ "amount": 1000, "description": "salary" }))
            .await
            .json::<Transaction>();

        assert!(!transaction.is_income);
    }

    #[tokio::test]
    async fn missing_amount_is_rejected_without_insert() {
        let (state, server) = get_test_state_and_server();

        let response = server
            .post(endpoints::TRANSACTIONS)
            .json(&json!({ "category": "food" }))
            .await;

        response.assert_status(StatusCode::UNPROCESSABLE_ENTITY);
        let body = response.json::<Value>();
        assert_eq!(body["detail"][0]["loc"], json!(["body", "amount"]));
        assert_eq!(body["detail"][0]["type"], "missing");
        assert_eq!(row_count(&state), 0);
    }

    #[tokio::test]
    async fn wrong_amount_type_is_rejected() {
        let (state, server) = get_test_state_and_server();

        let response = server
            .post(endpoints::TRANSACTIONS)
            .json(&json!({ "amount": "a lot" }))
            .await;

        response.assert_status(StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(row_count(&state), 0);
    }

    #[tokio::test]
    async fn persistence_failure_is_internal_server_error() {
        let (state, server) = get_test_state_and_server();
        {
            let session = state.session_factory.session().unwrap();
            session
                .connection()
                .unwrap()
                .execute_batch("DROP TABLE transactions")
                .unwrap();
            session.commit().unwrap();
        }

        let created = server
            .post(endpoints::TRANSACTIONS)
            .json(&json!({ "amount": 1 }))
            .await;
        let listed = server.get(endpoints::TRANSACTIONS).await;

        for response in [created, listed] {
            response.assert_status(StatusCode::INTERNAL_SERVER_ERROR);
            assert_eq!(
                response.json::<Value>(),
                json!({ "detail": "Internal Server Error" })
            );
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn slow_request_body_does_not_hold_up_other_requests() {
        let state = AppState::new(SessionFactory::in_memory().expect("Could not open database"));
        let address = spawn_http_server(state).await;
        let body = r#"{"amount": 12.5}"#;
        let (head, tail) = body.split_at(5);

        let mut slow = TcpStream::connect(address).await.unwrap();
        let request = format!(
            "POST /transactions/ HTTP/1.1\r\nHost: localhost\r\n\
             Content-Type: application/json\r\nContent-Length: {}\r\n\
             Connection: close\r\n\r\n{head}",
            body.len()
        );
        slow.write_all(request.as_bytes()).await.unwrap();
        tokio::time::sleep(Duration::from_millis(100)).await;

        let mut other = TcpStream::connect(address).await.unwrap();
        other
            .write_all(b"GET /transactions/ HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n")
            .await
            .unwrap();
        let status = tokio::time::timeout(Duration::from_secs(5), read_status_line(&mut other))
            .await
            .expect("GET was held up by the unfinished POST");
        assert_eq!(status, "HTTP/1.1 404 Not Found");

        slow.write_all(tail.as_bytes()).await.unwrap();
        assert_eq!(read_status_line(&mut slow).await, "HTTP/1.1 200 OK");
    }

    #[tokio::test]
    async fn empty_list_is_not_found() {
        let (_, server) = get_test_state_and_server();

        let response = server.get(endpoints::TRANSACTIONS).await;

        response.assert_status(StatusCode::NOT_FOUND);
        assert_eq!(
            response.json::<Value>(),
            json!({ "detail": NO_TRANSACTIONS_FOUND })
        );
    }

    #[tokio::test]
    async fn list_paginates_with_skip_and_limit() {
        let (state, server) = get_test_state_and_server();
        {
            let session = state.session_factory.session().unwrap();
            for i in 0..150 {
                insert_transaction(Transaction::build(i as f64), session.connection().unwrap())
                    .unwrap();
            }
            session.commit().unwrap();
        }

        let response = server
            .get(endpoints::TRANSACTIONS)
            .add_query_param("skip", 100)
            .add_query_param("limit", 100)
            .await;

        response.assert_status_ok();
        assert_eq!(response.json::<Vec<Transaction>>().len(), 50);

        let default_page = server.get(endpoints::TRANSACTIONS).await;
        assert_eq!(default_page.json::<Vec<Transaction>>().len(), 100);
    }

    #[tokio::test]
    async fn non_integer_limit_is_rejected() {
        let (_, server) = get_test_state_and_server();

        let response = server
            .get(endpoints::TRANSACTIONS)
            .add_query_param("limit", "ten")
            .await;

        response.assert_status(StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(
            response.json::<Value>()["detail"][0]["loc"],
            json!(["query", "limit"])
        );
    }

    #[tokio::test]
    async fn path_without_trailing_slash_redirects() {
        let (_, server) = get_test_state_and_server();

        let response = server
            .get(endpoints::TRANSACTIONS_NO_SLASH)
            .add_query_param("skip", 5)
            .await;

        response.assert_status(StatusCode::TEMPORARY_REDIRECT);
        assert_eq!(response.header("location"), "/transactions/?skip=5");
    }

    #[tokio::test]
    async fn unknown_route_is_not_found() {
        let (_, server) = get_test_state_and_server();

        let response = server.get("/budgets").await;

        response.assert_status(StatusCode::NOT_FOUND);
        assert_eq!(response.json::<Value>(), json!({ "detail": "Not Found" }));
    }

    #[tokio::test]
    async fn preflight_from_allowed_origin_is_permitted() {
        let (_, server) = get_test_state_and_server();

        let response = server
            .method(Method::OPTIONS, endpoints::TRANSACTIONS)
            .add_header(header::ORIGIN, HeaderValue::from_static(ALLOWED_ORIGIN))
            .add_header(
                header::ACCESS_CONTROL_REQUEST_METHOD,
                HeaderValue::from_static("POST"),
            )
            .add_header(
                header::ACCESS_CONTROL_REQUEST_HEADERS,
                HeaderValue::from_static("content-type"),
            )
            .await;

        response.assert_status_ok();
        assert_eq!(
            response.header("access-control-allow-origin"),
            ALLOWED_ORIGIN
        );
        assert_eq!(
            response.header("access-control-allow-credentials"),
            "true"
        );
        assert_eq!(response.header("access-control-allow-methods"), "POST");
    }

    #[tokio::test]
    async fn other_origins_get_no_allow_origin_header() {
        let (_, server) = get_test_state_and_server();

        let response = server
            .get(endpoints::TRANSACTIONS)
            .add_header(
                header::ORIGIN,
                HeaderValue::from_static("http://evil.example.com"),
            )
            .await;

        assert!(
            response
                .headers()
                .get(header::ACCESS_CONTROL_ALLOW_ORIGIN)
                .is_none()
        );
    }
}
