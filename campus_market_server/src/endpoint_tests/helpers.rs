use actix_web::{http::StatusCode, test, web::ServiceConfig, App};

use crate::auth::USER_ID_HEADER;

pub async fn get_request<F>(user_id: Option<i64>, path: &str, configure: F) -> (StatusCode, String)
where F: FnOnce(&mut ServiceConfig) {
    let app = test::init_service(App::new().configure(configure)).await;
    let mut req = test::TestRequest::get().uri(path);
    if let Some(id) = user_id {
        req = req.insert_header((USER_ID_HEADER, id.to_string()));
    }
    let resp = test::call_service(&app, req.to_request()).await;
    let status = resp.status();
    let body = test::read_body(resp).await;
    (status, String::from_utf8_lossy(&body).to_string())
}

pub async fn post_request<F>(
    user_id: Option<i64>,
    path: &str,
    body: serde_json::Value,
    configure: F,
) -> (StatusCode, String)
where
    F: FnOnce(&mut ServiceConfig),
{
    let app = test::init_service(App::new().configure(configure)).await;
    let mut req = test::TestRequest::post().uri(path).set_json(&body);
    if let Some(id) = user_id {
        req = req.insert_header((USER_ID_HEADER, id.to_string()));
    }
    let resp = test::call_service(&app, req.to_request()).await;
    let status = resp.status();
    let body = test::read_body(resp).await;
    (status, String::from_utf8_lossy(&body).to_string())
}
