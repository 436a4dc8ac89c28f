use actix_web::{get, web::Data, HttpRequest, HttpResponse, Responder};
use authorino_operator::controllers::authorino_controller::State;

#[get("/health")]
pub async fn health(_: HttpRequest) -> impl Responder {
    HttpResponse::Ok().json("healthy")
}

/// Diagnostics of the Authorino controller
#[get("/")]
pub async fn index(state: Data<State>, _req: HttpRequest) -> impl Responder {
    let d = state.diagnostics().await;
    HttpResponse::Ok().json(&d)
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::{test, App};

    #[actix_web::test]
    async fn health_reports_healthy() {
        let app = test::init_service(App::new().service(health)).await;
        let req = test::TestRequest::get().uri("/health").to_request();
        let body: String = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body, "healthy");
    }

    #[actix_web::test]
    async fn index_serves_diagnostics() {
        let app = test::init_service(App::new().app_data(Data::new(State::default())).service(index)).await;
        let req = test::TestRequest::get().uri("/").to_request();
        let body: serde_json::Value = test::call_and_read_body_json(&app, req).await;
        assert!(body.get("last_event").is_some());
    }
}
