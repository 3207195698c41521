use crate::backend::{
    ApiError,
    ApiResult,
    KeyedRequest,
    RewardBackend,
};
use actix_web::{
    App,
    HttpResponse,
    HttpServer,
    ResponseError,
    dev::{
        Server,
        ServerHandle,
    },
    http::StatusCode,
    web,
};
use anyhow::Context;
use serde::Serialize;
use std::{
    net::TcpListener,
    thread::JoinHandle,
};

pub const API_PREFIX: &str = "/api/v1";

impl ResponseError for ApiError {
    fn status_code(&self) -> StatusCode {
        StatusCode::from_u16(self.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code())
            .json(serde_json::json!({ "detail": self.detail }))
    }
}

/// The rewards API served from a background thread. Dropping it stops the
/// server.
pub struct MockServer {
    base_url: String,
    backend: RewardBackend,
    server_handle: ServerHandle,
    server_thread: Option<JoinHandle<()>>,
}

impl MockServer {
    /// Binds to `port` on localhost, or an ephemeral port with `None`.
    pub fn start(backend: RewardBackend, port: Option<u16>) -> anyhow::Result<Self> {
        let (server, base_url) = bind(backend.clone(), port)?;
        tracing::info!("rewards mock server listening on {}", base_url);

        let server_handle = server.handle();
        let server_thread = std::thread::spawn(move || {
            let sys = actix_web::rt::System::new();
            let _ = sys.block_on(server);
        });

        Ok(Self {
            base_url,
            backend,
            server_handle,
            server_thread: Some(server_thread),
        })
    }

    /// Base url including the api prefix, ready to hand to a client.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn backend(&self) -> &RewardBackend {
        &self.backend
    }
}

impl Drop for MockServer {
    fn drop(&mut self) {
        let _ = self.server_handle.stop(true);
        if let Some(thread) = self.server_thread.take() {
            let _ = thread.join();
        }
    }
}

/// Serves on the current thread until the process is interrupted.
pub fn serve_forever(backend: RewardBackend, port: Option<u16>) -> anyhow::Result<()> {
    actix_web::rt::System::new().block_on(async move {
        let (server, base_url) = bind(backend, port)?;
        tracing::info!("rewards mock server listening on {}", base_url);
        server
            .await
            .context("rewards mock server stopped with an error")
    })
}

fn bind(backend: RewardBackend, port: Option<u16>) -> anyhow::Result<(Server, String)> {
    let listener = TcpListener::bind(("127.0.0.1", port.unwrap_or(0)))
        .context("failed to bind HTTP listener for the rewards API")?;
    let address = listener
        .local_addr()
        .context("failed to read listener address")?;
    let base_url = format!("http://{address}{API_PREFIX}");

    let server = HttpServer::new(move || {
        App::new()
            .app_data(web::Data::new(backend.clone()))
            .service(web::scope(API_PREFIX).configure(routes))
    })
    .listen(listener)
    .context("failed to start Actix server")?
    .run();
    Ok((server, base_url))
}

fn routes(cfg: &mut web::ServiceConfig) {
    cfg.route("/points/balance", web::get().to(balance))
        .route("/points/signin/status", web::get().to(signin_status))
        .route("/points/signin", web::post().to(signin))
        .route("/lottery/info", web::get().to(lottery_info))
        .route("/lottery/draw", web::post().to(draw))
        .route("/lottery/scratch/info", web::get().to(scratch_info))
        .route("/lottery/scratch/buy", web::post().to(scratch_buy))
        .route(
            "/lottery/scratch/{card_id}/reveal",
            web::post().to(scratch_reveal),
        )
        .route("/lottery/slot/info", web::get().to(slot_info))
        .route("/lottery/slot/spin", web::post().to(slot_spin))
        .route("/easter-egg/gacha/status", web::get().to(gacha_status))
        .route("/easter-egg/gacha/play", web::post().to(gacha_play));
}

fn reply<T: Serialize>(result: ApiResult<T>) -> ApiResult<web::Json<T>> {
    result.map(web::Json)
}

/// Bodies are optional; a missing or empty body is treated as no key.
fn keyed(body: &web::Bytes) -> KeyedRequest {
    serde_json::from_slice(body).unwrap_or_default()
}

async fn balance(backend: web::Data<RewardBackend>) -> impl actix_web::Responder {
    reply(backend.balance())
}

async fn signin_status(backend: web::Data<RewardBackend>) -> impl actix_web::Responder {
    reply(backend.signin_status())
}

async fn signin(backend: web::Data<RewardBackend>) -> impl actix_web::Responder {
    tracing::info!("signin");
    reply(backend.signin())
}

async fn lottery_info(backend: web::Data<RewardBackend>) -> impl actix_web::Responder {
    reply(backend.lottery_info())
}

async fn draw(backend: web::Data<RewardBackend>, body: web::Bytes) -> impl actix_web::Responder {
    let request = keyed(&body);
    tracing::info!(request_id = ?request.request_id, "lottery draw");
    reply(backend.draw(request))
}

async fn scratch_info(backend: web::Data<RewardBackend>) -> impl actix_web::Responder {
    reply(backend.scratch_info())
}

async fn scratch_buy(backend: web::Data<RewardBackend>) -> impl actix_web::Responder {
    tracing::info!("scratch card bought");
    reply(backend.scratch_buy())
}

async fn scratch_reveal(
    backend: web::Data<RewardBackend>,
    card_id: web::Path<u64>,
) -> impl actix_web::Responder {
    let card_id = card_id.into_inner();
    tracing::info!(card_id, "scratch card revealed");
    reply(backend.scratch_reveal(card_id))
}

async fn slot_info(backend: web::Data<RewardBackend>) -> impl actix_web::Responder {
    reply(backend.slot_info())
}

async fn slot_spin(backend: web::Data<RewardBackend>, body: web::Bytes) -> impl actix_web::Responder {
    let request = keyed(&body);
    tracing::info!(request_id = ?request.request_id, "slot spin");
    reply(backend.slot_spin(request))
}

async fn gacha_status(backend: web::Data<RewardBackend>) -> impl actix_web::Responder {
    reply(backend.gacha_status())
}

async fn gacha_play(backend: web::Data<RewardBackend>) -> impl actix_web::Responder {
    tracing::info!("gacha play");
    reply(backend.gacha_play())
}

#[allow(non_snake_case)]
#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{
        BackendConfig,
        BalanceResponse,
        Endpoint,
        InfoResponse,
        SlotSpinResponse,
    };

    fn server() -> MockServer {
        let backend = RewardBackend::new(BackendConfig {
            seed: Some(1),
            ..BackendConfig::default()
        });
        MockServer::start(backend, None).unwrap()
    }

    #[tokio::test]
    async fn balance__is_served_under_api_prefix() {
        // given
        let server = server();
        let client = reqwest::Client::new();

        // when
        let response = client
            .get(format!("{}/points/balance", server.base_url()))
            .send()
            .await
            .unwrap();

        // then
        assert!(response.status().is_success());
        let body = response.json::<BalanceResponse>().await.unwrap();
        assert_eq!(body.balance, 100);
    }

    #[tokio::test]
    async fn slot_spin__debits_and_counts() {
        // given
        let server = server();
        let client = reqwest::Client::new();

        // when
        let spin = client
            .post(format!("{}/lottery/slot/spin", server.base_url()))
            .json(&serde_json::json!({ "request_id": "r-1" }))
            .send()
            .await
            .unwrap()
            .json::<SlotSpinResponse>()
            .await
            .unwrap();

        // then
        assert_eq!(spin.reels.len(), 3);
        assert_eq!(spin.balance, 70 + spin.payout);
        let info = client
            .get(format!("{}/lottery/slot/info", server.base_url()))
            .send()
            .await
            .unwrap()
            .json::<InfoResponse>()
            .await
            .unwrap();
        assert_eq!(info.today_count, 1);
    }

    #[tokio::test]
    async fn injected_failure__is_rendered_with_detail() {
        // given
        let server = server();
        server
            .backend()
            .fail_next(Endpoint::GachaPlay, 409, "all codes have been claimed");
        let client = reqwest::Client::new();

        // when
        let response = client
            .post(format!("{}/easter-egg/gacha/play", server.base_url()))
            .send()
            .await
            .unwrap();

        // then
        assert_eq!(response.status().as_u16(), 409);
        let body = response.json::<serde_json::Value>().await.unwrap();
        assert_eq!(body["detail"], "all codes have been claimed");
    }
}
