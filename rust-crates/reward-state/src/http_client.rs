use crate::{
    Error,
    Result,
    api::RewardApi,
    config::ClientConfig,
    kinds::{
        ActionKind,
        ActivityKind,
    },
    outcome::{
        ActionOutcome,
        ActionRequest,
        Reward,
        StatusReport,
    },
    status::ActivityStatus,
};
use anyhow::Context;
use reqwest::{
    RequestBuilder,
    header,
};
use serde::{
    Deserialize,
    Serialize,
    de::DeserializeOwned,
};
use url::Url;

/// [`RewardApi`] over the activity center's REST endpoints.
#[derive(Clone)]
pub struct HttpRewardApi {
    base_url: String,
    bearer_token: Option<String>,
    http: reqwest::Client,
}

impl HttpRewardApi {
    pub fn new(base_url: impl Into<String>, bearer_token: Option<String>) -> anyhow::Result<Self> {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Url::parse(&base_url).with_context(|| format!("invalid base url `{base_url}`"))?;
        let http = reqwest::Client::builder()
            .build()
            .context("failed to build HTTP client")?;
        Ok(Self {
            base_url,
            bearer_token,
            http,
        })
    }

    pub fn from_config(config: &ClientConfig) -> anyhow::Result<Self> {
        Self::new(config.base_url.clone(), config.bearer_token.clone())
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let url = format!("{}{path}", self.base_url);
        self.send(self.http.get(url)).await
    }

    async fn post<T: DeserializeOwned>(&self, path: &str, body: Option<&impl Serialize>) -> Result<T> {
        let url = format!("{}{path}", self.base_url);
        let mut request = self.http.post(url);
        if let Some(body) = body {
            request = request.json(body);
        }
        self.send(request).await
    }

    async fn send<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T> {
        let request = match &self.bearer_token {
            Some(token) => request.header(header::AUTHORIZATION, format!("Bearer {token}")),
            None => request,
        };
        let res = request.send().await?;
        let status = res.status();
        let bytes = res.bytes().await?;
        if !status.is_success() {
            tracing::debug!(%status, "reward api rejected request");
            return Err(Error::from_status(status.as_u16(), error_detail(&bytes)));
        }
        serde_json::from_slice(&bytes).map_err(|err| Error::Decode(err.to_string()))
    }

    async fn info(&self, path: &str) -> Result<StatusReport> {
        let dto: InfoDto = self.get(path).await?;
        Ok(dto.into())
    }
}

impl RewardApi for HttpRewardApi {
    async fn balance(&self) -> Result<u64> {
        let dto: BalanceDto = self.get("/points/balance").await?;
        Ok(dto.balance)
    }

    async fn activity_status(&self, kind: ActivityKind) -> Result<StatusReport> {
        match kind {
            ActivityKind::Signin => {
                let dto: SigninStatusDto = self.get("/points/signin/status").await?;
                Ok(dto.into())
            }
            ActivityKind::Lottery => self.info("/lottery/info").await,
            ActivityKind::Scratch => self.info("/lottery/scratch/info").await,
            ActivityKind::Slot => self.info("/lottery/slot/info").await,
            ActivityKind::Gacha => {
                let dto: GachaStatusDto = self.get("/easter-egg/gacha/status").await?;
                Ok(dto.into())
            }
        }
    }

    async fn perform(&self, request: &ActionRequest) -> Result<ActionOutcome> {
        let keyed = RequestIdDto {
            request_id: request.request_id.clone(),
        };
        let outcome: ActionOutcome = match request.kind {
            ActionKind::Signin => self
                .post::<SigninDto>("/points/signin", None::<&()>)
                .await?
                .into(),
            ActionKind::Draw => self
                .post::<DrawDto>("/lottery/draw", Some(&keyed))
                .await?
                .into(),
            ActionKind::ScratchBuy => self
                .post::<ScratchBuyDto>("/lottery/scratch/buy", None::<&()>)
                .await?
                .into(),
            ActionKind::ScratchReveal => {
                let card_id = request
                    .card_id
                    .ok_or_else(|| Error::from_status(400, Some("no scratch card to reveal".into())))?;
                self.post::<DrawDto>(&format!("/lottery/scratch/{card_id}/reveal"), None::<&()>)
                    .await?
                    .into()
            }
            ActionKind::GachaPlay => self
                .post::<GachaPlayDto>("/easter-egg/gacha/play", None::<&()>)
                .await?
                .into(),
            ActionKind::SlotSpin => self
                .post::<SlotSpinDto>("/lottery/slot/spin", Some(&keyed))
                .await?
                .into(),
        };
        Ok(outcome)
    }
}

/// Pulls the `detail` text out of an error body. Validation errors carry a
/// structured detail, which is passed on as JSON text.
fn error_detail(body: &[u8]) -> Option<String> {
    #[derive(Deserialize)]
    struct ErrorDto {
        detail: serde_json::Value,
    }
    let dto: ErrorDto = serde_json::from_slice(body).ok()?;
    match dto.detail {
        serde_json::Value::String(detail) => Some(detail),
        serde_json::Value::Null => None,
        other => Some(other.to_string()),
    }
}

/// Human readable text for a gacha reward preview.
fn describe_reward(kind: &str, value: &serde_json::Value) -> String {
    let amount = value.get("amount").and_then(serde_json::Value::as_u64);
    match kind {
        "points" => format!("{} points", amount.unwrap_or_default()),
        "item" => {
            let item = value
                .get("item_type")
                .and_then(serde_json::Value::as_str)
                .unwrap_or("item");
            format!("{} x {item}", amount.unwrap_or(1))
        }
        "badge" => {
            let name = value
                .get("badge_name")
                .and_then(serde_json::Value::as_str)
                .unwrap_or("mystery");
            format!("\"{name}\" badge")
        }
        "api_key" => "API key code".to_string(),
        _ => "mystery reward".to_string(),
    }
}

#[derive(Serialize)]
struct RequestIdDto {
    request_id: String,
}

#[derive(Deserialize)]
struct BalanceDto {
    balance: u64,
}

#[derive(Deserialize)]
struct SigninStatusDto {
    signed_today: bool,
    #[serde(default)]
    balance: Option<u64>,
}

impl From<SigninStatusDto> for StatusReport {
    fn from(dto: SigninStatusDto) -> Self {
        Self {
            status: ActivityStatus::new(0, Some(1)).with_today_count(u32::from(dto.signed_today)),
            balance: dto.balance,
        }
    }
}

/// Shared by the lottery, scratch and slot info endpoints.
#[derive(Deserialize)]
struct InfoDto {
    active: bool,
    #[serde(default)]
    cost_points: Option<u64>,
    #[serde(default)]
    daily_limit: Option<u32>,
    #[serde(default)]
    today_count: Option<u32>,
    #[serde(default)]
    balance: Option<u64>,
}

impl From<InfoDto> for StatusReport {
    fn from(dto: InfoDto) -> Self {
        Self {
            status: ActivityStatus {
                active: dto.active,
                cost_points: dto.cost_points.unwrap_or_default(),
                daily_limit: dto.daily_limit,
                today_count: dto.today_count.unwrap_or_default(),
                stock: None,
                can_play: false,
            },
            balance: dto.balance,
        }
    }
}

#[derive(Deserialize)]
struct GachaStatusDto {
    cost: u64,
    available_codes: u32,
    user_balance: u64,
}

impl From<GachaStatusDto> for StatusReport {
    fn from(dto: GachaStatusDto) -> Self {
        Self {
            status: ActivityStatus::new(dto.cost, None).with_stock(dto.available_codes),
            balance: Some(dto.user_balance),
        }
    }
}

#[derive(Deserialize)]
struct SigninDto {
    balance: u64,
    total_points: u64,
    streak_day: u32,
    #[serde(default)]
    is_milestone: bool,
    #[serde(default)]
    milestone_message: Option<String>,
}

impl From<SigninDto> for ActionOutcome {
    fn from(dto: SigninDto) -> Self {
        let milestone = dto.is_milestone.then_some(dto.milestone_message).flatten();
        ActionOutcome::new(Reward::Points {
            amount: dto.total_points,
            streak_day: Some(dto.streak_day),
            milestone,
        })
        .with_balance(dto.balance)
        .with_today_count(1)
    }
}

/// Draw and scratch reveal share a prize payload.
#[derive(Deserialize)]
struct DrawDto {
    prize_name: String,
    prize_type: String,
    #[serde(default)]
    prize_value: Option<String>,
    #[serde(default)]
    is_rare: bool,
    #[serde(default)]
    balance: Option<u64>,
}

impl From<DrawDto> for ActionOutcome {
    fn from(dto: DrawDto) -> Self {
        let outcome = ActionOutcome::new(Reward::Prize {
            name: dto.prize_name,
            prize_type: dto.prize_type,
            value: dto.prize_value,
            is_rare: dto.is_rare,
        });
        match dto.balance {
            Some(balance) => outcome.with_balance(balance),
            None => outcome,
        }
    }
}

#[derive(Deserialize)]
struct ScratchBuyDto {
    card_id: u64,
    remaining_balance: u64,
}

impl From<ScratchBuyDto> for ActionOutcome {
    fn from(dto: ScratchBuyDto) -> Self {
        ActionOutcome::new(Reward::Card {
            card_id: dto.card_id,
        })
        .with_balance(dto.remaining_balance)
    }
}

#[derive(Deserialize)]
struct RewardInfoDto {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    value: serde_json::Value,
}

#[derive(Deserialize)]
struct GachaPlayDto {
    #[serde(default)]
    code: Option<String>,
    reward: RewardInfoDto,
    remaining_balance: u64,
}

impl From<GachaPlayDto> for ActionOutcome {
    fn from(dto: GachaPlayDto) -> Self {
        ActionOutcome::new(Reward::Capsule {
            code: dto.code,
            description: describe_reward(&dto.reward.kind, &dto.reward.value),
        })
        .with_balance(dto.remaining_balance)
    }
}

#[derive(Deserialize)]
struct SlotSpinDto {
    reels: Vec<String>,
    payout: u64,
    #[serde(default)]
    jackpot: bool,
    balance: u64,
    #[serde(default)]
    today_count: Option<u32>,
}

impl From<SlotSpinDto> for ActionOutcome {
    fn from(dto: SlotSpinDto) -> Self {
        let outcome = ActionOutcome::new(Reward::Spin {
            reels: dto.reels,
            payout: dto.payout,
            jackpot: dto.jackpot,
        })
        .with_balance(dto.balance);
        match dto.today_count {
            Some(today_count) => outcome.with_today_count(today_count),
            None => outcome,
        }
    }
}
